//! Analysis module - change classification and the sequential pipeline.
//!
//! - **Signals**: cue-word and version-tag matching via [`signals::Signals`]
//! - **Classifier**: pure commit/release → [`Report`](crate::model::Report) logic
//! - **Pipeline**: per-dependency sequencing and ranking via [`AnalysisPipeline`]

pub mod classifier;
pub mod pipeline;
pub mod signals;

pub use classifier::{classify, evaluate_releases};
pub use pipeline::{rank_order, rank_reports, AnalysisOutcome, AnalysisPipeline, AnalysisStats};
pub use signals::Signals;
