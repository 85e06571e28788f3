pub mod analysis;
pub mod client;
pub mod config;
pub mod executor;
pub mod lockfile;
pub mod model;
pub mod render;
pub mod traits;

// Re-export common types for convenience
pub use executor::*;
pub use model::*;
pub use traits::*;
