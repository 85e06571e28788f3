//! Sequential analysis pipeline.
//!
//! [`AnalysisPipeline`] walks dependencies one at a time
//! (compare → releases → classify → emit) with:
//! - A timeout around every remote call
//! - Structured logging via `tracing`
//! - A report handed to the caller as soon as each dependency finishes
//! - A final severity-then-name ranking

use std::cmp::Ordering;
use std::ops::ControlFlow;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::analysis::classifier::classify;
use crate::config::REQUEST_TIMEOUT;
use crate::model::{Dependency, Report};
use crate::traits::{ClientError, RemoteSource};

// ============================================================================
// Pipeline Types
// ============================================================================

/// Everything a finished (or stopped) run produced.
#[derive(Debug, Default)]
pub struct AnalysisOutcome {
    /// Reports in ranked order.
    pub reports: Vec<Report>,

    /// `true` when the run ended early because the caller asked it to.
    pub stopped: bool,

    pub stats: AnalysisStats,
}

#[derive(Debug, Default, Clone)]
pub struct AnalysisStats {
    /// Wall time of the whole run (milliseconds)
    pub total_duration_ms: u64,

    /// Dependencies that produced a report
    pub analyzed: usize,

    /// Reports carrying an error
    pub errored: usize,

    /// Dependencies behind their branch tip
    pub behind: usize,
}

// ============================================================================
// Pipeline Executor
// ============================================================================

/// Sequential dependency analysis over a [`RemoteSource`].
///
/// Dependencies are processed strictly one after another so that API usage
/// stays predictable and progress is reported in input order.
///
/// # Example
///
/// ```ignore
/// let pipeline = AnalysisPipeline::new(GitHubClient::new(config)?)
///     .with_timeout(Duration::from_secs(15));
///
/// let outcome = pipeline
///     .run(&dependencies, |index, report| {
///         println!("{} {}", index, report.dependency.name);
///         ControlFlow::Continue(())
///     })
///     .await;
/// ```
pub struct AnalysisPipeline<S>
where
    S: RemoteSource,
{
    source: S,

    /// Timeout for each remote call (default: 15 seconds)
    call_timeout: Duration,
}

impl<S> AnalysisPipeline<S>
where
    S: RemoteSource,
{
    pub fn new(source: S) -> Self {
        Self {
            source,
            call_timeout: REQUEST_TIMEOUT,
        }
    }

    /// Sets the timeout for each compare/list call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Analyzes a single dependency.
    ///
    /// Never fails: a comparison error is folded into the returned report and
    /// a release listing error only drops release evidence.
    #[instrument(skip(self, dependency), fields(dependency = %dependency.name))]
    pub async fn analyze(&self, dependency: &Dependency) -> Report {
        let comparison = self
            .bounded(self.source.compare_commits(
                &dependency.owner,
                &dependency.repo,
                &dependency.commit,
                &dependency.branch,
            ))
            .await;

        let range = match comparison {
            Ok(range) => range,
            Err(e) => {
                warn!(error = %e, "compare failed");
                return classify(dependency, Err(&e), &[]);
            }
        };

        let releases = if range.ahead_by == 0 {
            Vec::new()
        } else {
            match self
                .bounded(self.source.list_releases(&dependency.owner, &dependency.repo))
                .await
            {
                Ok(releases) => releases,
                Err(e) => {
                    debug!(error = %e, "release listing failed, using commit evidence only");
                    Vec::new()
                }
            }
        };

        let report = classify(dependency, Ok(&range), &releases);
        info!(
            behind_by = report.behind_by,
            severity = ?report.severity,
            releases = report.releases.len(),
            "Dependency analyzed"
        );
        report
    }

    /// Runs every dependency in order.
    ///
    /// `emit` receives `(index, report)` right after each dependency finishes,
    /// before the next one starts. Returning [`ControlFlow::Break`] stops the
    /// run; the reports gathered so far are still ranked and returned.
    pub async fn run<F>(&self, dependencies: &[Dependency], mut emit: F) -> AnalysisOutcome
    where
        F: FnMut(usize, &Report) -> ControlFlow<()>,
    {
        let start = Instant::now();
        let mut outcome = AnalysisOutcome::default();

        info!(count = dependencies.len(), "Starting analysis");

        for (index, dependency) in dependencies.iter().enumerate() {
            let report = self.analyze(dependency).await;
            let flow = emit(index, &report);
            outcome.reports.push(report);

            if flow.is_break() {
                info!(completed = index + 1, "Analysis stopped by caller");
                outcome.stopped = true;
                break;
            }
        }

        rank_reports(&mut outcome.reports);

        let stats = &mut outcome.stats;
        stats.analyzed = outcome.reports.len();
        stats.errored = outcome.reports.iter().filter(|r| r.is_error()).count();
        stats.behind = outcome.reports.iter().filter(|r| r.behind_by > 0).count();
        stats.total_duration_ms = start.elapsed().as_millis() as u64;

        info!(
            duration_ms = stats.total_duration_ms,
            analyzed = stats.analyzed,
            errored = stats.errored,
            "Analysis completed"
        );
        outcome
    }

    async fn bounded<T, Fut>(&self, call: Fut) -> Result<T, ClientError>
    where
        Fut: std::future::Future<Output = Result<T, ClientError>>,
    {
        timeout(self.call_timeout, call)
            .await
            .map_err(|_| ClientError::Timeout {
                secs: self.call_timeout.as_secs(),
            })?
    }
}

/// Presentation order: severity descending, then dependency name ascending
/// (byte-wise, so `"Alpha"` precedes `"alpha"`).
pub fn rank_order(a: &Report, b: &Report) -> Ordering {
    b.severity
        .cmp(&a.severity)
        .then_with(|| a.dependency.name.cmp(&b.dependency.name))
}

pub fn rank_reports(reports: &mut [Report]) {
    reports.sort_by(rank_order);
}

// ============================================================================
// Tests
// ============================================================================
