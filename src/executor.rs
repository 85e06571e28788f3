use crate::analysis::{AnalysisOutcome, AnalysisPipeline};
use crate::model::{Dependency, Report};
use crate::traits::RemoteSource;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{info, instrument};

/// Progress notifications from a background analysis run.
#[derive(Debug)]
pub enum AnalysisEvent {
    /// Dependency `index` (input order) finished.
    Analyzed { index: usize, report: Report },
    /// Terminal event; reports are ranked.
    Finished(AnalysisOutcome),
}

/// Runs analyses on background tasks, one run at a time.
pub struct AnalysisExecutor {
    semaphore: Arc<Semaphore>,
}

impl Default for AnalysisExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisExecutor {
    pub fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
        }
    }

    /// Starts analysing `dependencies` in the background.
    ///
    /// Events arrive on the returned handle without ever waiting for the
    /// consumer. A second run spawned while one is in progress waits for the
    /// first to finish.
    #[instrument(skip(self, pipeline, dependencies), fields(count = dependencies.len()))]
    pub fn spawn<S>(
        &self,
        pipeline: Arc<AnalysisPipeline<S>>,
        dependencies: Vec<Dependency>,
    ) -> AnalysisHandle
    where
        S: RemoteSource + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let semaphore = self.semaphore.clone();
        let stop_flag = stop.clone();

        let task = tokio::spawn(async move {
            // The semaphore is never closed.
            let _permit = semaphore.acquire_owned().await.ok();

            if stop_flag.load(Ordering::SeqCst) {
                let _ = tx.send(AnalysisEvent::Finished(AnalysisOutcome {
                    stopped: true,
                    ..AnalysisOutcome::default()
                }));
                return;
            }

            info!("Starting background analysis");
            let outcome = pipeline
                .run(&dependencies, |index, report| {
                    let delivered = tx
                        .send(AnalysisEvent::Analyzed {
                            index,
                            report: report.clone(),
                        })
                        .is_ok();
                    // Stop is only honoured between dependencies.
                    if !delivered || stop_flag.load(Ordering::SeqCst) {
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                })
                .await;

            let _ = tx.send(AnalysisEvent::Finished(outcome));
        });

        AnalysisHandle {
            events: rx,
            stop,
            task,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Consumer side of a background run.
pub struct AnalysisHandle {
    events: mpsc::UnboundedReceiver<AnalysisEvent>,
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl AnalysisHandle {
    /// Next event, or `None` once the run is over and all events were read.
    pub async fn next_event(&mut self) -> Option<AnalysisEvent> {
        self.events.recv().await
    }

    /// Asks the run to stop after the dependency currently in flight.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// A detachable stop switch, usable while events are being awaited.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.stop.clone())
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Drains remaining events and returns the final outcome, if one was sent.
    pub async fn wait(mut self) -> Option<AnalysisOutcome> {
        while let Some(event) = self.events.recv().await {
            if let AnalysisEvent::Finished(outcome) = event {
                return Some(outcome);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CommitRange, ReleaseRecord, RepoInfo, Severity};
    use crate::traits::ClientError;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;

    // Every repo is one commit behind; compare blocks until released.
    struct GatedSource {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl RemoteSource for GatedSource {
        async fn repository_info(&self, _: &str, _: &str) -> Result<RepoInfo, ClientError> {
            Err(ClientError::RateLimited)
        }

        async fn compare_commits(
            &self,
            _owner: &str,
            repo: &str,
            _base: &str,
            _head: &str,
        ) -> Result<CommitRange, ClientError> {
            self.gate.notified().await;
            if repo == "broken" {
                return Err(ClientError::RateLimited);
            }
            Ok(CommitRange {
                ahead_by: 1,
                commits: Vec::new(),
                html_url: String::new(),
            })
        }

        async fn list_releases(&self, _: &str, _: &str) -> Result<Vec<ReleaseRecord>, ClientError> {
            Ok(Vec::new())
        }
    }

    fn dep(name: &str) -> Dependency {
        Dependency {
            name: name.to_string(),
            owner: "o".to_string(),
            repo: name.to_string(),
            branch: "main".to_string(),
            commit: "c".repeat(40),
        }
    }

    fn pipeline(gate: Arc<Notify>) -> Arc<AnalysisPipeline<GatedSource>> {
        Arc::new(AnalysisPipeline::new(GatedSource { gate }).with_timeout(Duration::from_secs(5)))
    }

    #[tokio::test]
    async fn test_events_stream_then_finish_ranked() {
        let gate = Arc::new(Notify::new());
        let executor = AnalysisExecutor::new();
        let mut handle = executor.spawn(
            pipeline(gate.clone()),
            vec![dep("zeta"), dep("broken"), dep("alpha")],
        );

        for expected in ["zeta", "broken", "alpha"] {
            gate.notify_one();
            match handle.next_event().await {
                Some(AnalysisEvent::Analyzed { report, .. }) => {
                    assert_eq!(report.dependency.name, expected)
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }

        let outcome = handle.wait().await.unwrap();
        let names: Vec<_> = outcome
            .reports
            .iter()
            .map(|r| r.dependency.name.as_str())
            .collect();
        assert_eq!(names, ["alpha", "zeta", "broken"]);
        assert_eq!(outcome.reports[0].severity, Severity::Feature);
        assert!(outcome.reports[2].is_error());
        assert!(!outcome.stopped);
    }

    #[tokio::test]
    async fn test_stop_is_honoured_between_dependencies() {
        let gate = Arc::new(Notify::new());
        let executor = AnalysisExecutor::new();
        let mut handle = executor.spawn(pipeline(gate.clone()), vec![dep("one"), dep("two")]);

        // Let the worker reach the first compare, then request stop while it is in flight.
        tokio::task::yield_now().await;
        handle.stop();
        gate.notify_one();

        match handle.next_event().await {
            Some(AnalysisEvent::Analyzed { index, report }) => {
                assert_eq!(index, 0);
                assert!(!report.is_error());
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let outcome = handle.wait().await.unwrap();
        assert!(outcome.stopped);
        assert_eq!(outcome.reports.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_input_finishes_immediately() {
        let executor = AnalysisExecutor::default();
        let handle = executor.spawn(pipeline(Arc::new(Notify::new())), Vec::new());
        let outcome = handle.wait().await.unwrap();
        assert!(outcome.reports.is_empty());
        assert_eq!(outcome.stats.analyzed, 0);
    }
}
