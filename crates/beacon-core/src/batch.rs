//! Bounded-concurrency driver for multi-URL analysis requests.

use std::time::Duration;

use futures::future::join_all;

use crate::job::AnalysisJob;
use crate::pipeline::NullPipelineReporter;
use crate::result::{AnalysisResult, AnalysisStatus};
use crate::traits::AnalysisRunner;

#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Chunk size: how many URLs run concurrently.
    pub concurrency: usize,
    /// Pause between chunks to avoid overloading the pipeline.
    pub pause_between_chunks: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            pause_between_chunks: Duration::from_millis(500),
        }
    }
}

/// Incremental progress published after every chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
    /// URLs processed in the chunk that just finished.
    pub current_chunk: Vec<String>,
    /// Running list of failed URLs with their errors.
    pub errors: Vec<String>,
}

/// Receives incremental batch progress.
pub trait BatchObserver: Send + Sync {
    fn on_progress(&self, progress: &BatchProgress) {
        let _ = progress;
    }
}

/// Observer that discards progress updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBatchObserver;

impl BatchObserver for NullBatchObserver {}

/// Observer that logs progress via `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingBatchObserver;

impl BatchObserver for TracingBatchObserver {
    fn on_progress(&self, progress: &BatchProgress) {
        tracing::info!(
            completed = progress.completed,
            total = progress.total,
            errors = progress.errors.len(),
            "Batch progress"
        );
    }
}

/// Aggregate outcome of one batch run.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// One result per input URL, in input order.
    pub results: Vec<AnalysisResult>,
    pub completed: usize,
    pub failed: usize,
}

/// Drives many jobs through the pipeline with bounded concurrency and
/// per-item failure isolation: one URL's failure never aborts the batch.
#[derive(Clone)]
pub struct BatchCoordinator<R: AnalysisRunner> {
    runner: R,
    config: BatchConfig,
}

impl<R: AnalysisRunner> BatchCoordinator<R> {
    pub fn new(runner: R, config: BatchConfig) -> Self {
        Self { runner, config }
    }

    /// Analyze every URL, awaiting each chunk fully before starting the next.
    pub async fn run<O: BatchObserver>(&self, urls: &[String], observer: &O) -> BatchReport {
        let total = urls.len();
        let concurrency = self.config.concurrency.max(1);

        let mut results: Vec<AnalysisResult> = Vec::with_capacity(total);
        let mut errors: Vec<String> = Vec::new();

        for (index, chunk) in urls.chunks(concurrency).enumerate() {
            let futures = chunk.iter().map(|url| {
                let job = AnalysisJob::new(url.clone());
                async move { self.runner.analyze(&job, &NullPipelineReporter).await }
            });
            let chunk_results = join_all(futures).await;

            for result in &chunk_results {
                if result.status == AnalysisStatus::Failed {
                    let reason = result.error.as_deref().unwrap_or("unknown error");
                    errors.push(format!("{}: {}", result.url, reason));
                }
            }
            results.extend(chunk_results);

            observer.on_progress(&BatchProgress {
                completed: results.len(),
                total,
                current_chunk: chunk.to_vec(),
                errors: errors.clone(),
            });

            // Breather between chunks, skipped after the final one.
            let more_chunks = (index + 1) * concurrency < total;
            if more_chunks && !self.config.pause_between_chunks.is_zero() {
                tokio::time::sleep(self.config.pause_between_chunks).await;
            }
        }

        let failed = errors.len();
        BatchReport {
            completed: results.len() - failed,
            failed,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::testutil::ScriptedRunner;

    /// Observer that records every progress snapshot.
    #[derive(Default, Clone)]
    struct RecordingObserver {
        snapshots: Arc<Mutex<Vec<BatchProgress>>>,
    }

    impl BatchObserver for RecordingObserver {
        fn on_progress(&self, progress: &BatchProgress) {
            self.snapshots.lock().unwrap().push(progress.clone());
        }
    }

    fn urls(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn fast_config(concurrency: usize) -> BatchConfig {
        BatchConfig {
            concurrency,
            pause_between_chunks: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn one_failure_never_aborts_the_batch() {
        let runner = ScriptedRunner::failing_for(&["https://b.invalid"]);
        let coordinator = BatchCoordinator::new(runner, fast_config(2));

        let report = coordinator
            .run(
                &urls(&["https://a.com", "https://b.invalid", "https://c.com"]),
                &NullBatchObserver,
            )
            .await;

        assert_eq!(report.results.len(), 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.completed, 2);
        // The failed entry still carries a fallback score.
        let failed = report
            .results
            .iter()
            .find(|r| r.status == AnalysisStatus::Failed)
            .unwrap();
        assert_eq!(failed.url, "https://b.invalid");
        assert!(failed.authority_score.overall > 0);
    }

    #[tokio::test]
    async fn chunks_run_in_waves() {
        let runner = ScriptedRunner::succeeding();
        let coordinator = BatchCoordinator::new(runner.clone(), fast_config(2));
        let observer = RecordingObserver::default();

        coordinator
            .run(&urls(&["a.com", "b.com", "c.com"]), &observer)
            .await;

        // Wave one finishes (a.com, b.com) before c.com starts.
        let snapshots = observer.snapshots.lock().unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].completed, 2);
        assert_eq!(snapshots[0].current_chunk, urls(&["a.com", "b.com"]));
        assert_eq!(snapshots[1].completed, 3);
        assert_eq!(snapshots[1].current_chunk, urls(&["c.com"]));

        // The runner saw c.com only after the first wave completed.
        let order = runner.call_order();
        assert_eq!(order.len(), 3);
        assert_eq!(order[2], "c.com");
    }

    #[tokio::test]
    async fn progress_accumulates_errors() {
        let runner = ScriptedRunner::failing_for(&["b.com", "d.com"]);
        let coordinator = BatchCoordinator::new(runner, fast_config(2));
        let observer = RecordingObserver::default();

        coordinator
            .run(&urls(&["a.com", "b.com", "c.com", "d.com"]), &observer)
            .await;

        let snapshots = observer.snapshots.lock().unwrap();
        assert_eq!(snapshots[0].errors.len(), 1);
        assert_eq!(snapshots[1].errors.len(), 2);
        assert!(snapshots[1].errors[1].starts_with("d.com:"));
    }

    #[tokio::test]
    async fn empty_input_produces_empty_report() {
        let coordinator = BatchCoordinator::new(ScriptedRunner::succeeding(), fast_config(2));
        let report = coordinator.run(&[], &NullBatchObserver).await;
        assert!(report.results.is_empty());
        assert_eq!(report.completed, 0);
        assert_eq!(report.failed, 0);
    }

    #[tokio::test]
    async fn results_preserve_input_order() {
        let coordinator = BatchCoordinator::new(ScriptedRunner::succeeding(), fast_config(2));
        let input = urls(&["a.com", "b.com", "c.com", "d.com", "e.com"]);
        let report = coordinator.run(&input, &NullBatchObserver).await;
        let output: Vec<_> = report.results.iter().map(|r| r.url.clone()).collect();
        assert_eq!(output, input);
    }
}
