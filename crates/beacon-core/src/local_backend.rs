//! Single-process, in-memory queue backend.
//!
//! Used when the distributed backend is unreachable at startup. Submission
//! schedules execution on a short deferred timer, decoupling the caller from
//! execution timing without real parallelism. No retry: a live-analysis
//! failure degrades to the fallback result in a single attempt, captured
//! verbatim.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;

use crate::backend::QueueBackend;
use crate::error::AnalysisError;
use crate::job::{AnalysisJob, JobRecord, JobStatus, QueueStats};
use crate::pipeline::{PipelineEvent, PipelineReporter};
use crate::result::AnalysisResult;
use crate::traits::AnalysisRunner;

/// Local records are retained for one hour — shorter than the distributed
/// backend's retention, since this path is assumed constrained.
const LOCAL_RETENTION: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
pub struct LocalBackendConfig {
    /// Deferred-execution timer applied to every submission.
    pub defer: Duration,
}

impl Default for LocalBackendConfig {
    fn default() -> Self {
        Self {
            defer: Duration::from_millis(100),
        }
    }
}

/// Explicitly owned in-memory store, keyed by an incrementing counter.
#[derive(Debug, Default)]
struct LocalStore {
    next_id: u64,
    records: HashMap<u64, JobRecord>,
}

impl LocalStore {
    /// Apply an update unless the record is already terminal — terminal
    /// records never change again.
    fn update(&mut self, key: u64, apply: impl FnOnce(&mut JobRecord)) {
        if let Some(record) = self.records.get_mut(&key) {
            if !record.status.is_terminal() {
                apply(record);
            }
        }
    }
}

fn parse_local_id(id: &str) -> Option<u64> {
    id.strip_prefix("local-")?.parse().ok()
}

/// Single-process in-memory backend with deferred execution.
///
/// The store is owned by this value and shared only with the execution
/// tasks it spawns — never a module-level singleton.
#[derive(Clone)]
pub struct LocalBackend<R: AnalysisRunner> {
    store: Arc<Mutex<LocalStore>>,
    runner: R,
    config: LocalBackendConfig,
}

impl<R: AnalysisRunner> LocalBackend<R> {
    pub fn new(runner: R, config: LocalBackendConfig) -> Self {
        Self {
            store: Arc::new(Mutex::new(LocalStore::default())),
            runner,
            config,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LocalStore> {
        // Poisoning only happens if an execution task panicked while holding
        // the lock; the records themselves stay usable.
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Maps pipeline events onto a record's progress field.
struct ProgressReporter {
    store: Arc<Mutex<LocalStore>>,
    key: u64,
}

impl ProgressReporter {
    fn set(&self, progress: u8) {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        store.update(self.key, |record| record.progress = progress);
    }
}

impl PipelineReporter for ProgressReporter {
    fn report(&self, event: PipelineEvent<'_>) {
        match event {
            PipelineEvent::Started { .. } => self.set(10),
            PipelineEvent::SnapshotReady { .. } => self.set(60),
            PipelineEvent::Scored { .. } => self.set(90),
            PipelineEvent::Finished { .. } => {}
        }
    }
}

impl<R: AnalysisRunner> LocalBackend<R> {
    /// Deferred execution of one submitted job.
    async fn execute(store: Arc<Mutex<LocalStore>>, runner: R, key: u64, delay: Duration) {
        tokio::time::sleep(delay).await;

        let job = {
            let mut guard = store.lock().unwrap_or_else(|e| e.into_inner());
            let job = match guard.records.get(&key) {
                Some(record) => record.job.clone(),
                // Removed before execution started.
                None => return,
            };
            guard.update(key, |record| {
                record.status = JobStatus::Active;
                record.attempt = 1;
            });
            job
        };

        let reporter = ProgressReporter {
            store: Arc::clone(&store),
            key,
        };
        // Never fails: live failures degrade through the fallback scorer.
        let result = runner.analyze(&job, &reporter).await;
        record_outcome(&store, key, result);
    }
}

fn record_outcome(store: &Arc<Mutex<LocalStore>>, key: u64, result: AnalysisResult) {
    let mut guard = store.lock().unwrap_or_else(|e| e.into_inner());
    guard.update(key, |record| {
        // Queue-level success is independent of analysis success: a degraded
        // result still completes the job.
        record.status = JobStatus::Completed;
        record.progress = 100;
        record.processed_at = Some(Utc::now());
        record.failure_reason = result.error.clone();
        record.result = Some(result);
    });
}

impl<R: AnalysisRunner> QueueBackend for LocalBackend<R> {
    async fn submit(&self, job: AnalysisJob) -> Result<String, AnalysisError> {
        let delay = self.config.defer + job.priority.submit_delay();
        let (key, id) = {
            let mut store = self.lock();
            store.next_id += 1;
            let key = store.next_id;
            let id = format!("local-{key}");
            // No retry on this path.
            store.records.insert(key, JobRecord::new(&id, job, 0));
            (key, id)
        };

        let store = Arc::clone(&self.store);
        let runner = self.runner.clone();
        tokio::spawn(Self::execute(store, runner, key, delay));

        Ok(id)
    }

    async fn read(&self, id: &str) -> Result<Option<JobRecord>, AnalysisError> {
        let Some(key) = parse_local_id(id) else {
            return Ok(None);
        };
        Ok(self.lock().records.get(&key).cloned())
    }

    async fn list(
        &self,
        status: Option<JobStatus>,
        limit: usize,
    ) -> Result<Vec<JobRecord>, AnalysisError> {
        let store = self.lock();
        let mut records: Vec<_> = store
            .records
            .values()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        records.sort_by_key(|r| r.created_at);
        records.truncate(limit);
        Ok(records)
    }

    async fn remove(&self, id: &str) -> Result<(), AnalysisError> {
        if let Some(key) = parse_local_id(id) {
            self.lock().records.remove(&key);
        }
        Ok(())
    }

    async fn stats(&self) -> Result<QueueStats, AnalysisError> {
        let store = self.lock();
        let mut stats = QueueStats::default();
        for record in store.records.values() {
            match record.status {
                JobStatus::Waiting => stats.waiting += 1,
                JobStatus::Active => stats.active += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
            stats.total += 1;
        }
        Ok(stats)
    }

    async fn cleanup(&self, max_age: Duration) -> Result<u64, AnalysisError> {
        // The local path caps retention at one hour regardless of the caller.
        let max_age = max_age.min(LOCAL_RETENTION);
        let cutoff = Utc::now()
            - chrono::TimeDelta::from_std(max_age)
                .unwrap_or_else(|_| chrono::TimeDelta::seconds(3600));

        let mut store = self.lock();
        let before = store.records.len();
        store.records.retain(|_, record| {
            !(record.status.is_terminal()
                && record.processed_at.map(|t| t < cutoff).unwrap_or(false))
        });
        Ok((before - store.records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::AnalysisStatus;
    use crate::testutil::{MockRunner, make_failed_result, make_live_result};

    fn fast_backend(runner: MockRunner) -> LocalBackend<MockRunner> {
        LocalBackend::new(
            runner,
            LocalBackendConfig {
                defer: Duration::from_millis(5),
            },
        )
    }

    async fn wait_terminal(backend: &LocalBackend<MockRunner>, id: &str) -> JobRecord {
        for _ in 0..200 {
            if let Some(record) = backend.read(id).await.unwrap() {
                if record.status.is_terminal() {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {id} never reached a terminal state");
    }

    #[tokio::test]
    async fn ids_increment() {
        let backend = fast_backend(MockRunner::new(make_live_result("https://a.com")));
        let a = backend.submit(AnalysisJob::new("https://a.com")).await.unwrap();
        let b = backend.submit(AnalysisJob::new("https://b.com")).await.unwrap();
        assert_eq!(a, "local-1");
        assert_eq!(b, "local-2");
    }

    #[tokio::test]
    async fn deferred_execution_completes_record() {
        let backend = fast_backend(MockRunner::new(make_live_result("https://a.com")));
        let id = backend.submit(AnalysisJob::new("https://a.com")).await.unwrap();

        let record = wait_terminal(&backend, &id).await;
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.progress, 100);
        assert!(record.processed_at.is_some());
        assert_eq!(
            record.result.unwrap().status,
            AnalysisStatus::Completed
        );
    }

    #[tokio::test]
    async fn failed_analysis_still_completes_at_queue_level() {
        let backend = fast_backend(MockRunner::new(make_failed_result(
            "https://down.example.com",
            "connection refused",
        )));
        let id = backend
            .submit(AnalysisJob::new("https://down.example.com"))
            .await
            .unwrap();

        let record = wait_terminal(&backend, &id).await;
        // Queue mechanics succeeded; the analysis itself is the failure.
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.failure_reason.as_deref(), Some("connection refused"));
        let result = record.result.unwrap();
        assert_eq!(result.status, AnalysisStatus::Failed);
        assert!(result.authority_score.overall > 0);
    }

    #[tokio::test]
    async fn terminal_records_never_revert() {
        let backend = fast_backend(MockRunner::new(make_live_result("https://a.com")));
        let id = backend.submit(AnalysisJob::new("https://a.com")).await.unwrap();
        let record = wait_terminal(&backend, &id).await;
        assert_eq!(record.status, JobStatus::Completed);

        // A late update attempt must be a no-op.
        let key = parse_local_id(&id).unwrap();
        {
            let mut store = backend.store.lock().unwrap();
            store.update(key, |r| r.status = JobStatus::Waiting);
        }
        let after = backend.read(&id).await.unwrap().unwrap();
        assert_eq!(after.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn remove_before_execution_cancels_nothing_loudly() {
        let backend = LocalBackend::new(
            MockRunner::new(make_live_result("https://a.com")),
            LocalBackendConfig {
                defer: Duration::from_millis(50),
            },
        );
        let id = backend.submit(AnalysisJob::new("https://a.com")).await.unwrap();
        backend.remove(&id).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(backend.read(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cleanup_removes_old_terminal_records() {
        let backend = fast_backend(MockRunner::new(make_live_result("https://a.com")));
        let id = backend.submit(AnalysisJob::new("https://a.com")).await.unwrap();
        wait_terminal(&backend, &id).await;

        // Backdate the record past the cutoff.
        {
            let mut store = backend.store.lock().unwrap();
            let key = parse_local_id(&id).unwrap();
            if let Some(record) = store.records.get_mut(&key) {
                record.processed_at = Some(Utc::now() - chrono::TimeDelta::hours(2));
            }
        }

        let removed = backend.cleanup(Duration::from_secs(3600)).await.unwrap();
        assert_eq!(removed, 1);
        assert!(backend.read(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cleanup_keeps_recent_and_in_flight_records() {
        let backend = fast_backend(MockRunner::new(make_live_result("https://a.com")));
        let id = backend.submit(AnalysisJob::new("https://a.com")).await.unwrap();
        wait_terminal(&backend, &id).await;

        let removed = backend.cleanup(Duration::from_secs(3600)).await.unwrap();
        assert_eq!(removed, 0);
        assert!(backend.read(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn malformed_id_reads_as_not_found() {
        let backend = fast_backend(MockRunner::new(make_live_result("https://a.com")));
        assert!(backend.read("not-a-local-id").await.unwrap().is_none());
        assert!(backend.read("local-abc").await.unwrap().is_none());
    }
}
