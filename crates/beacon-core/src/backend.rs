use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::AnalysisError;
use crate::job::{AnalysisJob, JobRecord, JobStatus, QueueStats};
use crate::result::AnalysisResult;

/// Pluggable persistence/execution strategy for analysis jobs.
///
/// The backend owns its [`JobRecord`]s exclusively; no other component
/// mutates one directly.
pub trait QueueBackend: Send + Sync + Clone {
    /// Persist a job and return its id. Never blocks on execution.
    fn submit(&self, job: AnalysisJob) -> impl Future<Output = Result<String, AnalysisError>> + Send;

    /// Returns `None` for unknown or expired ids.
    fn read(&self, id: &str) -> impl Future<Output = Result<Option<JobRecord>, AnalysisError>> + Send;

    fn list(
        &self,
        status: Option<JobStatus>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<JobRecord>, AnalysisError>> + Send;

    fn remove(&self, id: &str) -> impl Future<Output = Result<(), AnalysisError>> + Send;

    fn stats(&self) -> impl Future<Output = Result<QueueStats, AnalysisError>> + Send;

    /// Remove terminal records older than `max_age`. Returns the count removed.
    fn cleanup(&self, max_age: Duration) -> impl Future<Output = Result<u64, AnalysisError>> + Send;
}

/// A claimed job handed to a worker.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: String,
    pub job: AnalysisJob,
    /// Number of previous failed attempts.
    pub attempt: u32,
    pub max_retries: u32,
}

impl ClaimedJob {
    pub fn can_retry(&self) -> bool {
        self.attempt < self.max_retries
    }
}

/// Worker-side operations of a durable multi-worker backend.
///
/// Implementations must support atomic claiming (`FOR UPDATE SKIP LOCKED`
/// or equivalent) so concurrent workers never claim the same job, and must
/// tolerate at-least-once delivery: completing the same job twice writes an
/// identical terminal record.
pub trait WorkerQueue: QueueBackend {
    /// Atomically claim the next eligible job, ordered by priority weight
    /// then age. Returns `None` when no jobs are available.
    fn claim(
        &self,
        worker_id: &str,
    ) -> impl Future<Output = Result<Option<ClaimedJob>, AnalysisError>> + Send;

    /// Mark a job completed at the queue level and attach its result.
    ///
    /// Queue-mechanics success is independent of analysis success: the
    /// attached result may carry `status = Failed`.
    fn complete(
        &self,
        id: &str,
        result: &AnalysisResult,
    ) -> impl Future<Output = Result<(), AnalysisError>> + Send;

    /// Mark a job failed. With `next_retry_at` set, the job re-enters
    /// `waiting` for a later attempt; otherwise it is terminally `failed`.
    fn fail(
        &self,
        id: &str,
        error: &str,
        next_retry_at: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<(), AnalysisError>> + Send;

    /// Release all jobs held by a worker (graceful shutdown). Returns the
    /// count released back to `waiting`.
    fn release_worker(
        &self,
        worker_id: &str,
    ) -> impl Future<Output = Result<u64, AnalysisError>> + Send;
}
