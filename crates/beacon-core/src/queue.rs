//! Public submission/status/stats surface over the active backend.

use std::time::Duration;

use crate::backend::QueueBackend;
use crate::error::AnalysisError;
use crate::job::{AnalysisJob, JobRecord, QueueStats};

/// Which backend the factory resolved to at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Distributed,
    Local,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Distributed => "distributed",
            BackendKind::Local => "local",
        }
    }
}

/// Job queue facade.
///
/// Holds a concrete backend resolved once at process startup — there is no
/// per-call backend dispatch and no later re-upgrade attempt. Everything
/// upstream (CLI, batch callers, dashboards) talks to this surface only.
#[derive(Clone)]
pub struct JobQueue<B: QueueBackend> {
    backend: B,
    kind: BackendKind,
}

impl<B: QueueBackend> JobQueue<B> {
    pub fn new(backend: B, kind: BackendKind) -> Self {
        Self { backend, kind }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.kind
    }

    /// Submit a job for analysis. Returns the job id immediately; execution
    /// happens asynchronously in the backend.
    pub async fn enqueue(&self, job: AnalysisJob) -> Result<String, AnalysisError> {
        let url = job.url.clone();
        let id = self.backend.submit(job).await?;
        tracing::info!(%id, %url, backend = self.kind.as_str(), "Job enqueued");
        Ok(id)
    }

    /// Queue-tracked state of a job; `None` for unknown or expired ids.
    pub async fn status(&self, id: &str) -> Result<Option<JobRecord>, AnalysisError> {
        self.backend.read(id).await
    }

    pub async fn stats(&self) -> Result<QueueStats, AnalysisError> {
        self.backend.stats().await
    }

    /// Remove terminal records older than `max_age`.
    pub async fn cleanup(&self, max_age: Duration) -> Result<u64, AnalysisError> {
        let removed = self.backend.cleanup(max_age).await?;
        if removed > 0 {
            tracing::info!(%removed, "Cleaned up terminal job records");
        }
        Ok(removed)
    }
}
