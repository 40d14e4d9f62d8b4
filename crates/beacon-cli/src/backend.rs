//! Backend selection: distributed when PostgreSQL answers, local otherwise.
//!
//! The choice is made once at startup and never revisited — a process that
//! came up on the local backend stays on it until restart.

use std::time::Duration;

use beacon_client::{CommentaryClient, FeatureExtractor, HttpRenderer};
use beacon_core::backend::QueueBackend;
use beacon_core::error::AnalysisError;
use beacon_core::job::{AnalysisJob, JobRecord, JobStatus, QueueStats};
use beacon_core::local_backend::{LocalBackend, LocalBackendConfig};
use beacon_core::pipeline::AnalysisPipeline;
use beacon_core::queue::BackendKind;
use beacon_db::{Database, DatabaseConfig, PgQueueBackend};

/// The production pipeline: HTTP renderer, full extraction, commentary when
/// configured.
pub type LivePipeline = AnalysisPipeline<FeatureExtractor<HttpRenderer>, CommentaryClient>;

/// Build the live pipeline from the environment.
pub fn live_pipeline() -> anyhow::Result<LivePipeline> {
    let renderer = HttpRenderer::new().map_err(|e| anyhow::anyhow!(e))?;
    let commentary = CommentaryClient::from_env().map_err(|e| anyhow::anyhow!(e))?;
    if !commentary.is_enabled() {
        tracing::info!("No commentary service configured; scores stay deterministic");
    }
    Ok(AnalysisPipeline::new(FeatureExtractor::new(renderer), commentary))
}

/// The queue backend this process resolved to at startup.
#[derive(Clone)]
pub enum ActiveBackend {
    Distributed(PgQueueBackend),
    Local(LocalBackend<LivePipeline>),
}

impl QueueBackend for ActiveBackend {
    async fn submit(&self, job: AnalysisJob) -> Result<String, AnalysisError> {
        match self {
            ActiveBackend::Distributed(backend) => backend.submit(job).await,
            ActiveBackend::Local(backend) => backend.submit(job).await,
        }
    }

    async fn read(&self, id: &str) -> Result<Option<JobRecord>, AnalysisError> {
        match self {
            ActiveBackend::Distributed(backend) => backend.read(id).await,
            ActiveBackend::Local(backend) => backend.read(id).await,
        }
    }

    async fn list(
        &self,
        status: Option<JobStatus>,
        limit: usize,
    ) -> Result<Vec<JobRecord>, AnalysisError> {
        match self {
            ActiveBackend::Distributed(backend) => backend.list(status, limit).await,
            ActiveBackend::Local(backend) => backend.list(status, limit).await,
        }
    }

    async fn remove(&self, id: &str) -> Result<(), AnalysisError> {
        match self {
            ActiveBackend::Distributed(backend) => backend.remove(id).await,
            ActiveBackend::Local(backend) => backend.remove(id).await,
        }
    }

    async fn stats(&self) -> Result<QueueStats, AnalysisError> {
        match self {
            ActiveBackend::Distributed(backend) => backend.stats().await,
            ActiveBackend::Local(backend) => backend.stats().await,
        }
    }

    async fn cleanup(&self, max_age: Duration) -> Result<u64, AnalysisError> {
        match self {
            ActiveBackend::Distributed(backend) => backend.cleanup(max_age).await,
            ActiveBackend::Local(backend) => backend.cleanup(max_age).await,
        }
    }
}

/// Resolve the backend once: PostgreSQL when reachable, otherwise the
/// in-process local backend running the same pipeline.
pub async fn select_backend(pipeline: LivePipeline) -> (ActiveBackend, BackendKind) {
    match connect_distributed().await {
        Ok(backend) => {
            tracing::info!("Using distributed queue backend");
            (ActiveBackend::Distributed(backend), BackendKind::Distributed)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Distributed backend unavailable, falling back to local");
            let backend = LocalBackend::new(pipeline, LocalBackendConfig::default());
            (ActiveBackend::Local(backend), BackendKind::Local)
        }
    }
}

async fn connect_distributed() -> Result<PgQueueBackend, AnalysisError> {
    let config = DatabaseConfig::from_env()?;
    let db = Database::connect(&config).await?;
    db.migrate().await?;
    Ok(db.queue_backend())
}
