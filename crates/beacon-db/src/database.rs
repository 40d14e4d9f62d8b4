use std::time::Duration;

use beacon_core::AnalysisError;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::DatabaseConfig;
use crate::queue_backend::PgQueueBackend;

/// How long the startup probe waits before declaring the backend unavailable.
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Central database facade — owns the connection pool, runs migrations,
/// and vends the queue backend.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL and probe the connection.
    ///
    /// The probe is bounded so a dead database fails fast instead of hanging
    /// startup; the caller can then fall back to the local backend.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AnalysisError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(PROBE_TIMEOUT)
            .connect(&config.url)
            .await
            .map_err(|e| AnalysisError::BackendUnavailable(format!("Failed to connect: {e}")))?;

        let probe = sqlx::query("SELECT 1").execute(&pool);
        tokio::time::timeout(PROBE_TIMEOUT, probe)
            .await
            .map_err(|_| {
                AnalysisError::BackendUnavailable(format!(
                    "Probe timed out after {}s",
                    PROBE_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| AnalysisError::BackendUnavailable(format!("Probe failed: {e}")))?;

        Ok(Self { pool })
    }

    /// Create a `Database` from an existing pool (useful for testing).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<(), AnalysisError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AnalysisError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Get a [`PgQueueBackend`] backed by this pool.
    pub fn queue_backend(&self) -> PgQueueBackend {
        PgQueueBackend::new(self.pool.clone())
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
