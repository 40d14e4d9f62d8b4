use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use beacon_core::backend::{ClaimedJob, QueueBackend, WorkerQueue};
use beacon_core::error::AnalysisError;
use beacon_core::job::{AnalysisJob, JobRecord, JobStatus, Priority, QueueStats};
use beacon_core::result::AnalysisResult;

/// Default retry budget for jobs on the distributed backend.
const DEFAULT_MAX_RETRIES: i32 = 3;

/// Completed/failed records kept around for status lookups; older ones are
/// pruned opportunistically when new jobs finish.
const TERMINAL_RETENTION_CAP: i64 = 500;

/// PostgreSQL-backed job queue using `SELECT FOR UPDATE SKIP LOCKED`.
///
/// Claims are atomic: concurrent workers on the same table never pick up the
/// same job. Crash recovery relies on [`WorkerQueue::release_worker`] plus
/// at-least-once semantics — a job that is claimed twice ends in the same
/// terminal record either way.
#[derive(Clone)]
pub struct PgQueueBackend {
    pool: Pool<Postgres>,
    retention_cap: i64,
}

impl PgQueueBackend {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            retention_cap: TERMINAL_RETENTION_CAP,
        }
    }

    /// Override the terminal retention cap.
    pub fn with_retention_cap(mut self, cap: i64) -> Self {
        self.retention_cap = cap;
        self
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct AnalysisJobRow {
    id: Uuid,
    url: String,
    user_id: Option<String>,
    priority: i16,
    options: serde_json::Value,
    status: String,
    progress: i16,
    result: Option<serde_json::Value>,
    failure_reason: Option<String>,
    attempt: i32,
    max_retries: i32,
    created_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

impl From<AnalysisJobRow> for JobRecord {
    fn from(row: AnalysisJobRow) -> Self {
        let result = row.result.and_then(|value| {
            serde_json::from_value::<AnalysisResult>(value)
                .map_err(|e| tracing::warn!(id = %row.id, error = %e, "Unreadable stored result"))
                .ok()
        });

        JobRecord {
            id: row.id.to_string(),
            job: AnalysisJob {
                url: row.url,
                user_id: row.user_id,
                priority: Priority::from_weight(row.priority),
                options: serde_json::from_value(row.options).unwrap_or_default(),
            },
            status: row.status.parse().unwrap_or(JobStatus::Waiting),
            progress: row.progress.clamp(0, 100) as u8,
            result,
            created_at: row.created_at,
            processed_at: row.processed_at,
            failure_reason: row.failure_reason,
            attempt: row.attempt as u32,
            max_retries: row.max_retries as u32,
        }
    }
}

fn parse_id(id: &str) -> Option<Uuid> {
    Uuid::parse_str(id).ok()
}

impl QueueBackend for PgQueueBackend {
    async fn submit(&self, job: AnalysisJob) -> Result<String, AnalysisError> {
        let scheduled_at = Utc::now()
            + chrono::Duration::from_std(job.priority.submit_delay())
                .unwrap_or_else(|_| chrono::Duration::zero());
        let options = serde_json::to_value(job.options)?;

        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO analysis_jobs (url, user_id, priority, options, max_retries, scheduled_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&job.url)
        .bind(&job.user_id)
        .bind(job.priority.weight())
        .bind(&options)
        .bind(DEFAULT_MAX_RETRIES)
        .bind(scheduled_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AnalysisError::Database(e.to_string()))?;

        Ok(id.to_string())
    }

    async fn read(&self, id: &str) -> Result<Option<JobRecord>, AnalysisError> {
        let Some(uuid) = parse_id(id) else {
            return Ok(None);
        };

        let row =
            sqlx::query_as::<_, AnalysisJobRow>(r#"SELECT * FROM analysis_jobs WHERE id = $1"#)
                .bind(uuid)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AnalysisError::Database(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    async fn list(
        &self,
        status: Option<JobStatus>,
        limit: usize,
    ) -> Result<Vec<JobRecord>, AnalysisError> {
        let rows = if let Some(status) = status {
            sqlx::query_as::<_, AnalysisJobRow>(
                r#"
                SELECT * FROM analysis_jobs
                WHERE status = $1
                ORDER BY created_at DESC
                LIMIT $2
                "#,
            )
            .bind(status.as_str())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, AnalysisJobRow>(
                r#"
                SELECT * FROM analysis_jobs
                ORDER BY created_at DESC
                LIMIT $1
                "#,
            )
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| AnalysisError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn remove(&self, id: &str) -> Result<(), AnalysisError> {
        let Some(uuid) = parse_id(id) else {
            return Ok(());
        };

        sqlx::query(r#"DELETE FROM analysis_jobs WHERE id = $1 AND status != 'active'"#)
            .bind(uuid)
            .execute(&self.pool)
            .await
            .map_err(|e| AnalysisError::Database(e.to_string()))?;

        Ok(())
    }

    async fn stats(&self) -> Result<QueueStats, AnalysisError> {
        let (waiting, active, completed, failed, total): (i64, i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*) FILTER (WHERE status = 'waiting'),
                    COUNT(*) FILTER (WHERE status = 'active'),
                    COUNT(*) FILTER (WHERE status = 'completed'),
                    COUNT(*) FILTER (WHERE status = 'failed'),
                    COUNT(*)
                FROM analysis_jobs
                "#,
            )
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AnalysisError::Database(e.to_string()))?;

        Ok(QueueStats {
            waiting: waiting as u64,
            active: active as u64,
            completed: completed as u64,
            failed: failed as u64,
            total: total as u64,
        })
    }

    async fn cleanup(&self, max_age: Duration) -> Result<u64, AnalysisError> {
        let result = sqlx::query(
            r#"
            DELETE FROM analysis_jobs
            WHERE status IN ('completed', 'failed')
              AND processed_at < NOW() - make_interval(secs => $1)
            "#,
        )
        .bind(max_age.as_secs_f64())
        .execute(&self.pool)
        .await
        .map_err(|e| AnalysisError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

impl WorkerQueue for PgQueueBackend {
    async fn claim(&self, worker_id: &str) -> Result<Option<ClaimedJob>, AnalysisError> {
        let row = sqlx::query_as::<_, AnalysisJobRow>(
            r#"
            UPDATE analysis_jobs
            SET status = 'active', worker_id = $1, updated_at = NOW()
            WHERE id = (
                SELECT id FROM analysis_jobs
                WHERE status = 'waiting'
                  AND scheduled_at <= NOW()
                  AND (next_retry_at IS NULL OR next_retry_at <= NOW())
                ORDER BY priority ASC, created_at ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AnalysisError::Database(e.to_string()))?;

        Ok(row.map(|row| {
            let record: JobRecord = row.into();
            ClaimedJob {
                id: record.id,
                job: record.job,
                attempt: record.attempt,
                max_retries: record.max_retries,
            }
        }))
    }

    async fn complete(&self, id: &str, result: &AnalysisResult) -> Result<(), AnalysisError> {
        let Some(uuid) = parse_id(id) else {
            return Err(AnalysisError::Database(format!("Invalid job id: {id}")));
        };
        let result_json = serde_json::to_value(result)?;

        // Terminal records never change again; re-completing is a no-op.
        sqlx::query(
            r#"
            UPDATE analysis_jobs
            SET status = 'completed', progress = 100, processed_at = NOW(),
                updated_at = NOW(), result = $2, failure_reason = $3, worker_id = NULL
            WHERE id = $1 AND status NOT IN ('completed', 'failed')
            "#,
        )
        .bind(uuid)
        .bind(&result_json)
        .bind(&result.error)
        .execute(&self.pool)
        .await
        .map_err(|e| AnalysisError::Database(e.to_string()))?;

        self.prune_terminal().await?;
        Ok(())
    }

    async fn fail(
        &self,
        id: &str,
        error: &str,
        next_retry_at: Option<DateTime<Utc>>,
    ) -> Result<(), AnalysisError> {
        let Some(uuid) = parse_id(id) else {
            return Err(AnalysisError::Database(format!("Invalid job id: {id}")));
        };

        // With a retry timestamp the job re-enters the waiting state;
        // without one it turns permanently failed.
        sqlx::query(
            r#"
            UPDATE analysis_jobs
            SET
                status = CASE WHEN $3::timestamptz IS NOT NULL THEN 'waiting' ELSE 'failed' END,
                attempt = CASE WHEN $3::timestamptz IS NOT NULL THEN attempt + 1 ELSE attempt END,
                processed_at = CASE WHEN $3::timestamptz IS NOT NULL THEN NULL ELSE NOW() END,
                next_retry_at = $3,
                failure_reason = $2,
                updated_at = NOW(),
                worker_id = NULL
            WHERE id = $1 AND status NOT IN ('completed', 'failed')
            "#,
        )
        .bind(uuid)
        .bind(error)
        .bind(next_retry_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AnalysisError::Database(e.to_string()))?;

        // A terminal failure counts against the retention cap just like a
        // completion does.
        if next_retry_at.is_none() {
            self.prune_terminal().await?;
        }
        Ok(())
    }

    async fn release_worker(&self, worker_id: &str) -> Result<u64, AnalysisError> {
        let result = sqlx::query(
            r#"
            UPDATE analysis_jobs
            SET status = 'waiting', worker_id = NULL, updated_at = NOW()
            WHERE worker_id = $1 AND status = 'active'
            "#,
        )
        .bind(worker_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AnalysisError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

impl PgQueueBackend {
    /// Keep the newest `retention_cap` terminal records and delete the rest.
    async fn prune_terminal(&self) -> Result<(), AnalysisError> {
        let result = sqlx::query(
            r#"
            DELETE FROM analysis_jobs
            WHERE status IN ('completed', 'failed')
              AND id NOT IN (
                SELECT id FROM analysis_jobs
                WHERE status IN ('completed', 'failed')
                ORDER BY processed_at DESC NULLS LAST
                LIMIT $1
              )
            "#,
        )
        .bind(self.retention_cap)
        .execute(&self.pool)
        .await
        .map_err(|e| AnalysisError::Database(e.to_string()))?;

        if result.rows_affected() > 0 {
            tracing::debug!(pruned = result.rows_affected(), "Pruned old terminal records");
        }
        Ok(())
    }
}
