use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::backend::{ClaimedJob, WorkerQueue};
use crate::error::AnalysisError;
use crate::fallback::FallbackScorer;
use crate::job::RetryPolicy;
use crate::pipeline::NullPipelineReporter;
use crate::traits::AnalysisRunner;

/// Configuration for a worker process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: String,
    pub poll_interval: Duration,
    pub retry_policy: RetryPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: format!("worker-{}", &Uuid::new_v4().to_string()[..8]),
            poll_interval: Duration::from_secs(5),
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl WorkerConfig {
    pub fn with_worker_id(mut self, id: impl Into<String>) -> Self {
        self.worker_id = id.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Events emitted by the worker for monitoring/logging.
#[derive(Debug, Clone)]
pub enum WorkerEvent<'a> {
    Started {
        worker_id: &'a str,
    },
    Polling,
    JobClaimed {
        job: &'a ClaimedJob,
    },
    JobCompleted {
        job_id: &'a str,
        live: bool,
    },
    JobRetryScheduled {
        job_id: &'a str,
        error: &'a str,
        attempt: u32,
    },
    ShuttingDown {
        worker_id: &'a str,
        jobs_released: u64,
    },
    Stopped {
        worker_id: &'a str,
    },
}

/// Trait for receiving worker events (decoupled logging).
pub trait WorkerReporter: Send + Sync {
    fn report(&self, event: WorkerEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWorkerReporter;

impl WorkerReporter for TracingWorkerReporter {
    fn report(&self, event: WorkerEvent<'_>) {
        match event {
            WorkerEvent::Started { worker_id } => {
                tracing::info!(%worker_id, "Worker started");
            }
            WorkerEvent::Polling => {
                tracing::debug!("Polling for jobs");
            }
            WorkerEvent::JobClaimed { job } => {
                tracing::info!(job_id = %job.id, url = %job.job.url, attempt = %job.attempt, "Job claimed");
            }
            WorkerEvent::JobCompleted { job_id, live } => {
                tracing::info!(%job_id, %live, "Job completed");
            }
            WorkerEvent::JobRetryScheduled {
                job_id,
                error,
                attempt,
            } => {
                tracing::warn!(%job_id, %error, %attempt, "Job failed, retry scheduled");
            }
            WorkerEvent::ShuttingDown {
                worker_id,
                jobs_released,
            } => {
                tracing::info!(%worker_id, %jobs_released, "Worker shutting down");
            }
            WorkerEvent::Stopped { worker_id } => {
                tracing::info!(%worker_id, "Worker stopped");
            }
        }
    }
}

/// Worker that polls a durable queue and runs analysis jobs.
///
/// Multiple workers may pull from the same queue concurrently; coordination
/// happens entirely through atomic claims in the backend.
pub struct AnalysisWorker<Q, R>
where
    Q: WorkerQueue,
    R: AnalysisRunner,
{
    queue: Q,
    runner: R,
    config: WorkerConfig,
}

impl<Q, R> AnalysisWorker<Q, R>
where
    Q: WorkerQueue,
    R: AnalysisRunner,
{
    pub fn new(queue: Q, runner: R, config: WorkerConfig) -> Self {
        Self {
            queue,
            runner,
            config,
        }
    }

    /// Run the worker loop until cancellation.
    pub async fn run<WR: WorkerReporter>(
        &self,
        cancel_token: CancellationToken,
        reporter: &WR,
    ) -> Result<(), AnalysisError> {
        reporter.report(WorkerEvent::Started {
            worker_id: &self.config.worker_id,
        });

        loop {
            if cancel_token.is_cancelled() {
                break;
            }

            reporter.report(WorkerEvent::Polling);

            match self.queue.claim(&self.config.worker_id).await {
                Ok(Some(claimed)) => {
                    reporter.report(WorkerEvent::JobClaimed { job: &claimed });
                    self.process_job(&claimed, reporter).await;
                }
                Ok(None) => {
                    tokio::select! {
                        () = tokio::time::sleep(self.config.poll_interval) => {}
                        () = cancel_token.cancelled() => break,
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to claim job");
                    tokio::select! {
                        () = tokio::time::sleep(self.config.poll_interval * 2) => {}
                        () = cancel_token.cancelled() => break,
                    }
                }
            }
        }

        // Graceful shutdown: release all claimed jobs.
        let released = self
            .queue
            .release_worker(&self.config.worker_id)
            .await
            .unwrap_or(0);

        reporter.report(WorkerEvent::ShuttingDown {
            worker_id: &self.config.worker_id,
            jobs_released: released,
        });
        reporter.report(WorkerEvent::Stopped {
            worker_id: &self.config.worker_id,
        });

        Ok(())
    }

    async fn process_job<WR: WorkerReporter>(&self, claimed: &ClaimedJob, reporter: &WR) {
        match self.runner.try_analyze(&claimed.job, &NullPipelineReporter).await {
            Ok(result) => {
                // Events reflect durable state: report only once the queue
                // write has gone through.
                match self.queue.complete(&claimed.id, &result).await {
                    Ok(()) => reporter.report(WorkerEvent::JobCompleted {
                        job_id: &claimed.id,
                        live: true,
                    }),
                    Err(e) => {
                        tracing::error!(job_id = %claimed.id, error = %e, "Failed to mark job completed");
                    }
                }
            }
            Err(e) if e.is_retryable() && claimed.can_retry() => {
                let error_msg = e.to_string();
                let next_retry = self.config.retry_policy.next_retry_at(claimed.attempt);
                match self
                    .queue
                    .fail(&claimed.id, &error_msg, Some(next_retry))
                    .await
                {
                    Ok(()) => reporter.report(WorkerEvent::JobRetryScheduled {
                        job_id: &claimed.id,
                        error: &error_msg,
                        attempt: claimed.attempt + 1,
                    }),
                    Err(e) => {
                        tracing::error!(job_id = %claimed.id, error = %e, "Failed to schedule retry");
                    }
                }
            }
            Err(e) => {
                // Retries exhausted or non-retryable: degrade to the fallback
                // result and complete at the queue level.
                let result = FallbackScorer::new().failed_result(&claimed.job, &e.to_string());
                match self.queue.complete(&claimed.id, &result).await {
                    Ok(()) => reporter.report(WorkerEvent::JobCompleted {
                        job_id: &claimed.id,
                        live: false,
                    }),
                    Err(e) => {
                        tracing::error!(job_id = %claimed.id, error = %e, "Failed to record fallback result");
                    }
                }
            }
        }
    }
}
