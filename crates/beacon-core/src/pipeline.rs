//! The full analysis pipeline: crawl → score → result.
//!
//! Generic over the crawler and the commentary provider via traits, enabling
//! dependency injection and testability without real HTTP or browser calls.

use chrono::Utc;

use crate::error::AnalysisError;
use crate::job::AnalysisJob;
use crate::result::{AnalysisResult, AnalysisStatus};
use crate::scoring::ScoringEngine;
use crate::traits::{AnalysisRunner, CommentaryProvider, Crawler};

/// Events emitted by the pipeline for monitoring and progress tracking.
#[derive(Debug, Clone)]
pub enum PipelineEvent<'a> {
    Started { url: &'a str },
    SnapshotReady { url: &'a str, load_time_ms: u64 },
    Scored { url: &'a str, overall: u8 },
    Finished { url: &'a str, live: bool },
}

/// Receives pipeline events (decoupled logging/progress).
pub trait PipelineReporter: Send + Sync {
    fn report(&self, event: PipelineEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPipelineReporter;

impl PipelineReporter for NullPipelineReporter {}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPipelineReporter;

impl PipelineReporter for TracingPipelineReporter {
    fn report(&self, event: PipelineEvent<'_>) {
        match event {
            PipelineEvent::Started { url } => {
                tracing::info!(%url, "Analysis started");
            }
            PipelineEvent::SnapshotReady { url, load_time_ms } => {
                tracing::info!(%url, %load_time_ms, "Snapshot ready");
            }
            PipelineEvent::Scored { url, overall } => {
                tracing::info!(%url, %overall, "Scoring finished");
            }
            PipelineEvent::Finished { url, live } => {
                tracing::info!(%url, %live, "Analysis finished");
            }
        }
    }
}

/// Orchestrates one job: crawl the URL, score the snapshot, build the result.
///
/// Both queue backends run jobs through this type, so local and distributed
/// execution share identical semantics.
#[derive(Clone)]
pub struct AnalysisPipeline<C, P>
where
    C: Crawler,
    P: CommentaryProvider,
{
    crawler: C,
    commentary: P,
    engine: ScoringEngine,
}

impl<C, P> AnalysisPipeline<C, P>
where
    C: Crawler,
    P: CommentaryProvider,
{
    pub fn new(crawler: C, commentary: P) -> Self {
        Self {
            crawler,
            commentary,
            engine: ScoringEngine::new(),
        }
    }
}

impl<C, P> AnalysisRunner for AnalysisPipeline<C, P>
where
    C: Crawler + 'static,
    P: CommentaryProvider + 'static,
{
    async fn try_analyze(
        &self,
        job: &AnalysisJob,
        reporter: &dyn PipelineReporter,
    ) -> Result<AnalysisResult, AnalysisError> {
        reporter.report(PipelineEvent::Started { url: &job.url });

        let snapshot = self.crawler.crawl(&job.url, &job.options).await?;
        reporter.report(PipelineEvent::SnapshotReady {
            url: &job.url,
            load_time_ms: snapshot.performance.load_time_ms,
        });

        let outcome = self
            .engine
            .score_with_commentary(&snapshot, &job.url, &self.commentary)
            .await;
        reporter.report(PipelineEvent::Scored {
            url: &job.url,
            overall: outcome.authority_score.overall,
        });

        reporter.report(PipelineEvent::Finished {
            url: &job.url,
            live: true,
        });

        Ok(AnalysisResult {
            url: job.url.clone(),
            user_id: job.user_id.clone(),
            authority_score: outcome.authority_score,
            platform_scores: outcome.platform_scores,
            recommendations: outcome.recommendations,
            timestamp: Utc::now(),
            status: AnalysisStatus::Completed,
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CrawlError;
    use crate::result::Platform;
    use crate::testutil::{MockCrawler, make_rich_snapshot};
    use crate::traits::NullCommentary;

    #[tokio::test]
    async fn live_analysis_produces_completed_result() {
        let pipeline =
            AnalysisPipeline::new(MockCrawler::new(make_rich_snapshot()), NullCommentary);
        let job = AnalysisJob::new("https://example.com");

        let result = pipeline
            .try_analyze(&job, &NullPipelineReporter)
            .await
            .unwrap();

        assert_eq!(result.status, AnalysisStatus::Completed);
        assert!(result.authority_score.overall <= 100);
        assert_eq!(result.platform_scores.len(), Platform::ALL.len());
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn crawl_error_propagates_from_try_analyze() {
        let pipeline = AnalysisPipeline::new(
            MockCrawler::with_error(CrawlError::Unreachable("no route".into())),
            NullCommentary,
        );
        let job = AnalysisJob::new("https://unreachable.invalid");

        let err = pipeline
            .try_analyze(&job, &NullPipelineReporter)
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::Crawl(_)));
    }

    #[tokio::test]
    async fn analyze_degrades_to_fallback_on_crawl_error() {
        let pipeline = AnalysisPipeline::new(
            MockCrawler::with_error(CrawlError::Timeout(15)),
            NullCommentary,
        );
        let job = AnalysisJob::new("https://unreachable.invalid");

        let result = pipeline.analyze(&job, &NullPipelineReporter).await;

        assert_eq!(result.status, AnalysisStatus::Failed);
        assert!(result.error.as_deref().unwrap_or("").contains("timed out"));
        // The fallback still populates a full score.
        assert!(result.authority_score.overall > 0);
        assert!(!result.recommendations.is_empty());
    }
}
