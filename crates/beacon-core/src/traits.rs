use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, CommentaryError, CrawlError};
use crate::fallback::FallbackScorer;
use crate::job::{AnalysisJob, AnalysisOptions};
use crate::pipeline::PipelineReporter;
use crate::result::{AnalysisResult, Platform};
use crate::snapshot::WebsiteSnapshot;

/// Wait condition for a navigation, loosest last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitCondition {
    /// Network has settled (best fidelity, slowest).
    NetworkIdle,
    /// Full load event fired.
    Load,
    /// Bare DOM is ready.
    DomReady,
}

/// Result of one navigation inside a crawl session.
#[derive(Debug, Clone, Default)]
pub struct RenderedPage {
    pub html: String,
    pub status_code: u16,
    pub redirect_count: u32,
    pub load_time_ms: u64,
    pub has_tls: bool,
    pub has_csp: bool,
}

/// Partial Core Web Vitals captured during a bounded observation window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerformanceSample {
    pub largest_contentful_paint_ms: f64,
    pub cumulative_layout_shift: f64,
    pub interaction_delay_ms: f64,
}

/// One crawl session, exclusively owned by the `crawl()` call that opened it.
///
/// Implementations must make `close` cheap and infallible so the extractor
/// can tear the session down on every exit path.
pub trait RenderSession: Send {
    /// Navigate to a URL and return the (possibly partially) rendered page.
    fn navigate(
        &mut self,
        url: &str,
        wait: WaitCondition,
        timeout: Duration,
    ) -> impl Future<Output = Result<RenderedPage, CrawlError>> + Send;

    /// Observe performance metrics for up to `window`, returning whatever
    /// was captured when the window elapses.
    fn observe_performance(
        &mut self,
        window: Duration,
    ) -> impl Future<Output = PerformanceSample> + Send;

    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Factory for fresh crawl sessions.
pub trait Renderer: Send + Sync + Clone {
    type Session: RenderSession;

    fn open(&self) -> impl Future<Output = Result<Self::Session, CrawlError>> + Send;
}

/// Crawls a URL and produces an immutable structured snapshot.
pub trait Crawler: Send + Sync + Clone {
    fn crawl(
        &self,
        url: &str,
        options: &AnalysisOptions,
    ) -> impl Future<Output = Result<WebsiteSnapshot, CrawlError>> + Send;
}

/// Commentary returned by the external collaborator for one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformCommentary {
    /// 0–100; responses outside the range are rejected as malformed.
    pub score: u8,
    pub summary: String,
}

/// External commentary collaborator.
///
/// Any error is treated identically to "no commentary available" by the
/// scoring engine; implementations never need to retry.
pub trait CommentaryProvider: Send + Sync + Clone {
    fn review(
        &self,
        excerpt: &str,
        platform: Platform,
    ) -> impl Future<Output = Result<PlatformCommentary, CommentaryError>> + Send;
}

/// A no-op CommentaryProvider for fully deterministic scoring.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCommentary;

impl CommentaryProvider for NullCommentary {
    async fn review(
        &self,
        _excerpt: &str,
        _platform: Platform,
    ) -> Result<PlatformCommentary, CommentaryError> {
        Err(CommentaryError::Disabled)
    }
}

/// Runs one job through the full analysis pipeline.
///
/// Both queue backends execute jobs through this trait, so the local and
/// distributed paths share the identical worker pipeline.
pub trait AnalysisRunner: Send + Sync + Clone + 'static {
    /// Run a live analysis. Errors when live data could not be obtained.
    fn try_analyze(
        &self,
        job: &AnalysisJob,
        reporter: &dyn PipelineReporter,
    ) -> impl Future<Output = Result<AnalysisResult, AnalysisError>> + Send;

    /// Run an analysis that always yields a result: live failures degrade
    /// to a deterministic fallback score with `status = Failed`.
    fn analyze(
        &self,
        job: &AnalysisJob,
        reporter: &dyn PipelineReporter,
    ) -> impl Future<Output = AnalysisResult> + Send {
        async move {
            match self.try_analyze(job, reporter).await {
                Ok(result) => result,
                Err(e) => FallbackScorer::new().failed_result(job, &e.to_string()),
            }
        }
    }
}
