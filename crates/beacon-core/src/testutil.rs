//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests. Mocks use
//! `Arc<Mutex<_>>` for interior mutability, allowing test assertions on
//! recorded calls.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;

use crate::backend::{ClaimedJob, QueueBackend, WorkerQueue};
use crate::error::{AnalysisError, CommentaryError, CrawlError};
use crate::fallback::FallbackScorer;
use crate::job::{AnalysisJob, AnalysisOptions, JobRecord, JobStatus, QueueStats};
use crate::pipeline::PipelineReporter;
use crate::result::{
    AnalysisResult, AnalysisStatus, AuthorityScore, Platform, PlatformScore, ScoreBreakdown,
};
use crate::snapshot::WebsiteSnapshot;
use crate::traits::{AnalysisRunner, CommentaryProvider, Crawler, PlatformCommentary};

// ---------------------------------------------------------------------------
// MockCrawler
// ---------------------------------------------------------------------------

/// Mock crawler that returns a configurable snapshot or error.
#[derive(Clone)]
pub struct MockCrawler {
    responses: Arc<Mutex<Vec<Result<WebsiteSnapshot, CrawlError>>>>,
}

impl MockCrawler {
    pub fn new(snapshot: WebsiteSnapshot) -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![Ok(snapshot)])),
        }
    }

    pub fn with_error(error: CrawlError) -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![Err(error)])),
        }
    }

    pub fn with_responses(responses: Vec<Result<WebsiteSnapshot, CrawlError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
        }
    }
}

impl Crawler for MockCrawler {
    async fn crawl(
        &self,
        _url: &str,
        _options: &AnalysisOptions,
    ) -> Result<WebsiteSnapshot, CrawlError> {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(WebsiteSnapshot::default())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockCommentary
// ---------------------------------------------------------------------------

/// Mock commentary provider with a fixed reply or error.
#[derive(Clone)]
pub struct MockCommentary {
    reply: Arc<Mutex<Result<PlatformCommentary, CommentaryError>>>,
    pub calls: Arc<Mutex<Vec<Platform>>>,
}

impl MockCommentary {
    pub fn new(commentary: PlatformCommentary) -> Self {
        Self {
            reply: Arc::new(Mutex::new(Ok(commentary))),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_error(error: CommentaryError) -> Self {
        Self {
            reply: Arc::new(Mutex::new(Err(error))),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl CommentaryProvider for MockCommentary {
    async fn review(
        &self,
        _excerpt: &str,
        platform: Platform,
    ) -> Result<PlatformCommentary, CommentaryError> {
        self.calls.lock().unwrap().push(platform);
        self.reply.lock().unwrap().clone()
    }
}

// ---------------------------------------------------------------------------
// Runners
// ---------------------------------------------------------------------------

/// Runner that returns a fixed result, optionally after a delay.
#[derive(Clone)]
pub struct MockRunner {
    result: AnalysisResult,
    delay: Duration,
}

impl MockRunner {
    pub fn new(result: AnalysisResult) -> Self {
        Self {
            result,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(result: AnalysisResult, delay: Duration) -> Self {
        Self { result, delay }
    }
}

impl AnalysisRunner for MockRunner {
    async fn try_analyze(
        &self,
        _job: &AnalysisJob,
        _reporter: &dyn PipelineReporter,
    ) -> Result<AnalysisResult, AnalysisError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.result.clone())
    }
}

/// Runner whose live analysis always fails with the given crawl error.
#[derive(Clone)]
pub struct FailingRunner {
    error: CrawlError,
    call_count: Arc<Mutex<u32>>,
}

impl FailingRunner {
    pub fn new(error: CrawlError) -> Self {
        Self {
            error,
            call_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn calls(&self) -> u32 {
        *self.call_count.lock().unwrap()
    }
}

impl AnalysisRunner for FailingRunner {
    async fn try_analyze(
        &self,
        _job: &AnalysisJob,
        _reporter: &dyn PipelineReporter,
    ) -> Result<AnalysisResult, AnalysisError> {
        *self.call_count.lock().unwrap() += 1;
        Err(AnalysisError::Crawl(self.error.clone()))
    }
}

/// Runner that succeeds for every URL except a configured failure set,
/// recording call order.
#[derive(Clone, Default)]
pub struct ScriptedRunner {
    failing: HashSet<String>,
    order: Arc<Mutex<Vec<String>>>,
}

impl ScriptedRunner {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn failing_for(urls: &[&str]) -> Self {
        Self {
            failing: urls.iter().map(|s| s.to_string()).collect(),
            order: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_order(&self) -> Vec<String> {
        self.order.lock().unwrap().clone()
    }
}

impl AnalysisRunner for ScriptedRunner {
    async fn try_analyze(
        &self,
        job: &AnalysisJob,
        _reporter: &dyn PipelineReporter,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.order.lock().unwrap().push(job.url.clone());
        if self.failing.contains(&job.url) {
            Err(AnalysisError::Crawl(CrawlError::Unreachable(
                "scripted failure".into(),
            )))
        } else {
            Ok(make_live_result(&job.url))
        }
    }
}

// ---------------------------------------------------------------------------
// MockWorkerQueue
// ---------------------------------------------------------------------------

/// In-memory worker queue. Retry timing is ignored: a job scheduled for
/// retry is immediately claimable again, which keeps worker tests fast.
#[derive(Clone, Default)]
pub struct MockWorkerQueue {
    entries: Arc<Mutex<Vec<(JobRecord, Option<String>)>>>,
    pub released_workers: Arc<Mutex<Vec<String>>>,
    reject_completions: bool,
}

impl MockWorkerQueue {
    /// A queue whose terminal writes fail, for exercising write-error paths.
    pub fn rejecting_completions() -> Self {
        Self {
            reject_completions: true,
            ..Self::default()
        }
    }
}

impl QueueBackend for MockWorkerQueue {
    async fn submit(&self, job: AnalysisJob) -> Result<String, AnalysisError> {
        let mut entries = self.entries.lock().unwrap();
        let id = format!("job-{}", entries.len() + 1);
        entries.push((JobRecord::new(&id, job, 3), None));
        Ok(id)
    }

    async fn read(&self, id: &str) -> Result<Option<JobRecord>, AnalysisError> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .iter()
            .find(|(record, _)| record.id == id)
            .map(|(record, _)| record.clone()))
    }

    async fn list(
        &self,
        status: Option<JobStatus>,
        limit: usize,
    ) -> Result<Vec<JobRecord>, AnalysisError> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .iter()
            .filter(|(record, _)| status.is_none_or(|s| record.status == s))
            .take(limit)
            .map(|(record, _)| record.clone())
            .collect())
    }

    async fn remove(&self, id: &str) -> Result<(), AnalysisError> {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|(record, _)| record.id != id);
        Ok(())
    }

    async fn stats(&self) -> Result<QueueStats, AnalysisError> {
        let entries = self.entries.lock().unwrap();
        let mut stats = QueueStats::default();
        for (record, _) in entries.iter() {
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

    async fn cleanup(&self, _max_age: Duration) -> Result<u64, AnalysisError> {
        Ok(0)
    }
}

impl WorkerQueue for MockWorkerQueue {
    async fn claim(&self, worker_id: &str) -> Result<Option<ClaimedJob>, AnalysisError> {
        let mut entries = self.entries.lock().unwrap();
        for (record, worker) in entries.iter_mut() {
            if record.status == JobStatus::Waiting {
                record.status = JobStatus::Active;
                *worker = Some(worker_id.to_string());
                return Ok(Some(ClaimedJob {
                    id: record.id.clone(),
                    job: record.job.clone(),
                    attempt: record.attempt,
                    max_retries: record.max_retries,
                }));
            }
        }
        Ok(None)
    }

    async fn complete(&self, id: &str, result: &AnalysisResult) -> Result<(), AnalysisError> {
        if self.reject_completions {
            return Err(AnalysisError::Database("completion rejected".into()));
        }
        let mut entries = self.entries.lock().unwrap();
        if let Some((record, worker)) = entries.iter_mut().find(|(r, _)| r.id == id) {
            record.status = JobStatus::Completed;
            record.progress = 100;
            record.processed_at = Some(Utc::now());
            record.failure_reason = result.error.clone();
            record.result = Some(result.clone());
            *worker = None;
        }
        Ok(())
    }

    async fn fail(
        &self,
        id: &str,
        error: &str,
        next_retry_at: Option<chrono::DateTime<Utc>>,
    ) -> Result<(), AnalysisError> {
        let mut entries = self.entries.lock().unwrap();
        if let Some((record, worker)) = entries.iter_mut().find(|(r, _)| r.id == id) {
            if next_retry_at.is_some() {
                record.status = JobStatus::Waiting;
                record.attempt += 1;
            } else {
                record.status = JobStatus::Failed;
                record.processed_at = Some(Utc::now());
            }
            record.failure_reason = Some(error.to_string());
            *worker = None;
        }
        Ok(())
    }

    async fn release_worker(&self, worker_id: &str) -> Result<u64, AnalysisError> {
        self.released_workers
            .lock()
            .unwrap()
            .push(worker_id.to_string());

        let mut entries = self.entries.lock().unwrap();
        let mut count = 0u64;
        for (record, worker) in entries.iter_mut() {
            if worker.as_deref() == Some(worker_id) && record.status == JobStatus::Active {
                record.status = JobStatus::Waiting;
                *worker = None;
                count += 1;
            }
        }
        Ok(count)
    }
}

// ---------------------------------------------------------------------------
// RecordingWorkerReporter
// ---------------------------------------------------------------------------

/// Worker reporter that records event labels.
#[derive(Default)]
pub struct RecordingWorkerReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl RecordingWorkerReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl crate::worker::WorkerReporter for RecordingWorkerReporter {
    fn report(&self, event: crate::worker::WorkerEvent<'_>) {
        let label = match &event {
            crate::worker::WorkerEvent::Started { .. } => "Started",
            crate::worker::WorkerEvent::Polling => "Polling",
            crate::worker::WorkerEvent::JobClaimed { .. } => "JobClaimed",
            crate::worker::WorkerEvent::JobCompleted { .. } => "JobCompleted",
            crate::worker::WorkerEvent::JobRetryScheduled { .. } => "JobRetryScheduled",
            crate::worker::WorkerEvent::ShuttingDown { .. } => "ShuttingDown",
            crate::worker::WorkerEvent::Stopped { .. } => "Stopped",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}

// ---------------------------------------------------------------------------
// Test data builders
// ---------------------------------------------------------------------------

/// A snapshot of a healthy, well-optimized page. Trips none of the
/// recommendation rules.
pub fn make_rich_snapshot() -> WebsiteSnapshot {
    let mut snapshot = WebsiteSnapshot::default();

    snapshot.performance.load_time_ms = 1200;
    snapshot.performance.status_code = 200;

    snapshot.technical.is_mobile_optimized = true;
    snapshot.technical.core_web_vitals.largest_contentful_paint_ms = 1800.0;
    snapshot.technical.core_web_vitals.cumulative_layout_shift = 0.05;
    snapshot.technical.image_stats.total = 5;
    snapshot.technical.image_stats.missing_alt = 0;
    snapshot.technical.resource_stats.scripts = 8;
    snapshot.technical.resource_stats.stylesheets = 3;
    snapshot.technical.resource_stats.links = 40;

    snapshot.content.word_count = 900;
    snapshot.content.readability_score = 65.0;
    snapshot.content.heading_structure.h1 = 1;
    snapshot.content.heading_structure.h2 = 4;
    snapshot.content.heading_structure.h3 = 6;
    snapshot.content.paragraph_count = 12;
    snapshot.content.authorship.has_author = true;
    snapshot.content.authorship.author = "Jane Doe".into();
    snapshot.content.freshness.has_published_date = true;
    snapshot.content.freshness.published_hint = "2024-06-01".into();

    snapshot.seo.title = "How Distributed Queues Keep Jobs Safe".into();
    snapshot.seo.meta_description = "Learn how durable job queues, retry policies, and fallback \
                                     scoring keep website analysis reliable even when live crawls fail."
        .into();
    snapshot.seo.canonical = "https://example.com/queues".into();
    snapshot.seo.structured_data_blocks = vec![
        serde_json::json!({"@context": "https://schema.org", "@type": "Article", "headline": "Queues"}),
        serde_json::json!({"@context": "https://schema.org", "@type": "FAQPage", "mainEntity": []}),
    ];

    snapshot.security.has_tls = true;
    snapshot.security.has_csp = true;

    snapshot.ai_factors.schema_markup_count = 2;
    snapshot.ai_factors.faq_count = 3;
    snapshot.ai_factors.citation_count = 4;
    snapshot.ai_factors.platform_heuristics.has_faq_markup = true;
    snapshot.ai_factors.platform_heuristics.has_citations = true;
    snapshot.ai_factors.platform_heuristics.has_tabular_data = true;
    snapshot.ai_factors.platform_heuristics.has_code_blocks = true;

    snapshot
}

/// A completed live result for a URL.
pub fn make_live_result(url: &str) -> AnalysisResult {
    let breakdown = ScoreBreakdown {
        technical: 80,
        content: 75,
        ai_optimization: 70,
        backlink: 60,
        freshness: 65,
        trust: 85,
    };
    AnalysisResult {
        url: url.to_string(),
        user_id: None,
        authority_score: AuthorityScore {
            overall: 74,
            breakdown,
        },
        platform_scores: Platform::ALL
            .iter()
            .map(|&platform| PlatformScore {
                platform,
                score: 72,
                commentary: None,
            })
            .collect(),
        recommendations: vec![],
        timestamp: Utc::now(),
        status: AnalysisStatus::Completed,
        error: None,
    }
}

/// A degraded fallback result for a URL.
pub fn make_failed_result(url: &str, error: &str) -> AnalysisResult {
    FallbackScorer::new().failed_result(&AnalysisJob::new(url), error)
}
