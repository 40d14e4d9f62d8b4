pub mod backend;
pub mod batch;
pub mod error;
pub mod fallback;
pub mod job;
pub mod local_backend;
pub mod pipeline;
pub mod queue;
pub mod result;
pub mod scoring;
pub mod snapshot;
pub mod testutil;
pub mod traits;
pub mod validation;
pub mod worker;

pub use backend::{ClaimedJob, QueueBackend, WorkerQueue};
pub use batch::{BatchConfig, BatchCoordinator, BatchObserver, BatchReport, TracingBatchObserver};
pub use error::{AnalysisError, CommentaryError, CrawlError};
pub use fallback::FallbackScorer;
pub use job::{AnalysisJob, AnalysisOptions, JobRecord, JobStatus, Priority, QueueStats, RetryPolicy};
pub use local_backend::{LocalBackend, LocalBackendConfig};
pub use pipeline::{AnalysisPipeline, PipelineEvent, PipelineReporter, TracingPipelineReporter};
pub use queue::{BackendKind, JobQueue};
pub use result::{AnalysisResult, AnalysisStatus, AuthorityScore, Platform, PlatformScore, ScoreBreakdown};
pub use scoring::ScoringEngine;
pub use snapshot::WebsiteSnapshot;
pub use traits::{AnalysisRunner, CommentaryProvider, Crawler, RenderSession, Renderer, WaitCondition};
pub use validation::{ValidationReport, validate};
pub use worker::{AnalysisWorker, TracingWorkerReporter, WorkerConfig, WorkerEvent, WorkerReporter};
