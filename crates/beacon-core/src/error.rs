use thiserror::Error;

/// Errors produced while crawling a target URL.
#[derive(Error, Debug, Clone)]
pub enum CrawlError {
    /// Target host could not be reached (DNS, connect, reset).
    #[error("Unreachable: {0}")]
    Unreachable(String),

    /// Navigation did not settle within the timeout tier.
    #[error("Navigation timed out after {0} seconds")]
    Timeout(u64),

    /// Target answered with a non-2xx status on every retry tier.
    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },
}

impl CrawlError {
    /// Transient crawl failures are worth another attempt later.
    pub fn is_retryable(&self) -> bool {
        match self {
            CrawlError::Unreachable(_) | CrawlError::Timeout(_) => true,
            CrawlError::Status { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

/// Errors from the external commentary collaborator.
///
/// Every variant is recovered inside the scoring engine — a commentary
/// failure never propagates past it.
#[derive(Error, Debug, Clone)]
pub enum CommentaryError {
    #[error("Commentary API error (HTTP {status_code}): {message}")]
    Http { message: String, status_code: u16 },

    #[error("Commentary request timed out after {0} seconds")]
    Timeout(u64),

    /// Response did not match the expected shape (e.g. score out of range).
    #[error("Malformed commentary response: {0}")]
    Malformed(String),

    /// No commentary provider is configured for this process.
    #[error("Commentary provider disabled")]
    Disabled,
}

/// Application-wide error types for Beacon.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Live crawl failed after all navigation retries.
    #[error("Crawl error: {0}")]
    Crawl(#[from] CrawlError),

    /// The distributed backend could not be reached at startup.
    #[error("Queue backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration is missing or invalid.
    #[error("Config error: {0}")]
    Config(String),

    /// Uncaught failure while executing a job.
    #[error("Job execution error: {0}")]
    JobExecution(String),
}

impl AnalysisError {
    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            AnalysisError::Crawl(e) => e.is_retryable(),
            AnalysisError::Database(_) => true,
            _ => false,
        }
    }
}
