use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::result::AnalysisResult;

/// Scheduling priority of an analysis job.
///
/// Maps to a scheduling weight where lower sorts first; low-priority jobs
/// additionally pick up a submit delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    /// Scheduling weight: high=1, normal=2, low=3.
    pub fn weight(&self) -> i16 {
        match self {
            Priority::High => 1,
            Priority::Normal => 2,
            Priority::Low => 3,
        }
    }

    pub fn from_weight(weight: i16) -> Self {
        match weight {
            1 => Priority::High,
            3 => Priority::Low,
            _ => Priority::Normal,
        }
    }

    /// Extra delay applied before a job becomes eligible to run.
    pub fn submit_delay(&self) -> Duration {
        match self {
            Priority::Low => Duration::from_secs(5),
            _ => Duration::ZERO,
        }
    }
}

/// Per-job analysis options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisOptions {
    pub include_screenshots: bool,
    pub include_performance: bool,
    pub include_ai_factors: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            include_screenshots: false,
            include_performance: true,
            include_ai_factors: true,
        }
    }
}

/// A request to analyze one URL. Immutable once enqueued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub url: String,
    pub user_id: Option<String>,
    pub priority: Priority,
    pub options: AnalysisOptions,
}

impl AnalysisJob {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user_id: None,
            priority: Priority::Normal,
            options: AnalysisOptions::default(),
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_options(mut self, options: AnalysisOptions) -> Self {
        self.options = options;
        self
    }
}

/// Queue-level status of an analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Waiting,
    Active,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Waiting => "waiting",
            JobStatus::Active => "active",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "waiting" => Ok(JobStatus::Waiting),
            "active" => Ok(JobStatus::Active),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(format!("Unknown job status: {}", s)),
        }
    }
}

/// Queue-tracked lifecycle state of one [`AnalysisJob`].
///
/// Owned exclusively by the backend that created it; read-only everywhere
/// else. Status transitions are `waiting → active → terminal` and a terminal
/// record never changes again (a retry re-enters `waiting` before the record
/// turns terminal).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub job: AnalysisJob,
    pub status: JobStatus,
    /// 0–100.
    pub progress: u8,
    pub result: Option<AnalysisResult>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub attempt: u32,
    pub max_retries: u32,
}

impl JobRecord {
    pub fn new(id: impl Into<String>, job: AnalysisJob, max_retries: u32) -> Self {
        Self {
            id: id.into(),
            job,
            status: JobStatus::Waiting,
            progress: 0,
            result: None,
            created_at: Utc::now(),
            processed_at: None,
            failure_reason: None,
            attempt: 0,
            max_retries,
        }
    }

    pub fn can_retry(&self) -> bool {
        self.attempt < self.max_retries
    }
}

/// Counts of jobs by queue state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    pub total: u64,
}

/// Retry configuration with doubling exponential backoff.
///
/// Delay schedule with the default 30s base: 30s, 60s, 120s, ... capped
/// at `max_delay`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: TimeDelta,
    pub max_delay: TimeDelta,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: TimeDelta::seconds(30),
            max_delay: TimeDelta::minutes(15),
        }
    }
}

impl RetryPolicy {
    /// Delay before a given attempt number (1-indexed): `base * 2^(n-1)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> TimeDelta {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay * 2_i32.pow(exponent);
        std::cmp::min(delay, self.max_delay)
    }

    /// Absolute timestamp for the next attempt after `attempt` failures.
    pub fn next_retry_at(&self, attempt: u32) -> DateTime<Utc> {
        Utc::now() + self.delay_for_attempt(attempt + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_roundtrip() {
        for status in [
            JobStatus::Waiting,
            JobStatus::Active,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            let s = status.as_str();
            let parsed: JobStatus = s.parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn terminal_states() {
        assert!(!JobStatus::Waiting.is_terminal());
        assert!(!JobStatus::Active.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn priority_weights() {
        assert_eq!(Priority::High.weight(), 1);
        assert_eq!(Priority::Normal.weight(), 2);
        assert_eq!(Priority::Low.weight(), 3);
        assert_eq!(Priority::from_weight(1), Priority::High);
        assert_eq!(Priority::from_weight(2), Priority::Normal);
        assert_eq!(Priority::from_weight(3), Priority::Low);
        assert!(Priority::Low.submit_delay() > Duration::ZERO);
        assert_eq!(Priority::High.submit_delay(), Duration::ZERO);
    }

    #[test]
    fn retry_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), TimeDelta::seconds(30));
        assert_eq!(policy.delay_for_attempt(2), TimeDelta::seconds(60));
        assert_eq!(policy.delay_for_attempt(3), TimeDelta::seconds(120));
        // Capped by max_delay.
        assert_eq!(policy.delay_for_attempt(10), TimeDelta::minutes(15));
    }

    #[test]
    fn job_builder() {
        let job = AnalysisJob::new("https://example.com")
            .with_user("u-42")
            .with_priority(Priority::High);

        assert_eq!(job.url, "https://example.com");
        assert_eq!(job.user_id.as_deref(), Some("u-42"));
        assert_eq!(job.priority, Priority::High);
        assert!(job.options.include_performance);
    }
}
