//! Deterministic, domain-name-based scoring.
//!
//! Used two ways: as the backlink dimension of live scoring, and as the
//! fallback scorer that guarantees the pipeline always returns *some* score
//! when extraction or live scoring fails.

use chrono::Utc;
use sha2::{Digest, Sha256};
use url::Url;

use crate::job::AnalysisJob;
use crate::result::{
    AnalysisResult, AnalysisStatus, AuthorityScore, Platform, PlatformScore, ScoreBreakdown,
};

/// Curated domain-reputation table. Process-wide, read-only.
///
/// Matches the registrable domain and any subdomain of it.
const REPUTATION_TABLE: &[(&str, u8)] = &[
    ("wikipedia.org", 95),
    ("github.com", 92),
    ("stackoverflow.com", 90),
    ("mozilla.org", 88),
    ("nytimes.com", 86),
    ("bbc.co.uk", 86),
    ("reuters.com", 85),
    ("medium.com", 72),
    ("wordpress.com", 60),
    ("blogspot.com", 52),
];

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Extract the host from a URL-ish string, tolerating bare domains.
pub fn domain_of(url: &str) -> String {
    let candidate = if url.contains("://") {
        url.to_string()
    } else {
        format!("https://{url}")
    };
    Url::parse(&candidate)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_lowercase()))
        .unwrap_or_else(|| url.trim().to_lowercase())
}

/// Deterministic 0–100 score for a domain: curated table first, then a
/// hashed band of 35–65 for unknown domains.
pub fn domain_score(domain: &str) -> u8 {
    for (known, score) in REPUTATION_TABLE {
        if domain == *known || domain.ends_with(&format!(".{known}")) {
            return *score;
        }
    }
    // First 8 hex chars of the hash give a stable pseudo-random band.
    let hash = compute_hash(domain);
    let seed = u32::from_str_radix(&hash[..8], 16).unwrap_or(0);
    35 + (seed % 31) as u8
}

/// Degraded, domain-based scorer used when live analysis fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackScorer;

impl FallbackScorer {
    pub fn new() -> Self {
        Self
    }

    /// Authority score derived purely from the domain name.
    pub fn score(&self, url: &str) -> AuthorityScore {
        let base = domain_score(&domain_of(url));
        // Dampen the dimensions we could not observe.
        let dimmed = (base as u32 * 8 / 10) as u8;
        let breakdown = ScoreBreakdown {
            technical: dimmed,
            content: dimmed,
            ai_optimization: dimmed,
            backlink: base,
            freshness: dimmed,
            trust: dimmed,
        };
        AuthorityScore {
            overall: ((base as u32 + dimmed as u32 * 5) / 6) as u8,
            breakdown,
        }
    }

    /// Fixed generic recommendations for a degraded result.
    pub fn recommendations(&self) -> Vec<String> {
        vec![
            "Ensure the site is reachable and returns a 2xx status".to_string(),
            "Serve the site over HTTPS with a valid certificate".to_string(),
            "Add structured data (JSON-LD) describing the page".to_string(),
            "Provide a descriptive title and meta description".to_string(),
        ]
    }

    /// Build a complete, well-formed failed result for a job.
    pub fn failed_result(&self, job: &AnalysisJob, error: &str) -> AnalysisResult {
        let authority_score = self.score(&job.url);
        let platform_scores = Platform::ALL
            .iter()
            .map(|&platform| PlatformScore {
                platform,
                score: authority_score.overall,
                commentary: None,
            })
            .collect();

        AnalysisResult {
            url: job.url.clone(),
            user_id: job.user_id.clone(),
            authority_score,
            platform_scores,
            recommendations: self.recommendations(),
            timestamp: Utc::now(),
            status: AnalysisStatus::Failed,
            error: Some(error.to_string()),
        }
    }
}
