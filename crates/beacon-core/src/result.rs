use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Answer-engine platforms we score against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    ChatGpt,
    Claude,
    Perplexity,
    Gemini,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::ChatGpt,
        Platform::Claude,
        Platform::Perplexity,
        Platform::Gemini,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::ChatGpt => "chatgpt",
            Platform::Claude => "claude",
            Platform::Perplexity => "perplexity",
            Platform::Gemini => "gemini",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chatgpt" => Ok(Platform::ChatGpt),
            "claude" => Ok(Platform::Claude),
            "perplexity" => Ok(Platform::Perplexity),
            "gemini" => Ok(Platform::Gemini),
            _ => Err(format!("Unknown platform: {}", s)),
        }
    }
}

/// Per-dimension breakdown of an authority score. All values 0–100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub technical: u8,
    pub content: u8,
    pub ai_optimization: u8,
    pub backlink: u8,
    pub freshness: u8,
    pub trust: u8,
}

/// Deterministic composite score derived from a snapshot.
///
/// Recomputed on every analysis; never cached across snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorityScore {
    /// Weighted composite, 0–100.
    pub overall: u8,
    pub breakdown: ScoreBreakdown,
}

/// Score for one answer-engine platform, optionally enriched with
/// collaborator commentary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformScore {
    pub platform: Platform,
    pub score: u8,
    pub commentary: Option<String>,
}

/// Outcome status of one analysis, independent of queue mechanics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Completed,
    Failed,
}

/// Terminal, immutable result of one analysis.
///
/// `status = Failed` still carries a populated `authority_score` produced by
/// the fallback scorer — callers always get *some* score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub url: String,
    pub user_id: Option<String>,
    pub authority_score: AuthorityScore,
    pub platform_scores: Vec<PlatformScore>,
    pub recommendations: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub status: AnalysisStatus,
    pub error: Option<String>,
}

impl AnalysisResult {
    pub fn is_live(&self) -> bool {
        self.status == AnalysisStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_roundtrip() {
        for platform in Platform::ALL {
            let parsed: Platform = platform.as_str().parse().unwrap();
            assert_eq!(parsed, platform);
        }
        assert!("bing".parse::<Platform>().is_err());
    }

    #[test]
    fn result_serializes_with_camel_case_keys() {
        let result = AnalysisResult {
            url: "https://example.com".into(),
            user_id: None,
            authority_score: AuthorityScore::default(),
            platform_scores: vec![],
            recommendations: vec![],
            timestamp: Utc::now(),
            status: AnalysisStatus::Completed,
            error: None,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("authorityScore").is_some());
        assert!(value.get("platformScores").is_some());
        assert_eq!(value["status"], "completed");
    }
}
