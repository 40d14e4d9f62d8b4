use std::time::Duration;

use beacon_core::error::CommentaryError;
use beacon_core::result::Platform;
use beacon_core::traits::{CommentaryProvider, PlatformCommentary};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_COMMENTARY_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the external per-platform commentary service.
///
/// Commentary is strictly best-effort: every error here is recovered by the
/// scoring engine, so this client never retries.
#[derive(Clone)]
pub struct CommentaryClient {
    inner: Option<Enabled>,
}

#[derive(Clone)]
struct Enabled {
    client: Client,
    base_url: String,
    api_key: String,
    timeout_secs: u64,
}

impl CommentaryClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, CommentaryError> {
        Self::with_timeout(base_url, api_key, DEFAULT_COMMENTARY_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, CommentaryError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            CommentaryError::Http {
                message: format!("Client init: {e}"),
                status_code: 0,
            }
        })?;
        Ok(Self {
            inner: Some(Enabled {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key: api_key.to_string(),
                timeout_secs: timeout.as_secs(),
            }),
        })
    }

    /// A permanently disabled client: every review yields
    /// [`CommentaryError::Disabled`], which the scoring engine treats as
    /// "no commentary".
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Reads `COMMENTARY_URL` and `COMMENTARY_API_KEY`; when the URL is
    /// absent the client comes up disabled rather than failing startup.
    pub fn from_env() -> Result<Self, CommentaryError> {
        match std::env::var("COMMENTARY_URL") {
            Ok(url) => {
                let api_key = std::env::var("COMMENTARY_API_KEY").unwrap_or_default();
                Self::new(&url, &api_key)
            }
            Err(_) => Ok(Self::disabled()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }
}

#[derive(Serialize)]
struct ReviewRequest<'a> {
    excerpt: &'a str,
    platform: &'a str,
}

#[derive(Deserialize)]
struct ReviewResponse {
    score: u32,
    summary: String,
}

impl CommentaryProvider for CommentaryClient {
    async fn review(
        &self,
        excerpt: &str,
        platform: Platform,
    ) -> Result<PlatformCommentary, CommentaryError> {
        let Some(inner) = &self.inner else {
            return Err(CommentaryError::Disabled);
        };

        let url = format!("{}/review", inner.base_url);
        let request = ReviewRequest {
            excerpt,
            platform: platform.as_str(),
        };

        let response = inner
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", inner.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CommentaryError::Timeout(inner.timeout_secs)
                } else {
                    CommentaryError::Http {
                        message: e.to_string(),
                        status_code: 0,
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CommentaryError::Http {
                message: body,
                status_code: status.as_u16(),
            });
        }

        let reply: ReviewResponse = response
            .json()
            .await
            .map_err(|e| CommentaryError::Malformed(format!("Invalid response body: {e}")))?;

        if reply.score > 100 {
            return Err(CommentaryError::Malformed(format!(
                "score {} out of range",
                reply.score
            )));
        }

        Ok(PlatformCommentary {
            score: reply.score as u8,
            summary: reply.summary,
        })
    }
}
