use std::time::{Duration, Instant};

use beacon_core::error::CrawlError;
use beacon_core::traits::{PerformanceSample, RenderSession, RenderedPage, Renderer, WaitCondition};
use reqwest::Client;
use reqwest::redirect::Policy;
use url::Url;

const MAX_REDIRECTS: u32 = 10;
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36 Beacon/0.2";

/// Plain HTTP renderer using reqwest.
///
/// Downloads raw HTML without executing JavaScript. Redirects are followed
/// manually so the chain length lands in the snapshot. Suitable for
/// server-rendered pages; use the `browser` feature's renderer for SPAs.
#[derive(Clone)]
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    pub fn new() -> Result<Self, CrawlError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(Policy::none())
            .build()
            .map_err(|e| CrawlError::Unreachable(format!("HTTP client init: {e}")))?;
        Ok(Self { client })
    }
}

impl Renderer for HttpRenderer {
    type Session = HttpSession;

    async fn open(&self) -> Result<HttpSession, CrawlError> {
        Ok(HttpSession {
            client: self.client.clone(),
            last_load_time_ms: 0,
        })
    }
}

/// One HTTP crawl session. Stateless apart from the last navigation timing,
/// which feeds the performance approximation.
pub struct HttpSession {
    client: Client,
    last_load_time_ms: u64,
}

impl RenderSession for HttpSession {
    async fn navigate(
        &mut self,
        url: &str,
        _wait: WaitCondition,
        timeout: Duration,
    ) -> Result<RenderedPage, CrawlError> {
        let started = Instant::now();
        let result = tokio::time::timeout(timeout, self.follow(url)).await;
        match result {
            Ok(Ok(mut page)) => {
                page.load_time_ms = started.elapsed().as_millis() as u64;
                self.last_load_time_ms = page.load_time_ms;
                Ok(page)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CrawlError::Timeout(timeout.as_secs())),
        }
    }

    /// No live metrics without a JS engine: approximate from the navigation
    /// timing and return immediately.
    async fn observe_performance(&mut self, _window: Duration) -> PerformanceSample {
        PerformanceSample {
            largest_contentful_paint_ms: self.last_load_time_ms as f64,
            cumulative_layout_shift: 0.0,
            interaction_delay_ms: 0.0,
        }
    }

    async fn close(self) {}
}

impl HttpSession {
    /// Fetch a URL, following up to `MAX_REDIRECTS` redirects manually.
    async fn follow(&self, url: &str) -> Result<RenderedPage, CrawlError> {
        let mut current =
            Url::parse(url).map_err(|e| CrawlError::Unreachable(format!("Invalid URL: {e}")))?;
        let mut redirect_count = 0u32;

        loop {
            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(|e| {
                    if e.is_connect() {
                        CrawlError::Unreachable(format!("Connection failed: {e}"))
                    } else {
                        CrawlError::Unreachable(e.to_string())
                    }
                })?;

            let status = response.status();
            if status.is_redirection() {
                if redirect_count >= MAX_REDIRECTS {
                    return Err(CrawlError::Unreachable(format!(
                        "Redirect chain exceeded {MAX_REDIRECTS} hops for {url}"
                    )));
                }
                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        CrawlError::Unreachable(format!("Redirect without Location from {current}"))
                    })?;
                current = current.join(location).map_err(|e| {
                    CrawlError::Unreachable(format!("Invalid redirect target '{location}': {e}"))
                })?;
                redirect_count += 1;
                continue;
            }

            let has_csp = response
                .headers()
                .contains_key("content-security-policy");
            let has_tls = current.scheme() == "https";
            let status_code = status.as_u16();
            let html = response
                .text()
                .await
                .map_err(|e| CrawlError::Unreachable(format!("Failed to read body: {e}")))?;

            return Ok(RenderedPage {
                html,
                status_code,
                redirect_count,
                load_time_ms: 0,
                has_tls,
                has_csp,
            });
        }
    }
}
