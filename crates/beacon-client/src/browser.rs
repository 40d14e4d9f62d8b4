use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use beacon_core::error::CrawlError;
use beacon_core::traits::{PerformanceSample, RenderSession, RenderedPage, Renderer, WaitCondition};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde::Deserialize;

/// Headless-browser renderer using Chromium via the Chrome DevTools Protocol.
///
/// Unlike [`super::HttpRenderer`], this executes JavaScript before sampling
/// the DOM, making it suitable for SPAs (React, Angular, Vue) and pages with
/// lazy-loaded content, and it can observe real Core Web Vitals.
///
/// A single Chromium process is shared across all clones of this struct;
/// each [`Renderer::open`] call yields a session that drives its own tab.
#[derive(Clone)]
pub struct ChromiumRenderer {
    browser: Arc<Browser>,
}

impl ChromiumRenderer {
    /// Launches a headless Chromium browser.
    ///
    /// Requires a Chromium / Chrome binary reachable via `$PATH` (or the
    /// default locations checked by `chromiumoxide`).
    pub async fn new() -> Result<Self, CrawlError> {
        let mut builder = BrowserConfig::builder();
        builder = builder.no_sandbox().disable_default_args();

        // Snap-packaged Chromium exposes a wrapper that rejects standard
        // Chrome CLI flags (--headless, --disable-gpu, …).  We try to
        // locate the *real* binary buried inside the snap, falling back
        // to any other Chrome/Chromium the user may have installed.
        if let Some(bin) = Self::find_chrome_binary() {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        let config = builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--disable-translate")
            .arg("--no-first-run")
            .build()
            .map_err(|e| CrawlError::Unreachable(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| CrawlError::Unreachable(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        Ok(Self {
            browser: Arc::new(browser),
        })
    }

    /// Tries to locate the real Chrome/Chromium binary.
    ///
    /// On systems where Chromium is installed via **snap**, the wrapper at
    /// `/snap/bin/chromium` strips unknown CLI flags, breaking headless mode.
    /// We look for the real binary inside the snap first, then fall back to
    /// well-known system paths.  If nothing is found we return `None` and let
    /// `chromiumoxide` do its own lookup.
    fn find_chrome_binary() -> Option<PathBuf> {
        let candidates: &[&str] = &[
            // Snap (Ubuntu default)
            "/snap/chromium/current/usr/lib/chromium-browser/chrome",
            // Flatpak
            "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
            // Common apt / manual installs
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
        ];

        // Also honour an explicit override via env var.
        if let Ok(p) = std::env::var("CHROME_BIN") {
            let path = PathBuf::from(&p);
            if path.exists() {
                return Some(path);
            }
        }

        candidates.iter().map(PathBuf::from).find(|p| p.exists())
    }
}

impl Renderer for ChromiumRenderer {
    type Session = ChromiumSession;

    async fn open(&self) -> Result<ChromiumSession, CrawlError> {
        Ok(ChromiumSession {
            browser: Arc::clone(&self.browser),
            page: None,
        })
    }
}

/// One browser crawl session, backed by at most one open tab at a time.
pub struct ChromiumSession {
    browser: Arc<Browser>,
    page: Option<Page>,
}

#[derive(Debug, Default, Deserialize)]
struct VitalsSnapshot {
    lcp: f64,
    cls: f64,
}

impl RenderSession for ChromiumSession {
    async fn navigate(
        &mut self,
        url: &str,
        wait: WaitCondition,
        timeout: Duration,
    ) -> Result<RenderedPage, CrawlError> {
        // A retried navigation replaces the previous tab.
        if let Some(old) = self.page.take() {
            let _ = old.close().await;
        }

        let started = Instant::now();
        let result = tokio::time::timeout(timeout, async {
            let page = self
                .browser
                .new_page(url)
                .await
                .map_err(|e| CrawlError::Unreachable(format!("Failed to navigate to {url}: {e}")))?;

            match wait {
                WaitCondition::NetworkIdle => {
                    page.wait_for_navigation().await.map_err(|e| {
                        CrawlError::Unreachable(format!("Navigation did not settle: {e}"))
                    })?;
                }
                WaitCondition::Load => {
                    // <body> present is a minimal signal that the page has
                    // rendered its main content.
                    page.find_element("body").await.map_err(|e| {
                        CrawlError::Unreachable(format!("Page did not render body: {e}"))
                    })?;
                }
                WaitCondition::DomReady => {}
            }

            let html = page
                .content()
                .await
                .map_err(|e| CrawlError::Unreachable(format!("Failed to read page content: {e}")))?;

            let has_csp = page
                .evaluate(
                    "!!document.querySelector('meta[http-equiv=\"Content-Security-Policy\"]')",
                )
                .await
                .ok()
                .and_then(|v| v.into_value::<bool>().ok())
                .unwrap_or(false);

            Ok::<(Page, String, bool), CrawlError>((page, html, has_csp))
        })
        .await;

        match result {
            Ok(Ok((page, html, has_csp))) => {
                self.page = Some(page);
                Ok(RenderedPage {
                    html,
                    // CDP navigation that rendered content is treated as OK;
                    // hard failures surface as Unreachable above.
                    status_code: 200,
                    redirect_count: 0,
                    load_time_ms: started.elapsed().as_millis() as u64,
                    has_tls: url.starts_with("https://"),
                    has_csp,
                })
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CrawlError::Timeout(timeout.as_secs())),
        }
    }

    async fn observe_performance(&mut self, window: Duration) -> PerformanceSample {
        let Some(page) = &self.page else {
            return PerformanceSample::default();
        };

        // Give late layout shifts and LCP candidates time to land, then read
        // the buffered performance entries in one synchronous pass.
        tokio::time::sleep(window).await;

        const VITALS_JS: &str = r#"
            (() => {
                let lcp = 0, cls = 0;
                try {
                    const lcpObs = new PerformanceObserver(() => {});
                    lcpObs.observe({ type: 'largest-contentful-paint', buffered: true });
                    const paints = lcpObs.takeRecords();
                    if (paints.length) lcp = paints[paints.length - 1].startTime;

                    const clsObs = new PerformanceObserver(() => {});
                    clsObs.observe({ type: 'layout-shift', buffered: true });
                    for (const entry of clsObs.takeRecords()) {
                        if (!entry.hadRecentInput) cls += entry.value;
                    }
                } catch (e) {}
                return { lcp, cls };
            })()
        "#;

        let vitals = page
            .evaluate(VITALS_JS)
            .await
            .ok()
            .and_then(|v| v.into_value::<VitalsSnapshot>().ok())
            .unwrap_or_default();

        PerformanceSample {
            largest_contentful_paint_ms: vitals.lcp,
            cumulative_layout_shift: vitals.cls,
            interaction_delay_ms: 0.0,
        }
    }

    async fn close(self) {
        if let Some(page) = self.page {
            let _ = page.close().await;
        }
    }
}
