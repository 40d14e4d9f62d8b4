//! Turns a rendered page into a [`WebsiteSnapshot`].
//!
//! Navigation uses a descending ladder of wait conditions: start with the
//! highest-fidelity wait and a generous timeout, then retry with looser
//! conditions and tighter timeouts. A partially rendered page beats no page.

use std::time::Duration;

use beacon_core::error::CrawlError;
use beacon_core::job::AnalysisOptions;
use beacon_core::snapshot::{
    AiFactors, Authorship, ContentData, Freshness, HeadingStructure, ImageStats, PerformanceData,
    PlatformHeuristics, ResourceStats, SecurityData, SeoData, TechnicalData, WebsiteSnapshot,
};
use beacon_core::traits::{
    Crawler, PerformanceSample, RenderSession, RenderedPage, Renderer, WaitCondition,
};
use scraper::{Html, Selector};

/// Wait-condition ladder, strictest first.
const NAVIGATION_LADDER: [(WaitCondition, Duration); 3] = [
    (WaitCondition::NetworkIdle, Duration::from_secs(60)),
    (WaitCondition::Load, Duration::from_secs(30)),
    (WaitCondition::DomReady, Duration::from_secs(15)),
];

/// How long to watch for late layout shifts and LCP candidates.
const OBSERVE_WINDOW: Duration = Duration::from_secs(5);

/// Crawls a URL through a [`Renderer`] and extracts every snapshot signal.
#[derive(Clone)]
pub struct FeatureExtractor<R: Renderer> {
    renderer: R,
}

impl<R: Renderer> FeatureExtractor<R> {
    pub fn new(renderer: R) -> Self {
        Self { renderer }
    }

    /// Walk the ladder until a page renders with a 2xx status.
    async fn navigate_with_retries(
        session: &mut R::Session,
        url: &str,
    ) -> Result<RenderedPage, CrawlError> {
        let last_tier = NAVIGATION_LADDER.len() - 1;
        for (tier, (wait, timeout)) in NAVIGATION_LADDER.iter().enumerate() {
            match session.navigate(url, *wait, *timeout).await {
                Ok(page) if (200..300).contains(&page.status_code) => return Ok(page),
                Ok(page) => {
                    let error = CrawlError::Status {
                        status: page.status_code,
                        url: url.to_string(),
                    };
                    if tier == last_tier || !error.is_retryable() {
                        return Err(error);
                    }
                    tracing::debug!(%url, status = page.status_code, tier, "Retrying with looser wait");
                }
                Err(e) => {
                    if tier == last_tier || !e.is_retryable() {
                        return Err(e);
                    }
                    tracing::debug!(%url, error = %e, tier, "Retrying with looser wait");
                }
            }
        }
        unreachable!("ladder always returns from its last tier")
    }
}

impl<R: Renderer + 'static> Crawler for FeatureExtractor<R> {
    async fn crawl(
        &self,
        url: &str,
        options: &AnalysisOptions,
    ) -> Result<WebsiteSnapshot, CrawlError> {
        let mut session = self.renderer.open().await?;

        // The session must be torn down on every exit path.
        let page = match Self::navigate_with_retries(&mut session, url).await {
            Ok(page) => page,
            Err(e) => {
                session.close().await;
                return Err(e);
            }
        };

        let vitals = if options.include_performance {
            session.observe_performance(OBSERVE_WINDOW).await
        } else {
            PerformanceSample::default()
        };
        session.close().await;

        Ok(build_snapshot(&page, vitals, options))
    }
}

// ---------------------------------------------------------------------------
// Signal extraction
// ---------------------------------------------------------------------------

fn build_snapshot(
    page: &RenderedPage,
    vitals: PerformanceSample,
    options: &AnalysisOptions,
) -> WebsiteSnapshot {
    let doc = Html::parse_document(&page.html);

    let structured_data_blocks = structured_data(&doc);
    let ai_factors = if options.include_ai_factors {
        extract_ai_factors(&doc, &structured_data_blocks)
    } else {
        AiFactors::default()
    };

    let mut snapshot = WebsiteSnapshot {
        performance: PerformanceData {
            load_time_ms: page.load_time_ms,
            status_code: page.status_code,
            redirect_count: page.redirect_count,
        },
        technical: TechnicalData {
            core_web_vitals: Default::default(),
            is_mobile_optimized: is_mobile_optimized(&doc),
            image_stats: image_stats(&doc),
            resource_stats: ResourceStats {
                scripts: count(&doc, "script[src]"),
                stylesheets: count(&doc, "link[rel=\"stylesheet\"]"),
                links: count(&doc, "a[href]"),
            },
        },
        content: extract_content(&doc),
        seo: SeoData {
            title: first_text(&doc, "title"),
            meta_description: first_attr(&doc, "meta[name=\"description\"]", "content"),
            canonical: first_attr(&doc, "link[rel=\"canonical\"]", "href"),
            structured_data_blocks,
        },
        security: SecurityData {
            has_tls: page.has_tls,
            has_csp: page.has_csp || has_meta_csp(&doc),
        },
        ai_factors,
    };

    snapshot.technical.core_web_vitals.largest_contentful_paint_ms =
        vitals.largest_contentful_paint_ms;
    snapshot.technical.core_web_vitals.cumulative_layout_shift = vitals.cumulative_layout_shift;
    snapshot.technical.core_web_vitals.interaction_delay_ms = vitals.interaction_delay_ms;

    snapshot
}

/// Count elements matching a selector; an unparseable selector counts zero.
fn count(doc: &Html, selector: &str) -> u32 {
    Selector::parse(selector)
        .map(|s| doc.select(&s).count() as u32)
        .unwrap_or(0)
}

fn first_text(doc: &Html, selector: &str) -> String {
    Selector::parse(selector)
        .ok()
        .and_then(|s| {
            doc.select(&s)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
        })
        .unwrap_or_default()
}

fn first_attr(doc: &Html, selector: &str, attr: &str) -> String {
    Selector::parse(selector)
        .ok()
        .and_then(|s| {
            doc.select(&s)
                .next()
                .and_then(|el| el.value().attr(attr))
                .map(|v| v.trim().to_string())
        })
        .unwrap_or_default()
}

fn is_mobile_optimized(doc: &Html) -> bool {
    first_attr(doc, "meta[name=\"viewport\"]", "content").contains("width")
}

fn has_meta_csp(doc: &Html) -> bool {
    count(doc, "meta[http-equiv=\"Content-Security-Policy\"]") > 0
}

fn image_stats(doc: &Html) -> ImageStats {
    let total = count(doc, "img");
    let with_alt = Selector::parse("img")
        .map(|s| {
            doc.select(&s)
                .filter(|el| el.value().attr("alt").is_some_and(|alt| !alt.trim().is_empty()))
                .count() as u32
        })
        .unwrap_or(0);
    ImageStats {
        total,
        missing_alt: total.saturating_sub(with_alt),
    }
}

/// Visible prose: text of the common content-bearing elements. Skips
/// scripts, styles, and nav chrome by construction.
fn visible_text(doc: &Html) -> String {
    Selector::parse("p, li, h1, h2, h3, h4, blockquote, td, figcaption")
        .map(|s| {
            doc.select(&s)
                .map(|el| el.text().collect::<String>())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

fn extract_content(doc: &Html) -> ContentData {
    let text = visible_text(doc);
    let words: Vec<&str> = text.split_whitespace().collect();

    let author = [
        first_attr(doc, "meta[name=\"author\"]", "content"),
        first_text(doc, "a[rel=\"author\"]"),
        first_text(doc, ".author"),
    ]
    .into_iter()
    .find(|candidate| !candidate.is_empty())
    .unwrap_or_default();

    let published_hint = [
        first_attr(doc, "meta[property=\"article:published_time\"]", "content"),
        first_attr(doc, "time[datetime]", "datetime"),
    ]
    .into_iter()
    .find(|candidate| !candidate.is_empty())
    .unwrap_or_default();

    ContentData {
        word_count: words.len() as u32,
        readability_score: flesch_reading_ease(&words, &text),
        heading_structure: HeadingStructure {
            h1: count(doc, "h1"),
            h2: count(doc, "h2"),
            h3: count(doc, "h3"),
        },
        paragraph_count: count(doc, "p"),
        authorship: Authorship {
            has_author: !author.is_empty(),
            author,
        },
        freshness: Freshness {
            has_published_date: !published_hint.is_empty(),
            published_hint,
        },
    }
}

/// Flesch reading-ease over the visible prose, clamped to 0–100.
fn flesch_reading_ease(words: &[&str], text: &str) -> f64 {
    if words.is_empty() {
        return 0.0;
    }
    let sentences = text
        .split(['.', '!', '?'])
        .filter(|s| s.split_whitespace().next().is_some())
        .count()
        .max(1) as f64;
    let syllables: usize = words.iter().map(|w| syllable_estimate(w)).sum();

    let word_count = words.len() as f64;
    let score = 206.835 - 1.015 * (word_count / sentences) - 84.6 * (syllables as f64 / word_count);
    score.clamp(0.0, 100.0)
}

/// Vowel-group syllable heuristic: good enough for a readability estimate.
fn syllable_estimate(word: &str) -> usize {
    let mut syllables = 0usize;
    let mut previous_was_vowel = false;
    for c in word.chars().flat_map(|c| c.to_lowercase()) {
        let is_vowel = matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
        if is_vowel && !previous_was_vowel {
            syllables += 1;
        }
        previous_was_vowel = is_vowel;
    }
    // Trailing silent 'e'.
    if word.len() > 2 && word.to_lowercase().ends_with('e') && syllables > 1 {
        syllables -= 1;
    }
    syllables.max(1)
}

/// Every parseable JSON-LD block; malformed blocks are skipped individually
/// so one bad script never hides its siblings.
fn structured_data(doc: &Html) -> Vec<serde_json::Value> {
    Selector::parse("script[type=\"application/ld+json\"]")
        .map(|s| {
            doc.select(&s)
                .filter_map(|el| {
                    let raw = el.text().collect::<String>();
                    match serde_json::from_str(&raw) {
                        Ok(value) => Some(value),
                        Err(e) => {
                            tracing::debug!(error = %e, "Skipping malformed JSON-LD block");
                            None
                        }
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

fn extract_ai_factors(doc: &Html, blocks: &[serde_json::Value]) -> AiFactors {
    let faq_from_schema: u32 = blocks
        .iter()
        .filter(|b| b.get("@type").and_then(|t| t.as_str()) == Some("FAQPage"))
        .map(|b| {
            b.get("mainEntity")
                .and_then(|m| m.as_array())
                .map(|entities| entities.len() as u32)
                .unwrap_or(1)
        })
        .sum();
    let faq_count = faq_from_schema + count(doc, "details > summary");

    let citation_count = count(doc, "cite")
        + count(doc, "p a[href^=\"http\"], li a[href^=\"http\"], sup a[href]");

    AiFactors {
        schema_markup_count: blocks.len() as u32,
        faq_count,
        citation_count,
        platform_heuristics: PlatformHeuristics {
            has_faq_markup: faq_count > 0,
            has_citations: citation_count > 0,
            has_tabular_data: count(doc, "table") > 0,
            has_code_blocks: count(doc, "pre code") > 0,
        },
    }
}
