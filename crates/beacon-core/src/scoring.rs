//! Pure scoring engine: snapshot in, authority score + platform scores +
//! recommendations out.
//!
//! Deterministic with respect to the snapshot. Commentary enrichment is an
//! optional async wrapper; every commentary failure degrades silently to the
//! deterministic output.

use crate::error::CommentaryError;
use crate::fallback::{domain_of, domain_score};
use crate::result::{AuthorityScore, Platform, PlatformScore, ScoreBreakdown};
use crate::snapshot::WebsiteSnapshot;
use crate::traits::CommentaryProvider;

/// Composite weights. Technical and content outweigh freshness and trust.
const W_TECHNICAL: f64 = 0.25;
const W_CONTENT: f64 = 0.25;
const W_AI: f64 = 0.20;
const W_BACKLINK: f64 = 0.15;
const W_FRESHNESS: f64 = 0.075;
const W_TRUST: f64 = 0.075;

const TITLE_RANGE: std::ops::RangeInclusive<usize> = 30..=60;
const META_RANGE: std::ops::RangeInclusive<usize> = 120..=160;

/// Output of one scoring pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    pub authority_score: AuthorityScore,
    pub platform_scores: Vec<PlatformScore>,
    pub recommendations: Vec<String>,
}

/// Maps a [`WebsiteSnapshot`] to scores and recommendations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringEngine;

impl ScoringEngine {
    pub fn new() -> Self {
        Self
    }

    /// Deterministic scoring. Pure with respect to the snapshot; scoring the
    /// same snapshot twice yields an identical outcome.
    pub fn score(&self, snapshot: &WebsiteSnapshot, url: &str) -> ScoreOutcome {
        let breakdown = ScoreBreakdown {
            technical: technical_score(snapshot),
            content: content_score(snapshot),
            ai_optimization: ai_score(snapshot),
            backlink: domain_score(&domain_of(url)),
            freshness: freshness_score(snapshot),
            trust: trust_score(snapshot),
        };

        let overall = (f64::from(breakdown.technical) * W_TECHNICAL
            + f64::from(breakdown.content) * W_CONTENT
            + f64::from(breakdown.ai_optimization) * W_AI
            + f64::from(breakdown.backlink) * W_BACKLINK
            + f64::from(breakdown.freshness) * W_FRESHNESS
            + f64::from(breakdown.trust) * W_TRUST)
            .round()
            .clamp(0.0, 100.0) as u8;

        let authority_score = AuthorityScore { overall, breakdown };

        ScoreOutcome {
            platform_scores: platform_scores(snapshot, &authority_score),
            recommendations: recommendations(snapshot),
            authority_score,
        }
    }

    /// Scoring enriched by the external commentary collaborator.
    ///
    /// Any provider error, timeout, or malformed reply leaves the platform
    /// entry at its deterministic value.
    pub async fn score_with_commentary<P: CommentaryProvider>(
        &self,
        snapshot: &WebsiteSnapshot,
        url: &str,
        provider: &P,
    ) -> ScoreOutcome {
        let mut outcome = self.score(snapshot, url);
        let excerpt = snapshot.excerpt();
        if excerpt.is_empty() {
            return outcome;
        }

        for entry in &mut outcome.platform_scores {
            match provider.review(&excerpt, entry.platform).await {
                Ok(commentary) => {
                    // Blend the collaborator's score with the deterministic one.
                    entry.score =
                        ((u16::from(entry.score) + u16::from(commentary.score.min(100))) / 2) as u8;
                    entry.commentary = Some(commentary.summary);
                }
                Err(CommentaryError::Disabled) => {}
                Err(e) => {
                    tracing::debug!(platform = %entry.platform, error = %e, "commentary unavailable");
                }
            }
        }
        outcome
    }
}

fn technical_score(s: &WebsiteSnapshot) -> u8 {
    let mut score: i32 = 35;
    if s.technical.is_mobile_optimized {
        score += 25;
    }
    // Resource discipline.
    let res = &s.technical.resource_stats;
    if res.scripts <= 15 {
        score += 10;
    }
    if res.stylesheets <= 8 {
        score += 5;
    }
    // Image hygiene.
    let img = &s.technical.image_stats;
    if img.total == 0 || img.missing_alt == 0 {
        score += 10;
    }
    // Load time tiers.
    match s.performance.load_time_ms {
        0..=1500 => score += 15,
        1501..=3000 => score += 8,
        _ => {}
    }
    score.clamp(0, 100) as u8
}

fn content_score(s: &WebsiteSnapshot) -> u8 {
    let c = &s.content;
    let mut score = (c.readability_score.clamp(0.0, 100.0) * 0.4) as i32;
    if c.word_count >= 300 {
        score += 20;
    }
    if c.word_count >= 800 {
        score += 10;
    }
    if c.paragraph_count >= 5 {
        score += 10;
    }
    if c.heading_structure.is_well_formed() {
        score += 10;
    }
    if TITLE_RANGE.contains(&s.seo.title.chars().count()) {
        score += 5;
    }
    if META_RANGE.contains(&s.seo.meta_description.chars().count()) {
        score += 5;
    }
    score.clamp(0, 100) as u8
}

fn ai_score(s: &WebsiteSnapshot) -> u8 {
    let ai = &s.ai_factors;
    let mut score: i32 = 10;
    score += (ai.schema_markup_count.min(3) * 10) as i32;
    if ai.platform_heuristics.has_faq_markup {
        score += 25;
    }
    if ai.platform_heuristics.has_citations {
        score += 20;
    }
    if ai.platform_heuristics.has_tabular_data {
        score += 10;
    }
    if ai.platform_heuristics.has_code_blocks {
        score += 5;
    }
    score.clamp(0, 100) as u8
}

fn freshness_score(s: &WebsiteSnapshot) -> u8 {
    let mut score: i32 = 25;
    if s.content.freshness.has_published_date {
        score += 50;
    }
    if s.content.authorship.has_author {
        score += 15;
    }
    score.clamp(0, 100) as u8
}

fn trust_score(s: &WebsiteSnapshot) -> u8 {
    let mut score: i32 = 0;
    if s.security.has_tls {
        score += 50;
    }
    if s.security.has_csp {
        score += 20;
    }
    if s.content.authorship.has_author {
        score += 15;
    }
    if !s.seo.canonical.is_empty() {
        score += 15;
    }
    score.clamp(0, 100) as u8
}

/// Deterministic per-platform base scores: each platform weighs the overall
/// score against the dimension it cares most about.
fn platform_scores(s: &WebsiteSnapshot, authority: &AuthorityScore) -> Vec<PlatformScore> {
    let b = &authority.breakdown;
    Platform::ALL
        .iter()
        .map(|&platform| {
            let emphasized = match platform {
                Platform::ChatGpt => b.ai_optimization,
                Platform::Claude => b.content,
                Platform::Perplexity => {
                    if s.ai_factors.platform_heuristics.has_citations {
                        b.ai_optimization.max(b.trust)
                    } else {
                        b.trust
                    }
                }
                Platform::Gemini => b.technical,
            };
            let score =
                ((u16::from(authority.overall) * 6 + u16::from(emphasized) * 4) / 10) as u8;
            PlatformScore {
                platform,
                score,
                commentary: None,
            }
        })
        .collect()
}

fn recommendations(s: &WebsiteSnapshot) -> Vec<String> {
    let mut out = Vec::new();
    let title_len = s.seo.title.chars().count();
    if !TITLE_RANGE.contains(&title_len) {
        out.push(format!(
            "Keep the title between 30 and 60 characters (currently {title_len})"
        ));
    }
    let meta_len = s.seo.meta_description.chars().count();
    if !META_RANGE.contains(&meta_len) {
        out.push(format!(
            "Keep the meta description between 120 and 160 characters (currently {meta_len})"
        ));
    }
    if !s.content.heading_structure.is_well_formed() {
        out.push("Use exactly one H1 and at least one H2 heading".to_string());
    }
    if s.ai_factors.schema_markup_count == 0 {
        out.push("Add JSON-LD structured data describing the page".to_string());
    }
    if !s.ai_factors.platform_heuristics.has_faq_markup {
        out.push("Add FAQ-style markup for answer-engine visibility".to_string());
    }
    if !s.technical.is_mobile_optimized {
        out.push("Add a viewport meta tag for mobile rendering".to_string());
    }
    if s.performance.load_time_ms > 3000 {
        out.push("Reduce page load time below 3 seconds".to_string());
    }
    if !s.security.has_tls {
        out.push("Serve the site over HTTPS".to_string());
    }
    if s.technical.image_stats.missing_alt > 0 {
        out.push(format!(
            "Add alt text to {} image(s)",
            s.technical.image_stats.missing_alt
        ));
    }
    if s.content.word_count < 300 {
        out.push("Expand the main content to at least 300 words".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommentaryError;
    use crate::testutil::{MockCommentary, make_rich_snapshot};
    use crate::traits::{NullCommentary, PlatformCommentary};

    #[test]
    fn scoring_is_idempotent() {
        let snapshot = make_rich_snapshot();
        let engine = ScoringEngine::new();
        let a = engine.score(&snapshot, "https://example.com");
        let b = engine.score(&snapshot, "https://example.com");
        assert_eq!(a.authority_score, b.authority_score);
        assert_eq!(a.platform_scores, b.platform_scores);
        assert_eq!(a.recommendations, b.recommendations);
    }

    #[test]
    fn rich_snapshot_scores_higher_than_empty() {
        let engine = ScoringEngine::new();
        let rich = engine.score(&make_rich_snapshot(), "https://example.com");
        let empty = engine.score(&WebsiteSnapshot::default(), "https://example.com");
        assert!(rich.authority_score.overall > empty.authority_score.overall);
    }

    #[test]
    fn empty_snapshot_still_yields_bounded_scores() {
        let outcome = ScoringEngine::new().score(&WebsiteSnapshot::default(), "https://x.dev");
        assert!(outcome.authority_score.overall <= 100);
        assert_eq!(outcome.platform_scores.len(), Platform::ALL.len());
        for entry in &outcome.platform_scores {
            assert!(entry.score <= 100);
            assert!(entry.commentary.is_none());
        }
        // An empty page trips most recommendation rules.
        assert!(outcome.recommendations.len() >= 5);
    }

    #[test]
    fn well_formed_page_has_few_recommendations() {
        let outcome = ScoringEngine::new().score(&make_rich_snapshot(), "https://example.com");
        assert!(outcome.recommendations.is_empty());
    }

    #[tokio::test]
    async fn commentary_enriches_platform_scores() {
        let engine = ScoringEngine::new();
        let snapshot = make_rich_snapshot();
        let provider = MockCommentary::new(PlatformCommentary {
            score: 100,
            summary: "Strong answer-engine presence".into(),
        });

        let plain = engine.score(&snapshot, "https://example.com");
        let enriched = engine
            .score_with_commentary(&snapshot, "https://example.com", &provider)
            .await;

        for (before, after) in plain.platform_scores.iter().zip(&enriched.platform_scores) {
            assert!(after.score >= before.score);
            assert!(after.commentary.is_some());
        }
        // The deterministic authority score is untouched by commentary.
        assert_eq!(plain.authority_score, enriched.authority_score);
    }

    #[tokio::test]
    async fn commentary_failure_degrades_to_deterministic() {
        let engine = ScoringEngine::new();
        let snapshot = make_rich_snapshot();
        let provider = MockCommentary::with_error(CommentaryError::Timeout(10));

        let plain = engine.score(&snapshot, "https://example.com");
        let enriched = engine
            .score_with_commentary(&snapshot, "https://example.com", &provider)
            .await;

        assert_eq!(plain.platform_scores, enriched.platform_scores);
    }

    #[tokio::test]
    async fn null_commentary_is_silent() {
        let engine = ScoringEngine::new();
        let snapshot = make_rich_snapshot();
        let plain = engine.score(&snapshot, "https://example.com");
        let enriched = engine
            .score_with_commentary(&snapshot, "https://example.com", &NullCommentary)
            .await;
        assert_eq!(plain.platform_scores, enriched.platform_scores);
    }
}
