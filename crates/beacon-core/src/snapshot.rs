//! Immutable structured result of one crawl.
//!
//! Every field is always populated — missing data becomes a zero or empty
//! value, never an absent one — so consumers never branch on "undefined".

use serde::{Deserialize, Serialize};

/// Navigation-level performance data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceData {
    pub load_time_ms: u64,
    pub status_code: u16,
    pub redirect_count: u32,
}

/// Core Web Vitals sampled over a bounded observation window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreWebVitals {
    pub largest_contentful_paint_ms: f64,
    pub cumulative_layout_shift: f64,
    pub interaction_delay_ms: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageStats {
    pub total: u32,
    pub missing_alt: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStats {
    pub scripts: u32,
    pub stylesheets: u32,
    pub links: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalData {
    pub core_web_vitals: CoreWebVitals,
    pub is_mobile_optimized: bool,
    pub image_stats: ImageStats,
    pub resource_stats: ResourceStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingStructure {
    pub h1: u32,
    pub h2: u32,
    pub h3: u32,
}

impl HeadingStructure {
    /// Exactly one top-level heading and at least one sub-heading.
    pub fn is_well_formed(&self) -> bool {
        self.h1 == 1 && self.h2 >= 1
    }
}

/// Authorship heuristics from common markup conventions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorship {
    pub has_author: bool,
    pub author: String,
}

/// Freshness heuristics from common markup conventions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Freshness {
    pub has_published_date: bool,
    /// Raw date string as found in the markup; empty when absent.
    pub published_hint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentData {
    pub word_count: u32,
    /// Flesch reading-ease, clamped to 0–100.
    pub readability_score: f64,
    pub heading_structure: HeadingStructure,
    pub paragraph_count: u32,
    pub authorship: Authorship,
    pub freshness: Freshness,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeoData {
    pub title: String,
    pub meta_description: String,
    pub canonical: String,
    /// Every parseable JSON-LD block on the page, one entry per block.
    pub structured_data_blocks: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityData {
    pub has_tls: bool,
    pub has_csp: bool,
}

/// Heuristic flags that matter to answer-engine platforms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformHeuristics {
    pub has_faq_markup: bool,
    pub has_citations: bool,
    pub has_tabular_data: bool,
    pub has_code_blocks: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiFactors {
    pub schema_markup_count: u32,
    pub faq_count: u32,
    pub citation_count: u32,
    pub platform_heuristics: PlatformHeuristics,
}

/// Immutable per-crawl structure covering performance, technical, content,
/// SEO, security, and AI-heuristic signals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteSnapshot {
    pub performance: PerformanceData,
    pub technical: TechnicalData,
    pub content: ContentData,
    pub seo: SeoData,
    pub security: SecurityData,
    pub ai_factors: AiFactors,
}

impl WebsiteSnapshot {
    /// Short text excerpt handed to the commentary collaborator.
    pub fn excerpt(&self) -> String {
        let mut out = self.seo.title.clone();
        if !self.seo.meta_description.is_empty() {
            if !out.is_empty() {
                out.push_str(" — ");
            }
            out.push_str(&self.seo.meta_description);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_snapshot_is_fully_populated() {
        let snapshot = WebsiteSnapshot::default();
        // Serialize and confirm nothing is null: every field has a concrete
        // zero/empty value.
        let value = serde_json::to_value(&snapshot).unwrap();
        fn assert_no_null(v: &serde_json::Value) {
            match v {
                serde_json::Value::Null => panic!("snapshot field serialized as null"),
                serde_json::Value::Object(map) => map.values().for_each(assert_no_null),
                serde_json::Value::Array(items) => items.iter().for_each(assert_no_null),
                _ => {}
            }
        }
        assert_no_null(&value);
    }

    #[test]
    fn heading_structure_rules() {
        let good = HeadingStructure { h1: 1, h2: 3, h3: 0 };
        assert!(good.is_well_formed());
        let two_tops = HeadingStructure { h1: 2, h2: 3, h3: 0 };
        assert!(!two_tops.is_well_formed());
        let no_subs = HeadingStructure { h1: 1, h2: 0, h3: 4 };
        assert!(!no_subs.is_well_formed());
    }

    #[test]
    fn excerpt_joins_title_and_description() {
        let mut snapshot = WebsiteSnapshot::default();
        snapshot.seo.title = "Acme Widgets".into();
        snapshot.seo.meta_description = "Widgets for every occasion.".into();
        assert_eq!(snapshot.excerpt(), "Acme Widgets — Widgets for every occasion.");

        snapshot.seo.meta_description.clear();
        assert_eq!(snapshot.excerpt(), "Acme Widgets");
    }
}
