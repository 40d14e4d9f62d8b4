//! Structured-data (JSON-LD) validation.
//!
//! A static required/recommended-property table per declared `@type`, plus
//! nested-type restriction checks and value-shape checks. The score starts
//! at 100 and is decremented per violation class, floored at 0.

use chrono::NaiveDate;
use serde_json::Value;
use url::Url;

const PENALTY_MISSING_CONTEXT: i32 = 20;
const PENALTY_MISSING_TYPE: i32 = 25;
const PENALTY_MISSING_REQUIRED: i32 = 15;
const PENALTY_MISSING_RECOMMENDED: i32 = 5;
const PENALTY_MALFORMED_URL: i32 = 10;
const PENALTY_MALFORMED_VALUE: i32 = 5;
const PENALTY_BAD_NESTED_TYPE: i32 = 10;

/// Per-type property rules. Process-wide, read-only.
struct TypeRules {
    type_name: &'static str,
    required: &'static [&'static str],
    recommended: &'static [&'static str],
    /// (property, allowed nested @type values)
    nested: &'static [(&'static str, &'static [&'static str])],
}

const RULES: &[TypeRules] = &[
    TypeRules {
        type_name: "Article",
        required: &["headline", "author", "datePublished"],
        recommended: &["image", "dateModified", "publisher"],
        nested: &[
            ("author", &["Person", "Organization"]),
            ("publisher", &["Organization"]),
        ],
    },
    TypeRules {
        type_name: "Product",
        required: &["name", "offers"],
        recommended: &["image", "description", "brand", "aggregateRating"],
        nested: &[("offers", &["Offer", "AggregateOffer"])],
    },
    TypeRules {
        type_name: "FAQPage",
        required: &["mainEntity"],
        recommended: &[],
        nested: &[("mainEntity", &["Question"])],
    },
    TypeRules {
        type_name: "Organization",
        required: &["name", "url"],
        recommended: &["logo", "sameAs", "contactPoint"],
        nested: &[],
    },
    TypeRules {
        type_name: "LocalBusiness",
        required: &["name", "address"],
        recommended: &["telephone", "openingHours", "geo", "priceRange"],
        nested: &[("address", &["PostalAddress"])],
    },
    TypeRules {
        type_name: "WebSite",
        required: &["name", "url"],
        recommended: &["potentialAction"],
        nested: &[],
    },
];

/// Properties whose string values must parse as URLs.
const URL_PROPS: &[&str] = &["url", "image", "logo", "sameAs"];
/// Properties whose string values must parse as dates.
const DATE_PROPS: &[&str] = &["datePublished", "dateModified"];
/// Numeric properties with an allowed range.
const RANGE_PROPS: &[(&str, f64, f64)] = &[("ratingValue", 0.0, 5.0), ("price", 0.0, f64::MAX)];

/// Outcome of validating one structured-data block.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// 100 minus penalties, floored at 0.
    pub score: u8,
}

/// Validate a structured-data block against the static rule table.
pub fn validate(block: &Value) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut penalty: i32 = 0;

    let obj = match block.as_object() {
        Some(obj) => obj,
        None => {
            return ValidationReport {
                is_valid: false,
                errors: vec!["Structured data block is not a JSON object".to_string()],
                warnings,
                score: 0,
            };
        }
    };

    if !obj.contains_key("@context") {
        errors.push("Missing @context property".to_string());
        penalty += PENALTY_MISSING_CONTEXT;
    }

    let declared = obj.get("@type").and_then(Value::as_str);
    match declared {
        None => {
            errors.push("Missing @type property".to_string());
            penalty += PENALTY_MISSING_TYPE;
        }
        Some(type_name) => {
            if let Some(rules) = RULES.iter().find(|r| r.type_name == type_name) {
                for prop in rules.required {
                    if !obj.contains_key(*prop) {
                        errors.push(format!("{type_name} is missing required property '{prop}'"));
                        penalty += PENALTY_MISSING_REQUIRED;
                    }
                }
                for prop in rules.recommended {
                    if !obj.contains_key(*prop) {
                        warnings
                            .push(format!("{type_name} is missing recommended property '{prop}'"));
                        penalty += PENALTY_MISSING_RECOMMENDED;
                    }
                }
                for (prop, allowed) in rules.nested {
                    if let Some(nested) = obj.get(*prop) {
                        check_nested_type(prop, nested, allowed, &mut errors, &mut penalty);
                    }
                }
            } else {
                warnings.push(format!("Unknown @type '{type_name}', property rules skipped"));
            }
        }
    }

    for (key, value) in obj {
        check_value_shape(key, value, &mut errors, &mut penalty);
    }

    let score = (100 - penalty).clamp(0, 100) as u8;
    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
        warnings,
        score,
    }
}

/// A nested property must declare one of the allowed @type values.
/// Arrays are checked element-wise; plain strings are tolerated.
fn check_nested_type(
    prop: &str,
    value: &Value,
    allowed: &[&str],
    errors: &mut Vec<String>,
    penalty: &mut i32,
) {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    for item in items {
        if let Some(obj) = item.as_object() {
            let nested_type = obj.get("@type").and_then(Value::as_str).unwrap_or("");
            if !allowed.contains(&nested_type) {
                errors.push(format!(
                    "Property '{prop}' must be one of [{}], found '{nested_type}'",
                    allowed.join(", ")
                ));
                *penalty += PENALTY_BAD_NESTED_TYPE;
            }
        }
    }
}

fn check_value_shape(key: &str, value: &Value, errors: &mut Vec<String>, penalty: &mut i32) {
    if URL_PROPS.contains(&key) {
        if let Some(s) = value.as_str() {
            if Url::parse(s).is_err() {
                errors.push(format!("Property '{key}' is not a valid URL: {s}"));
                *penalty += PENALTY_MALFORMED_URL;
            }
        }
    }
    if DATE_PROPS.contains(&key) {
        if let Some(s) = value.as_str() {
            let ok = chrono::DateTime::parse_from_rfc3339(s).is_ok()
                || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok();
            if !ok {
                errors.push(format!("Property '{key}' is not a valid date: {s}"));
                *penalty += PENALTY_MALFORMED_VALUE;
            }
        }
    }
    for (prop, min, max) in RANGE_PROPS {
        if key == *prop {
            let number = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.parse::<f64>().ok(),
                _ => None,
            };
            match number {
                Some(n) if (*min..=*max).contains(&n) => {}
                _ => {
                    errors.push(format!("Property '{key}' is out of range or not numeric"));
                    *penalty += PENALTY_MALFORMED_VALUE;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn complete_article_is_valid() {
        let block = json!({
            "@context": "https://schema.org",
            "@type": "Article",
            "headline": "How queues work",
            "author": {"@type": "Person", "name": "A. Writer"},
            "datePublished": "2024-06-01",
            "image": "https://example.com/cover.png",
            "dateModified": "2024-06-02",
            "publisher": {"@type": "Organization", "name": "Example"}
        });
        let report = validate(&block);
        assert!(report.is_valid, "errors: {:?}", report.errors);
        assert_eq!(report.score, 100);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn missing_context_and_type_drops_at_least_45() {
        let block = json!({"headline": "Untyped block"});
        let report = validate(&block);
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("@context")));
        assert!(report.errors.iter().any(|e| e.contains("@type")));
        assert!(report.score <= 55);
    }

    #[test]
    fn missing_required_properties_are_errors() {
        let block = json!({
            "@context": "https://schema.org",
            "@type": "Article",
            "headline": "No author or date"
        });
        let report = validate(&block);
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("'author'")));
        assert!(report.errors.iter().any(|e| e.contains("'datePublished'")));
        // 2 required (−15 each) + 3 recommended (−5 each).
        assert_eq!(report.score, 100 - 30 - 15);
    }

    #[test]
    fn missing_recommended_properties_are_warnings() {
        let block = json!({
            "@context": "https://schema.org",
            "@type": "Organization",
            "name": "Example",
            "url": "https://example.com"
        });
        let report = validate(&block);
        assert!(report.is_valid);
        assert_eq!(report.warnings.len(), 3);
        assert_eq!(report.score, 100 - 15);
    }

    #[test]
    fn malformed_url_and_date_are_flagged() {
        let block = json!({
            "@context": "https://schema.org",
            "@type": "Article",
            "headline": "Bad values",
            "author": {"@type": "Person", "name": "A"},
            "datePublished": "last Tuesday",
            "image": "not a url",
            "dateModified": "2024-06-02",
            "publisher": {"@type": "Organization", "name": "E"}
        });
        let report = validate(&block);
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("valid URL")));
        assert!(report.errors.iter().any(|e| e.contains("valid date")));
    }

    #[test]
    fn nested_type_restriction_is_enforced() {
        let block = json!({
            "@context": "https://schema.org",
            "@type": "Article",
            "headline": "Bad author type",
            "author": {"@type": "Thing", "name": "A"},
            "datePublished": "2024-06-01",
            "image": "https://example.com/i.png",
            "dateModified": "2024-06-02",
            "publisher": {"@type": "Organization", "name": "E"}
        });
        let report = validate(&block);
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("'author'")));
    }

    #[test]
    fn rating_range_is_checked() {
        let block = json!({
            "@context": "https://schema.org",
            "@type": "Product",
            "name": "Widget",
            "offers": {"@type": "Offer", "price": "19.99"},
            "ratingValue": 7.3
        });
        let report = validate(&block);
        assert!(report.errors.iter().any(|e| e.contains("ratingValue")));
    }

    #[test]
    fn non_object_block_scores_zero() {
        let report = validate(&json!(["not", "an", "object"]));
        assert!(!report.is_valid);
        assert_eq!(report.score, 0);
    }

    #[test]
    fn unknown_type_is_a_warning_not_error() {
        let block = json!({
            "@context": "https://schema.org",
            "@type": "VideoGame",
            "name": "Quest"
        });
        let report = validate(&block);
        assert!(report.is_valid);
        assert!(report.warnings.iter().any(|w| w.contains("Unknown @type")));
    }
}
