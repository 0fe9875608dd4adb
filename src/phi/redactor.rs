//! PHI redaction
//!
//! The redactor runs its own scan on every call; it cannot reuse earlier
//! findings because those never carry the raw text or byte offsets.
//!
//! Known limitation: `redact(redact(x))` is not guaranteed to equal
//! `redact(x)`. A `[<CATEGORY>_REDACTED]` marker, combined with adjacent
//! text, may itself match a detector on a second pass.

use super::catalog::{PatternCatalog, PhiCategory, RawMatch};
use super::scanner::visit_strings;
use crate::error::Result;
use std::sync::Arc;

/// Replaces detected spans with category markers
#[derive(Debug, Clone)]
pub struct Redactor {
    catalog: Arc<PatternCatalog>,
}

/// Marker inserted in place of a detected span
pub fn marker(category: PhiCategory) -> String {
    format!("[{}_REDACTED]", category)
}

impl Redactor {
    /// Redactor over the built-in catalog
    pub fn new() -> Result<Self> {
        Ok(Self {
            catalog: PatternCatalog::builtin()?,
        })
    }

    /// Redactor over a custom catalog
    pub fn with_catalog(catalog: Arc<PatternCatalog>) -> Self {
        Self { catalog }
    }

    /// Redact every detected span in `text`. Returns `text` unchanged when
    /// nothing is detected.
    pub fn redact(&self, text: &str) -> String {
        let spans = merge_overlapping(self.catalog.raw_matches(text));
        if spans.is_empty() {
            return text.to_string();
        }

        let mut result = text.to_string();
        // Descending start order keeps earlier offsets valid
        for span in spans.iter().rev() {
            result.replace_range(span.start..span.end, &marker(span.category));
        }

        tracing::debug!(redactions = spans.len(), "Redacted PHI spans");
        result
    }

    /// Redact every string leaf of a JSON document. Keys and non-string
    /// values are left as they are.
    pub fn redact_json(&self, value: &serde_json::Value) -> serde_json::Value {
        match value {
            serde_json::Value::String(s) => serde_json::Value::String(self.redact(s)),
            serde_json::Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(|v| self.redact_json(v)).collect())
            }
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.redact_json(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Whether any string leaf of `value` would be changed by redaction
    pub fn json_contains_phi(&self, value: &serde_json::Value) -> bool {
        let mut found = false;
        visit_strings(value, &mut |s| {
            found = found || !self.catalog.raw_matches(s).is_empty();
        });
        found
    }
}

/// Merge overlapping matches into disjoint spans sorted by ascending start.
///
/// A merged span takes the category of its highest-confidence member,
/// falling back to catalog order on ties.
fn merge_overlapping(mut matches: Vec<RawMatch>) -> Vec<RawMatch> {
    matches.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut merged: Vec<RawMatch> = Vec::with_capacity(matches.len());
    for m in matches {
        if let Some(last) = merged.last_mut() {
            if m.start < last.end {
                last.end = last.end.max(m.end);
                let wins = m.base_confidence > last.base_confidence
                    || (m.base_confidence == last.base_confidence && m.rank < last.rank);
                if wins {
                    last.category = m.category;
                    last.base_confidence = m.base_confidence;
                    last.rank = m.rank;
                }
                continue;
            }
        }
        merged.push(m);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redactor() -> Redactor {
        Redactor::new().unwrap()
    }

    #[test]
    fn test_redact_ssn_and_mrn() {
        let out = redactor().redact("SSN: 123-45-6789, MRN: MRN-12345678");
        assert_eq!(out, "SSN: [SSN_REDACTED], MRN: [MRN_REDACTED]");
    }

    #[test]
    fn test_clean_text_is_identity() {
        let clean = "Protocol amendment 4 approved by the IRB.";
        assert_eq!(redactor().redact(clean), clean);
        assert_eq!(redactor().redact(""), "");
    }

    #[test]
    fn test_multiple_spans_no_index_drift() {
        let text = "a@example.com called 555-123-4567 on 04/12/1987";
        let out = redactor().redact(text);
        assert_eq!(
            out,
            "[EMAIL_REDACTED] called [PHONE_REDACTED] on [DOB_REDACTED]"
        );
    }

    #[test]
    fn test_non_ascii_text() {
        let out = redactor().redact("Pâtient ✓ 123-45-6789 ✓");
        assert_eq!(out, "Pâtient ✓ [SSN_REDACTED] ✓");
    }

    #[test]
    fn test_overlapping_spans_leave_nothing_behind() {
        let a = RawMatch {
            category: PhiCategory::Email,
            start: 0,
            end: 10,
            base_confidence: 0.9,
            rank: 2,
        };
        let b = RawMatch {
            category: PhiCategory::ZipPlus4,
            start: 5,
            end: 15,
            base_confidence: 0.4,
            rank: 7,
        };
        let c = RawMatch {
            category: PhiCategory::Phone,
            start: 20,
            end: 25,
            base_confidence: 0.7,
            rank: 3,
        };
        let merged = merge_overlapping(vec![c, b, a]);
        assert_eq!(merged.len(), 2);
        assert_eq!((merged[0].start, merged[0].end), (0, 15));
        assert_eq!(merged[0].category, PhiCategory::Email);
        assert_eq!((merged[1].start, merged[1].end), (20, 25));
    }

    #[test]
    fn test_redact_json() {
        let payload = serde_json::json!({
            "note": "call 555-123-4567",
            "ids": ["MRN-12345678", 42],
            "ok": true
        });
        let r = redactor();
        assert!(r.json_contains_phi(&payload));

        let out = r.redact_json(&payload);
        assert_eq!(out["note"], "call [PHONE_REDACTED]");
        assert_eq!(out["ids"][0], "[MRN_REDACTED]");
        assert_eq!(out["ids"][1], 42);
        assert_eq!(out["ok"], true);
        assert!(!r.json_contains_phi(&out));
    }

    #[test]
    fn test_marker_format() {
        assert_eq!(marker(PhiCategory::Ssn), "[SSN_REDACTED]");
        assert_eq!(marker(PhiCategory::IpAddress), "[IP_REDACTED]");
    }
}
