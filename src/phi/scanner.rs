//! PHI scanner
//!
//! Applies the pattern catalog to text and produces hash-only findings.
//! A finding records where something matched and a digest of what matched,
//! never the matched text itself.

use super::catalog::{PatternCatalog, PhiCategory, RawMatch};
use super::classifier::{RiskClassifier, RiskLevel, ScanSummary};
use crate::digest::{keyed_match_hash, match_hash};
use crate::error::Result;
use chrono::{DateTime, Utc};
use ring::hmac;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Where the scanned payload is headed. Stricter contexts raise confidence.
///
/// Deserialization goes through [`ScanContext::parse`], so an unknown name
/// on the wire or in a config file becomes `Export` rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ScanContext {
    Upload,
    #[default]
    Export,
    View,
}

impl ScanContext {
    /// Parse a context name. Unknown or malformed names resolve to
    /// `Export`, the strictest context, instead of failing.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "upload" => Self::Upload,
            "export" => Self::Export,
            "view" => Self::View,
            _ => {
                tracing::warn!(
                    code = "E_VALIDATION",
                    "Unknown scan context, using strictest context 'export'"
                );
                Self::Export
            }
        }
    }

    /// Confidence added to every finding in this context
    pub fn confidence_boost(&self) -> f64 {
        match self {
            Self::View => 0.0,
            Self::Upload => 0.05,
            Self::Export => 0.10,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Export => "export",
            Self::View => "view",
        }
    }
}

impl From<&str> for ScanContext {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<String> for ScanContext {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl std::fmt::Display for ScanContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half-open character range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// One detected PHI-like span, described without its content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub category: PhiCategory,
    /// Truncated SHA-256 of the matched substring
    pub match_hash: String,
    /// Length of the match in characters
    pub match_length: usize,
    pub position: Span,
    pub confidence: f64,
}

/// Result of a single scan. Safe to serialize and send across processes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    /// Unique scan identifier (scan-<uuid>)
    pub scan_id: String,
    pub scanned_at: DateTime<Utc>,
    pub context: ScanContext,
    pub detected: Vec<Finding>,
    pub risk_level: RiskLevel,
    pub summary: ScanSummary,
}

impl ScanResult {
    fn from_findings(context: ScanContext, detected: Vec<Finding>) -> Self {
        let classification = RiskClassifier::classify(&detected);
        Self {
            scan_id: format!("scan-{}", uuid::Uuid::new_v4()),
            scanned_at: Utc::now(),
            context,
            detected,
            risk_level: classification.risk_level,
            summary: classification.summary,
        }
    }

    /// Whether anything was detected
    pub fn has_phi(&self) -> bool {
        !self.detected.is_empty()
    }

    /// Distinct detected categories, in catalog order
    pub fn categories(&self) -> Vec<PhiCategory> {
        self.summary.by_category.keys().copied().collect()
    }
}

/// Stateless scanner over a shared, immutable catalog
#[derive(Debug, Clone)]
pub struct Scanner {
    catalog: Arc<PatternCatalog>,
    match_key: Option<hmac::Key>,
}

impl Scanner {
    /// Scanner over the built-in catalog
    pub fn new() -> Result<Self> {
        Ok(Self::with_catalog(PatternCatalog::builtin()?))
    }

    /// Scanner over a custom catalog
    pub fn with_catalog(catalog: Arc<PatternCatalog>) -> Self {
        Self {
            catalog,
            match_key: None,
        }
    }

    /// Hash matches with HMAC-SHA256 under `secret` instead of plain
    /// SHA-256. Hashes stay deterministic for the same secret.
    pub fn with_match_key(mut self, secret: &[u8]) -> Self {
        self.match_key = Some(hmac::Key::new(hmac::HMAC_SHA256, secret));
        self
    }

    pub fn catalog(&self) -> &PatternCatalog {
        &self.catalog
    }

    /// Scan `text` in `context`. Never fails on well-formed text; finding
    /// PHI is a normal result.
    pub fn scan(&self, text: &str, context: ScanContext) -> ScanResult {
        let detected = self.findings(text, context);
        tracing::debug!(
            context = %context,
            findings = detected.len(),
            "PHI scan completed"
        );
        ScanResult::from_findings(context, detected)
    }

    /// Scan every string leaf of a JSON document. Object keys are not
    /// scanned; positions are relative to the leaf they were found in.
    pub fn scan_json(&self, value: &serde_json::Value, context: ScanContext) -> ScanResult {
        let mut detected = Vec::new();
        visit_strings(value, &mut |s| detected.extend(self.findings(s, context)));
        ScanResult::from_findings(context, detected)
    }

    fn findings(&self, text: &str, context: ScanContext) -> Vec<Finding> {
        let mut raw = self.catalog.raw_matches(text);
        raw.sort_by(|a, b| a.start.cmp(&b.start).then(a.rank.cmp(&b.rank)));

        let ascii = text.is_ascii();
        raw.iter()
            .map(|m| self.to_finding(text, m, context, ascii))
            .collect()
    }

    fn to_finding(&self, text: &str, m: &RawMatch, context: ScanContext, ascii: bool) -> Finding {
        let matched = &text[m.start..m.end];
        let (start, len) = if ascii {
            (m.start, m.end - m.start)
        } else {
            (text[..m.start].chars().count(), matched.chars().count())
        };

        let hash = match &self.match_key {
            Some(key) => keyed_match_hash(key, matched),
            None => match_hash(matched),
        };

        Finding {
            category: m.category,
            match_hash: hash,
            match_length: len,
            position: Span {
                start,
                end: start + len,
            },
            confidence: (m.base_confidence + context.confidence_boost()).min(1.0),
        }
    }
}

pub(crate) fn visit_strings(value: &serde_json::Value, f: &mut impl FnMut(&str)) {
    match value {
        serde_json::Value::String(s) => f(s),
        serde_json::Value::Array(items) => {
            for item in items {
                visit_strings(item, f);
            }
        }
        serde_json::Value::Object(map) => {
            for v in map.values() {
                visit_strings(v, f);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> Scanner {
        Scanner::new().unwrap()
    }

    #[test]
    fn test_ssn_and_mrn_scenario() {
        let result = scanner().scan("SSN: 123-45-6789, MRN: MRN-12345678", ScanContext::Export);

        assert!(result.detected.len() >= 2);
        let categories = result.categories();
        assert!(categories.contains(&PhiCategory::Ssn));
        assert!(categories.contains(&PhiCategory::Mrn));
        assert_eq!(result.risk_level, RiskLevel::Critical);
        assert!(result.summary.total_patterns >= 2);

        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("123-45-6789"));
        assert!(!json.contains("12345678"));
    }

    #[test]
    fn test_positions_are_half_open() {
        let text = "SSN: 123-45-6789";
        let result = scanner().scan(text, ScanContext::View);
        let f = &result.detected[0];
        assert_eq!(f.position, Span { start: 5, end: 16 });
        assert_eq!(f.match_length, 11);
        assert_eq!(&text[f.position.start..f.position.end], "123-45-6789");
    }

    #[test]
    fn test_positions_are_character_offsets() {
        let text = "Pâtient ✓ 123-45-6789";
        let result = scanner().scan(text, ScanContext::View);
        let f = &result.detected[0];
        let chars: Vec<char> = text.chars().collect();
        let matched: String = chars[f.position.start..f.position.end].iter().collect();
        assert_eq!(matched, "123-45-6789");
        assert_eq!(f.match_length, 11);
    }

    #[test]
    fn test_match_hash_deterministic() {
        let s = scanner();
        let a = s.scan("reach me at a.person@example.com", ScanContext::View);
        let b = s.scan("reach me at a.person@example.com", ScanContext::View);
        assert_eq!(a.detected[0].match_hash, b.detected[0].match_hash);
        assert_ne!(a.scan_id, b.scan_id);

        let c = s.scan("reach me at b.person@example.com", ScanContext::View);
        assert_ne!(a.detected[0].match_hash, c.detected[0].match_hash);
    }

    #[test]
    fn test_context_boosts_confidence() {
        let s = scanner();
        let view = s.scan("123-45-6789", ScanContext::View);
        let upload = s.scan("123-45-6789", ScanContext::Upload);
        let export = s.scan("123-45-6789", ScanContext::Export);

        assert!(export.detected[0].confidence > upload.detected[0].confidence);
        assert!(upload.detected[0].confidence > view.detected[0].confidence);
        assert!(export.detected[0].confidence <= 1.0);
    }

    #[test]
    fn test_unknown_context_defaults_to_export() {
        assert_eq!(ScanContext::parse("archive"), ScanContext::Export);
        assert_eq!(ScanContext::parse(""), ScanContext::Export);
        assert_eq!(ScanContext::parse(" VIEW "), ScanContext::View);
        assert_eq!(ScanContext::from("upload"), ScanContext::Upload);
    }

    #[test]
    fn test_clean_text_has_no_findings() {
        let result = scanner().scan("Enrollment closed for cohort B.", ScanContext::Export);
        assert!(!result.has_phi());
        assert_eq!(result.risk_level, RiskLevel::None);
        assert_eq!(result.summary.total_patterns, 0);
    }

    #[test]
    fn test_empty_text() {
        let result = scanner().scan("", ScanContext::View);
        assert!(result.detected.is_empty());
        assert_eq!(result.risk_level, RiskLevel::None);
    }

    #[test]
    fn test_multiple_matches_in_one_category() {
        let text = "a@example.com b@example.com c@example.com";
        let result = scanner().scan(text, ScanContext::View);
        assert_eq!(result.summary.by_category[&PhiCategory::Email], 3);
        assert!(result.detected.windows(2).all(|w| w[0].position.start < w[1].position.start));
    }

    #[test]
    fn test_scan_json_leaves() {
        let payload = serde_json::json!({
            "patient": {"ssn": "123-45-6789", "contact": ["x@example.com"]},
            "count": 3
        });
        let result = scanner().scan_json(&payload, ScanContext::Export);
        assert_eq!(result.summary.total_patterns, 2);
        assert_eq!(result.risk_level, RiskLevel::Critical);
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("x@example.com"));
    }

    #[test]
    fn test_scan_result_wire_shape() {
        let result = scanner().scan("x@example.com", ScanContext::Upload);
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["scanId"].as_str().unwrap().starts_with("scan-"));
        assert_eq!(json["context"], "upload");
        assert_eq!(json["riskLevel"], "MEDIUM");
        assert_eq!(json["detected"][0]["category"], "EMAIL");
        assert_eq!(json["detected"][0]["matchHash"].as_str().unwrap().len(), 12);
        assert_eq!(json["summary"]["totalPatterns"], 1);
    }

    #[test]
    fn test_context_deserialization_is_lenient() {
        let known: ScanContext = serde_json::from_str("\"Upload\"").unwrap();
        assert_eq!(known, ScanContext::Upload);
        let unknown: ScanContext = serde_json::from_str("\"archive\"").unwrap();
        assert_eq!(unknown, ScanContext::Export);
        assert_eq!(serde_json::to_string(&ScanContext::View).unwrap(), "\"view\"");
    }

    #[test]
    fn test_keyed_scanner_hashes() {
        let plain = scanner().scan("SSN 123-45-6789", ScanContext::View);
        let keyed = scanner().with_match_key(b"deployment-key");
        let a = keyed.scan("SSN 123-45-6789", ScanContext::View);
        let b = keyed.scan("SSN 123-45-6789", ScanContext::View);

        assert_eq!(a.detected[0].match_hash, b.detected[0].match_hash);
        assert_ne!(a.detected[0].match_hash, plain.detected[0].match_hash);
        assert_eq!(a.detected[0].match_hash.len(), 12);
    }
}
