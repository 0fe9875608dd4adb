//! PHI detector catalog
//!
//! A data-driven table of regex detectors keyed by category. Adding a
//! detector means adding a row to [`BUILTIN_PATTERNS`]; nothing else in the
//! scanner or redactor has to change.

use crate::error::{ComplianceError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};

/// Category of a PHI-like identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhiCategory {
    Ssn,
    Mrn,
    Email,
    Phone,
    Dob,
    #[serde(rename = "IP")]
    IpAddress,
    HealthPlanId,
    ZipPlus4,
}

impl PhiCategory {
    /// Token used in wire formats and redaction markers
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ssn => "SSN",
            Self::Mrn => "MRN",
            Self::Email => "EMAIL",
            Self::Phone => "PHONE",
            Self::Dob => "DOB",
            Self::IpAddress => "IP",
            Self::HealthPlanId => "HEALTH_PLAN_ID",
            Self::ZipPlus4 => "ZIP_PLUS4",
        }
    }

    /// Categories whose presence alone makes a payload critical
    pub fn is_direct_identifier(&self) -> bool {
        matches!(self, Self::Ssn | Self::Mrn)
    }
}

impl std::fmt::Display for PhiCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uncompiled detector definition
#[derive(Debug, Clone, Copy)]
pub struct PatternDef {
    pub category: PhiCategory,
    pub pattern: &'static str,
    pub description: &'static str,
    pub base_confidence: f64,
    pub citation: &'static str,
}

/// Built-in detectors. Citations refer to the HIPAA Safe Harbor identifier
/// list in 45 CFR 164.514(b)(2)(i).
pub const BUILTIN_PATTERNS: &[PatternDef] = &[
    PatternDef {
        category: PhiCategory::Ssn,
        pattern: r"\b\d{3}-\d{2}-\d{4}\b",
        description: "US Social Security Number (formatted)",
        base_confidence: 0.95,
        citation: "45 CFR 164.514(b)(2)(i)(G)",
    },
    PatternDef {
        category: PhiCategory::Mrn,
        pattern: r"(?i)\bMRN[\s:#-]*\d{6,10}\b",
        description: "Medical record number with MRN prefix",
        base_confidence: 0.9,
        citation: "45 CFR 164.514(b)(2)(i)(H)",
    },
    PatternDef {
        category: PhiCategory::Email,
        pattern: r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
        description: "Electronic mail address",
        base_confidence: 0.9,
        citation: "45 CFR 164.514(b)(2)(i)(F)",
    },
    PatternDef {
        category: PhiCategory::Phone,
        pattern: r"(?:\+1[-.\s]?)?(?:\(\d{3}\)\s?|\b\d{3}[-.\s])\d{3}[-.\s]\d{4}\b",
        description: "North American telephone number",
        base_confidence: 0.7,
        citation: "45 CFR 164.514(b)(2)(i)(D)",
    },
    PatternDef {
        category: PhiCategory::Dob,
        pattern: r"\b(?:(?:0?[1-9]|1[0-2])[/-](?:0?[1-9]|[12]\d|3[01])[/-](?:19|20)\d{2}|(?:19|20)\d{2}-(?:0[1-9]|1[0-2])-(?:0[1-9]|[12]\d|3[01]))\b",
        description: "Calendar date (US or ISO format)",
        base_confidence: 0.6,
        citation: "45 CFR 164.514(b)(2)(i)(C)",
    },
    PatternDef {
        category: PhiCategory::IpAddress,
        pattern: r"\b(?:(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\b",
        description: "IPv4 address",
        base_confidence: 0.5,
        citation: "45 CFR 164.514(b)(2)(i)(O)",
    },
    PatternDef {
        category: PhiCategory::HealthPlanId,
        pattern: r"(?i)\b(?:member|policy|plan|beneficiary)\s*(?:id|no\.?|number|#)?[\s:#-]*[A-Z]{0,4}\d[A-Z0-9]{5,14}\b",
        description: "Health plan beneficiary or member number",
        base_confidence: 0.75,
        citation: "45 CFR 164.514(b)(2)(i)(I)",
    },
    PatternDef {
        category: PhiCategory::ZipPlus4,
        pattern: r"\b\d{5}-\d{4}\b",
        description: "ZIP+4 postal code",
        base_confidence: 0.4,
        citation: "45 CFR 164.514(b)(2)(i)(B)",
    },
];

/// A compiled detector. Immutable once built.
#[derive(Debug, Clone)]
pub struct PhiPattern {
    pub category: PhiCategory,
    pub matcher: Regex,
    pub description: &'static str,
    pub base_confidence: f64,
    pub citation: &'static str,
}

/// A raw match in byte offsets. Never holds the matched text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RawMatch {
    pub category: PhiCategory,
    pub start: usize,
    pub end: usize,
    pub base_confidence: f64,
    /// Index of the detector in the catalog, used as a stable tiebreaker
    pub rank: usize,
}

/// Ordered set of compiled detectors
#[derive(Debug, Clone)]
pub struct PatternCatalog {
    patterns: Vec<PhiPattern>,
}

static BUILTIN: LazyLock<std::result::Result<Arc<PatternCatalog>, String>> =
    LazyLock::new(|| {
        PatternCatalog::from_defs(BUILTIN_PATTERNS)
            .map(Arc::new)
            .map_err(|e| e.to_string())
    });

impl PatternCatalog {
    /// Compile a catalog from definitions.
    ///
    /// Fails on the first definition whose regex does not compile or whose
    /// confidence is outside `[0, 1]`.
    pub fn from_defs(defs: &[PatternDef]) -> Result<Self> {
        let patterns = defs
            .iter()
            .map(|def| {
                if !(0.0..=1.0).contains(&def.base_confidence) {
                    return Err(ComplianceError::Catalog(format!(
                        "{}: base confidence {} outside [0, 1]",
                        def.category, def.base_confidence
                    )));
                }
                let matcher = Regex::new(def.pattern).map_err(|e| {
                    ComplianceError::Catalog(format!("{}: {}", def.category, e))
                })?;
                Ok(PhiPattern {
                    category: def.category,
                    matcher,
                    description: def.description,
                    base_confidence: def.base_confidence,
                    citation: def.citation,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    /// The shared built-in catalog, compiled once per process
    pub fn builtin() -> Result<Arc<Self>> {
        BUILTIN
            .as_ref()
            .map(Arc::clone)
            .map_err(|e| ComplianceError::Catalog(e.clone()))
    }

    /// All compiled detectors, in catalog order
    pub fn patterns(&self) -> &[PhiPattern] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Run every detector over `text`. Matches within one detector never
    /// overlap; matches from different detectors may.
    pub(crate) fn raw_matches(&self, text: &str) -> Vec<RawMatch> {
        let mut out = Vec::new();
        for (rank, pattern) in self.patterns.iter().enumerate() {
            for m in pattern.matcher.find_iter(text) {
                out.push(RawMatch {
                    category: pattern.category,
                    start: m.start(),
                    end: m.end(),
                    base_confidence: pattern.base_confidence,
                    rank,
                });
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories_in(text: &str) -> Vec<PhiCategory> {
        let catalog = PatternCatalog::builtin().unwrap();
        catalog
            .raw_matches(text)
            .into_iter()
            .map(|m| m.category)
            .collect()
    }

    #[test]
    fn test_builtin_catalog_compiles() {
        let catalog = PatternCatalog::builtin().unwrap();
        assert_eq!(catalog.len(), BUILTIN_PATTERNS.len());
        for p in catalog.patterns() {
            assert!((0.0..=1.0).contains(&p.base_confidence));
            assert!(p.citation.starts_with("45 CFR"));
        }
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let defs = [PatternDef {
            category: PhiCategory::Ssn,
            pattern: r"(\d{3}",
            description: "broken",
            base_confidence: 0.5,
            citation: "n/a",
        }];
        let err = PatternCatalog::from_defs(&defs).unwrap_err();
        assert!(matches!(err, ComplianceError::Catalog(_)));
    }

    #[test]
    fn test_out_of_range_confidence_is_rejected() {
        let defs = [PatternDef {
            category: PhiCategory::Email,
            pattern: r"@",
            description: "bad confidence",
            base_confidence: 1.5,
            citation: "n/a",
        }];
        assert!(PatternCatalog::from_defs(&defs).is_err());
    }

    #[test]
    fn test_detectors_match_expected_shapes() {
        assert_eq!(categories_in("123-45-6789"), vec![PhiCategory::Ssn]);
        assert_eq!(categories_in("MRN-12345678"), vec![PhiCategory::Mrn]);
        assert_eq!(categories_in("mrn: 0012345"), vec![PhiCategory::Mrn]);
        assert_eq!(
            categories_in("jane.doe@example.org"),
            vec![PhiCategory::Email]
        );
        assert_eq!(categories_in("(555) 123-4567"), vec![PhiCategory::Phone]);
        assert_eq!(categories_in("555-123-4567"), vec![PhiCategory::Phone]);
        assert_eq!(categories_in("born 04/12/1987"), vec![PhiCategory::Dob]);
        assert_eq!(categories_in("born 1987-04-12"), vec![PhiCategory::Dob]);
        assert_eq!(categories_in("from 10.0.12.7"), vec![PhiCategory::IpAddress]);
        assert_eq!(
            categories_in("Member ID: XK2234991"),
            vec![PhiCategory::HealthPlanId]
        );
        assert_eq!(categories_in("02139-4307"), vec![PhiCategory::ZipPlus4]);
    }

    #[test]
    fn test_clean_text_has_no_matches() {
        assert!(categories_in("The cohort analysis completed without errors.").is_empty());
        assert!(categories_in("version 2 of the protocol, n=42").is_empty());
    }

    #[test]
    fn test_category_wire_names() {
        assert_eq!(serde_json::to_string(&PhiCategory::Ssn).unwrap(), "\"SSN\"");
        assert_eq!(
            serde_json::to_string(&PhiCategory::IpAddress).unwrap(),
            "\"IP\""
        );
        assert_eq!(
            serde_json::to_string(&PhiCategory::HealthPlanId).unwrap(),
            "\"HEALTH_PLAN_ID\""
        );
        assert_eq!(PhiCategory::ZipPlus4.to_string(), "ZIP_PLUS4");
    }
}
