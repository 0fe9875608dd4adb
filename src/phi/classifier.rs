//! Risk classification over scan findings
//!
//! Pure aggregation: the result depends only on the multiset of finding
//! categories, so any ordering of the same findings classifies identically.

use super::catalog::PhiCategory;
use super::scanner::Finding;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Distinct categories at which a payload becomes HIGH risk
pub const HIGH_DISTINCT_CATEGORIES: usize = 3;

/// Findings of a single category at which a payload becomes HIGH risk
pub const HIGH_SINGLE_CATEGORY_COUNT: usize = 5;

/// Aggregate risk of a scanned payload, ordered from least to most severe
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Whether a payload at this level must be blocked under `threshold`
    pub fn should_block(&self, threshold: RiskLevel) -> bool {
        *self != RiskLevel::None && *self >= threshold
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::None => "NONE",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// Finding counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    /// Total number of findings
    pub total_patterns: usize,
    /// Findings per category
    pub by_category: BTreeMap<PhiCategory, usize>,
}

/// Output of [`RiskClassifier::classify`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub risk_level: RiskLevel,
    pub summary: ScanSummary,
}

/// Maps findings to a risk level
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskClassifier;

impl RiskClassifier {
    pub fn classify(findings: &[Finding]) -> Classification {
        let mut by_category: BTreeMap<PhiCategory, usize> = BTreeMap::new();
        for finding in findings {
            *by_category.entry(finding.category).or_insert(0) += 1;
        }

        let risk_level = level_for(&by_category);

        Classification {
            risk_level,
            summary: ScanSummary {
                total_patterns: findings.len(),
                by_category,
            },
        }
    }
}

fn level_for(by_category: &BTreeMap<PhiCategory, usize>) -> RiskLevel {
    if by_category.is_empty() {
        return RiskLevel::None;
    }
    if by_category.keys().any(PhiCategory::is_direct_identifier) {
        return RiskLevel::Critical;
    }
    if by_category.len() >= HIGH_DISTINCT_CATEGORIES
        || by_category
            .values()
            .any(|&count| count >= HIGH_SINGLE_CATEGORY_COUNT)
    {
        return RiskLevel::High;
    }
    RiskLevel::Medium
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phi::scanner::Span;

    fn finding(category: PhiCategory, start: usize) -> Finding {
        Finding {
            category,
            match_hash: format!("{:012x}", start),
            match_length: 4,
            position: Span {
                start,
                end: start + 4,
            },
            confidence: 0.8,
        }
    }

    #[test]
    fn test_no_findings_is_none() {
        let c = RiskClassifier::classify(&[]);
        assert_eq!(c.risk_level, RiskLevel::None);
        assert_eq!(c.summary.total_patterns, 0);
        assert!(c.summary.by_category.is_empty());
    }

    #[test]
    fn test_direct_identifiers_are_critical() {
        let c = RiskClassifier::classify(&[finding(PhiCategory::Ssn, 0)]);
        assert_eq!(c.risk_level, RiskLevel::Critical);

        let c = RiskClassifier::classify(&[
            finding(PhiCategory::Email, 0),
            finding(PhiCategory::Mrn, 10),
        ]);
        assert_eq!(c.risk_level, RiskLevel::Critical);
    }

    #[test]
    fn test_three_categories_is_high() {
        let c = RiskClassifier::classify(&[
            finding(PhiCategory::Email, 0),
            finding(PhiCategory::Phone, 10),
            finding(PhiCategory::Dob, 20),
        ]);
        assert_eq!(c.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_five_in_one_category_is_high() {
        let findings: Vec<Finding> = (0..5)
            .map(|i| finding(PhiCategory::Email, i * 10))
            .collect();
        assert_eq!(
            RiskClassifier::classify(&findings).risk_level,
            RiskLevel::High
        );
        assert_eq!(
            RiskClassifier::classify(&findings[..4]).risk_level,
            RiskLevel::Medium
        );
    }

    #[test]
    fn test_one_or_two_findings_is_medium() {
        let c = RiskClassifier::classify(&[finding(PhiCategory::IpAddress, 0)]);
        assert_eq!(c.risk_level, RiskLevel::Medium);

        let c = RiskClassifier::classify(&[
            finding(PhiCategory::Email, 0),
            finding(PhiCategory::Phone, 10),
        ]);
        assert_eq!(c.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_order_independent() {
        let mut findings = vec![
            finding(PhiCategory::Email, 0),
            finding(PhiCategory::Phone, 10),
            finding(PhiCategory::Email, 20),
            finding(PhiCategory::Dob, 30),
        ];
        let forward = RiskClassifier::classify(&findings);
        findings.reverse();
        let reversed = RiskClassifier::classify(&findings);
        findings.sort_by_key(|f| f.category);
        let sorted = RiskClassifier::classify(&findings);

        assert_eq!(forward, reversed);
        assert_eq!(forward, sorted);
        assert_eq!(forward.summary.by_category[&PhiCategory::Email], 2);
    }

    #[test]
    fn test_risk_ordering_and_blocking() {
        assert!(RiskLevel::Critical > RiskLevel::High);
        assert!(RiskLevel::High > RiskLevel::Medium);
        assert!(RiskLevel::Medium > RiskLevel::Low);
        assert!(RiskLevel::Low > RiskLevel::None);

        assert!(RiskLevel::Critical.should_block(RiskLevel::High));
        assert!(!RiskLevel::Medium.should_block(RiskLevel::High));
        assert!(!RiskLevel::None.should_block(RiskLevel::None));
    }

    #[test]
    fn test_summary_serializes_category_keys() {
        let c = RiskClassifier::classify(&[finding(PhiCategory::Ssn, 0)]);
        let json = serde_json::to_string(&c.summary).unwrap();
        assert_eq!(json, r#"{"totalPatterns":1,"byCategory":{"SSN":1}}"#);
    }
}
