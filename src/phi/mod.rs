//! PHI detection, risk classification, and redaction
//!
//! - **catalog**: static table of regex detectors keyed by category
//! - **scanner**: applies the catalog, producing hash-only findings
//! - **classifier**: aggregates findings into a risk level
//! - **redactor**: replaces detected spans with category markers
//!
//! All three operations are pure and hold no shared mutable state; they
//! are safe to call concurrently without locking.

pub mod catalog;
pub mod classifier;
pub mod redactor;
pub mod scanner;

pub use catalog::{PatternCatalog, PatternDef, PhiCategory, PhiPattern, BUILTIN_PATTERNS};
pub use classifier::{Classification, RiskClassifier, RiskLevel, ScanSummary};
pub use redactor::Redactor;
pub use scanner::{Finding, ScanContext, ScanResult, Scanner, Span};
