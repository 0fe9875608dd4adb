//! # a3s-compliance
//!
//! PHI detection, tamper-evident audit chains, and fail-closed governance
//! modes for the A3S ecosystem.
//!
//! ## Overview
//!
//! `a3s-compliance` finds protected health information in free text,
//! classifies how risky a payload is, redacts it, and records every
//! decision in a per-tenant hash chain. Governance modes (STANDBY, DEMO,
//! LIVE) gate what a request may do, and any failure to determine the mode
//! resolves to STANDBY.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_compliance::phi::{Redactor, RiskLevel, ScanContext, Scanner};
//!
//! # fn main() -> a3s_compliance::Result<()> {
//! let scanner = Scanner::new()?;
//! let result = scanner.scan("Patient SSN 123-45-6789", ScanContext::Export);
//! assert_eq!(result.risk_level, RiskLevel::Critical);
//!
//! // Findings carry a hash of the match, never the match itself
//! assert!(!serde_json::to_string(&result)?.contains("123-45-6789"));
//!
//! let redacted = Redactor::new()?.redact("Patient SSN 123-45-6789");
//! assert_eq!(redacted, "Patient SSN [SSN_REDACTED]");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **phi**: pattern catalog, scanner, risk classifier, redactor
//! - **audit**: hash-chained audit entries over a pluggable `AuditStore`
//! - **governance**: modes, action gates, fail-closed `GovernanceController`
//! - **executor**: timeout/retry/fallback wrapper for non-critical calls
//! - **guard**: one-call gate + scan + audit for data-touching requests
//! - **webhook**: HMAC-SHA256 signing and verification

pub mod audit;
pub mod config;
pub mod context;
pub mod digest;
pub mod error;
pub mod executor;
pub mod governance;
pub mod guard;
pub mod phi;
pub mod webhook;

// Re-export core types
pub use audit::{
    validate_chain, verify_integrity, AuditChain, AuditEntry, AuditForwarder, AuditSink,
    AuditStore, ChainValidation, JsonlAuditStore, MemoryAuditSink, MemoryAuditStore,
    NewAuditEntry,
};
pub use config::ComplianceConfig;
pub use context::{Actor, RequestContext, RoleResolver, StaticRoleResolver};
pub use error::{ComplianceError, Diagnostic, Result};
pub use executor::{FailClosedExecutor, FailClosedOptions, FailClosedResult};
pub use governance::{
    GateAction, GateDecision, GovernanceController, GovernanceMode, MemoryModeStore, ModeStore,
    Role,
};
pub use guard::{ComplianceGuard, GuardDecision, GuardOutcome};
pub use phi::{
    Finding, PatternCatalog, PhiCategory, Redactor, RiskClassifier, RiskLevel, ScanContext,
    ScanResult, Scanner,
};
