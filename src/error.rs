//! Error types for a3s-compliance
//!
//! Error messages carry identifiers (scope, version, mode, role) but never
//! detected values, payloads, or chain contents.

use crate::governance::{GateAction, GovernanceMode, Role};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in the compliance core
#[derive(Debug, Error)]
pub enum ComplianceError {
    /// Malformed input shape that could not be coerced to a strict default
    #[error("Validation error: {0}")]
    Validation(String),

    /// Audit chain hash mismatch
    #[error("Audit chain integrity violated in scope '{scope}' at version {broken_at}")]
    Integrity { scope: String, broken_at: u64 },

    /// Illegal governance mode change
    #[error("Invalid governance mode transition: {from} -> {to}")]
    InvalidTransition {
        from: GovernanceMode,
        to: GovernanceMode,
    },

    /// Another request changed the mode between read and write
    #[error("Governance mode for tenant '{tenant}' changed concurrently (expected {expected})")]
    ConcurrentModification {
        tenant: String,
        expected: GovernanceMode,
    },

    /// Gate denied the action for this mode and role
    #[error("Action '{action}' is not permitted in {mode} mode for role '{role}'")]
    Forbidden {
        action: GateAction,
        mode: GovernanceMode,
        role: Role,
    },

    /// External call exceeded its deadline
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// External call failed
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Conditional write lost against a concurrent writer
    #[error("Conflicting append in scope '{scope}': expected previous hash did not match")]
    Conflict { scope: String },

    /// Backing store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Detector catalog could not be built
    #[error("Pattern catalog error: {0}")]
    Catalog(String),
}

impl ComplianceError {
    /// Stable message code for user-visible failures
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "E_VALIDATION",
            Self::Integrity { .. } => "E_AUDIT_INTEGRITY",
            Self::InvalidTransition { .. } => "E_INVALID_TRANSITION",
            Self::ConcurrentModification { .. } => "E_MODE_CONFLICT",
            Self::Forbidden { .. } => "E_FORBIDDEN",
            Self::Timeout(_) => "E_TIMEOUT",
            Self::Upstream(_) => "E_UPSTREAM",
            Self::Conflict { .. } => "E_APPEND_CONFLICT",
            Self::Store(_) => "E_STORE",
            Self::Serialization(_) => "E_SERIALIZATION",
            Self::Config(_) => "E_CONFIG",
            Self::Catalog(_) => "E_CATALOG",
        }
    }

    /// Remediation hint shown next to the message code
    pub fn remediation(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Check the request shape and resend.",
            Self::Integrity { .. } => {
                "Stop writes to this scope and escalate to a compliance officer; do not repair entries."
            }
            Self::InvalidTransition { .. } => {
                "Move through DEMO: STANDBY <-> DEMO <-> LIVE are the only allowed steps."
            }
            Self::ConcurrentModification { .. } => {
                "Reload the current mode and retry the transition if it is still wanted."
            }
            Self::Forbidden { .. } => {
                "Switch to a mode that permits this action or ask an elevated role to perform it."
            }
            Self::Timeout(_) | Self::Upstream(_) => "Retry later; the upstream service is unavailable.",
            Self::Conflict { .. } => "Retry the append after reloading the chain tip.",
            Self::Store(_) => "Check the persistence backend and retry.",
            Self::Serialization(_) => "Report this as a bug; a record could not be encoded.",
            Self::Config(_) => "Fix the configuration file and restart.",
            Self::Catalog(_) => "Report this as a bug; a built-in detector is malformed.",
        }
    }
}

/// User-visible failure payload: a message code and a remediation hint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
    pub hint: String,
}

impl From<&ComplianceError> for Diagnostic {
    fn from(err: &ComplianceError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            hint: err.remediation().to_string(),
        }
    }
}

/// Result type alias for compliance operations
pub type Result<T> = std::result::Result<T, ComplianceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(
            ComplianceError::Validation("x".into()).code(),
            "E_VALIDATION"
        );
        assert_eq!(
            ComplianceError::Integrity {
                scope: "t1".into(),
                broken_at: 3
            }
            .code(),
            "E_AUDIT_INTEGRITY"
        );
        assert_eq!(
            ComplianceError::InvalidTransition {
                from: GovernanceMode::Standby,
                to: GovernanceMode::Live
            }
            .code(),
            "E_INVALID_TRANSITION"
        );
    }

    #[test]
    fn test_diagnostic_from_error() {
        let err = ComplianceError::Forbidden {
            action: GateAction::Upload,
            mode: GovernanceMode::Standby,
            role: Role::Admin,
        };
        let diag = Diagnostic::from(&err);
        assert_eq!(diag.code, "E_FORBIDDEN");
        assert!(diag.message.contains("upload"));
        assert!(diag.message.contains("STANDBY"));
        assert!(!diag.hint.is_empty());

        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("\"code\":\"E_FORBIDDEN\""));
    }

    #[test]
    fn test_integrity_message_has_no_chain_contents() {
        let err = ComplianceError::Integrity {
            scope: "tenant-a".into(),
            broken_at: 7,
        };
        let msg = err.to_string();
        assert!(msg.contains("tenant-a"));
        assert!(msg.contains('7'));
        assert!(!msg.contains("hash="));
    }
}
