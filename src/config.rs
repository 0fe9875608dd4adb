//! Configuration for the compliance core
//!
//! Loaded from TOML. Every section and field has a default, so an empty or
//! missing file yields a working, strict configuration.

use crate::audit::chain::DEFAULT_MAX_APPEND_RETRIES;
use crate::error::{ComplianceError, Result};
use crate::executor::FailClosedOptions;
use crate::governance::GovernanceMode;
use crate::phi::{RiskLevel, ScanContext};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceConfig {
    pub scanner: ScannerConfig,
    /// Timeout and retry policy for non-critical external calls
    pub executor: FailClosedOptions,
    pub audit: AuditConfig,
    pub governance: GovernanceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Context used when a caller does not name one
    pub default_context: ScanContext,
    /// Payloads at or above this risk are blocked by the guard
    pub block_threshold: RiskLevel,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            default_context: ScanContext::Export,
            block_threshold: RiskLevel::High,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Directory for JSONL chains; in-memory when unset
    pub persistence_dir: Option<PathBuf>,
    /// Re-reads after an append loses to a concurrent writer
    pub max_append_retries: u32,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            persistence_dir: None,
            max_append_retries: DEFAULT_MAX_APPEND_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Mode assumed for tenants with no stored mode. Must be STANDBY.
    pub default_mode: GovernanceMode,
}

impl ComplianceConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ComplianceConfig = toml::from_str(content)
            .map_err(|e| ComplianceError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`. Returns the defaults if the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            ComplianceError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Reject settings that would weaken the fail-closed defaults
    pub fn validate(&self) -> Result<()> {
        if self.governance.default_mode != GovernanceMode::Standby {
            return Err(ComplianceError::Config(format!(
                "governance.default_mode must be STANDBY, got {}",
                self.governance.default_mode
            )));
        }
        if self.executor.timeout_ms == 0 {
            return Err(ComplianceError::Config(
                "executor.timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
