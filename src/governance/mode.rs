//! Governance modes and the transition allow-list

use crate::error::{ComplianceError, Result};
use serde::{Deserialize, Serialize};

/// Operating posture of a tenant or session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GovernanceMode {
    /// Read-only, no network, no AI. The default and the fail-closed target.
    #[default]
    Standby,
    /// Sandboxed mock data, watermarked exports, no raw uploads
    Demo,
    /// Full capability, still gated per action and role
    Live,
}

/// The only permitted edges. Anything else is rejected, including
/// self-transitions.
pub const ALLOWED_TRANSITIONS: &[(GovernanceMode, GovernanceMode)] = &[
    (GovernanceMode::Standby, GovernanceMode::Demo),
    (GovernanceMode::Demo, GovernanceMode::Standby),
    (GovernanceMode::Demo, GovernanceMode::Live),
    (GovernanceMode::Live, GovernanceMode::Demo),
];

impl GovernanceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standby => "STANDBY",
            Self::Demo => "DEMO",
            Self::Live => "LIVE",
        }
    }

    /// Whether `self -> target` is on the allow-list
    pub fn can_transition_to(&self, target: GovernanceMode) -> bool {
        ALLOWED_TRANSITIONS.contains(&(*self, target))
    }

    /// Capabilities granted by this mode before role checks
    pub fn capabilities(&self) -> ModeCapabilities {
        match self {
            Self::Standby => ModeCapabilities {
                network: false,
                ai: false,
                raw_uploads: false,
                exports: false,
                mock_data_only: false,
                watermark_exports: false,
            },
            Self::Demo => ModeCapabilities {
                network: true,
                ai: true,
                raw_uploads: false,
                exports: true,
                mock_data_only: true,
                watermark_exports: true,
            },
            Self::Live => ModeCapabilities {
                network: true,
                ai: true,
                raw_uploads: true,
                exports: true,
                mock_data_only: false,
                watermark_exports: false,
            },
        }
    }
}

impl std::fmt::Display for GovernanceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GovernanceMode {
    type Err = ComplianceError;

    /// Strict parse. Callers resolving a tenant's mode must map errors to
    /// `Standby` themselves.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "STANDBY" => Ok(Self::Standby),
            "DEMO" => Ok(Self::Demo),
            "LIVE" => Ok(Self::Live),
            _ => Err(ComplianceError::Validation(
                "unrecognized governance mode".to_string(),
            )),
        }
    }
}

/// What a mode permits, independent of role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeCapabilities {
    pub network: bool,
    pub ai: bool,
    pub raw_uploads: bool,
    pub exports: bool,
    pub mock_data_only: bool,
    pub watermark_exports: bool,
}

/// Validate a mode change. Illegal edges are rejected, never coerced.
pub fn transition(current: GovernanceMode, target: GovernanceMode) -> Result<GovernanceMode> {
    if current.can_transition_to(target) {
        Ok(target)
    } else {
        Err(ComplianceError::InvalidTransition {
            from: current,
            to: target,
        })
    }
}
