//! Per-mode gate predicates
//!
//! `check_gate` is a pure function of mode, role and action. In STANDBY
//! every data action except `View` is denied regardless of role.

use super::mode::GovernanceMode;
use serde::{Deserialize, Serialize};

/// Caller role, ordered from most to least restricted
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Read-only access
    Viewer,
    Analyst,
    /// Data steward; elevated
    Steward,
    /// Tenant administrator; elevated
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Viewer, Role::Analyst, Role::Steward, Role::Admin];

    pub fn is_elevated(&self) -> bool {
        matches!(self, Self::Steward | Self::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Analyst => "analyst",
            Self::Steward => "steward",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gated operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateAction {
    View,
    Upload,
    Export,
    RunAi,
    RevealPhi,
    /// Change the tenant's governance mode
    ChangeMode,
}

impl GateAction {
    pub const ALL: [GateAction; 6] = [
        GateAction::View,
        GateAction::Upload,
        GateAction::Export,
        GateAction::RunAi,
        GateAction::RevealPhi,
        GateAction::ChangeMode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Upload => "upload",
            Self::Export => "export",
            Self::RunAi => "run_ai",
            Self::RevealPhi => "reveal_phi",
            Self::ChangeMode => "change_mode",
        }
    }
}

impl std::fmt::Display for GateAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `role` may perform `action` in `mode`
pub fn check_gate(mode: GovernanceMode, role: Role, action: GateAction) -> bool {
    match action {
        GateAction::View => true,
        GateAction::Upload => mode == GovernanceMode::Live && role != Role::Viewer,
        GateAction::Export => match mode {
            GovernanceMode::Standby => false,
            GovernanceMode::Demo => true,
            GovernanceMode::Live => role.is_elevated(),
        },
        GateAction::RunAi => mode != GovernanceMode::Standby,
        // Viewer is never elevated, so it can never reveal
        GateAction::RevealPhi => mode == GovernanceMode::Live && role.is_elevated(),
        // Must stay reachable from STANDBY, otherwise no tenant could leave it
        GateAction::ChangeMode => role.is_elevated(),
    }
}

/// Gate outcome with diagnostics for denials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateDecision {
    pub allowed: bool,
    pub mode: GovernanceMode,
    pub role: Role,
    pub action: GateAction,
    /// Exports in DEMO must carry a watermark
    pub watermark: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// [`check_gate`] plus a message code and remediation hint on denial
pub fn evaluate_gate(mode: GovernanceMode, role: Role, action: GateAction) -> GateDecision {
    let allowed = check_gate(mode, role, action);
    let watermark = allowed
        && action == GateAction::Export
        && mode.capabilities().watermark_exports;

    let (code, hint) = if allowed {
        (None, None)
    } else {
        (
            Some(denial_code(mode, action).to_string()),
            Some(denial_hint(mode, role, action).to_string()),
        )
    };

    GateDecision {
        allowed,
        mode,
        role,
        action,
        watermark,
        code,
        hint,
    }
}

fn denial_code(mode: GovernanceMode, action: GateAction) -> &'static str {
    match (mode, action) {
        (_, GateAction::ChangeMode) => "E_ROLE_INSUFFICIENT",
        (GovernanceMode::Standby, _) => "E_MODE_STANDBY",
        (GovernanceMode::Demo, _) => "E_MODE_DEMO",
        (GovernanceMode::Live, _) => "E_ROLE_INSUFFICIENT",
    }
}

fn denial_hint(mode: GovernanceMode, role: Role, action: GateAction) -> &'static str {
    match (mode, action) {
        (_, GateAction::ChangeMode) => "Only a steward or admin can change the governance mode.",
        (GovernanceMode::Standby, _) => "The workspace is in STANDBY; switch to DEMO or LIVE first.",
        (GovernanceMode::Demo, GateAction::Upload) => "Raw uploads are disabled in DEMO; switch to LIVE.",
        (GovernanceMode::Demo, GateAction::RevealPhi) => "DEMO uses mock data; PHI can only be revealed in LIVE.",
        _ if role == Role::Viewer => "The viewer role is read-only.",
        _ => "This action requires a steward or admin role.",
    }
}
