//! Governance mode controller
//!
//! Resolves the active mode for a request and applies transitions. Any
//! failure to resolve the mode (store error, missing or malformed value,
//! unauthenticated caller) yields STANDBY. This is a security contract:
//! callers must never see a more permissive mode because of an error.

use super::gate::{check_gate, evaluate_gate, GateAction, GateDecision, Role};
use super::mode::{transition, GovernanceMode};
use super::store::ModeStore;
use crate::context::{RequestContext, PERMISSION_REVEAL_PHI};
use crate::error::{ComplianceError, Result};
use std::sync::Arc;

/// Mode resolution and transitions over a pluggable [`ModeStore`]
pub struct GovernanceController {
    store: Arc<dyn ModeStore>,
}

impl GovernanceController {
    pub fn new(store: impl ModeStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn from_arc(store: Arc<dyn ModeStore>) -> Self {
        Self { store }
    }

    /// Active mode for the request, failing closed to STANDBY
    pub async fn resolve_mode(&self, ctx: &RequestContext) -> GovernanceMode {
        if !ctx.is_authenticated() {
            return GovernanceMode::Standby;
        }

        let key = ctx.mode_key();
        match self.store.load(&key).await {
            Ok(Some(raw)) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(key = %key, "Malformed governance mode in store, using STANDBY");
                GovernanceMode::Standby
            }),
            Ok(None) => GovernanceMode::Standby,
            Err(e) => {
                tracing::warn!(
                    key = %key,
                    error = %e,
                    "Failed to load governance mode, using STANDBY"
                );
                GovernanceMode::Standby
            }
        }
    }

    /// Move the request's tenant/session to `target`.
    ///
    /// The edge is validated against the allow-list, then written with a
    /// compare-and-swap on the value that was read. A concurrent change
    /// between read and write fails with `ConcurrentModification`.
    pub async fn transition(
        &self,
        ctx: &RequestContext,
        target: GovernanceMode,
    ) -> Result<GovernanceMode> {
        let key = ctx.mode_key();
        let raw = self.store.load(&key).await?;
        let current = raw
            .as_deref()
            .and_then(|r| r.parse().ok())
            .unwrap_or(GovernanceMode::Standby);

        let role = require_role(ctx, GateAction::ChangeMode, current)?;

        let next = transition(current, target).map_err(|e| {
            tracing::warn!(
                key = %key,
                from = %current,
                to = %target,
                "Rejected governance mode transition"
            );
            e
        })?;

        let swapped = self
            .store
            .compare_and_swap(&key, raw.as_deref(), next.as_str())
            .await?;
        if !swapped {
            return Err(ComplianceError::ConcurrentModification {
                tenant: key,
                expected: current,
            });
        }

        tracing::info!(
            key = %key,
            actor = %ctx.actor_id(),
            role = %role,
            from = %current,
            to = %next,
            "Governance mode changed"
        );
        Ok(next)
    }

    /// Gate decision for `action`, never failing. Unauthenticated callers
    /// are evaluated as a viewer in STANDBY.
    pub async fn evaluate(&self, ctx: &RequestContext, action: GateAction) -> GateDecision {
        let mode = self.resolve_mode(ctx).await;
        let role = ctx.actor.as_ref().map(|a| a.role).unwrap_or(Role::Viewer);
        let mut decision = evaluate_gate(mode, role, action);

        let missing_permission = action == GateAction::RevealPhi
            && !ctx
                .actor
                .as_ref()
                .is_some_and(|a| a.has_permission(PERMISSION_REVEAL_PHI));
        if decision.allowed && missing_permission {
            decision.allowed = false;
            decision.code = Some("E_PERMISSION_MISSING".to_string());
            decision.hint = Some(format!(
                "Revealing PHI requires the '{}' permission.",
                PERMISSION_REVEAL_PHI
            ));
        }

        if !decision.allowed {
            tracing::warn!(
                tenant = %ctx.tenant_id,
                actor = %ctx.actor_id(),
                mode = %mode,
                role = %role,
                action = %action,
                code = decision.code.as_deref().unwrap_or(""),
                "Gate denied"
            );
        }
        decision
    }

    /// Like [`evaluate`](Self::evaluate), but a denial is an error
    pub async fn authorize(&self, ctx: &RequestContext, action: GateAction) -> Result<GateDecision> {
        let decision = self.evaluate(ctx, action).await;
        if decision.allowed {
            Ok(decision)
        } else {
            Err(ComplianceError::Forbidden {
                action,
                mode: decision.mode,
                role: decision.role,
            })
        }
    }

    /// Restore the default mode at session or tenant teardown
    pub async fn reset(&self, ctx: &RequestContext) -> Result<()> {
        let key = ctx.mode_key();
        self.store.clear(&key).await?;
        tracing::info!(key = %key, "Governance mode reset to STANDBY");
        Ok(())
    }
}

fn require_role(ctx: &RequestContext, action: GateAction, mode: GovernanceMode) -> Result<Role> {
    let role = ctx.actor.as_ref().map(|a| a.role).unwrap_or(Role::Viewer);
    if ctx.is_authenticated() && check_gate(mode, role, action) {
        Ok(role)
    } else {
        Err(ComplianceError::Forbidden { action, mode, role })
    }
}
