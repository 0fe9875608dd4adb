//! Request guard combining the gate, the scanner and the audit chain
//!
//! One call per data-touching request: check the governance gate, scan the
//! payload, decide allow/block, record the outcome in the tenant's audit
//! chain, and forward the entry. Denials are audited before they are
//! returned. The audit record holds hashes, counts and categories only.

use crate::audit::{AuditChain, AuditEntry, AuditForwarder, AuditSink, NewAuditEntry};
use crate::config::ComplianceConfig;
use crate::context::RequestContext;
use crate::digest::sha256_hex;
use crate::error::{ComplianceError, Result};
use crate::executor::FailClosedExecutor;
use crate::governance::{GateAction, GateDecision, GovernanceController};
use crate::phi::{Redactor, RiskLevel, ScanContext, ScanResult, Scanner};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Whether the payload may proceed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardDecision {
    Allow,
    Block,
}

impl GuardDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Block => "block",
        }
    }
}

/// Result of [`ComplianceGuard::guard`]
#[derive(Debug, Clone)]
pub struct GuardOutcome {
    pub decision: GuardDecision,
    pub gate: GateDecision,
    pub scan: ScanResult,
    pub audit_entry: AuditEntry,
    /// Redacted payload for allowed exports, views and AI runs
    pub redacted_payload: Option<String>,
    /// Whether the audit entry reached the external sink
    pub forwarded: bool,
}

impl GuardOutcome {
    pub fn is_allowed(&self) -> bool {
        self.decision == GuardDecision::Allow
    }
}

/// Scan context a gated action implies, `default` for actions that imply
/// none. Mode changes carry no payload.
pub fn scan_context_for(action: GateAction, default: ScanContext) -> Result<ScanContext> {
    match action {
        GateAction::Upload => Ok(ScanContext::Upload),
        GateAction::Export => Ok(ScanContext::Export),
        GateAction::View | GateAction::RevealPhi => Ok(ScanContext::View),
        GateAction::RunAi => Ok(default),
        GateAction::ChangeMode => Err(ComplianceError::Validation(
            "mode changes go through GovernanceController::transition, not the guard".to_string(),
        )),
    }
}

pub struct ComplianceGuard {
    governance: Arc<GovernanceController>,
    audit: Arc<AuditChain>,
    scanner: Scanner,
    redactor: Redactor,
    forwarder: Option<AuditForwarder>,
    block_threshold: RiskLevel,
    default_context: ScanContext,
}

impl ComplianceGuard {
    /// Guard over the built-in pattern catalog, blocking at HIGH
    pub fn new(governance: Arc<GovernanceController>, audit: Arc<AuditChain>) -> Result<Self> {
        Ok(Self {
            governance,
            audit,
            scanner: Scanner::new()?,
            redactor: Redactor::new()?,
            forwarder: None,
            block_threshold: RiskLevel::High,
            default_context: ScanContext::Export,
        })
    }

    /// Guard built from `config`: the audit chain comes from `[audit]`, the
    /// threshold and default context from `[scanner]`. When a sink is given
    /// it is wrapped in an executor using `[executor]`.
    pub async fn from_config(
        config: &ComplianceConfig,
        governance: Arc<GovernanceController>,
        sink: Option<Arc<dyn AuditSink>>,
    ) -> Result<Self> {
        config.validate()?;
        let audit = Arc::new(AuditChain::from_config(&config.audit).await?);
        let mut guard = Self::new(governance, audit)?
            .with_block_threshold(config.scanner.block_threshold)
            .with_default_context(config.scanner.default_context);
        if let Some(sink) = sink {
            guard = guard.with_forwarder(AuditForwarder::new(
                sink,
                FailClosedExecutor::new(config.executor),
            ));
        }
        Ok(guard)
    }

    pub fn with_forwarder(mut self, forwarder: AuditForwarder) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    pub fn with_block_threshold(mut self, threshold: RiskLevel) -> Self {
        self.block_threshold = threshold;
        self
    }

    /// Scan context for actions that do not imply one (AI runs)
    pub fn with_default_context(mut self, context: ScanContext) -> Self {
        self.default_context = context;
        self
    }

    pub fn block_threshold(&self) -> RiskLevel {
        self.block_threshold
    }

    pub fn default_context(&self) -> ScanContext {
        self.default_context
    }

    pub fn audit(&self) -> &Arc<AuditChain> {
        &self.audit
    }

    /// Gate, scan, decide and audit one request.
    ///
    /// A gate denial is appended to the tenant's chain and then returned as
    /// `Forbidden`. Revealing PHI is decided by the gate alone; every other
    /// action is blocked when the payload's risk reaches the threshold.
    pub async fn guard(
        &self,
        ctx: &RequestContext,
        action: GateAction,
        resource_id: Option<&str>,
        payload: &str,
    ) -> Result<GuardOutcome> {
        let context = scan_context_for(action, self.default_context)?;
        let gate = self.governance.evaluate(ctx, action).await;

        if !gate.allowed {
            let details = json!({
                "gate": action,
                "mode": gate.mode,
                "role": gate.role,
                "code": gate.code,
                "payloadHash": sha256_hex(payload.as_bytes()),
            });
            let entry = self
                .record(ctx, format!("{}.denied", action), resource_id, details)
                .await?;
            self.forward(&entry).await;
            return Err(ComplianceError::Forbidden {
                action,
                mode: gate.mode,
                role: gate.role,
            });
        }

        let scan = self.scanner.scan(payload, context);
        let blocked =
            action != GateAction::RevealPhi && scan.risk_level.should_block(self.block_threshold);
        let decision = if blocked {
            GuardDecision::Block
        } else {
            GuardDecision::Allow
        };

        let details = json!({
            "gate": action,
            "mode": gate.mode,
            "decision": decision,
            "watermark": gate.watermark,
            "scanId": scan.scan_id,
            "context": scan.context,
            "riskLevel": scan.risk_level,
            "totalPatterns": scan.summary.total_patterns,
            "categories": scan.categories(),
            "matchHashes": scan.detected.iter().map(|f| f.match_hash.as_str()).collect::<Vec<_>>(),
            "payloadHash": sha256_hex(payload.as_bytes()),
        });
        let audit_entry = self
            .record(
                ctx,
                format!("{}.{}", action, decision.as_str()),
                resource_id,
                details,
            )
            .await?;

        if blocked {
            tracing::info!(
                scope = %audit_entry.scope,
                version = audit_entry.version,
                action = %action,
                risk = %scan.risk_level,
                threshold = %self.block_threshold,
                "Payload blocked"
            );
        }

        let redacted_payload = match action {
            GateAction::Export | GateAction::View | GateAction::RunAi if !blocked => {
                Some(self.redactor.redact(payload))
            }
            _ => None,
        };
        let forwarded = self.forward(&audit_entry).await;

        Ok(GuardOutcome {
            decision,
            gate,
            scan,
            audit_entry,
            redacted_payload,
            forwarded,
        })
    }

    async fn record(
        &self,
        ctx: &RequestContext,
        action: String,
        resource_id: Option<&str>,
        details: serde_json::Value,
    ) -> Result<AuditEntry> {
        let mut new = NewAuditEntry::new(action, ctx.actor_id()).with_details(details);
        if let Some(resource_id) = resource_id {
            new = new.with_resource(resource_id);
        }
        self.audit.append(&ctx.tenant_id, new).await
    }

    async fn forward(&self, entry: &AuditEntry) -> bool {
        match &self.forwarder {
            Some(forwarder) => forwarder.forward(entry).await.data,
            None => false,
        }
    }
}
