//! Typed request context
//!
//! Carries tenant, session and the resolved actor through call signatures.
//! A context without an actor is unauthenticated and is treated as STANDBY
//! by the governance controller.

use crate::error::{ComplianceError, Result};
use crate::governance::Role;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Permission required, in addition to an elevated role, to reveal PHI
pub const PERMISSION_REVEAL_PHI: &str = "phi:reveal";

/// A resolved caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            permissions: Vec::new(),
        }
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.push(permission.into());
        self
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

/// Per-request context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub tenant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<Actor>,
}

impl RequestContext {
    /// Context for an authenticated actor
    pub fn new(tenant_id: impl Into<String>, actor: Actor) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            session_id: None,
            actor: Some(actor),
        }
    }

    /// Context with no resolved actor
    pub fn anonymous(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            session_id: None,
            actor: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Build a context by resolving `actor_id`. Resolution failures leave
    /// the context unauthenticated rather than failing the request.
    pub async fn resolve(
        tenant_id: impl Into<String>,
        actor_id: &str,
        resolver: &dyn RoleResolver,
    ) -> Self {
        let tenant_id = tenant_id.into();
        let actor = match resolver.resolve(actor_id).await {
            Ok(actor) => Some(actor),
            Err(e) => {
                tracing::warn!(
                    tenant = %tenant_id,
                    error_code = e.code(),
                    "Role resolution failed, treating caller as unauthenticated"
                );
                None
            }
        };
        Self {
            tenant_id,
            session_id: None,
            actor,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.actor.is_some()
    }

    /// Key under which the governance mode is stored
    pub fn mode_key(&self) -> String {
        match &self.session_id {
            Some(session) => format!("{}/{}", self.tenant_id, session),
            None => self.tenant_id.clone(),
        }
    }

    /// Actor id for audit records; `anonymous` when unauthenticated
    pub fn actor_id(&self) -> &str {
        self.actor.as_ref().map(|a| a.id.as_str()).unwrap_or("anonymous")
    }
}

/// Resolves an actor's role and permissions (external collaborator)
#[async_trait]
pub trait RoleResolver: Send + Sync {
    async fn resolve(&self, actor_id: &str) -> Result<Actor>;
}

/// Fixed actor table, for tests and single-tenant deployments
#[derive(Debug, Default)]
pub struct StaticRoleResolver {
    actors: HashMap<String, Actor>,
}

impl StaticRoleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actors.insert(actor.id.clone(), actor);
        self
    }
}

#[async_trait]
impl RoleResolver for StaticRoleResolver {
    async fn resolve(&self, actor_id: &str) -> Result<Actor> {
        self.actors
            .get(actor_id)
            .cloned()
            .ok_or_else(|| ComplianceError::Validation("unknown actor".to_string()))
    }
}
