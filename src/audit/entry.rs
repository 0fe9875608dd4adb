//! Audit entry types and hashing

use crate::digest::sha256_hex;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chained, tamper-evident audit record
///
/// `details` supplied at append time are reduced to `details_hash`; the
/// entry itself never carries payloads or detected values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Unique entry identifier
    pub id: String,
    /// Per-scope sequence number, starting at 1
    pub version: u64,
    /// Tenant or resource the chain belongs to
    pub scope: String,
    pub timestamp: DateTime<Utc>,
    /// What happened (e.g. `export.allow`, `gate.denied`)
    pub action: String,
    pub actor_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// SHA-256 hex of the canonical details JSON
    pub details_hash: String,
    /// SHA-256 hex of this entry's content chained with `previous_hash`
    pub hash: String,
    /// Hash of the preceding entry in the scope, `None` for the first entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,
}

/// Fields hashed into [`AuditEntry::hash`], in a fixed order
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HashedContent<'a> {
    id: &'a str,
    version: u64,
    scope: &'a str,
    timestamp: &'a DateTime<Utc>,
    action: &'a str,
    actor_id: &'a str,
    resource_id: Option<&'a str>,
    details_hash: &'a str,
}

impl AuditEntry {
    /// Recompute the chained hash from the entry's content
    pub fn compute_hash(&self) -> Result<String> {
        let content = serde_json::to_string(&HashedContent {
            id: &self.id,
            version: self.version,
            scope: &self.scope,
            timestamp: &self.timestamp,
            action: &self.action,
            actor_id: &self.actor_id,
            resource_id: self.resource_id.as_deref(),
            details_hash: &self.details_hash,
        })?;

        let mut input = content.into_bytes();
        if let Some(prev) = &self.previous_hash {
            input.extend_from_slice(prev.as_bytes());
        }
        Ok(sha256_hex(&input))
    }

    /// Whether the stored hash matches the recomputed one
    pub fn hash_matches(&self) -> bool {
        self.compute_hash().is_ok_and(|h| h == self.hash)
    }
}

/// Caller-supplied part of an audit entry
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub action: String,
    pub actor_id: String,
    pub resource_id: Option<String>,
    /// Arbitrary JSON, only its hash is stored
    pub details: serde_json::Value,
}

impl NewAuditEntry {
    pub fn new(action: impl Into<String>, actor_id: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            actor_id: actor_id.into(),
            resource_id: None,
            details: serde_json::Value::Null,
        }
    }

    pub fn with_resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// SHA-256 hex of `details` serialized with sorted object keys
pub fn details_hash(details: &serde_json::Value) -> Result<String> {
    // serde_json's default map is ordered by key, so this is canonical
    let canonical = serde_json::to_string(details)?;
    Ok(sha256_hex(canonical.as_bytes()))
}
