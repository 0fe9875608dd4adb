//! Hash-chained audit log
//!
//! Each entry's hash covers its content and the previous entry's hash, so
//! altering, removing or reordering a stored entry breaks the link to the
//! entry after it. Breaks are reported, never repaired.
//!
//! Version numbers are assigned here but are not themselves protected:
//! `validate_chain` orders by version and trusts it. A store that drops an
//! entry and renumbers the rest is caught by the hash links, but a gap in
//! the numbering on an otherwise intact chain is not reported.

use super::entry::{details_hash, AuditEntry, NewAuditEntry};
use super::store::{AuditStore, JsonlAuditStore, MemoryAuditStore};
use crate::config::AuditConfig;
use crate::error::{ComplianceError, Result};
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Default number of re-reads after an append loses to a concurrent writer
pub const DEFAULT_MAX_APPEND_RETRIES: u32 = 3;

/// Outcome of checking a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainValidation {
    pub valid: bool,
    /// Version of the first entry that does not verify
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broken_at: Option<u64>,
}

impl ChainValidation {
    fn intact() -> Self {
        Self {
            valid: true,
            broken_at: None,
        }
    }

    fn broken(version: u64) -> Self {
        Self {
            valid: false,
            broken_at: Some(version),
        }
    }
}

fn sorted_by_version(entries: &[AuditEntry]) -> Vec<&AuditEntry> {
    let mut sorted: Vec<&AuditEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| e.version);
    sorted
}

/// Check that every entry links to its predecessor's stored hash.
///
/// Entries are ordered by `version` first. Empty and single-entry chains
/// are valid. Stored hashes are not recomputed; see [`verify_integrity`].
pub fn validate_chain(entries: &[AuditEntry]) -> ChainValidation {
    let sorted = sorted_by_version(entries);
    for pair in sorted.windows(2) {
        if pair[1].previous_hash.as_deref() != Some(pair[0].hash.as_str()) {
            return ChainValidation::broken(pair[1].version);
        }
    }
    ChainValidation::intact()
}

/// Like [`validate_chain`], and also recompute each entry's hash from its
/// content. Reports the first entry (by version) failing either check.
pub fn verify_integrity(entries: &[AuditEntry]) -> ChainValidation {
    let sorted = sorted_by_version(entries);
    for (i, entry) in sorted.iter().enumerate() {
        if !entry.hash_matches() {
            return ChainValidation::broken(entry.version);
        }
        let linked = match i.checked_sub(1).map(|p| sorted[p]) {
            Some(prev) => entry.previous_hash.as_deref() == Some(prev.hash.as_str()),
            None => true,
        };
        if !linked {
            return ChainValidation::broken(entry.version);
        }
    }
    ChainValidation::intact()
}

/// Append-only, per-scope hash chain over an [`AuditStore`]
pub struct AuditChain {
    store: Arc<dyn AuditStore>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    max_append_retries: u32,
}

impl AuditChain {
    pub fn new(store: impl AuditStore + 'static) -> Self {
        Self::from_arc(Arc::new(store))
    }

    pub fn from_arc(store: Arc<dyn AuditStore>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
            max_append_retries: DEFAULT_MAX_APPEND_RETRIES,
        }
    }

    /// Chain over JSONL files in `persistence_dir`, or in memory when unset
    pub async fn from_config(config: &AuditConfig) -> Result<Self> {
        let store: Arc<dyn AuditStore> = match &config.persistence_dir {
            Some(dir) => Arc::new(JsonlAuditStore::open(dir).await?),
            None => Arc::new(MemoryAuditStore::new()),
        };
        Ok(Self::from_arc(store).with_max_append_retries(config.max_append_retries))
    }

    pub fn with_max_append_retries(mut self, retries: u32) -> Self {
        self.max_append_retries = retries;
        self
    }

    fn scope_lock(&self, scope: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(scope.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Append a new entry to `scope`, linking it to the current tip.
    ///
    /// Appends within this process are serialized per scope. Writers in
    /// other processes are handled by the store's conditional write: a
    /// `Conflict` re-reads the tip and retries up to the configured bound.
    pub async fn append(&self, scope: &str, new: NewAuditEntry) -> Result<AuditEntry> {
        let details_hash = details_hash(&new.details)?;
        let lock = self.scope_lock(scope);
        let result = {
            let _guard = lock.lock().await;
            self.append_locked(scope, &new, &details_hash).await
        };
        drop(lock);
        // Entry creation holds the same shard lock, so a count of one means
        // no other append can be holding or about to take this mutex.
        self.locks.remove_if(scope, |_, l| Arc::strong_count(l) == 1);
        result
    }

    async fn append_locked(
        &self,
        scope: &str,
        new: &NewAuditEntry,
        details_hash: &str,
    ) -> Result<AuditEntry> {
        let mut attempt = 0;
        loop {
            let tip = self.store.last_entry(scope).await?;
            let mut entry = AuditEntry {
                id: uuid::Uuid::new_v4().to_string(),
                version: tip.as_ref().map_or(1, |t| t.version + 1),
                scope: scope.to_string(),
                timestamp: Utc::now(),
                action: new.action.clone(),
                actor_id: new.actor_id.clone(),
                resource_id: new.resource_id.clone(),
                details_hash: details_hash.to_string(),
                hash: String::new(),
                previous_hash: tip.map(|t| t.hash),
            };
            entry.hash = entry.compute_hash()?;

            match self
                .store
                .append_entry(scope, &entry, entry.previous_hash.as_deref())
                .await
            {
                Ok(()) => {
                    tracing::debug!(
                        scope = %scope,
                        version = entry.version,
                        action = %entry.action,
                        "Audit entry appended"
                    );
                    return Ok(entry);
                }
                Err(ComplianceError::Conflict { .. }) if attempt < self.max_append_retries => {
                    attempt += 1;
                    tracing::debug!(scope = %scope, attempt, "Audit append conflict, re-reading tip");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// All entries of `scope` as stored
    pub async fn entries(&self, scope: &str) -> Result<Vec<AuditEntry>> {
        self.store.list_entries(scope).await
    }

    /// Full integrity check of a stored scope. A break is logged and
    /// returned as `Integrity`; nothing is modified.
    pub async fn verify_scope(&self, scope: &str) -> Result<()> {
        let entries = self.store.list_entries(scope).await?;
        match verify_integrity(&entries).broken_at {
            Some(broken_at) => {
                tracing::error!(scope = %scope, version = broken_at, "Audit chain integrity violated");
                Err(ComplianceError::Integrity {
                    scope: scope.to_string(),
                    broken_at,
                })
            }
            None => Ok(()),
        }
    }
}
