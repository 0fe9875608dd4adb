//! Audit entry persistence
//!
//! Stores are append-only: the trait has no update or delete. Every append
//! is conditional on the caller's view of the chain tip, so two writers
//! racing on the same scope cannot both extend it.

use super::entry::AuditEntry;
use crate::error::{ComplianceError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;

/// Backing store for per-scope audit chains
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append `entry` to `scope` if the current tip's hash equals
    /// `expected_previous` (`None` meaning the scope is empty).
    /// Fails with `Conflict` otherwise.
    async fn append_entry(
        &self,
        scope: &str,
        entry: &AuditEntry,
        expected_previous: Option<&str>,
    ) -> Result<()>;

    /// All entries of `scope` in append order
    async fn list_entries(&self, scope: &str) -> Result<Vec<AuditEntry>>;

    /// Current tip of `scope`
    async fn last_entry(&self, scope: &str) -> Result<Option<AuditEntry>>;
}

/// In-memory audit store for development and testing
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    chains: RwLock<HashMap<String, Vec<AuditEntry>>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append_entry(
        &self,
        scope: &str,
        entry: &AuditEntry,
        expected_previous: Option<&str>,
    ) -> Result<()> {
        let mut chains = self.chains.write().await;
        let chain = chains.entry(scope.to_string()).or_default();
        let tip = chain.last().map(|e| e.hash.as_str());
        if tip != expected_previous {
            return Err(ComplianceError::Conflict {
                scope: scope.to_string(),
            });
        }
        chain.push(entry.clone());
        Ok(())
    }

    async fn list_entries(&self, scope: &str) -> Result<Vec<AuditEntry>> {
        Ok(self
            .chains
            .read()
            .await
            .get(scope)
            .cloned()
            .unwrap_or_default())
    }

    async fn last_entry(&self, scope: &str) -> Result<Option<AuditEntry>> {
        Ok(self
            .chains
            .read()
            .await
            .get(scope)
            .and_then(|chain| chain.last().cloned()))
    }
}

/// Append-only JSONL persistence, one `<scope>.jsonl` file per scope
///
/// Lines that fail to parse are reported as errors rather than skipped, so
/// a damaged file surfaces instead of silently shortening the chain.
///
/// A directory must have a single writing process. Tips are cached after
/// the first read of a scope, so lines appended by another process are not
/// seen by `last_entry` until the store is reopened.
pub struct JsonlAuditStore {
    dir: PathBuf,
    /// Write-held while a line is appended, read-held while a file is parsed
    io_lock: RwLock<()>,
    tips: DashMap<String, AuditEntry>,
}

impl JsonlAuditStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await.map_err(|e| {
            ComplianceError::Store(format!(
                "Failed to create audit directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(Self {
            dir,
            io_lock: RwLock::new(()),
            tips: DashMap::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the chain for `scope`
    pub fn scope_path(&self, scope: &str) -> Result<PathBuf> {
        validate_scope(scope)?;
        Ok(self.dir.join(format!("{}.jsonl", scope)))
    }

    async fn load(&self, scope: &str) -> Result<Vec<AuditEntry>> {
        let path = self.scope_path(scope)?;
        let file = match fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ComplianceError::Store(format!(
                    "Failed to open audit file {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let mut lines = BufReader::new(file).lines();
        let mut entries = Vec::new();
        while let Some(line) = lines.next_line().await.map_err(|e| {
            ComplianceError::Store(format!("Failed to read audit file {}: {}", path.display(), e))
        })? {
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str::<AuditEntry>(&line)?);
        }
        Ok(entries)
    }

    /// Tip of `scope`, parsing the file only on a cache miss. Callers hold
    /// `io_lock`.
    async fn tip(&self, scope: &str) -> Result<Option<AuditEntry>> {
        let cached = self.tips.get(scope).map(|t| t.value().clone());
        if cached.is_some() {
            return Ok(cached);
        }
        let tip = self.load(scope).await?.pop();
        if let Some(t) = &tip {
            self.tips.insert(scope.to_string(), t.clone());
        }
        Ok(tip)
    }

    async fn write_line(&self, path: &Path, line: &str) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| {
                ComplianceError::Store(format!(
                    "Failed to open audit file {}: {}",
                    path.display(),
                    e
                ))
            })?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| ComplianceError::Store(format!("Failed to write audit entry: {}", e)))?;
        file.flush()
            .await
            .map_err(|e| ComplianceError::Store(format!("Failed to flush audit entry: {}", e)))
    }
}

#[async_trait]
impl AuditStore for JsonlAuditStore {
    async fn append_entry(
        &self,
        scope: &str,
        entry: &AuditEntry,
        expected_previous: Option<&str>,
    ) -> Result<()> {
        let path = self.scope_path(scope)?;
        let _guard = self.io_lock.write().await;

        let tip = self.tip(scope).await?;
        if tip.as_ref().map(|e| e.hash.as_str()) != expected_previous {
            return Err(ComplianceError::Conflict {
                scope: scope.to_string(),
            });
        }

        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        if let Err(e) = self.write_line(&path, &line).await {
            // The file may now end in a partial line; reparse on next use
            self.tips.remove(scope);
            return Err(e);
        }
        self.tips.insert(scope.to_string(), entry.clone());
        Ok(())
    }

    async fn list_entries(&self, scope: &str) -> Result<Vec<AuditEntry>> {
        let _guard = self.io_lock.read().await;
        self.load(scope).await
    }

    async fn last_entry(&self, scope: &str) -> Result<Option<AuditEntry>> {
        let _guard = self.io_lock.read().await;
        self.tip(scope).await
    }
}

/// Scopes become file names, so only `[A-Za-z0-9_.-]` is accepted and a
/// leading dot is rejected.
fn validate_scope(scope: &str) -> Result<()> {
    let valid = !scope.is_empty()
        && !scope.starts_with('.')
        && scope
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(ComplianceError::Validation(format!(
            "audit scope '{}' may only contain letters, digits, '_', '-' and '.'",
            scope
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(version: u64, hash: &str, previous_hash: Option<&str>) -> AuditEntry {
        AuditEntry {
            id: format!("e-{}", version),
            version,
            scope: "tenant-a".to_string(),
            timestamp: Utc::now(),
            action: "view.allow".to_string(),
            actor_id: "u-1".to_string(),
            resource_id: None,
            details_hash: "d".repeat(64),
            hash: hash.to_string(),
            previous_hash: previous_hash.map(String::from),
        }
    }

    async fn conditional_append_semantics(store: &dyn AuditStore) {
        assert!(store.last_entry("tenant-a").await.unwrap().is_none());

        store
            .append_entry("tenant-a", &entry(1, "h1", None), None)
            .await
            .unwrap();
        store
            .append_entry("tenant-a", &entry(2, "h2", Some("h1")), Some("h1"))
            .await
            .unwrap();

        // A writer that still believes the tip is h1 loses
        let err = store
            .append_entry("tenant-a", &entry(2, "h2b", Some("h1")), Some("h1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ComplianceError::Conflict { .. }));

        let entries = store.list_entries("tenant-a").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(store.last_entry("tenant-a").await.unwrap().unwrap().hash, "h2");
        assert!(store.list_entries("tenant-b").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_conditional_append() {
        conditional_append_semantics(&MemoryAuditStore::new()).await;
    }

    #[tokio::test]
    async fn test_jsonl_store_conditional_append() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlAuditStore::open(dir.path()).await.unwrap();
        conditional_append_semantics(&store).await;

        let raw = std::fs::read_to_string(dir.path().join("tenant-a.jsonl")).unwrap();
        assert_eq!(raw.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_jsonl_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonlAuditStore::open(dir.path()).await.unwrap();
            store
                .append_entry("tenant-a", &entry(1, "h1", None), None)
                .await
                .unwrap();
        }
        let store = JsonlAuditStore::open(dir.path()).await.unwrap();
        let entries = store.list_entries("tenant-a").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].version, 1);
    }

    #[tokio::test]
    async fn test_jsonl_store_tip_follows_appends() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlAuditStore::open(dir.path()).await.unwrap();
        let mut previous: Option<String> = None;
        for v in 1..=200u64 {
            let hash = format!("h{}", v);
            store
                .append_entry(
                    "tenant-a",
                    &entry(v, &hash, previous.as_deref()),
                    previous.as_deref(),
                )
                .await
                .unwrap();
            assert_eq!(store.last_entry("tenant-a").await.unwrap().unwrap().version, v);
            previous = Some(hash);
        }

        // A fresh store rebuilds the tip from the file
        let reopened = JsonlAuditStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.last_entry("tenant-a").await.unwrap().unwrap().hash, "h200");
        assert!(reopened
            .append_entry("tenant-a", &entry(201, "h201", Some("h199")), Some("h199"))
            .await
            .is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_jsonl_reads_never_see_partial_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(JsonlAuditStore::open(dir.path()).await.unwrap());

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                let mut previous: Option<String> = None;
                for v in 1..=100u64 {
                    let hash = format!("h{}", v);
                    store
                        .append_entry(
                            "tenant-a",
                            &entry(v, &hash, previous.as_deref()),
                            previous.as_deref(),
                        )
                        .await
                        .unwrap();
                    previous = Some(hash);
                }
            })
        };
        let reader = {
            let store = store.clone();
            tokio::spawn(async move {
                let mut seen = 0;
                while seen < 100 {
                    // A torn line would fail to parse here
                    seen = store.list_entries("tenant-a").await.unwrap().len();
                    tokio::task::yield_now().await;
                }
            })
        };
        writer.await.unwrap();
        reader.await.unwrap();
    }

    #[tokio::test]
    async fn test_jsonl_store_reports_corrupt_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tenant-a.jsonl"), "{not json}\n").unwrap();
        let store = JsonlAuditStore::open(dir.path()).await.unwrap();
        assert!(matches!(
            store.list_entries("tenant-a").await,
            Err(ComplianceError::Serialization(_))
        ));
    }

    #[test]
    fn test_scope_validation() {
        assert!(validate_scope("tenant-a").is_ok());
        assert!(validate_scope("tenant_a.2026").is_ok());
        assert!(validate_scope("").is_err());
        assert!(validate_scope("../etc").is_err());
        assert!(validate_scope(".hidden").is_err());
        assert!(validate_scope("a/b").is_err());
    }
}
