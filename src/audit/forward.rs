//! Delivery of audit entries to external collectors (SIEM, webhooks)
//!
//! Forwarding is non-critical: the entry is already durable in the chain,
//! so a failed delivery is logged and reported but never fails the caller.

use super::entry::AuditEntry;
use crate::error::{ComplianceError, Result};
use crate::executor::{FailClosedExecutor, FailClosedResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// External collector for audit entries
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn deliver(&self, entry: &AuditEntry) -> Result<()>;
}

/// Collects delivered entries in memory; can be switched to fail
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    delivered: RwLock<Vec<AuditEntry>>,
    unavailable: AtomicBool,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent deliveries fail with `Upstream`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn delivered(&self) -> Vec<AuditEntry> {
        self.delivered.read().await.clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn deliver(&self, entry: &AuditEntry) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ComplianceError::Upstream("audit sink unavailable".to_string()));
        }
        self.delivered.write().await.push(entry.clone());
        Ok(())
    }
}

/// Sends entries to an [`AuditSink`] through a [`FailClosedExecutor`]
pub struct AuditForwarder {
    sink: Arc<dyn AuditSink>,
    executor: FailClosedExecutor,
}

impl AuditForwarder {
    pub fn new(sink: Arc<dyn AuditSink>, executor: FailClosedExecutor) -> Self {
        Self { sink, executor }
    }

    /// Deliver `entry`; `data` is `true` only if the sink accepted it
    pub async fn forward(&self, entry: &AuditEntry) -> FailClosedResult<bool> {
        let sink = &self.sink;
        let result = self
            .executor
            .execute_with_status(
                move || async move { sink.deliver(entry).await.map(|()| true) },
                false,
            )
            .await;

        if !result.success {
            tracing::warn!(
                scope = %entry.scope,
                version = entry.version,
                retries_used = result.retries_used,
                "Audit entry not forwarded"
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::chain::AuditChain;
    use crate::audit::entry::NewAuditEntry;
    use crate::audit::store::MemoryAuditStore;
    use crate::executor::FailClosedOptions;

    fn fast_executor() -> FailClosedExecutor {
        FailClosedExecutor::new(FailClosedOptions {
            timeout_ms: 100,
            retries: 1,
            retry_delay_ms: 5,
        })
    }

    async fn one_entry() -> AuditEntry {
        AuditChain::new(MemoryAuditStore::new())
            .append("tenant-a", NewAuditEntry::new("view.allow", "u-1"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_forward_delivers() {
        let sink = Arc::new(MemoryAuditSink::new());
        let forwarder = AuditForwarder::new(sink.clone(), fast_executor());
        let entry = one_entry().await;

        let result = forwarder.forward(&entry).await;
        assert!(result.success);
        assert!(result.data);
        assert_eq!(sink.delivered().await, vec![entry]);
    }

    #[tokio::test]
    async fn test_unavailable_sink_falls_back() {
        let sink = Arc::new(MemoryAuditSink::new());
        sink.set_unavailable(true);
        let forwarder = AuditForwarder::new(sink.clone(), fast_executor());

        let result = forwarder.forward(&one_entry().await).await;
        assert!(!result.success);
        assert!(!result.data);
        assert_eq!(result.retries_used, 1);
        assert!(sink.delivered().await.is_empty());
    }
}
