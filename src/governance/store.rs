//! Governance mode persistence
//!
//! The store keeps raw string values so that a corrupted or foreign value
//! reaches the controller as-is and can be resolved to STANDBY there.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Backing store for the active mode per tenant/session key
#[async_trait]
pub trait ModeStore: Send + Sync {
    /// Raw stored value, `None` if the key was never set
    async fn load(&self, key: &str) -> Result<Option<String>>;

    /// Atomically set `key` to `new` if its current raw value equals
    /// `expected` (`None` meaning unset). Returns whether the swap happened.
    async fn compare_and_swap(&self, key: &str, expected: Option<&str>, new: &str)
        -> Result<bool>;

    /// Remove the value for `key`
    async fn clear(&self, key: &str) -> Result<()>;
}

/// In-memory mode store for development and testing
#[derive(Debug, Default)]
pub struct MemoryModeStore {
    modes: RwLock<HashMap<String, String>>,
}

impl MemoryModeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a raw value directly, bypassing transition rules
    pub async fn insert_raw(&self, key: &str, value: &str) {
        self.modes
            .write()
            .await
            .insert(key.to_string(), value.to_string());
    }
}

#[async_trait]
impl ModeStore for MemoryModeStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.modes.read().await.get(key).cloned())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool> {
        let mut modes = self.modes.write().await;
        if modes.get(key).map(String::as_str) != expected {
            return Ok(false);
        }
        modes.insert(key.to_string(), new.to_string());
        Ok(true)
    }

    async fn clear(&self, key: &str) -> Result<()> {
        self.modes.write().await.remove(key);
        Ok(())
    }
}
