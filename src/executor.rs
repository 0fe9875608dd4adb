//! Fail-closed executor for non-critical external calls
//!
//! Wraps an async operation with a per-attempt timeout and a fixed-delay
//! retry loop. When every attempt fails the caller gets the fallback value
//! instead of an error.
//!
//! Timeouts are advisory. A timed-out attempt's future is dropped, which
//! stops this wrapper from waiting on it, but work the operation already
//! handed to another task or a remote service may keep running.
//!
//! Only for calls whose failure is tolerable (audit forwarding, SIEM and
//! webhook delivery). Scanner, redactor and governance calls must not be
//! wrapped: their failures have to propagate so callers fail closed.

use crate::error::{ComplianceError, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Timeout and retry settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailClosedOptions {
    /// Deadline for each attempt, in milliseconds
    pub timeout_ms: u64,
    /// Extra attempts after the first failure
    pub retries: u32,
    /// Fixed delay between attempts, in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for FailClosedOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            retries: 2,
            retry_delay_ms: 500,
        }
    }
}

impl FailClosedOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Outcome of [`FailClosedExecutor::execute_with_status`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailClosedResult<T> {
    pub success: bool,
    /// Operation result on success, the fallback otherwise
    pub data: T,
    /// Message of the last failure, if the fallback was used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub retries_used: u32,
}

/// Timeout / fixed-delay retry / fallback wrapper
#[derive(Debug, Clone, Copy, Default)]
pub struct FailClosedExecutor {
    options: FailClosedOptions,
}

impl FailClosedExecutor {
    pub fn new(options: FailClosedOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FailClosedOptions {
        &self.options
    }

    /// Run `operation`, returning `fallback` if every attempt fails
    pub async fn execute<T, F, Fut>(&self, operation: F, fallback: T) -> T
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_with_status(operation, fallback).await.data
    }

    /// Like [`execute`](Self::execute), reporting success and retries used
    pub async fn execute_with_status<T, F, Fut>(
        &self,
        operation: F,
        fallback: T,
    ) -> FailClosedResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let (outcome, retries_used) = self.run(operation).await;
        match outcome {
            Ok(data) => FailClosedResult {
                success: true,
                data,
                error: None,
                retries_used,
            },
            Err(e) => {
                tracing::warn!(
                    retries_used,
                    error = %e,
                    "External call failed after retries, using fallback"
                );
                FailClosedResult {
                    success: false,
                    data: fallback,
                    error: Some(e.to_string()),
                    retries_used,
                }
            }
        }
    }

    /// Like [`execute_with_status`](Self::execute_with_status), with
    /// `options` applying to this call only
    pub async fn execute_with<T, F, Fut>(
        &self,
        options: FailClosedOptions,
        operation: F,
        fallback: T,
    ) -> FailClosedResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        Self::new(options)
            .execute_with_status(operation, fallback)
            .await
    }

    /// Same timeout and retry loop, for operations marked critical: the
    /// last failure propagates instead of being replaced by a fallback.
    pub async fn execute_critical<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run(operation).await.0
    }

    async fn run<T, F, Fut>(&self, mut operation: F) -> (Result<T>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let timeout = self.options.timeout();
        let mut attempt: u32 = 0;

        loop {
            let outcome = match tokio::time::timeout(timeout, operation()).await {
                Ok(Ok(value)) => return (Ok(value), attempt),
                Ok(Err(e)) => e,
                Err(_) => ComplianceError::Timeout(format!(
                    "attempt {} exceeded {}ms",
                    attempt + 1,
                    self.options.timeout_ms
                )),
            };

            if attempt >= self.options.retries {
                return (Err(outcome), attempt);
            }

            tracing::debug!(
                attempt = attempt + 1,
                error = %outcome,
                delay_ms = self.options.retry_delay_ms,
                "External call failed, retrying"
            );
            tokio::time::sleep(self.options.retry_delay()).await;
            attempt += 1;
        }
    }
}
