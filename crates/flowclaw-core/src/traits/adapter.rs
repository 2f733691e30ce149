//! Adapter and dispatcher traits.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{AdapterResult, Intent};

/// One external tool's capability.
///
/// `Ok(AdapterResult)` with `retryable = false` reports malformed input;
/// `Err(_)` means a transient condition (I/O, network) and is retried.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Tool name the adapter is registered under.
    fn name(&self) -> &str;

    /// Context keys that must be present for `execute` to proceed.
    fn required_fields(&self) -> &[&str] {
        &[]
    }

    async fn execute(&self, intent: &Intent) -> Result<AdapterResult>;
}

/// Resolves an intent's tool to an adapter and invokes it.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, intent: &Intent) -> Result<AdapterResult>;
}
