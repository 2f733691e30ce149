//! Execution persistence contract.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::types::{Execution, ExecutionStatus, StatusUpdate};

/// Persistence store for executions. Each call is atomic.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Create a PENDING execution.
    async fn create_execution(&self, workflow_id: &str, trigger: Value) -> Result<Execution>;

    /// Move an execution to `status`. Non-monotonic transitions are rejected.
    async fn update_execution_status(
        &self,
        execution_id: &str,
        status: ExecutionStatus,
        update: StatusUpdate,
    ) -> Result<()>;

    async fn get_execution(&self, execution_id: &str) -> Result<Option<Execution>>;

    /// Most recent first.
    async fn list_executions(&self, workflow_id: &str, limit: usize) -> Result<Vec<Execution>>;
}
