//! In-memory execution store — for tests and `backend = "memory"`.
//! Nothing survives a restart.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use flowclaw_core::error::{FlowClawError, Result};
use flowclaw_core::traits::ExecutionStore;
use flowclaw_core::types::{Execution, ExecutionStatus, StatusUpdate};

/// Reject anything but a forward transition.
pub(crate) fn check_transition(
    id: &str,
    from: ExecutionStatus,
    to: ExecutionStatus,
) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(FlowClawError::InvalidTransition {
            id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Apply a status change to an execution record in place.
pub(crate) fn apply_update(execution: &mut Execution, status: ExecutionStatus, update: StatusUpdate) {
    execution.status = status;
    if status == ExecutionStatus::Running && execution.started_at.is_none() {
        execution.started_at = Some(Utc::now());
    }
    if status.is_terminal() {
        execution.completed_at = update.completed_at.or_else(|| Some(Utc::now()));
    }
    if update.result.is_some() {
        execution.result = update.result;
    }
    if update.error.is_some() {
        execution.error = update.error;
    }
}

/// Executions kept in insertion order.
#[derive(Default)]
pub struct MemoryExecutionStore {
    executions: Mutex<Vec<Execution>>,
}

impl MemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Execution>> {
        self.executions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ExecutionStore for MemoryExecutionStore {
    async fn create_execution(&self, workflow_id: &str, trigger: serde_json::Value) -> Result<Execution> {
        let execution = Execution::new(workflow_id, trigger);
        self.lock().push(execution.clone());
        Ok(execution)
    }

    async fn update_execution_status(
        &self,
        execution_id: &str,
        status: ExecutionStatus,
        update: StatusUpdate,
    ) -> Result<()> {
        let mut executions = self.lock();
        let execution = executions
            .iter_mut()
            .find(|e| e.id == execution_id)
            .ok_or_else(|| FlowClawError::Persistence(format!("execution {execution_id} not found")))?;
        check_transition(execution_id, execution.status, status)?;
        apply_update(execution, status, update);
        Ok(())
    }

    async fn get_execution(&self, execution_id: &str) -> Result<Option<Execution>> {
        Ok(self.lock().iter().find(|e| e.id == execution_id).cloned())
    }

    async fn list_executions(&self, workflow_id: &str, limit: usize) -> Result<Vec<Execution>> {
        Ok(self
            .lock()
            .iter()
            .rev()
            .filter(|e| e.workflow_id == workflow_id)
            .take(limit)
            .cloned()
            .collect())
    }
}
