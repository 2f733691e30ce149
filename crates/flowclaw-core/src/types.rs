//! Shared data model — workflows, steps, executions, intents and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle of a workflow definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Active,
    Paused,
    Archived,
}

/// A named, ordered sequence of steps owned by an agent/user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: WorkflowStatus,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Executed strictly in array order.
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
}

impl Workflow {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            status: WorkflowStatus::Draft,
            agent_id: None,
            user_id: None,
            steps: Vec::new(),
        }
    }

    /// Append a step (builder style).
    pub fn with_step(mut self, step: WorkflowStep) -> Self {
        self.steps.push(step);
        self
    }
}

/// One unit of work: a tool tag plus an opaque configuration map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Tool-type tag; selects the adapter.
    #[serde(rename = "type", alias = "tool")]
    pub tool: String,
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Graph metadata carried from the editor. Not consulted by the engine.
    #[serde(default)]
    pub next: Vec<String>,
    #[serde(default)]
    pub previous: Vec<String>,
}

impl WorkflowStep {
    pub fn new(tool: &str, config: Value) -> Self {
        let config = match config {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: tool.to_string(),
            tool: tool.to_string(),
            config,
            next: Vec::new(),
            previous: Vec::new(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Display label used in logs and notifications.
    pub fn label(&self) -> &str {
        if self.name.is_empty() { &self.tool } else { &self.name }
    }

    /// Intent verb declared by the step configuration.
    pub fn intent_verb(&self) -> String {
        ["intent", "op", "action"]
            .iter()
            .find_map(|key| self.config.get(*key).and_then(|v| v.as_str()))
            .unwrap_or("execute")
            .to_string()
    }
}

/// Execution status. Monotonic: Pending → Running → Completed | Failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "PENDING",
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Completed => "COMPLETED",
            ExecutionStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ExecutionStatus::Pending),
            "RUNNING" => Some(ExecutionStatus::Running),
            "COMPLETED" => Some(ExecutionStatus::Completed),
            "FAILED" => Some(ExecutionStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }

    /// Legal forward transitions only.
    pub fn can_transition_to(&self, next: ExecutionStatus) -> bool {
        matches!(
            (self, next),
            (ExecutionStatus::Pending, ExecutionStatus::Running)
                | (ExecutionStatus::Running, ExecutionStatus::Completed)
                | (ExecutionStatus::Running, ExecutionStatus::Failed)
        )
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One run of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub workflow_id: String,
    pub status: ExecutionStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Trigger input (manual payload or schedule marker).
    pub trigger: Value,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl Execution {
    /// A fresh PENDING execution.
    pub fn new(workflow_id: &str, trigger: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workflow_id: workflow_id.to_string(),
            status: ExecutionStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            trigger,
            result: None,
            error: None,
        }
    }
}

/// Optional fields written together with a status change.
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl StatusUpdate {
    pub fn completed(result: Value) -> Self {
        Self {
            completed_at: Some(Utc::now()),
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(error: &str) -> Self {
        Self {
            completed_at: Some(Utc::now()),
            result: None,
            error: Some(error.to_string()),
        }
    }
}

/// Normalized request handed to an adapter for one step. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub agent_id: Option<String>,
    pub user_id: Option<String>,
    pub tool: String,
    /// Verb such as "send" or "read".
    pub intent: String,
    pub context: Map<String, Value>,
}

impl Intent {
    /// Build the intent for a step of the given workflow.
    pub fn for_step(workflow: &Workflow, step: &WorkflowStep) -> Self {
        Self {
            agent_id: workflow.agent_id.clone(),
            user_id: workflow.user_id.clone(),
            tool: step.tool.clone(),
            intent: step.intent_verb(),
            context: step.config.clone(),
        }
    }

    /// String field from the context, if present and non-empty.
    pub fn context_str(&self, key: &str) -> Option<&str> {
        self.context
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}

fn default_retryable() -> bool {
    true
}

/// What an adapter call returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// False for malformed input or unknown tools; the engine stops retrying.
    #[serde(default = "default_retryable")]
    pub retryable: bool,
}

impl AdapterResult {
    pub fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: Some(message.to_string()),
            data: None,
            error: None,
            retryable: true,
        }
    }

    pub fn ok_with_data(message: &str, data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::ok(message)
        }
    }

    /// Transient failure reported by the remote side.
    pub fn failure(error: &str) -> Self {
        Self {
            success: false,
            message: None,
            data: None,
            error: Some(error.to_string()),
            retryable: true,
        }
    }

    /// Validation failure — never retried.
    pub fn invalid(error: &str) -> Self {
        Self {
            retryable: false,
            ..Self::failure(error)
        }
    }

    pub fn unsupported_tool() -> Self {
        Self {
            success: false,
            message: Some("Unsupported tool".into()),
            data: None,
            error: None,
            retryable: false,
        }
    }

    /// Best human-readable failure text.
    pub fn failure_message(&self) -> Option<&str> {
        self.error.as_deref().or(self.message.as_deref())
    }
}

/// Outcome of `ExecutionEngine::run`. Never an `Err`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub steps_completed: usize,
}

impl ExecutionResult {
    pub fn completed(execution_id: &str, steps_completed: usize) -> Self {
        Self {
            success: true,
            execution_id: Some(execution_id.to_string()),
            error: None,
            steps_completed,
        }
    }

    pub fn failed(execution_id: Option<&str>, error: &str, steps_completed: usize) -> Self {
        Self {
            success: false,
            execution_id: execution_id.map(String::from),
            error: Some(error.to_string()),
            steps_completed,
        }
    }
}

/// Execution status change broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionUpdate {
    pub execution_id: String,
    pub workflow_id: String,
    pub status: ExecutionStatus,
    pub timestamp: DateTime<Utc>,
}

/// A step finished successfully.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepProgress {
    pub execution_id: String,
    pub workflow_id: String,
    pub step_id: String,
    pub step_name: String,
    pub step_index: usize,
    pub total_steps: usize,
    pub attempts: u32,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A run aborted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub execution_id: Option<String>,
    pub workflow_id: String,
    pub step_id: Option<String>,
    pub step_name: Option<String>,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}
