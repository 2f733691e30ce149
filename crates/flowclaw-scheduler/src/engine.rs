//! Execution Engine — runs a workflow's steps in order through the dispatcher.
//!
//! One run = one Execution record, written exactly twice under normal
//! operation (RUNNING on entry, COMPLETED/FAILED at the end). Steps are
//! strictly sequential; a step that exhausts its retries aborts the run.
//! `run` never returns an error: every failure folds into `ExecutionResult`.

use std::sync::Arc;

use chrono::Utc;
use flowclaw_core::error::{FlowClawError, Result};
use flowclaw_core::traits::{Broadcaster, Dispatcher, ExecutionStore};
use flowclaw_core::types::{
    AdapterResult, ErrorInfo, ExecutionResult, ExecutionStatus, ExecutionUpdate, Intent,
    StatusUpdate, StepProgress, Workflow, WorkflowStep,
};

use crate::retry::RetryPolicy;

/// Classified result of one dispatch attempt.
#[derive(Debug)]
pub enum StepOutcome {
    Success(AdapterResult),
    /// Transient — try again while attempts remain.
    Retryable(String),
    /// Validation or dispatch failure — abort immediately.
    Fatal(String),
}

impl StepOutcome {
    pub fn classify(attempt: Result<AdapterResult>, step: &WorkflowStep) -> Self {
        match attempt {
            Ok(result) if result.success => StepOutcome::Success(result),
            Ok(result) => {
                let error = result
                    .failure_message()
                    .map(String::from)
                    .unwrap_or_else(|| format!("Step '{}' failed", step.label()));
                if result.retryable {
                    StepOutcome::Retryable(error)
                } else {
                    StepOutcome::Fatal(error)
                }
            }
            Err(e) => StepOutcome::Retryable(e.to_string()),
        }
    }
}

/// Render a store error the way it is surfaced to callers.
fn persistence_error(e: &FlowClawError) -> String {
    match e {
        FlowClawError::Persistence(_) => e.to_string(),
        other => format!("Persistence failure: {other}"),
    }
}

/// The workflow execution engine.
pub struct ExecutionEngine {
    dispatcher: Arc<dyn Dispatcher>,
    store: Arc<dyn ExecutionStore>,
    broadcaster: Arc<dyn Broadcaster>,
    retry: RetryPolicy,
}

impl ExecutionEngine {
    pub fn new(
        dispatcher: Arc<dyn Dispatcher>,
        store: Arc<dyn ExecutionStore>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Self {
        Self {
            dispatcher,
            store,
            broadcaster,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn store(&self) -> &Arc<dyn ExecutionStore> {
        &self.store
    }

    /// Manually trigger a run.
    pub async fn run(&self, workflow: &Workflow) -> ExecutionResult {
        self.trigger(workflow, serde_json::json!({ "source": "manual" }))
            .await
    }

    /// Create an Execution with the given trigger input, then run it.
    pub async fn trigger(&self, workflow: &Workflow, trigger: serde_json::Value) -> ExecutionResult {
        match self.store.create_execution(&workflow.id, trigger).await {
            Ok(execution) => self.execute(workflow, &execution.id).await,
            Err(e) => {
                let error = persistence_error(&e);
                tracing::error!("❌ Workflow '{}' could not be started: {}", workflow.name, error);
                self.broadcaster.notify_error(ErrorInfo {
                    execution_id: None,
                    workflow_id: workflow.id.clone(),
                    step_id: None,
                    step_name: None,
                    error: error.clone(),
                    timestamp: Utc::now(),
                });
                ExecutionResult::failed(None, &error, 0)
            }
        }
    }

    /// Run an existing PENDING execution to a terminal state.
    pub async fn execute(&self, workflow: &Workflow, execution_id: &str) -> ExecutionResult {
        if let Err(e) = self
            .store
            .update_execution_status(execution_id, ExecutionStatus::Running, StatusUpdate::default())
            .await
        {
            let error = persistence_error(&e);
            tracing::error!("❌ Execution {} could not enter RUNNING: {}", execution_id, error);
            self.broadcaster.notify_error(self.error_info(workflow, execution_id, None, &error));
            return ExecutionResult::failed(Some(execution_id), &error, 0);
        }
        self.broadcast_status(workflow, execution_id, ExecutionStatus::Running);

        let total = workflow.steps.len();
        tracing::info!(
            "▶️ Workflow '{}' started (execution {}, {} steps)",
            workflow.name,
            execution_id,
            total
        );

        let mut outputs = Vec::with_capacity(total);
        for (index, step) in workflow.steps.iter().enumerate() {
            match self.run_step(workflow, step).await {
                Ok((result, attempts)) => {
                    tracing::info!(
                        "✅ Step {}/{} '{}' done ({} attempt{})",
                        index + 1,
                        total,
                        step.label(),
                        attempts,
                        if attempts == 1 { "" } else { "s" }
                    );
                    self.broadcaster.notify_progress(StepProgress {
                        execution_id: execution_id.to_string(),
                        workflow_id: workflow.id.clone(),
                        step_id: step.id.clone(),
                        step_name: step.label().to_string(),
                        step_index: index,
                        total_steps: total,
                        attempts,
                        message: result.message.clone(),
                        timestamp: Utc::now(),
                    });
                    outputs.push(serde_json::json!({
                        "step_id": step.id,
                        "tool": step.tool,
                        "message": result.message,
                        "data": result.data,
                    }));
                }
                Err(error) => {
                    return self.fail(workflow, execution_id, step, &error, index).await;
                }
            }
        }

        let result = serde_json::json!({ "steps": outputs });
        match self
            .store
            .update_execution_status(
                execution_id,
                ExecutionStatus::Completed,
                StatusUpdate::completed(result),
            )
            .await
        {
            Ok(()) => {
                self.broadcast_status(workflow, execution_id, ExecutionStatus::Completed);
                tracing::info!("🏁 Workflow '{}' completed (execution {})", workflow.name, execution_id);
                ExecutionResult::completed(execution_id, total)
            }
            Err(e) => {
                let error = persistence_error(&e);
                tracing::error!("❌ Execution {} could not be completed: {}", execution_id, error);
                let error = self.record_failure(workflow, execution_id, &error).await;
                self.broadcaster.notify_error(self.error_info(workflow, execution_id, None, &error));
                ExecutionResult::failed(Some(execution_id), &error, total)
            }
        }
    }

    /// Persist FAILED with `error`. Returns the message to surface, which
    /// also carries the store error when this write fails too.
    async fn record_failure(&self, workflow: &Workflow, execution_id: &str, error: &str) -> String {
        match self
            .store
            .update_execution_status(execution_id, ExecutionStatus::Failed, StatusUpdate::failed(error))
            .await
        {
            Ok(()) => {
                self.broadcast_status(workflow, execution_id, ExecutionStatus::Failed);
                error.to_string()
            }
            Err(e) => format!("{error} ({})", persistence_error(&e)),
        }
    }

    /// Dispatch one step with bounded retries.
    /// Returns the successful result and the attempt count, or the last error.
    async fn run_step(
        &self,
        workflow: &Workflow,
        step: &WorkflowStep,
    ) -> std::result::Result<(AdapterResult, u32), String> {
        let intent = Intent::for_step(workflow, step);
        let max_attempts = self.retry.max_attempts();
        let mut last_error = format!("Step '{}' failed", step.label());

        for attempt in 1..=max_attempts {
            let outcome = StepOutcome::classify(self.dispatcher.dispatch(&intent).await, step);
            match outcome {
                StepOutcome::Success(result) => return Ok((result, attempt)),
                StepOutcome::Fatal(error) => {
                    tracing::warn!("🚫 Step '{}' failed (not retryable): {}", step.label(), error);
                    return Err(error);
                }
                StepOutcome::Retryable(error) => {
                    if attempt < max_attempts {
                        let delay = self.retry.delay_for(attempt - 1);
                        tracing::warn!(
                            "⚠️ Step '{}' attempt {}/{} failed: {} — retrying in {:?}",
                            step.label(),
                            attempt,
                            max_attempts,
                            error,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        tracing::warn!(
                            "⚠️ Step '{}' attempt {}/{} failed: {} — giving up",
                            step.label(),
                            attempt,
                            max_attempts,
                            error
                        );
                    }
                    last_error = error;
                }
            }
        }

        Err(last_error)
    }

    /// Abort path: persist FAILED, emit one error notification.
    async fn fail(
        &self,
        workflow: &Workflow,
        execution_id: &str,
        step: &WorkflowStep,
        error: &str,
        steps_completed: usize,
    ) -> ExecutionResult {
        let error = self.record_failure(workflow, execution_id, error).await;

        tracing::error!(
            "❌ Workflow '{}' failed at step '{}': {}",
            workflow.name,
            step.label(),
            error
        );
        self.broadcaster
            .notify_error(self.error_info(workflow, execution_id, Some(step), &error));
        ExecutionResult::failed(Some(execution_id), &error, steps_completed)
    }

    fn broadcast_status(&self, workflow: &Workflow, execution_id: &str, status: ExecutionStatus) {
        self.broadcaster.notify_update(ExecutionUpdate {
            execution_id: execution_id.to_string(),
            workflow_id: workflow.id.clone(),
            status,
            timestamp: Utc::now(),
        });
    }

    fn error_info(
        &self,
        workflow: &Workflow,
        execution_id: &str,
        step: Option<&WorkflowStep>,
        error: &str,
    ) -> ErrorInfo {
        ErrorInfo {
            execution_id: Some(execution_id.to_string()),
            workflow_id: workflow.id.clone(),
            step_id: step.map(|s| s.id.clone()),
            step_name: step.map(|s| s.label().to_string()),
            error: error.to_string(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::EventBroadcaster;
    use crate::store::MemoryExecutionStore;
    use async_trait::async_trait;
    use flowclaw_core::types::WorkflowStep;
    use std::sync::Mutex;

    /// Replays scripted outcomes, then succeeds.
    struct ScriptedDispatcher {
        script: Mutex<Vec<Result<AdapterResult>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedDispatcher {
        fn new(script: Vec<Result<AdapterResult>>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Dispatcher for ScriptedDispatcher {
        async fn dispatch(&self, intent: &Intent) -> Result<AdapterResult> {
            self.calls.lock().unwrap().push(intent.tool.clone());
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                Ok(AdapterResult::ok("done"))
            } else {
                script.remove(0)
            }
        }
    }

    fn engine(
        dispatcher: Arc<ScriptedDispatcher>,
    ) -> (ExecutionEngine, Arc<MemoryExecutionStore>, Arc<EventBroadcaster>) {
        let store = Arc::new(MemoryExecutionStore::new());
        let events = Arc::new(EventBroadcaster::new(16, 100));
        let engine = ExecutionEngine::new(dispatcher, store.clone(), events.clone());
        (engine, store, events)
    }

    fn workflow(tools: &[&str]) -> Workflow {
        tools.iter().fold(Workflow::new("wf-1", "test"), |wf, tool| {
            wf.with_step(WorkflowStep::new(tool, serde_json::json!({"op": "send"})))
        })
    }

    #[test]
    fn test_classify() {
        let step = WorkflowStep::new("toolA", serde_json::json!({}));
        assert!(matches!(
            StepOutcome::classify(Ok(AdapterResult::ok("fine")), &step),
            StepOutcome::Success(_)
        ));
        assert!(matches!(
            StepOutcome::classify(Ok(AdapterResult::failure("503")), &step),
            StepOutcome::Retryable(e) if e == "503"
        ));
        assert!(matches!(
            StepOutcome::classify(Ok(AdapterResult::invalid("bad")), &step),
            StepOutcome::Fatal(e) if e == "bad"
        ));
        assert!(matches!(
            StepOutcome::classify(Err(FlowClawError::Http("reset".into())), &step),
            StepOutcome::Retryable(e) if e == "HTTP error: reset"
        ));

        let bare = AdapterResult {
            success: false,
            message: None,
            data: None,
            error: None,
            retryable: true,
        };
        assert!(matches!(
            StepOutcome::classify(Ok(bare), &step),
            StepOutcome::Retryable(e) if e == "Step 'toolA' failed"
        ));
    }

    #[tokio::test]
    async fn test_empty_workflow_succeeds() {
        let dispatcher = Arc::new(ScriptedDispatcher::new(vec![]));
        let (engine, store, events) = engine(dispatcher.clone());

        let result = engine.run(&Workflow::new("wf-empty", "empty")).await;
        assert!(result.success);
        assert_eq!(result.steps_completed, 0);
        assert!(dispatcher.calls().is_empty());

        let executions = store.list_executions("wf-empty", 10).await.unwrap();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].status, ExecutionStatus::Completed);
        assert_eq!(events.update_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let dispatcher = Arc::new(ScriptedDispatcher::new(vec![
            Err(FlowClawError::Http("connection reset".into())),
            Ok(AdapterResult::failure("503 Service Unavailable")),
        ]));
        let (engine, _store, events) = engine(dispatcher.clone());

        let started = tokio::time::Instant::now();
        let result = engine.run(&workflow(&["toolA"])).await;
        assert!(result.success);
        assert_eq!(dispatcher.calls().len(), 3);
        // 500ms + 1000ms of backoff.
        let elapsed = started.elapsed();
        assert!(elapsed >= std::time::Duration::from_millis(1500));
        assert!(elapsed < std::time::Duration::from_millis(1600));
        assert_eq!(events.progress_count(), 1);
        assert_eq!(events.error_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_failure_short_circuits() {
        let dispatcher = Arc::new(ScriptedDispatcher::new(vec![Ok(AdapterResult::invalid(
            "toolA: Missing required field(s): text",
        ))]));
        let (engine, store, events) = engine(dispatcher.clone());

        let result = engine.run(&workflow(&["toolA", "toolB"])).await;
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("toolA: Missing required field(s): text")
        );
        assert_eq!(dispatcher.calls(), vec!["toolA"]);
        assert_eq!(events.error_count(), 1);

        let execution = store
            .get_execution(result.execution_id.as_deref().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert_eq!(execution.error, result.error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_fast_skips_remaining_steps() {
        let failures = (0..4)
            .map(|_| Ok(AdapterResult::failure("timeout")))
            .collect::<Vec<_>>();
        let mut script = vec![Ok(AdapterResult::ok("first"))];
        script.extend(failures);
        let dispatcher = Arc::new(ScriptedDispatcher::new(script));
        let (engine, _store, events) = engine(dispatcher.clone());

        let result = engine.run(&workflow(&["toolA", "toolB", "toolC"])).await;
        assert!(!result.success);
        assert_eq!(result.steps_completed, 1);
        assert_eq!(
            dispatcher.calls(),
            vec!["toolA", "toolB", "toolB", "toolB", "toolB"]
        );
        assert_eq!(events.progress_count(), 1);
        assert_eq!(events.error_count(), 1);
    }

    #[tokio::test]
    async fn test_custom_retry_policy() {
        let dispatcher = Arc::new(ScriptedDispatcher::new(vec![Ok(AdapterResult::failure(
            "busy",
        ))]));
        let (engine, _store, _events) = engine(dispatcher.clone());
        let engine = engine.with_retry_policy(RetryPolicy::none());

        let result = engine.run(&workflow(&["toolA"])).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("busy"));
        assert_eq!(dispatcher.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_result_records_step_outputs() {
        let dispatcher = Arc::new(ScriptedDispatcher::new(vec![Ok(
            AdapterResult::ok_with_data("sent", serde_json::json!({"message_id": 7})),
        )]));
        let (engine, store, _events) = engine(dispatcher);

        let result = engine.run(&workflow(&["toolA"])).await;
        let execution = store
            .get_execution(result.execution_id.as_deref().unwrap())
            .await
            .unwrap()
            .unwrap();
        let steps = &execution.result.unwrap()["steps"];
        assert_eq!(steps[0]["message"], "sent");
        assert_eq!(steps[0]["data"]["message_id"], 7);
        assert_eq!(execution.trigger["source"], "manual");
        assert!(execution.started_at.is_some());
        assert!(execution.completed_at.is_some());
    }
}
