//! Scheduler driving the engine against the SQLite store, on a paused clock.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flowclaw_adapters::AdapterRegistry;
use flowclaw_core::error::Result;
use flowclaw_core::traits::{Adapter, ExecutionStore};
use flowclaw_core::types::{AdapterResult, ExecutionStatus, Intent, Workflow, WorkflowStep};
use flowclaw_scheduler::{
    EngineEvent, EventBroadcaster, ExecutionEngine, RetryPolicy, Scheduler, SqliteExecutionStore,
};

struct Rejecting;

#[async_trait]
impl Adapter for Rejecting {
    fn name(&self) -> &str {
        "strict"
    }

    fn required_fields(&self) -> &[&str] {
        &["text"]
    }

    async fn execute(&self, intent: &Intent) -> Result<AdapterResult> {
        if let Some(invalid) = flowclaw_adapters::check_required(self, intent) {
            return Ok(invalid);
        }
        Ok(AdapterResult::ok("accepted"))
    }
}

fn setup() -> (Scheduler, Arc<SqliteExecutionStore>, Arc<EventBroadcaster>) {
    let mut registry = AdapterRegistry::new();
    registry.register(Rejecting);
    let store = Arc::new(SqliteExecutionStore::open_in_memory().unwrap());
    let events = Arc::new(EventBroadcaster::new(64, 200));
    let engine = ExecutionEngine::new(Arc::new(registry), store.clone(), events.clone())
        .with_retry_policy(RetryPolicy::none());
    (Scheduler::new(Arc::new(engine)), store, events)
}

fn workflow(id: &str, text: Option<&str>) -> Workflow {
    let config = match text {
        Some(text) => serde_json::json!({"op": "send", "text": text}),
        None => serde_json::json!({"op": "send"}),
    };
    Workflow::new(id, id).with_step(WorkflowStep::new("strict", config))
}

#[tokio::test(start_paused = true)]
async fn test_failing_runs_do_not_stop_the_timer() {
    let (scheduler, store, events) = setup();
    scheduler
        .schedule("broken", workflow("broken", None), Duration::from_millis(1000))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(3500)).await;

    let runs = store.list_executions("broken", 10).await.unwrap();
    assert_eq!(runs.len(), 3);
    for run in &runs {
        assert_eq!(run.status, ExecutionStatus::Failed);
        assert_eq!(run.error.as_deref(), Some("strict: Missing required field(s): text"));
        assert_eq!(run.trigger["source"], "schedule");
    }
    assert_eq!(events.error_count(), 3);
    assert!(scheduler.is_scheduled("broken"));
}

#[tokio::test(start_paused = true)]
async fn test_independent_ids_fire_on_their_own_cadence() {
    let (scheduler, store, _events) = setup();
    scheduler
        .schedule("fast", workflow("fast", Some("hi")), Duration::from_millis(500))
        .unwrap();
    scheduler
        .schedule("slow", workflow("slow", Some("hi")), Duration::from_millis(2000))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(4250)).await;

    assert_eq!(store.list_executions("fast", 100).await.unwrap().len(), 8);
    assert_eq!(store.list_executions("slow", 100).await.unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_pause_then_resume_same_cadence() {
    let (scheduler, store, events) = setup();
    let mut rx = events.subscribe();
    let wf = workflow("wf-1", Some("hello"));

    scheduler.schedule("wf-1", wf.clone(), Duration::from_millis(1000)).unwrap();
    assert!(scheduler.pause("wf-1"));
    tokio::time::sleep(Duration::from_millis(10_000)).await;
    assert!(store.list_executions("wf-1", 10).await.unwrap().is_empty());

    scheduler.resume("wf-1", wf, Duration::from_millis(1000)).unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(store.list_executions("wf-1", 10).await.unwrap().len(), 1);
    tokio::time::sleep(Duration::from_millis(1000)).await;

    let runs = store.list_executions("wf-1", 10).await.unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|r| r.status == ExecutionStatus::Completed));

    // RUNNING, progress, COMPLETED for the first run.
    assert!(matches!(rx.recv().await.unwrap(), EngineEvent::Update(u) if u.status == ExecutionStatus::Running));
    assert!(matches!(rx.recv().await.unwrap(), EngineEvent::Progress(_)));
    assert!(matches!(rx.recv().await.unwrap(), EngineEvent::Update(u) if u.status == ExecutionStatus::Completed));
}
