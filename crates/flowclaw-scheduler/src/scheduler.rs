//! Recurrence scheduler — one tokio timer per workflow id.
//!
//! States per id: unscheduled (no entry), scheduled (timer running),
//! paused (entry removed; the caller keeps the workflow and interval).
//! `schedule` always clears an existing entry before installing a new one,
//! so two timers for the same id never coexist.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flowclaw_core::config::SchedulerConfig;
use flowclaw_core::error::{FlowClawError, Result};
use flowclaw_core::types::Workflow;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::engine::ExecutionEngine;

type InFlight = Arc<Mutex<HashSet<String>>>;

/// Marks a workflow id as running until dropped.
struct RunGuard {
    in_flight: InFlight,
    id: String,
}

impl RunGuard {
    /// `None` if a run for `id` is already in flight.
    fn acquire(in_flight: &InFlight, id: &str) -> Option<Self> {
        let mut running = in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !running.insert(id.to_string()) {
            return None;
        }
        Some(Self {
            in_flight: in_flight.clone(),
            id: id.to_string(),
        })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.id);
    }
}

/// Process-wide registry of recurring workflow timers.
pub struct Scheduler {
    engine: Arc<ExecutionEngine>,
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
    in_flight: InFlight,
    allow_overlap: bool,
}

impl Scheduler {
    /// Empty scheduler. Overlapping runs of the same id are skipped.
    pub fn new(engine: Arc<ExecutionEngine>) -> Self {
        Self {
            engine,
            timers: Mutex::new(HashMap::new()),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            allow_overlap: false,
        }
    }

    pub fn from_config(engine: Arc<ExecutionEngine>, config: &SchedulerConfig) -> Self {
        Self::new(engine).with_overlap(config.allow_overlap)
    }

    pub fn with_overlap(mut self, allow_overlap: bool) -> Self {
        self.allow_overlap = allow_overlap;
        self
    }

    pub fn engine(&self) -> &Arc<ExecutionEngine> {
        &self.engine
    }

    /// Run `workflow` every `interval`, first fire one interval from now.
    /// Replaces any timer already registered under `id`.
    pub fn schedule(&self, id: &str, workflow: Workflow, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(FlowClawError::Config(format!(
                "schedule interval for '{id}' must be greater than zero"
            )));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| FlowClawError::Other(format!("scheduler needs a tokio runtime: {e}")))?;

        let mut timers = self.lock_timers();
        if let Some(previous) = timers.remove(id) {
            previous.abort();
            tracing::debug!("⏰ Replacing existing timer for '{}'", id);
        }

        let handle = runtime.spawn(tick_loop(
            id.to_string(),
            Arc::new(workflow),
            interval,
            self.engine.clone(),
            (!self.allow_overlap).then(|| self.in_flight.clone()),
        ));
        timers.insert(id.to_string(), handle);
        tracing::info!("⏰ Scheduled '{}' every {:?}", id, interval);
        Ok(())
    }

    /// Stop future fires for `id`. A run already in flight finishes.
    /// Returns whether a timer was registered.
    pub fn pause(&self, id: &str) -> bool {
        match self.lock_timers().remove(id) {
            Some(handle) => {
                handle.abort();
                tracing::info!("⏸️ Paused '{}'", id);
                true
            }
            None => false,
        }
    }

    /// Same as `schedule`: the caller supplies the workflow and interval again.
    pub fn resume(&self, id: &str, workflow: Workflow, interval: Duration) -> Result<()> {
        tracing::info!("▶️ Resuming '{}'", id);
        self.schedule(id, workflow, interval)
    }

    pub fn is_scheduled(&self, id: &str) -> bool {
        self.lock_timers().contains_key(id)
    }

    /// Ids with an active timer, sorted.
    pub fn scheduled_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock_timers().keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Whether a scheduled run of `id` is executing right now.
    pub fn is_running(&self, id: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(id)
    }

    /// Abort every timer.
    pub fn shutdown(&self) {
        let mut timers = self.lock_timers();
        for (_, handle) in timers.drain() {
            handle.abort();
        }
        tracing::info!("⏹️ Scheduler stopped");
    }

    fn lock_timers(&self) -> std::sync::MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        self.timers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for (_, handle) in self.lock_timers().drain() {
            handle.abort();
        }
    }
}

async fn tick_loop(
    id: String,
    workflow: Arc<Workflow>,
    interval: Duration,
    engine: Arc<ExecutionEngine>,
    single_flight: Option<InFlight>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let guard = match &single_flight {
            Some(in_flight) => match RunGuard::acquire(in_flight, &id) {
                Some(guard) => Some(guard),
                None => {
                    tracing::warn!("⏭️ '{}' still running — skipping tick", id);
                    continue;
                }
            },
            None => None,
        };

        // Own task per run: aborting the timer never cancels a run.
        let engine = engine.clone();
        let workflow = workflow.clone();
        let trigger = serde_json::json!({ "source": "schedule", "schedule_id": id });
        tokio::spawn(async move {
            let _guard = guard;
            let result = engine.trigger(&workflow, trigger).await;
            if !result.success {
                tracing::warn!(
                    "⚠️ Scheduled run of '{}' failed: {}",
                    workflow.name,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryExecutionStore;
    use async_trait::async_trait;
    use flowclaw_core::traits::{Dispatcher, NoopBroadcaster};
    use flowclaw_core::types::{AdapterResult, Intent, WorkflowStep};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts dispatches; each takes `latency`.
    struct CountingDispatcher {
        calls: AtomicUsize,
        latency: Duration,
    }

    #[async_trait]
    impl Dispatcher for CountingDispatcher {
        async fn dispatch(&self, _intent: &Intent) -> Result<AdapterResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            Ok(AdapterResult::ok("done"))
        }
    }

    fn scheduler(latency: Duration) -> (Scheduler, Arc<CountingDispatcher>) {
        let dispatcher = Arc::new(CountingDispatcher {
            calls: AtomicUsize::new(0),
            latency,
        });
        let engine = ExecutionEngine::new(
            dispatcher.clone(),
            Arc::new(MemoryExecutionStore::new()),
            Arc::new(NoopBroadcaster),
        );
        (Scheduler::new(Arc::new(engine)), dispatcher)
    }

    fn workflow() -> Workflow {
        Workflow::new("wf-1", "ping").with_step(WorkflowStep::new("toolA", serde_json::json!({})))
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_every_interval() {
        let (sched, dispatcher) = scheduler(Duration::ZERO);
        sched.schedule("wf-1", workflow(), ms(1000)).unwrap();
        assert!(sched.is_scheduled("wf-1"));

        tokio::time::sleep(ms(500)).await;
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 0);
        tokio::time::sleep(ms(3000)).await;
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_stops_future_fires() {
        let (sched, dispatcher) = scheduler(Duration::ZERO);
        sched.schedule("wf-1", workflow(), ms(1000)).unwrap();
        assert!(sched.pause("wf-1"));
        assert!(!sched.is_scheduled("wf-1"));

        tokio::time::sleep(ms(10_000)).await;
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 0);
        assert!(!sched.pause("wf-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_restores_cadence() {
        let (sched, dispatcher) = scheduler(Duration::ZERO);
        sched.schedule("wf-1", workflow(), ms(1000)).unwrap();
        sched.pause("wf-1");
        tokio::time::sleep(ms(5000)).await;

        sched.resume("wf-1", workflow(), ms(1000)).unwrap();
        tokio::time::sleep(ms(2500)).await;
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_schedule_keeps_one_timer() {
        let (sched, dispatcher) = scheduler(Duration::ZERO);
        sched.schedule("wf-1", workflow(), ms(1000)).unwrap();
        sched.schedule("wf-1", workflow(), ms(1000)).unwrap();
        assert_eq!(sched.scheduled_ids(), vec!["wf-1".to_string()]);

        tokio::time::sleep(ms(3500)).await;
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_does_not_cancel_run_in_flight() {
        let (sched, dispatcher) = scheduler(ms(2000));
        sched.schedule("wf-1", workflow(), ms(1000)).unwrap();

        tokio::time::sleep(ms(1500)).await;
        assert!(sched.is_running("wf-1"));
        sched.pause("wf-1");

        tokio::time::sleep(ms(2000)).await;
        assert!(!sched.is_running("wf-1"));
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 1);
        let runs = sched.engine().store().list_executions("wf-1", 10).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].status.is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_flight_skips_overlapping_ticks() {
        let (sched, dispatcher) = scheduler(ms(2500));
        sched.schedule("wf-1", workflow(), ms(1000)).unwrap();

        // Runs start at 1s and 4s; ticks at 2s and 3s are skipped.
        tokio::time::sleep(ms(4500)).await;
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_allow_overlap() {
        let (sched, dispatcher) = scheduler(ms(2500));
        let sched = sched.with_overlap(true);
        sched.schedule("wf-1", workflow(), ms(1000)).unwrap();

        tokio::time::sleep(ms(4500)).await;
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let (sched, _) = scheduler(Duration::ZERO);
        let err = sched.schedule("wf-1", workflow(), Duration::ZERO).unwrap_err();
        assert!(matches!(err, FlowClawError::Config(_)));
        assert!(!sched.is_scheduled("wf-1"));
    }

    #[test]
    fn test_schedule_requires_runtime() {
        let (sched, _) = scheduler(Duration::ZERO);
        assert!(sched.schedule("wf-1", workflow(), ms(1000)).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_clears_all() {
        let (sched, dispatcher) = scheduler(Duration::ZERO);
        sched.schedule("a", workflow(), ms(1000)).unwrap();
        sched.schedule("b", workflow(), ms(1000)).unwrap();
        assert_eq!(sched.scheduled_ids(), vec!["a".to_string(), "b".to_string()]);

        sched.shutdown();
        assert!(sched.scheduled_ids().is_empty());
        tokio::time::sleep(ms(5000)).await;
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 0);
    }
}
