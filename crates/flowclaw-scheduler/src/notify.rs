//! Event broadcaster — fans engine events out to subscribers.
//! No queues, no Redis: a tokio broadcast channel plus an in-memory ring buffer.

use std::collections::VecDeque;
use std::sync::Mutex;

use flowclaw_core::config::NotifyConfig;
use flowclaw_core::traits::Broadcaster;
use flowclaw_core::types::{ErrorInfo, ExecutionUpdate, StepProgress};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::dispatch::{AlertTarget, dispatch_all, targets_from_config};

/// Anything the engine reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    Update(ExecutionUpdate),
    Progress(StepProgress),
    Error(ErrorInfo),
}

impl EngineEvent {
    pub fn workflow_id(&self) -> &str {
        match self {
            EngineEvent::Update(u) => &u.workflow_id,
            EngineEvent::Progress(p) => &p.workflow_id,
            EngineEvent::Error(e) => &e.workflow_id,
        }
    }
}

/// Broadcaster backed by a tokio broadcast channel.
pub struct EventBroadcaster {
    sender: broadcast::Sender<EngineEvent>,
    /// Recent events (ring buffer).
    history: Mutex<VecDeque<EngineEvent>>,
    history_size: usize,
    /// Where error alerts are forwarded.
    alert_targets: Vec<(String, AlertTarget)>,
}

impl EventBroadcaster {
    pub fn new(channel_capacity: usize, history_size: usize) -> Self {
        let (sender, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            sender,
            history: Mutex::new(VecDeque::with_capacity(history_size)),
            history_size,
            alert_targets: Vec::new(),
        }
    }

    pub fn from_config(config: &NotifyConfig) -> Self {
        Self::new(config.channel_capacity, config.history_size)
            .with_alert_targets(targets_from_config(config))
    }

    pub fn with_alert_targets(mut self, targets: Vec<(String, AlertTarget)>) -> Self {
        for (name, _) in &targets {
            tracing::info!("📣 Error alerts → {}", name);
        }
        self.alert_targets = targets;
        self
    }

    /// Live event stream (dashboards, websockets, the CLI).
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Snapshot of recent events, oldest first.
    pub fn history(&self) -> Vec<EngineEvent> {
        self.lock_history().iter().cloned().collect()
    }

    pub fn update_count(&self) -> usize {
        self.count(|e| matches!(e, EngineEvent::Update(_)))
    }

    pub fn progress_count(&self) -> usize {
        self.count(|e| matches!(e, EngineEvent::Progress(_)))
    }

    pub fn error_count(&self) -> usize {
        self.count(|e| matches!(e, EngineEvent::Error(_)))
    }

    pub fn clear_history(&self) {
        self.lock_history().clear();
    }

    fn count(&self, pred: impl Fn(&EngineEvent) -> bool) -> usize {
        self.lock_history().iter().filter(|e| pred(e)).count()
    }

    fn lock_history(&self) -> std::sync::MutexGuard<'_, VecDeque<EngineEvent>> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, event: EngineEvent) {
        if self.history_size > 0 {
            let mut history = self.lock_history();
            if history.len() >= self.history_size {
                history.pop_front();
            }
            history.push_back(event.clone());
        }
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }

    /// Fire-and-forget delivery to alert targets.
    fn forward_alert(&self, error: &ErrorInfo) {
        if self.alert_targets.is_empty() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No runtime — skipping error alert delivery");
            return;
        };
        let targets = self.alert_targets.clone();
        let error = error.clone();
        handle.spawn(async move {
            for (name, result) in dispatch_all(&error, &targets).await {
                if let Err(e) = result {
                    tracing::warn!("⚠️ Alert to {} failed: {}", name, e);
                }
            }
        });
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::from_config(&NotifyConfig::default())
    }
}

impl Broadcaster for EventBroadcaster {
    fn notify_update(&self, update: ExecutionUpdate) {
        tracing::debug!("📡 Execution {} → {}", update.execution_id, update.status);
        self.publish(EngineEvent::Update(update));
    }

    fn notify_progress(&self, progress: StepProgress) {
        tracing::debug!(
            "📡 Execution {} step {}/{} done",
            progress.execution_id,
            progress.step_index + 1,
            progress.total_steps
        );
        self.publish(EngineEvent::Progress(progress));
    }

    fn notify_error(&self, error: ErrorInfo) {
        self.forward_alert(&error);
        self.publish(EngineEvent::Error(error));
    }
}
