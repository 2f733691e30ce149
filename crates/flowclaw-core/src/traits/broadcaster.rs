//! Fire-and-forget notification sink.

use crate::types::{ErrorInfo, ExecutionUpdate, StepProgress};

/// Progress/error fan-out. Delivery failures are swallowed by implementors.
pub trait Broadcaster: Send + Sync {
    fn notify_update(&self, update: ExecutionUpdate);
    fn notify_progress(&self, progress: StepProgress);
    fn notify_error(&self, error: ErrorInfo);
}

/// Drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBroadcaster;

impl Broadcaster for NoopBroadcaster {
    fn notify_update(&self, _update: ExecutionUpdate) {}
    fn notify_progress(&self, _progress: StepProgress) {}
    fn notify_error(&self, _error: ErrorInfo) {}
}
