//! # FlowClaw Core
//!
//! Shared types, capability traits, error taxonomy and configuration used by
//! the adapter registry, the execution engine and the scheduler.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::FlowClawConfig;
pub use error::{FlowClawError, Result};
pub use traits::{Adapter, Broadcaster, Dispatcher, ExecutionStore, NoopBroadcaster};
pub use types::{
    AdapterResult, ErrorInfo, Execution, ExecutionResult, ExecutionStatus, ExecutionUpdate,
    Intent, StatusUpdate, StepProgress, Workflow, WorkflowStatus, WorkflowStep,
};
