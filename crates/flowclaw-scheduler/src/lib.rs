//! # FlowClaw Scheduler
//!
//! Workflow execution engine, recurring scheduler, execution stores and the
//! event broadcaster.
//!
//! ## Design Principles
//! - Steps run strictly in order; a step that exhausts its retries aborts the run
//! - Bounded retries with exponential backoff (3 retries = 4 attempts by default)
//! - Validation failures and unknown tools are never retried
//! - Tokio timers only: one timer per workflow id, zero overhead when idle
//! - SQLite persistence, monotonic status transitions
//!
//! ## Architecture
//! ```text
//! Scheduler (tokio interval, one per workflow id)
//!   └── tick → ExecutionEngine::trigger
//!                ├── ExecutionStore: PENDING → RUNNING → COMPLETED | FAILED
//!                ├── Dispatcher → Adapter (telegram, discord, jira, webhook)
//!                │     └── retry with backoff: 500ms, 1s, 2s
//!                └── EventBroadcaster
//!                      ├── subscribers (tokio broadcast)
//!                      └── error alerts → Telegram / Discord / Webhook
//! ```

pub mod dispatch;
pub mod engine;
pub mod notify;
pub mod persistence;
pub mod retry;
pub mod scheduler;
pub mod store;

pub use dispatch::AlertTarget;
pub use engine::{ExecutionEngine, StepOutcome};
pub use notify::{EngineEvent, EventBroadcaster};
pub use persistence::{SqliteExecutionStore, open_store};
pub use retry::RetryPolicy;
pub use scheduler::Scheduler;
pub use store::MemoryExecutionStore;
