//! Capability traits — the seams between the engine and its collaborators.

pub mod adapter;
pub mod broadcaster;
pub mod store;

pub use adapter::{Adapter, Dispatcher};
pub use broadcaster::{Broadcaster, NoopBroadcaster};
pub use store::ExecutionStore;
