//! FlowClaw error types.

use thiserror::Error;

/// Errors raised across the FlowClaw crates.
#[derive(Debug, Error)]
pub enum FlowClawError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Adapter error: {0}")]
    Adapter(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Invalid status transition for execution {id}: {from} -> {to}")]
    InvalidTransition { id: String, from: String, to: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl FlowClawError {
    /// Whether the error came from the execution store.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            FlowClawError::Persistence(_) | FlowClawError::InvalidTransition { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FlowClawError>;
