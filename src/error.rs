//! Error types for the proscope progress notification framework.

use thiserror::Error;

/// Errors surfaced to callers of the scope and signaler APIs.
#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("No active progress scope: signalers must be created inside an entered scope")]
    NoActiveScope,

    #[error("A progress scope is already active on this thread (scope {0})")]
    ScopeAlreadyActive(u64),

    #[error("Invalid signaler weight: {0}")]
    InvalidWeight(f64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Progress I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for ProgressError {
    fn from(err: config::ConfigError) -> Self {
        ProgressError::Config(err.to_string())
    }
}

/// Errors raised by a handler while rendering or finalizing.
///
/// These never reach the computation being observed: the dispatcher logs
/// them and carries on.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Handler I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize progress payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Notification request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Notification endpoint rejected update with status {status}")]
    Rejected { status: u16 },

    #[error("Handler closed: {0}")]
    Closed(String),

    #[error("Handler panicked: {0}")]
    Panicked(String),
}
