//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::ProgressError;

/// Map progress errors to a string for CLI output.
pub fn map_error(e: &ProgressError) -> String {
    match e {
        ProgressError::Config(message) => format!("Configuration error: {}", message),
        other => other.to_string(),
    }
}
