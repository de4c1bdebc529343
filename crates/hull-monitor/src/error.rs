//! Error types for the area monitor.

use thiserror::Error;

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors that can occur while running the monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The background thread could not be started.
    #[error("failed to spawn area monitor thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The background thread panicked.
    #[error("area monitor thread panicked")]
    Panicked,
}
