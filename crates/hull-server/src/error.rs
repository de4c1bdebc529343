//! Error types for the network front end.

use thiserror::Error;

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors that stop the server from starting or shutting down cleanly.
///
/// Per-connection failures (a refused accept, a reset peer) are logged and
/// never surface here.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested `host:port`.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The reactor could not be created or a descriptor not registered.
    #[error("reactor error: {0}")]
    Reactor(#[source] std::io::Error),

    /// The reactor thread panicked.
    #[error("reactor thread panicked")]
    ReactorPanicked,

    /// Other socket-level failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Area monitor passthrough.
    #[error("monitor error: {0}")]
    Monitor(#[from] hull_monitor::MonitorError),
}
