//! Error types for the hull server core.

use std::path::PathBuf;

use thiserror::Error;

use crate::store::ConnectionId;

/// Malformed client input.
///
/// The `Display` text is exactly what follows `ERROR: ` on the wire, so
/// these messages are part of the protocol and must not be reworded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// `Newgraph` argument missing, non-numeric or not positive.
    #[error("Invalid number.")]
    InvalidNumber,

    /// `Newpoint`/`Removepoint` argument has no comma.
    #[error("Invalid format.")]
    InvalidFormat,

    /// `Newpoint`/`Removepoint` coordinate is not a finite decimal.
    #[error("Invalid values.")]
    InvalidValues,

    /// Graph-build point line has no comma.
    #[error("Invalid point format.")]
    InvalidPointFormat,

    /// Graph-build point line coordinate is not a finite decimal.
    #[error("Invalid point values.")]
    InvalidPointValues,

    /// First token is not a known command keyword.
    #[error("Unknown command.")]
    UnknownCommand,
}

/// Errors raised by the [`GraphStore`](crate::GraphStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A graph build was requested with a non-positive point count.
    #[error("invalid point count: {0}")]
    InvalidCount(i64),

    /// Another connection owns the active graph-build session.
    #[error("graph build in progress, owned by {owner}")]
    Busy {
        /// Connection holding the session.
        owner: ConnectionId,
    },

    /// A graph point arrived while no session is active.
    #[error("no graph build in progress")]
    NoSession,
}

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Read {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`HullConfig`](crate::HullConfig).
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}
