//! # Hull Core
//!
//! Shared state and protocol logic for the convex hull server. This crate
//! knows nothing about sockets: it turns text lines from an identified
//! connection into responses, mutating one shared point graph.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                      HULL CORE                        │
//! ├───────────────────────────────────────────────────────┤
//! │                                                       │
//! │   LineBuffer ──► ProtocolEngine ──► GraphStore        │
//! │   (per conn)       │                (one mutex)       │
//! │                    ▼                   │              │
//! │               HullObserver        hull_geometry       │
//! │              (after each CH)                          │
//! │                                                       │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! ## Protocol States
//!
//! | State | Line from owner | Line from anyone else |
//! |-------|-----------------|-----------------------|
//! | Idle | command | command |
//! | Building graph | `x,y` point | `BUSY` |
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use hull_core::{ConnectionId, GraphStore, NoopObserver, ProtocolEngine};
//!
//! let engine = ProtocolEngine::new(Arc::new(GraphStore::new()), Arc::new(NoopObserver));
//! let (a, b) = (ConnectionId::new(1), ConnectionId::new(2));
//!
//! let reply = |who, line| engine.process_line(who, line).map(|r| r.to_string());
//! assert_eq!(reply(a, "Newgraph 2").as_deref(), Some("OK"));
//! assert_eq!(reply(b, "CH").as_deref(), Some("BUSY"));
//! assert_eq!(reply(a, "0,0").as_deref(), Some("OK"));
//! assert_eq!(reply(a, "3,3").as_deref(), Some("GRAPH_LOADED"));
//! assert_eq!(reply(b, "CH").as_deref(), Some("0"));
//! ```
//!
//! ## Concurrency Notes
//!
//! - The store's lock is held only inside store methods, never across I/O
//! - Hulls are computed on a snapshot, outside the lock
//! - A disconnecting owner must call [`ProtocolEngine::disconnect`] so the
//!   graph build does not block everyone forever

mod buffer;
mod config;
mod engine;
mod error;
mod protocol;
mod store;

pub use buffer::LineBuffer;
pub use config::{DataPath, HullConfig, MonitorConfig, ServerConfig};
pub use engine::{HullObserver, NoopObserver, ProtocolEngine};
pub use error::{ConfigError, GraphError, ProtocolError};
pub use protocol::{parse_graph_point, parse_point, Command, Response};
pub use store::{ConnectionId, GraphProgress, GraphStore};

/// Core result type for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;
