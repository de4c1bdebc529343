//! # Hull Server
//!
//! TCP front end for the shared hull graph. A single reactor thread waits
//! for readiness on the listening socket and dispatches accepts; each
//! connection then runs either on its own proactor thread (blocking reads)
//! or, in reactor mode, directly on the reactor thread.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         HULL SERVER                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  listener ──► Reactor (mio poll) ──► accept                  │
//! │                      │                  │                    │
//! │                      │        ┌─────────┴─────────┐          │
//! │                      │        ▼                   ▼          │
//! │                      │   Proactor thread    ReactiveSessions │
//! │                      │   (blocking read)    (on readiness) ◄─┘
//! │                      │        └─────────┬─────────┘          │
//! │                      │                  ▼                    │
//! │                      │           ProtocolEngine              │
//! │                      │                  │  CH                │
//! │                      │                  ▼                    │
//! │                      │     GraphStore ◄── AreaMonitor        │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failure Handling
//!
//! - Bind, poll and thread creation failures at startup are fatal
//! - A failed accept is logged; the reactor keeps running
//! - A failed receive or send ends only that connection; a full send
//!   buffer in reactor mode only pauses reading from that client
//! - An unterminated line longer than `max_line_length` ends the connection
//! - Every connection end, clean or not, aborts the graph build it owned

mod error;
mod proactor;
mod reactor;
mod server;
mod session;

pub use error::{Result, ServerError};
pub use proactor::Proactor;
pub use reactor::{Reactor, ReactorFn, ReactorHandle};
pub use server::{RunningServer, Server};
pub use session::{run_blocking, Connection, ReactiveSessions, SessionLimits};
