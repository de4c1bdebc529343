//! # Area Monitor
//!
//! Background observer of the shared graph's hull area. Every successful
//! `CH` query raises a wakeup; the monitor recomputes the area on its own
//! snapshot and reports when it crosses a fixed threshold.
//!
//! ## Components
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`AreaSignal`] | Single-slot, coalescing wakeup raised after each `CH` |
//! | [`ThresholdTracker`] | One bit of state: at or above the threshold |
//! | [`AreaMonitor`] | Thread that waits, recomputes, and emits [`Transition`]s |
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::mpsc;
//! use hull_core::GraphStore;
//! use hull_monitor::{AreaMonitor, AreaMonitorConfig, AreaSignal, Transition};
//!
//! let store = Arc::new(GraphStore::new());
//! let signal = Arc::new(AreaSignal::new());
//! let (tx, rx) = mpsc::channel();
//!
//! let handle = AreaMonitor::new(AreaMonitorConfig::new(), store, signal.clone())
//!     .spawn(Box::new(move |t: Transition| { let _ = tx.send(t); }))?;
//!
//! signal.notify();      // empty graph, area 0: nothing to report
//! handle.shutdown()?;
//! assert!(rx.try_recv().is_err());
//! # Ok::<(), hull_monitor::MonitorError>(())
//! ```
//!
//! ## Consistency Notes
//!
//! - The monitor never reuses the triggering query's result; under
//!   concurrent mutation the two areas may differ
//! - Bursts of wakeups may coalesce into one recomputation
//! - Only transitions are reported, never steady state

mod error;
mod monitor;
mod signal;
mod threshold;

pub use error::{MonitorError, Result};
pub use monitor::{AreaMonitor, AreaMonitorConfig, MonitorHandle, TransitionSink};
pub use signal::AreaSignal;
pub use threshold::{ThresholdTracker, Transition};
