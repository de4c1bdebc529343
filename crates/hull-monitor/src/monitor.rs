//! The monitor thread.
//!
//! ```text
//! CH query ──notify──► AreaSignal ──wait──► AreaMonitor
//!                                               │ compute_hull_area()
//!                                               ▼
//!                                        ThresholdTracker
//!                                               │ on flip
//!                                               ▼
//!                                        TransitionSink
//! ```

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use hull_core::{GraphStore, MonitorConfig};
use tracing::{debug, info};

use crate::error::{MonitorError, Result};
use crate::signal::AreaSignal;
use crate::threshold::{ThresholdTracker, Transition};

/// Receives every threshold transition, on the monitor thread.
pub type TransitionSink = Box<dyn FnMut(Transition) + Send + 'static>;

/// Configuration for [`AreaMonitor`].
///
/// ```rust
/// use hull_monitor::AreaMonitorConfig;
///
/// let config = AreaMonitorConfig::new().with_threshold(250.0);
/// assert_eq!(config.threshold, 250.0);
/// ```
#[derive(Debug, Clone)]
pub struct AreaMonitorConfig {
    /// Area at or above which the hull counts as "reached".
    pub threshold: f64,
    /// Name given to the monitor thread.
    pub thread_name: String,
}

impl AreaMonitorConfig {
    /// Defaults: threshold 100, thread name `area-monitor`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            threshold: 100.0,
            thread_name: "area-monitor".to_string(),
        }
    }

    /// Sets the area threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets the thread name.
    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

impl Default for AreaMonitorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&MonitorConfig> for AreaMonitorConfig {
    fn from(config: &MonitorConfig) -> Self {
        Self::new().with_threshold(config.area_threshold)
    }
}

/// Background task that re-evaluates the hull area after each `CH`.
pub struct AreaMonitor {
    config: AreaMonitorConfig,
    store: Arc<GraphStore>,
    signal: Arc<AreaSignal>,
}

impl AreaMonitor {
    pub fn new(config: AreaMonitorConfig, store: Arc<GraphStore>, signal: Arc<AreaSignal>) -> Self {
        Self {
            config,
            store,
            signal,
        }
    }

    /// Starts the monitor thread.
    ///
    /// # Errors
    ///
    /// [`MonitorError::Spawn`] if the OS refuses to create the thread.
    pub fn spawn(self, sink: TransitionSink) -> Result<MonitorHandle> {
        let signal = Arc::clone(&self.signal);
        let thread = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || self.run(sink))
            .map_err(MonitorError::Spawn)?;
        Ok(MonitorHandle {
            signal,
            thread: Some(thread),
        })
    }

    /// Runs on the calling thread until the signal is closed.
    pub fn run(self, mut sink: TransitionSink) {
        let mut tracker = ThresholdTracker::new(self.config.threshold);
        debug!("area monitor started, threshold {}", self.config.threshold);

        while self.signal.wait() {
            let area = self.store.compute_hull_area();
            debug!("area monitor recomputed hull area {}", area);
            if let Some(transition) = tracker.observe(area) {
                info!("{} (area {})", transition, area);
                sink(transition);
            }
        }

        debug!("area monitor stopped");
    }
}

/// Owner of a running monitor thread.
#[derive(Debug)]
pub struct MonitorHandle {
    signal: Arc<AreaSignal>,
    thread: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// The signal the monitor waits on.
    #[must_use]
    pub fn signal(&self) -> &Arc<AreaSignal> {
        &self.signal
    }

    /// Closes the signal and joins the thread.
    ///
    /// # Errors
    ///
    /// [`MonitorError::Panicked`] if the thread (or the sink) panicked.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        self.signal.close();
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| MonitorError::Panicked),
            None => Ok(()),
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
