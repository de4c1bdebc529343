//! Coalescing wakeup between `CH` queries and the monitor thread.

use hull_core::HullObserver;
use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct SignalState {
    pending: bool,
    closed: bool,
}

/// A one-slot "a hull was just computed" flag.
///
/// Any number of [`notify`](Self::notify) calls before the waiter runs
/// collapse into a single wakeup. [`close`](Self::close) releases the waiter
/// for good.
#[derive(Debug, Default)]
pub struct AreaSignal {
    state: Mutex<SignalState>,
    cond: Condvar,
}

impl AreaSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag and wakes the waiter. Never blocks on the waiter.
    pub fn notify(&self) {
        let mut state = self.state.lock();
        state.pending = true;
        self.cond.notify_one();
    }

    /// Permanently releases every waiter.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.cond.notify_all();
    }

    /// Blocks until notified, then clears the flag.
    ///
    /// Returns `false` once the signal is closed.
    pub fn wait(&self) -> bool {
        let mut state = self.state.lock();
        while !state.pending && !state.closed {
            self.cond.wait(&mut state);
        }
        if state.closed {
            return false;
        }
        state.pending = false;
        true
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl HullObserver for AreaSignal {
    fn hull_computed(&self) {
        self.notify();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_notifications_coalesce() {
        let signal = AreaSignal::new();
        signal.notify();
        signal.notify();
        signal.notify();
        assert!(signal.wait());
        // Flag consumed: a closed signal is now the only way out.
        signal.close();
        assert!(!signal.wait());
    }

    #[test]
    fn test_close_releases_blocked_waiter() {
        let signal = Arc::new(AreaSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || signal.wait())
        };
        thread::sleep(Duration::from_millis(20));
        signal.close();
        assert!(!waiter.join().unwrap());
        assert!(signal.is_closed());
    }

    #[test]
    fn test_wakes_blocked_waiter() {
        let signal = Arc::new(AreaSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || signal.wait())
        };
        thread::sleep(Duration::from_millis(20));
        signal.hull_computed();
        assert!(waiter.join().unwrap());
    }
}
