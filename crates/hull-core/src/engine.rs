//! Protocol engine: one line in, at most one response out.
//!
//! The engine holds no per-connection state. Whether the server is idle or
//! building a graph lives in the [`GraphStore`]; which connection sent a line
//! is passed in by the caller.

use std::sync::Arc;

use tracing::debug;

use crate::error::{GraphError, ProtocolError};
use crate::protocol::{parse_graph_point, Command, Response};
use crate::store::{ConnectionId, GraphProgress, GraphStore};

/// Receives a wakeup after every successful `CH`.
///
/// Implementations must not block; the call happens on the connection's
/// own thread right before its response is sent.
pub trait HullObserver: Send + Sync {
    fn hull_computed(&self);
}

/// Observer that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl HullObserver for NoopObserver {
    fn hull_computed(&self) {}
}

/// Dispatches protocol lines against a shared [`GraphStore`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use hull_core::{ConnectionId, GraphStore, NoopObserver, ProtocolEngine, Response};
///
/// let engine = ProtocolEngine::new(Arc::new(GraphStore::new()), Arc::new(NoopObserver));
/// let me = ConnectionId::new(1);
///
/// assert_eq!(engine.process_line(me, "Newpoint 0,0\r"), Some(Response::Ok));
/// assert_eq!(engine.process_line(me, "   "), None);
/// assert_eq!(engine.process_line(me, "CH"), Some(Response::Area(0.0)));
/// ```
#[derive(Clone)]
pub struct ProtocolEngine {
    store: Arc<GraphStore>,
    observer: Arc<dyn HullObserver>,
}

impl ProtocolEngine {
    pub fn new(store: Arc<GraphStore>, observer: Arc<dyn HullObserver>) -> Self {
        Self { store, observer }
    }

    /// The store this engine dispatches to.
    #[must_use]
    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    /// Handles one raw line from `caller`.
    ///
    /// Surrounding whitespace (including `\r`) is stripped first; blank lines
    /// produce no response.
    pub fn process_line(&self, caller: ConnectionId, raw: &str) -> Option<Response> {
        let line = raw.trim();
        if line.is_empty() {
            return None;
        }

        let response = match self.store.session_owner() {
            Some(owner) if owner != caller => Response::Busy,
            Some(_) => self
                .feed_graph_line(caller, line)
                .unwrap_or_else(|| self.dispatch(caller, line)),
            None => self.dispatch(caller, line),
        };

        debug!("{} {:?} -> {}", caller, line, response);
        Some(response)
    }

    /// Connection teardown: drops the caller's graph build, if any.
    pub fn disconnect(&self, caller: ConnectionId) {
        if self.store.abort_session_if_owner(caller) {
            debug!("{} disconnected mid-build, session aborted", caller);
        }
    }

    /// Treats `line` as a graph point. `None` means the session vanished
    /// between the ownership check and the feed, so the line is a command.
    fn feed_graph_line(&self, caller: ConnectionId, line: &str) -> Option<Response> {
        let point = match parse_graph_point(line) {
            Ok(point) => point,
            Err(err) => return Some(Response::Error(err)),
        };
        match self.store.feed_graph_point(caller, point) {
            Ok(GraphProgress::Pending { .. }) => Some(Response::Ok),
            Ok(GraphProgress::Loaded { .. }) => Some(Response::GraphLoaded),
            Err(GraphError::NoSession) => None,
            Err(err) => Some(graph_response(err)),
        }
    }

    fn dispatch(&self, caller: ConnectionId, line: &str) -> Response {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(err) => return Response::Error(err),
        };

        let outcome = match command {
            Command::Newgraph(count) => self.store.begin_graph(caller, count).map(|_| Response::Ok),
            Command::Newpoint(point) => self.store.add_point(caller, point).map(|()| Response::Ok),
            Command::Removepoint(point) => {
                self.store.remove_point(caller, point).map(|_| Response::Ok)
            }
            Command::ConvexHull => self.store.hull_area(caller).map(|area| {
                self.observer.hull_computed();
                Response::Area(area)
            }),
        };
        outcome.unwrap_or_else(graph_response)
    }
}

fn graph_response(err: GraphError) -> Response {
    match err {
        GraphError::InvalidCount(_) => Response::Error(ProtocolError::InvalidNumber),
        GraphError::Busy { .. } => Response::Busy,
        // Only reachable through a feed, which callers handle themselves.
        GraphError::NoSession => Response::Error(ProtocolError::UnknownCommand),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hull_geometry::Point;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingObserver(AtomicUsize);

    impl HullObserver for CountingObserver {
        fn hull_computed(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    const A: ConnectionId = ConnectionId::new(1);
    const B: ConnectionId = ConnectionId::new(2);

    fn engine() -> (ProtocolEngine, Arc<CountingObserver>) {
        let observer = Arc::new(CountingObserver::default());
        let engine = ProtocolEngine::new(Arc::new(GraphStore::new()), observer.clone());
        (engine, observer)
    }

    fn send(engine: &ProtocolEngine, who: ConnectionId, line: &str) -> String {
        engine
            .process_line(who, line)
            .map(|r| r.to_string())
            .unwrap_or_default()
    }

    #[test]
    fn test_blank_lines_are_silent() {
        let (engine, _) = engine();
        assert_eq!(engine.process_line(A, ""), None);
        assert_eq!(engine.process_line(A, " \t\r"), None);
    }

    #[test]
    fn test_graph_build_flow() {
        let (engine, _) = engine();
        assert_eq!(send(&engine, A, "Newgraph 3"), "OK");
        assert_eq!(send(&engine, A, "0,0"), "OK");
        assert_eq!(send(&engine, A, "oops"), "ERROR: Invalid point format.");
        assert_eq!(send(&engine, A, "1,zz"), "ERROR: Invalid point values.");
        assert_eq!(send(&engine, A, "4,0"), "OK");
        assert_eq!(engine.store().session_remaining(), Some(1));
        assert_eq!(send(&engine, A, "0,3\r"), "GRAPH_LOADED");
        assert_eq!(send(&engine, A, "CH"), "6");
    }

    #[test]
    fn test_owner_keywords_are_point_lines_during_build() {
        let (engine, _) = engine();
        send(&engine, A, "Newgraph 1");
        assert_eq!(send(&engine, A, "CH"), "ERROR: Invalid point format.");
        assert_eq!(send(&engine, A, "Newpoint 1,1"), "ERROR: Invalid point values.");
    }

    #[test]
    fn test_non_owner_gets_busy() {
        let (engine, _) = engine();
        send(&engine, A, "Newgraph 2");
        for line in ["Newpoint 5,5", "Removepoint 5,5", "CH", "Newgraph 1", "1,1", "junk"] {
            assert_eq!(send(&engine, B, line), "BUSY", "{}", line);
        }
        send(&engine, A, "1,1");
        send(&engine, A, "2,2");
        assert_eq!(send(&engine, B, "Newpoint 5,5"), "OK");
    }

    #[test]
    fn test_error_responses() {
        let (engine, _) = engine();
        assert_eq!(send(&engine, A, "Newgraph -1"), "ERROR: Invalid number.");
        assert_eq!(send(&engine, A, "Newgraph 0"), "ERROR: Invalid number.");
        assert_eq!(send(&engine, A, "Newgraph x"), "ERROR: Invalid number.");
        assert_eq!(send(&engine, A, "Newpoint 1"), "ERROR: Invalid format.");
        assert_eq!(send(&engine, A, "Newpoint 1,b"), "ERROR: Invalid values.");
        assert_eq!(send(&engine, A, "Removepoint q"), "ERROR: Invalid format.");
        assert_eq!(send(&engine, A, "Hull"), "ERROR: Unknown command.");
        assert_eq!(engine.store().session_owner(), None);
    }

    #[test]
    fn test_invalid_newgraph_keeps_previous_graph() {
        let (engine, _) = engine();
        for line in ["Newpoint 0,0", "Newpoint 2,0", "Newpoint 2,2", "Newpoint 0,2"] {
            send(&engine, A, line);
        }
        assert_eq!(send(&engine, A, "Newgraph -1"), "ERROR: Invalid number.");
        assert_eq!(send(&engine, A, "CH"), "4");
    }

    #[test]
    fn test_remove_then_ch() {
        let (engine, _) = engine();
        send(&engine, A, "Newpoint 3,3");
        send(&engine, A, "Newpoint 3,3");
        assert_eq!(send(&engine, A, "Removepoint 3,3"), "OK");
        assert_eq!(send(&engine, A, "Removepoint 3,3"), "OK");
        assert_eq!(send(&engine, A, "CH"), "0");
        assert!(engine.store().is_empty());
    }

    #[test]
    fn test_observer_notified_only_on_successful_ch() {
        let (engine, observer) = engine();
        send(&engine, A, "CH");
        send(&engine, A, "CH");
        send(&engine, A, "Newgraph 1");
        send(&engine, B, "CH"); // BUSY
        assert_eq!(observer.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_disconnect_aborts_owned_session() {
        let (engine, _) = engine();
        send(&engine, A, "Newpoint 1,1");
        send(&engine, A, "Newgraph 2");
        send(&engine, A, "9,9");

        engine.disconnect(B);
        assert_eq!(engine.store().session_owner(), Some(A));

        engine.disconnect(A);
        assert_eq!(engine.store().session_owner(), None);
        assert_eq!(engine.store().points(), vec![Point::new(1.0, 1.0)]);
        assert_eq!(send(&engine, B, "Newpoint 2,2"), "OK");
    }
}
