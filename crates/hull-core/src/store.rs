//! The shared point graph.
//!
//! [`GraphStore`] owns the live point set and the optional graph-build
//! session behind one mutex. Every public method takes the lock for its own
//! duration only, so operations are totally ordered and no caller ever sees
//! the point set and the session disagree.
//!
//! ## Session Rules
//!
//! - At most one build session exists server-wide.
//! - While a session is active, mutations and queries from any other
//!   connection fail with [`GraphError::Busy`]. The check runs under the
//!   same lock as the operation it guards.
//! - A completed session swaps its buffer into the point set in one step;
//!   an aborted session leaves the point set untouched.

use std::fmt;

use hull_geometry::{convex_hull, polygon_area, Point};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::GraphError;

/// Identity of one client connection, used to check session ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Result of feeding a graph-build operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphProgress {
    /// The session is (still) open and waits for `remaining` more points.
    Pending {
        /// Points still expected.
        remaining: usize,
    },

    /// The last point arrived; the buffer replaced the live point set.
    Loaded {
        /// Size of the new point set.
        points: usize,
    },
}

/// An in-progress bulk load.
#[derive(Debug)]
struct BuildSession {
    owner: ConnectionId,
    remaining: usize,
    buffer: Vec<Point>,
}

#[derive(Debug, Default)]
struct GraphState {
    points: Vec<Point>,
    session: Option<BuildSession>,
}

impl GraphState {
    /// Fails if a session owned by someone other than `caller` is active.
    fn admit(&self, caller: ConnectionId) -> Result<(), GraphError> {
        match &self.session {
            Some(session) if session.owner != caller => Err(GraphError::Busy {
                owner: session.owner,
            }),
            _ => Ok(()),
        }
    }
}

/// Thread-safe owner of the point set and the graph-build session.
///
/// # Example
///
/// ```rust
/// use hull_core::{ConnectionId, GraphProgress, GraphStore};
/// use hull_geometry::Point;
///
/// let store = GraphStore::new();
/// let me = ConnectionId::new(1);
///
/// store.begin_graph(me, 3)?;
/// store.feed_graph_point(me, Point::new(0.0, 0.0))?;
/// store.feed_graph_point(me, Point::new(4.0, 0.0))?;
/// let done = store.feed_graph_point(me, Point::new(0.0, 3.0))?;
///
/// assert_eq!(done, GraphProgress::Loaded { points: 3 });
/// assert_eq!(store.compute_hull_area(), 6.0);
/// # Ok::<(), hull_core::GraphError>(())
/// ```
#[derive(Debug, Default)]
pub struct GraphStore {
    state: Mutex<GraphState>,
}

impl GraphStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-loaded with `points`.
    #[must_use]
    pub fn with_points(points: Vec<Point>) -> Self {
        Self {
            state: Mutex::new(GraphState {
                points,
                session: None,
            }),
        }
    }

    /// Opens a graph-build session for `owner` expecting `count` points.
    ///
    /// If `owner` already holds a session, its buffer is discarded and the
    /// session restarts.
    ///
    /// # Errors
    ///
    /// - [`GraphError::InvalidCount`] if `count <= 0`
    /// - [`GraphError::Busy`] if another connection holds the session
    pub fn begin_graph(&self, owner: ConnectionId, count: i64) -> Result<GraphProgress, GraphError> {
        let remaining = usize::try_from(count)
            .ok()
            .filter(|&n| n > 0)
            .ok_or(GraphError::InvalidCount(count))?;

        let mut state = self.state.lock();
        state.admit(owner)?;
        if state.session.is_some() {
            debug!("{} restarted its graph build", owner);
        }
        state.session = Some(BuildSession {
            owner,
            remaining,
            buffer: Vec::new(),
        });
        info!("{} started graph build of {} points", owner, remaining);
        Ok(GraphProgress::Pending { remaining })
    }

    /// Appends one point to the owner's session buffer.
    ///
    /// When the expected count is reached the buffer atomically becomes the
    /// live point set and the session ends.
    ///
    /// # Errors
    ///
    /// - [`GraphError::Busy`] if `owner` does not hold the session
    /// - [`GraphError::NoSession`] if no session is active
    pub fn feed_graph_point(
        &self,
        owner: ConnectionId,
        point: Point,
    ) -> Result<GraphProgress, GraphError> {
        let mut state = self.state.lock();
        state.admit(owner)?;
        let session = state.session.as_mut().ok_or(GraphError::NoSession)?;

        session.buffer.push(point);
        session.remaining -= 1;
        if session.remaining > 0 {
            return Ok(GraphProgress::Pending {
                remaining: session.remaining,
            });
        }

        let finished = state.session.take().ok_or(GraphError::NoSession)?;
        state.points = finished.buffer;
        let points = state.points.len();
        info!("{} completed graph build ({} points)", owner, points);
        Ok(GraphProgress::Loaded { points })
    }

    /// Appends a point to the live set. Duplicates are kept.
    ///
    /// # Errors
    ///
    /// [`GraphError::Busy`] if another connection holds the session.
    pub fn add_point(&self, caller: ConnectionId, point: Point) -> Result<(), GraphError> {
        let mut state = self.state.lock();
        state.admit(caller)?;
        state.points.push(point);
        Ok(())
    }

    /// Removes every live point exactly equal to `point`.
    ///
    /// Returns how many were removed; zero is not an error.
    ///
    /// # Errors
    ///
    /// [`GraphError::Busy`] if another connection holds the session.
    pub fn remove_point(&self, caller: ConnectionId, point: Point) -> Result<usize, GraphError> {
        let mut state = self.state.lock();
        state.admit(caller)?;
        let before = state.points.len();
        state.points.retain(|p| *p != point);
        Ok(before - state.points.len())
    }

    /// Hull area as seen by `caller`.
    ///
    /// # Errors
    ///
    /// [`GraphError::Busy`] if another connection holds the session.
    pub fn hull_area(&self, caller: ConnectionId) -> Result<f64, GraphError> {
        let snapshot = {
            let state = self.state.lock();
            state.admit(caller)?;
            state.points.clone()
        };
        Ok(polygon_area(&convex_hull(&snapshot)))
    }

    /// Hull area of the live point set, regardless of any session.
    ///
    /// The point set is copied under the lock and the hull is computed after
    /// releasing it.
    #[must_use]
    pub fn compute_hull_area(&self) -> f64 {
        polygon_area(&self.hull())
    }

    /// Hull of the live point set.
    #[must_use]
    pub fn hull(&self) -> Vec<Point> {
        convex_hull(&self.points())
    }

    /// Drops the session if `owner` holds it. Returns whether one was dropped.
    pub fn abort_session_if_owner(&self, owner: ConnectionId) -> bool {
        let mut state = self.state.lock();
        match &state.session {
            Some(session) if session.owner == owner => {
                info!(
                    "{} aborted graph build with {} points outstanding",
                    owner, session.remaining
                );
                state.session = None;
                true
            }
            _ => false,
        }
    }

    /// Current session owner, if a build is in progress.
    #[must_use]
    pub fn session_owner(&self) -> Option<ConnectionId> {
        self.state.lock().session.as_ref().map(|s| s.owner)
    }

    /// Points the active session still expects.
    #[must_use]
    pub fn session_remaining(&self) -> Option<usize> {
        self.state.lock().session.as_ref().map(|s| s.remaining)
    }

    /// Copy of the live point set.
    #[must_use]
    pub fn points(&self) -> Vec<Point> {
        self.state.lock().points.clone()
    }

    /// Number of live points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
