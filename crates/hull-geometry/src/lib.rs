//! # Hull Geometry
//!
//! Pure 2D geometry for the hull server: convex hull extraction and
//! polygon area. Nothing in this crate allocates shared state or locks.
//!
//! ## Components
//!
//! | Item | Purpose |
//! |------|---------|
//! | [`Point`] | Two real coordinates, ordered lexicographically for hull construction |
//! | [`convex_hull`] | Andrew's monotone chain, CCW output, no collinear boundary triples |
//! | [`polygon_area`] | Shoelace formula, absolute value |
//! | [`hull_area`] | `polygon_area(convex_hull(points))` |
//!
//! ## Quick Start
//!
//! ```rust
//! use hull_geometry::{convex_hull, polygon_area, Point};
//!
//! let square = vec![
//!     Point::new(1.0, 1.0),
//!     Point::new(0.0, 0.0),
//!     Point::new(0.0, 1.0),
//!     Point::new(1.0, 0.0),
//! ];
//! let hull = convex_hull(&square);
//! assert_eq!(hull.len(), 4);
//! assert_eq!(polygon_area(&hull), 1.0);
//! ```
//!
//! ## Numerical Notes
//!
//! - Collinear and clockwise triples are both discarded (`cross <= 0`), so a
//!   point sitting on an edge never becomes a hull vertex.
//! - Coordinates are compared exactly; no epsilon is applied anywhere.
//!
//! ## References
//!
//! - Andrew, A. M. (1979). "Another efficient algorithm for convex hulls in
//!   two dimensions". *Information Processing Letters*, 9(5), 216-219.

mod hull;
mod point;

pub use hull::{convex_hull, hull_area, polygon_area};
pub use point::{cross, Point};
