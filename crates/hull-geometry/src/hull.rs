//! Monotone chain convex hull and shoelace area.

use crate::point::{cross, Point};

/// Computes the convex hull of `points` in counter-clockwise order.
///
/// The first vertex is the lexicographically smallest input point. Triples
/// that are collinear or turn clockwise are dropped from both chains, so the
/// result never contains three consecutive collinear vertices.
///
/// With zero or one input point the input is returned unchanged. Inputs made
/// only of coincident points produce a degenerate two-vertex hull of zero area.
///
/// # Example
///
/// ```rust
/// use hull_geometry::{convex_hull, Point};
///
/// let pts = [
///     Point::new(0.0, 0.0),
///     Point::new(2.0, 0.0),
///     Point::new(1.0, 0.0), // on the bottom edge, never a vertex
///     Point::new(1.0, 3.0),
/// ];
/// let hull = convex_hull(&pts);
/// assert_eq!(hull, vec![Point::new(0.0, 0.0), Point::new(2.0, 0.0), Point::new(1.0, 3.0)]);
/// ```
#[must_use]
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let n = points.len();
    if n <= 1 {
        return points.to_vec();
    }

    let mut sorted = points.to_vec();
    sorted.sort_by(Point::lex_cmp);

    let mut hull: Vec<Point> = Vec::with_capacity(n + 1);

    // Lower chain, left to right.
    for &p in &sorted {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }

    // Upper chain, right to left, never popping into the lower chain.
    let floor = hull.len() + 1;
    for &p in sorted.iter().rev().skip(1) {
        while hull.len() >= floor && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }

    // The scan ends back on the first point.
    hull.pop();
    hull
}

/// Area of a simple polygon by the shoelace formula.
///
/// Vertices are taken in order with wraparound; the absolute value is
/// returned so orientation does not matter. Fewer than three vertices give 0.
#[must_use]
pub fn polygon_area(polygon: &[Point]) -> f64 {
    let n = polygon.len();
    if n < 3 {
        return 0.0;
    }
    let twice: f64 = (0..n)
        .map(|i| {
            let p = polygon[i];
            let q = polygon[(i + 1) % n];
            p.x * q.y - q.x * p.y
        })
        .sum();
    twice.abs() / 2.0
}

/// Area of the convex hull of `points`.
#[inline]
#[must_use]
pub fn hull_area(points: &[Point]) -> f64 {
    polygon_area(&convex_hull(points))
}
