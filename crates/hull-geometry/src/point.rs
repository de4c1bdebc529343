//! The point type shared by every layer of the server.

use std::cmp::Ordering;
use std::fmt;

/// A point in the plane.
///
/// Equality is exact floating-point equality on both coordinates, which is
/// what point removal matches on. Ordering ([`Point::lex_cmp`]) is only used
/// to sort input for hull construction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Lexicographic comparison: by `x`, then by `y`.
    ///
    /// Incomparable coordinates (NaN) compare as equal so sorting never panics;
    /// the protocol layer rejects non-finite input before it gets here.
    #[inline]
    #[must_use]
    pub fn lex_cmp(&self, other: &Self) -> Ordering {
        self.x
            .partial_cmp(&other.x)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.y.partial_cmp(&other.y).unwrap_or(Ordering::Equal))
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Z component of `(a - o) x (b - o)`.
///
/// Positive for a counter-clockwise turn `o -> a -> b`, zero when collinear.
#[inline]
#[must_use]
pub fn cross(o: Point, a: Point, b: Point) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}
