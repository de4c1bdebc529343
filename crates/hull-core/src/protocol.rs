//! Line protocol: command grammar and response rendering.
//!
//! ```text
//! Newgraph <positive integer>
//! Newpoint <float>,<float>
//! Removepoint <float>,<float>
//! CH
//! ```
//!
//! During a graph build the owner's lines carry no keyword and are parsed
//! with [`parse_graph_point`].

use std::fmt;

use hull_geometry::Point;

use crate::error::ProtocolError;

/// A parsed client command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Start a graph build of this many points. Sign is checked by the store.
    Newgraph(i64),
    /// Append a point.
    Newpoint(Point),
    /// Remove every copy of a point.
    Removepoint(Point),
    /// Report the hull area.
    ConvexHull,
}

impl Command {
    /// Parses one trimmed, non-empty command line.
    ///
    /// The first whitespace-separated token is the keyword; the rest of the
    /// line, trimmed, is its argument. Arguments after `CH` are ignored.
    ///
    /// # Errors
    ///
    /// Returns the [`ProtocolError`] to report back to the client.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim();
        let (keyword, args) = match line.split_once(char::is_whitespace) {
            Some((keyword, args)) => (keyword, args.trim()),
            None => (line, ""),
        };

        match keyword {
            "Newgraph" => args
                .parse::<i64>()
                .map(Self::Newgraph)
                .map_err(|_| ProtocolError::InvalidNumber),
            "Newpoint" => parse_point(args).map(Self::Newpoint),
            "Removepoint" => parse_point(args).map(Self::Removepoint),
            "CH" => Ok(Self::ConvexHull),
            _ => Err(ProtocolError::UnknownCommand),
        }
    }
}

/// Parses the `x,y` argument of `Newpoint`/`Removepoint`.
///
/// # Errors
///
/// [`ProtocolError::InvalidFormat`] without a comma,
/// [`ProtocolError::InvalidValues`] for a non-numeric coordinate.
pub fn parse_point(args: &str) -> Result<Point, ProtocolError> {
    split_point(args, ProtocolError::InvalidFormat, ProtocolError::InvalidValues)
}

/// Parses a bare `x,y` line sent during a graph build.
///
/// # Errors
///
/// [`ProtocolError::InvalidPointFormat`] without a comma,
/// [`ProtocolError::InvalidPointValues`] for a non-numeric coordinate.
pub fn parse_graph_point(line: &str) -> Result<Point, ProtocolError> {
    split_point(
        line,
        ProtocolError::InvalidPointFormat,
        ProtocolError::InvalidPointValues,
    )
}

fn split_point(
    text: &str,
    bad_format: ProtocolError,
    bad_values: ProtocolError,
) -> Result<Point, ProtocolError> {
    let (x, y) = text.split_once(',').ok_or(bad_format)?;
    let x = parse_coordinate(x).ok_or(bad_values)?;
    let y = parse_coordinate(y).ok_or(bad_values)?;
    Ok(Point::new(x, y))
}

/// A decimal floating-point literal; infinities and NaN are refused.
fn parse_coordinate(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// A single response line, rendered without its trailing newline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Response {
    /// Command accepted.
    Ok,
    /// The last point of a graph build arrived.
    GraphLoaded,
    /// Another connection is building a graph.
    Busy,
    /// Result of `CH`.
    Area(f64),
    /// Malformed input.
    Error(ProtocolError),
}

impl Response {
    /// Returns true for `ERROR: ...` responses.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl From<ProtocolError> for Response {
    fn from(err: ProtocolError) -> Self {
        Self::Error(err)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("OK"),
            Self::GraphLoaded => f.write_str("GRAPH_LOADED"),
            Self::Busy => f.write_str("BUSY"),
            Self::Area(area) => write!(f, "{}", area),
            Self::Error(err) => write!(f, "ERROR: {}", err),
        }
    }
}
