//! Error handling types shared by the scanner, grammar and parser crates.
//!
//! Every failure that can be located in the source text is an [`Error`] with a
//! message, an [`ErrorKind`] and an optional location. Lexical and syntax
//! errors are usually reported as diagnostics attached to a parsed tree;
//! resource limit errors abort a parse.
//!
//! # Examples
//!
//! ```rust
//! use avro_syntax::error::{error, Error, ErrorKind, Result};
//!
//! let located = Error::with_span("expected `;`", 3, 14);
//! assert_eq!(located.to_string(), "expected `;` at 3:14");
//! assert_eq!(located.kind, ErrorKind::Syntax);
//!
//! fn must_not_be_empty(s: &str) -> Result<&str> {
//!     if s.is_empty() {
//!         error("input is empty")
//!     } else {
//!         Ok(s)
//!     }
//! }
//! assert!(must_not_be_empty("").is_err());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::position::Point;

/// Broad category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed tokens: unterminated strings, bad escapes, stray characters.
    Lexical,
    /// Well formed tokens in an order the grammar does not allow.
    Syntax,
    /// Input size or nesting depth went past a configured limit.
    ResourceLimit,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Lexical => "lexical error",
            ErrorKind::Syntax => "syntax error",
            ErrorKind::ResourceLimit => "resource limit",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error with an optional source location.
///
/// # Fields
///
/// - `kind`: what went wrong, see [`ErrorKind`]
/// - `msg`: human-readable description
/// - `line`: optional 1-based line number
/// - `col`: optional 1-based column number
/// - `offset`: optional byte offset of the failure point
///
/// ```rust
/// use avro_syntax::{Error, ErrorKind, Point};
///
/// let err = Error::lexical("unterminated string literal", Point::new(0, 4), 4);
/// assert_eq!(err.to_string(), "unterminated string literal at 1:5");
/// assert_eq!(err.offset, Some(4));
/// assert_eq!(err.kind, ErrorKind::Lexical);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Error {
    pub kind: ErrorKind,

    /// Human-readable error message
    pub msg: String,

    /// Optional line number in source file (1-based)
    pub line: Option<usize>,

    /// Optional column number in source file (1-based)
    pub col: Option<usize>,

    /// Optional byte offset in source file
    pub offset: Option<usize>,
}

impl Error {
    /// Creates a syntax error without a location.
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Syntax,
            msg: msg.into(),
            line: None,
            col: None,
            offset: None,
        }
    }

    /// Creates a syntax error at a 1-based line and column.
    pub fn with_span(msg: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            line: Some(line),
            col: Some(col),
            ..Self::new(msg)
        }
    }

    /// Creates an error of `kind` at a zero-based point and byte offset.
    pub fn at(kind: ErrorKind, msg: impl Into<String>, point: Point, offset: usize) -> Self {
        Self {
            kind,
            msg: msg.into(),
            line: Some(point.row + 1),
            col: Some(point.column + 1),
            offset: Some(offset),
        }
    }

    pub fn lexical(msg: impl Into<String>, point: Point, offset: usize) -> Self {
        Self::at(ErrorKind::Lexical, msg, point, offset)
    }

    pub fn syntax(msg: impl Into<String>, point: Point, offset: usize) -> Self {
        Self::at(ErrorKind::Syntax, msg, point, offset)
    }

    pub fn resource_limit(msg: impl Into<String>, point: Point, offset: usize) -> Self {
        Self::at(ErrorKind::ResourceLimit, msg, point, offset)
    }

    pub fn is_resource_limit(&self) -> bool {
        self.kind == ErrorKind::ResourceLimit
    }

    /// Zero-based point of the error, when it has one.
    pub fn point(&self) -> Option<Point> {
        match (self.line, self.col) {
            (Some(l), Some(c)) if l > 0 && c > 0 => Some(Point::new(l - 1, c - 1)),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(l), Some(c)) = (self.line, self.col) {
            write!(f, "{} at {}:{}", self.msg, l, c)
        } else {
            write!(f, "{}", self.msg)
        }
    }
}

impl std::error::Error for Error {}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::new(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::new(s)
    }
}

/// A specialized `Result` type using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Shorthand for `Err(Error::new(msg))`.
pub fn error<T>(msg: impl Into<String>) -> Result<T> {
    Err(Error::new(msg))
}

/// Shorthand for `Err(Error::with_span(msg, line, col))`, with 1-based
/// `line` and `col`.
pub fn error_at<T>(line: usize, col: usize, msg: impl Into<String>) -> Result<T> {
    Err(Error::with_span(msg, line, col))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_location_when_known() {
        assert_eq!(Error::new("boom").to_string(), "boom");
        assert_eq!(Error::with_span("boom", 2, 7).to_string(), "boom at 2:7");
    }

    #[test]
    fn point_round_trips_through_one_based_location() {
        let err = Error::resource_limit("too deep", Point::new(4, 0), 120);
        assert!(err.is_resource_limit());
        assert_eq!(err.point(), Some(Point::new(4, 0)));
        assert_eq!(Error::new("x").point(), None);
    }

    #[test]
    fn helpers_produce_err() {
        let r: Result<()> = error_at(1, 1, "nope");
        let err = r.unwrap_err();
        assert_eq!(err.line, Some(1));
        assert_eq!(err.kind, ErrorKind::Syntax);
    }
}
