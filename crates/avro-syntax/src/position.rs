//! Source positions, ranges and text edits.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A zero-based row and byte column in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Point {
    pub row: usize,
    pub column: usize,
}

impl Point {
    pub const fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }

    /// The point reached after walking over `text` starting from `self`.
    pub fn advance(self, text: &str) -> Point {
        self.advance_bytes(text.as_bytes())
    }

    fn advance_bytes(self, bytes: &[u8]) -> Point {
        let mut point = self;
        for b in bytes {
            if *b == b'\n' {
                point.row += 1;
                point.column = 0;
            } else {
                point.column += 1;
            }
        }
        point
    }

    /// Computes the point of `byte` in `source` by scanning from the start.
    pub fn of_offset(source: &str, byte: usize) -> Point {
        let end = byte.min(source.len());
        Point::default().advance_bytes(&source.as_bytes()[..end])
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row + 1, self.column + 1)
    }
}

/// A half-open byte range together with its start and end points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Range {
    pub start_byte: usize,
    pub end_byte: usize,
    pub start: Point,
    pub end: Point,
}

impl Range {
    /// A zero-width range at the given location.
    pub fn empty(byte: usize, point: Point) -> Self {
        Self {
            start_byte: byte,
            end_byte: byte,
            start: point,
            end: point,
        }
    }

    pub fn len(&self) -> usize {
        self.end_byte - self.start_byte
    }

    pub fn is_empty(&self) -> bool {
        self.start_byte == self.end_byte
    }

    /// Smallest range covering both `self` and `other`.
    pub fn cover(&self, other: &Range) -> Range {
        let (start_byte, start) = if other.start_byte < self.start_byte {
            (other.start_byte, other.start)
        } else {
            (self.start_byte, self.start)
        };
        let (end_byte, end) = if other.end_byte > self.end_byte {
            (other.end_byte, other.end)
        } else {
            (self.end_byte, self.end)
        };
        Range {
            start_byte,
            end_byte,
            start,
            end,
        }
    }
}

/// Describes a single text replacement, in the shape incremental parsing
/// engines expect: the edited region started at `start_byte`, used to end at
/// `old_end_byte`, and now ends at `new_end_byte`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEdit {
    pub start_byte: usize,
    pub old_end_byte: usize,
    pub new_end_byte: usize,
    pub start_point: Point,
    pub old_end_point: Point,
    pub new_end_point: Point,
}

impl InputEdit {
    /// Describes replacing `old_source[start..old_end]` with `replacement`.
    pub fn replace(old_source: &str, start: usize, old_end: usize, replacement: &str) -> InputEdit {
        let start_point = Point::of_offset(old_source, start);
        let old_end_point = Point::of_offset(old_source, old_end);
        InputEdit {
            start_byte: start,
            old_end_byte: old_end,
            new_end_byte: start + replacement.len(),
            start_point,
            old_end_point,
            new_end_point: start_point.advance(replacement),
        }
    }

    /// Applies the edit to `old_source`, producing the new text.
    pub fn apply(&self, old_source: &str, replacement: &str) -> String {
        let mut out = String::with_capacity(old_source.len() + replacement.len());
        out.push_str(&old_source[..self.start_byte]);
        out.push_str(replacement);
        out.push_str(&old_source[self.old_end_byte..]);
        out
    }

    /// Signed byte delta between the old and new text.
    pub fn delta(&self) -> isize {
        self.new_end_byte as isize - self.old_end_byte as isize
    }

    /// Maps a byte at or after `old_end_byte` in the old text to the new text.
    pub fn shift_byte(&self, old_byte: usize) -> usize {
        (old_byte as isize + self.delta()) as usize
    }

    /// Maps a point at or after `old_end_point` in the old text to the new text.
    pub fn shift_point(&self, old: Point) -> Point {
        if old.row == self.old_end_point.row {
            Point::new(
                self.new_end_point.row,
                self.new_end_point.column + (old.column - self.old_end_point.column),
            )
        } else {
            Point::new(old.row - self.old_end_point.row + self.new_end_point.row, old.column)
        }
    }

    /// Maps a byte of the new text back to the old text, when the byte lies
    /// outside the edited region.
    pub fn old_offset(&self, new_byte: usize) -> Option<usize> {
        if new_byte <= self.start_byte {
            Some(new_byte)
        } else if new_byte >= self.new_end_byte {
            Some((new_byte as isize - self.delta()) as usize)
        } else {
            None
        }
    }
}
