//! Input cursor handed to the scanner.

use avro_syntax::{Point, Token, TokenKind};

/// A saved cursor position, restored with [`Cursor::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    pos: usize,
    point: Point,
}

impl Mark {
    pub fn byte(&self) -> usize {
        self.pos
    }

    pub fn point(&self) -> Point {
        self.point
    }
}

/// Character cursor over source text with position tracking.
///
/// The cursor may be restricted to a window with [`Cursor::with_limit`]: the
/// scanner then cannot see past `limit`, and any attempt to look there sets
/// [`Cursor::hit_limit`]. It also records the furthest byte examined during
/// the current scan call, which the incremental driver uses to decide which
/// tokens an edit can affect.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    text: &'a str,
    pos: usize,
    point: Point,
    limit: usize,
    lookahead_end: usize,
    hit_limit: bool,
}

impl<'a> Cursor<'a> {
    pub fn new(text: &'a str) -> Self {
        Self::at(text, 0, Point::default())
    }

    /// A cursor positioned at `byte`, whose point is already known.
    pub fn at(text: &'a str, byte: usize, point: Point) -> Self {
        let pos = byte.min(text.len());
        Self {
            text,
            pos,
            point,
            limit: text.len(),
            lookahead_end: pos,
            hit_limit: false,
        }
    }

    /// Restricts the scanner to `text[..limit]`. The limit is rounded down
    /// to a character boundary and never falls behind the cursor.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.set_limit(limit);
        self
    }

    pub fn set_limit(&mut self, limit: usize) {
        let mut limit = limit.clamp(self.pos, self.text.len());
        while !self.text.is_char_boundary(limit) {
            limit -= 1;
        }
        self.limit = limit;
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn byte(&self) -> usize {
        self.pos
    }

    pub fn point(&self) -> Point {
        self.point
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// True once the cursor stands at the real end of the text.
    pub fn at_eof(&self) -> bool {
        self.pos >= self.text.len()
    }

    /// True when the window ends before the text does.
    pub fn is_bounded(&self) -> bool {
        self.limit < self.text.len()
    }

    pub fn hit_limit(&self) -> bool {
        self.hit_limit
    }

    /// Furthest byte (exclusive) examined since the last [`Cursor::begin_scan`].
    pub fn lookahead_end(&self) -> usize {
        self.lookahead_end
    }

    /// Resets the per-call lookahead bookkeeping.
    pub fn begin_scan(&mut self) {
        self.lookahead_end = self.pos;
        self.hit_limit = false;
    }

    pub fn peek(&mut self) -> Option<char> {
        self.peek_nth(0)
    }

    /// The character `n` positions ahead, if it lies inside the window.
    pub fn peek_nth(&mut self, n: usize) -> Option<char> {
        let mut at = self.pos;
        let mut chars = self.text[self.pos..self.limit].chars();
        for _ in 0..n {
            match chars.next() {
                Some(c) => at += c.len_utf8(),
                None => return self.look_past_window(at),
            }
        }
        match chars.next() {
            Some(c) => {
                self.lookahead_end = self.lookahead_end.max(at + c.len_utf8());
                Some(c)
            }
            None => self.look_past_window(at),
        }
    }

    fn look_past_window(&mut self, at: usize) -> Option<char> {
        if self.limit < self.text.len() {
            self.hit_limit = true;
        }
        // seeing the end counts as examining one more byte
        self.lookahead_end = self.lookahead_end.max(at + 1);
        None
    }

    pub fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.point.row += 1;
            self.point.column = 0;
        } else {
            self.point.column += c.len_utf8();
        }
        Some(c)
    }

    /// Consumes characters while `pred` holds; returns how many were consumed.
    pub fn advance_while(&mut self, mut pred: impl FnMut(char) -> bool) -> usize {
        let mut n = 0;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.advance();
            n += 1;
        }
        n
    }

    pub fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn mark(&self) -> Mark {
        Mark {
            pos: self.pos,
            point: self.point,
        }
    }

    pub fn reset(&mut self, mark: Mark) {
        self.pos = mark.pos;
        self.point = mark.point;
    }

    pub fn slice_from(&self, mark: Mark) -> &'a str {
        &self.text[mark.pos..self.pos]
    }

    /// A token of `kind` running from `start` to the current position.
    pub fn token_from(&self, start: Mark, kind: TokenKind) -> Token {
        Token {
            kind,
            start_byte: start.pos,
            end_byte: self.pos,
            start: start.point,
            end: self.point,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_tracks_rows_and_byte_columns() {
        let mut c = Cursor::new("é\nx");
        assert_eq!(c.advance(), Some('é'));
        assert_eq!(c.point(), Point::new(0, 2));
        c.advance();
        assert_eq!(c.point(), Point::new(1, 0));
        assert_eq!(c.advance(), Some('x'));
        assert_eq!(c.advance(), None);
        assert!(c.at_eof());
    }

    #[test]
    fn window_stops_reads_and_flags_it() {
        let mut c = Cursor::new("abcdef").with_limit(3);
        c.begin_scan();
        assert_eq!(c.peek_nth(2), Some('c'));
        assert!(!c.hit_limit());
        assert_eq!(c.peek_nth(3), None);
        assert!(c.hit_limit());
        assert_eq!(c.lookahead_end(), 4);
    }

    #[test]
    fn lookahead_counts_the_end_of_input() {
        let mut c = Cursor::new("ab");
        c.begin_scan();
        c.advance_while(|ch| ch.is_alphabetic());
        assert_eq!(c.byte(), 2);
        assert_eq!(c.lookahead_end(), 3);
        assert!(!c.hit_limit());
    }

    #[test]
    fn mark_and_reset() {
        let mut c = Cursor::new("record");
        let m = c.mark();
        c.advance_while(|_| true);
        assert_eq!(c.slice_from(m), "record");
        c.reset(m);
        assert_eq!(c.byte(), 0);
        let t = c.token_from(m, TokenKind::Identifier);
        assert!(t.is_empty());
    }
}
