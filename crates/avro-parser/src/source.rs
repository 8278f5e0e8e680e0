//! Token supply for the driver.
//!
//! The parser asks for the next token together with the set of kinds it can
//! accept there; keywords are contextual, so the same text may come back as
//! a keyword under one set and as an identifier under another. A lookahead
//! is therefore only cached for the set it was scanned with. Comments are
//! taken out of the stream as they are met and handed to the parser as
//! pending extras.
//!
//! On a reparse, tokens from the previous parse are adopted instead of
//! scanned whenever the scanner would provably produce the same token: same
//! starting offset, same state, same valid set, and no edited byte inside
//! the text the scanner examined for it.

use avro_scanner::{Cursor, ScannedToken, Scanner};
use avro_syntax::{Error, InputEdit, LexErrorKind, Node, NodeKind, Range, Token, TokenKind, TokenSet};

#[derive(Debug, Clone)]
struct Lookahead<'a> {
    valid: TokenSet,
    scanned: ScannedToken,
    scanner: Scanner,
    cursor: Cursor<'a>,
    reused: bool,
}

#[derive(Debug, Clone, Copy)]
struct Previous<'a> {
    tokens: &'a [ScannedToken],
    edit: InputEdit,
}

pub(crate) struct TokenSource<'a> {
    scanner: Scanner,
    cursor: Cursor<'a>,
    lookahead: Option<Lookahead<'a>>,
    extras: Vec<Node>,
    log: Vec<ScannedToken>,
    lexical_errors: Vec<Error>,
    previous: Option<Previous<'a>>,
    reused: usize,
    frontier: Range,
}

impl<'a> TokenSource<'a> {
    pub fn new(text: &'a str, scanner: Scanner) -> Self {
        Self {
            scanner,
            cursor: Cursor::new(text),
            lookahead: None,
            extras: Vec::new(),
            log: Vec::new(),
            lexical_errors: Vec::new(),
            previous: None,
            reused: 0,
            frontier: Range::default(),
        }
    }

    /// Offers the token log of a previous parse for reuse across `edit`.
    pub fn with_previous(mut self, tokens: &'a [ScannedToken], edit: InputEdit) -> Self {
        self.previous = Some(Previous { tokens, edit });
        self
    }

    /// The next significant token, scanned with `valid` plus the kinds that
    /// are acceptable anywhere. Comments in front of it become pending
    /// extras. When nothing in `valid` starts here, the token is scanned
    /// lexically so the caller can report and skip it.
    pub fn peek(&mut self, valid: TokenSet) -> Token {
        let valid = valid | TokenSet::ambient();
        if let Some(la) = &self.lookahead {
            if la.valid == valid {
                return la.scanned.token;
            }
        }
        loop {
            let la = self.scan(valid);
            if la.scanned.token.kind.is_extra() {
                let token = la.scanned.token;
                self.commit(la);
                self.extras.push(Node::leaf(NodeKind::for_token(token.kind), &token));
                continue;
            }
            let token = la.scanned.token;
            self.lookahead = Some(la);
            return token;
        }
    }

    /// Consumes the token returned by the last [`TokenSource::peek`].
    pub fn bump(&mut self) -> Token {
        if self.lookahead.is_none() {
            self.peek(TokenSet::lexical());
        }
        match self.lookahead.take() {
            Some(la) => {
                let token = la.scanned.token;
                self.commit(la);
                token
            }
            None => Token {
                kind: TokenKind::Eof,
                start_byte: self.frontier.end_byte,
                end_byte: self.frontier.end_byte,
                start: self.frontier.end,
                end: self.frontier.end,
            },
        }
    }

    /// Hands over the comments met since the last call.
    pub fn take_extras(&mut self) -> Vec<Node> {
        if let Some(last) = self.extras.last() {
            self.frontier = Range::empty(last.range.end_byte, last.range.end);
        }
        std::mem::take(&mut self.extras)
    }

    /// A zero-width range after everything placed in the tree so far.
    pub fn here(&self) -> Range {
        self.frontier
    }

    pub fn text(&self) -> &'a str {
        self.cursor.text()
    }

    /// Byte offset the next scan starts from.
    pub fn offset(&self) -> usize {
        self.cursor.byte()
    }

    /// The committed token log, lexical diagnostics and reuse count.
    pub fn finish(self) -> (Vec<ScannedToken>, Vec<Error>, usize) {
        (self.log, self.lexical_errors, self.reused)
    }

    fn commit(&mut self, la: Lookahead<'a>) {
        let token = la.scanned.token;
        self.scanner = la.scanner;
        self.cursor = la.cursor;
        if la.reused {
            self.reused += 1;
        }
        if let TokenKind::Error(kind) = token.kind {
            let (point, byte) = if kind.ends_at_failure() {
                (token.end, token.end_byte)
            } else {
                (token.start, token.start_byte)
            };
            self.lexical_errors.push(Error::lexical(kind.to_string(), point, byte));
        }
        if !token.kind.is_extra() {
            self.frontier = Range::empty(token.end_byte, token.end);
        }
        self.log.push(la.scanned);
    }

    fn scan(&mut self, valid: TokenSet) -> Lookahead<'a> {
        if let Some(la) = self.reuse(valid) {
            return la;
        }
        let mut scanner = self.scanner.clone();
        let mut cursor = self.cursor.clone();
        let state_before = scanner.serialize_state();
        let (token, used) = match scanner.scan(&mut cursor, valid) {
            Some(token) => (token, valid),
            None => match scanner.scan(&mut cursor, TokenSet::lexical()) {
                Some(token) => (token, TokenSet::lexical()),
                None => (unscannable(&mut cursor), TokenSet::lexical()),
            },
        };
        Lookahead {
            valid,
            scanned: ScannedToken {
                token,
                valid: used,
                state_before,
                state_after: scanner.serialize_state(),
                lookahead_end: cursor.lookahead_end(),
            },
            scanner,
            cursor,
            reused: false,
        }
    }

    fn reuse(&self, valid: TokenSet) -> Option<Lookahead<'a>> {
        let prev = self.previous?;
        let edit = &prev.edit;
        let origin = edit.old_offset(self.cursor.byte())?;

        // a token starts scanning where the one before it ended
        let index = if origin == 0 {
            0
        } else {
            let before = prev.tokens.partition_point(|t| t.token.end_byte < origin);
            if prev.tokens.get(before)?.token.end_byte != origin {
                return None;
            }
            before + 1
        };
        let old = prev.tokens.get(index)?;

        let ahead_of_edit = origin <= edit.start_byte;
        if ahead_of_edit && old.lookahead_end > edit.start_byte {
            return None;
        }
        if old.valid != valid || old.state_before != self.scanner.serialize_state() {
            return None;
        }

        let mut scanner = self.scanner.clone();
        scanner.deserialize_state(&old.state_after).ok()?;
        let scanned = if ahead_of_edit { old.clone() } else { old.shifted(edit) };
        let cursor = Cursor::at(self.cursor.text(), scanned.token.end_byte, scanned.token.end);
        Some(Lookahead {
            valid,
            scanned,
            scanner,
            cursor,
            reused: true,
        })
    }
}

/// One character the scanner would not accept under any set.
fn unscannable(cursor: &mut Cursor<'_>) -> Token {
    cursor.begin_scan();
    let start = cursor.mark();
    if cursor.advance().is_none() {
        return cursor.token_from(start, TokenKind::Eof);
    }
    cursor.token_from(start, TokenKind::Error(LexErrorKind::UnexpectedCharacter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use avro_scanner::{Mode, ScannerConfig};
    use avro_syntax::{Keyword, Punct};

    fn source(text: &str) -> TokenSource<'_> {
        TokenSource::new(text, Scanner::with_mode(ScannerConfig::default(), Mode::Idl))
    }

    #[test]
    fn keywords_depend_on_the_valid_set() {
        let mut src = source("record x");
        let as_name = src.peek(TokenSet::single(TokenKind::Identifier));
        assert_eq!(as_name.kind, TokenKind::Identifier);
        let as_kw = src.peek(TokenSet::single(TokenKind::Keyword(Keyword::Record)));
        assert_eq!(as_kw.kind, TokenKind::Keyword(Keyword::Record));
        assert_eq!(src.bump().kind, TokenKind::Keyword(Keyword::Record));
        assert_eq!(src.peek(TokenSet::single(TokenKind::Identifier)).start_byte, 7);
    }

    #[test]
    fn comments_become_pending_extras() {
        let mut src = source("/** doc */ // line\n{");
        let t = src.peek(TokenSet::single(TokenKind::Punct(Punct::LBrace)));
        assert_eq!(t.kind, TokenKind::Punct(Punct::LBrace));
        let extras = src.take_extras();
        assert_eq!(extras.len(), 2);
        assert_eq!(extras[0].kind, NodeKind::DocComment);
        assert!(extras.iter().all(|n| n.is_extra));
        assert_eq!(src.here().end_byte, 18);
    }

    #[test]
    fn unexpected_tokens_are_scanned_lexically() {
        let mut src = source("; x");
        let t = src.peek(TokenSet::single(TokenKind::Identifier));
        assert_eq!(t.kind, TokenKind::Punct(Punct::Semicolon));
        src.bump();
        let (log, errors, reused) = src.finish();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].valid, TokenSet::lexical());
        assert!(errors.is_empty());
        assert_eq!(reused, 0);
    }

    #[test]
    fn lexical_errors_are_reported_once() {
        let mut src = source("\"open");
        let t = src.peek(TokenSet::single(TokenKind::String));
        assert!(t.kind.is_error());
        src.peek(TokenSet::single(TokenKind::String));
        src.bump();
        let (_, errors, _) = src.finish();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].offset, Some(5));
    }
}
