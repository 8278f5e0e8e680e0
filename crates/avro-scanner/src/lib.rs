//! Resumable, context-sensitive scanner for Avro JSON schemas and Avro IDL.
//!
//! The [`Scanner`] works one token at a time against a [`Cursor`] and a
//! [`TokenSet`] of acceptable kinds. Its whole context (lexical mode, open
//! brackets, an unfinished block comment) lives in [`ScannerState`], which
//! serializes to a few bytes so a parser can resume at any token boundary.
//!
//! The helpers in this module run the scanner in plain lexical mode, the way
//! a highlighter or the `tokens` command does:
//!
//! ```rust
//! use avro_scanner::{tokenize, ScannerConfig};
//! use avro_syntax::TokenKind;
//!
//! let tokens = tokenize("record R { int x; }", ScannerConfig::default());
//! assert_eq!(tokens.len(), 8);
//! assert_eq!(tokens.last().map(|t| t.token.kind), Some(TokenKind::Eof));
//! ```

pub mod cursor;
pub mod scanner;
pub mod state;

pub use cursor::{Cursor, Mark};
pub use scanner::Scanner;
pub use state::{
    Bracket, CommentKind, Mode, ScannerConfig, ScannerState, StateError, DEFAULT_MAX_DEPTH,
    MAX_DEPTH_CEILING,
};

use avro_syntax::{InputEdit, Point, Token, TokenKind, TokenSet};
use serde::Serialize;
use tracing::{debug, warn};

/// A token together with what the scanner knew around it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannedToken {
    pub token: Token,

    /// The valid set the token was scanned with.
    #[serde(skip)]
    pub valid: TokenSet,

    /// Serialized scanner state before and after the token.
    #[serde(skip)]
    pub state_before: Vec<u8>,
    #[serde(skip)]
    pub state_after: Vec<u8>,

    /// Furthest byte (exclusive) the scanner examined for this token.
    pub lookahead_end: usize,
}

impl ScannedToken {
    /// The same token moved past an edit that ended before it.
    pub fn shifted(&self, edit: &InputEdit) -> ScannedToken {
        let mut moved = self.clone();
        moved.token.start_byte = edit.shift_byte(self.token.start_byte);
        moved.token.end_byte = edit.shift_byte(self.token.end_byte);
        moved.token.start = edit.shift_point(self.token.start);
        moved.token.end = edit.shift_point(self.token.end);
        moved.lookahead_end = edit.shift_byte(self.lookahead_end);
        moved
    }
}

/// Scans `scanner` forward from `cursor` until end of input.
fn scan_to_end(scanner: &mut Scanner, cursor: &mut Cursor<'_>, out: &mut Vec<ScannedToken>) {
    let valid = TokenSet::lexical();
    loop {
        let state_before = scanner.serialize_state();
        let Some(token) = scanner.scan(cursor, valid) else {
            warn!(byte = cursor.byte(), "scanner stopped before end of input");
            return;
        };
        out.push(ScannedToken {
            token,
            valid,
            state_before,
            state_after: scanner.serialize_state(),
            lookahead_end: cursor.lookahead_end(),
        });
        if token.kind == TokenKind::Eof {
            return;
        }
    }
}

/// Scans all of `text`, ending with an [`TokenKind::Eof`] token.
pub fn tokenize(text: &str, config: ScannerConfig) -> Vec<ScannedToken> {
    let mut scanner = Scanner::new(config);
    let mut cursor = Cursor::new(text);
    let mut out = Vec::new();
    scan_to_end(&mut scanner, &mut cursor, &mut out);
    out
}

/// Scans all of `text` with the mode fixed rather than inferred.
pub fn tokenize_with_mode(text: &str, config: ScannerConfig, mode: Mode) -> Vec<ScannedToken> {
    let mut scanner = Scanner::with_mode(config, mode);
    let mut cursor = Cursor::new(text);
    let mut out = Vec::new();
    scan_to_end(&mut scanner, &mut cursor, &mut out);
    out
}

/// Resumes scanning at a token boundary from a serialized state.
pub fn tokenize_from(
    text: &str,
    byte: usize,
    point: Point,
    state: &[u8],
    config: ScannerConfig,
) -> Result<Vec<ScannedToken>, StateError> {
    let mut scanner = Scanner::new(config);
    scanner.deserialize_state(state)?;
    let mut cursor = Cursor::at(text, byte, point);
    let mut out = Vec::new();
    scan_to_end(&mut scanner, &mut cursor, &mut out);
    Ok(out)
}

/// Scans `text` through windows of roughly `chunk` bytes, the way an editor
/// feeding text in pieces would. Tokens that cross a window are rescanned
/// with a wider one; block comments are emitted in fragments and joined
/// again, so the result matches [`tokenize`].
pub fn tokenize_chunked(text: &str, chunk: usize, config: ScannerConfig) -> Vec<ScannedToken> {
    let chunk = chunk.max(1);
    let valid = TokenSet::lexical();
    let mut scanner = Scanner::new(config);
    let mut cursor = Cursor::new(text);
    let mut out: Vec<ScannedToken> = Vec::new();

    loop {
        let continuing = scanner.state().comment.is_some();
        let state_before = scanner.serialize_state();
        let mut extent = chunk;
        let token = loop {
            cursor.set_limit(cursor.byte().saturating_add(extent));
            match scanner.scan(&mut cursor, valid) {
                Some(token) => break Some(token),
                None if cursor.hit_limit() => extent = extent.saturating_mul(2),
                None => break None,
            }
        };
        let Some(token) = token else {
            warn!(byte = cursor.byte(), "scanner stopped before end of input");
            return out;
        };

        let scanned = ScannedToken {
            token,
            valid,
            state_before,
            state_after: scanner.serialize_state(),
            lookahead_end: cursor.lookahead_end(),
        };
        match out.last_mut() {
            Some(prev) if continuing => {
                prev.token.end_byte = token.end_byte;
                prev.token.end = token.end;
                if token.kind.is_error() {
                    prev.token.kind = token.kind;
                }
                prev.state_after = scanned.state_after;
                prev.lookahead_end = prev.lookahead_end.max(scanned.lookahead_end);
            }
            _ => out.push(scanned),
        }
        if token.kind == TokenKind::Eof {
            return out;
        }
    }
}

/// Result of [`relex`].
#[derive(Debug, Clone)]
pub struct Relexed {
    pub tokens: Vec<ScannedToken>,
    /// Tokens kept from the old stream, before and after the edit.
    pub reused: usize,
    /// Tokens the scanner actually had to produce.
    pub rescanned: usize,
}

/// Brings a lexical token stream up to date after `edit`.
///
/// Tokens whose lookahead ended before the edit are kept as they are. The
/// scanner resumes after the last of them from its serialized state, and as
/// soon as it reaches a token boundary after the edit that the old stream
/// shared, with the same scanner state, the remaining old tokens are shifted
/// into place instead of being scanned again.
pub fn relex(
    old: &[ScannedToken],
    edit: &InputEdit,
    new_text: &str,
    config: ScannerConfig,
) -> Result<Relexed, StateError> {
    let prefix = old
        .iter()
        .take_while(|t| t.lookahead_end <= edit.start_byte && t.token.kind != TokenKind::Eof)
        .count();
    let mut tokens: Vec<ScannedToken> = old[..prefix].to_vec();

    let mut scanner = Scanner::new(config);
    let mut cursor = match tokens.last() {
        Some(last) => {
            scanner.deserialize_state(&last.state_after)?;
            Cursor::at(new_text, last.token.end_byte, last.token.end)
        }
        None => Cursor::new(new_text),
    };

    let valid = TokenSet::lexical();
    let mut rescanned = 0;
    let mut suffix = 0;
    loop {
        let state_before = scanner.serialize_state();
        let Some(token) = scanner.scan(&mut cursor, valid) else {
            break;
        };
        rescanned += 1;

        if token.start_byte >= edit.new_end_byte {
            let old_start = token.start_byte as isize - edit.delta();
            let found = old[prefix..]
                .binary_search_by_key(&old_start, |t| t.token.start_byte as isize)
                .ok()
                .map(|i| i + prefix);
            if let Some(j) = found.filter(|&j| old[j].state_before == state_before && old[j].valid == valid) {
                suffix = old.len() - j;
                tokens.extend(old[j..].iter().map(|t| t.shifted(edit)));
                break;
            }
        }

        tokens.push(ScannedToken {
            token,
            valid,
            state_before,
            state_after: scanner.serialize_state(),
            lookahead_end: cursor.lookahead_end(),
        });
        if token.kind == TokenKind::Eof {
            break;
        }
    }

    debug!(reused = prefix + suffix, rescanned, "relexed after edit");
    Ok(Relexed {
        tokens,
        reused: prefix + suffix,
        rescanned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use avro_syntax::{Keyword, LexErrorKind, Punct};
    use proptest::prelude::*;

    fn kinds(tokens: &[ScannedToken]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.token.kind).collect()
    }

    fn texts<'a>(tokens: &[ScannedToken], src: &'a str) -> Vec<&'a str> {
        tokens.iter().map(|t| t.token.text(src)).collect()
    }

    #[test]
    fn idl_record_tokens() {
        let src = "/** A thing. */\nrecord Thing { union { null, string } name = null; }";
        let tokens = tokenize(src, ScannerConfig::default());
        assert_eq!(
            texts(&tokens, src),
            [
                "/** A thing. */", "record", "Thing", "{", "union", "{", "null", ",", "string",
                "}", "name", "=", "null", ";", "}", ""
            ]
        );
        assert_eq!(tokens[0].token.kind, TokenKind::DocComment);
        assert_eq!(tokens[1].token.kind, TokenKind::Keyword(Keyword::Record));
        assert_eq!(tokens[1].token.start, Point::new(1, 0));
    }

    #[test]
    fn ranges_are_monotonic_and_disjoint() {
        let src = "protocol P { record R { string s = \"a}b\"; } }";
        let tokens = tokenize(src, ScannerConfig::default());
        for pair in tokens.windows(2) {
            assert!(pair[0].token.end_byte <= pair[1].token.start_byte);
            assert!(pair[0].token.start_byte < pair[1].token.start_byte || pair[1].token.kind == TokenKind::Eof);
        }
    }

    #[test]
    fn unterminated_comment_is_one_error_token_at_the_end() {
        let src = "record R { int x /* unterminated";
        let tokens = tokenize(src, ScannerConfig::default());
        let err = &tokens[tokens.len() - 2];
        assert_eq!(err.token.kind, TokenKind::Error(LexErrorKind::UnterminatedComment));
        assert_eq!(err.token.text(src), "/* unterminated");
        assert_eq!(err.token.end_byte, src.len());
        assert_eq!(tokens.last().map(|t| t.token.kind), Some(TokenKind::Eof));
    }

    #[test]
    fn json_schema_tokens() {
        let src = r#"{"type": "enum", "symbols": ["A", "B"]}"#;
        let tokens = tokenize(src, ScannerConfig::default());
        assert_eq!(tokens[0].token.kind, TokenKind::Punct(Punct::LBrace));
        assert_eq!(tokens[2].token.kind, TokenKind::Punct(Punct::Colon));
        assert_eq!(ScannerState::deserialize(&tokens[0].state_after).map(|s| s.mode), Ok(Mode::Json));
    }

    #[test]
    fn resume_after_editing_a_doc_comment_matches_a_full_scan() {
        let old_src = "/** Greeting record. */\nrecord Greeting {\n  string message;\n}\n";
        let old = tokenize(old_src, ScannerConfig::default());

        let at = old_src.find("record.").map(|i| i + 3).unwrap();
        let edit = InputEdit::replace(old_src, at, at, "X");
        let new_src = edit.apply(old_src, "X");

        let relexed = relex(&old, &edit, &new_src, ScannerConfig::default()).unwrap();
        assert_eq!(relexed.tokens, tokenize(&new_src, ScannerConfig::default()));
        assert_eq!(relexed.rescanned, 2);
        assert_eq!(relexed.reused, old.len() - 1);

        let first = &old[0];
        let resumed = tokenize_from(&new_src, first.token.start_byte, first.token.start, &first.state_before, ScannerConfig::default()).unwrap();
        assert_eq!(resumed, tokenize(&new_src, ScannerConfig::default()));
    }

    #[test]
    fn relex_handles_edits_that_change_token_structure() {
        let old_src = "record R { int a; int b; }";
        let old = tokenize(old_src, ScannerConfig::default());
        for (start, end, text) in [(15, 15, "/*"), (0, 6, "enum"), (11, 14, "\"x"), (25, 26, "")] {
            let edit = InputEdit::replace(old_src, start, end, text);
            let new_src = edit.apply(old_src, text);
            let relexed = relex(&old, &edit, &new_src, ScannerConfig::default()).unwrap();
            assert_eq!(relexed.tokens, tokenize(&new_src, ScannerConfig::default()), "edit {start}..{end} -> {text:?}");
        }
    }

    #[test]
    fn chunked_scan_joins_comment_fragments() {
        let src = "/** a long documentation comment */ record R {}";
        for chunk in 1..12 {
            let chunked = tokenize_chunked(src, chunk, ScannerConfig::default());
            let full = tokenize(src, ScannerConfig::default());
            assert_eq!(kinds(&chunked), kinds(&full), "chunk {chunk}");
            assert_eq!(
                chunked.iter().map(|t| t.token).collect::<Vec<_>>(),
                full.iter().map(|t| t.token).collect::<Vec<_>>()
            );
        }
    }

    fn fragment() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec![
            "record", "protocol", " ", "\n", "\t", "{", "}", "[", "]", "<", ">", "(", ")", ";",
            ",", "=", "?", ":", "/* c */", "/** d */", "// x\n", "\"s}\"", "'q'", "12", "-3.5e2",
            "@a-b", "a.b", "`error`", "é", "/*", "\"open", "#", "null", "int", "x", "*/", "\\",
        ])
    }

    fn source() -> impl Strategy<Value = String> {
        prop::collection::vec(fragment(), 0..40).prop_map(|parts| parts.concat())
    }

    proptest! {
        #[test]
        fn resuming_at_any_boundary_matches_the_full_scan(src in source()) {
            let full = tokenize(&src, ScannerConfig::default());
            prop_assert_eq!(full.last().map(|t| t.token.kind), Some(TokenKind::Eof));
            for (i, t) in full.iter().enumerate() {
                let resumed = tokenize_from(&src, t.token.start_byte, t.token.start, &t.state_before, ScannerConfig::default()).unwrap();
                prop_assert_eq!(&resumed[..], &full[i..]);
            }
        }

        #[test]
        fn chunked_scan_matches_the_full_scan(src in source(), chunk in 1usize..16) {
            let full: Vec<Token> = tokenize(&src, ScannerConfig::default()).iter().map(|t| t.token).collect();
            let chunked: Vec<Token> = tokenize_chunked(&src, chunk, ScannerConfig::default()).iter().map(|t| t.token).collect();
            prop_assert_eq!(chunked, full);
        }

        #[test]
        fn relex_matches_a_full_scan(src in source(), insert in fragment(), at in 0usize..200) {
            let old = tokenize(&src, ScannerConfig::default());
            let mut at = at.min(src.len());
            while !src.is_char_boundary(at) {
                at -= 1;
            }
            let edit = InputEdit::replace(&src, at, at, insert);
            let new_src = edit.apply(&src, insert);
            let relexed = relex(&old, &edit, &new_src, ScannerConfig::default()).unwrap();
            prop_assert_eq!(relexed.tokens, tokenize(&new_src, ScannerConfig::default()));
        }

        #[test]
        fn tokens_stay_inside_the_valid_set(src in source(), bits in any::<u64>()) {
            let valid = TokenSet::lexical().intersection(TokenSet::from_bits(bits));
            let mut scanner = Scanner::default();
            let mut cursor = Cursor::new(&src);
            for _ in 0..64 {
                match scanner.scan(&mut cursor, valid) {
                    Some(t) => {
                        prop_assert!(valid.contains(t.kind));
                        if t.kind == TokenKind::Eof { break; }
                    }
                    None => break,
                }
            }
        }
    }
}
