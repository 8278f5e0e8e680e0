//! The context-sensitive scanner.
//!
//! [`Scanner::scan`] is called once per token with the set of token kinds the
//! parser can accept next. That set is what makes the scanner context
//! sensitive: a word is only a keyword where the keyword is valid, and a `{`
//! only opens an opaque JSON value where a default value is expected.

use avro_syntax::{Keyword, LexErrorKind, Punct, Token, TokenKind, TokenSet};
use tracing::{debug, trace};

use crate::cursor::{Cursor, Mark};
use crate::state::{Bracket, CommentKind, Mode, ScannerConfig, ScannerState, StateError};

/// Outcome of scanning one construct before validity is checked.
type Lexed = Result<TokenKind, LexErrorKind>;

#[derive(Debug, Clone, Default)]
pub struct Scanner {
    state: ScannerState,
    config: ScannerConfig,
}

impl Scanner {
    pub fn new(config: ScannerConfig) -> Self {
        Self {
            state: ScannerState::default(),
            config,
        }
    }

    /// A scanner whose mode is fixed up front instead of inferred.
    pub fn with_mode(config: ScannerConfig, mode: Mode) -> Self {
        Self {
            state: ScannerState::with_mode(mode),
            config,
        }
    }

    pub fn state(&self) -> &ScannerState {
        &self.state
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    pub fn serialize_state(&self) -> Vec<u8> {
        self.state.serialize()
    }

    pub fn deserialize_state(&mut self, bytes: &[u8]) -> Result<(), StateError> {
        let state = ScannerState::deserialize(bytes)?;
        let max = self.config.effective_max_depth();
        if state.depth() > max {
            return Err(StateError::DepthExceeded {
                depth: state.depth(),
                max,
            });
        }
        self.state = state;
        Ok(())
    }

    /// Scans the next token whose kind is in `valid`.
    ///
    /// Returns `None` without consuming input when nothing in `valid` starts
    /// at the cursor, or when the token would run past a bounded cursor
    /// window before the real end of the text.
    pub fn scan(&mut self, cursor: &mut Cursor<'_>, valid: TokenSet) -> Option<Token> {
        cursor.begin_scan();
        let origin = cursor.mark();

        if let Some(kind) = self.state.comment {
            return self.continue_comment(cursor, kind, valid);
        }

        cursor.advance_while(is_space);
        let start = cursor.mark();
        let c = match cursor.peek() {
            Some(c) => c,
            None => {
                if cursor.at_eof() && valid.contains(TokenKind::Eof) {
                    return Some(cursor.token_from(start, TokenKind::Eof));
                }
                cursor.reset(origin);
                return None;
            }
        };

        if c == '/' && matches!(cursor.peek_nth(1), Some('/') | Some('*')) {
            return self.scan_comment(cursor, origin, start, valid);
        }

        let lexed = if valid.contains(TokenKind::JsonSpan) && starts_json_value(c) {
            match self.scan_json_value(cursor) {
                Some(result) => result,
                None => {
                    // a bare word that is not a JSON literal
                    cursor.reset(start);
                    self.lex_fixed(cursor, c, valid)
                }
            }
        } else {
            self.lex_fixed(cursor, c, valid)
        };

        if cursor.hit_limit() {
            cursor.reset(origin);
            return None;
        }

        let kind = match lexed {
            Ok(kind) if valid.contains(kind) => kind,
            Ok(_) => {
                cursor.reset(origin);
                return None;
            }
            Err(err) => {
                let kind = TokenKind::Error(err);
                if !valid.contains(kind) {
                    cursor.reset(origin);
                    return None;
                }
                debug!(error = %err, byte = start.byte(), "lexical error");
                kind
            }
        };

        let inferred = self.inferred_mode(&cursor.token_from(start, kind), cursor.text());
        let kind = self.track_structure(kind);
        if !valid.contains(kind) {
            cursor.reset(origin);
            return None;
        }
        if let Some(mode) = inferred {
            debug!(mode = %mode, byte = start.byte(), "inferred scanner mode");
            self.state.mode = mode;
        }
        let token = cursor.token_from(start, kind);
        trace!(kind = %token.kind, start = token.start_byte, end = token.end_byte, "token");
        Some(token)
    }

    /// The mode a token settles, if the mode is still open and the token
    /// sits at the top level.
    fn inferred_mode(&self, token: &Token, text: &str) -> Option<Mode> {
        if self.state.mode != Mode::Unknown || !self.state.stack.is_empty() {
            return None;
        }
        match token.kind {
            TokenKind::Punct(Punct::LBrace) | TokenKind::Punct(Punct::LBracket) => Some(Mode::Json),
            TokenKind::String if token.text(text).starts_with('"') => Some(Mode::Json),
            TokenKind::Keyword(_) | TokenKind::Identifier | TokenKind::Annotation => Some(Mode::Idl),
            _ => None,
        }
    }

    /// Maintains the bracket stack and enforces the nesting cap.
    fn track_structure(&mut self, kind: TokenKind) -> TokenKind {
        let TokenKind::Punct(p) = kind else {
            return kind;
        };
        let (open, close) = match p {
            Punct::LBrace => (Some(Bracket::Brace), None),
            Punct::LBracket => (Some(Bracket::Bracket), None),
            Punct::LParen => (Some(Bracket::Paren), None),
            Punct::LAngle => (Some(Bracket::Angle), None),
            Punct::RBrace => (None, Some(Bracket::Brace)),
            Punct::RBracket => (None, Some(Bracket::Bracket)),
            Punct::RParen => (None, Some(Bracket::Paren)),
            Punct::RAngle => (None, Some(Bracket::Angle)),
            _ => (None, None),
        };
        if let Some(b) = open {
            if self.state.stack.len() >= self.config.effective_max_depth() {
                debug!(depth = self.state.stack.len(), "nesting depth exceeded");
                return TokenKind::Error(LexErrorKind::DepthExceeded);
            }
            self.state.stack.push(b);
        } else if let Some(b) = close {
            if let Some(at) = self.state.stack.iter().rposition(|open| *open == b) {
                self.state.stack.truncate(at);
            }
        }
        kind
    }

    fn scan_comment(
        &mut self,
        cursor: &mut Cursor<'_>,
        origin: Mark,
        start: Mark,
        valid: TokenSet,
    ) -> Option<Token> {
        cursor.advance();
        if cursor.eat('/') {
            if !valid.contains(TokenKind::Comment) {
                cursor.reset(origin);
                return None;
            }
            cursor.advance_while(|c| !matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}'));
            if cursor.hit_limit() {
                cursor.reset(origin);
                return None;
            }
            return Some(cursor.token_from(start, TokenKind::Comment));
        }

        cursor.advance(); // '*'
        let doc = self.state.mode != Mode::Json
            && cursor.peek() == Some('*')
            && cursor.peek_nth(1) != Some('/');
        if cursor.hit_limit() {
            cursor.reset(origin);
            return None;
        }
        let kind = if doc && valid.contains(TokenKind::DocComment) {
            CommentKind::Doc
        } else {
            CommentKind::Block
        };
        if !valid.contains(comment_token(kind)) {
            cursor.reset(origin);
            return None;
        }
        self.finish_comment(cursor, origin, start, kind, valid)
    }

    fn continue_comment(
        &mut self,
        cursor: &mut Cursor<'_>,
        kind: CommentKind,
        valid: TokenSet,
    ) -> Option<Token> {
        let start = cursor.mark();
        if !valid.contains(comment_token(kind)) {
            return None;
        }
        self.finish_comment(cursor, start, start, kind, valid)
    }

    /// Consumes a block comment body up to and including the first `*/`.
    fn finish_comment(
        &mut self,
        cursor: &mut Cursor<'_>,
        origin: Mark,
        start: Mark,
        kind: CommentKind,
        valid: TokenSet,
    ) -> Option<Token> {
        let mut before_star = None;
        loop {
            match cursor.peek() {
                Some('*') => {
                    before_star = Some(cursor.mark());
                    cursor.advance();
                    if cursor.eat('/') {
                        self.state.comment = None;
                        return Some(cursor.token_from(start, comment_token(kind)));
                    }
                }
                Some(_) => {
                    cursor.advance();
                }
                None if cursor.at_eof() => {
                    self.state.comment = None;
                    let err = TokenKind::Error(LexErrorKind::UnterminatedComment);
                    if !valid.contains(err) {
                        cursor.reset(origin);
                        return None;
                    }
                    debug!(byte = start.byte(), "unterminated comment");
                    return Some(cursor.token_from(start, err));
                }
                None => {
                    // the window ends inside the comment: emit what we have
                    // and carry on from the next window
                    if let Some(star) = before_star.filter(|m| m.byte() + 1 == cursor.byte()) {
                        cursor.reset(star);
                    }
                    if cursor.byte() == start.byte() {
                        cursor.reset(origin);
                        return None;
                    }
                    self.state.comment = Some(kind);
                    return Some(cursor.token_from(start, comment_token(kind)));
                }
            }
        }
    }

    /// Tokens with a fixed lexical shape.
    fn lex_fixed(&mut self, cursor: &mut Cursor<'_>, c: char, valid: TokenSet) -> Lexed {
        if let Some(p) = Punct::from_char(c) {
            cursor.advance();
            return Ok(TokenKind::Punct(p));
        }
        match c {
            '"' => self.lex_string(cursor, '"'),
            '\'' if self.state.mode != Mode::Json => self.lex_string(cursor, '\''),
            '`' => lex_escaped_identifier(cursor),
            '@' => lex_annotation(cursor),
            c if c.is_ascii_digit() => lex_number(cursor),
            '-' | '+' | '.' if starts_number(cursor) => lex_number(cursor),
            c if is_ident_start(c) => Ok(lex_word(cursor, valid)),
            _ => {
                cursor.advance();
                Err(LexErrorKind::UnexpectedCharacter)
            }
        }
    }

    fn lex_string(&mut self, cursor: &mut Cursor<'_>, quote: char) -> Lexed {
        cursor.advance();
        loop {
            match cursor.peek() {
                Some(c) if c == quote => {
                    cursor.advance();
                    return Ok(TokenKind::String);
                }
                Some('\\') => {
                    cursor.advance();
                    match cursor.peek() {
                        None | Some('\n') => return Err(LexErrorKind::UnterminatedString),
                        Some(_) => {
                            cursor.advance();
                        }
                    }
                }
                Some('\n') | None => return Err(LexErrorKind::UnterminatedString),
                Some(_) => {
                    cursor.advance();
                }
            }
        }
    }

    /// Scans one complete JSON value. Returns `None` when the text at the
    /// cursor is a bare word rather than a JSON literal.
    fn scan_json_value(&mut self, cursor: &mut Cursor<'_>) -> Option<Lexed> {
        #[derive(Clone, Copy, PartialEq)]
        enum Expect {
            Value,
            ValueOrClose,
            KeyOrClose,
            Colon,
            CommaOrClose,
        }

        let max = self.config.effective_max_depth();
        let mut stack: Vec<char> = Vec::new();
        let mut expect = Expect::Value;
        let mut first = true;
        let mut last_end = cursor.mark();

        loop {
            if !first {
                cursor.advance_while(is_json_space);
            }
            let c = cursor.peek();
            let before = cursor.mark();
            let step: Result<bool, LexErrorKind> = match (expect, c) {
                (Expect::Value | Expect::ValueOrClose, Some(open @ ('{' | '['))) => {
                    if self.state.stack.len() + stack.len() >= max {
                        Err(LexErrorKind::DepthExceeded)
                    } else {
                        cursor.advance();
                        stack.push(open);
                        expect = if open == '{' { Expect::KeyOrClose } else { Expect::ValueOrClose };
                        Ok(false)
                    }
                }
                (Expect::Value | Expect::ValueOrClose, Some('"')) => {
                    json_string(cursor).map(|_| true)
                }
                (Expect::Value | Expect::ValueOrClose, Some(c)) if c == '-' || c.is_ascii_digit() => {
                    json_number(cursor).map(|_| true)
                }
                (Expect::Value | Expect::ValueOrClose, Some(c)) if c.is_alphabetic() => {
                    cursor.advance_while(is_ident_continue);
                    match cursor.slice_from(before) {
                        "true" | "false" | "null" => Ok(true),
                        _ if first => return None,
                        _ => {
                            cursor.reset(before);
                            Err(LexErrorKind::UnbalancedJson)
                        }
                    }
                }
                (Expect::ValueOrClose, Some(']')) => {
                    cursor.advance();
                    stack.pop();
                    Ok(true)
                }
                (Expect::KeyOrClose, Some('"')) => json_string(cursor).map(|_| {
                    expect = Expect::Colon;
                    false
                }),
                (Expect::KeyOrClose, Some('}')) => {
                    cursor.advance();
                    stack.pop();
                    Ok(true)
                }
                (Expect::Colon, Some(':')) => {
                    cursor.advance();
                    expect = Expect::Value;
                    Ok(false)
                }
                (Expect::CommaOrClose, Some(',')) => {
                    cursor.advance();
                    expect = if stack.last() == Some(&'{') { Expect::KeyOrClose } else { Expect::ValueOrClose };
                    Ok(false)
                }
                (Expect::CommaOrClose, Some(close @ ('}' | ']')))
                    if stack.last() == Some(&if close == '}' { '{' } else { '[' }) =>
                {
                    cursor.advance();
                    stack.pop();
                    Ok(true)
                }
                _ => Err(LexErrorKind::UnbalancedJson),
            };
            first = false;

            match step {
                Ok(value_done) => {
                    last_end = cursor.mark();
                    if value_done {
                        if stack.is_empty() {
                            return Some(Ok(TokenKind::JsonSpan));
                        }
                        expect = Expect::CommaOrClose;
                    }
                }
                Err(err) => {
                    // strings and numbers bound their own errors; structural
                    // errors end after the last well formed piece
                    if matches!(err, LexErrorKind::UnbalancedJson | LexErrorKind::DepthExceeded)
                        || cursor.byte() == before.byte()
                    {
                        cursor.reset(last_end);
                    }
                    if cursor.byte() == before.byte() && before.byte() == last_end.byte() && stack.is_empty() {
                        cursor.advance();
                    }
                    return Some(Err(err));
                }
            }
        }
    }
}

fn comment_token(kind: CommentKind) -> TokenKind {
    match kind {
        CommentKind::Block => TokenKind::Comment,
        CommentKind::Doc => TokenKind::DocComment,
    }
}

fn is_space(c: char) -> bool {
    c.is_whitespace() || matches!(c, '\u{FEFF}' | '\u{2060}' | '\u{200B}')
}

fn is_json_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

fn starts_json_value(c: char) -> bool {
    matches!(c, '{' | '[' | '"' | '-') || c.is_ascii_digit() || c.is_alphabetic()
}

/// Characters that can never be part of a name.
fn is_reserved(c: char) -> bool {
    c.is_control()
        || is_space(c)
        || matches!(
            c,
            ':' | ';' | '"' | '\'' | '@' | '#' | '.' | ',' | '|' | '^' | '&' | '<' | '=' | '>'
                | '+' | '-' | '*' | '/' | '\\' | '%' | '?' | '!' | '~' | '(' | ')' | '['
                | ']' | '{' | '}' | '`'
        )
}

pub(crate) fn is_ident_start(c: char) -> bool {
    !c.is_ascii_digit() && !is_reserved(c)
}

pub(crate) fn is_ident_continue(c: char) -> bool {
    !is_reserved(c)
}

/// A name, possibly dotted, reported as a keyword only where one is valid.
fn lex_word(cursor: &mut Cursor<'_>, valid: TokenSet) -> TokenKind {
    let start = cursor.mark();
    cursor.advance_while(is_ident_continue);
    let mut dotted = false;
    while cursor.peek() == Some('.') && cursor.peek_nth(1).map_or(false, is_ident_start) {
        cursor.advance();
        cursor.advance_while(is_ident_continue);
        dotted = true;
    }
    if dotted {
        return TokenKind::Identifier;
    }
    match Keyword::from_word(cursor.slice_from(start)) {
        Some(k) if valid.contains(TokenKind::Keyword(k)) => TokenKind::Keyword(k),
        Some(k) if !valid.contains(TokenKind::Identifier) => TokenKind::Keyword(k),
        _ => TokenKind::Identifier,
    }
}

fn lex_escaped_identifier(cursor: &mut Cursor<'_>) -> Lexed {
    let start = cursor.mark();
    cursor.advance();
    let n = cursor.advance_while(is_ident_continue);
    if n > 0 && cursor.eat('`') {
        return Ok(TokenKind::Identifier);
    }
    cursor.reset(start);
    cursor.advance();
    Err(LexErrorKind::UnexpectedCharacter)
}

fn lex_annotation(cursor: &mut Cursor<'_>) -> Lexed {
    cursor.advance();
    match cursor.peek() {
        Some(c) if is_ident_start(c) => {
            cursor.advance_while(|c| is_ident_continue(c) || c == '-' || c == '.');
            Ok(TokenKind::Annotation)
        }
        _ => Err(LexErrorKind::UnexpectedCharacter),
    }
}

fn starts_number(cursor: &mut Cursor<'_>) -> bool {
    match (cursor.peek(), cursor.peek_nth(1)) {
        (Some('.'), Some(d)) => d.is_ascii_digit(),
        (Some('-' | '+'), Some('.')) => cursor.peek_nth(2).map_or(false, |d| d.is_ascii_digit()),
        (Some('-' | '+'), Some(d)) => d.is_ascii_digit(),
        _ => false,
    }
}

/// Digits with single `_` separators. Returns the count of digits.
fn digits(cursor: &mut Cursor<'_>) -> Result<usize, LexErrorKind> {
    let mut n = 0;
    loop {
        n += cursor.advance_while(|c| c.is_ascii_digit());
        if cursor.peek() == Some('_') && n > 0 {
            cursor.advance();
            if !cursor.peek().map_or(false, |c| c.is_ascii_digit()) {
                return Err(LexErrorKind::InvalidNumber);
            }
        } else {
            return Ok(n);
        }
    }
}

fn lex_number(cursor: &mut Cursor<'_>) -> Lexed {
    if matches!(cursor.peek(), Some('-' | '+')) {
        cursor.advance();
    }
    let whole = digits(cursor)?;
    let mut frac = 0;
    if cursor.eat('.') {
        frac = digits(cursor)?;
    }
    if whole + frac == 0 {
        return Err(LexErrorKind::InvalidNumber);
    }
    exponent(cursor)?;
    Ok(TokenKind::Number)
}

fn exponent(cursor: &mut Cursor<'_>) -> Result<(), LexErrorKind> {
    if matches!(cursor.peek(), Some('e' | 'E')) {
        cursor.advance();
        if matches!(cursor.peek(), Some('-' | '+')) {
            cursor.advance();
        }
        if digits(cursor)? == 0 {
            return Err(LexErrorKind::InvalidNumber);
        }
    }
    Ok(())
}

/// A JSON string with escapes, including `\uXXXX`.
fn json_string(cursor: &mut Cursor<'_>) -> Result<(), LexErrorKind> {
    cursor.advance();
    loop {
        match cursor.peek() {
            Some('"') => {
                cursor.advance();
                return Ok(());
            }
            Some('\\') => {
                cursor.advance();
                match cursor.peek() {
                    Some('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't') => {
                        cursor.advance();
                    }
                    Some('u') => {
                        cursor.advance();
                        for _ in 0..4 {
                            match cursor.peek() {
                                Some(h) if h.is_ascii_hexdigit() => {
                                    cursor.advance();
                                }
                                _ => return Err(LexErrorKind::InvalidEscape),
                            }
                        }
                    }
                    Some('\n') | None => return Err(LexErrorKind::UnterminatedString),
                    Some(_) => {
                        cursor.advance();
                        return Err(LexErrorKind::InvalidEscape);
                    }
                }
            }
            Some('\n') | None => return Err(LexErrorKind::UnterminatedString),
            Some(_) => {
                cursor.advance();
            }
        }
    }
}

/// A JSON number: `-? (0 | [1-9][0-9]*) (. [0-9]+)? ([eE] [+-]? [0-9]+)?`.
fn json_number(cursor: &mut Cursor<'_>) -> Result<(), LexErrorKind> {
    cursor.eat('-');
    match cursor.peek() {
        Some('0') => {
            cursor.advance();
        }
        Some(c) if c.is_ascii_digit() => {
            cursor.advance_while(|c| c.is_ascii_digit());
        }
        _ => return Err(LexErrorKind::InvalidNumber),
    }
    if cursor.eat('.') && cursor.advance_while(|c| c.is_ascii_digit()) == 0 {
        return Err(LexErrorKind::InvalidNumber);
    }
    if matches!(cursor.peek(), Some('e' | 'E')) {
        cursor.advance();
        if matches!(cursor.peek(), Some('-' | '+')) {
            cursor.advance();
        }
        if cursor.advance_while(|c| c.is_ascii_digit()) == 0 {
            return Err(LexErrorKind::InvalidNumber);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_one(text: &str, valid: TokenSet) -> Option<(TokenKind, String)> {
        let mut scanner = Scanner::default();
        let mut cursor = Cursor::new(text);
        scanner
            .scan(&mut cursor, valid.union(TokenSet::ambient()))
            .map(|t| (t.kind, t.text(text).to_string()))
    }

    #[test]
    fn keywords_are_contextual() {
        let kw = TokenKind::Keyword(Keyword::Record);
        let both = TokenSet::of(&[kw, TokenKind::Identifier]);
        assert_eq!(scan_one("record R", both).map(|t| t.0), Some(kw));
        let only_ident = TokenSet::single(TokenKind::Identifier);
        assert_eq!(scan_one("record R", only_ident).map(|t| t.0), Some(TokenKind::Identifier));
        assert_eq!(scan_one("recordx", both).map(|t| t.0), Some(TokenKind::Identifier));
    }

    #[test]
    fn dotted_and_escaped_identifiers() {
        let set = TokenSet::single(TokenKind::Identifier);
        assert_eq!(scan_one("com.acme.User x", set).map(|t| t.1), Some("com.acme.User".into()));
        assert_eq!(scan_one("`error` x", set).map(|t| t.1), Some("`error`".into()));
        assert_eq!(scan_one("a.;", set).map(|t| t.1), Some("a".into()));
    }

    #[test]
    fn annotations_allow_dashes_and_dots() {
        let set = TokenSet::single(TokenKind::Annotation);
        assert_eq!(scan_one("@java-class(\"x\")", set).map(|t| t.1), Some("@java-class".into()));
        assert_eq!(scan_one("@ x", set).map(|t| t.0), Some(TokenKind::Error(LexErrorKind::UnexpectedCharacter)));
    }

    #[test]
    fn numbers_follow_the_literal_shape() {
        let set = TokenSet::single(TokenKind::Number);
        for ok in ["0", "12", "-3", "+4", "1_000", "1.5", ".5", "1.", "2e10", "2.5E-3"] {
            assert_eq!(scan_one(ok, set).map(|t| (t.0, t.1)), Some((TokenKind::Number, ok.to_string())), "{ok}");
        }
        assert_eq!(scan_one("1__0", set).map(|t| t.0), Some(TokenKind::Error(LexErrorKind::InvalidNumber)));
        assert_eq!(scan_one("1e", set).map(|t| t.0), Some(TokenKind::Error(LexErrorKind::InvalidNumber)));
    }

    #[test]
    fn strings_in_both_quotes_with_escapes() {
        let set = TokenSet::single(TokenKind::String);
        assert_eq!(scan_one(r#""a\"b" x"#, set).map(|t| t.1), Some(r#""a\"b""#.into()));
        assert_eq!(scan_one("'single'", set).map(|t| t.0), Some(TokenKind::String));
        assert_eq!(
            scan_one("\"open\nnext", set).map(|t| (t.0, t.1)),
            Some((TokenKind::Error(LexErrorKind::UnterminatedString), "\"open".into()))
        );
    }

    #[test]
    fn json_span_is_one_token() {
        let set = TokenSet::single(TokenKind::JsonSpan);
        let text = r#"{"a": [1, {"b": "}]"}], "c": null} ;"#;
        assert_eq!(
            scan_one(text, set).map(|t| (t.0, t.1)),
            Some((TokenKind::JsonSpan, r#"{"a": [1, {"b": "}]"}], "c": null}"#.into()))
        );
        assert_eq!(scan_one(r#""éx""#, set).map(|t| t.0), Some(TokenKind::JsonSpan));
        assert_eq!(scan_one("-1.5e3", set).map(|t| t.0), Some(TokenKind::JsonSpan));
        assert_eq!(scan_one("[]", set).map(|t| t.1), Some("[]".into()));
        assert_eq!(scan_one(r#"{"a": [1, 2,],} ;"#, set).map(|t| t.0), Some(TokenKind::JsonSpan));
    }

    #[test]
    fn json_span_errors_stop_at_the_failure() {
        let set = TokenSet::single(TokenKind::JsonSpan);
        assert_eq!(
            scan_one(r#"{"a": 1 ;"#, set).map(|t| (t.0, t.1)),
            Some((TokenKind::Error(LexErrorKind::UnbalancedJson), r#"{"a": 1"#.into()))
        );
        assert_eq!(
            scan_one(r#""bad \q""#, set).map(|t| t.0),
            Some(TokenKind::Error(LexErrorKind::InvalidEscape))
        );
        assert_eq!(
            scan_one(r#"[1, "\u12G4"]"#, set).map(|t| t.0),
            Some(TokenKind::Error(LexErrorKind::InvalidEscape))
        );
    }

    #[test]
    fn bare_word_falls_through_to_identifier() {
        let set = TokenSet::of(&[TokenKind::JsonSpan, TokenKind::Identifier]);
        assert_eq!(scan_one("RED;", set).map(|t| (t.0, t.1)), Some((TokenKind::Identifier, "RED".into())));
        assert_eq!(scan_one("null;", set).map(|t| t.0), Some(TokenKind::JsonSpan));
    }

    #[test]
    fn doc_comments_only_outside_json_mode() {
        let text = "/** doc */";
        assert_eq!(scan_one(text, TokenSet::EMPTY).map(|t| t.0), Some(TokenKind::DocComment));
        assert_eq!(scan_one("/**/", TokenSet::EMPTY).map(|t| t.0), Some(TokenKind::Comment));

        let mut scanner = Scanner::with_mode(ScannerConfig::default(), Mode::Json);
        let mut cursor = Cursor::new(text);
        let token = scanner.scan(&mut cursor, TokenSet::ambient());
        assert_eq!(token.map(|t| t.kind), Some(TokenKind::Comment));
    }

    #[test]
    fn unterminated_comment_runs_to_end_of_input() {
        let text = "/* open";
        let got = scan_one(text, TokenSet::EMPTY);
        assert_eq!(got, Some((TokenKind::Error(LexErrorKind::UnterminatedComment), text.into())));
    }

    #[test]
    fn never_returns_kinds_outside_the_valid_set() {
        let mut scanner = Scanner::default();
        let mut cursor = Cursor::new(";");
        let valid = TokenSet::single(TokenKind::Identifier);
        assert_eq!(scanner.scan(&mut cursor, valid), None);
        assert_eq!(cursor.byte(), 0);
    }

    #[test]
    fn mode_is_inferred_from_first_structural_token() {
        let mut scanner = Scanner::default();
        let mut cursor = Cursor::new("// c\n{\"type\": \"int\"}");
        scanner.scan(&mut cursor, TokenSet::lexical());
        assert_eq!(scanner.mode(), Mode::Unknown);
        scanner.scan(&mut cursor, TokenSet::lexical());
        assert_eq!(scanner.mode(), Mode::Json);

        let mut scanner = Scanner::default();
        let mut cursor = Cursor::new("protocol P {}");
        scanner.scan(&mut cursor, TokenSet::lexical());
        assert_eq!(scanner.mode(), Mode::Idl);
    }

    #[test]
    fn nesting_beyond_the_cap_is_a_local_error() {
        let mut scanner = Scanner::new(ScannerConfig::new(2));
        let mut cursor = Cursor::new("{{{}}}");
        let kinds: Vec<TokenKind> = (0..3)
            .filter_map(|_| scanner.scan(&mut cursor, TokenSet::lexical()))
            .map(|t| t.kind)
            .collect();
        assert_eq!(kinds[2], TokenKind::Error(LexErrorKind::DepthExceeded));
        assert_eq!(scanner.state().depth(), 2);

        let set = TokenSet::single(TokenKind::JsonSpan);
        let mut scanner = Scanner::new(ScannerConfig::new(2));
        let mut cursor = Cursor::new("[[[1]]]");
        let token = scanner.scan(&mut cursor, set.union(TokenSet::ambient()));
        assert_eq!(token.map(|t| t.kind), Some(TokenKind::Error(LexErrorKind::DepthExceeded)));
    }

    #[test]
    fn bounded_window_defers_tokens_that_cross_it() {
        let text = "record Rec";
        let mut scanner = Scanner::default();
        let mut cursor = Cursor::new(text).with_limit(9);
        let first = scanner.scan(&mut cursor, TokenSet::lexical());
        assert_eq!(first.map(|t| t.end_byte), Some(6));
        assert_eq!(scanner.scan(&mut cursor, TokenSet::lexical()), None);
        assert!(cursor.hit_limit());
        assert_eq!(cursor.byte(), 6);
    }

    #[test]
    fn block_comment_fragments_carry_state() {
        let text = "/* abc def */ x";
        let mut scanner = Scanner::default();
        let mut cursor = Cursor::new(text).with_limit(7);
        let frag = scanner.scan(&mut cursor, TokenSet::lexical());
        assert_eq!(frag.map(|t| (t.kind, t.end_byte)), Some((TokenKind::Comment, 7)));
        assert_eq!(scanner.state().comment, Some(CommentKind::Block));

        cursor.set_limit(text.len());
        let rest = scanner.scan(&mut cursor, TokenSet::lexical());
        assert_eq!(rest.map(|t| t.text(text).to_string()), Some("def */".to_string()));
        assert_eq!(scanner.state().comment, None);
    }
}
