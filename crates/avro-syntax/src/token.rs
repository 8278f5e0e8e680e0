//! Token definitions for Avro schema and IDL text.
//!
//! Tokens are the unit the scanner hands to the parser. Every token records
//! its byte range and its start and end [`Point`]s so that syntax tree nodes
//! built from tokens can be mapped back to editor positions.
//!
//! # Token Categories
//!
//! - **Identifiers**: type and field names (`Greeting`, `com.acme.User`)
//! - **Keywords**: reserved words of the IDL (`record`, `protocol`, `union`)
//! - **Punctuation**: structural characters (`{`, `<`, `;`)
//! - **Literals**: strings, numbers and opaque JSON default-value spans
//! - **Trivia**: comments and documentation comments
//! - **Special**: annotation markers, end of input and lexical errors
//!
//! # Examples
//!
//! ```rust
//! use avro_syntax::{Keyword, Point, Token, TokenKind, TokenSet};
//!
//! let record = Token {
//!     kind: TokenKind::Keyword(Keyword::Record),
//!     start_byte: 0,
//!     end_byte: 6,
//!     start: Point::new(0, 0),
//!     end: Point::new(0, 6),
//! };
//! assert_eq!(record.text("record R {}"), "record");
//!
//! let valid = TokenSet::of(&[TokenKind::Identifier, TokenKind::Keyword(Keyword::Record)]);
//! assert!(valid.contains(record.kind));
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::position::{Point, Range};

/// Reserved words of Avro IDL.
///
/// Keywords are contextual: the scanner only reports a keyword when the
/// parser says the keyword is acceptable at the current position. Anywhere
/// else the same word is an ordinary identifier, so `int record;` declares a
/// field called `record`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Keyword {
    Protocol,
    Namespace,
    Schema,
    Import,
    Record,
    Error,
    Enum,
    Fixed,
    Throws,
    Oneway,
    Void,
    Array,
    Map,
    Union,
    True,
    False,
    Null,
    Int,
    Long,
    String,
    Boolean,
    Float,
    Double,
    Bytes,
    Decimal,
    Date,
    TimeMs,
    TimeMicros,
    TimestampMs,
    TimestampMicros,
    LocalTimestampMs,
    LocalTimestampMicros,
    Uuid,
}

impl Keyword {
    pub const COUNT: usize = 33;

    pub const ALL: [Keyword; Keyword::COUNT] = [
        Keyword::Protocol,
        Keyword::Namespace,
        Keyword::Schema,
        Keyword::Import,
        Keyword::Record,
        Keyword::Error,
        Keyword::Enum,
        Keyword::Fixed,
        Keyword::Throws,
        Keyword::Oneway,
        Keyword::Void,
        Keyword::Array,
        Keyword::Map,
        Keyword::Union,
        Keyword::True,
        Keyword::False,
        Keyword::Null,
        Keyword::Int,
        Keyword::Long,
        Keyword::String,
        Keyword::Boolean,
        Keyword::Float,
        Keyword::Double,
        Keyword::Bytes,
        Keyword::Decimal,
        Keyword::Date,
        Keyword::TimeMs,
        Keyword::TimeMicros,
        Keyword::TimestampMs,
        Keyword::TimestampMicros,
        Keyword::LocalTimestampMs,
        Keyword::LocalTimestampMicros,
        Keyword::Uuid,
    ];

    /// Primitive type names, usable both as IDL keywords and JSON type strings.
    pub const PRIMITIVES: [Keyword; 8] = [
        Keyword::Null,
        Keyword::Boolean,
        Keyword::Int,
        Keyword::Long,
        Keyword::Float,
        Keyword::Double,
        Keyword::Bytes,
        Keyword::String,
    ];

    /// Logical type shorthands of the IDL (`decimal` has its own production).
    pub const LOGICAL: [Keyword; 8] = [
        Keyword::Date,
        Keyword::TimeMs,
        Keyword::TimeMicros,
        Keyword::TimestampMs,
        Keyword::TimestampMicros,
        Keyword::LocalTimestampMs,
        Keyword::LocalTimestampMicros,
        Keyword::Uuid,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Protocol => "protocol",
            Keyword::Namespace => "namespace",
            Keyword::Schema => "schema",
            Keyword::Import => "import",
            Keyword::Record => "record",
            Keyword::Error => "error",
            Keyword::Enum => "enum",
            Keyword::Fixed => "fixed",
            Keyword::Throws => "throws",
            Keyword::Oneway => "oneway",
            Keyword::Void => "void",
            Keyword::Array => "array",
            Keyword::Map => "map",
            Keyword::Union => "union",
            Keyword::True => "true",
            Keyword::False => "false",
            Keyword::Null => "null",
            Keyword::Int => "int",
            Keyword::Long => "long",
            Keyword::String => "string",
            Keyword::Boolean => "boolean",
            Keyword::Float => "float",
            Keyword::Double => "double",
            Keyword::Bytes => "bytes",
            Keyword::Decimal => "decimal",
            Keyword::Date => "date",
            Keyword::TimeMs => "time_ms",
            Keyword::TimeMicros => "time_micros",
            Keyword::TimestampMs => "timestamp_ms",
            Keyword::TimestampMicros => "timestamp_micros",
            Keyword::LocalTimestampMs => "local_timestamp_ms",
            Keyword::LocalTimestampMicros => "local_timestamp_micros",
            Keyword::Uuid => "uuid",
        }
    }

    /// Looks up the keyword spelled by `word`, if any.
    pub fn from_word(word: &str) -> Option<Keyword> {
        Keyword::ALL.iter().copied().find(|k| k.as_str() == word)
    }

    pub fn is_primitive(self) -> bool {
        Keyword::PRIMITIVES.contains(&self)
    }

    pub fn is_logical(self) -> bool {
        Keyword::LOGICAL.contains(&self)
    }
}

/// Punctuation recognised by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Punct {
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    LAngle,
    RAngle,
    Comma,
    Semicolon,
    Equals,
    Question,
    Colon,
}

impl Punct {
    pub const COUNT: usize = 13;

    pub const ALL: [Punct; Punct::COUNT] = [
        Punct::LBrace,
        Punct::RBrace,
        Punct::LBracket,
        Punct::RBracket,
        Punct::LParen,
        Punct::RParen,
        Punct::LAngle,
        Punct::RAngle,
        Punct::Comma,
        Punct::Semicolon,
        Punct::Equals,
        Punct::Question,
        Punct::Colon,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Punct::LBrace => "{",
            Punct::RBrace => "}",
            Punct::LBracket => "[",
            Punct::RBracket => "]",
            Punct::LParen => "(",
            Punct::RParen => ")",
            Punct::LAngle => "<",
            Punct::RAngle => ">",
            Punct::Comma => ",",
            Punct::Semicolon => ";",
            Punct::Equals => "=",
            Punct::Question => "?",
            Punct::Colon => ":",
        }
    }

    pub fn from_char(c: char) -> Option<Punct> {
        Punct::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().starts_with(c))
    }
}

/// Why the scanner produced an [`TokenKind::Error`] token.
///
/// Every lexical error is local: the scanner bounds the error token at the
/// point of failure and carries on from there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum LexErrorKind {
    #[error("unexpected character")]
    UnexpectedCharacter,
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated comment")]
    UnterminatedComment,
    #[error("invalid escape sequence")]
    InvalidEscape,
    #[error("invalid number literal")]
    InvalidNumber,
    #[error("unbalanced JSON value")]
    UnbalancedJson,
    #[error("nesting depth limit exceeded")]
    DepthExceeded,
}

impl LexErrorKind {
    /// Errors that stop at end of input rather than at an offending character.
    pub fn ends_at_failure(self) -> bool {
        matches!(
            self,
            LexErrorKind::UnterminatedString | LexErrorKind::UnterminatedComment
        )
    }

    pub fn is_resource_limit(self) -> bool {
        matches!(self, LexErrorKind::DepthExceeded)
    }
}

/// Token types produced by the Avro scanner.
///
/// # Variant Categories
///
/// ## Words
/// - [`Identifier`](TokenKind::Identifier): names, possibly dotted
/// - [`Keyword`](TokenKind::Keyword): reserved words valid at this position
///
/// ## Literals
/// - [`String`](TokenKind::String): `"..."` or `'...'`
/// - [`Number`](TokenKind::Number): integer or decimal literals
/// - [`JsonSpan`](TokenKind::JsonSpan): a complete JSON value scanned as one
///   opaque token (field defaults and annotation arguments)
///
/// ## Trivia
/// - [`Comment`](TokenKind::Comment) and [`DocComment`](TokenKind::DocComment)
///
/// ## Special
/// - [`Annotation`](TokenKind::Annotation): an `@name` marker
/// - [`Eof`](TokenKind::Eof): end of input, zero width
/// - [`Error`](TokenKind::Error): a lexical error bounded at the failure point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Identifier,
    Keyword(Keyword),
    Punct(Punct),
    Comment,
    DocComment,
    String,
    JsonSpan,
    Number,
    Annotation,
    Eof,
    Error(LexErrorKind),
}

const KEYWORD_BASE: u32 = 9;
const PUNCT_BASE: u32 = KEYWORD_BASE + Keyword::COUNT as u32;

/// Number of distinct token kinds tracked by a [`TokenSet`].
pub const TOKEN_KIND_COUNT: u32 = PUNCT_BASE + Punct::COUNT as u32;

impl TokenKind {
    /// Dense index used by [`TokenSet`]. Error payloads share one slot.
    pub fn index(self) -> u32 {
        match self {
            TokenKind::Identifier => 0,
            TokenKind::Comment => 1,
            TokenKind::DocComment => 2,
            TokenKind::String => 3,
            TokenKind::JsonSpan => 4,
            TokenKind::Number => 5,
            TokenKind::Annotation => 6,
            TokenKind::Eof => 7,
            TokenKind::Error(_) => 8,
            TokenKind::Keyword(k) => KEYWORD_BASE + k as u32,
            TokenKind::Punct(p) => PUNCT_BASE + p as u32,
        }
    }

    /// Inverse of [`TokenKind::index`]; errors come back as
    /// [`LexErrorKind::UnexpectedCharacter`].
    pub fn from_index(index: u32) -> Option<TokenKind> {
        let kind = match index {
            0 => TokenKind::Identifier,
            1 => TokenKind::Comment,
            2 => TokenKind::DocComment,
            3 => TokenKind::String,
            4 => TokenKind::JsonSpan,
            5 => TokenKind::Number,
            6 => TokenKind::Annotation,
            7 => TokenKind::Eof,
            8 => TokenKind::Error(LexErrorKind::UnexpectedCharacter),
            i if i < PUNCT_BASE => TokenKind::Keyword(Keyword::ALL[(i - KEYWORD_BASE) as usize]),
            i if i < TOKEN_KIND_COUNT => TokenKind::Punct(Punct::ALL[(i - PUNCT_BASE) as usize]),
            _ => return None,
        };
        Some(kind)
    }

    /// Comments may appear between any two grammar symbols.
    pub fn is_extra(self) -> bool {
        matches!(self, TokenKind::Comment | TokenKind::DocComment)
    }

    pub fn is_error(self) -> bool {
        matches!(self, TokenKind::Error(_))
    }

    /// Human readable name used in diagnostics and grammar dumps.
    pub fn describe(self) -> String {
        match self {
            TokenKind::Identifier => "identifier".to_string(),
            TokenKind::Keyword(k) => format!("`{}`", k.as_str()),
            TokenKind::Punct(p) => format!("`{}`", p.as_str()),
            TokenKind::Comment => "comment".to_string(),
            TokenKind::DocComment => "doc comment".to_string(),
            TokenKind::String => "string".to_string(),
            TokenKind::JsonSpan => "JSON value".to_string(),
            TokenKind::Number => "number".to_string(),
            TokenKind::Annotation => "annotation".to_string(),
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::Error(e) => e.to_string(),
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// A set of token kinds, used to tell the scanner which tokens the parser
/// can accept at its current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TokenSet(u64);

impl TokenSet {
    pub const EMPTY: TokenSet = TokenSet(0);

    /// Every token kind, including opaque JSON spans.
    pub fn all() -> TokenSet {
        TokenSet((1u64 << TOKEN_KIND_COUNT) - 1)
    }

    /// Every token kind except [`TokenKind::JsonSpan`]: what a plain lexical
    /// pass (highlighting, error recovery) asks for.
    pub fn lexical() -> TokenSet {
        TokenSet::all().without(TokenKind::JsonSpan)
    }

    /// Trivia and the kinds that are always acceptable to the driver.
    pub fn ambient() -> TokenSet {
        TokenSet::of(&[
            TokenKind::Comment,
            TokenKind::DocComment,
            TokenKind::Eof,
            TokenKind::Error(LexErrorKind::UnexpectedCharacter),
        ])
    }

    pub fn of(kinds: &[TokenKind]) -> TokenSet {
        kinds.iter().fold(TokenSet::EMPTY, |set, k| set.with(*k))
    }

    pub fn single(kind: TokenKind) -> TokenSet {
        TokenSet::EMPTY.with(kind)
    }

    pub fn with(self, kind: TokenKind) -> TokenSet {
        TokenSet(self.0 | (1u64 << kind.index()))
    }

    pub fn without(self, kind: TokenKind) -> TokenSet {
        TokenSet(self.0 & !(1u64 << kind.index()))
    }

    pub fn insert(&mut self, kind: TokenKind) {
        *self = self.with(kind);
    }

    pub fn contains(self, kind: TokenKind) -> bool {
        self.0 & (1u64 << kind.index()) != 0
    }

    pub fn union(self, other: TokenSet) -> TokenSet {
        TokenSet(self.0 | other.0)
    }

    pub fn intersection(self, other: TokenSet) -> TokenSet {
        TokenSet(self.0 & other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    /// Rebuilds a set from [`TokenSet::bits`], dropping unknown bits.
    pub fn from_bits(bits: u64) -> TokenSet {
        TokenSet(bits & TokenSet::all().0)
    }

    pub fn iter(self) -> impl Iterator<Item = TokenKind> {
        (0..TOKEN_KIND_COUNT)
            .filter(move |i| self.0 & (1u64 << i) != 0)
            .filter_map(TokenKind::from_index)
    }

    /// Renders the set the way diagnostics list expected tokens.
    pub fn describe(self) -> String {
        let names: Vec<String> = self
            .iter()
            .filter(|k| !k.is_extra() && !k.is_error())
            .map(|k| k.describe())
            .collect();
        match names.len() {
            0 => "nothing".to_string(),
            1 => names[0].clone(),
            _ => format!("one of {}", names.join(", ")),
        }
    }
}

impl std::ops::BitOr for TokenSet {
    type Output = TokenSet;

    fn bitor(self, rhs: TokenSet) -> TokenSet {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for TokenSet {
    fn bitor_assign(&mut self, rhs: TokenSet) {
        *self = self.union(rhs);
    }
}

impl FromIterator<TokenKind> for TokenSet {
    fn from_iter<I: IntoIterator<Item = TokenKind>>(iter: I) -> Self {
        iter.into_iter().fold(TokenSet::EMPTY, |set, k| set.with(k))
    }
}

/// A token with its source location information.
///
/// Ranges are half-open: the token covers `source[start_byte..end_byte]`.
/// Across one forward scan, token ranges never overlap and never go
/// backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    /// The category of this token
    pub kind: TokenKind,

    /// Byte offset of the first byte
    pub start_byte: usize,

    /// Byte offset one past the last byte
    pub end_byte: usize,

    /// Zero-based row and byte column of the first byte
    pub start: Point,

    /// Zero-based row and byte column one past the last byte
    pub end: Point,
}

impl Token {
    pub fn range(&self) -> Range {
        Range {
            start_byte: self.start_byte,
            end_byte: self.end_byte,
            start: self.start,
            end: self.end,
        }
    }

    pub fn len(&self) -> usize {
        self.end_byte - self.start_byte
    }

    pub fn is_empty(&self) -> bool {
        self.start_byte == self.end_byte
    }

    /// The source text covered by this token.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.start_byte..self.end_byte).unwrap_or("")
    }
}
