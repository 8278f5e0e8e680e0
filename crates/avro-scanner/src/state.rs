//! Serializable scanner state and scanner configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hard ceiling on the structural nesting the scanner tracks. The depth is
/// serialized as a single byte.
pub const MAX_DEPTH_CEILING: usize = 255;

/// Default structural nesting cap.
pub const DEFAULT_MAX_DEPTH: usize = 64;

const STATE_VERSION: u8 = 1;
const HEADER_LEN: usize = 4;

/// Scanner limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScannerConfig {
    /// Maximum open brackets, including those inside a JSON default value.
    pub max_depth: usize,
}

impl ScannerConfig {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.min(MAX_DEPTH_CEILING),
        }
    }

    pub fn effective_max_depth(&self) -> usize {
        self.max_depth.min(MAX_DEPTH_CEILING)
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

/// Which surface syntax the scanner is reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Mode {
    /// Not decided yet; settled by the first structural token.
    #[default]
    Unknown = 0,
    /// JSON schema or protocol (`.avsc`, `.avpr`).
    Json = 1,
    /// Avro IDL (`.avdl`).
    Idl = 2,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Unknown => "unknown",
            Mode::Json => "json",
            Mode::Idl => "idl",
        }
    }

    fn from_byte(b: u8) -> Option<Mode> {
        match b {
            0 => Some(Mode::Unknown),
            1 => Some(Mode::Json),
            2 => Some(Mode::Idl),
            _ => None,
        }
    }

    /// Mode implied by a file extension.
    pub fn from_extension(ext: &str) -> Option<Mode> {
        match ext.to_ascii_lowercase().as_str() {
            "avsc" | "avpr" | "json" => Some(Mode::Json),
            "avdl" => Some(Mode::Idl),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" | "schema" => Ok(Mode::Json),
            "idl" => Ok(Mode::Idl),
            "auto" | "unknown" => Ok(Mode::Unknown),
            other => Err(format!("unknown mode `{other}` (expected json, idl or auto)")),
        }
    }
}

/// Kinds of open structural brackets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Bracket {
    Brace = 1,
    Bracket = 2,
    Paren = 3,
    Angle = 4,
}

impl Bracket {
    fn from_byte(b: u8) -> Option<Bracket> {
        match b {
            1 => Some(Bracket::Brace),
            2 => Some(Bracket::Bracket),
            3 => Some(Bracket::Paren),
            4 => Some(Bracket::Angle),
            _ => None,
        }
    }
}

/// An unfinished block comment carried across a window boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommentKind {
    Block = 1,
    Doc = 2,
}

/// Everything the scanner needs to resume at a token boundary.
///
/// Serialized layout: `[version][mode][comment][depth][stack...]`, one byte
/// each. An empty buffer means the initial state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ScannerState {
    pub mode: Mode,
    pub stack: Vec<Bracket>,
    pub comment: Option<CommentKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("scanner state is truncated ({0} bytes)")]
    Truncated(usize),
    #[error("unsupported scanner state version {0}")]
    UnsupportedVersion(u8),
    #[error("invalid mode byte {0}")]
    InvalidMode(u8),
    #[error("invalid comment byte {0}")]
    InvalidComment(u8),
    #[error("invalid bracket byte {0}")]
    InvalidBracket(u8),
    #[error("stack length mismatch: header says {expected}, found {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("stored nesting depth {depth} exceeds the configured maximum {max}")]
    DepthExceeded { depth: usize, max: usize },
}

impl ScannerState {
    pub fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let depth = self.stack.len().min(MAX_DEPTH_CEILING);
        let mut out = Vec::with_capacity(HEADER_LEN + depth);
        out.push(STATE_VERSION);
        out.push(self.mode as u8);
        out.push(self.comment.map_or(0, |c| c as u8));
        out.push(depth as u8);
        out.extend(self.stack[..depth].iter().map(|b| *b as u8));
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<ScannerState, StateError> {
        if bytes.is_empty() {
            return Ok(ScannerState::default());
        }
        if bytes[0] != STATE_VERSION {
            return Err(StateError::UnsupportedVersion(bytes[0]));
        }
        if bytes.len() < HEADER_LEN {
            return Err(StateError::Truncated(bytes.len()));
        }
        let mode = Mode::from_byte(bytes[1]).ok_or(StateError::InvalidMode(bytes[1]))?;
        let comment = match bytes[2] {
            0 => None,
            1 => Some(CommentKind::Block),
            2 => Some(CommentKind::Doc),
            other => return Err(StateError::InvalidComment(other)),
        };
        let expected = bytes[3] as usize;
        let rest = &bytes[HEADER_LEN..];
        if rest.len() != expected {
            return Err(StateError::LengthMismatch {
                expected,
                actual: rest.len(),
            });
        }
        let stack = rest
            .iter()
            .map(|b| Bracket::from_byte(*b).ok_or(StateError::InvalidBracket(*b)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ScannerState {
            mode,
            stack,
            comment,
        })
    }
}
