use avro_scanner::{Mode, ScannedToken};
use avro_syntax::{Error, ErrorKind, Node};
use serde::Serialize;

/// The result of a parse: the CST plus everything needed to reparse it.
#[derive(Debug, Clone, Serialize)]
pub struct Tree {
    pub root: Node,

    /// The surface syntax the text was parsed as.
    pub mode: Mode,

    /// Lexical and syntax errors, in source order.
    pub diagnostics: Vec<Error>,

    /// Every token the parser consumed, comments included, with the scanner
    /// state around it.
    #[serde(skip)]
    pub tokens: Vec<ScannedToken>,

    /// How many of `tokens` were carried over from a previous tree.
    #[serde(skip)]
    pub reused_tokens: usize,
}

impl Tree {
    pub fn to_sexp(&self) -> String {
        self.root.to_sexp()
    }

    /// True when the tree contains ERROR or MISSING nodes.
    pub fn has_errors(&self) -> bool {
        self.root.has_error() || !self.diagnostics.is_empty()
    }

    pub fn errors_of(&self, kind: ErrorKind) -> impl Iterator<Item = &Error> {
        self.diagnostics.iter().filter(move |e| e.kind == kind)
    }

    /// The tree as a JSON document: mode, diagnostics and the node tree.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
