//! Concrete syntax tree nodes.
//!
//! A CST keeps every source token, comments included. Named nodes carry a
//! [`NodeKind`] from the stable vocabulary below; punctuation and keywords
//! appear as anonymous [`NodeKind::Token`] children so that the tree still
//! covers the whole input.
//!
//! The kind names are a public contract: tools match on strings such as
//! `record_declaration` or `doc_comment`, so renaming one is a breaking
//! change.

use std::fmt::Write as _;

use serde::{Serialize, Serializer};

use crate::error::{Error, Result};
use crate::position::Range;
use crate::token::{Token, TokenKind};

/// The kind of a CST node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    // roots
    Program,
    Schema,

    // IDL declarations
    NamespaceStatement,
    SchemaDeclaration,
    ProtocolDeclaration,
    ProtocolBody,
    ImportDeclaration,
    ImportKind,
    RecordDeclaration,
    ErrorDeclaration,
    RecordBody,
    FieldDeclaration,
    EnumDeclaration,
    EnumBody,
    EnumSymbol,
    EnumDefault,
    FixedDeclaration,
    MessageDeclaration,
    ParameterList,
    Parameter,
    ThrowsClause,
    Oneway,
    VoidType,
    Annotation,

    // types
    PrimitiveType,
    LogicalType,
    DecimalType,
    ArrayType,
    MapType,
    UnionType,
    NullableType,
    TypeReference,

    // JSON structure
    JsonObject,
    JsonPair,
    FieldList,
    SymbolList,
    TypeList,
    JsonValue,

    // leaves
    Identifier,
    String,
    Number,
    AnnotationName,
    Comment,
    DocComment,

    /// A region the parser could not fit into the grammar.
    Error,

    /// An anonymous token such as `{`, `;` or the `record` keyword.
    Token(TokenKind),
}

impl NodeKind {
    /// Every named kind, in declaration order.
    pub const ALL: [NodeKind; 45] = [
        NodeKind::Program,
        NodeKind::Schema,
        NodeKind::NamespaceStatement,
        NodeKind::SchemaDeclaration,
        NodeKind::ProtocolDeclaration,
        NodeKind::ProtocolBody,
        NodeKind::ImportDeclaration,
        NodeKind::ImportKind,
        NodeKind::RecordDeclaration,
        NodeKind::ErrorDeclaration,
        NodeKind::RecordBody,
        NodeKind::FieldDeclaration,
        NodeKind::EnumDeclaration,
        NodeKind::EnumBody,
        NodeKind::EnumSymbol,
        NodeKind::EnumDefault,
        NodeKind::FixedDeclaration,
        NodeKind::MessageDeclaration,
        NodeKind::ParameterList,
        NodeKind::Parameter,
        NodeKind::ThrowsClause,
        NodeKind::Oneway,
        NodeKind::VoidType,
        NodeKind::Annotation,
        NodeKind::PrimitiveType,
        NodeKind::LogicalType,
        NodeKind::DecimalType,
        NodeKind::ArrayType,
        NodeKind::MapType,
        NodeKind::UnionType,
        NodeKind::NullableType,
        NodeKind::TypeReference,
        NodeKind::JsonObject,
        NodeKind::JsonPair,
        NodeKind::FieldList,
        NodeKind::SymbolList,
        NodeKind::TypeList,
        NodeKind::JsonValue,
        NodeKind::Identifier,
        NodeKind::String,
        NodeKind::Number,
        NodeKind::AnnotationName,
        NodeKind::Comment,
        NodeKind::DocComment,
        NodeKind::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Program => "program",
            NodeKind::Schema => "schema",
            NodeKind::NamespaceStatement => "namespace_statement",
            NodeKind::SchemaDeclaration => "schema_declaration",
            NodeKind::ProtocolDeclaration => "protocol_declaration",
            NodeKind::ProtocolBody => "protocol_body",
            NodeKind::ImportDeclaration => "import_declaration",
            NodeKind::ImportKind => "import_kind",
            NodeKind::RecordDeclaration => "record_declaration",
            NodeKind::ErrorDeclaration => "error_declaration",
            NodeKind::RecordBody => "record_body",
            NodeKind::FieldDeclaration => "field_declaration",
            NodeKind::EnumDeclaration => "enum_declaration",
            NodeKind::EnumBody => "enum_body",
            NodeKind::EnumSymbol => "enum_symbol",
            NodeKind::EnumDefault => "enum_default",
            NodeKind::FixedDeclaration => "fixed_declaration",
            NodeKind::MessageDeclaration => "message_declaration",
            NodeKind::ParameterList => "parameter_list",
            NodeKind::Parameter => "parameter",
            NodeKind::ThrowsClause => "throws_clause",
            NodeKind::Oneway => "oneway",
            NodeKind::VoidType => "void_type",
            NodeKind::Annotation => "annotation",
            NodeKind::PrimitiveType => "primitive_type",
            NodeKind::LogicalType => "logical_type",
            NodeKind::DecimalType => "decimal_type",
            NodeKind::ArrayType => "array_type",
            NodeKind::MapType => "map_type",
            NodeKind::UnionType => "union_type",
            NodeKind::NullableType => "nullable_type",
            NodeKind::TypeReference => "type_reference",
            NodeKind::JsonObject => "json_object",
            NodeKind::JsonPair => "json_pair",
            NodeKind::FieldList => "field_list",
            NodeKind::SymbolList => "symbol_list",
            NodeKind::TypeList => "type_list",
            NodeKind::JsonValue => "json_value",
            NodeKind::Identifier => "identifier",
            NodeKind::String => "string",
            NodeKind::Number => "number",
            NodeKind::AnnotationName => "annotation_name",
            NodeKind::Comment => "comment",
            NodeKind::DocComment => "doc_comment",
            NodeKind::Error => "ERROR",
            NodeKind::Token(kind) => token_name(kind),
        }
    }

    /// Looks up a named kind by its stable name.
    pub fn from_name(name: &str) -> Option<NodeKind> {
        NodeKind::ALL.iter().copied().find(|k| k.as_str() == name)
    }

    pub fn is_named(self) -> bool {
        !matches!(self, NodeKind::Token(_))
    }

    /// The leaf kind a scanned token becomes when it is not wrapped by a
    /// more specific rule.
    pub fn for_token(kind: TokenKind) -> NodeKind {
        match kind {
            TokenKind::Identifier => NodeKind::Identifier,
            TokenKind::String => NodeKind::String,
            TokenKind::Number => NodeKind::Number,
            TokenKind::JsonSpan => NodeKind::JsonValue,
            TokenKind::Annotation => NodeKind::AnnotationName,
            TokenKind::Comment => NodeKind::Comment,
            TokenKind::DocComment => NodeKind::DocComment,
            TokenKind::Error(_) => NodeKind::Error,
            other => NodeKind::Token(other),
        }
    }
}

fn token_name(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Keyword(k) => k.as_str(),
        TokenKind::Punct(p) => p.as_str(),
        TokenKind::Identifier => "identifier",
        TokenKind::String => "string",
        TokenKind::Number => "number",
        TokenKind::JsonSpan => "json_value",
        TokenKind::Annotation => "annotation_name",
        TokenKind::Comment => "comment",
        TokenKind::DocComment => "doc_comment",
        TokenKind::Eof => "end",
        TokenKind::Error(_) => "ERROR",
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for NodeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A node of the concrete syntax tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub kind: NodeKind,
    pub range: Range,

    /// Field label given to this node by its parent (`name`, `type`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,

    /// Comments, which may sit between any two grammar symbols.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_extra: bool,

    /// A zero-width node the parser inserted in place of an absent token.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_missing: bool,
}

impl Node {
    /// A leaf covering one scanned token.
    pub fn leaf(kind: NodeKind, token: &Token) -> Node {
        Node {
            kind,
            range: token.range(),
            field: None,
            children: Vec::new(),
            is_extra: token.kind.is_extra(),
            is_missing: false,
        }
    }

    /// An interior node. Its range is derived from the children; `empty_at`
    /// positions it when there are none.
    pub fn branch(kind: NodeKind, children: Vec<Node>, empty_at: Range) -> Node {
        let range = match (children.first(), children.last()) {
            (Some(first), Some(last)) => first.range.cover(&last.range),
            _ => Range::empty(empty_at.start_byte, empty_at.start),
        };
        Node {
            kind,
            range,
            field: None,
            children,
            is_extra: false,
            is_missing: false,
        }
    }

    /// A zero-width placeholder for a token the parser expected but did not
    /// find.
    pub fn missing(kind: NodeKind, at: Range) -> Node {
        Node {
            kind,
            range: Range::empty(at.start_byte, at.start),
            field: None,
            children: Vec::new(),
            is_extra: false,
            is_missing: true,
        }
    }

    pub fn with_field(mut self, field: &'static str) -> Node {
        self.field = Some(field);
        self
    }

    pub fn is_named(&self) -> bool {
        self.kind.is_named()
    }

    pub fn is_error(&self) -> bool {
        self.kind == NodeKind::Error
    }

    /// True when this node or any descendant is an error or missing node.
    pub fn has_error(&self) -> bool {
        self.is_error() || self.is_missing || self.children.iter().any(Node::has_error)
    }

    pub fn start_byte(&self) -> usize {
        self.range.start_byte
    }

    pub fn end_byte(&self) -> usize {
        self.range.end_byte
    }

    pub fn child_by_field_name(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.field == Some(name))
    }

    pub fn children_by_field_name<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |c| c.field == Some(name))
    }

    /// The value stored under `name`, looking through JSON pairs: for a JSON
    /// object this is the `value` of the pair labelled `name`, for an IDL
    /// node it is the child labelled `name`.
    pub fn member(&self, name: &str) -> Option<&Node> {
        let child = self.child_by_field_name(name)?;
        if child.kind == NodeKind::JsonPair {
            child.child_by_field_name("value")
        } else {
            Some(child)
        }
    }

    pub fn named_children(&self) -> impl Iterator<Item = &Node> {
        self.children.iter().filter(|c| c.is_named() && !c.is_extra)
    }

    /// Pre-order walk over this node and everything beneath it.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    pub fn find_all(&self, kind: NodeKind) -> Vec<&Node> {
        self.descendants().filter(|n| n.kind == kind).collect()
    }

    /// The first descendant (or self) of `kind`, in source order.
    pub fn find(&self, kind: NodeKind) -> Option<&Node> {
        self.descendants().find(|n| n.kind == kind)
    }

    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.range.start_byte..self.range.end_byte).unwrap_or("")
    }

    /// Renders the tree as an s-expression of named nodes with field labels,
    /// in the format tree-sitter tooling prints.
    pub fn to_sexp(&self) -> String {
        let mut out = String::new();
        self.write_sexp(&mut out);
        out
    }

    fn write_sexp(&self, out: &mut String) {
        if self.is_missing {
            if self.is_named() {
                let _ = write!(out, "(MISSING {})", self.kind.as_str());
            } else {
                let _ = write!(out, "(MISSING {:?})", self.kind.as_str());
            }
            return;
        }
        out.push('(');
        out.push_str(self.kind.as_str());
        for child in &self.children {
            if !child.is_named() && !child.is_missing {
                continue;
            }
            out.push(' ');
            if let Some(field) = child.field {
                out.push_str(field);
                out.push_str(": ");
            }
            child.write_sexp(out);
        }
        out.push(')');
    }

    /// Checks that children are ordered, do not overlap, and span this node
    /// exactly.
    pub fn check_invariants(&self) -> Result<()> {
        if let (Some(first), Some(last)) = (self.children.first(), self.children.last()) {
            if first.range.start_byte != self.range.start_byte
                || last.range.end_byte != self.range.end_byte
            {
                return Err(Error::syntax(
                    format!("children of {} do not span it", self.kind),
                    self.range.start,
                    self.range.start_byte,
                ));
            }
        }
        for pair in self.children.windows(2) {
            if pair[0].range.end_byte > pair[1].range.start_byte {
                return Err(Error::syntax(
                    format!("children of {} overlap", self.kind),
                    pair[1].range.start,
                    pair[1].range.start_byte,
                ));
            }
        }
        self.children.iter().try_for_each(Node::check_invariants)
    }
}

/// Iterator returned by [`Node::descendants`].
pub struct Descendants<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<&'a Node> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Point;
    use crate::token::{Keyword, Punct};

    fn tok(kind: TokenKind, start: usize, end: usize) -> Token {
        Token {
            kind,
            start_byte: start,
            end_byte: end,
            start: Point::new(0, start),
            end: Point::new(0, end),
        }
    }

    // record R {}
    fn sample() -> Node {
        let kw = Node::leaf(NodeKind::Token(TokenKind::Keyword(Keyword::Record)), &tok(TokenKind::Keyword(Keyword::Record), 0, 6));
        let name = Node::leaf(NodeKind::Identifier, &tok(TokenKind::Identifier, 7, 8)).with_field("name");
        let open = Node::leaf(NodeKind::Token(TokenKind::Punct(Punct::LBrace)), &tok(TokenKind::Punct(Punct::LBrace), 9, 10));
        let close = Node::missing(NodeKind::Token(TokenKind::Punct(Punct::RBrace)), tok(TokenKind::Eof, 10, 10).range());
        let body = Node::branch(NodeKind::RecordBody, vec![open, close], Range::default()).with_field("body");
        let decl = Node::branch(NodeKind::RecordDeclaration, vec![kw, name, body], Range::default());
        Node::branch(NodeKind::Program, vec![decl], Range::default())
    }

    #[test]
    fn names_are_unique_and_resolvable() {
        for kind in NodeKind::ALL {
            assert_eq!(NodeKind::from_name(kind.as_str()), Some(kind));
            assert!(kind.is_named());
        }
        assert_eq!(NodeKind::from_name("{"), None);
        assert_eq!(NodeKind::Token(TokenKind::Punct(Punct::Semicolon)).as_str(), ";");
    }

    #[test]
    fn sexp_shows_named_nodes_fields_and_missing() {
        let tree = sample();
        assert_eq!(
            tree.to_sexp(),
            "(program (record_declaration name: (identifier) body: (record_body (MISSING \"}\"))))"
        );
        assert!(tree.has_error());
    }

    #[test]
    fn branch_ranges_cover_children() {
        let tree = sample();
        assert_eq!((tree.start_byte(), tree.end_byte()), (0, 10));
        assert!(tree.check_invariants().is_ok());

        let decl = &tree.children[0];
        assert_eq!(decl.child_by_field_name("name").map(|n| n.text("record R {")), Some("R"));
        assert_eq!(decl.member("body").map(|n| n.kind), Some(NodeKind::RecordBody));
    }

    #[test]
    fn overlapping_children_are_reported() {
        let a = Node::leaf(NodeKind::Identifier, &tok(TokenKind::Identifier, 0, 4));
        let b = Node::leaf(NodeKind::Identifier, &tok(TokenKind::Identifier, 2, 6));
        let bad = Node::branch(NodeKind::Program, vec![a, b], Range::default());
        assert!(bad.check_invariants().is_err());
    }

    #[test]
    fn descendants_walk_in_source_order() {
        let tree = sample();
        let kinds: Vec<&str> = tree.descendants().filter(|n| n.is_named()).map(|n| n.kind.as_str()).collect();
        assert_eq!(kinds, ["program", "record_declaration", "identifier", "record_body"]);
        assert_eq!(tree.find_all(NodeKind::Identifier).len(), 1);
    }
}
