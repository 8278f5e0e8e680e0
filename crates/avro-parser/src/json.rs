//! Productions for JSON schema documents, rooted at `schema`.
//!
//! Objects are classified after their members are read: `"type": "record"`
//! makes a record_declaration, a `"protocol"` member a protocol_declaration,
//! and so on. Members that hold schemas, field lists, symbol lists or type
//! lists are parsed structurally; every other member value is kept as one
//! opaque `json_value`.

use avro_syntax::{Keyword, Node, NodeKind, Punct, Result, TokenKind, TokenSet};

use crate::parser::{first, p, Ctx};

/// Member names that become field labels on their pair.
const KNOWN_KEYS: [&str; 18] = [
    "name",
    "namespace",
    "type",
    "fields",
    "symbols",
    "items",
    "values",
    "size",
    "default",
    "doc",
    "aliases",
    "logicalType",
    "precision",
    "scale",
    "types",
    "protocol",
    "messages",
    "order",
];

fn unquote(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
}

/// Node kind for a schema written as a bare string.
fn string_kind(name: &str) -> NodeKind {
    match Keyword::from_word(name) {
        Some(k) if k.is_primitive() => NodeKind::PrimitiveType,
        _ if matches!(name, "record" | "error" | "enum" | "fixed" | "array" | "map" | "protocol") => {
            NodeKind::JsonValue
        }
        _ => NodeKind::TypeReference,
    }
}

impl Ctx<'_> {
    pub(crate) fn schema(&mut self) -> Result<Node> {
        let mut children = Vec::new();
        if self.recover_to(&mut children, first("_schema_value"))? {
            self.flush(&mut children);
            let value = self.schema_value()?;
            children.push(value);
        } else {
            let missing = self.missing(NodeKind::JsonObject, "schema");
            children.push(missing);
        }
        let end = TokenSet::single(TokenKind::Eof);
        while self.peek(end)?.kind != TokenKind::Eof {
            self.skip(&mut children, end)?;
        }
        self.flush(&mut children);
        Ok(Node::branch(NodeKind::Schema, children, self.src.here()))
    }

    /// A string, object or union. The caller has checked the lookahead.
    fn schema_value(&mut self) -> Result<Node> {
        let t = self.peek(first("_schema_value"))?;
        match t.kind {
            TokenKind::Punct(Punct::LBrace) => self.nested(|this| this.object(None)),
            TokenKind::Punct(Punct::LBracket) => self.nested(|this| {
                this.list(NodeKind::UnionType, first("_schema_value"), |this, out| {
                    let value = this.schema_value()?;
                    out.push(value);
                    Ok(())
                })
            }),
            _ => {
                let kind = string_kind(unquote(t.text(self.src.text())));
                Ok(self.leaf(kind))
            }
        }
    }

    /// `{ pair, ... }`. Without `kind` the members decide what it is.
    fn object(&mut self, kind: Option<NodeKind>) -> Result<Node> {
        let mut children = Vec::new();
        self.bump(&mut children, NodeKind::Token(p(Punct::LBrace)));
        self.comma_list(&mut children, Punct::RBrace, TokenSet::single(TokenKind::String), true, |this, out| {
            let pair = this.pair()?;
            out.push(pair);
            Ok(())
        })?;
        let kind = kind.unwrap_or_else(|| self.classify(&children));
        Ok(Node::branch(kind, children, self.src.here()))
    }

    /// `[ element, ... ]`.
    fn list(
        &mut self,
        kind: NodeKind,
        element_first: TokenSet,
        element: impl FnMut(&mut Self, &mut Vec<Node>) -> Result<()>,
    ) -> Result<Node> {
        let mut children = Vec::new();
        self.bump(&mut children, NodeKind::Token(p(Punct::LBracket)));
        self.comma_list(&mut children, Punct::RBracket, element_first, true, element)?;
        Ok(Node::branch(kind, children, self.src.here()))
    }

    fn pair(&mut self) -> Result<Node> {
        let mut children = Vec::new();
        let key = self.bump_as(&mut children, NodeKind::String, "key");
        let key = unquote(key.text(self.src.text()));
        self.expect(&mut children, p(Punct::Colon), None)?;

        match key {
            "type" | "items" | "values" => self.member_schema(&mut children)?,
            "fields" => {
                let objects = TokenSet::single(p(Punct::LBrace));
                self.member_list(&mut children, NodeKind::FieldList, objects, |this, out| {
                    let field = this.object(Some(NodeKind::FieldDeclaration))?;
                    out.push(field);
                    Ok(())
                })?
            }
            "symbols" => {
                let strings = TokenSet::single(TokenKind::String);
                self.member_list(&mut children, NodeKind::SymbolList, strings, |this, out| {
                    this.bump(out, NodeKind::EnumSymbol);
                    Ok(())
                })?
            }
            "types" => self.member_list(&mut children, NodeKind::TypeList, first("_schema_value"), |this, out| {
                let value = this.schema_value()?;
                out.push(value);
                Ok(())
            })?,
            _ => {
                self.expect(&mut children, TokenKind::JsonSpan, Some("value"))?;
            }
        }

        let pair = Node::branch(NodeKind::JsonPair, children, self.src.here());
        Ok(match KNOWN_KEYS.iter().find(|k| **k == key) {
            Some(k) => pair.with_field(*k),
            None => pair,
        })
    }

    /// A member value that should be a schema; anything else is kept opaque.
    fn member_schema(&mut self, children: &mut Vec<Node>) -> Result<()> {
        let schema = first("_schema_value");
        if schema.contains(self.peek(schema)?.kind) {
            self.flush(children);
            let value = self.schema_value()?;
            children.push(value.with_field("value"));
        } else {
            self.expect(children, TokenKind::JsonSpan, Some("value"))?;
        }
        Ok(())
    }

    /// A member value that should be an array of `element`s.
    fn member_list(
        &mut self,
        children: &mut Vec<Node>,
        kind: NodeKind,
        element_first: TokenSet,
        element: impl FnMut(&mut Self, &mut Vec<Node>) -> Result<()>,
    ) -> Result<()> {
        if self.at(p(Punct::LBracket))? {
            self.flush(children);
            let list = self.nested(|this| this.list(kind, element_first, element))?;
            children.push(list.with_field("value"));
        } else {
            self.expect(children, TokenKind::JsonSpan, Some("value"))?;
        }
        Ok(())
    }

    fn classify(&self, members: &[Node]) -> NodeKind {
        let text = self.src.text();
        let has = |key: &str| members.iter().any(|m| m.kind == NodeKind::JsonPair && m.field == Some(key));
        if has("protocol") {
            return NodeKind::ProtocolDeclaration;
        }
        if has("logicalType") {
            return NodeKind::LogicalType;
        }
        let type_name = members
            .iter()
            .find(|m| m.field == Some("type"))
            .and_then(|m| m.child_by_field_name("value"))
            .filter(|v| matches!(v.kind, NodeKind::JsonValue | NodeKind::PrimitiveType))
            .map(|v| unquote(v.text(text)));
        match type_name {
            Some("record") => NodeKind::RecordDeclaration,
            Some("error") => NodeKind::ErrorDeclaration,
            Some("enum") => NodeKind::EnumDeclaration,
            Some("fixed") => NodeKind::FixedDeclaration,
            Some("array") => NodeKind::ArrayType,
            Some("map") => NodeKind::MapType,
            Some(name) if Keyword::from_word(name).map_or(false, Keyword::is_primitive) => NodeKind::PrimitiveType,
            _ => NodeKind::JsonObject,
        }
    }
}
