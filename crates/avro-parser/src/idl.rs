//! Productions for Avro IDL, rooted at `program`.

use avro_syntax::{Error, Keyword, Node, NodeKind, Punct, Result, TokenKind, TokenSet};

use crate::parser::{first, kw, label, p, Ctx};

impl Ctx<'_> {
    pub(crate) fn program(&mut self) -> Result<Node> {
        let declaration = first("_declaration");
        let mut children = Vec::new();
        self.with_sync(declaration, |this| {
            loop {
                let t = this.peek(declaration)?;
                if t.kind == TokenKind::Eof {
                    break;
                }
                if declaration.contains(t.kind) {
                    this.flush(&mut children);
                    let before = this.src.offset();
                    let node = this.declaration(true)?;
                    children.push(node);
                    if this.src.offset() == before {
                        this.skip(&mut children, declaration)?;
                    }
                } else {
                    this.skip(&mut children, declaration)?;
                }
            }
            this.flush(&mut children);
            Ok(())
        })?;
        Ok(Node::branch(NodeKind::Program, children, self.src.here()))
    }

    /// One top-level declaration or protocol member, annotations included.
    fn declaration(&mut self, top: bool) -> Result<Node> {
        let mut children = Vec::new();
        self.annotations(&mut children)?;
        let heads = if top { first("_declaration") } else { first("_protocol_member") };
        let sync = self.sync();
        let t = self.peek(heads | sync)?;
        let kind = match t.kind {
            TokenKind::Keyword(Keyword::Namespace) if top => NodeKind::NamespaceStatement,
            TokenKind::Keyword(Keyword::Schema) if top => NodeKind::SchemaDeclaration,
            TokenKind::Keyword(Keyword::Protocol) if top => NodeKind::ProtocolDeclaration,
            TokenKind::Keyword(Keyword::Import) => NodeKind::ImportDeclaration,
            TokenKind::Keyword(Keyword::Record) => NodeKind::RecordDeclaration,
            TokenKind::Keyword(Keyword::Error) => NodeKind::ErrorDeclaration,
            TokenKind::Keyword(Keyword::Enum) => NodeKind::EnumDeclaration,
            TokenKind::Keyword(Keyword::Fixed) => NodeKind::FixedDeclaration,
            k if first("_return_type").contains(k) => NodeKind::MessageDeclaration,
            _ => {
                let here = self.src.here();
                self.diagnostics.push(Error::syntax(
                    "annotations must be followed by a declaration",
                    here.start,
                    here.start_byte,
                ));
                return Ok(Node::branch(NodeKind::Error, children, here));
            }
        };

        if !children.is_empty()
            && matches!(
                kind,
                NodeKind::NamespaceStatement | NodeKind::SchemaDeclaration | NodeKind::ImportDeclaration
            )
        {
            let annotations = Node::branch(NodeKind::Error, std::mem::take(&mut children), self.src.here());
            self.diagnostics.push(Error::syntax(
                format!("{kind} cannot be annotated"),
                annotations.range.start,
                annotations.range.start_byte,
            ));
            children.push(annotations);
        }

        match kind {
            NodeKind::NamespaceStatement => {
                self.bump(&mut children, NodeKind::Token(t.kind));
                self.expect(&mut children, TokenKind::Identifier, Some("name"))?;
                self.expect(&mut children, p(Punct::Semicolon), None)?;
            }
            NodeKind::SchemaDeclaration => {
                self.bump(&mut children, NodeKind::Token(t.kind));
                self.type_into(&mut children, Some("type"))?;
                self.expect(&mut children, p(Punct::Semicolon), None)?;
            }
            NodeKind::ProtocolDeclaration => {
                self.bump(&mut children, NodeKind::Token(t.kind));
                self.expect(&mut children, TokenKind::Identifier, Some("name"))?;
                let body = self.body(NodeKind::ProtocolBody, first("_protocol_member"), TokenSet::EMPTY, |this| {
                    this.declaration(false)
                })?;
                children.push(body.with_field("body"));
            }
            NodeKind::ImportDeclaration => {
                self.bump(&mut children, NodeKind::Token(t.kind));
                let kinds = first("import_kind");
                if self.recover_to(&mut children, kinds)? {
                    self.bump_as(&mut children, NodeKind::ImportKind, "kind");
                } else {
                    let missing = self.missing(NodeKind::ImportKind, "import kind");
                    children.push(missing.with_field("kind"));
                }
                self.expect(&mut children, TokenKind::String, Some("path"))?;
                self.expect(&mut children, p(Punct::Semicolon), None)?;
            }
            NodeKind::RecordDeclaration | NodeKind::ErrorDeclaration => {
                self.bump(&mut children, NodeKind::Token(t.kind));
                self.expect(&mut children, TokenKind::Identifier, Some("name"))?;
                let body = self.body(
                    NodeKind::RecordBody,
                    first("field_declaration"),
                    TokenSet::single(p(Punct::Semicolon)),
                    |this| this.field_declaration(),
                )?;
                children.push(body.with_field("body"));
            }
            NodeKind::EnumDeclaration => {
                self.bump(&mut children, NodeKind::Token(t.kind));
                self.expect(&mut children, TokenKind::Identifier, Some("name"))?;
                let body = self.enum_body()?;
                children.push(body.with_field("body"));
                if self.at(p(Punct::Equals))? {
                    self.flush(&mut children);
                    let default = self.enum_default()?;
                    children.push(default.with_field("default"));
                }
            }
            NodeKind::FixedDeclaration => {
                self.bump(&mut children, NodeKind::Token(t.kind));
                self.expect(&mut children, TokenKind::Identifier, Some("name"))?;
                self.with_sync(TokenSet::single(p(Punct::Semicolon)), |this| {
                    this.expect(&mut children, p(Punct::LParen), None)?;
                    this.expect(&mut children, TokenKind::Number, Some("size"))?;
                    this.expect(&mut children, p(Punct::RParen), None)
                })?;
                self.expect(&mut children, p(Punct::Semicolon), None)?;
            }
            _ => self.message(&mut children)?,
        }
        Ok(Node::branch(kind, children, self.src.here()))
    }

    /// `{ element* }` for record and protocol bodies.
    fn body(
        &mut self,
        kind: NodeKind,
        element_first: TokenSet,
        extra_sync: TokenSet,
        mut element: impl FnMut(&mut Self) -> Result<Node>,
    ) -> Result<Node> {
        let close = p(Punct::RBrace);
        let mut children = Vec::new();
        let outer = self.sync();
        let opened = self.expect(&mut children, p(Punct::LBrace), None)?;
        if !opened && !element_first.contains(self.peek(element_first | outer)?.kind) {
            return Ok(Node::branch(kind, children, self.src.here()));
        }

        let here = element_first.with(close) | extra_sync;
        self.with_sync(here, |this| {
            loop {
                let t = this.peek(here | outer)?;
                if t.kind == close {
                    this.bump(&mut children, NodeKind::Token(close));
                    return Ok(());
                }
                if element_first.contains(t.kind) {
                    this.flush(&mut children);
                    let before = this.src.offset();
                    let node = element(this)?;
                    children.push(node);
                    if this.src.offset() == before {
                        this.skip(&mut children, here | outer)?;
                    }
                } else if t.kind == TokenKind::Eof || outer.contains(t.kind) {
                    let missing = this.missing(NodeKind::Token(close), "`}`");
                    children.push(missing);
                    return Ok(());
                } else {
                    this.skip(&mut children, here | outer)?;
                }
            }
        })?;
        Ok(Node::branch(kind, children, self.src.here()))
    }

    fn field_declaration(&mut self) -> Result<Node> {
        let mut children = Vec::new();
        let comma = p(Punct::Comma);
        self.type_into(&mut children, Some("type"))?;
        self.with_sync(TokenSet::of(&[comma, p(Punct::Semicolon)]), |this| {
            this.variable(&mut children)?;
            while this.at(comma)? {
                this.bump(&mut children, NodeKind::Token(comma));
                this.variable(&mut children)?;
            }
            Ok(())
        })?;
        self.expect(&mut children, p(Punct::Semicolon), None)?;
        Ok(Node::branch(NodeKind::FieldDeclaration, children, self.src.here()))
    }

    /// `annotation* name (= default)?`, spliced into the field.
    fn variable(&mut self, children: &mut Vec<Node>) -> Result<()> {
        self.annotations(children)?;
        self.expect(children, TokenKind::Identifier, Some("name"))?;
        self.default_value(children)
    }

    fn default_value(&mut self, children: &mut Vec<Node>) -> Result<()> {
        let equals = p(Punct::Equals);
        if self.at(equals)? {
            self.bump(children, NodeKind::Token(equals));
            self.expect(children, TokenKind::JsonSpan, Some("default"))?;
        }
        Ok(())
    }

    fn enum_body(&mut self) -> Result<Node> {
        let mut children = Vec::new();
        let symbols = TokenSet::single(TokenKind::Identifier);
        if self.expect(&mut children, p(Punct::LBrace), None)? {
            self.comma_list(&mut children, Punct::RBrace, symbols, true, |this, out| {
                this.bump(out, NodeKind::EnumSymbol);
                Ok(())
            })?;
        }
        Ok(Node::branch(NodeKind::EnumBody, children, self.src.here()))
    }

    fn enum_default(&mut self) -> Result<Node> {
        let mut children = Vec::new();
        self.bump(&mut children, NodeKind::Token(p(Punct::Equals)));
        self.expect(&mut children, TokenKind::Identifier, Some("value"))?;
        self.expect(&mut children, p(Punct::Semicolon), None)?;
        Ok(Node::branch(NodeKind::EnumDefault, children, self.src.here()))
    }

    fn message(&mut self, children: &mut Vec<Node>) -> Result<()> {
        if self.at(kw(Keyword::Void))? {
            self.bump_as(children, NodeKind::VoidType, "return");
        } else {
            self.type_into(children, Some("return"))?;
        }
        self.expect(children, TokenKind::Identifier, Some("name"))?;
        let parameters = self.parameter_list()?;
        children.push(parameters.with_field("parameters"));

        let t = self.peek(TokenSet::of(&[kw(Keyword::Throws), kw(Keyword::Oneway), p(Punct::Semicolon)]))?;
        match t.kind {
            TokenKind::Keyword(Keyword::Throws) => {
                self.flush(children);
                let throws = self.throws_clause()?;
                children.push(throws);
            }
            TokenKind::Keyword(Keyword::Oneway) => {
                self.bump(children, NodeKind::Oneway);
            }
            _ => {}
        }
        self.expect(children, p(Punct::Semicolon), None)?;
        Ok(())
    }

    fn parameter_list(&mut self) -> Result<Node> {
        let mut children = Vec::new();
        if self.expect(&mut children, p(Punct::LParen), None)? {
            self.comma_list(&mut children, Punct::RParen, first("parameter"), false, |this, out| {
                let parameter = this.parameter()?;
                out.push(parameter);
                Ok(())
            })?;
        }
        Ok(Node::branch(NodeKind::ParameterList, children, self.src.here()))
    }

    fn parameter(&mut self) -> Result<Node> {
        let mut children = Vec::new();
        self.type_into(&mut children, Some("type"))?;
        self.expect(&mut children, TokenKind::Identifier, Some("name"))?;
        self.default_value(&mut children)?;
        Ok(Node::branch(NodeKind::Parameter, children, self.src.here()))
    }

    fn throws_clause(&mut self) -> Result<Node> {
        let mut children = Vec::new();
        let comma = p(Punct::Comma);
        self.bump(&mut children, NodeKind::Token(kw(Keyword::Throws)));
        self.with_sync(TokenSet::single(comma), |this| loop {
            this.expect_as(&mut children, TokenKind::Identifier, NodeKind::TypeReference, None)?;
            if !this.at(comma)? {
                return Ok(());
            }
            this.bump(&mut children, NodeKind::Token(comma));
        })?;
        Ok(Node::branch(NodeKind::ThrowsClause, children, self.src.here()))
    }

    /// Leading annotations, each pushed as a sibling of what they annotate.
    fn annotations(&mut self, children: &mut Vec<Node>) -> Result<()> {
        while self.at(TokenKind::Annotation)? {
            self.flush(children);
            let annotation = self.annotation()?;
            children.push(annotation);
        }
        Ok(())
    }

    fn annotation(&mut self) -> Result<Node> {
        let mut children = Vec::new();
        self.bump_as(&mut children, NodeKind::AnnotationName, "name");
        self.with_sync(TokenSet::single(p(Punct::RParen)), |this| {
            this.expect(&mut children, p(Punct::LParen), None)?;
            this.expect(&mut children, TokenKind::JsonSpan, Some("value"))
        })?;
        self.expect(&mut children, p(Punct::RParen), None)?;
        Ok(Node::branch(NodeKind::Annotation, children, self.src.here()))
    }

    /// A type with its annotations. The annotations land in `children` ahead
    /// of the type node, which carries `field`.
    fn type_into(&mut self, children: &mut Vec<Node>, field: Option<&'static str>) -> Result<bool> {
        if self.recover_to(children, first("_type"))? {
            self.annotations(children)?;
            if self.recover_to(children, first("_base_type"))? {
                self.flush(children);
                let ty = self.unannotated_type()?;
                children.push(label(ty, field));
                return Ok(true);
            }
        }
        let missing = self.missing(NodeKind::TypeReference, "type");
        children.push(label(missing, field));
        Ok(false)
    }

    fn unannotated_type(&mut self) -> Result<Node> {
        self.nested(|this| {
            let base = this.base_type()?;
            let question = p(Punct::Question);
            if !this.at(question)? {
                return Ok(base);
            }
            let mut children = vec![base];
            this.bump(&mut children, NodeKind::Token(question));
            Ok(Node::branch(NodeKind::NullableType, children, this.src.here()))
        })
    }

    fn base_type(&mut self) -> Result<Node> {
        let t = self.peek(first("_base_type"))?;
        match t.kind {
            TokenKind::Keyword(k) if k.is_primitive() => Ok(self.leaf(NodeKind::PrimitiveType)),
            TokenKind::Keyword(k) if k.is_logical() => Ok(self.leaf(NodeKind::LogicalType)),
            TokenKind::Keyword(Keyword::Decimal) => self.decimal_type(),
            TokenKind::Keyword(Keyword::Array) => self.container(NodeKind::ArrayType, "items"),
            TokenKind::Keyword(Keyword::Map) => self.container(NodeKind::MapType, "values"),
            TokenKind::Keyword(Keyword::Union) => self.union_type(),
            _ => Ok(self.leaf(NodeKind::TypeReference)),
        }
    }

    fn decimal_type(&mut self) -> Result<Node> {
        let mut children = vec![self.leaf(NodeKind::Token(kw(Keyword::Decimal)))];
        let comma = p(Punct::Comma);
        self.with_sync(TokenSet::single(p(Punct::RParen)), |this| {
            this.expect(&mut children, p(Punct::LParen), None)?;
            this.expect(&mut children, TokenKind::Number, Some("precision"))?;
            if this.at(comma)? {
                this.bump(&mut children, NodeKind::Token(comma));
                this.expect(&mut children, TokenKind::Number, Some("scale"))?;
            }
            Ok(())
        })?;
        self.expect(&mut children, p(Punct::RParen), None)?;
        Ok(Node::branch(NodeKind::DecimalType, children, self.src.here()))
    }

    /// `array<T>` and `map<T>`.
    fn container(&mut self, kind: NodeKind, field: &'static str) -> Result<Node> {
        let keyword = self.src.bump();
        let mut children = vec![Node::leaf(NodeKind::Token(keyword.kind), &keyword)];
        let close = p(Punct::RAngle);
        self.with_sync(TokenSet::single(close), |this| {
            this.expect(&mut children, p(Punct::LAngle), None)?;
            this.type_into(&mut children, Some(field))
        })?;
        self.expect(&mut children, close, None)?;
        Ok(Node::branch(kind, children, self.src.here()))
    }

    fn union_type(&mut self) -> Result<Node> {
        let mut children = vec![self.leaf(NodeKind::Token(kw(Keyword::Union)))];
        if self.expect(&mut children, p(Punct::LBrace), None)? {
            self.comma_list(&mut children, Punct::RBrace, first("_type"), false, |this, out| {
                this.type_into(out, None).map(|_| ())
            })?;
        }
        Ok(Node::branch(NodeKind::UnionType, children, self.src.here()))
    }
}
