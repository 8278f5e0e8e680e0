//! The driver: entry points and the recovery machinery shared by the IDL and
//! JSON productions.
//!
//! Recovery keeps errors small. A production that does not find the token
//! it needs either inserts a zero-width MISSING node, when the token at hand
//! belongs to an enclosing construct, or wraps the tokens up to the next
//! point it can resume at in an ERROR node. Each list or body pushes the
//! tokens that can continue it onto a stack of synchronisation sets, so an
//! error inside one declaration stops at that declaration's boundary.

use avro_grammar::table;
use avro_scanner::{Mode, ScannedToken, Scanner, ScannerConfig};
use avro_syntax::{Error, InputEdit, Keyword, Node, NodeKind, Punct, Result, Token, TokenKind, TokenSet};
use tracing::{debug, trace};

use crate::config::ParseConfig;
use crate::source::TokenSource;
use crate::tree::Tree;

pub(crate) fn kw(keyword: Keyword) -> TokenKind {
    TokenKind::Keyword(keyword)
}

pub(crate) fn p(punct: Punct) -> TokenKind {
    TokenKind::Punct(punct)
}

/// FIRST set of a grammar rule, from the shared compiled table.
pub(crate) fn first(rule: &str) -> TokenSet {
    table().first(rule)
}

fn keywords() -> TokenSet {
    Keyword::ALL.into_iter().map(TokenKind::Keyword).collect()
}

/// Parses Avro IDL and JSON schema text into concrete syntax trees.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    config: ParseConfig,
}

impl Parser {
    pub fn new(config: ParseConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParseConfig {
        &self.config
    }

    /// Parses `text`. Syntax and lexical errors end up in the tree; only
    /// exceeding a configured limit fails the parse.
    pub fn parse(&self, text: &str) -> Result<Tree> {
        self.run(text, None)
    }

    /// Parses `new_text`, the result of applying `edit` to the text `old`
    /// was parsed from, reusing the tokens the edit cannot have affected.
    pub fn reparse(&self, old: &Tree, edit: &InputEdit, new_text: &str) -> Result<Tree> {
        self.run(new_text, Some((&old.tokens, *edit)))
    }

    fn run(&self, text: &str, previous: Option<(&[ScannedToken], InputEdit)>) -> Result<Tree> {
        self.config.validate()?;
        if text.len() > self.config.max_input_bytes {
            return Err(Error::resource_limit(
                format!(
                    "input is {} bytes, larger than the {} byte limit",
                    text.len(),
                    self.config.max_input_bytes
                ),
                Default::default(),
                0,
            ));
        }

        let scanner_config = ScannerConfig::new(self.config.max_nesting_depth);
        let mode = self.mode_for(text, scanner_config);
        let mut source = TokenSource::new(text, Scanner::with_mode(scanner_config, mode));
        if let Some((tokens, edit)) = previous {
            source = source.with_previous(tokens, edit);
        }

        let mut ctx = Ctx {
            src: source,
            diagnostics: Vec::new(),
            sync: Vec::new(),
            depth: 0,
            max_depth: self.config.max_nesting_depth,
        };
        let root = match mode {
            Mode::Json => ctx.schema()?,
            _ => ctx.program()?,
        };

        let (tokens, lexical, reused_tokens) = ctx.src.finish();
        let mut diagnostics = lexical;
        diagnostics.extend(ctx.diagnostics);
        diagnostics.sort_by_key(|e| e.offset);
        debug!(
            mode = %mode,
            tokens = tokens.len(),
            reused = reused_tokens,
            diagnostics = diagnostics.len(),
            "parsed"
        );
        Ok(Tree {
            root,
            mode,
            diagnostics,
            tokens,
            reused_tokens,
        })
    }

    /// The configured mode, or the one the first significant token implies.
    /// Text that settles nothing is read as IDL.
    fn mode_for(&self, text: &str, config: ScannerConfig) -> Mode {
        if let Some(mode) = self.config.mode.filter(|m| *m != Mode::Unknown) {
            return mode;
        }
        let mut scanner = Scanner::new(config);
        let mut cursor = avro_scanner::Cursor::new(text);
        while let Some(token) = scanner.scan(&mut cursor, TokenSet::lexical()) {
            if !token.kind.is_extra() {
                break;
            }
        }
        match scanner.mode() {
            Mode::Json => Mode::Json,
            _ => Mode::Idl,
        }
    }
}

/// Per-parse driver state.
pub(crate) struct Ctx<'a> {
    pub(crate) src: TokenSource<'a>,
    pub(crate) diagnostics: Vec<Error>,
    sync: Vec<TokenSet>,
    depth: usize,
    max_depth: usize,
}

impl<'a> Ctx<'a> {
    /// The next significant token under `valid`. A token reporting that the
    /// scanner's nesting cap was hit aborts the parse.
    pub(crate) fn peek(&mut self, valid: TokenSet) -> Result<Token> {
        let token = self.src.peek(valid);
        if let TokenKind::Error(kind) = token.kind {
            if kind.is_resource_limit() {
                return Err(Error::resource_limit(
                    format!("nesting is deeper than {} levels", self.max_depth),
                    token.start,
                    token.start_byte,
                ));
            }
        }
        Ok(token)
    }

    /// True when the next token is `kind`.
    pub(crate) fn at(&mut self, kind: TokenKind) -> Result<bool> {
        Ok(self.peek(TokenSet::single(kind))?.kind == kind)
    }

    /// Moves pending comments into `children`.
    pub(crate) fn flush(&mut self, children: &mut Vec<Node>) {
        children.extend(self.src.take_extras());
    }

    /// Consumes the peeked token into `children` as a node of `kind`.
    pub(crate) fn bump(&mut self, children: &mut Vec<Node>, kind: NodeKind) -> Token {
        self.flush(children);
        let token = self.src.bump();
        children.push(Node::leaf(kind, &token));
        token
    }

    /// Like [`Ctx::bump`], labelling the new leaf with `field`.
    pub(crate) fn bump_as(&mut self, children: &mut Vec<Node>, kind: NodeKind, field: &'static str) -> Token {
        let token = self.bump(children, kind);
        if let Some(last) = children.last_mut() {
            last.field = Some(field);
        }
        token
    }

    /// Consumes the peeked token as a standalone leaf. Pending comments must
    /// have been flushed by the caller.
    pub(crate) fn leaf(&mut self, kind: NodeKind) -> Node {
        let token = self.src.bump();
        Node::leaf(kind, &token)
    }

    /// Union of the synchronisation sets of every open construct.
    pub(crate) fn sync(&self) -> TokenSet {
        self.sync.iter().fold(TokenSet::single(TokenKind::Eof), |acc, s| acc | *s)
    }

    pub(crate) fn with_sync<T>(&mut self, set: TokenSet, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.sync.push(set);
        let result = f(self);
        self.sync.pop();
        result
    }

    /// Runs `f` one nesting level deeper, failing past the configured depth.
    pub(crate) fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= self.max_depth {
            let here = self.src.here();
            return Err(Error::resource_limit(
                format!("nesting is deeper than {} levels", self.max_depth),
                here.start,
                here.start_byte,
            ));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Tokens that let an enclosing construct resume. Names must not turn
    /// into keywords, so keywords are left out when `first` wants a bare
    /// identifier.
    fn recover_set(&self, first: TokenSet) -> TokenSet {
        let sync = self.sync();
        if first.contains(TokenKind::Identifier) && first.intersection(keywords()).is_empty() {
            TokenSet::from_bits(sync.bits() & !keywords().bits())
        } else {
            sync
        }
    }

    /// Brings the next token into `first` if that can be done by skipping
    /// tokens nobody around here expects. Returns false when an enclosing
    /// construct's token (or the end) comes first.
    pub(crate) fn recover_to(&mut self, children: &mut Vec<Node>, first: TokenSet) -> Result<bool> {
        let recover = self.recover_set(first);
        let t = self.peek(first | recover)?;
        if first.contains(t.kind) {
            return Ok(true);
        }
        if t.kind == TokenKind::Eof || recover.contains(t.kind) {
            return Ok(false);
        }
        self.skip(children, first | recover)?;
        let t = self.peek(first | recover)?;
        Ok(first.contains(t.kind))
    }

    /// Consumes `want` into `children`, or inserts it as MISSING.
    pub(crate) fn expect(&mut self, children: &mut Vec<Node>, want: TokenKind, field: Option<&'static str>) -> Result<bool> {
        self.expect_as(children, want, NodeKind::for_token(want), field)
    }

    pub(crate) fn expect_as(
        &mut self,
        children: &mut Vec<Node>,
        want: TokenKind,
        kind: NodeKind,
        field: Option<&'static str>,
    ) -> Result<bool> {
        let found = self.recover_to(children, TokenSet::single(want))?;
        let node = if found {
            self.flush(children);
            self.leaf(kind)
        } else {
            self.missing(kind, &want.describe())
        };
        children.push(label(node, field));
        Ok(found)
    }

    /// A zero-width node standing in for something absent.
    pub(crate) fn missing(&mut self, kind: NodeKind, what: &str) -> Node {
        let here = self.src.here();
        trace!(what, byte = here.start_byte, "inserted missing node");
        self.diagnostics
            .push(Error::syntax(format!("missing {what}"), here.start, here.start_byte));
        Node::missing(kind, here)
    }

    /// Wraps tokens in an ERROR node until one in `stop` shows up at the
    /// current bracket level. Always consumes at least one token unless the
    /// input has ended.
    pub(crate) fn skip(&mut self, children: &mut Vec<Node>, stop: TokenSet) -> Result<()> {
        self.flush(children);
        let mut skipped = Vec::new();
        let mut first: Option<Token> = None;
        let mut consumed = 0usize;
        let mut nest = 0usize;
        loop {
            let t = self.peek(stop)?;
            if t.kind == TokenKind::Eof || (consumed > 0 && nest == 0 && stop.contains(t.kind)) {
                break;
            }
            match t.kind {
                TokenKind::Punct(Punct::LBrace | Punct::LBracket | Punct::LParen) => nest += 1,
                TokenKind::Punct(Punct::RBrace | Punct::RBracket | Punct::RParen) => {
                    nest = nest.saturating_sub(1)
                }
                _ => {}
            }
            first.get_or_insert(t);
            self.bump(&mut skipped, NodeKind::for_token(t.kind));
            consumed += 1;
        }
        let Some(first) = first else {
            return Ok(());
        };

        if consumed == 1 && skipped.len() == 1 && first.kind.is_error() {
            // a lexical error token stands on its own
            children.append(&mut skipped);
            return Ok(());
        }
        if !first.kind.is_error() {
            self.diagnostics.push(Error::syntax(
                format!("unexpected {}", first.kind.describe()),
                first.start,
                first.start_byte,
            ));
        }
        debug!(start = first.start_byte, tokens = consumed, "skipped tokens into ERROR");
        let here = self.src.here();
        children.push(Node::branch(NodeKind::Error, skipped, here));
        Ok(())
    }

    /// Parses `element (',' element)*` up to `close`, which is consumed. The
    /// opening bracket has been consumed already. With `trailing`, a comma
    /// right before `close` is accepted.
    pub(crate) fn comma_list(
        &mut self,
        children: &mut Vec<Node>,
        close: Punct,
        first: TokenSet,
        trailing: bool,
        mut element: impl FnMut(&mut Self, &mut Vec<Node>) -> Result<()>,
    ) -> Result<()> {
        let close = p(close);
        let comma = p(Punct::Comma);
        let outer = self.sync();
        let here = first.with(close).with(comma);
        self.with_sync(here, |this| {
            let mut want_element = true;
            let mut last_comma: Option<usize> = None;
            let mut count = 0usize;
            loop {
                let t = this.peek(here | outer)?;
                match t.kind {
                    k if k == close => {
                        if want_element && count > 0 && !trailing {
                            if let Some(i) = last_comma {
                                let comma_node = children.remove(i);
                                let at = comma_node.range;
                                this.diagnostics.push(Error::syntax("trailing comma", at.start, at.start_byte));
                                children.insert(i, Node::branch(NodeKind::Error, vec![comma_node], at));
                            }
                        }
                        this.bump(children, NodeKind::Token(close));
                        return Ok(());
                    }
                    k if first.contains(k) => {
                        if !want_element {
                            let missing = this.missing(NodeKind::Token(comma), "`,`");
                            children.push(missing);
                        }
                        this.flush(children);
                        let before = this.src.offset();
                        element(this, children)?;
                        if this.src.offset() == before {
                            this.skip(children, here | outer)?;
                        }
                        count += 1;
                        want_element = false;
                    }
                    k if k == comma && !want_element => {
                        this.bump(children, NodeKind::Token(comma));
                        last_comma = Some(children.len() - 1);
                        want_element = true;
                    }
                    k if k == TokenKind::Eof || outer.contains(k) => {
                        let missing = this.missing(NodeKind::Token(close), &close.describe());
                        children.push(missing);
                        return Ok(());
                    }
                    _ => this.skip(children, here | outer)?,
                }
            }
        })
    }
}

/// Attaches a field label when there is one.
pub(crate) fn label(node: Node, field: Option<&'static str>) -> Node {
    match field {
        Some(f) => node.with_field(f),
        None => node,
    }
}
