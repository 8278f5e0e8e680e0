//! Grammar rules and the small DSL used to write them.
//!
//! The DSL mirrors the usual parser-generator vocabulary: `seq`, `choice`,
//! `repeat`, `optional`, `field` and `alias` combine token references and
//! references to other rules by name.

use avro_syntax::{Keyword, Punct, TokenKind};
use serde_json::{json, Value};

/// One production body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Seq(Vec<Rule>),
    Choice(Vec<Rule>),
    Repeat(Box<Rule>),
    Repeat1(Box<Rule>),
    Optional(Box<Rule>),
    Token(TokenKind),
    Symbol(&'static str),
    Field(&'static str, Box<Rule>),
    /// Produces the content under another node kind name.
    Alias(Box<Rule>, &'static str),
}

impl Rule {
    /// Calls `f` on this rule and every rule nested in it.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Rule)) {
        f(self);
        match self {
            Rule::Seq(members) | Rule::Choice(members) => {
                for m in members {
                    m.walk(f);
                }
            }
            Rule::Repeat(inner)
            | Rule::Repeat1(inner)
            | Rule::Optional(inner)
            | Rule::Field(_, inner)
            | Rule::Alias(inner, _) => inner.walk(f),
            Rule::Token(_) | Rule::Symbol(_) => {}
        }
    }

    /// Names of the rules this body refers to.
    pub fn symbols(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        self.walk(&mut |r| {
            if let Rule::Symbol(name) = r {
                out.push(*name);
            }
        });
        out
    }

    /// The token a leaf rule wraps, when the body is exactly one token.
    pub fn as_leaf(&self) -> Option<TokenKind> {
        match self {
            Rule::Token(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Tree-sitter style JSON rendering of the rule.
    pub fn to_json(&self) -> Value {
        match self {
            Rule::Seq(members) => json!({
                "type": "SEQ",
                "members": members.iter().map(Rule::to_json).collect::<Vec<_>>(),
            }),
            Rule::Choice(members) => json!({
                "type": "CHOICE",
                "members": members.iter().map(Rule::to_json).collect::<Vec<_>>(),
            }),
            Rule::Repeat(inner) => json!({ "type": "REPEAT", "content": inner.to_json() }),
            Rule::Repeat1(inner) => json!({ "type": "REPEAT1", "content": inner.to_json() }),
            Rule::Optional(inner) => json!({
                "type": "CHOICE",
                "members": [inner.to_json(), { "type": "BLANK" }],
            }),
            Rule::Token(kind) => token_json(*kind),
            Rule::Symbol(name) => json!({ "type": "SYMBOL", "name": name }),
            Rule::Field(name, inner) => json!({
                "type": "FIELD",
                "name": name,
                "content": inner.to_json(),
            }),
            Rule::Alias(inner, value) => json!({
                "type": "ALIAS",
                "content": inner.to_json(),
                "named": true,
                "value": value,
            }),
        }
    }
}

fn token_json(kind: TokenKind) -> Value {
    match kind {
        TokenKind::Keyword(k) => json!({ "type": "STRING", "value": k.as_str() }),
        TokenKind::Punct(p) => json!({ "type": "STRING", "value": p.as_str() }),
        other => json!({ "type": "SYMBOL", "name": external_name(other) }),
    }
}

/// Name under which a scanner-produced token is listed as external.
pub fn external_name(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Identifier => "_identifier",
        TokenKind::String => "_string",
        TokenKind::Number => "_number",
        TokenKind::JsonSpan => "_json_span",
        TokenKind::Annotation => "_annotation_marker",
        TokenKind::Comment => "_comment",
        TokenKind::DocComment => "_doc_comment",
        TokenKind::Eof => "_eof",
        TokenKind::Error(_) => "_error",
        TokenKind::Keyword(k) => k.as_str(),
        TokenKind::Punct(p) => p.as_str(),
    }
}

pub fn seq(members: impl IntoIterator<Item = Rule>) -> Rule {
    Rule::Seq(members.into_iter().collect())
}

pub fn choice(members: impl IntoIterator<Item = Rule>) -> Rule {
    Rule::Choice(members.into_iter().collect())
}

pub fn repeat(rule: Rule) -> Rule {
    Rule::Repeat(Box::new(rule))
}

pub fn repeat1(rule: Rule) -> Rule {
    Rule::Repeat1(Box::new(rule))
}

pub fn optional(rule: Rule) -> Rule {
    Rule::Optional(Box::new(rule))
}

pub fn tok(kind: TokenKind) -> Rule {
    Rule::Token(kind)
}

pub fn kw(keyword: Keyword) -> Rule {
    Rule::Token(TokenKind::Keyword(keyword))
}

pub fn p(punct: Punct) -> Rule {
    Rule::Token(TokenKind::Punct(punct))
}

pub fn sym(name: &'static str) -> Rule {
    Rule::Symbol(name)
}

pub fn field(name: &'static str, rule: Rule) -> Rule {
    Rule::Field(name, Box::new(rule))
}

pub fn alias(rule: Rule, name: &'static str) -> Rule {
    Rule::Alias(Box::new(rule), name)
}

/// `rule (',' rule)*`
pub fn comma_sep1(rule: Rule) -> Rule {
    seq([rule.clone(), repeat(seq([p(Punct::Comma), rule]))])
}

/// `(rule (',' rule)*)?`
pub fn comma_sep(rule: Rule) -> Rule {
    optional(comma_sep1(rule))
}

/// `(rule (',' rule)* ','?)?`
pub fn comma_sep_trailing(rule: Rule) -> Rule {
    optional(seq([rule.clone(), repeat(seq([p(Punct::Comma), rule])), optional(p(Punct::Comma))]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_are_collected_in_order() {
        let r = seq([sym("a"), optional(field("x", sym("b"))), alias(sym("c"), "d")]);
        assert_eq!(r.symbols(), ["a", "b", "c"]);
    }

    #[test]
    fn optional_renders_as_choice_with_blank() {
        let r = optional(kw(Keyword::Oneway));
        assert_eq!(
            r.to_json(),
            json!({"type": "CHOICE", "members": [{"type": "STRING", "value": "oneway"}, {"type": "BLANK"}]})
        );
        assert_eq!(tok(TokenKind::JsonSpan).to_json()["name"], "_json_span");
    }

    #[test]
    fn comma_separated_lists() {
        let r = comma_sep1(sym("x"));
        assert_eq!(r, seq([sym("x"), repeat(seq([p(Punct::Comma), sym("x")]))]));
        assert!(matches!(comma_sep(sym("x")), Rule::Optional(_)));
        let Rule::Optional(inner) = comma_sep_trailing(sym("x")) else {
            panic!("expected an optional list");
        };
        assert!(matches!(&*inner, Rule::Seq(members) if members.len() == 3));
    }
}
