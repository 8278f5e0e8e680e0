//! Compiled lookup tables: FIRST sets, nullable rules and the report of
//! choices whose alternatives start with the same token.

use std::collections::{HashMap, HashSet};

use avro_syntax::TokenSet;
use serde::Serialize;

use crate::rule::Rule;
use crate::Grammar;

/// How an overlap between two alternatives of a choice is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// The alternatives have distinct precedence levels.
    Precedence,
    /// The enclosing rule is listed among the grammar's conflicts.
    Declared,
    Unresolved,
}

/// Two alternatives of one choice that can begin with the same token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overlap {
    pub rule: &'static str,
    pub first: String,
    pub second: String,
    #[serde(serialize_with = "serialize_set")]
    pub tokens: TokenSet,
    pub resolution: Resolution,
}

fn serialize_set<S: serde::Serializer>(set: &TokenSet, s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(set.iter().map(|k| k.describe()))
}

/// Immutable tables compiled from a [`Grammar`].
#[derive(Debug, Clone, Default)]
pub struct ParseTable {
    first: HashMap<&'static str, TokenSet>,
    nullable: HashSet<&'static str>,
    overlaps: Vec<Overlap>,
}

impl ParseTable {
    pub fn build(grammar: &Grammar) -> ParseTable {
        let mut table = ParseTable::default();

        // FIRST and nullable grow monotonically, so iterate to a fixed point.
        loop {
            let mut changed = false;
            for (name, body) in grammar.rules() {
                let (set, nullable) = table.first_of_rule(body);
                let entry = table.first.entry(name).or_default();
                if set.union(*entry) != *entry {
                    *entry |= set;
                    changed = true;
                }
                if nullable && table.nullable.insert(name) {
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let mut overlaps = Vec::new();
        for (name, body) in grammar.rules() {
            body.walk(&mut |r| {
                if let Rule::Choice(alternatives) = r {
                    table.choice_overlaps(grammar, name, alternatives, &mut overlaps);
                }
            });
        }
        table.overlaps = overlaps;
        table
    }

    fn choice_overlaps(
        &self,
        grammar: &Grammar,
        rule: &'static str,
        alternatives: &[Rule],
        out: &mut Vec<Overlap>,
    ) {
        let firsts: Vec<TokenSet> = alternatives.iter().map(|a| self.first_of_rule(a).0).collect();
        for i in 0..alternatives.len() {
            for j in i + 1..alternatives.len() {
                let tokens = firsts[i].intersection(firsts[j]);
                if tokens.is_empty() {
                    continue;
                }
                let (a, b) = (&alternatives[i], &alternatives[j]);
                let resolution = if alternative_level(grammar, a) != alternative_level(grammar, b) {
                    Resolution::Precedence
                } else if grammar.conflicts().iter().any(|c| c.rule == rule) {
                    Resolution::Declared
                } else {
                    Resolution::Unresolved
                };
                out.push(Overlap {
                    rule,
                    first: alternative_label(a, i),
                    second: alternative_label(b, j),
                    tokens,
                    resolution,
                });
            }
        }
    }

    /// FIRST set of a named rule; empty for unknown names.
    pub fn first(&self, rule: &str) -> TokenSet {
        self.first.get(rule).copied().unwrap_or_default()
    }

    /// Union of the FIRST sets of several rules.
    pub fn first_of(&self, rules: &[&str]) -> TokenSet {
        rules.iter().fold(TokenSet::EMPTY, |set, r| set | self.first(r))
    }

    pub fn is_nullable(&self, rule: &str) -> bool {
        self.nullable.contains(rule)
    }

    pub fn overlaps(&self) -> &[Overlap] {
        &self.overlaps
    }

    /// FIRST set of a rule body and whether it can match nothing, using the
    /// sets computed so far.
    pub fn first_of_rule(&self, rule: &Rule) -> (TokenSet, bool) {
        match rule {
            Rule::Token(kind) => (TokenSet::single(*kind), false),
            Rule::Symbol(name) => (self.first(name), self.is_nullable(name)),
            Rule::Seq(members) => {
                let mut set = TokenSet::EMPTY;
                for m in members {
                    let (first, nullable) = self.first_of_rule(m);
                    set |= first;
                    if !nullable {
                        return (set, false);
                    }
                }
                (set, true)
            }
            Rule::Choice(members) => members.iter().fold((TokenSet::EMPTY, false), |(set, n), m| {
                let (first, nullable) = self.first_of_rule(m);
                (set | first, n || nullable)
            }),
            Rule::Repeat(inner) | Rule::Optional(inner) => (self.first_of_rule(inner).0, true),
            Rule::Repeat1(inner) | Rule::Field(_, inner) | Rule::Alias(inner, _) => {
                self.first_of_rule(inner)
            }
        }
    }
}

/// The rule an alternative stands for, looking through fields and aliases.
fn alternative_symbol(rule: &Rule) -> Option<&'static str> {
    match rule {
        Rule::Symbol(name) => Some(*name),
        Rule::Field(_, inner) | Rule::Alias(inner, _) => alternative_symbol(inner),
        _ => None,
    }
}

fn alternative_level(grammar: &Grammar, rule: &Rule) -> i32 {
    alternative_symbol(rule)
        .and_then(|name| grammar.precedence(name))
        .map_or(0, |p| p.level)
}

fn alternative_label(rule: &Rule, index: usize) -> String {
    match (rule, alternative_symbol(rule)) {
        (Rule::Alias(_, alias), _) => alias.to_string(),
        (_, Some(name)) => name.to_string(),
        (_, None) => format!("alternative #{}", index + 1),
    }
}

#[cfg(test)]
mod tests {
    use avro_syntax::{Keyword, Punct, TokenKind};

    use super::*;
    use crate::rule::{choice, kw, optional, p, repeat, seq, sym, tok};

    fn toy() -> Grammar {
        Grammar::new("toy", &["start"])
            .rule("start", seq([repeat(sym("item")), tok(TokenKind::Eof)]))
            .rule("item", choice([sym("word"), sym("pair")]))
            .rule("word", tok(TokenKind::Identifier))
            .rule("pair", seq([optional(kw(Keyword::Null)), p(Punct::LBrace), p(Punct::RBrace)]))
    }

    #[test]
    fn first_sets_see_through_nullable_prefixes() {
        let table = ParseTable::build(&toy());
        assert_eq!(
            table.first("pair"),
            TokenSet::of(&[TokenKind::Keyword(Keyword::Null), TokenKind::Punct(Punct::LBrace)])
        );
        assert!(table.first("start").contains(TokenKind::Eof));
        assert!(table.first("start").contains(TokenKind::Identifier));
        assert!(!table.is_nullable("start"));
        assert!(table.overlaps().is_empty());
    }

    #[test]
    fn overlapping_alternatives_are_reported() {
        let g = Grammar::new("toy", &["start"])
            .rule("start", choice([sym("a"), sym("b")]))
            .rule("a", tok(TokenKind::Identifier))
            .rule("b", seq([tok(TokenKind::Identifier), p(Punct::Question)]));
        let table = ParseTable::build(&g);
        let overlap = &table.overlaps()[0];
        assert_eq!((overlap.first.as_str(), overlap.second.as_str()), ("a", "b"));
        assert_eq!(overlap.resolution, Resolution::Unresolved);
        assert_eq!(overlap.tokens, TokenSet::single(TokenKind::Identifier));
    }
}
