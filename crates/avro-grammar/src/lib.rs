//! Declarative grammar for Apache Avro schemas and IDL.
//!
//! The grammar is plain data: named [`Rule`] bodies, a precedence table keyed
//! by rule name, and the list of rules whose choices are knowingly ambiguous
//! on one token of lookahead. [`Grammar::validate`] checks the structural
//! invariants and [`Grammar::compile`] turns the rules into the immutable
//! [`ParseTable`] a driver consults. Both are shared process-wide through
//! [`grammar`] and [`table`].
//!
//! Precedences and conflicts describe how ambiguities resolve; they are
//! exported with the grammar and checked against the overlap report, but a
//! driver is free to encode the same choices in its own production order.

pub mod rule;
pub mod rules;
pub mod table;

use std::collections::{BTreeSet, HashMap, HashSet};

use avro_syntax::{NodeKind, TokenKind};
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

pub use rule::Rule;
pub use table::{Overlap, ParseTable, Resolution};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Assoc {
    None,
    Left,
    Right,
}

/// One precedence table entry, with the source construct it disambiguates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Precedence {
    pub rule: &'static str,
    pub level: i32,
    pub assoc: Assoc,
    pub construct: &'static str,
}

/// A rule whose choice is ambiguous on one token and is settled by the
/// driver, with the reason that makes this acceptable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub rule: &'static str,
    pub reason: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("rule `{0}` is defined more than once")]
    DuplicateRule(&'static str),
    #[error("start rule `{0}` is not defined")]
    MissingStart(&'static str),
    #[error("rule `{rule}` refers to undefined symbol `{symbol}`")]
    UndefinedSymbol { rule: &'static str, symbol: &'static str },
    #[error("rule `{0}` is unreachable from the start rules and extras")]
    Unreachable(&'static str),
    #[error("rule `{0}` cannot derive any finite token sequence")]
    Unproductive(&'static str),
    #[error("rule `{rule}` produces `{name}`, which is not a known node kind")]
    UnknownNodeKind { rule: &'static str, name: &'static str },
    #[error("node kind `{0}` is never produced by the grammar")]
    UncoveredNodeKind(&'static str),
    #[error("precedence entry names undefined rule `{0}`")]
    UnknownPrecedenceRule(&'static str),
    #[error("conflict entry names undefined rule `{0}`")]
    UnknownConflictRule(&'static str),
    #[error("in `{rule}`, `{first}` and `{second}` both start with {tokens}")]
    UnresolvedOverlap {
        rule: &'static str,
        first: String,
        second: String,
        tokens: String,
    },
}

/// A grammar: rules plus the tables that qualify them.
#[derive(Debug, Clone)]
pub struct Grammar {
    name: &'static str,
    starts: Vec<&'static str>,
    rules: Vec<(&'static str, Rule)>,
    extras: Vec<&'static str>,
    word: Option<&'static str>,
    externals: Vec<TokenKind>,
    precedences: Vec<Precedence>,
    conflicts: Vec<Conflict>,
}

impl Grammar {
    pub fn new(name: &'static str, starts: &[&'static str]) -> Self {
        Self {
            name,
            starts: starts.to_vec(),
            rules: Vec::new(),
            extras: Vec::new(),
            word: None,
            externals: Vec::new(),
            precedences: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    pub fn rule(mut self, name: &'static str, body: Rule) -> Self {
        self.rules.push((name, body));
        self
    }

    /// Declares a rule that may appear between any two symbols.
    pub fn extra(mut self, name: &'static str) -> Self {
        self.extras.push(name);
        self
    }

    /// Declares the rule keywords are carved out of.
    pub fn word(mut self, name: &'static str) -> Self {
        self.word = Some(name);
        self
    }

    /// Declares a token produced by the external scanner.
    pub fn external(mut self, kind: TokenKind) -> Self {
        self.externals.push(kind);
        self
    }

    pub fn prec(mut self, entry: Precedence) -> Self {
        self.precedences.push(entry);
        self
    }

    pub fn conflict(mut self, entry: Conflict) -> Self {
        self.conflicts.push(entry);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn starts(&self) -> &[&'static str] {
        &self.starts
    }

    pub fn extras(&self) -> &[&'static str] {
        &self.extras
    }

    pub fn word_rule(&self) -> Option<&'static str> {
        self.word
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn precedences(&self) -> &[Precedence] {
        &self.precedences
    }

    /// The body of rule `name`.
    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|(n, _)| *n == name).map(|(_, r)| r)
    }

    pub fn rules(&self) -> impl Iterator<Item = (&'static str, &Rule)> {
        self.rules.iter().map(|(n, r)| (*n, r))
    }

    /// The precedence table entry for `rule`.
    pub fn precedence(&self, rule: &str) -> Option<&Precedence> {
        self.precedences.iter().find(|p| p.rule == rule)
    }

    /// True when `a` has a strictly higher precedence level than `b`. Rules
    /// without an entry sit at level 0.
    pub fn binds_tighter(&self, a: &str, b: &str) -> bool {
        let level = |r: &str| self.precedence(r).map_or(0, |p| p.level);
        level(a) > level(b)
    }

    /// Names of the nodes this grammar can produce: visible rules and alias
    /// targets. Rules whose name starts with `_` are inlined.
    pub fn node_kinds(&self) -> BTreeSet<&'static str> {
        let mut out = BTreeSet::new();
        for (name, body) in self.rules() {
            if is_visible(name) {
                out.insert(name);
            }
            body.walk(&mut |r| {
                if let Rule::Alias(_, target) = r {
                    out.insert(*target);
                }
            });
        }
        out
    }

    /// Field labels that can appear directly on children of nodes named
    /// `kind`, looking through inlined rules.
    pub fn fields(&self, kind: &str) -> BTreeSet<&'static str> {
        let mut out = BTreeSet::new();
        let mut seen = HashSet::new();
        let mut bodies: Vec<&Rule> = Vec::new();
        for (name, body) in self.rules() {
            if name == kind {
                bodies.push(body);
            }
            body.walk(&mut |r| {
                if let Rule::Alias(inner, target) = r {
                    if *target == kind {
                        bodies.push(inner);
                    }
                }
            });
        }
        while let Some(body) = bodies.pop() {
            body.walk(&mut |r| match r {
                Rule::Field(label, _) => {
                    out.insert(*label);
                }
                Rule::Symbol(name) if !is_visible(name) && seen.insert(*name) => {
                    if let Some(inner) = self.get(name) {
                        bodies.push(inner);
                    }
                }
                _ => {}
            });
        }
        out
    }

    /// Checks the grammar's structural invariants, reporting every violation.
    pub fn validate(&self) -> Result<(), Vec<GrammarError>> {
        let mut errors = Vec::new();
        let defined: HashMap<&str, &Rule> = self.rules().collect();

        let mut seen = HashSet::new();
        for (name, _) in self.rules() {
            if !seen.insert(name) {
                errors.push(GrammarError::DuplicateRule(name));
            }
        }
        for start in &self.starts {
            if !defined.contains_key(start) {
                errors.push(GrammarError::MissingStart(*start));
            }
        }
        for extra in self.extras.iter().chain(self.word.iter()) {
            if !defined.contains_key(extra) {
                errors.push(GrammarError::UndefinedSymbol { rule: self.name, symbol: *extra });
            }
        }
        for (name, body) in self.rules() {
            for symbol in body.symbols() {
                if !defined.contains_key(symbol) {
                    errors.push(GrammarError::UndefinedSymbol { rule: name, symbol });
                }
            }
        }

        let reachable = self.reachable(&defined);
        for (name, _) in self.rules() {
            if !reachable.contains(name) {
                errors.push(GrammarError::Unreachable(name));
            }
        }

        let productive = self.productive();
        for (name, _) in self.rules() {
            if !productive.contains(name) {
                errors.push(GrammarError::Unproductive(name));
            }
        }

        let produced = self.node_kinds();
        for &name in &produced {
            if NodeKind::from_name(name).is_none() {
                let rule = self
                    .rules()
                    .find(|(n, body)| *n == name || body_aliases(body, name))
                    .map_or(name, |(n, _)| n);
                errors.push(GrammarError::UnknownNodeKind { rule, name });
            }
        }
        for kind in NodeKind::ALL {
            if kind != NodeKind::Error && !produced.contains(kind.as_str()) {
                errors.push(GrammarError::UncoveredNodeKind(kind.as_str()));
            }
        }

        for entry in &self.precedences {
            if !defined.contains_key(entry.rule) {
                errors.push(GrammarError::UnknownPrecedenceRule(entry.rule));
            }
        }
        for entry in &self.conflicts {
            if !defined.contains_key(entry.rule) {
                errors.push(GrammarError::UnknownConflictRule(entry.rule));
            }
        }

        for overlap in self.compile().overlaps() {
            if overlap.resolution == Resolution::Unresolved {
                errors.push(GrammarError::UnresolvedOverlap {
                    rule: overlap.rule,
                    first: overlap.first.clone(),
                    second: overlap.second.clone(),
                    tokens: overlap.tokens.describe(),
                });
            }
        }

        if errors.is_empty() {
            tracing::debug!(grammar = self.name, rules = self.rules.len(), "grammar validated");
            Ok(())
        } else {
            for e in &errors {
                tracing::warn!(grammar = self.name, "{e}");
            }
            Err(errors)
        }
    }

    fn reachable(&self, defined: &HashMap<&str, &Rule>) -> HashSet<&'static str> {
        let mut seen: HashSet<&'static str> = HashSet::new();
        let mut work: Vec<&'static str> = self
            .starts
            .iter()
            .chain(&self.extras)
            .chain(self.word.iter())
            .copied()
            .collect();
        while let Some(name) = work.pop() {
            if !seen.insert(name) {
                continue;
            }
            if let Some(body) = defined.get(name) {
                work.extend(body.symbols());
            }
        }
        seen
    }

    fn productive(&self) -> HashSet<&'static str> {
        fn derives(rule: &Rule, done: &HashSet<&'static str>) -> bool {
            match rule {
                Rule::Token(_) | Rule::Repeat(_) | Rule::Optional(_) => true,
                Rule::Symbol(name) => done.contains(name),
                Rule::Seq(members) => members.iter().all(|m| derives(m, done)),
                Rule::Choice(members) => members.iter().any(|m| derives(m, done)),
                Rule::Repeat1(inner) | Rule::Field(_, inner) | Rule::Alias(inner, _) => {
                    derives(inner, done)
                }
            }
        }

        let mut done = HashSet::new();
        loop {
            let before = done.len();
            for (name, body) in self.rules() {
                if !done.contains(name) && derives(body, &done) {
                    done.insert(name);
                }
            }
            if done.len() == before {
                return done;
            }
        }
    }

    pub fn compile(&self) -> ParseTable {
        ParseTable::build(self)
    }

    /// The grammar as a tree-sitter style `grammar.json` document.
    pub fn to_json(&self) -> Value {
        let mut rules = Map::new();
        for (name, body) in self.rules() {
            rules.insert(name.to_string(), body.to_json());
        }
        json!({
            "name": self.name,
            "word": self.word,
            "rules": rules,
            "extras": self
                .extras
                .iter()
                .map(|e| json!({ "type": "SYMBOL", "name": e }))
                .collect::<Vec<_>>(),
            "externals": self
                .externals
                .iter()
                .map(|k| json!({ "type": "SYMBOL", "name": rule::external_name(*k) }))
                .collect::<Vec<_>>(),
            "conflicts": self.conflicts.iter().map(|c| vec![c.rule]).collect::<Vec<_>>(),
            "precedences": self.precedences,
            "supertypes": [],
        })
    }
}

fn is_visible(name: &str) -> bool {
    !name.starts_with('_')
}

fn body_aliases(body: &Rule, name: &str) -> bool {
    let mut found = false;
    body.walk(&mut |r| {
        if let Rule::Alias(_, target) = r {
            found |= *target == name;
        }
    });
    found
}

static GRAMMAR: Lazy<Grammar> = Lazy::new(rules::avro);

static TABLE: Lazy<ParseTable> = Lazy::new(|| {
    let grammar = grammar();
    if let Err(errors) = grammar.validate() {
        tracing::error!(count = errors.len(), "built-in grammar failed validation");
    }
    grammar.compile()
});

/// The Avro grammar, built once.
pub fn grammar() -> &'static Grammar {
    &GRAMMAR
}

/// The compiled tables for [`grammar`], built once.
pub fn table() -> &'static ParseTable {
    &TABLE
}
