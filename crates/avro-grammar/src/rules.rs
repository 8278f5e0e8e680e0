//! The Avro grammar: IDL productions rooted at `program`, JSON productions
//! rooted at `schema`.

use avro_syntax::{Keyword, Punct, TokenKind};

use crate::rule::{alias, choice, comma_sep, comma_sep1, comma_sep_trailing, field, kw, optional, p, repeat, seq, sym, tok, Rule};
use crate::{Assoc, Conflict, Grammar, Precedence};

// Precedence levels, lowest first.
pub const PREC_TRAILING: i32 = -1;
pub const PREC_ASSIGN: i32 = 0;
pub const PREC_ANNOTATED: i32 = 6;
pub const PREC_NULLABLE: i32 = 7;
pub const PREC_ANNOTATION: i32 = 8;
pub const PREC_MEMBER: i32 = 9;

fn annotations() -> Rule {
    repeat(sym("annotation"))
}

fn idl_rules() -> Vec<(&'static str, Rule)> {
    vec![
        ("program", repeat(sym("_declaration"))),
        (
            "_declaration",
            choice([
                sym("namespace_statement"),
                sym("schema_declaration"),
                sym("protocol_declaration"),
                sym("import_declaration"),
                sym("record_declaration"),
                sym("error_declaration"),
                sym("enum_declaration"),
                sym("fixed_declaration"),
                sym("message_declaration"),
            ]),
        ),
        (
            "namespace_statement",
            seq([kw(Keyword::Namespace), field("name", sym("identifier")), p(Punct::Semicolon)]),
        ),
        (
            "schema_declaration",
            seq([kw(Keyword::Schema), field("type", sym("_type")), p(Punct::Semicolon)]),
        ),
        (
            "protocol_declaration",
            seq([
                annotations(),
                kw(Keyword::Protocol),
                field("name", sym("identifier")),
                field("body", sym("protocol_body")),
            ]),
        ),
        (
            "protocol_body",
            seq([p(Punct::LBrace), repeat(sym("_protocol_member")), p(Punct::RBrace)]),
        ),
        (
            "_protocol_member",
            choice([
                sym("import_declaration"),
                sym("record_declaration"),
                sym("error_declaration"),
                sym("enum_declaration"),
                sym("fixed_declaration"),
                sym("message_declaration"),
            ]),
        ),
        (
            "import_declaration",
            seq([
                kw(Keyword::Import),
                field("kind", sym("import_kind")),
                field("path", sym("string")),
                p(Punct::Semicolon),
            ]),
        ),
        (
            "import_kind",
            choice([kw(Keyword::Protocol), kw(Keyword::Schema), tok(TokenKind::Identifier)]),
        ),
        (
            "record_declaration",
            seq([
                annotations(),
                kw(Keyword::Record),
                field("name", sym("identifier")),
                field("body", sym("record_body")),
            ]),
        ),
        (
            "error_declaration",
            seq([
                annotations(),
                kw(Keyword::Error),
                field("name", sym("identifier")),
                field("body", sym("record_body")),
            ]),
        ),
        (
            "record_body",
            seq([p(Punct::LBrace), repeat(sym("field_declaration")), p(Punct::RBrace)]),
        ),
        (
            "field_declaration",
            seq([
                field("type", sym("_type")),
                sym("_variable"),
                repeat(seq([p(Punct::Comma), sym("_variable")])),
                p(Punct::Semicolon),
            ]),
        ),
        (
            "_variable",
            seq([
                annotations(),
                field("name", sym("identifier")),
                optional(seq([p(Punct::Equals), field("default", sym("json_value"))])),
            ]),
        ),
        (
            "enum_declaration",
            seq([
                annotations(),
                kw(Keyword::Enum),
                field("name", sym("identifier")),
                field("body", sym("enum_body")),
                optional(field("default", sym("enum_default"))),
            ]),
        ),
        (
            "enum_body",
            seq([
                p(Punct::LBrace),
                comma_sep_trailing(sym("enum_symbol")),
                p(Punct::RBrace),
            ]),
        ),
        ("enum_symbol", tok(TokenKind::Identifier)),
        (
            "enum_default",
            seq([p(Punct::Equals), field("value", sym("identifier")), p(Punct::Semicolon)]),
        ),
        (
            "fixed_declaration",
            seq([
                annotations(),
                kw(Keyword::Fixed),
                field("name", sym("identifier")),
                p(Punct::LParen),
                field("size", sym("number")),
                p(Punct::RParen),
                p(Punct::Semicolon),
            ]),
        ),
        (
            "message_declaration",
            seq([
                annotations(),
                field("return", sym("_return_type")),
                field("name", sym("identifier")),
                field("parameters", sym("parameter_list")),
                optional(choice([sym("throws_clause"), sym("oneway")])),
                p(Punct::Semicolon),
            ]),
        ),
        ("_return_type", choice([sym("void_type"), sym("_type")])),
        ("void_type", kw(Keyword::Void)),
        ("oneway", kw(Keyword::Oneway)),
        (
            "parameter_list",
            seq([p(Punct::LParen), comma_sep(sym("parameter")), p(Punct::RParen)]),
        ),
        (
            "parameter",
            seq([
                field("type", sym("_type")),
                field("name", sym("identifier")),
                optional(seq([p(Punct::Equals), field("default", sym("json_value"))])),
            ]),
        ),
        (
            "throws_clause",
            seq([kw(Keyword::Throws), comma_sep1(sym("type_reference"))]),
        ),
        (
            "annotation",
            seq([
                field("name", sym("annotation_name")),
                p(Punct::LParen),
                field("value", sym("json_value")),
                p(Punct::RParen),
            ]),
        ),
        ("annotation_name", tok(TokenKind::Annotation)),
        ("_type", choice([sym("_annotated_type"), sym("_unannotated_type")])),
        ("_annotated_type", seq([sym("annotation"), sym("_type")])),
        ("_unannotated_type", choice([sym("nullable_type"), sym("_base_type")])),
        ("nullable_type", seq([sym("_base_type"), p(Punct::Question)])),
        (
            "_base_type",
            choice([
                sym("primitive_type"),
                sym("logical_type"),
                sym("decimal_type"),
                sym("array_type"),
                sym("map_type"),
                sym("union_type"),
                sym("type_reference"),
            ]),
        ),
        ("primitive_type", choice(Keyword::PRIMITIVES.map(kw))),
        ("logical_type", choice(Keyword::LOGICAL.map(kw))),
        (
            "decimal_type",
            seq([
                kw(Keyword::Decimal),
                p(Punct::LParen),
                field("precision", sym("number")),
                optional(seq([p(Punct::Comma), field("scale", sym("number"))])),
                p(Punct::RParen),
            ]),
        ),
        (
            "array_type",
            seq([kw(Keyword::Array), p(Punct::LAngle), field("items", sym("_type")), p(Punct::RAngle)]),
        ),
        (
            "map_type",
            seq([kw(Keyword::Map), p(Punct::LAngle), field("values", sym("_type")), p(Punct::RAngle)]),
        ),
        (
            "union_type",
            seq([kw(Keyword::Union), p(Punct::LBrace), comma_sep(sym("_type")), p(Punct::RBrace)]),
        ),
        ("type_reference", tok(TokenKind::Identifier)),
    ]
}

fn json_rules() -> Vec<(&'static str, Rule)> {
    let object = || sym("_json_object");
    vec![
        ("schema", sym("_schema_value")),
        (
            "_schema_value",
            choice([
                alias(sym("string"), "primitive_type"),
                alias(sym("string"), "type_reference"),
                alias(object(), "record_declaration"),
                alias(object(), "error_declaration"),
                alias(object(), "enum_declaration"),
                alias(object(), "fixed_declaration"),
                alias(object(), "array_type"),
                alias(object(), "map_type"),
                alias(object(), "logical_type"),
                alias(object(), "primitive_type"),
                alias(object(), "protocol_declaration"),
                alias(object(), "json_object"),
                alias(sym("_json_array"), "union_type"),
            ]),
        ),
        (
            "_json_object",
            seq([p(Punct::LBrace), comma_sep_trailing(sym("json_pair")), p(Punct::RBrace)]),
        ),
        (
            "_json_array",
            seq([p(Punct::LBracket), comma_sep_trailing(sym("_schema_value")), p(Punct::RBracket)]),
        ),
        (
            "json_pair",
            seq([
                field("key", sym("string")),
                p(Punct::Colon),
                field("value", sym("_json_member_value")),
            ]),
        ),
        (
            "_json_member_value",
            choice([
                sym("_schema_value"),
                sym("field_list"),
                sym("symbol_list"),
                sym("type_list"),
                sym("json_value"),
            ]),
        ),
        (
            "field_list",
            seq([
                p(Punct::LBracket),
                comma_sep_trailing(alias(object(), "field_declaration")),
                p(Punct::RBracket),
            ]),
        ),
        (
            "symbol_list",
            seq([
                p(Punct::LBracket),
                comma_sep_trailing(alias(sym("string"), "enum_symbol")),
                p(Punct::RBracket),
            ]),
        ),
        (
            "type_list",
            seq([p(Punct::LBracket), comma_sep_trailing(sym("_schema_value")), p(Punct::RBracket)]),
        ),
    ]
}

fn leaf_rules() -> Vec<(&'static str, Rule)> {
    vec![
        ("identifier", tok(TokenKind::Identifier)),
        ("string", tok(TokenKind::String)),
        ("number", tok(TokenKind::Number)),
        ("json_value", tok(TokenKind::JsonSpan)),
        ("comment", tok(TokenKind::Comment)),
        ("doc_comment", tok(TokenKind::DocComment)),
    ]
}

/// The precedence table is declarative. It labels the overlaps that
/// the parse table reports and records how each ambiguity resolves for
/// consumers of the exported grammar; the recursive-descent driver in
/// `avro-parser` encodes the same resolutions in the order it tries
/// productions and does not read this table.
fn precedences() -> Vec<Precedence> {
    let member = |rule| Precedence {
        rule,
        level: PREC_MEMBER,
        assoc: Assoc::None,
        construct: "annotations in front of a protocol member belong to that member: \
                    `@aliases([\"Old\"]) record R {}` annotates R, not the declaration before it",
    };
    vec![
        Precedence {
            rule: "annotation",
            level: PREC_ANNOTATION,
            assoc: Assoc::None,
            construct: "`int @order(\"ignore\") x = 1;` the annotation binds to the variable \
                        `x` before the `= 1` default is considered",
        },
        Precedence {
            rule: "nullable_type",
            level: PREC_NULLABLE,
            assoc: Assoc::Left,
            construct: "`@java-class(\"X\") string?` the `?` applies to `string` only; the \
                        annotation wraps the nullable type from outside",
        },
        Precedence {
            rule: "_annotated_type",
            level: PREC_ANNOTATED,
            assoc: Assoc::Right,
            construct: "`@a(1) @b(2) T` annotations nest to the right over the type they prefix",
        },
        Precedence {
            rule: "_variable",
            level: PREC_ASSIGN,
            assoc: Assoc::Right,
            construct: "`string s = \"a\";` the default assignment binds loosest and to the right",
        },
        Precedence {
            rule: "parameter",
            level: PREC_ASSIGN,
            assoc: Assoc::Right,
            construct: "`void ping(int n = 1)` parameter defaults bind like field defaults",
        },
        Precedence {
            rule: "enum_body",
            level: PREC_TRAILING,
            assoc: Assoc::None,
            construct: "`enum E { A, B, }` a `,` followed by `}` closes the symbol list \
                        instead of expecting another symbol",
        },
        Precedence {
            rule: "_json_object",
            level: PREC_TRAILING,
            assoc: Assoc::None,
            construct: "`{\"name\": \"A\",}` a `,` followed by `}` closes the object instead of \
                        expecting another member",
        },
        Precedence {
            rule: "_json_array",
            level: PREC_TRAILING,
            assoc: Assoc::None,
            construct: "`[\"null\", \"int\",]` a `,` followed by `]` closes the union",
        },
        member("protocol_declaration"),
        member("record_declaration"),
        member("error_declaration"),
        member("enum_declaration"),
        member("fixed_declaration"),
        member("message_declaration"),
    ]
}

fn conflicts() -> Vec<Conflict> {
    vec![
        Conflict {
            rule: "_declaration",
            reason: "every annotatable declaration starts with `@name(...)`; the parser reads \
                     the annotations first and dispatches on the keyword after them",
        },
        Conflict {
            rule: "_protocol_member",
            reason: "as for top-level declarations, annotations precede the keyword or the \
                     return type of a message",
        },
        Conflict {
            rule: "_schema_value",
            reason: "JSON schema kinds share `{` and string openers; the parser classifies an \
                     object by its \"type\" member and a string by its content",
        },
        Conflict {
            rule: "_json_member_value",
            reason: "arrays under \"fields\", \"symbols\" and \"types\" are lists, elsewhere \
                     an array is a union; the member key decides",
        },
    ]
}

/// Builds the complete Avro grammar.
pub fn avro() -> Grammar {
    let mut grammar = Grammar::new("avro", &["program", "schema"])
        .word("identifier")
        .extra("comment")
        .extra("doc_comment");
    for kind in [
        TokenKind::Identifier,
        TokenKind::String,
        TokenKind::Number,
        TokenKind::JsonSpan,
        TokenKind::Annotation,
        TokenKind::Comment,
        TokenKind::DocComment,
        TokenKind::Error(avro_syntax::LexErrorKind::UnexpectedCharacter),
    ] {
        grammar = grammar.external(kind);
    }
    for (name, rule) in idl_rules().into_iter().chain(json_rules()).chain(leaf_rules()) {
        grammar = grammar.rule(name, rule);
    }
    for prec in precedences() {
        grammar = grammar.prec(prec);
    }
    for conflict in conflicts() {
        grammar = grammar.conflict(conflict);
    }
    grammar
}
