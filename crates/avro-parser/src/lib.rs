//! Error-tolerant concrete syntax tree parser for Avro IDL and JSON schemas.
//!
//! The parser is a recursive-descent reading of the grammar in
//! `avro-grammar`, asking the scanner in `avro-scanner` for tokens with the
//! set of kinds valid at each point. It always produces a tree: malformed
//! input yields ERROR and MISSING nodes plus diagnostics, and only a
//! configured resource limit makes a parse fail outright.
//!
//! ```
//! use avro_parser::Parser;
//!
//! let tree = Parser::default().parse("record Point { int x; int y; }").unwrap();
//! assert_eq!(
//!     tree.to_sexp(),
//!     "(program (record_declaration name: (identifier) body: (record_body \
//!      (field_declaration type: (primitive_type) name: (identifier)) \
//!      (field_declaration type: (primitive_type) name: (identifier)))))"
//! );
//! ```

pub mod config;
mod idl;
mod json;
mod parser;
mod source;
pub mod tree;

pub use config::ParseConfig;
pub use parser::Parser;
pub use tree::Tree;

use avro_syntax::Result;

/// Parses `text` with the default configuration.
pub fn parse(text: &str) -> Result<Tree> {
    Parser::default().parse(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use avro_grammar::grammar;
    use avro_scanner::Mode;
    use avro_syntax::{ErrorKind, InputEdit, Node, NodeKind};
    use proptest::prelude::*;

    fn names<'a>(tree: &'a Node, kind: NodeKind, src: &'a str) -> Vec<&'a str> {
        tree.find_all(kind)
            .into_iter()
            .filter_map(|n| n.child_by_field_name("name"))
            .map(|n| n.text(src))
            .collect()
    }

    fn assert_labels_follow_grammar(node: &Node) {
        for child in &node.children {
            if let (Some(field), false) = (child.field, node.is_error()) {
                let allowed = grammar().fields(node.kind.as_str());
                assert!(
                    allowed.contains(field),
                    "{} has field `{field}`, grammar allows {allowed:?}",
                    node.kind
                );
            }
            assert_labels_follow_grammar(child);
        }
    }

    const PROTOCOL: &str = r#"
/** Messages about people. */
@namespace("org.example")
protocol People {
  import idl "common.avdl";

  enum Kind { FRIEND, FOE, } = FRIEND;
  fixed Id(16);

  record Person {
    string name;
    @order("ignore") union { null, int } age = null;
    array<string> tags = [], aliases;
    decimal(9, 2)? balance;
    timestamp_ms seen;
  }

  error Missing { string reason; }

  Person find(Id id, boolean exact = true) throws Missing;
  void poke(string who) oneway;
}
"#;

    #[test]
    fn test_parse_protocol() {
        let tree = parse(PROTOCOL).unwrap();
        assert_eq!(tree.mode, Mode::Idl);
        assert!(!tree.has_errors(), "{:?}\n{}", tree.diagnostics, tree.to_sexp());
        tree.root.check_invariants().unwrap();

        let protocol = tree.root.find(NodeKind::ProtocolDeclaration).unwrap();
        assert_eq!(protocol.member("name").unwrap().text(PROTOCOL), "People");
        assert_eq!(protocol.children[0].kind, NodeKind::Annotation);
        assert_eq!(tree.root.children[0].kind, NodeKind::DocComment);

        assert_eq!(names(&tree.root, NodeKind::RecordDeclaration, PROTOCOL), ["Person"]);
        assert_eq!(names(&tree.root, NodeKind::ErrorDeclaration, PROTOCOL), ["Missing"]);
        assert_eq!(names(&tree.root, NodeKind::MessageDeclaration, PROTOCOL), ["find", "poke"]);

        let person = tree.root.find(NodeKind::RecordDeclaration).unwrap();
        let fields = person.find_all(NodeKind::FieldDeclaration);
        assert_eq!(fields.len(), 5);
        assert_eq!(fields[1].member("default").unwrap().text(PROTOCOL), "null");
        assert_eq!(fields[2].children_by_field_name("name").count(), 2);
        assert_eq!(fields[3].member("type").unwrap().kind, NodeKind::NullableType);
        assert_eq!(fields[4].member("type").unwrap().kind, NodeKind::LogicalType);

        let kind = tree.root.find(NodeKind::EnumDeclaration).unwrap();
        assert_eq!(kind.find_all(NodeKind::EnumSymbol).len(), 2);
        let default = kind.member("default").unwrap();
        assert_eq!(default.member("value").unwrap().text(PROTOCOL), "FRIEND");

        let find = tree.root.find(NodeKind::MessageDeclaration).unwrap();
        assert_eq!(find.find_all(NodeKind::Parameter).len(), 2);
        assert!(find.find(NodeKind::ThrowsClause).is_some());
        assert_labels_follow_grammar(&tree.root);
    }

    #[test]
    fn test_parse_json_record() {
        let src = r#"{"type":"record","name":"A","fields":[{"name":"x","type":"int"}]}"#;
        let tree = parse(src).unwrap();
        assert_eq!(tree.mode, Mode::Json);
        assert!(!tree.has_errors(), "{:?}", tree.diagnostics);
        assert_eq!(tree.root.kind, NodeKind::Schema);

        let record = tree.root.named_children().next().unwrap();
        assert_eq!(record.kind, NodeKind::RecordDeclaration);
        assert_eq!(record.member("name").unwrap().text(src), "\"A\"");

        let fields = record.member("fields").unwrap();
        assert_eq!(fields.kind, NodeKind::FieldList);
        let declared = fields.find_all(NodeKind::FieldDeclaration);
        assert_eq!(declared.len(), 1);
        let ty = declared[0].member("type").unwrap();
        assert_eq!(ty.kind, NodeKind::PrimitiveType);
        assert_eq!(ty.text(src), "\"int\"");
    }

    #[test]
    fn test_json_default_span_is_exact() {
        let src = r#"{"type":"record","name":"R","fields":[{"name":"s","type":"string","default":"a}b"}]}"#;
        let tree = parse(src).unwrap();
        assert!(!tree.has_errors(), "{:?}", tree.diagnostics);
        let field = tree.root.find(NodeKind::FieldDeclaration).unwrap();
        let default = field.member("default").unwrap();
        assert_eq!(default.kind, NodeKind::JsonValue);
        assert_eq!(default.text(src), "\"a}b\"");
        let start = src.find("\"a}b\"").unwrap();
        assert_eq!(default.range.start_byte, start);
        assert_eq!(default.range.end_byte, start + 5);
    }

    #[test]
    fn test_json_kinds_are_classified() {
        let src = r#"[
            "null",
            {"type": "enum", "name": "Suit", "symbols": ["HEARTS", "SPADES"]},
            {"type": "array", "items": "Suit"},
            {"type": "map", "values": {"type": "fixed", "name": "Md5", "size": 16}},
            {"type": "long", "logicalType": "timestamp-millis"}
        ]"#;
        let tree = parse(src).unwrap();
        assert!(!tree.has_errors(), "{:?}", tree.diagnostics);
        let union = tree.root.named_children().next().unwrap();
        assert_eq!(union.kind, NodeKind::UnionType);
        let kinds: Vec<NodeKind> = union.named_children().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            [
                NodeKind::PrimitiveType,
                NodeKind::EnumDeclaration,
                NodeKind::ArrayType,
                NodeKind::MapType,
                NodeKind::LogicalType,
            ]
        );
        assert_eq!(tree.root.find_all(NodeKind::EnumSymbol).len(), 2);
        assert_eq!(tree.root.find(NodeKind::ArrayType).unwrap().member("items").unwrap().kind, NodeKind::TypeReference);
        assert!(tree.root.find(NodeKind::FixedDeclaration).is_some());
    }

    #[test]
    fn test_unterminated_comment_recovers() {
        let src = "record R { int x /* unterminated";
        let tree = parse(src).unwrap();

        let lexical: Vec<_> = tree.errors_of(ErrorKind::Lexical).collect();
        assert_eq!(lexical.len(), 1);
        assert_eq!(lexical[0].offset, Some(src.len()));

        let record = tree.root.find(NodeKind::RecordDeclaration).unwrap();
        assert_eq!(record.member("name").unwrap().text(src), "R");
        let field = record.find(NodeKind::FieldDeclaration).unwrap();
        assert!(field.children.iter().any(|c| c.is_error()));
        let missing: Vec<_> = record.descendants().filter(|n| n.is_missing).map(|n| n.kind.as_str()).collect();
        assert_eq!(missing, [";", "}"]);
        tree.root.check_invariants().unwrap();
    }

    #[test]
    fn test_missing_tokens_are_inserted() {
        let src = "record R { int x }";
        let tree = parse(src).unwrap();
        assert_eq!(tree.to_sexp(), "(program (record_declaration name: (identifier) body: (record_body (field_declaration type: (primitive_type) name: (identifier) (MISSING \";\")))))");
        assert_eq!(tree.diagnostics.len(), 1);
        assert_eq!(tree.diagnostics[0].msg, "missing `;`");
        assert_eq!(tree.diagnostics[0].offset, Some(16));
    }

    #[test]
    fn test_unexpected_tokens_are_wrapped() {
        let src = "enum E { A B, C, }";
        let tree = parse(src).unwrap();
        // `B` after `A` is read as a new symbol with a missing comma
        let body = tree.root.find(NodeKind::EnumBody).unwrap();
        assert_eq!(body.find_all(NodeKind::EnumSymbol).len(), 3);
        assert!(body.children.iter().any(|c| c.is_missing));

        let src = "record R { int x; ) }";
        let tree = parse(src).unwrap();
        let body = tree.root.find(NodeKind::RecordBody).unwrap();
        let error = body.children.iter().find(|c| c.is_error()).unwrap();
        assert_eq!(error.text(src), ")");
        assert_eq!(tree.diagnostics[0].msg, "unexpected `)`");
    }

    #[test]
    fn test_trailing_commas() {
        let tree = parse("record R { union { null, int, } u; }").unwrap();
        assert_eq!(tree.diagnostics.len(), 1);
        assert_eq!(tree.diagnostics[0].msg, "trailing comma");
        assert!(!parse("enum E { A, B, }").unwrap().has_errors());

        let json = r#"{"type": "enum", "name": "E", "symbols": ["A", "B",],}"#;
        let tree = parse(json).unwrap();
        assert!(!tree.has_errors(), "{:?}", tree.diagnostics);
        assert_eq!(tree.root.find(NodeKind::SymbolList).unwrap().named_children().count(), 2);
    }

    #[test]
    fn test_errors_stay_local() {
        let clean = "record A { int a; }\nrecord C { string c; }\n";
        let broken = "record A { int a; }\nrecord B { int = ; garbage ) }\nrecord C { string c; }\n";
        let clean = parse(clean).unwrap();
        let broken = parse(broken).unwrap();
        assert!(!clean.has_errors());
        assert!(broken.has_errors());

        let decls = |tree: &Tree| -> Vec<String> {
            tree.root
                .find_all(NodeKind::RecordDeclaration)
                .into_iter()
                .map(|n| n.to_sexp())
                .collect()
        };
        let clean_decls = decls(&clean);
        let broken_decls = decls(&broken);
        assert_eq!(broken_decls.len(), 3);
        assert_eq!(broken_decls[0], clean_decls[0]);
        assert_eq!(broken_decls[2], clean_decls[1]);
        assert!(broken_decls[1].contains("MISSING"));
    }

    #[test]
    fn test_unterminated_string_stays_in_its_record() {
        let clean = "record A { int a; }\nrecord C { string c; }\n";
        let broken = "record A { int a; }\nrecord B { string s = \"oops; }\nrecord C { string c; }\n";
        let clean_tree = parse(clean).unwrap();
        let broken_tree = parse(broken).unwrap();
        assert!(broken_tree.errors_of(ErrorKind::Lexical).next().is_some());

        let records = |tree: &Tree, src: &str| -> Vec<(String, String)> {
            tree.root
                .find_all(NodeKind::RecordDeclaration)
                .into_iter()
                .map(|n| (n.to_sexp(), n.text(src).to_string()))
                .collect()
        };
        let clean_records = records(&clean_tree, clean);
        let broken_records = records(&broken_tree, broken);
        assert_eq!(broken_records.len(), 3);
        assert_eq!(broken_records[0], clean_records[0]);
        assert_eq!(broken_records[2], clean_records[1]);
        assert!(broken_records[1].1.starts_with("record B { string s = \"oops; }"));
    }

    #[test]
    fn test_default_string_hides_its_brace() {
        let src = r#"protocol P { record R { string s = "a}b"; } }"#;
        let tree = parse(src).unwrap();
        assert!(!tree.has_errors(), "{:?}", tree.diagnostics);

        let field = tree.root.find(NodeKind::FieldDeclaration).unwrap();
        let default = field.child_by_field_name("default").unwrap();
        assert_eq!(default.kind, NodeKind::JsonValue);
        assert!(default.children.is_empty());
        assert_eq!(default.text(src), r#""a}b""#);

        let body = tree.root.find(NodeKind::RecordBody).unwrap();
        let close = body.children.last().unwrap();
        assert!(!close.is_missing);
        assert_eq!(close.range.start_byte, src.find("; }").unwrap() + 2);
        assert_eq!(body.text(src), r#"{ string s = "a}b"; }"#);
        let outer = tree.root.find(NodeKind::ProtocolBody).unwrap();
        assert_eq!(outer.end_byte(), src.len());
    }

    #[test]
    fn test_nullable_binds_inside_annotation() {
        let g = grammar();
        assert!(g.binds_tighter("nullable_type", "_annotated_type"));
        assert!(g.binds_tighter("annotation", "_variable"));

        let src = r#"record R { @java-class("X") string? s = null; }"#;
        let tree = parse(src).unwrap();
        assert!(!tree.has_errors(), "{:?}", tree.diagnostics);
        let field = tree.root.find(NodeKind::FieldDeclaration).unwrap();
        assert_eq!(field.children[0].kind, NodeKind::Annotation);
        let ty = field.member("type").unwrap();
        assert_eq!(ty.kind, NodeKind::NullableType);
        assert_eq!(ty.text(src), "string?");
        assert_eq!(ty.children[0].kind, NodeKind::PrimitiveType);
        assert_eq!(field.member("default").unwrap().text(src), "null");
    }

    #[test]
    fn test_contextual_keywords_as_names() {
        let src = "record R { string error; int `record`; }";
        let tree = parse(src).unwrap();
        assert!(!tree.has_errors(), "{:?}", tree.diagnostics);
        let fields = tree.root.find_all(NodeKind::FieldDeclaration);
        assert_eq!(fields[0].member("name").unwrap().text(src), "error");
        assert_eq!(fields[1].member("name").unwrap().text(src), "`record`");
    }

    #[test]
    fn test_reparse_after_doc_comment_edit() {
        let parser = Parser::default();
        let old_src = "/** A record. */\nrecord R {\n  int x;\n  string y;\n}\n";
        let at = old_src.find("record.").unwrap();
        let edit = InputEdit::replace(old_src, at, at, "X");
        let new_src = edit.apply(old_src, "X");

        let old = parser.parse(old_src).unwrap();
        let reparsed = parser.reparse(&old, &edit, &new_src).unwrap();
        let full = parser.parse(&new_src).unwrap();
        assert_eq!(reparsed.root, full.root);
        assert_eq!(reparsed.diagnostics, full.diagnostics);
        assert!(reparsed.reused_tokens > 0);
        assert_eq!(full.reused_tokens, 0);
    }

    #[test]
    fn test_resource_limits() {
        let small = ParseConfig {
            max_input_bytes: 8,
            ..ParseConfig::default()
        };
        let err = Parser::new(small).parse("record R {}").unwrap_err();
        assert!(err.is_resource_limit());

        let shallow = ParseConfig {
            max_nesting_depth: 4,
            ..ParseConfig::default()
        };
        let parser = Parser::new(shallow);
        assert!(parser.parse("record R { array<int> x; }").is_ok());
        let err = parser
            .parse("record R { array<array<array<array<array<int>>>>> x; }")
            .unwrap_err();
        assert!(err.is_resource_limit());
        let err = parser.parse(r#"[[[[[["int"]]]]]]"#).unwrap_err();
        assert!(err.is_resource_limit());
    }

    #[test]
    fn test_forced_mode() {
        let config = ParseConfig {
            mode: Some(Mode::Json),
            ..ParseConfig::default()
        };
        let tree = Parser::new(config).parse("\"int\"").unwrap();
        assert_eq!(tree.root.to_sexp(), "(schema (primitive_type))");
        // empty input settles nothing, so auto-detection reads IDL
        assert_eq!(parse("").unwrap().mode, Mode::Idl);
    }

    #[test]
    fn test_tree_json() {
        let tree = parse("fixed F(4);").unwrap();
        let json = tree.to_json();
        assert_eq!(json["mode"], "idl");
        assert_eq!(json["root"]["kind"], "program");
        assert_eq!(json["root"]["children"][0]["kind"], "fixed_declaration");
        assert!(json["diagnostics"].as_array().unwrap().is_empty());
    }

    const BASE: &str = "/** doc */\nrecord R {\n  int x = 1; // note\n  union { null, string } y;\n}\nenum E { A, B }\n";

    proptest! {
        #[test]
        fn prop_reparse_matches_full_parse(
            start in 0..=BASE.len(),
            removed in 0usize..4,
            inserted in "[a-z {};,=@/*\"<>]{0,3}",
        ) {
            let end = (start + removed).min(BASE.len());
            let parser = Parser::default();
            let old = parser.parse(BASE).unwrap();
            let edit = InputEdit::replace(BASE, start, end, &inserted);
            let new_src = edit.apply(BASE, &inserted);

            let reparsed = parser.reparse(&old, &edit, &new_src).unwrap();
            let full = parser.parse(&new_src).unwrap();
            prop_assert_eq!(&reparsed.root, &full.root);
            prop_assert_eq!(&reparsed.diagnostics, &full.diagnostics);
            prop_assert!(full.root.check_invariants().is_ok());
        }

        #[test]
        fn prop_any_input_gives_a_tree(src in "[a-z0-9 {}()<>\\[\\];,=@?:\"/*\n]{0,60}") {
            let tree = parse(&src).unwrap();
            prop_assert!(tree.root.check_invariants().is_ok());
            prop_assert!(tree.root.range.end_byte <= src.len());
        }
    }
}
