use super::*;
use crate::{
    compile::parse_unchecked,
    file::MemoryFileResolver,
    tree::{Pool, TypeId},
    Compiler, Error,
};

fn compile(source: &str) -> Result<Compiler, Error> {
    let mut resolver = MemoryFileResolver::new();
    resolver.add("test.proto", source);
    let mut compiler = Compiler::with_file_resolver(resolver);
    compiler.open_file("test.proto")?;
    Ok(compiler)
}

fn parse(source: &str) -> (Pool, FileId) {
    let mut pool = Pool::default();
    let (file, _) =
        parse_unchecked(&mut pool, &MemoryFileResolver::new(), "test.proto", source).unwrap();
    (pool, file)
}

macro_rules! case {
    ($source:expr => Err(like $pattern:pat)) => {
        let err = compile($source).unwrap_err();
        assert!(
            matches!(err.source_kind(), Some($pattern)),
            "unexpected error {:?}",
            err
        );
    };
    ($source:expr => Err($kind:expr)) => {
        let err = compile($source).unwrap_err();
        assert_eq!(err.source_kind(), Some(&$kind));
    };
}

fn message(pool: &Pool, scope: ScopeId, name: &str) -> MessageId {
    pool.scope(scope).messages[name]
}

fn field(pool: &Pool, message: MessageId, number: u32) -> &FieldData {
    &pool[pool[message].fields[&number]]
}

#[test]
fn scalar_fields() {
    let (pool, file) = parse("message Foo { optional int32 a = 1; repeated string b = 2; bytes c = 3; }");
    let foo = message(&pool, ScopeId::File(file), "Foo");

    let a = field(&pool, foo, 1);
    assert_eq!(a.ty, FieldTy::Scalar(Scalar::Int32));
    assert_eq!(a.label, Some(Specifier::Optional));
    assert_eq!(a.cardinality, Cardinality::Singular);

    let b = field(&pool, foo, 2);
    assert_eq!(b.ty, FieldTy::Scalar(Scalar::String));
    assert_eq!(b.cardinality, Cardinality::Repeated);

    let c = field(&pool, foo, 3);
    assert_eq!(c.ty, FieldTy::Scalar(Scalar::Bytes));
    assert_eq!(c.label, None);
    assert_eq!(c.cardinality, Cardinality::Singular);
}

#[test]
fn self_reference_resolved_while_parsing() {
    let (pool, file) = parse(
        "message Outer { message Inner {} optional Inner x = 1; optional Outer y = 2; }",
    );
    let outer = message(&pool, ScopeId::File(file), "Outer");
    let inner = message(&pool, ScopeId::Message(outer), "Inner");

    assert_eq!(pool[inner].full_name, "Outer.Inner");
    assert_eq!(
        field(&pool, outer, 1).ty,
        FieldTy::Named(TypeRef::Resolved(TypeId::Message(inner)))
    );
    assert_eq!(
        field(&pool, outer, 2).ty,
        FieldTy::Named(TypeRef::Resolved(TypeId::Message(outer)))
    );
}

#[test]
fn forward_reference_left_unresolved() {
    let (pool, file) = parse("message A { optional B b = 1; } message B {}");
    let a = message(&pool, ScopeId::File(file), "A");

    assert_eq!(
        field(&pool, a, 1).ty,
        FieldTy::Named(TypeRef::Unresolved("B".to_owned()))
    );
}

#[test]
fn forward_reference_resolved_after_parsing() {
    let compiler = compile("message A { optional B b = 1; } message B {}").unwrap();
    let file = compiler.file("test.proto").unwrap();
    let a = file.get_message("A").unwrap();

    assert_eq!(a.get_field(1).unwrap().ty().name(), "B");
}

#[test]
fn scopes_are_linked_before_their_bodies() {
    let (pool, file) = parse("package pkg; message A { message B { optional A a = 1; optional B b = 2; } }");
    let a = message(&pool, ScopeId::File(file), "A");
    let b = message(&pool, ScopeId::Message(a), "B");

    assert_eq!(pool[b].full_name, "pkg.A.B");
    assert_eq!(pool[b].parent, ScopeId::Message(a));
    assert_eq!(
        field(&pool, b, 1).ty,
        FieldTy::Named(TypeRef::Resolved(TypeId::Message(a)))
    );
    assert_eq!(
        field(&pool, b, 2).ty,
        FieldTy::Named(TypeRef::Resolved(TypeId::Message(b)))
    );
}

#[test]
fn duplicate_field_number() {
    case!("message Foo {\n  int32 a = 1;\n  int32 b = 1;\n}" => Err(SourceErrorKind::DuplicateFieldNumber {
        number: 1,
        message: "Foo".to_owned(),
        first: 26..27,
        second: 41..42,
    }));
}

#[test]
fn duplicate_names() {
    case!("message Foo { int32 a = 1; int32 a = 2; }" => Err(SourceErrorKind::DuplicateName {
        name: "a".to_owned(),
        scope: "Foo".to_owned(),
        first: 20..21,
        second: 33..34,
    }));
    case!("message A {} enum A { X = 0; }" => Err(SourceErrorKind::DuplicateName {
        name: "A".to_owned(),
        scope: "test.proto".to_owned(),
        first: 8..9,
        second: 18..19,
    }));
    case!("message A { message B {} int32 B = 1; }" => Err(like SourceErrorKind::DuplicateName { .. }));
    case!("enum E { A = 0; A = 1; }" => Err(like SourceErrorKind::DuplicateName { .. }));
    case!("enum E { A = 0; B = 0; }" => Err(like SourceErrorKind::DuplicateEnumNumber { number: 0, .. }));
}

#[test]
fn reserved_words() {
    case!("message Foo { int32 message = 1; }" => Err(SourceErrorKind::ReservedWord {
        word: "message".to_owned(),
        class: "keyword",
        span: 20..27,
    }));
    case!("message optional {}" => Err(SourceErrorKind::ReservedWord {
        word: "optional".to_owned(),
        class: "specifier",
        span: 8..16,
    }));
    case!("message Foo { int32 int64 = 1; }" => Err(SourceErrorKind::ReservedWord {
        word: "int64".to_owned(),
        class: "type name",
        span: 20..25,
    }));
    case!("enum E { true = 0; }" => Err(like SourceErrorKind::ReservedWord { class: "literal", .. }));
}

#[test]
fn syntax_errors_name_the_rule() {
    let err = compile("message Foo { int32 a = ; }").unwrap_err();
    assert_eq!(
        err.source_kind(),
        Some(&SourceErrorKind::UnexpectedToken {
            rule: "field",
            expected: "an integer".to_owned(),
            found: ";".to_owned(),
            span: 24..25,
        })
    );
    assert_eq!(
        err.to_string(),
        "expected an integer while parsing field, but found ';'"
    );

    let err = compile("syntax = \"proto2\";\nmessage Foo {\n  int32 a = x;\n}").unwrap_err();
    assert_eq!(err.location(), Some(("test.proto", 3, 13)));
    assert_eq!(
        format!("{:?}", err),
        "test.proto:3:13: expected an integer while parsing field, but found 'x'"
    );

    case!("message Foo {" => Err(like SourceErrorKind::UnexpectedEof { rule: "message", .. }));
    case!("foo" => Err(like SourceErrorKind::UnexpectedToken { rule: "statement", .. }));
    case!("message Foo { int32 a = 1 }" => Err(like SourceErrorKind::UnexpectedToken { rule: "field", .. }));
    case!("enum E { A; }" => Err(like SourceErrorKind::UnexpectedToken { rule: "enum value", .. }));
}

#[test]
fn lexical_errors() {
    let err = compile("message Foo {\n  int32 a = 1; $\n}").unwrap_err();
    assert!(err.is_parse());
    assert_eq!(err.location(), Some(("test.proto", 2, 16)));
    assert_eq!(
        err.source_kind(),
        Some(&SourceErrorKind::InvalidToken {
            character: '$',
            span: 29..30,
        })
    );
}

#[test]
fn map_fields() {
    let (pool, file) = parse("message Foo { map<string, Foo> children = 1; map<int32, .Foo> by_id = 2; }");
    let foo = message(&pool, ScopeId::File(file), "Foo");

    let children = field(&pool, foo, 1);
    assert_eq!(children.cardinality, Cardinality::Map(Scalar::String));
    assert_eq!(children.label, None);
    assert_eq!(
        children.ty,
        FieldTy::Named(TypeRef::Resolved(TypeId::Message(foo)))
    );

    let by_id = field(&pool, foo, 2);
    assert_eq!(by_id.cardinality, Cardinality::Map(Scalar::Int32));
    assert_eq!(by_id.raw_type, ".Foo");
    assert_eq!(
        by_id.ty,
        FieldTy::Named(TypeRef::Resolved(TypeId::Message(foo)))
    );

    case!("message Foo { map<float, int32> m = 1; }" => Err(SourceErrorKind::InvalidMapKeyType {
        ty: "float".to_owned(),
        span: 18..23,
    }));
    case!("message Foo { map<Foo, int32> m = 1; }" => Err(like SourceErrorKind::InvalidMapKeyType { .. }));
}

#[test]
fn options_are_recorded() {
    let (pool, file) = parse(
        "option java_package = \"com.example\";\n\
         message Foo {\n\
           option deprecated = true;\n\
           int32 a = 1 [default = -5, (my.ext).x = 1.5];\n\
         }\n\
         enum E { option allow_alias = true; A = 0 [deprecated = true]; }",
    );

    assert_eq!(
        pool[file].options,
        vec![OptionDecl {
            name: "java_package".to_owned(),
            value: Constant::String("com.example".to_owned()),
        }]
    );

    let foo = message(&pool, ScopeId::File(file), "Foo");
    assert_eq!(
        pool[foo].options,
        vec![OptionDecl {
            name: "deprecated".to_owned(),
            value: Constant::Bool(true),
        }]
    );
    assert_eq!(
        field(&pool, foo, 1).options,
        vec![
            OptionDecl {
                name: "default".to_owned(),
                value: Constant::Int {
                    negative: true,
                    value: 5,
                },
            },
            OptionDecl {
                name: "(my.ext).x".to_owned(),
                value: Constant::Float(1.5),
            },
        ]
    );

    let e = pool[file].scope.enums["E"];
    assert_eq!(pool[e].options.len(), 1);
    assert_eq!(pool[e].values[&0].options[0].name, "deprecated");
}

#[test]
fn extend_blocks_only_hold_fields() {
    case!("message Foo { extensions 10 to 20; } extend Foo { message Bar {} }" => Err(SourceErrorKind::InvalidExtendItem {
        span: 50..57,
    }));
    case!("message Foo { extensions 10 to 20; } extend Foo { map<string, string> m = 1; }" => Err(SourceErrorKind::MapExtension {
        span: 50..53,
    }));
    case!("message Foo { extensions 10 to 20; } extend Foo { option deprecated = true; }" => Err(like SourceErrorKind::InvalidExtendItem { .. }));
}

#[test]
fn extend_block_fields() {
    let (pool, file) = parse("message Foo { extensions 10 to max; } extend Foo { optional int32 bar = 10; }");
    let foo = message(&pool, ScopeId::File(file), "Foo");

    assert_eq!(
        pool[foo].extension_ranges,
        vec![TagRange {
            start: 10,
            end: MAX_FIELD_NUMBER,
        }]
    );

    let block = pool[file].scope.extends[0];
    let extendee = pool[block].extendee.as_ref().unwrap();
    assert_eq!(extendee.target, TypeRef::Resolved(TypeId::Message(foo)));
    assert_eq!(pool[block].fields.len(), 1);
    assert!(pool[file].scope.messages.get("Foo").is_some());
    assert_eq!(pool[file].scope.messages.len(), 1);
}

#[test]
fn enums() {
    let (pool, file) = parse("enum E { NEG = -1; ZERO = 0; MAX = 2147483647; MIN = -2147483648; };");
    let e = pool[file].scope.enums["E"];
    let numbers: Vec<i32> = pool[e].values.keys().copied().collect();
    assert_eq!(numbers, vec![-1, 0, i32::MAX, i32::MIN]);

    case!("enum E {}" => Err(SourceErrorKind::EmptyEnum {
        name: "E".to_owned(),
        span: 5..6,
    }));
    case!("enum E { A = 2147483648; }" => Err(like SourceErrorKind::InvalidEnumNumber { .. }));
}

#[test]
fn enum_without_zero_value_warns() {
    let compiler = compile("enum E { FIRST = 5; SECOND = 7; }").unwrap();

    assert_eq!(compiler.warnings().len(), 1);
    assert_eq!(
        compiler.warnings()[0].kind(),
        &WarningKind::EnumMissingZero {
            name: "E".to_owned(),
            default: "FIRST".to_owned(),
            span: 5..6,
        }
    );

    let e = compiler.file("test.proto").unwrap().get_enum("E").unwrap();
    assert!(!e.has_zero_value());
    assert_eq!(e.default_value().name(), "FIRST");

    let compiler = compile("enum E { SECOND = 7; ZERO = 0; }").unwrap();
    assert!(compiler.warnings().is_empty());
    let e = compiler.file("test.proto").unwrap().get_enum("E").unwrap();
    assert_eq!(e.default_value().name(), "ZERO");
}

#[test]
fn syntax_and_package() {
    let (pool, file) = parse("syntax = \"proto3\";\npackage foo.bar;\nmessage A {}");
    assert_eq!(pool[file].syntax(), Syntax::Proto3);
    assert_eq!(pool[file].package(), "foo.bar");
    assert_eq!(pool[message(&pool, ScopeId::File(file), "A")].full_name, "foo.bar.A");

    case!("package a;\npackage b;" => Err(SourceErrorKind::DuplicatePackage {
        first: 0..10,
        second: 11..21,
    }));
    case!("message A {} package a;" => Err(SourceErrorKind::PackageAfterDefinition {
        span: 13..23,
    }));
    case!("syntax = \"proto4\";" => Err(SourceErrorKind::UnknownSyntax {
        syntax: "proto4".to_owned(),
        span: 9..17,
    }));
    case!("syntax = \"proto2\"; syntax = \"proto2\";" => Err(like SourceErrorKind::DuplicateSyntax { .. }));
    case!("syntax = \"proto3\"; message A { required int32 a = 1; }" => Err(SourceErrorKind::Proto3RequiredField {
        span: 31..39,
    }));
}

#[test]
fn field_numbers() {
    case!("message A { int32 a = 0; }" => Err(SourceErrorKind::InvalidFieldNumber {
        number: 0,
        span: 22..23,
    }));
    case!("message A { int32 a = 19000; }" => Err(like SourceErrorKind::InvalidFieldNumber { number: 19000, .. }));
    case!("message A { int32 a = 536870912; }" => Err(like SourceErrorKind::InvalidFieldNumber { number: 536_870_912, .. }));
    case!("message A { reserved 5 to 2; }" => Err(like SourceErrorKind::InvalidRange { .. }));

    let (pool, file) = parse("message A { int32 a = 536870911; int32 b = 18999; int32 c = 20000; }");
    let a = message(&pool, ScopeId::File(file), "A");
    let numbers: Vec<u32> = pool[a].fields.keys().copied().collect();
    assert_eq!(numbers, vec![536_870_911, 18_999, 20_000]);
}

#[test]
fn reserved_statements() {
    let (pool, file) = parse("message A { reserved 1, 5 to 9, 100 to max; reserved \"foo\", \"bar\"; }");
    let a = message(&pool, ScopeId::File(file), "A");

    assert_eq!(
        pool[a].reserved_ranges,
        vec![
            TagRange { start: 1, end: 1 },
            TagRange { start: 5, end: 9 },
            TagRange {
                start: 100,
                end: MAX_FIELD_NUMBER,
            },
        ]
    );
    assert_eq!(pool[a].reserved_names, vec!["foo".to_owned(), "bar".to_owned()]);
}

#[test]
fn empty_statements() {
    compile("").unwrap();
    compile("// just a comment\n/* and\n a block */").unwrap();

    let (pool, file) = parse(";;message A {};enum E { A0 = 0; };;");
    assert_eq!(pool[file].scope.messages.len(), 1);
    assert_eq!(pool[file].scope.enums.len(), 1);
}

#[test]
fn import_not_found() {
    let err = compile("import \"missing.proto\";").unwrap_err();

    assert!(err.is_file_not_found());
    assert_eq!(err.file(), Some("test.proto"));
    assert_eq!(
        format!("{:?}", err),
        "test.proto:1:8: import 'missing.proto' not found (imported from 'test.proto')"
    );
}

#[test]
fn token_errors_report_line_and_column() {
    let err = compile("message A {\n  int32 = 1;\n}").unwrap_err();
    assert_eq!(err.location(), Some(("test.proto", 2, 9)));

    let err = compile("/* multi\n   line */\nmessage Foo {\n  optional int32 message = 1;\n}")
        .unwrap_err();
    assert!(matches!(
        err.source_kind(),
        Some(SourceErrorKind::ReservedWord { class: "keyword", .. })
    ));
    assert_eq!(err.location(), Some(("test.proto", 4, 18)));
}

#[test]
fn signed_float_constants() {
    let (pool, file) = parse("option a = -inf;\noption b = -nan;\noption c = +inf;\noption d = inf;");

    let values: Vec<&Constant> = pool[file].options.iter().map(|option| &option.value).collect();
    assert_eq!(values[0], &Constant::Float(f64::NEG_INFINITY));
    assert!(matches!(values[1], Constant::Float(value) if value.is_nan()));
    assert_eq!(values[2], &Constant::Float(f64::INFINITY));
    assert_eq!(values[3], &Constant::Ident("inf".to_owned()));

    let printed: Vec<String> = values.iter().map(|value| value.to_string()).collect();
    assert_eq!(printed, ["-inf", "nan", "inf", "inf"]);

    case!("option a = -foo;" => Err(like SourceErrorKind::UnexpectedToken { rule: "option", .. }));
}
