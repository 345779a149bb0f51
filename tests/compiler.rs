use std::fs;

use pbng::{file::MemoryFileResolver, Cardinality, Compiler, FieldType, Scalar};
use prost_types::field_descriptor_proto::{Label, Type};
use tempfile::TempDir;

fn compile(files: &[(&str, &str)]) -> Compiler {
    let mut resolver = MemoryFileResolver::new();
    for &(name, source) in files {
        resolver.add(name, source);
    }

    let mut compiler = Compiler::with_file_resolver(resolver);
    compiler.include_imports(true);
    if let Err(err) = compiler.open_file(files[0].0) {
        panic!("failed to compile {}: {:?}", files[0].0, err);
    }
    compiler
}

fn compile_err(files: &[(&str, &str)]) -> pbng::Error {
    let mut resolver = MemoryFileResolver::new();
    for &(name, source) in files {
        resolver.add(name, source);
    }

    Compiler::with_file_resolver(resolver)
        .open_file(files[0].0)
        .unwrap_err()
}

fn dump(compiler: &Compiler) -> Vec<(String, String)> {
    compiler
        .files()
        .map(|file| (file.name().to_owned(), pbng::to_source(file)))
        .collect()
}

#[test]
fn nested_message_from_include_path() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("root.proto"),
        "package demo; message Outer { message Inner {} optional Inner x = 1; }",
    )
    .unwrap();

    let mut compiler = Compiler::new([dir.path()]).unwrap();
    compiler.open_file("root.proto").unwrap();

    let file = compiler.file("root.proto").unwrap();
    let outer = file.get_message("demo.Outer").unwrap();
    let x = outer.get_field_by_name("x").unwrap();
    match x.ty() {
        FieldType::Message(inner) => {
            assert_eq!(inner.full_name(), "demo.Outer.Inner");
            assert_eq!(inner.parent(), Some(outer));
        }
        ty => panic!("unexpected type {:?}", ty),
    }
    assert_eq!(x.containing_message(), outer);
    assert!(compiler.warnings().is_empty());
}

#[test]
fn sibling_package_import() {
    let compiler = compile(&[
        (
            "q.proto",
            "package p.q;\nimport \"r.proto\";\nmessage A { optional M m = 1; }",
        ),
        ("r.proto", "package p.r;\nmessage M {}"),
    ]);

    let a = compiler.file("q.proto").unwrap().get_message("p.q.A").unwrap();
    let m = a.get_field(1).unwrap();
    assert_eq!(m.raw_type(), "M");
    match m.ty() {
        FieldType::Message(message) => {
            assert_eq!(message.full_name(), "p.r.M");
            assert_eq!(message.file().name(), "r.proto");
        }
        ty => panic!("unexpected type {:?}", ty),
    }
}

#[test]
fn common_package_prefix() {
    let compiler = compile(&[
        (
            "c.proto",
            "package a.b.c; import \"y.proto\"; message User { repeated Thing things = 1; }",
        ),
        ("y.proto", "package a.b.x.y; message Thing {}"),
    ]);

    let user = compiler.file("c.proto").unwrap().get_message("a.b.c.User").unwrap();
    let things = user.get_field_by_name("things").unwrap();
    assert_eq!(things.ty().name(), "a.b.x.y.Thing");
    assert_eq!(things.cardinality(), Cardinality::Repeated);
}

#[test]
fn enum_without_zero() {
    let compiler = compile(&[(
        "enum.proto",
        "enum Level {\n  FIRST = 5;\n  SECOND = 6;\n}\nmessage Log { optional Level level = 1; }",
    )]);

    let warnings = compiler.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(
        format!("{:?}", warnings[0]),
        "enum.proto: warning: enum 'Level' has no value numbered zero, 'FIRST' will be used as its default"
    );

    let level = compiler.file("enum.proto").unwrap().get_enum("Level").unwrap();
    assert!(!level.has_zero_value());
    assert_eq!(level.default_value().number(), 5);
}

#[test]
fn scalar_types() {
    let compiler = compile(&[(
        "scalars.proto",
        "message S { optional double d = 1; optional sfixed64 s = 2; optional bytes b = 3; map<int32, string> m = 4; }",
    )]);

    let s = compiler.file("scalars.proto").unwrap().get_message("S").unwrap();
    let types: Vec<_> = s.fields().map(|field| field.ty()).collect();
    assert_eq!(
        types,
        [
            FieldType::Scalar(Scalar::Double),
            FieldType::Scalar(Scalar::Sfixed64),
            FieldType::Scalar(Scalar::Bytes),
            FieldType::Scalar(Scalar::String),
        ]
    );
    assert_eq!(
        s.get_field(4).unwrap().cardinality(),
        Cardinality::Map(Scalar::Int32)
    );
}

const DEP: &str = "package dep; message Dep {}";

const DUMP_SOURCE: &str = r#"syntax = "proto2";
package demo;
import "dep.proto";
option java_package = "demo.gen";
message Outer {
  optional Inner inner = 1;
  message Inner { optional Kind kind = 1; }
  enum Kind { UNKNOWN = 0; NEGATIVE = -1; }
  repeated dep.Dep deps = 2 [deprecated = true];
  map<string, Kind> kinds = 3;
  reserved 5, 10 to 20;
  reserved "old";
  extensions 100 to max;
}
extend Outer { optional int32 ext = 100; }
"#;

const DUMP_EXPECTED: &str = r#"syntax = "proto2";
package demo;
import "dep.proto";
option java_package = "demo.gen";
message Outer {
  reserved 5, 10 to 20;
  reserved "old";
  extensions 100 to max;
  enum Kind {
    UNKNOWN = 0;
    NEGATIVE = -1;
  }
  message Inner {
    optional .demo.Outer.Kind kind = 1;
  }
  optional .demo.Outer.Inner inner = 1;
  repeated .dep.Dep deps = 2 [deprecated = true];
  map<string, .demo.Outer.Kind> kinds = 3;
}
extend .demo.Outer {
  optional int32 ext = 100;
}
"#;

#[test]
fn dump_qualifies_type_names() {
    let compiler = compile(&[("demo.proto", DUMP_SOURCE), ("dep.proto", DEP)]);
    let file = compiler.file("demo.proto").unwrap();

    similar_asserts::assert_eq!(pbng::to_source(file), DUMP_EXPECTED);
}

#[test]
fn dump_round_trip() {
    let first = compile(&[("demo.proto", DUMP_SOURCE), ("dep.proto", DEP)]);
    let first_dump = dump(&first);

    let mut dumped: Vec<(&str, &str)> = first_dump
        .iter()
        .map(|(name, source)| (name.as_str(), source.as_str()))
        .collect();
    // Open the importing file first.
    dumped.reverse();
    let second = compile(&dumped);

    similar_asserts::assert_eq!(dump(&second), first_dump);
    similar_asserts::assert_eq!(second.file_descriptor_set(), first.file_descriptor_set());
}

#[test]
fn extensions_are_enforced() {
    let base = "message Base { extensions 100 to 199; }";

    let compiler = compile(&[
        (
            "ext.proto",
            "import \"base.proto\"; extend Base { optional string note = 150; }",
        ),
        ("base.proto", base),
    ]);
    let note = compiler.file("ext.proto").unwrap().extends().next().unwrap();
    assert_eq!(note.extendee().full_name(), "Base");
    assert_eq!(note.fields().next().unwrap().number(), 150);

    let err = compile_err(&[
        (
            "ext.proto",
            "import \"base.proto\";\nextend Base { optional string note = 99; }",
        ),
        ("base.proto", base),
    ]);
    assert_eq!(
        err.to_string(),
        "extension number '99' is outside the extension ranges of 'Base' (100 to 199)"
    );
    assert_eq!(err.location(), Some(("ext.proto", 2, 38)));
}

#[test]
fn unresolved_type_location() {
    let err = compile_err(&[("test.proto", "message A {\n  optional Missing m = 1;\n}")]);

    assert!(err.is_resolve());
    assert_eq!(
        format!("{:?}", err),
        "test.proto:2:12: failed to resolve type 'Missing' of field 'm' in 'test.proto'"
    );
}

#[test]
fn duplicate_names_are_fatal() {
    let err = compile_err(&[(
        "test.proto",
        "package pkg;\nmessage A {}\nenum A { X = 0; }",
    )]);

    assert_eq!(err.to_string(), "name 'A' is defined twice in 'test.proto'");
    assert_eq!(err.location(), Some(("test.proto", 3, 6)));
}

#[test]
fn descriptor_set() {
    let compiler = compile(&[
        (
            "root.proto",
            "syntax = \"proto3\"; package app; import \"dep.proto\"; message Req { dep.Dep dep = 1; map<string, int64> counts = 2; }",
        ),
        ("dep.proto", DEP),
    ]);

    let set = compiler.file_descriptor_set();
    let names: Vec<_> = set.file.iter().map(|file| file.name()).collect();
    assert_eq!(names, ["dep.proto", "root.proto"]);

    let root = &set.file[1];
    assert_eq!(root.syntax(), "proto3");
    assert_eq!(root.package(), "app");
    assert_eq!(root.dependency, ["dep.proto"]);

    let req = &root.message_type[0];
    assert_eq!(req.name(), "Req");
    assert_eq!(req.field[0].type_name(), ".dep.Dep");
    assert_eq!(req.field[0].r#type(), Type::Message);
    assert_eq!(req.field[0].label(), Label::Optional);
    assert_eq!(req.field[1].type_name(), ".app.Req.CountsEntry");
    assert_eq!(req.field[1].label(), Label::Repeated);
    assert_eq!(req.nested_type[0].name(), "CountsEntry");
}

#[test]
fn compile_function() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("dep.proto"), DEP).unwrap();
    fs::write(
        dir.path().join("root.proto"),
        "import \"dep.proto\"; message Root { optional dep.Dep dep = 1; }",
    )
    .unwrap();

    let set = pbng::compile(["root.proto"], [dir.path()]).unwrap();
    assert_eq!(set.file.len(), 1);
    assert_eq!(set.file[0].name(), "root.proto");
    assert_eq!(set.file[0].message_type[0].field[0].type_name(), ".dep.Dep");

    let err = pbng::compile(["missing.proto"], [dir.path()]).unwrap_err();
    assert!(err.is_file_not_found());
}
