use std::{fs, iter::empty, path::PathBuf};

use tempfile::TempDir;

use super::*;
use crate::file::MemoryFileResolver;

fn memory(files: &[(&str, &str)]) -> Compiler {
    let mut resolver = MemoryFileResolver::new();
    for &(name, source) in files {
        resolver.add(name, source);
    }
    Compiler::with_file_resolver(resolver)
}

fn write(dir: &Path, name: &str, source: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, source).unwrap();
    path
}

fn file_names(compiler: &Compiler) -> Vec<&str> {
    compiler.files().map(|file| file.name()).collect()
}

#[test]
fn diamond_imports_are_parsed_once() {
    let mut compiler = memory(&[
        (
            "root.proto",
            "import \"left.proto\"; import \"right.proto\"; message Root { optional Left l = 1; optional Right r = 2; }",
        ),
        ("left.proto", "import \"base.proto\"; message Left { optional Base b = 1; }"),
        ("right.proto", "import \"base.proto\"; message Right { optional Base b = 1; }"),
        ("base.proto", "message Base {}"),
    ]);
    compiler.open_file("root.proto").unwrap();

    assert_eq!(compiler.pool().files.len(), 4);
    assert_eq!(file_names(&compiler), ["root.proto"]);

    compiler.include_imports(true);
    assert_eq!(
        file_names(&compiler),
        ["base.proto", "left.proto", "right.proto", "root.proto"]
    );

    let left = compiler.file("left.proto").unwrap();
    let right = compiler.file("right.proto").unwrap();
    let left_base = left.get_message("Left").unwrap().get_field(1).unwrap().ty();
    let right_base = right.get_message("Right").unwrap().get_field(1).unwrap().ty();
    assert_eq!(left_base, right_base);
}

#[test]
fn reopening_a_file_reuses_it() {
    let mut compiler = memory(&[
        ("root.proto", "import \"dep.proto\";"),
        ("dep.proto", "message Dep {}"),
    ]);
    compiler.open_file("root.proto").unwrap();
    assert_eq!(file_names(&compiler), ["root.proto"]);
    let dep = compiler.file_id("dep.proto");
    assert!(dep.is_some());

    compiler.open_file("dep.proto").unwrap();
    compiler.open_file("root.proto").unwrap();
    assert_eq!(compiler.pool().files.len(), 2);
    assert_eq!(file_names(&compiler), ["dep.proto", "root.proto"]);
    assert_eq!(compiler.file_id("dep.proto"), dep);
}

#[test]
fn circular_import() {
    let mut compiler = memory(&[
        ("a.proto", "import \"b.proto\";"),
        ("b.proto", "import \"c.proto\";"),
        ("c.proto", "import \"b.proto\";"),
    ]);
    let err = compiler.open_file("a.proto").unwrap_err();

    match err.kind() {
        ErrorKind::CircularImport { name, cycle } => {
            assert_eq!(name, "b.proto");
            assert_eq!(cycle, "b.proto -> c.proto -> b.proto");
        }
        kind => panic!("unexpected error: {:?}", kind),
    }
    assert_eq!(err.file(), Some("b.proto"));
    assert!(compiler.file("a.proto").is_none());
    assert!(compiler.file("b.proto").is_none());
}

#[test]
fn self_import() {
    let mut compiler = memory(&[("a.proto", "import \"a.proto\";")]);
    let err = compiler.open_file("a.proto").unwrap_err();

    assert_eq!(err.to_string(), "import cycle detected: a.proto -> a.proto");
}

#[test]
fn failed_file_is_not_registered() {
    let mut compiler = memory(&[
        ("good.proto", "message Good {}"),
        (
            "bad.proto",
            "import \"good.proto\"; message Bad { optional Missing m = 1; }",
        ),
    ]);
    let err = compiler.open_file("bad.proto").unwrap_err();
    assert!(err.is_resolve());

    assert!(compiler.file("bad.proto").is_none());
    assert!(compiler.file("good.proto").is_some());
    compiler.open_file("good.proto").unwrap();
    assert_eq!(file_names(&compiler), ["good.proto"]);
}

#[test]
fn warnings_are_collected_across_imports() {
    let mut compiler = memory(&[
        ("root.proto", "import \"dep.proto\"; enum Root { A = 0; }"),
        ("dep.proto", "enum Dep { FIRST = 5; SECOND = 6; }"),
    ]);
    compiler.open_file("root.proto").unwrap();

    let warnings = compiler.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].file(), "dep.proto");
    assert_eq!(
        warnings[0].to_string(),
        "enum 'Dep' has no value numbered zero, 'FIRST' will be used as its default"
    );

    let dep = compiler.file("dep.proto").unwrap();
    assert_eq!(dep.get_enum("Dep").unwrap().default_value().name(), "FIRST");
}

#[test]
fn no_include_paths() {
    let err = Compiler::new(empty::<PathBuf>()).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NoIncludePaths));
}

#[test]
fn file_outside_include_path() {
    let include = TempDir::new().unwrap();
    let other = TempDir::new().unwrap();
    let path = write(other.path(), "foo.proto", "");

    let mut compiler = Compiler::new([include.path()]).unwrap();
    let err = compiler.open_file(&path).unwrap_err();
    match err.kind() {
        ErrorKind::FileNotIncluded { path: actual } => assert_eq!(actual, &path),
        kind => panic!("unexpected error: {:?}", kind),
    }

    let err = compiler.open_file("missing.proto").unwrap_err();
    assert!(err.is_file_not_found());
    assert!(matches!(err.kind(), ErrorKind::FileNotIncluded { .. }));
}

#[test]
fn absolute_path_under_include() {
    let include = TempDir::new().unwrap();
    let path = write(include.path(), "dir/foo.proto", "package dir; message Foo {}");

    let mut compiler = Compiler::new([include.path()]).unwrap();
    compiler.open_file(&path).unwrap();

    let file = compiler.file("dir/foo.proto").unwrap();
    assert_eq!(file.path(), Some(path.as_path()));
    assert_eq!(file.package(), "dir");
}

#[test]
fn first_include_path_wins() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    write(first.path(), "dep.proto", "package first; message Dep {}");
    write(second.path(), "dep.proto", "package second; message Dep {}");
    write(
        second.path(),
        "root.proto",
        "import \"dep.proto\"; message Root { optional first.Dep dep = 1; }",
    );

    let mut compiler = Compiler::new([first.path(), second.path()]).unwrap();
    compiler.open_file("root.proto").unwrap();

    let dep = compiler.file("dep.proto").unwrap();
    assert_eq!(dep.package(), "first");
    assert_eq!(dep.path(), Some(first.path().join("dep.proto").as_path()));
}

#[test]
fn shadowed_input_file() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    write(first.path(), "foo.proto", "");
    let shadowed = write(second.path(), "foo.proto", "");

    let mut compiler = Compiler::new([first.path(), second.path()]).unwrap();
    let err = compiler.open_file(&shadowed).unwrap_err();
    match err.kind() {
        ErrorKind::FileShadowed { name, path, shadow } => {
            assert_eq!(name, "foo.proto");
            assert_eq!(path, &shadowed);
            assert_eq!(shadow, &first.path().join("foo.proto"));
        }
        kind => panic!("unexpected error: {:?}", kind),
    }

    compiler.open_file("foo.proto").unwrap();
    let err = compiler.open_file(&shadowed).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::FileShadowed { .. }));
}

#[test]
fn invalid_utf8() {
    let include = TempDir::new().unwrap();
    fs::write(include.path().join("foo.proto"), [255u8]).unwrap();

    let mut compiler = Compiler::new([include.path()]).unwrap();
    let err = compiler.open_file("foo.proto").unwrap_err();
    assert!(err.is_parse());
    assert!(matches!(err.kind(), ErrorKind::FileInvalidUtf8 { .. }));
}

#[test]
fn file_descriptor_set_follows_files() {
    let mut compiler = memory(&[
        ("root.proto", "import \"dep.proto\"; message Root {}"),
        ("dep.proto", "message Dep {}"),
    ]);
    compiler.open_file("root.proto").unwrap();

    let names = |compiler: &Compiler| -> Vec<String> {
        compiler
            .file_descriptor_set()
            .file
            .into_iter()
            .map(|file| file.name().to_owned())
            .collect()
    };
    assert_eq!(names(&compiler), ["root.proto"]);

    compiler.include_imports(true);
    assert_eq!(names(&compiler), ["dep.proto", "root.proto"]);
}

#[test]
fn debug_lists_files() {
    let mut compiler = memory(&[("root.proto", "")]);
    compiler.open_file("root.proto").unwrap();

    assert_eq!(
        format!("{:?}", compiler),
        "Compiler { files: [\"root.proto\"], include_imports: false, warnings: 0, .. }"
    );
}

#[test]
fn failed_file_releases_extension_numbers() {
    let mut compiler = memory(&[
        ("base.proto", "message Base { extensions 100 to 199; }"),
        (
            "bad.proto",
            "import \"base.proto\";\nextend Base { optional int32 x = 100; }\nmessage Bad { reserved 1; optional int32 y = 1; }",
        ),
        (
            "good.proto",
            "import \"base.proto\";\nextend Base { optional int32 z = 100; }",
        ),
    ]);

    let err = compiler.open_file("bad.proto").unwrap_err();
    assert_eq!(err.to_string(), "field 'y' uses reserved number '1'");
    assert!(compiler.file("bad.proto").is_none());

    compiler.open_file("good.proto").unwrap();
    let good = compiler.file("good.proto").unwrap();
    let z = good.extends().next().unwrap().fields().next().unwrap();
    assert_eq!(z.name(), "z");
    assert_eq!(z.number(), 100);
}
