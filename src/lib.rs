//! The front end of a compiler for a protobuf-style schema language.
//!
//! Source files declare a package, imports, messages, enums and typed fields. This crate scans
//! and parses them, and binds every field's type name to the message or enum it refers to, across
//! files if necessary. The result is a tree of fully-resolved declarations, exposed through
//! read-only views such as [`FileRef`] and [`FieldRef`].
//!
//! For compiling a set of files in a single call, see [`compile()`]. For more options see
//! [`Compiler`].
//!
//! # Examples
//!
//! ```
//! # use std::fs;
//! # let tempdir = tempfile::TempDir::new().unwrap();
//! fs::write(
//!     tempdir.path().join("root.proto"),
//!     "package demo; message Outer { message Inner {} optional Inner x = 1; }",
//! )
//! .unwrap();
//!
//! let mut compiler = pbng::Compiler::new([tempdir.path()]).unwrap();
//! compiler.open_file("root.proto").unwrap();
//!
//! let file = compiler.file("root.proto").unwrap();
//! let outer = file.get_message("demo.Outer").unwrap();
//! let x = outer.get_field_by_name("x").unwrap();
//! assert_eq!(x.ty().name(), "demo.Outer.Inner");
//! ```
//!
//! ### Type resolution
//!
//! A field's type name is bound as soon as it is parsed when possible. Names that refer to
//! declarations further down the file are bound by a sweep over the file once parsing has
//! finished. Names are looked up lexically first, then relative to the file's package, and
//! finally in the typename caches of imported files, where a name written relative to the
//! importer's package is also tried against the packages it shares a prefix with.
//!
//! ### Error messages
//!
//! Errors and warnings implement [`miette::Diagnostic`], with the offending source span labelled.
//! Enable the `fancy` feature of `miette` and return a [`miette::Result`] for readable reports.
#![warn(missing_debug_implementations, missing_docs)]
#![deny(unsafe_code)]

pub mod file;

mod case;
mod check;
mod compile;
mod descriptor;
mod error;
mod fmt;
mod lines;
mod parse;
mod tree;

use std::path::Path;

pub use prost_types::FileDescriptorSet;

pub use self::{
    compile::Compiler,
    error::{Error, Warning},
    file::MAX_FILE_LEN,
    fmt::to_source,
    tree::{
        Cardinality, Constant, Definition, EnumRef, EnumValueRef, ExtendRef, FieldRef, FieldType,
        FileRef, ImportRef, MessageRef, OptionDecl, Scalar, Specifier, Syntax, TagRange,
        MAX_FIELD_NUMBER,
    },
};

/// Compiles schema source files into a [`FileDescriptorSet`].
///
/// This is a convenience wrapper around [`Compiler`]. Only the given files are included in the
/// output, not their imports.
///
/// # Errors
///
/// Returns an error if `includes` is empty, or if any file or import fails to compile.
pub fn compile(
    files: impl IntoIterator<Item = impl AsRef<Path>>,
    includes: impl IntoIterator<Item = impl AsRef<Path>>,
) -> Result<FileDescriptorSet, Error> {
    let mut compiler = Compiler::new(includes)?;
    compiler.open_files(files)?;
    Ok(compiler.file_descriptor_set())
}
