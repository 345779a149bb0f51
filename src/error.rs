use std::{fmt, io, path::PathBuf};

use logos::Span;
use miette::{Diagnostic, NamedSource};
use thiserror::Error;

use crate::{lines::LineResolver, tree::MAX_FIELD_NUMBER};

/// An error that can occur when compiling schema files.
#[derive(Diagnostic, Error)]
#[error(transparent)]
#[diagnostic(transparent)]
pub struct Error {
    kind: Box<ErrorKind>,
}

#[derive(Debug, Diagnostic, Error)]
pub(crate) enum ErrorKind {
    #[error("{}", err)]
    #[diagnostic(forward(err))]
    Source { err: SourceError },
    #[error("at least one include path must be provided")]
    NoIncludePaths,
    #[error("error opening file '{path}'")]
    OpenFile {
        name: String,
        path: PathBuf,
        #[source]
        err: io::Error,
    },
    #[error("file '{name}' is too large")]
    #[diagnostic(help("the maximum file length is 2,147,483,647 bytes"))]
    FileTooLarge { name: String },
    #[error("file '{name}' is not valid utf-8")]
    FileInvalidUtf8 { name: String },
    #[error("file '{name}' not found")]
    FileNotFound { name: String },
    #[error("import '{name}' not found (imported from '{importer}')")]
    ImportNotFound {
        name: String,
        importer: String,
        line: usize,
        column: usize,
        #[label("imported here")]
        span: Span,
        #[source_code]
        source_code: NamedSource,
    },
    #[error("import cycle detected: {cycle}")]
    CircularImport { name: String, cycle: String },
    #[error("path '{path}' is not in any include path")]
    FileNotIncluded { path: PathBuf },
    #[error("path '{path}' is shadowed by '{shadow}' in the include paths")]
    #[diagnostic(help("either pass '{}' as the input file, or re-order the include paths so that '{}' comes first", shadow.display(), path.display()))]
    FileShadowed {
        name: String,
        path: PathBuf,
        shadow: PathBuf,
    },
    #[error(transparent)]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

/// An error located at a span of a single source file.
#[derive(Error, Diagnostic)]
#[error("{}", kind)]
#[diagnostic(forward(kind))]
pub(crate) struct SourceError {
    kind: Box<SourceErrorKind>,
    file: String,
    line: usize,
    column: usize,
    #[source_code]
    source_code: NamedSource,
}

#[derive(Error, Debug, Diagnostic, PartialEq)]
pub(crate) enum SourceErrorKind {
    #[error("unexpected character '{character}'")]
    InvalidToken {
        character: char,
        #[label("found here")]
        span: Span,
    },
    #[error("integer is too large")]
    IntegerOutOfRange {
        #[label("integer defined here")]
        span: Span,
    },
    #[error("unterminated string")]
    UnterminatedString {
        #[label("string starts here")]
        span: Span,
    },
    #[error("invalid string escape")]
    InvalidStringEscape {
        #[label("defined here")]
        span: Span,
    },
    #[error("unterminated block comment")]
    UnterminatedComment {
        #[label("comment starts here")]
        span: Span,
    },
    #[error("expected {expected} while parsing {rule}, but found '{found}'")]
    UnexpectedToken {
        rule: &'static str,
        expected: String,
        found: String,
        #[label("found here")]
        span: Span,
    },
    #[error("expected {expected} while parsing {rule}, but reached end of file")]
    UnexpectedEof {
        rule: &'static str,
        expected: String,
        #[label("file ends here")]
        span: Span,
    },
    #[error("'{word}' is a reserved {class} and cannot be used as an identifier")]
    #[diagnostic(help("rename the declaration, reserved words always take precedence over identifiers"))]
    ReservedWord {
        word: String,
        class: &'static str,
        #[label("used here")]
        span: Span,
    },
    #[error("unknown syntax '{syntax}'")]
    #[diagnostic(help("possible values are 'proto2' and 'proto3'"))]
    UnknownSyntax {
        syntax: String,
        #[label("defined here")]
        span: Span,
    },
    #[error("a file may only declare its syntax once")]
    DuplicateSyntax {
        #[label("defined here…")]
        first: Span,
        #[label("…and again here")]
        second: Span,
    },
    #[error("a file may only contain a single package declaration")]
    DuplicatePackage {
        #[label("defined here…")]
        first: Span,
        #[label("…and again here")]
        second: Span,
    },
    #[error("the package must be declared before any definitions")]
    PackageAfterDefinition {
        #[label("declared here")]
        span: Span,
    },
    #[error("name '{name}' is defined twice in '{scope}'")]
    DuplicateName {
        name: String,
        scope: String,
        #[label("first defined here…")]
        first: Span,
        #[label("…and again here")]
        second: Span,
    },
    #[error("field number '{number}' is used twice in '{message}'")]
    DuplicateFieldNumber {
        number: u32,
        message: String,
        #[label("first used here…")]
        first: Span,
        #[label("…and again here")]
        second: Span,
    },
    #[error("enum number '{number}' is used twice in '{name}'")]
    DuplicateEnumNumber {
        number: i32,
        name: String,
        #[label("first used here…")]
        first: Span,
        #[label("…and again here")]
        second: Span,
    },
    #[error("invalid field number '{number}'")]
    #[diagnostic(help("field numbers must be between 1 and {}, excluding 19000 to 19999", MAX_FIELD_NUMBER))]
    InvalidFieldNumber {
        number: u64,
        #[label("defined here")]
        span: Span,
    },
    #[error("enum number is out of range")]
    #[diagnostic(help("enum numbers must fit in a signed 32-bit integer"))]
    InvalidEnumNumber {
        #[label("defined here")]
        span: Span,
    },
    #[error("invalid range")]
    #[diagnostic(help("the start of a range must not exceed its end"))]
    InvalidRange {
        #[label("defined here")]
        span: Span,
    },
    #[error("enum '{name}' must declare at least one value")]
    EmptyEnum {
        name: String,
        #[label("defined here")]
        span: Span,
    },
    #[error("'{ty}' is not a valid map key type")]
    #[diagnostic(help("map keys may be any integral or string type, or bool"))]
    InvalidMapKeyType {
        ty: String,
        #[label("defined here")]
        span: Span,
    },
    #[error("required fields are not allowed in proto3")]
    Proto3RequiredField {
        #[label("defined here")]
        span: Span,
    },
    #[error("only fields may be declared in an extend block")]
    InvalidExtendItem {
        #[label("defined here")]
        span: Span,
    },
    #[error("map fields cannot be declared in an extend block")]
    MapExtension {
        #[label("defined here")]
        span: Span,
    },
    #[error("failed to resolve type '{name}' of field '{field}' in '{file}'")]
    TypeNameNotFound {
        name: String,
        field: String,
        file: String,
        #[label("referenced here")]
        span: Span,
    },
    #[error("failed to resolve extended type '{name}' in '{file}'")]
    ExtendeeNotFound {
        name: String,
        file: String,
        #[label("referenced here")]
        span: Span,
    },
    #[error("'{name}' is not a message type")]
    InvalidExtendee {
        name: String,
        #[label("extended here")]
        span: Span,
    },
    #[error("message '{name}' does not declare an extension range")]
    ExtendeeNotExtensible {
        name: String,
        #[label("extended here")]
        span: Span,
    },
    #[error("extension number '{number}' is outside the extension ranges of '{extendee}' ({ranges})")]
    ExtensionOutOfRange {
        number: u32,
        extendee: String,
        ranges: String,
        #[label("defined here")]
        span: Span,
    },
    #[error("extension number '{number}' of '{extendee}' is already used")]
    DuplicateExtension {
        number: u32,
        extendee: String,
        #[label("defined here")]
        span: Span,
    },
    #[error("field '{name}' uses reserved number '{number}'")]
    ReservedFieldNumber {
        name: String,
        number: u32,
        #[label("defined here")]
        span: Span,
    },
    #[error("field name '{name}' is reserved")]
    ReservedFieldName {
        name: String,
        #[label("defined here")]
        span: Span,
    },
    #[error("field number '{number}' lies inside an extension range of '{message}'")]
    FieldNumberInExtensionRange {
        number: u32,
        message: String,
        #[label("defined here")]
        span: Span,
    },
}

/// A non-fatal diagnostic recorded while compiling.
#[derive(Error, Diagnostic)]
#[error("{}", kind)]
#[diagnostic(forward(kind))]
pub struct Warning {
    kind: WarningKind,
    file: String,
    #[source_code]
    source_code: NamedSource,
}

#[derive(Error, Debug, Diagnostic, PartialEq)]
pub(crate) enum WarningKind {
    #[error("enum '{name}' has no value numbered zero, '{default}' will be used as its default")]
    #[diagnostic(
        severity(Warning),
        help("declare a value with number 0 to keep the default independent of declaration order")
    )]
    EnumMissingZero {
        name: String,
        default: String,
        #[label("defined here")]
        span: Span,
    },
}

impl Error {
    /// Creates an instance of [`struct@Error`] with an arbitrary payload.
    pub fn new<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error::from_kind(ErrorKind::Custom(error.into()))
    }

    /// Creates an instance of [`struct@Error`] indicating that a file could not be found.
    ///
    /// This error should be returned by [`FileResolver`](crate::file::FileResolver) instances if a file is not found.
    pub fn file_not_found(name: &str) -> Self {
        Error::from_kind(ErrorKind::FileNotFound {
            name: name.to_owned(),
        })
    }

    /// The file in which this error occurred, if available.
    pub fn file(&self) -> Option<&str> {
        match &*self.kind {
            ErrorKind::Source { err } => Some(&err.file),
            ErrorKind::OpenFile { name, .. }
            | ErrorKind::FileTooLarge { name }
            | ErrorKind::FileInvalidUtf8 { name }
            | ErrorKind::FileNotFound { name }
            | ErrorKind::CircularImport { name, .. }
            | ErrorKind::FileShadowed { name, .. } => Some(name),
            ErrorKind::ImportNotFound { importer, .. } => Some(importer),
            ErrorKind::NoIncludePaths | ErrorKind::FileNotIncluded { .. } | ErrorKind::Custom(_) => {
                None
            }
        }
    }

    /// The file, 1-based line and 1-based column at which this error occurred, if it is located in a source file.
    pub fn location(&self) -> Option<(&str, usize, usize)> {
        match &*self.kind {
            ErrorKind::Source { err } => Some((&err.file, err.line, err.column)),
            _ => None,
        }
    }

    pub(crate) fn from_kind(kind: ErrorKind) -> Self {
        Error {
            kind: Box::new(kind),
        }
    }

    pub(crate) fn from_source(kind: SourceErrorKind, file: &str, source: &str) -> Self {
        Error::from_kind(ErrorKind::Source {
            err: SourceError::new(kind, file, source),
        })
    }

    pub(crate) fn from_source_at(
        kind: SourceErrorKind,
        file: &str,
        source: &str,
        line: usize,
        column: usize,
    ) -> Self {
        Error::from_kind(ErrorKind::Source {
            err: SourceError::at(kind, file, source, line, column),
        })
    }

    pub(crate) fn import_not_found(name: &str, importer: &str, source: &str, span: Span) -> Self {
        let (line, column) = LineResolver::new(source).resolve(span.start);
        Error::from_kind(ErrorKind::ImportNotFound {
            name: name.to_owned(),
            importer: importer.to_owned(),
            line,
            column,
            span,
            source_code: NamedSource::new(importer, source.to_owned()),
        })
    }

    pub(crate) fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    #[cfg(test)]
    pub(crate) fn source_kind(&self) -> Option<&SourceErrorKind> {
        match &*self.kind {
            ErrorKind::Source { err } => Some(&err.kind),
            _ => None,
        }
    }

    /// Returns true if this is an instance of [`Error::file_not_found()`], or an import could not be found.
    pub fn is_file_not_found(&self) -> bool {
        matches!(
            &*self.kind,
            ErrorKind::FileNotFound { .. }
                | ErrorKind::ImportNotFound { .. }
                | ErrorKind::FileNotIncluded { .. }
        )
    }

    /// Returns true if this error is caused by a source file that could not be scanned or parsed.
    pub fn is_parse(&self) -> bool {
        match &*self.kind {
            ErrorKind::Source { err } => err.kind.is_syntax(),
            ErrorKind::FileTooLarge { .. } | ErrorKind::FileInvalidUtf8 { .. } => true,
            _ => false,
        }
    }

    /// Returns true if this error is caused by a type name that could not be resolved.
    pub fn is_resolve(&self) -> bool {
        matches!(
            &*self.kind,
            ErrorKind::Source { err } if matches!(
                *err.kind,
                SourceErrorKind::TypeNameNotFound { .. } | SourceErrorKind::ExtendeeNotFound { .. }
            )
        )
    }

    /// Returns true if this error is caused by an IO error while opening a file.
    pub fn is_io(&self) -> bool {
        match &*self.kind {
            ErrorKind::OpenFile { .. } => true,
            ErrorKind::Custom(err) if err.downcast_ref::<io::Error>().is_some() => true,
            _ => false,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::new(err)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.kind {
            ErrorKind::Source { err } => err.fmt(f),
            ErrorKind::OpenFile { err, .. } => write!(f, "{}: {}", self, err),
            ErrorKind::Custom(err) => err.fmt(f),
            ErrorKind::ImportNotFound {
                importer,
                line,
                column,
                ..
            } => write!(f, "{}:{}:{}: {}", importer, line, column, self),
            _ => write!(f, "{}", self),
        }
    }
}

impl SourceError {
    pub(crate) fn new(kind: SourceErrorKind, file: &str, source: &str) -> Self {
        let (line, column) = LineResolver::new(source).resolve(kind.span().start);
        SourceError::at(kind, file, source, line, column)
    }

    pub(crate) fn at(
        kind: SourceErrorKind,
        file: &str,
        source: &str,
        line: usize,
        column: usize,
    ) -> Self {
        SourceError {
            kind: Box::new(kind),
            file: file.to_owned(),
            line,
            column,
            source_code: NamedSource::new(file, source.to_owned()),
        }
    }
}

impl fmt::Debug for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}: {}", self.file, self.line, self.column, self.kind)
    }
}

impl SourceErrorKind {
    pub(crate) fn span(&self) -> Span {
        match self {
            SourceErrorKind::InvalidToken { span, .. }
            | SourceErrorKind::IntegerOutOfRange { span }
            | SourceErrorKind::UnterminatedString { span }
            | SourceErrorKind::InvalidStringEscape { span }
            | SourceErrorKind::UnterminatedComment { span }
            | SourceErrorKind::UnexpectedToken { span, .. }
            | SourceErrorKind::UnexpectedEof { span, .. }
            | SourceErrorKind::ReservedWord { span, .. }
            | SourceErrorKind::UnknownSyntax { span, .. }
            | SourceErrorKind::PackageAfterDefinition { span }
            | SourceErrorKind::InvalidFieldNumber { span, .. }
            | SourceErrorKind::InvalidEnumNumber { span }
            | SourceErrorKind::InvalidRange { span }
            | SourceErrorKind::EmptyEnum { span, .. }
            | SourceErrorKind::InvalidMapKeyType { span, .. }
            | SourceErrorKind::Proto3RequiredField { span }
            | SourceErrorKind::InvalidExtendItem { span }
            | SourceErrorKind::MapExtension { span }
            | SourceErrorKind::TypeNameNotFound { span, .. }
            | SourceErrorKind::ExtendeeNotFound { span, .. }
            | SourceErrorKind::InvalidExtendee { span, .. }
            | SourceErrorKind::ExtendeeNotExtensible { span, .. }
            | SourceErrorKind::ExtensionOutOfRange { span, .. }
            | SourceErrorKind::DuplicateExtension { span, .. }
            | SourceErrorKind::ReservedFieldNumber { span, .. }
            | SourceErrorKind::ReservedFieldName { span, .. }
            | SourceErrorKind::FieldNumberInExtensionRange { span, .. } => span.clone(),
            SourceErrorKind::DuplicateSyntax { second, .. }
            | SourceErrorKind::DuplicatePackage { second, .. }
            | SourceErrorKind::DuplicateName { second, .. }
            | SourceErrorKind::DuplicateFieldNumber { second, .. }
            | SourceErrorKind::DuplicateEnumNumber { second, .. } => second.clone(),
        }
    }

    /// Lexical and syntax errors, as opposed to resolution and semantic errors.
    fn is_syntax(&self) -> bool {
        matches!(
            self,
            SourceErrorKind::InvalidToken { .. }
                | SourceErrorKind::IntegerOutOfRange { .. }
                | SourceErrorKind::UnterminatedString { .. }
                | SourceErrorKind::InvalidStringEscape { .. }
                | SourceErrorKind::UnterminatedComment { .. }
                | SourceErrorKind::UnexpectedToken { .. }
                | SourceErrorKind::UnexpectedEof { .. }
                | SourceErrorKind::ReservedWord { .. }
                | SourceErrorKind::UnknownSyntax { .. }
        )
    }
}

impl Warning {
    pub(crate) fn new(kind: WarningKind, file: &str, source: &str) -> Self {
        Warning {
            kind,
            file: file.to_owned(),
            source_code: NamedSource::new(file, source.to_owned()),
        }
    }

    /// The file in which this warning was recorded.
    pub fn file(&self) -> &str {
        &self.file
    }

    #[cfg(test)]
    pub(crate) fn kind(&self) -> &WarningKind {
        &self.kind
    }
}

impl fmt::Debug for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: warning: {}", self.file, self.kind)
    }
}

#[test]
fn fmt_debug_io() {
    let err = Error::from_kind(ErrorKind::OpenFile {
        name: "file.proto".into(),
        path: "path/to/file.proto".into(),
        err: io::Error::new(io::ErrorKind::Other, "io error"),
    });

    assert!(err.is_io());
    assert_eq!(err.file(), Some("file.proto"));
    assert_eq!(
        format!("{:?}", err),
        "error opening file 'path/to/file.proto': io error"
    );
}

#[test]
fn fmt_debug_source() {
    let err = Error::from_source(
        SourceErrorKind::InvalidToken {
            character: '$',
            span: 12..13,
        },
        "file.proto",
        "message A\n{ $ }",
    );

    assert!(err.is_parse());
    assert_eq!(err.location(), Some(("file.proto", 2, 3)));
    assert_eq!(
        format!("{:?}", err),
        "file.proto:2:3: unexpected character '$'"
    );
}
