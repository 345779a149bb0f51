//! The declaration tree.
//!
//! Every file, message, enum and field parsed during a compilation is stored once in a [`Pool`]
//! and addressed by an integer id. Links between declarations (a message's parent scope, a
//! field's resolved type, a file's imports) are ids rather than owning references, so the
//! scope graph may contain cycles.

mod view;

pub use self::view::{
    Definition, EnumRef, EnumValueRef, ExtendRef, FieldRef, FieldType, FileRef, ImportRef,
    MessageRef,
};

use std::{
    collections::HashMap,
    fmt,
    ops::{Index, IndexMut, RangeInclusive},
    path::PathBuf,
};

use indexmap::IndexMap;
use logos::Span;

use crate::{error::SourceErrorKind, fmt::HexEscaped};

/// The largest field number allowed in a message.
pub const MAX_FIELD_NUMBER: u32 = 536_870_911;
pub(crate) const RESERVED_FIELD_NUMBERS: RangeInclusive<u32> = 19_000..=19_999;

macro_rules! define_id {
    ($($(#[$attr:meta])* $name:ident,)*) => {
        $(
            $(#[$attr])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(u32);

            impl $name {
                fn new(index: usize) -> Self {
                    $name(u32::try_from(index).expect("too many declarations"))
                }

                fn index(self) -> usize {
                    self.0 as usize
                }
            }
        )*
    };
}

define_id! {
    /// Identifies a parsed file.
    FileId,
    /// Identifies a message or extension block.
    MessageId,
    /// Identifies an enum.
    EnumId,
    /// Identifies a field.
    FieldId,
}

/// A file or message, owning child messages and enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ScopeId {
    File(FileId),
    Message(MessageId),
}

/// A named type that a field may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TypeId {
    Message(MessageId),
    Enum(EnumId),
}

/// The write-once link from a field (or extension block) to the declaration it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TypeRef {
    Unresolved(String),
    Resolved(TypeId),
}

/// A built-in scalar type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Scalar {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

/// A field label, or the `map` keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Specifier {
    Optional,
    Required,
    Repeated,
    Map,
}

/// How many values a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// At most one value.
    Singular,
    /// A list of values.
    Repeated,
    /// A map from the given scalar key type to the field's type.
    Map(Scalar),
}

/// The syntax version declared by a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(missing_docs)]
pub enum Syntax {
    #[default]
    Proto2,
    Proto3,
}

/// How a file was imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ImportKind {
    Plain,
    Public,
    Weak,
}

/// An inclusive range of field numbers, as declared by `reserved` or `extensions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagRange {
    /// The first number in the range.
    pub start: u32,
    /// The last number in the range.
    pub end: u32,
}

/// A recorded `name = value` option. Options are kept as written and not interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionDecl {
    /// The option name, e.g. `java_package` or `(my.ext).field`.
    pub name: String,
    /// The option value.
    pub value: Constant,
}

/// The value of an option.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum Constant {
    Ident(String),
    Int { negative: bool, value: u64 },
    Float(f64),
    String(String),
    Bool(bool),
}

#[derive(Debug, Default)]
pub(crate) struct Pool {
    pub files: Vec<FileData>,
    pub messages: Vec<MessageData>,
    pub enums: Vec<EnumData>,
    pub fields: Vec<FieldData>,
    /// Extension numbers claimed so far, keyed by extended message.
    pub extensions: HashMap<(MessageId, u32), FieldId>,
}

#[derive(Debug, Default)]
pub(crate) struct ScopeData {
    pub messages: IndexMap<String, MessageId>,
    pub enums: IndexMap<String, EnumId>,
    pub extends: Vec<MessageId>,
}

#[derive(Debug)]
pub(crate) struct FileData {
    pub name: String,
    pub path: Option<PathBuf>,
    pub syntax: Option<(Syntax, Span)>,
    pub package: Option<(String, Span)>,
    pub imports: IndexMap<String, Import>,
    pub options: Vec<OptionDecl>,
    pub scope: ScopeData,
    pub type_cache: HashMap<String, TypeId>,
}

#[derive(Debug, Clone)]
pub(crate) struct Import {
    pub file: FileId,
    pub kind: ImportKind,
}

#[derive(Debug)]
pub(crate) struct MessageData {
    pub name: String,
    pub full_name: String,
    pub span: Span,
    pub file: FileId,
    pub parent: ScopeId,
    pub scope: ScopeData,
    pub fields: IndexMap<u32, FieldId>,
    pub extension_ranges: Vec<TagRange>,
    pub reserved_ranges: Vec<TagRange>,
    pub reserved_names: Vec<String>,
    pub options: Vec<OptionDecl>,
    /// Set for extension blocks, which inject fields into another message.
    pub extendee: Option<Extendee>,
}

#[derive(Debug)]
pub(crate) struct Extendee {
    pub span: Span,
    pub target: TypeRef,
}

#[derive(Debug)]
pub(crate) struct EnumData {
    pub name: String,
    pub full_name: String,
    pub span: Span,
    pub file: FileId,
    pub parent: ScopeId,
    pub values: IndexMap<i32, EnumValueData>,
    pub options: Vec<OptionDecl>,
}

#[derive(Debug)]
pub(crate) struct EnumValueData {
    pub name: String,
    pub span: Span,
    pub options: Vec<OptionDecl>,
}

#[derive(Debug)]
pub(crate) struct FieldData {
    pub name: String,
    pub name_span: Span,
    pub number: u32,
    pub number_span: Span,
    pub label: Option<Specifier>,
    pub cardinality: Cardinality,
    pub raw_type: String,
    pub type_span: Span,
    pub ty: FieldTy,
    pub options: Vec<OptionDecl>,
    pub message: MessageId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FieldTy {
    Scalar(Scalar),
    Named(TypeRef),
}

impl Pool {
    pub fn add_file(&mut self, name: &str, path: Option<PathBuf>) -> FileId {
        let id = FileId::new(self.files.len());
        self.files.push(FileData {
            name: name.to_owned(),
            path,
            syntax: None,
            package: None,
            imports: IndexMap::new(),
            options: Vec::new(),
            scope: ScopeData::default(),
            type_cache: HashMap::new(),
        });
        id
    }

    /// Adds a message or extension block to its parent scope.
    pub fn add_message(&mut self, message: MessageData) -> Result<MessageId, SourceErrorKind> {
        let id = MessageId::new(self.messages.len());
        if message.extendee.is_some() {
            self.scope_mut(message.parent).extends.push(id);
        } else {
            self.check_name(message.parent, &message.name, &message.span)?;
            self.scope_mut(message.parent)
                .messages
                .insert(message.name.clone(), id);
        }
        self.messages.push(message);
        Ok(id)
    }

    pub fn add_enum(&mut self, enum_: EnumData) -> Result<EnumId, SourceErrorKind> {
        self.check_name(enum_.parent, &enum_.name, &enum_.span)?;
        let id = EnumId::new(self.enums.len());
        self.scope_mut(enum_.parent)
            .enums
            .insert(enum_.name.clone(), id);
        self.enums.push(enum_);
        Ok(id)
    }

    pub fn add_field(&mut self, field: FieldData) -> Result<FieldId, SourceErrorKind> {
        let message = &self.messages[field.message.index()];
        if let Some(&existing) = message.fields.get(&field.number) {
            return Err(SourceErrorKind::DuplicateFieldNumber {
                number: field.number,
                message: message.full_name.clone(),
                first: self[existing].number_span.clone(),
                second: field.number_span,
            });
        }
        self.check_name(
            ScopeId::Message(field.message),
            &field.name,
            &field.name_span,
        )?;

        let id = FieldId::new(self.fields.len());
        self.messages[field.message.index()]
            .fields
            .insert(field.number, id);
        self.fields.push(field);
        Ok(id)
    }

    pub fn add_enum_value(
        &mut self,
        enum_: EnumId,
        number: i32,
        number_span: Span,
        value: EnumValueData,
    ) -> Result<(), SourceErrorKind> {
        let data = &self[enum_];
        if let Some(existing) = data.values.get(&number) {
            return Err(SourceErrorKind::DuplicateEnumNumber {
                number,
                name: data.full_name.clone(),
                first: existing.span.clone(),
                second: number_span,
            });
        }
        if let Some(existing) = data.values.values().find(|v| v.name == value.name) {
            return Err(SourceErrorKind::DuplicateName {
                name: value.name,
                scope: data.full_name.clone(),
                first: existing.span.clone(),
                second: value.span,
            });
        }

        self[enum_].values.insert(number, value);
        Ok(())
    }

    /// Messages, enums and fields share a single namespace within a scope.
    fn check_name(&self, scope: ScopeId, name: &str, span: &Span) -> Result<(), SourceErrorKind> {
        let data = self.scope(scope);
        let first = if let Some(&message) = data.messages.get(name) {
            Some(self[message].span.clone())
        } else if let Some(&enum_) = data.enums.get(name) {
            Some(self[enum_].span.clone())
        } else if let ScopeId::Message(message) = scope {
            self[message]
                .fields
                .values()
                .map(|&field| &self[field])
                .find(|field| field.name == name)
                .map(|field| field.name_span.clone())
        } else {
            None
        };

        match first {
            Some(first) => Err(SourceErrorKind::DuplicateName {
                name: name.to_owned(),
                scope: self.scope_display_name(scope).to_owned(),
                first,
                second: span.clone(),
            }),
            None => Ok(()),
        }
    }

    pub fn scope(&self, scope: ScopeId) -> &ScopeData {
        match scope {
            ScopeId::File(file) => &self[file].scope,
            ScopeId::Message(message) => &self[message].scope,
        }
    }

    fn scope_mut(&mut self, scope: ScopeId) -> &mut ScopeData {
        match scope {
            ScopeId::File(file) => &mut self[file].scope,
            ScopeId::Message(message) => &mut self[message].scope,
        }
    }

    /// The enclosing scope, or `None` for a file.
    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        match scope {
            ScopeId::File(_) => None,
            ScopeId::Message(message) => Some(self[message].parent),
        }
    }

    /// The prefix used to build the full names of declarations in this scope.
    pub fn scope_full_name(&self, scope: ScopeId) -> &str {
        match scope {
            ScopeId::File(file) => self[file].package(),
            ScopeId::Message(message) => &self[message].full_name,
        }
    }

    fn scope_display_name(&self, scope: ScopeId) -> &str {
        match scope {
            ScopeId::File(file) => &self[file].name,
            ScopeId::Message(message) => &self[message].full_name,
        }
    }

    pub fn type_full_name(&self, ty: TypeId) -> &str {
        match ty {
            TypeId::Message(message) => &self[message].full_name,
            TypeId::Enum(enum_) => &self[enum_].full_name,
        }
    }

    /// Fills the file's typename cache with every type it declares, plus the caches of its
    /// public imports.
    pub fn build_type_cache(&mut self, file: FileId) {
        let mut cache = HashMap::new();
        let mut stack = vec![ScopeId::File(file)];
        while let Some(scope) = stack.pop() {
            let data = self.scope(scope);
            for &message in data.messages.values() {
                cache.insert(self[message].full_name.clone(), TypeId::Message(message));
                stack.push(ScopeId::Message(message));
            }
            for &enum_ in data.enums.values() {
                cache.insert(self[enum_].full_name.clone(), TypeId::Enum(enum_));
            }
        }

        for import in self[file].imports.values() {
            if import.kind == ImportKind::Public {
                for (name, &ty) in &self[import.file].type_cache {
                    cache.entry(name.clone()).or_insert(ty);
                }
            }
        }

        self[file].type_cache = cache;
    }
}

impl FileData {
    pub fn package(&self) -> &str {
        self.package.as_ref().map_or("", |(package, _)| package.as_str())
    }

    pub fn syntax(&self) -> Syntax {
        self.syntax.as_ref().map_or(Syntax::Proto2, |&(syntax, _)| syntax)
    }
}

impl MessageData {
    pub fn new(name: &str, full_name: String, span: Span, file: FileId, parent: ScopeId) -> Self {
        MessageData {
            name: name.to_owned(),
            full_name,
            span,
            file,
            parent,
            scope: ScopeData::default(),
            fields: IndexMap::new(),
            extension_ranges: Vec::new(),
            reserved_ranges: Vec::new(),
            reserved_names: Vec::new(),
            options: Vec::new(),
            extendee: None,
        }
    }
}

impl TypeRef {
    pub fn resolved(&self) -> Option<TypeId> {
        match *self {
            TypeRef::Resolved(ty) => Some(ty),
            TypeRef::Unresolved(_) => None,
        }
    }

    /// Binds an unresolved reference. A reference that is already resolved keeps its target.
    pub fn bind(&mut self, target: TypeId) {
        if let TypeRef::Unresolved(_) = self {
            *self = TypeRef::Resolved(target);
        }
    }
}

pub(crate) fn make_name(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_owned()
    } else {
        format!("{}.{}", scope, name)
    }
}

macro_rules! impl_index {
    ($id:ty => $field:ident: $data:ty) => {
        impl Index<$id> for Pool {
            type Output = $data;

            fn index(&self, id: $id) -> &Self::Output {
                &self.$field[id.index()]
            }
        }

        impl IndexMut<$id> for Pool {
            fn index_mut(&mut self, id: $id) -> &mut Self::Output {
                &mut self.$field[id.index()]
            }
        }
    };
}

impl_index!(FileId => files: FileData);
impl_index!(MessageId => messages: MessageData);
impl_index!(EnumId => enums: EnumData);
impl_index!(FieldId => fields: FieldData);

impl Scalar {
    const NAMES: [(&'static str, Scalar); 15] = [
        ("double", Scalar::Double),
        ("float", Scalar::Float),
        ("int32", Scalar::Int32),
        ("int64", Scalar::Int64),
        ("uint32", Scalar::Uint32),
        ("uint64", Scalar::Uint64),
        ("sint32", Scalar::Sint32),
        ("sint64", Scalar::Sint64),
        ("fixed32", Scalar::Fixed32),
        ("fixed64", Scalar::Fixed64),
        ("sfixed32", Scalar::Sfixed32),
        ("sfixed64", Scalar::Sfixed64),
        ("bool", Scalar::Bool),
        ("string", Scalar::String),
        ("bytes", Scalar::Bytes),
    ];

    /// Looks up a scalar type by its keyword.
    pub fn from_name(name: &str) -> Option<Self> {
        Scalar::NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, scalar)| scalar)
    }

    /// The keyword naming this type.
    pub fn name(self) -> &'static str {
        Scalar::NAMES
            .iter()
            .find(|(_, scalar)| *scalar == self)
            .map_or("", |&(name, _)| name)
    }

    /// Returns true if this type may be used as the key of a map field.
    pub fn is_valid_map_key(self) -> bool {
        !matches!(self, Scalar::Double | Scalar::Float | Scalar::Bytes)
    }
}

impl Specifier {
    /// Looks up a specifier by its keyword.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "optional" => Some(Specifier::Optional),
            "required" => Some(Specifier::Required),
            "repeated" => Some(Specifier::Repeated),
            "map" => Some(Specifier::Map),
            _ => None,
        }
    }

    /// The keyword naming this specifier.
    pub fn name(self) -> &'static str {
        match self {
            Specifier::Optional => "optional",
            Specifier::Required => "required",
            Specifier::Repeated => "repeated",
            Specifier::Map => "map",
        }
    }
}

impl TagRange {
    /// Returns true if `number` lies in this range.
    pub fn contains(&self, number: u32) -> bool {
        self.start <= number && number <= self.end
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for TagRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else if self.end == MAX_FIELD_NUMBER {
            write!(f, "{} to max", self.start)
        } else {
            write!(f, "{} to {}", self.start, self.end)
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Ident(ident) => f.write_str(ident),
            Constant::Int { negative, value } => {
                if *negative {
                    write!(f, "-{}", value)
                } else {
                    write!(f, "{}", value)
                }
            }
            Constant::Float(value) if value.is_nan() => f.write_str("nan"),
            Constant::Float(value) if value.is_infinite() => {
                f.write_str(if *value < 0.0 { "-inf" } else { "inf" })
            }
            Constant::Float(value) => write!(f, "{:?}", value),
            Constant::String(value) => write!(f, "\"{}\"", HexEscaped(value.as_bytes())),
            Constant::Bool(value) => write!(f, "{}", value),
        }
    }
}

impl fmt::Display for Syntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Syntax::Proto2 => f.write_str("proto2"),
            Syntax::Proto3 => f.write_str("proto3"),
        }
    }
}
