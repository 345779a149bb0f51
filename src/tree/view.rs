use std::{fmt, path::Path, ptr};

use super::{
    Cardinality, EnumId, FieldId, FieldTy, FileId, ImportKind, MessageId, OptionDecl, Pool,
    Scalar, ScopeData, Specifier, Syntax, TagRange, TypeId, TypeRef,
};

/// A parsed and fully resolved file.
#[derive(Clone, Copy)]
pub struct FileRef<'a> {
    pool: &'a Pool,
    id: FileId,
}

/// An import statement of a [`FileRef`].
#[derive(Clone, Copy)]
pub struct ImportRef<'a> {
    file: FileRef<'a>,
    kind: ImportKind,
}

/// A message declaration.
#[derive(Clone, Copy)]
pub struct MessageRef<'a> {
    pool: &'a Pool,
    id: MessageId,
}

/// An `extend` block, injecting fields into another message.
#[derive(Clone, Copy)]
pub struct ExtendRef<'a> {
    pool: &'a Pool,
    id: MessageId,
}

/// An enum declaration.
#[derive(Clone, Copy)]
pub struct EnumRef<'a> {
    pool: &'a Pool,
    id: EnumId,
}

/// A single value of an [`EnumRef`].
#[derive(Clone, Copy)]
pub struct EnumValueRef<'a> {
    name: &'a str,
    number: i32,
    options: &'a [OptionDecl],
}

/// A field of a message or extend block.
#[derive(Clone, Copy)]
pub struct FieldRef<'a> {
    pool: &'a Pool,
    id: FieldId,
}

/// The type of a field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldType<'a> {
    /// A built-in scalar type.
    Scalar(Scalar),
    /// A message type.
    Message(MessageRef<'a>),
    /// An enum type.
    Enum(EnumRef<'a>),
}

/// A named type declaration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Definition<'a> {
    /// A message type.
    Message(MessageRef<'a>),
    /// An enum type.
    Enum(EnumRef<'a>),
}

impl<'a> FileRef<'a> {
    pub(crate) fn new(pool: &'a Pool, id: FileId) -> Self {
        FileRef { pool, id }
    }

    /// The unique name of this file, relative to its include path.
    pub fn name(&self) -> &'a str {
        &self.pool[self.id].name
    }

    /// The path this file was read from, if it is backed by the filesystem.
    pub fn path(&self) -> Option<&'a Path> {
        self.pool[self.id].path.as_deref()
    }

    /// The declared package, or an empty string.
    pub fn package(&self) -> &'a str {
        self.pool[self.id].package()
    }

    /// The declared syntax, defaulting to proto2.
    pub fn syntax(&self) -> Syntax {
        self.pool[self.id].syntax()
    }

    /// Returns true if this file has an explicit `syntax` statement.
    pub fn has_syntax(&self) -> bool {
        self.pool[self.id].syntax.is_some()
    }

    /// The files imported by this file, in declaration order.
    pub fn imports(&self) -> impl ExactSizeIterator<Item = ImportRef<'a>> + 'a {
        let pool = self.pool;
        pool[self.id].imports.values().map(move |import| ImportRef {
            file: FileRef::new(pool, import.file),
            kind: import.kind,
        })
    }

    /// File-level options.
    pub fn options(&self) -> &'a [OptionDecl] {
        &self.pool[self.id].options
    }

    /// Top-level messages, in declaration order.
    pub fn messages(&self) -> impl ExactSizeIterator<Item = MessageRef<'a>> + 'a {
        messages(self.pool, &self.pool[self.id].scope)
    }

    /// Top-level enums, in declaration order.
    pub fn enums(&self) -> impl ExactSizeIterator<Item = EnumRef<'a>> + 'a {
        enums(self.pool, &self.pool[self.id].scope)
    }

    /// Top-level extend blocks, in declaration order.
    pub fn extends(&self) -> impl ExactSizeIterator<Item = ExtendRef<'a>> + 'a {
        extends(self.pool, &self.pool[self.id].scope)
    }

    /// Looks up a type declared in this file (or re-exported by a public import) by its fully-qualified name.
    pub fn get_definition(&self, full_name: &str) -> Option<Definition<'a>> {
        let full_name = full_name.strip_prefix('.').unwrap_or(full_name);
        self.pool[self.id]
            .type_cache
            .get(full_name)
            .map(|&ty| Definition::new(self.pool, ty))
    }

    /// Looks up a message declared in this file by its fully-qualified name.
    pub fn get_message(&self, full_name: &str) -> Option<MessageRef<'a>> {
        match self.get_definition(full_name)? {
            Definition::Message(message) => Some(message),
            Definition::Enum(_) => None,
        }
    }

    /// Looks up an enum declared in this file by its fully-qualified name.
    pub fn get_enum(&self, full_name: &str) -> Option<EnumRef<'a>> {
        match self.get_definition(full_name)? {
            Definition::Enum(enum_) => Some(enum_),
            Definition::Message(_) => None,
        }
    }
}

impl<'a> ImportRef<'a> {
    /// The imported file.
    pub fn file(&self) -> FileRef<'a> {
        self.file
    }

    /// Returns true for `import public` statements.
    pub fn is_public(&self) -> bool {
        self.kind == ImportKind::Public
    }

    /// Returns true for `import weak` statements.
    pub fn is_weak(&self) -> bool {
        self.kind == ImportKind::Weak
    }
}

impl<'a> MessageRef<'a> {
    pub(crate) fn new(pool: &'a Pool, id: MessageId) -> Self {
        MessageRef { pool, id }
    }

    /// The short name of this message.
    pub fn name(&self) -> &'a str {
        &self.pool[self.id].name
    }

    /// The fully-qualified name of this message, without a leading dot.
    pub fn full_name(&self) -> &'a str {
        &self.pool[self.id].full_name
    }

    /// The file declaring this message.
    pub fn file(&self) -> FileRef<'a> {
        FileRef::new(self.pool, self.pool[self.id].file)
    }

    /// The message this message is nested in, if any.
    pub fn parent(&self) -> Option<MessageRef<'a>> {
        parent_message(self.pool, self.pool[self.id].parent)
    }

    /// The fields of this message, in declaration order.
    pub fn fields(&self) -> impl ExactSizeIterator<Item = FieldRef<'a>> + 'a {
        fields(self.pool, self.id)
    }

    /// Gets the field with the given number.
    pub fn get_field(&self, number: u32) -> Option<FieldRef<'a>> {
        self.pool[self.id]
            .fields
            .get(&number)
            .map(|&id| FieldRef::new(self.pool, id))
    }

    /// Gets a field by name.
    pub fn get_field_by_name(&self, name: &str) -> Option<FieldRef<'a>> {
        self.fields().find(|field| field.name() == name)
    }

    /// Nested messages, in declaration order.
    pub fn messages(&self) -> impl ExactSizeIterator<Item = MessageRef<'a>> + 'a {
        messages(self.pool, &self.pool[self.id].scope)
    }

    /// Nested enums, in declaration order.
    pub fn enums(&self) -> impl ExactSizeIterator<Item = EnumRef<'a>> + 'a {
        enums(self.pool, &self.pool[self.id].scope)
    }

    /// Nested extend blocks, in declaration order.
    pub fn extends(&self) -> impl ExactSizeIterator<Item = ExtendRef<'a>> + 'a {
        extends(self.pool, &self.pool[self.id].scope)
    }

    /// Field number ranges reserved for extensions.
    pub fn extension_ranges(&self) -> &'a [TagRange] {
        &self.pool[self.id].extension_ranges
    }

    /// Reserved field number ranges.
    pub fn reserved_ranges(&self) -> &'a [TagRange] {
        &self.pool[self.id].reserved_ranges
    }

    /// Reserved field names.
    pub fn reserved_names(&self) -> &'a [String] {
        &self.pool[self.id].reserved_names
    }

    /// Message-level options.
    pub fn options(&self) -> &'a [OptionDecl] {
        &self.pool[self.id].options
    }
}

impl<'a> ExtendRef<'a> {
    /// The type name of the extended message, as written.
    pub fn extendee_name(&self) -> &'a str {
        &self.pool[self.id].name
    }

    /// The extended message.
    pub fn extendee(&self) -> MessageRef<'a> {
        match self.target() {
            TypeId::Message(message) => MessageRef::new(self.pool, message),
            TypeId::Enum(_) => unreachable!("extend block bound to an enum"),
        }
    }

    /// The message or file this block is declared in.
    pub fn parent(&self) -> Option<MessageRef<'a>> {
        parent_message(self.pool, self.pool[self.id].parent)
    }

    /// The extension fields declared by this block.
    pub fn fields(&self) -> impl ExactSizeIterator<Item = FieldRef<'a>> + 'a {
        fields(self.pool, self.id)
    }

    fn target(&self) -> TypeId {
        let extendee = self.pool[self.id]
            .extendee
            .as_ref()
            .expect("extend block without extendee");
        match &extendee.target {
            TypeRef::Resolved(ty) => *ty,
            TypeRef::Unresolved(name) => {
                unreachable!("extendee '{}' observed before resolution", name)
            }
        }
    }
}

impl<'a> EnumRef<'a> {
    pub(crate) fn new(pool: &'a Pool, id: EnumId) -> Self {
        EnumRef { pool, id }
    }

    /// The short name of this enum.
    pub fn name(&self) -> &'a str {
        &self.pool[self.id].name
    }

    /// The fully-qualified name of this enum, without a leading dot.
    pub fn full_name(&self) -> &'a str {
        &self.pool[self.id].full_name
    }

    /// The file declaring this enum.
    pub fn file(&self) -> FileRef<'a> {
        FileRef::new(self.pool, self.pool[self.id].file)
    }

    /// The message this enum is nested in, if any.
    pub fn parent(&self) -> Option<MessageRef<'a>> {
        parent_message(self.pool, self.pool[self.id].parent)
    }

    /// The values of this enum, in declaration order.
    pub fn values(&self) -> impl ExactSizeIterator<Item = EnumValueRef<'a>> + 'a {
        self.pool[self.id]
            .values
            .iter()
            .map(|(&number, value)| EnumValueRef {
                name: &value.name,
                number,
                options: &value.options,
            })
    }

    /// Gets the value with the given number.
    pub fn get_value(&self, number: i32) -> Option<EnumValueRef<'a>> {
        self.values().find(|value| value.number() == number)
    }

    /// Returns true if this enum declares a value numbered zero.
    pub fn has_zero_value(&self) -> bool {
        self.pool[self.id].values.contains_key(&0)
    }

    /// The default value of this enum.
    ///
    /// This is the value numbered zero if there is one. Otherwise, the first declared value is
    /// used, and a warning was recorded when the enum was parsed.
    pub fn default_value(&self) -> EnumValueRef<'a> {
        self.get_value(0)
            .or_else(|| self.values().next())
            .expect("enums always declare at least one value")
    }

    /// Enum-level options.
    pub fn options(&self) -> &'a [OptionDecl] {
        &self.pool[self.id].options
    }
}

impl<'a> EnumValueRef<'a> {
    /// The name of this value.
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// The number of this value.
    pub fn number(&self) -> i32 {
        self.number
    }

    /// Options attached to this value.
    pub fn options(&self) -> &'a [OptionDecl] {
        self.options
    }
}

impl<'a> FieldRef<'a> {
    pub(crate) fn new(pool: &'a Pool, id: FieldId) -> Self {
        FieldRef { pool, id }
    }

    /// The name of this field.
    pub fn name(&self) -> &'a str {
        &self.pool[self.id].name
    }

    /// The field number.
    pub fn number(&self) -> u32 {
        self.pool[self.id].number
    }

    /// The label written before the field type, if any. Map fields have no label.
    pub fn label(&self) -> Option<Specifier> {
        self.pool[self.id].label
    }

    /// The cardinality of this field.
    pub fn cardinality(&self) -> Cardinality {
        self.pool[self.id].cardinality
    }

    /// The type name as written in the source file.
    pub fn raw_type(&self) -> &'a str {
        &self.pool[self.id].raw_type
    }

    /// The resolved type of this field. For map fields, this is the value type.
    pub fn ty(&self) -> FieldType<'a> {
        match &self.pool[self.id].ty {
            FieldTy::Scalar(scalar) => FieldType::Scalar(*scalar),
            FieldTy::Named(TypeRef::Resolved(ty)) => match Definition::new(self.pool, *ty) {
                Definition::Message(message) => FieldType::Message(message),
                Definition::Enum(enum_) => FieldType::Enum(enum_),
            },
            FieldTy::Named(TypeRef::Unresolved(name)) => {
                unreachable!("field type '{}' observed before resolution", name)
            }
        }
    }

    /// The message declaring this field. For extension fields, this is the extended message.
    pub fn containing_message(&self) -> MessageRef<'a> {
        match self.extend_block() {
            Some(block) => block.extendee(),
            None => MessageRef::new(self.pool, self.pool[self.id].message),
        }
    }

    /// The extend block declaring this field, if it is an extension.
    pub fn extend_block(&self) -> Option<ExtendRef<'a>> {
        let message = self.pool[self.id].message;
        self.pool[message].extendee.as_ref().map(|_| ExtendRef {
            pool: self.pool,
            id: message,
        })
    }

    /// Returns true if this field is declared in an extend block.
    pub fn is_extension(&self) -> bool {
        self.extend_block().is_some()
    }

    /// Options attached to this field.
    pub fn options(&self) -> &'a [OptionDecl] {
        &self.pool[self.id].options
    }
}

impl<'a> FieldType<'a> {
    /// The scalar keyword, or the fully-qualified name of the referenced type.
    pub fn name(&self) -> &'a str {
        match self {
            FieldType::Scalar(scalar) => scalar.name(),
            FieldType::Message(message) => message.full_name(),
            FieldType::Enum(enum_) => enum_.full_name(),
        }
    }
}

impl<'a> Definition<'a> {
    pub(crate) fn new(pool: &'a Pool, ty: TypeId) -> Self {
        match ty {
            TypeId::Message(message) => Definition::Message(MessageRef::new(pool, message)),
            TypeId::Enum(enum_) => Definition::Enum(EnumRef::new(pool, enum_)),
        }
    }

    /// The fully-qualified name of this type, without a leading dot.
    pub fn full_name(&self) -> &'a str {
        match self {
            Definition::Message(message) => message.full_name(),
            Definition::Enum(enum_) => enum_.full_name(),
        }
    }
}

fn messages<'a>(
    pool: &'a Pool,
    scope: &'a ScopeData,
) -> impl ExactSizeIterator<Item = MessageRef<'a>> + 'a {
    scope
        .messages
        .values()
        .map(move |&id| MessageRef::new(pool, id))
}

fn enums<'a>(
    pool: &'a Pool,
    scope: &'a ScopeData,
) -> impl ExactSizeIterator<Item = EnumRef<'a>> + 'a {
    scope.enums.values().map(move |&id| EnumRef::new(pool, id))
}

fn extends<'a>(
    pool: &'a Pool,
    scope: &'a ScopeData,
) -> impl ExactSizeIterator<Item = ExtendRef<'a>> + 'a {
    scope.extends.iter().map(move |&id| ExtendRef { pool, id })
}

fn fields<'a>(pool: &'a Pool, message: MessageId) -> impl ExactSizeIterator<Item = FieldRef<'a>> + 'a {
    pool[message]
        .fields
        .values()
        .map(move |&id| FieldRef::new(pool, id))
}

fn parent_message(pool: &Pool, scope: super::ScopeId) -> Option<MessageRef<'_>> {
    match scope {
        super::ScopeId::File(_) => None,
        super::ScopeId::Message(message) => Some(MessageRef::new(pool, message)),
    }
}

macro_rules! impl_eq_debug {
    ($($ty:ident => $name:ident;)*) => {
        $(
            impl<'a> PartialEq for $ty<'a> {
                fn eq(&self, other: &Self) -> bool {
                    ptr::eq(self.pool, other.pool) && self.id == other.id
                }
            }

            impl<'a> Eq for $ty<'a> {}

            impl<'a> fmt::Debug for $ty<'a> {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.debug_tuple(stringify!($ty)).field(&self.$name()).finish()
                }
            }
        )*
    };
}

impl_eq_debug! {
    FileRef => name;
    MessageRef => full_name;
    ExtendRef => extendee_name;
    EnumRef => full_name;
    FieldRef => name;
}

impl<'a> fmt::Debug for ImportRef<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportRef")
            .field("file", &self.file.name())
            .field("kind", &self.kind)
            .finish()
    }
}

impl<'a> fmt::Debug for EnumValueRef<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnumValueRef")
            .field("name", &self.name)
            .field("number", &self.number)
            .finish()
    }
}
