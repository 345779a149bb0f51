//! Conversion of resolved files into `google.protobuf` descriptor messages.

use prost_types::{
    descriptor_proto::{ExtensionRange, ReservedRange},
    field_descriptor_proto::{Label, Type},
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, MessageOptions,
};

use crate::{
    case::{to_json_name, to_pascal_case},
    tree::{
        Cardinality, EnumRef, ExtendRef, FieldRef, FieldType, FileRef, MessageRef, Scalar,
        Specifier, Syntax, TagRange,
    },
};

pub(crate) fn file_descriptor(file: FileRef<'_>) -> FileDescriptorProto {
    let imports: Vec<_> = file.imports().collect();
    let public_dependency = imports
        .iter()
        .enumerate()
        .filter(|(_, import)| import.is_public())
        .map(|(index, _)| index_to_i32(index))
        .collect();
    let weak_dependency = imports
        .iter()
        .enumerate()
        .filter(|(_, import)| import.is_weak())
        .map(|(index, _)| index_to_i32(index))
        .collect();

    FileDescriptorProto {
        name: Some(file.name().to_owned()),
        package: if file.package().is_empty() {
            None
        } else {
            Some(file.package().to_owned())
        },
        dependency: imports
            .iter()
            .map(|import| import.file().name().to_owned())
            .collect(),
        public_dependency,
        weak_dependency,
        message_type: file.messages().map(message_descriptor).collect(),
        enum_type: file.enums().map(enum_descriptor).collect(),
        extension: file.extends().flat_map(extension_descriptors).collect(),
        syntax: match file.syntax() {
            Syntax::Proto2 => None,
            Syntax::Proto3 => Some("proto3".to_owned()),
        },
        ..Default::default()
    }
}

fn message_descriptor(message: MessageRef<'_>) -> DescriptorProto {
    let mut nested_type: Vec<DescriptorProto> = message.messages().map(message_descriptor).collect();
    let mut field = Vec::with_capacity(message.fields().len());
    for f in message.fields() {
        if let Cardinality::Map(key) = f.cardinality() {
            let entry = map_entry_descriptor(f, key);
            let type_name = format!(".{}.{}", message.full_name(), entry.name());
            nested_type.push(entry);
            field.push(FieldDescriptorProto {
                label: Some(Label::Repeated as i32),
                r#type: Some(Type::Message as i32),
                type_name: Some(type_name),
                ..field_descriptor(f)
            });
        } else {
            field.push(field_descriptor(f));
        }
    }

    DescriptorProto {
        name: Some(message.name().to_owned()),
        field,
        extension: message.extends().flat_map(extension_descriptors).collect(),
        nested_type,
        enum_type: message.enums().map(enum_descriptor).collect(),
        extension_range: message
            .extension_ranges()
            .iter()
            .map(|range| ExtensionRange {
                start: Some(range_start(range)),
                end: Some(range_end(range)),
                options: None,
            })
            .collect(),
        reserved_range: message
            .reserved_ranges()
            .iter()
            .map(|range| ReservedRange {
                start: Some(range_start(range)),
                end: Some(range_end(range)),
            })
            .collect(),
        reserved_name: message.reserved_names().to_vec(),
        ..Default::default()
    }
}

/// Map fields are represented as a repeated nested message with `key` and `value` fields.
fn map_entry_descriptor(field: FieldRef<'_>, key: Scalar) -> DescriptorProto {
    let (value_type, value_type_name) = field_type(field.ty());
    DescriptorProto {
        name: Some(format!("{}Entry", to_pascal_case(field.name()))),
        field: vec![
            FieldDescriptorProto {
                name: Some("key".to_owned()),
                json_name: Some("key".to_owned()),
                number: Some(1),
                label: Some(Label::Optional as i32),
                r#type: Some(scalar_type(key) as i32),
                ..Default::default()
            },
            FieldDescriptorProto {
                name: Some("value".to_owned()),
                json_name: Some("value".to_owned()),
                number: Some(2),
                label: Some(Label::Optional as i32),
                r#type: Some(value_type as i32),
                type_name: value_type_name,
                ..Default::default()
            },
        ],
        options: Some(MessageOptions {
            map_entry: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn extension_descriptors(extend: ExtendRef<'_>) -> impl Iterator<Item = FieldDescriptorProto> + '_ {
    let extendee = format!(".{}", extend.extendee().full_name());
    extend.fields().map(move |field| FieldDescriptorProto {
        extendee: Some(extendee.clone()),
        ..field_descriptor(field)
    })
}

fn field_descriptor(field: FieldRef<'_>) -> FieldDescriptorProto {
    let label = match (field.cardinality(), field.label()) {
        (Cardinality::Repeated | Cardinality::Map(_), _) => Label::Repeated,
        (_, Some(Specifier::Required)) => Label::Required,
        _ => Label::Optional,
    };
    let (ty, type_name) = field_type(field.ty());

    FieldDescriptorProto {
        name: Some(field.name().to_owned()),
        number: Some(field.number() as i32),
        label: Some(label as i32),
        r#type: Some(ty as i32),
        type_name,
        json_name: Some(to_json_name(field.name())),
        ..Default::default()
    }
}

fn field_type(ty: FieldType<'_>) -> (Type, Option<String>) {
    match ty {
        FieldType::Scalar(scalar) => (scalar_type(scalar), None),
        FieldType::Message(message) => (Type::Message, Some(format!(".{}", message.full_name()))),
        FieldType::Enum(enum_) => (Type::Enum, Some(format!(".{}", enum_.full_name()))),
    }
}

fn scalar_type(scalar: Scalar) -> Type {
    match scalar {
        Scalar::Double => Type::Double,
        Scalar::Float => Type::Float,
        Scalar::Int32 => Type::Int32,
        Scalar::Int64 => Type::Int64,
        Scalar::Uint32 => Type::Uint32,
        Scalar::Uint64 => Type::Uint64,
        Scalar::Sint32 => Type::Sint32,
        Scalar::Sint64 => Type::Sint64,
        Scalar::Fixed32 => Type::Fixed32,
        Scalar::Fixed64 => Type::Fixed64,
        Scalar::Sfixed32 => Type::Sfixed32,
        Scalar::Sfixed64 => Type::Sfixed64,
        Scalar::Bool => Type::Bool,
        Scalar::String => Type::String,
        Scalar::Bytes => Type::Bytes,
    }
}

fn enum_descriptor(enum_: EnumRef<'_>) -> EnumDescriptorProto {
    EnumDescriptorProto {
        name: Some(enum_.name().to_owned()),
        value: enum_
            .values()
            .map(|value| EnumValueDescriptorProto {
                name: Some(value.name().to_owned()),
                number: Some(value.number()),
                options: None,
            })
            .collect(),
        ..Default::default()
    }
}

// Field numbers never exceed 2^29, so they always fit in an i32.
fn range_start(range: &TagRange) -> i32 {
    range.start as i32
}

/// Descriptor ranges are exclusive of their end.
fn range_end(range: &TagRange) -> i32 {
    range.end as i32 + 1
}

fn index_to_i32(index: usize) -> i32 {
    // Files are at most i32::MAX bytes long, so any count of declarations in one fits in an i32.
    index.try_into().unwrap_or(i32::MAX)
}
