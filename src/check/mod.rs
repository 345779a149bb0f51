//! Post-parse passes over a file: the deferred resolution sweep and semantic validation.

pub(crate) mod resolve;

use std::collections::HashMap;

use tracing::debug;

use crate::{
    error::SourceErrorKind,
    tree::{FieldId, FieldTy, FileId, MessageId, Pool, ScopeId, TypeId, TypeRef},
};

/// Runs every post-parse pass over `file`. On success, no field or extension block in the file
/// is left unresolved.
///
/// Extension numbers claimed by the file are only recorded in the pool once every check has
/// passed, so a file that fails leaves no claims behind.
pub(crate) fn check_file(pool: &mut Pool, file: FileId) -> Result<(), SourceErrorKind> {
    resolve_deferred(pool, file)?;

    let mut claims = Claims::new();
    for message in file_messages(pool, file) {
        if pool[message].extendee.is_some() {
            check_extensions(pool, message, &mut claims)?;
        } else {
            check_message(pool, message)?;
        }
    }

    pool.extensions.extend(claims);
    Ok(())
}

/// Extension numbers claimed by the file being checked, keyed by extended message.
type Claims = HashMap<(MessageId, u32), FieldId>;

/// Binds every reference in `file` that the streaming parse left unresolved, using the same
/// three tiers. References that are already bound are left alone, so running the sweep again
/// changes nothing.
pub(crate) fn resolve_deferred(pool: &mut Pool, file: FileId) -> Result<(), SourceErrorKind> {
    for message in file_messages(pool, file) {
        let data = &pool[message];
        let name = match &data.extendee {
            Some(extendee) => match &extendee.target {
                TypeRef::Unresolved(name) => name,
                TypeRef::Resolved(_) => continue,
            },
            None => continue,
        };

        match resolve::resolve_type_name(pool, file, data.parent, name) {
            Some(ty) => {
                debug!(extendee = %name, target = pool.type_full_name(ty), "bound deferred extendee");
                if let Some(extendee) = &mut pool[message].extendee {
                    extendee.target.bind(ty);
                }
            }
            None => {
                return Err(SourceErrorKind::ExtendeeNotFound {
                    name: name.clone(),
                    file: pool[file].name.clone(),
                    span: pool[message].extendee.as_ref().map_or(0..0, |e| e.span.clone()),
                })
            }
        }
    }

    for field in file_fields(pool, file) {
        let data = &pool[field];
        let name = match &data.ty {
            FieldTy::Named(TypeRef::Unresolved(name)) => name,
            _ => continue,
        };

        match resolve::resolve_type_name(pool, file, ScopeId::Message(data.message), name) {
            Some(ty) => {
                debug!(
                    field = %data.name,
                    ty = %name,
                    target = pool.type_full_name(ty),
                    "bound deferred field type"
                );
                if let FieldTy::Named(target) = &mut pool[field].ty {
                    target.bind(ty);
                }
            }
            None => {
                return Err(SourceErrorKind::TypeNameNotFound {
                    name: name.clone(),
                    field: data.name.clone(),
                    file: pool[file].name.clone(),
                    span: data.type_span.clone(),
                })
            }
        }
    }

    Ok(())
}

fn check_message(pool: &Pool, message: MessageId) -> Result<(), SourceErrorKind> {
    let data = &pool[message];
    for &field in data.fields.values() {
        let field = &pool[field];
        if data.reserved_ranges.iter().any(|r| r.contains(field.number)) {
            return Err(SourceErrorKind::ReservedFieldNumber {
                name: field.name.clone(),
                number: field.number,
                span: field.number_span.clone(),
            });
        }
        if data.reserved_names.contains(&field.name) {
            return Err(SourceErrorKind::ReservedFieldName {
                name: field.name.clone(),
                span: field.name_span.clone(),
            });
        }
        if data.extension_ranges.iter().any(|r| r.contains(field.number)) {
            return Err(SourceErrorKind::FieldNumberInExtensionRange {
                number: field.number,
                message: data.full_name.clone(),
                span: field.number_span.clone(),
            });
        }
    }

    Ok(())
}

/// Validates the fields of an extension block against the extended message, and claims their
/// numbers.
fn check_extensions(
    pool: &Pool,
    block: MessageId,
    claims: &mut Claims,
) -> Result<(), SourceErrorKind> {
    let extendee = match &pool[block].extendee {
        Some(extendee) => extendee,
        None => return Ok(()),
    };
    let span = extendee.span.clone();
    let target = match extendee.target.resolved() {
        Some(TypeId::Message(target)) => target,
        Some(TypeId::Enum(enum_)) => {
            return Err(SourceErrorKind::InvalidExtendee {
                name: pool[enum_].full_name.clone(),
                span,
            })
        }
        None => unreachable!("extendee is bound by the deferred sweep"),
    };

    let target_data = &pool[target];
    if target_data.extension_ranges.is_empty() {
        return Err(SourceErrorKind::ExtendeeNotExtensible {
            name: target_data.full_name.clone(),
            span,
        });
    }

    for &field in pool[block].fields.values() {
        let data = &pool[field];
        if !target_data
            .extension_ranges
            .iter()
            .any(|r| r.contains(data.number))
        {
            let ranges = target_data
                .extension_ranges
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(SourceErrorKind::ExtensionOutOfRange {
                number: data.number,
                extendee: target_data.full_name.clone(),
                ranges,
                span: data.number_span.clone(),
            });
        }

        let key = (target, data.number);
        let existing = pool.extensions.get(&key).or_else(|| claims.get(&key)).copied();
        match existing {
            Some(existing) if existing != field => {
                return Err(SourceErrorKind::DuplicateExtension {
                    number: data.number,
                    extendee: target_data.full_name.clone(),
                    span: data.number_span.clone(),
                })
            }
            Some(_) => {}
            None => {
                claims.insert(key, field);
            }
        }
    }

    Ok(())
}

/// Every message and extend block declared in `file`, in declaration order.
fn file_messages(pool: &Pool, file: FileId) -> Vec<MessageId> {
    let mut messages = Vec::new();
    let mut stack = vec![ScopeId::File(file)];
    while let Some(scope) = stack.pop() {
        let data = pool.scope(scope);
        for &message in data.messages.values() {
            messages.push(message);
            stack.push(ScopeId::Message(message));
        }
        messages.extend(data.extends.iter().copied());
    }

    // Ids are allocated as declarations are parsed.
    messages.sort_unstable();
    messages
}

fn file_fields(pool: &Pool, file: FileId) -> Vec<FieldId> {
    let mut fields: Vec<FieldId> = file_messages(pool, file)
        .into_iter()
        .flat_map(|message| pool[message].fields.values().copied())
        .collect();
    fields.sort_unstable();
    fields
}
