//! Binding of raw type names to declarations.
//!
//! Names are looked up in three tiers, first match wins:
//!
//! 1. Lexical: walk from the referencing scope out to the file, matching the first segment of the
//!    name against each scope's direct children, then descending through the remaining segments.
//! 2. File-qualified: if the name starts with the file's package, descend from the file root.
//! 3. Imported: look the name up in each imported file's typename cache, first as written and then
//!    qualified with successively shorter prefixes of the imported package, down to the prefix it
//!    shares with the importing file's package.
//!
//! Absolute names (with a leading `.`) skip the lexical tier.

use crate::tree::{make_name, FileId, Pool, ScopeId, TypeId};

/// Resolves `name` as referenced from `scope` in `file`.
pub(crate) fn resolve_type_name(
    pool: &Pool,
    file: FileId,
    scope: ScopeId,
    name: &str,
) -> Option<TypeId> {
    if let Some(absolute) = name.strip_prefix('.') {
        return file_qualified(pool, file, absolute).or_else(|| imported(pool, file, absolute));
    }

    lexical(pool, scope, name)
        .or_else(|| file_qualified(pool, file, name))
        .or_else(|| imported(pool, file, name))
}

fn lexical(pool: &Pool, scope: ScopeId, name: &str) -> Option<TypeId> {
    let (first, rest) = match name.split_once('.') {
        Some((first, rest)) => (first, Some(rest)),
        None => (name, None),
    };

    let mut current = Some(scope);
    while let Some(scope) = current {
        let data = pool.scope(scope);
        let found = match rest {
            None => data
                .messages
                .get(first)
                .map(|&message| TypeId::Message(message))
                .or_else(|| data.enums.get(first).map(|&enum_| TypeId::Enum(enum_))),
            Some(rest) => data
                .messages
                .get(first)
                .and_then(|&message| descend(pool, ScopeId::Message(message), rest)),
        };
        if found.is_some() {
            return found;
        }

        current = pool.parent(scope);
    }

    None
}

fn file_qualified(pool: &Pool, file: FileId, name: &str) -> Option<TypeId> {
    let package = pool[file].package();
    if package.is_empty() {
        return descend(pool, ScopeId::File(file), name);
    }

    let rest = name.strip_prefix(package)?.strip_prefix('.')?;
    descend(pool, ScopeId::File(file), rest)
}

fn imported(pool: &Pool, file: FileId, name: &str) -> Option<TypeId> {
    let package = pool[file].package();
    for import in pool[file].imports.values() {
        let imported = &pool[import.file];
        if let Some(&ty) = imported.type_cache.get(name) {
            return Some(ty);
        }

        let imported_package = imported.package();
        if imported_package.is_empty() {
            continue;
        }

        let segments: Vec<&str> = imported_package.split('.').collect();
        let shared = common_prefix_len(package, imported_package);
        for len in (shared..=segments.len()).rev() {
            let candidate = make_name(&segments[..len].join("."), name);
            if let Some(&ty) = imported.type_cache.get(&candidate) {
                return Some(ty);
            }
        }
    }

    None
}

/// Follows a dotted path of child names down from `scope`. Intermediate segments must name
/// messages; the final segment may name a message or an enum.
fn descend(pool: &Pool, scope: ScopeId, path: &str) -> Option<TypeId> {
    let mut scope = scope;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let data = pool.scope(scope);
        if segments.peek().is_none() {
            return data
                .messages
                .get(segment)
                .map(|&message| TypeId::Message(message))
                .or_else(|| data.enums.get(segment).map(|&enum_| TypeId::Enum(enum_)));
        }

        scope = ScopeId::Message(*data.messages.get(segment)?);
    }

    None
}

/// The number of leading dotted segments shared by two package names.
pub(crate) fn common_prefix_len(a: &str, b: &str) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    a.split('.')
        .zip(b.split('.'))
        .take_while(|(a, b)| a == b)
        .count()
}

#[test]
fn common_prefix() {
    assert_eq!(common_prefix_len("a.b.c", "a.b.x.y"), 2);
    assert_eq!(common_prefix_len("p.q", "p.r"), 1);
    assert_eq!(common_prefix_len("a.b", "a.b"), 2);
    assert_eq!(common_prefix_len("a", "b"), 0);
    assert_eq!(common_prefix_len("", "a.b"), 0);
    assert_eq!(common_prefix_len("ab.c", "a.c"), 0);
}
