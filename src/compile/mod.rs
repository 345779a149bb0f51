use std::{collections::HashSet, fmt, path::Path};

use indexmap::IndexMap;
use prost_types::FileDescriptorSet;
use tracing::{debug, info_span};

use crate::{
    check, descriptor,
    error::{Error, ErrorKind},
    file::{
        check_shadow, path_to_file_name, ChainFileResolver, File, FileResolver,
        IncludeFileResolver,
    },
    parse::Parser,
    tree::{FileId, FileRef, Pool},
    Warning,
};

#[cfg(test)]
mod tests;

/// Compiles schema files into a tree of fully-resolved declarations.
///
/// Every file is parsed at most once per compiler. Files imported by several others, directly or
/// transitively, are shared.
pub struct Compiler {
    resolver: Box<dyn FileResolver>,
    pool: Pool,
    registry: Registry,
    roots: HashSet<FileId>,
    warnings: Vec<Warning>,
    include_imports: bool,
}

/// Fully checked files, keyed by name. Files are inserted once their imports and their own
/// deferred sweep have completed, so iteration order lists dependencies first.
pub(crate) type Registry = IndexMap<String, FileId>;

/// State shared by the recursive parse of a file and its imports.
pub(crate) struct Context<'a> {
    pub pool: &'a mut Pool,
    pub warnings: &'a mut Vec<Warning>,
    registry: &'a mut Registry,
    resolver: &'a dyn FileResolver,
    import_stack: Vec<String>,
}

impl Compiler {
    /// Creates a new [`Compiler`] searching the given include directories, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if `includes` is empty.
    pub fn new(includes: impl IntoIterator<Item = impl AsRef<Path>>) -> Result<Self, Error> {
        let mut resolver = ChainFileResolver::new();
        for include in includes {
            resolver.add(IncludeFileResolver::new(include.as_ref().to_owned()));
        }

        if resolver.is_empty() {
            return Err(Error::from_kind(ErrorKind::NoIncludePaths));
        }

        Ok(Compiler::with_file_resolver(resolver))
    }

    /// Creates a new [`Compiler`] with a custom [`FileResolver`] for looking up files.
    pub fn with_file_resolver<R>(resolver: R) -> Self
    where
        R: FileResolver + 'static,
    {
        Compiler {
            resolver: Box::new(resolver),
            pool: Pool::default(),
            registry: Registry::default(),
            roots: HashSet::new(),
            warnings: Vec::new(),
            include_imports: false,
        }
    }

    /// Sets whether [`files`](Compiler::files) and [`file_descriptor_set`](Compiler::file_descriptor_set)
    /// list imported files, or only those opened explicitly.
    pub fn include_imports(&mut self, yes: bool) -> &mut Self {
        self.include_imports = yes;
        self
    }

    /// Compiles the file at the given path, along with everything it imports.
    ///
    /// If the path is absolute, or relative to the current directory, it must reside under one of
    /// the include paths. Otherwise, it is looked up relative to the include paths in the same
    /// way as `import` statements.
    ///
    /// # Errors
    ///
    /// Any lexical, syntax, resolution or semantic error in the file or its imports aborts the
    /// whole compilation of this file.
    pub fn open_file(&mut self, path: impl AsRef<Path>) -> Result<&mut Self, Error> {
        let path = path.as_ref();
        let name = match self
            .resolver
            .resolve_path(path)
            .or_else(|| path_to_file_name(path))
        {
            Some(name) => name,
            None => {
                return Err(Error::from_kind(ErrorKind::FileNotIncluded {
                    path: path.to_owned(),
                }))
            }
        };

        if let Some(&id) = self.registry.get(&name) {
            check_shadow(&name, self.pool[id].path.as_deref(), path)?;
            self.roots.insert(id);
            return Ok(self);
        }

        let file = self.resolver.open_file(&name).map_err(|err| {
            if err.is_file_not_found() {
                Error::from_kind(ErrorKind::FileNotIncluded {
                    path: path.to_owned(),
                })
            } else {
                err
            }
        })?;
        check_shadow(&name, file.path(), path)?;

        let mut ctx = Context {
            pool: &mut self.pool,
            warnings: &mut self.warnings,
            registry: &mut self.registry,
            resolver: &*self.resolver,
            import_stack: Vec::new(),
        };
        let id = ctx.parse(&name, &file)?;
        self.roots.insert(id);
        Ok(self)
    }

    /// Compiles several files. See [`open_file`](Compiler::open_file).
    pub fn open_files(
        &mut self,
        paths: impl IntoIterator<Item = impl AsRef<Path>>,
    ) -> Result<&mut Self, Error> {
        for path in paths {
            self.open_file(path)?;
        }

        Ok(self)
    }

    /// Gets a compiled file by name, whether it was opened explicitly or imported.
    pub fn file(&self, name: &str) -> Option<FileRef<'_>> {
        self.registry
            .get(name)
            .map(|&id| FileRef::new(&self.pool, id))
    }

    /// The compiled files, with dependencies ordered before the files that import them.
    ///
    /// Imported files are only listed if [`include_imports`](Compiler::include_imports) is set.
    pub fn files(&self) -> impl Iterator<Item = FileRef<'_>> + '_ {
        self.registry
            .values()
            .filter(move |&&id| self.include_imports || self.roots.contains(&id))
            .map(move |&id| FileRef::new(&self.pool, id))
    }

    /// Non-fatal diagnostics recorded so far.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Converts the compiled files into a [`FileDescriptorSet`], in the order of
    /// [`files`](Compiler::files).
    pub fn file_descriptor_set(&self) -> FileDescriptorSet {
        FileDescriptorSet {
            file: self.files().map(descriptor::file_descriptor).collect(),
        }
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &Pool {
        &self.pool
    }

    #[cfg(test)]
    pub(crate) fn file_id(&self, name: &str) -> Option<FileId> {
        self.registry.get(name).copied()
    }
}

/// Parses a single file without its deferred sweep or checks.
#[cfg(test)]
pub(crate) fn parse_unchecked(
    pool: &mut Pool,
    resolver: &dyn FileResolver,
    name: &str,
    source: &str,
) -> Result<(FileId, Vec<Warning>), Error> {
    let mut registry = Registry::default();
    let mut warnings = Vec::new();
    let mut ctx = Context {
        pool,
        warnings: &mut warnings,
        registry: &mut registry,
        resolver,
        import_stack: vec![name.to_owned()],
    };

    let id = ctx.pool.add_file(name, None);
    Parser::new(&mut ctx, id, name, source).parse_file()?;
    Ok((id, warnings))
}

impl fmt::Debug for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiler")
            .field("files", &self.registry.keys().collect::<Vec<_>>())
            .field("include_imports", &self.include_imports)
            .field("warnings", &self.warnings.len())
            .finish_non_exhaustive()
    }
}

impl<'a> Context<'a> {
    /// Returns the file with the given name, parsing it first if it has not been seen.
    pub fn load(&mut self, name: &str) -> Result<FileId, Error> {
        if let Some(&id) = self.registry.get(name) {
            return Ok(id);
        }

        if let Some(index) = self.import_stack.iter().position(|n| n == name) {
            let mut cycle = self.import_stack[index..].join(" -> ");
            cycle.push_str(" -> ");
            cycle.push_str(name);
            return Err(Error::from_kind(ErrorKind::CircularImport {
                name: name.to_owned(),
                cycle,
            }));
        }

        let file = self.resolver.open_file(name)?;
        self.parse(name, &file)
    }

    fn parse(&mut self, name: &str, file: &File) -> Result<FileId, Error> {
        let _span = info_span!("file", name).entered();
        debug!(path = ?file.path(), "parsing file");

        self.import_stack.push(name.to_owned());
        let id = self.pool.add_file(name, file.path().map(ToOwned::to_owned));
        let result = Parser::new(self, id, name, file.source()).parse_file();
        self.import_stack.pop();
        result?;

        self.pool.build_type_cache(id);
        check::check_file(self.pool, id)
            .map_err(|kind| Error::from_source(kind, name, file.source()))?;

        debug!("checked file");
        self.registry.insert(name.to_owned(), id);
        Ok(id)
    }
}
