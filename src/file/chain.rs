use std::{fmt, path::Path};

use super::{File, FileResolver};
use crate::Error;

/// A [`FileResolver`] which searches several other resolvers in order.
///
/// The first resolver to find a file wins, so with one [`IncludeFileResolver`](super::IncludeFileResolver)
/// per include directory, earlier directories take precedence.
#[derive(Default)]
pub struct ChainFileResolver {
    resolvers: Vec<Box<dyn FileResolver>>,
}

impl ChainFileResolver {
    /// Creates a new, empty [`ChainFileResolver`].
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a resolver, to be searched after all previously-added resolvers.
    pub fn add<F>(&mut self, resolver: F)
    where
        F: FileResolver + 'static,
    {
        self.resolvers.push(Box::new(resolver))
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl FileResolver for ChainFileResolver {
    fn resolve_path(&self, path: &Path) -> Option<String> {
        self.resolvers
            .iter()
            .find_map(|resolver| resolver.resolve_path(path))
    }

    fn open_file(&self, name: &str) -> Result<File, Error> {
        for resolver in &self.resolvers {
            match resolver.open_file(name) {
                Ok(file) => return Ok(file),
                Err(err) if err.is_file_not_found() => continue,
                Err(err) => return Err(err),
            }
        }

        Err(Error::file_not_found(name))
    }
}

impl fmt::Debug for ChainFileResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainFileResolver")
            .field("len", &self.resolvers.len())
            .finish_non_exhaustive()
    }
}
