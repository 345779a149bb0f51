use std::collections::HashMap;

use super::{File, FileResolver};
use crate::Error;

/// A [`FileResolver`] serving source text held in memory.
///
/// # Examples
///
/// ```
/// # use pbng::{Compiler, file::MemoryFileResolver};
/// let mut files = MemoryFileResolver::new();
/// files.add("a.proto", "message A { optional B b = 1; } message B {}");
///
/// let mut compiler = Compiler::with_file_resolver(files);
/// compiler.open_file("a.proto").unwrap();
/// let file = compiler.file("a.proto").unwrap();
/// assert_eq!(file.messages().count(), 2);
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryFileResolver {
    files: HashMap<String, String>,
}

impl MemoryFileResolver {
    /// Creates a new, empty [`MemoryFileResolver`].
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a file. A file previously added with the same name is replaced.
    pub fn add(&mut self, name: impl Into<String>, source: impl Into<String>) -> &mut Self {
        self.files.insert(name.into(), source.into());
        self
    }
}

impl FileResolver for MemoryFileResolver {
    fn open_file(&self, name: &str) -> Result<File, Error> {
        match self.files.get(name) {
            Some(source) => File::from_source(name, source),
            None => Err(Error::file_not_found(name)),
        }
    }
}
