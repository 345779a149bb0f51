//! Locating and reading schema source files.

mod chain;
mod include;
mod memory;

pub use chain::ChainFileResolver;
pub use include::IncludeFileResolver;
pub use memory::MemoryFileResolver;

pub(crate) use include::{check_shadow, path_to_file_name};

use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

use crate::{error::ErrorKind, Error};

/// The maximum size of a source file, in bytes.
pub const MAX_FILE_LEN: u64 = i32::MAX as u64;

/// A strategy for locating schema source files.
///
/// Files are identified by a unique relative name, such as `foo/bar.proto`. This is the name used
/// in `import` statements and as the key of the compiler's file registry.
pub trait FileResolver {
    /// Converts a file system path to a unique file name, if this resolver knows about it.
    fn resolve_path(&self, _path: &Path) -> Option<String> {
        None
    }

    /// Opens a file by its unique name.
    ///
    /// # Errors
    ///
    /// If the file is not found, implementations should return [`Error::file_not_found`], so that
    /// resolvers can be chained.
    fn open_file(&self, name: &str) -> Result<File, Error>;
}

impl<T> FileResolver for Box<T>
where
    T: FileResolver + ?Sized,
{
    fn resolve_path(&self, path: &Path) -> Option<String> {
        (**self).resolve_path(path)
    }

    fn open_file(&self, name: &str) -> Result<File, Error> {
        (**self).open_file(name)
    }
}

/// An opened source file, returned by [`FileResolver::open_file`].
#[derive(Debug, Clone)]
pub struct File {
    path: Option<PathBuf>,
    source: String,
}

impl File {
    /// Reads the file at `path`, which is known to the compiler as `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::file_not_found`] if there is no file at `path`, and an IO error if it
    /// cannot be read. Files larger than [`MAX_FILE_LEN`] or not encoded as UTF-8 are rejected.
    pub fn open(name: &str, path: &Path) -> Result<Self, Error> {
        let map_io_err = |err: io::Error| -> Error {
            if err.kind() == io::ErrorKind::NotFound {
                Error::file_not_found(name)
            } else {
                Error::from_kind(ErrorKind::OpenFile {
                    name: name.to_owned(),
                    path: path.to_owned(),
                    err,
                })
            }
        };

        let file = fs::File::open(path).map_err(map_io_err)?;
        let metadata = file.metadata().map_err(map_io_err)?;
        if metadata.len() > MAX_FILE_LEN {
            return Err(Error::from_kind(ErrorKind::FileTooLarge {
                name: name.to_owned(),
            }));
        }

        let mut buf = Vec::with_capacity(metadata.len() as usize);
        file.take(MAX_FILE_LEN)
            .read_to_end(&mut buf)
            .map_err(map_io_err)?;

        let source = String::from_utf8(buf).map_err(|_| {
            Error::from_kind(ErrorKind::FileInvalidUtf8 {
                name: name.to_owned(),
            })
        })?;

        Ok(File {
            path: Some(path.to_owned()),
            source,
        })
    }

    /// Creates a file from in-memory source text.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is larger than [`MAX_FILE_LEN`].
    pub fn from_source(name: &str, source: &str) -> Result<Self, Error> {
        if source.len() as u64 > MAX_FILE_LEN {
            return Err(Error::from_kind(ErrorKind::FileTooLarge {
                name: name.to_owned(),
            }));
        }

        Ok(File {
            path: None,
            source: source.to_owned(),
        })
    }

    /// The path of this file on the file system, if it was read from disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The source text of this file.
    pub fn source(&self) -> &str {
        &self.source
    }
}
