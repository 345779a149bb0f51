use std::path::{self, Path, PathBuf};

use crate::{error::ErrorKind, Error};

use super::{File, FileResolver};

/// A [`FileResolver`] which searches a single include directory on the file system.
#[derive(Debug)]
pub struct IncludeFileResolver {
    include: PathBuf,
}

impl IncludeFileResolver {
    /// Constructs an `IncludeFileResolver` that searches the given include directory.
    pub fn new(include: PathBuf) -> Self {
        IncludeFileResolver { include }
    }
}

impl FileResolver for IncludeFileResolver {
    /// Converts a path under the include directory to its file name.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::path::{Path, PathBuf};
    /// # use pbng::file::{IncludeFileResolver, FileResolver};
    /// let resolver = IncludeFileResolver::new(PathBuf::from("/path/to/include"));
    /// assert_eq!(resolver.resolve_path(Path::new("/path/to/include/dir/foo.proto")), Some("dir/foo.proto".to_owned()));
    /// assert_eq!(resolver.resolve_path(Path::new("notincluded.proto")), None);
    /// ```
    fn resolve_path(&self, path: &Path) -> Option<String> {
        strip_prefix(path, &self.include).and_then(path_to_file_name)
    }

    /// Opens the file with the given name relative to the include directory.
    fn open_file(&self, name: &str) -> Result<File, Error> {
        File::open(name, &self.include.join(name))
    }
}

/// Joins the normal components of a relative path with `/`. Returns `None` for paths with
/// non-UTF-8, root or parent components.
pub(crate) fn path_to_file_name(path: &Path) -> Option<String> {
    let mut name = String::new();
    for component in path.components() {
        match component {
            path::Component::Normal(component) => {
                let component = component.to_str()?;
                if !name.is_empty() {
                    name.push('/');
                }
                name.push_str(component);
            }
            path::Component::CurDir => continue,
            _ => return None,
        }
    }

    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Fails if the file opened for `name` is not the file at `expected_path`, meaning an earlier
/// include directory holds a file with the same name.
pub(crate) fn check_shadow(
    name: &str,
    actual_path: Option<&Path>,
    expected_path: &Path,
) -> Result<(), Error> {
    if let Some(actual_path) = actual_path {
        if !ends_with(actual_path, expected_path) {
            return Err(Error::from_kind(ErrorKind::FileShadowed {
                name: name.to_owned(),
                path: expected_path.to_owned(),
                shadow: actual_path.to_owned(),
            }));
        }
    }

    Ok(())
}

fn strip_prefix<'a>(path: &'a Path, prefix: &Path) -> Option<&'a Path> {
    Some(iter_after(path.components(), prefix.components())?.as_path())
}

fn ends_with(path: &Path, suffix: &Path) -> bool {
    iter_after(path.components().rev(), suffix.components().rev()).is_some()
}

/// Ignores `.` components, and compares case-insensitively on windows.
fn iter_after<'a, 'b, I, J>(mut iter: I, mut prefix: J) -> Option<I>
where
    I: Iterator<Item = path::Component<'a>> + Clone,
    J: Iterator<Item = path::Component<'b>> + Clone,
{
    loop {
        let mut path_next = iter.clone();
        let mut prefix_next = prefix.clone();

        match (path_next.next(), prefix_next.next()) {
            (Some(path::Component::CurDir), _) => iter = path_next,
            (_, Some(path::Component::CurDir)) => prefix = prefix_next,
            (Some(ref l), Some(ref r)) if path_component_eq(l, r) => {
                iter = path_next;
                prefix = prefix_next;
            }
            (Some(_), Some(_)) | (None, Some(_)) => return None,
            (_, None) => return Some(iter),
        }
    }
}

#[cfg(windows)]
fn path_component_eq(l: &path::Component, r: &path::Component) -> bool {
    l.as_os_str().eq_ignore_ascii_case(r.as_os_str())
}

#[cfg(not(windows))]
fn path_component_eq(l: &path::Component, r: &path::Component) -> bool {
    l == r
}

#[test]
fn file_names() {
    assert_eq!(
        path_to_file_name(Path::new("foo/bar.proto")).as_deref(),
        Some("foo/bar.proto")
    );
    assert_eq!(
        path_to_file_name(Path::new("./foo.proto")).as_deref(),
        Some("foo.proto")
    );
    assert_eq!(path_to_file_name(Path::new("../foo.proto")), None);
    assert_eq!(path_to_file_name(Path::new("")), None);
}

#[test]
fn shadowed_file() {
    assert!(check_shadow("a.proto", Some(Path::new("inc/a.proto")), Path::new("a.proto")).is_ok());
    assert!(check_shadow("a.proto", None, Path::new("a.proto")).is_ok());

    let err = check_shadow(
        "a.proto",
        Some(Path::new("first/a.proto")),
        Path::new("second/a.proto"),
    )
    .unwrap_err();
    assert_eq!(err.file(), Some("a.proto"));
}
