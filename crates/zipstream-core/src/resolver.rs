//! Handle → source directory resolution.
//!
//! A handle is an untrusted single path segment taken from the request
//! URL. It is validated before it ever touches the filesystem, joined onto
//! the configured root and checked once with a `stat`. The check is
//! advisory: the directory may disappear before the archiver starts, in
//! which case the failure surfaces through the archiver's exit status.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ResolveError, ResolveResult};

/// A validated, existing directory under the resource root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDirectory {
    handle: String,
    path: PathBuf,
}

impl SourceDirectory {
    /// The handle this directory was resolved from.
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Filesystem path (`root` joined with the handle).
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Check that `handle` names exactly one normal path segment.
pub fn validate_handle(handle: &str) -> ResolveResult<()> {
    let invalid = handle.is_empty()
        || handle == "."
        || handle == ".."
        || handle.contains(['/', '\\', '\0']);

    if invalid {
        return Err(ResolveError::InvalidHandle(handle.to_string()));
    }
    Ok(())
}

/// Resolve `handle` under `root`, failing if the result is not an
/// existing directory.
pub fn resolve(root: &Path, handle: &str) -> ResolveResult<SourceDirectory> {
    validate_handle(handle)?;

    let path = root.join(handle);
    match std::fs::metadata(&path) {
        Ok(meta) if meta.is_dir() => {
            debug!(handle, path = %path.display(), "resolved source directory");
            Ok(SourceDirectory {
                handle: handle.to_string(),
                path,
            })
        }
        Ok(_) => {
            debug!(handle, path = %path.display(), "source path is not a directory");
            Err(ResolveError::NotFound(handle.to_string()))
        }
        Err(e) => {
            debug!(handle, path = %path.display(), error = %e, "source directory missing");
            Err(ResolveError::NotFound(handle.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_existing_directory() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("abc")).unwrap();

        let dir = resolve(root.path(), "abc").unwrap();
        assert_eq!(dir.handle(), "abc");
        assert_eq!(dir.path(), root.path().join("abc"));
    }

    #[test]
    fn missing_directory_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        let err = resolve(root.path(), "missing").unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(h) if h == "missing"));
    }

    #[test]
    fn regular_file_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("photo.jpg"), b"jpeg").unwrap();

        let err = resolve(root.path(), "photo.jpg").unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
    }

    #[test]
    fn rejects_traversal_and_separators() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("a/b")).unwrap();

        for handle in ["", ".", "..", "a/b", "../etc", "a\\b", "nul\0byte"] {
            let err = resolve(root.path(), handle).unwrap_err();
            assert!(
                matches!(err, ResolveError::InvalidHandle(_)),
                "handle {handle:?} should be rejected"
            );
        }
    }

    #[test]
    fn dotted_names_are_plain_segments() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("..hidden")).unwrap();

        assert!(validate_handle("..hidden").is_ok());
        assert!(resolve(root.path(), "..hidden").is_ok());
    }
}
