//! Path checks run before every file write.
//!
//! Two attacks are covered: content keys that climb out of the target
//! directory (`../x`, absolute paths), and symlinked directories planted
//! between the target root and the file so that a write lands elsewhere.

use crate::error::{MaestroError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Validate `rel` as a content key inside `root` and return the joined path.
///
/// `root` must be absolute. Fails with `ParentTraversal` when any segment is
/// `..`, `PathTraversal` when the key is absolute or otherwise resolves
/// outside `root`, and `SymlinkDetected` when an existing directory between
/// `root` and the file is a symlink.
pub fn validate_content_path(root: &Path, rel: &str) -> Result<PathBuf> {
    // Split on both separators so "..\\x" is caught on every platform.
    if rel.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(MaestroError::ParentTraversal(rel.to_string()));
    }

    let mut resolved = root.to_path_buf();
    for component in Path::new(rel).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir => return Err(MaestroError::ParentTraversal(rel.to_string())),
            Component::RootDir | Component::Prefix(_) => {
                return Err(MaestroError::PathTraversal(rel.to_string()))
            }
        }
    }
    if !resolved.starts_with(root) {
        return Err(MaestroError::PathTraversal(rel.to_string()));
    }

    if let Some(parent) = resolved.parent() {
        ensure_no_symlinks(parent, root)?;
    }
    Ok(resolved)
}

/// Walk from `path` up to (not including) `root`, failing on the first symlink.
///
/// Components that do not exist yet are skipped; they will be created as
/// real directories by the writer.
pub fn ensure_no_symlinks(path: &Path, root: &Path) -> Result<()> {
    let mut current = path;
    while current != root && current.starts_with(root) {
        match fs::symlink_metadata(current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(MaestroError::SymlinkDetected(current.to_path_buf()));
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(MaestroError::fs("checking path", current)(e)),
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }
    Ok(())
}
