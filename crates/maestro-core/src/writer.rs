use crate::error::{MaestroError, Result};
use crate::fetch::ContentMap;
use crate::{guard, io};
use std::path::Path;
use tracing::debug;

/// Write every entry of `content` into `target`, creating directories as needed.
///
/// Each key is checked by [`guard::validate_content_path`] right before its
/// file is written with [`io::atomic_write`]. The first failing entry aborts
/// the call; files already written by this call are left for the caller to
/// clean up, since only the caller knows the wider transaction.
pub fn write_dir(content: &ContentMap, target: &Path) -> Result<()> {
    if content.is_empty() {
        return Err(MaestroError::EmptyContent);
    }

    let root = std::path::absolute(target)
        .map_err(MaestroError::fs("resolving target directory", target))?;
    io::ensure_dir(&root)?;

    for (rel, data) in content {
        let path = guard::validate_content_path(&root, rel)?;
        if path == root {
            return Err(MaestroError::InvalidPath(rel.clone()));
        }
        if let Some(parent) = path.parent() {
            io::ensure_dir(parent)?;
        }
        io::atomic_write(&path, data)?;
        debug!(path = %path.display(), bytes = data.len(), "wrote file");
    }

    Ok(())
}
