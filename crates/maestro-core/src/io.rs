use crate::error::{MaestroError, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Prefix for in-flight temp files created next to their destination.
pub const TEMP_FILE_PREFIX: &str = ".tmp-";

#[cfg(unix)]
const FILE_MODE: u32 = 0o644;
#[cfg(unix)]
const DIR_MODE: u32 = 0o755;

/// Atomically write `data` to `path` using a tempfile in the same directory.
///
/// The temp file is synced and given `0644` permissions before it is renamed
/// over `path`, so readers see either the old file or the complete new one.
/// The parent directory must already exist. On any failure the temp file is
/// removed and `path` is left untouched.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_FILE_PREFIX)
        .tempfile_in(dir)
        .map_err(MaestroError::fs("creating temp file in", dir))?;
    let tmp_path = tmp.path().to_path_buf();

    tmp.write_all(data)
        .map_err(MaestroError::fs("writing temp file", &tmp_path))?;
    tmp.as_file()
        .sync_all()
        .map_err(MaestroError::fs("syncing temp file", &tmp_path))?;
    set_file_mode(tmp.as_file()).map_err(MaestroError::fs("setting permissions on", &tmp_path))?;

    // Dropping the PersistError drops the temp file with it, which unlinks it.
    tmp.persist(path).map_err(|e| MaestroError::Fs {
        op: "renaming temp file onto",
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

#[cfg(unix)]
fn set_file_mode(file: &fs::File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(FILE_MODE))
}

#[cfg(not(unix))]
fn set_file_mode(_file: &fs::File) -> std::io::Result<()> {
    Ok(())
}

/// Create a directory and all parents, idempotent.
pub fn ensure_dir(path: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder
        .create(path)
        .map_err(MaestroError::fs("creating directory", path))
}

/// True when `path` exists and resolves to a directory.
pub fn is_dir(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

/// True when anything (including a dangling symlink) occupies `path`.
pub fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Remove whatever occupies `path`. Directories are removed recursively,
/// symlinks are unlinked without following them. A missing path is not an error.
pub fn remove_path(path: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(MaestroError::fs("inspecting", path)(e)),
    };
    let removed = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match removed {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(MaestroError::fs("removing", path)(e)),
    }
}
