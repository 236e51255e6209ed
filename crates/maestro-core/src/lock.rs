use crate::error::{MaestroError, Result};
use crate::paths;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Exclusive claim on installing into a project root.
///
/// The lock is a marker file created with `create_new`, so two processes
/// cannot both hold it. It is removed when the guard is dropped. A process
/// that dies without dropping leaves the file behind; it names the pid that
/// created it and can be deleted by hand.
#[derive(Debug)]
pub struct InstallLock {
    path: PathBuf,
}

impl InstallLock {
    pub fn acquire(root: &Path) -> Result<Self> {
        let path = paths::lock_path(root);
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let holder = read_holder(&path).unwrap_or_default();
                debug!(path = %path.display(), %holder, "install lock already held");
                return Err(MaestroError::Locked(path));
            }
            Err(e) => return Err(MaestroError::fs("creating install lock", &path)(e)),
        };

        // From here on the guard owns the file and cleans it up on error.
        let lock = Self { path };
        file.write_all(format!("{}\n", std::process::id()).as_bytes())
            .and_then(|()| file.flush())
            .map_err(MaestroError::fs("writing install lock", &lock.path))?;
        debug!(path = %lock.path.display(), "acquired install lock");
        Ok(lock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "released install lock"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "could not remove install lock"),
        }
    }
}

fn read_holder(path: &Path) -> Option<String> {
    let raw = fs::read_to_string(path).ok()?;
    let pid = raw.trim();
    (!pid.is_empty()).then(|| pid.to_string())
}
