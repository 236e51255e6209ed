//! Moving directories aside and putting them back.
//!
//! Backups are renames, never copies: the original tree moves to a sibling
//! path and is renamed back on restore, so both directions are atomic on a
//! single filesystem.

use crate::error::{MaestroError, RestoreFailure, Result};
use crate::io;
use chrono::{Local, NaiveDateTime};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Separator between the original path and the timestamp of a user backup.
pub const BACKUP_SUFFIX: &str = "-backup-";

/// Second-granularity timestamp appended to user backups.
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Prefix of the throwaway containers holding overwrite-mode safety copies.
pub const OVERWRITE_BACKUP_PREFIX: &str = ".maestro-overwrite-backup-";

/// A target directory that was moved aside, and where it went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackRecord {
    pub original: PathBuf,
    pub backup: PathBuf,
}

impl RollbackRecord {
    pub fn new(original: impl Into<PathBuf>, backup: impl Into<PathBuf>) -> Self {
        Self {
            original: original.into(),
            backup: backup.into(),
        }
    }

    /// True when the backup lives inside an overwrite-mode temp container.
    pub fn is_overwrite_safety_copy(&self) -> bool {
        overwrite_container(&self.backup).is_some()
    }
}

/// `<dir>-backup-<YYYYMMDD-HHMMSS>` for the given local time.
pub fn backup_path_for(dir: &Path, at: NaiveDateTime) -> PathBuf {
    // Rebuild from components to drop any trailing separator.
    let normalized: PathBuf = dir.components().collect();
    let mut name = OsString::from(normalized.as_os_str());
    name.push(BACKUP_SUFFIX);
    name.push(at.format(BACKUP_TIMESTAMP_FORMAT).to_string());
    PathBuf::from(name)
}

/// Rename `dir` aside to a timestamped sibling and return the new path.
pub fn backup_dir(dir: &Path) -> Result<PathBuf> {
    let meta = fs::metadata(dir).map_err(MaestroError::fs("checking directory", dir))?;
    if !meta.is_dir() {
        return Err(MaestroError::NotADirectory(dir.to_path_buf()));
    }

    let backup = backup_path_for(dir, Local::now().naive_local());
    if io::occupied(&backup) {
        return Err(MaestroError::BackupExists(backup));
    }

    fs::rename(dir, &backup).map_err(MaestroError::fs("creating backup of", dir))?;
    info!(dir = %dir.display(), backup = %backup.display(), "backed up directory");
    Ok(backup)
}

/// Move every recorded backup back onto its original path.
///
/// Records whose backup no longer exists are skipped, so calling this twice
/// is harmless. Whatever occupies an original path is removed first; it can
/// only be the debris of a failed install because the original was moved
/// away. Every record is attempted; failures are collected and returned
/// together so a caller can see exactly which directories still need
/// attention.
pub fn restore(records: &[RollbackRecord]) -> Result<()> {
    let mut failures = Vec::new();
    for record in records {
        if !io::occupied(&record.backup) {
            debug!(backup = %record.backup.display(), "backup already restored, skipping");
            continue;
        }
        match restore_one(record) {
            Ok(()) => {
                info!(dir = %record.original.display(), "restored directory from backup");
            }
            Err(failure) => {
                warn!(error = %failure, "restore failed");
                failures.push(failure);
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(MaestroError::Restore(failures))
    }
}

fn restore_one(record: &RollbackRecord) -> std::result::Result<(), RestoreFailure> {
    let fail = |source: std::io::Error| RestoreFailure {
        original: record.original.clone(),
        backup: record.backup.clone(),
        source,
    };

    if let Ok(meta) = fs::symlink_metadata(&record.original) {
        if meta.is_dir() {
            fs::remove_dir_all(&record.original).map_err(fail)?;
        } else {
            fs::remove_file(&record.original).map_err(fail)?;
        }
    }
    fs::rename(&record.backup, &record.original).map_err(fail)?;

    if let Some(container) = overwrite_container(&record.backup) {
        if let Err(e) = fs::remove_dir(container) {
            debug!(container = %container.display(), error = %e, "leaving overwrite container in place");
        }
    }
    Ok(())
}

/// The `.maestro-overwrite-backup-*` directory holding `backup`, if any.
pub(crate) fn overwrite_container(backup: &Path) -> Option<&Path> {
    let parent = backup.parent()?;
    let name = parent.file_name()?.to_str()?;
    name.starts_with(OVERWRITE_BACKUP_PREFIX).then_some(parent)
}
