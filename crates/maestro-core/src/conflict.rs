use crate::backup::{self, RollbackRecord, OVERWRITE_BACKUP_PREFIX};
use crate::error::{MaestroError, Result};
use crate::io;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// How to treat target directories that already exist. One decision covers
/// every conflicting directory in an install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictDecision {
    /// Replace existing content; the old tree is kept only until the install succeeds.
    Overwrite,
    /// Move existing content to `<dir>-backup-<timestamp>` and keep it.
    Backup,
    /// Abort without touching anything.
    Cancel,
}

impl ConflictDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictDecision::Overwrite => "overwrite",
            ConflictDecision::Backup => "backup",
            ConflictDecision::Cancel => "cancel",
        }
    }
}

impl fmt::Display for ConflictDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictDecision {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "o" | "overwrite" => Ok(ConflictDecision::Overwrite),
            "b" | "backup" => Ok(ConflictDecision::Backup),
            "c" | "cancel" => Ok(ConflictDecision::Cancel),
            other => Err(format!(
                "unknown conflict decision '{other}': expected overwrite, backup or cancel"
            )),
        }
    }
}

/// Bookkeeping produced by applying a decision.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConflictPlan {
    /// Every directory moved aside, whichever decision moved it.
    pub rollback: Vec<RollbackRecord>,
    /// Backups the user should be told about. Empty unless the decision was `Backup`.
    pub user_backups: Vec<PathBuf>,
}

/// Targets that currently exist as directories, in input order.
pub fn detect_conflicts(targets: &[PathBuf]) -> Vec<PathBuf> {
    targets.iter().filter(|t| io::is_dir(t)).cloned().collect()
}

/// Apply `decision` to every directory in `conflicting`.
///
/// If moving any directory fails, the ones already moved are restored
/// before the error is returned.
pub fn apply_decision(conflicting: &[PathBuf], decision: ConflictDecision) -> Result<ConflictPlan> {
    let mut plan = ConflictPlan::default();
    if conflicting.is_empty() {
        return Ok(plan);
    }

    for dir in conflicting {
        let moved = match decision {
            ConflictDecision::Cancel => return Err(MaestroError::Cancelled),
            ConflictDecision::Backup => backup::backup_dir(dir),
            ConflictDecision::Overwrite => set_aside_for_overwrite(dir),
        };
        match moved {
            Ok(backup) => {
                debug!(dir = %dir.display(), backup = %backup.display(), %decision, "moved conflicting directory");
                if decision == ConflictDecision::Backup {
                    plan.user_backups.push(backup.clone());
                }
                plan.rollback.push(RollbackRecord::new(dir, backup));
            }
            Err(e) => {
                let err = MaestroError::Conflict {
                    dir: dir.clone(),
                    source: Box::new(e),
                };
                return Err(err.with_rollback(backup::restore(&plan.rollback)));
            }
        }
    }

    Ok(plan)
}

/// Rename `dir` into a fresh `.maestro-overwrite-backup-*` sibling directory.
fn set_aside_for_overwrite(dir: &Path) -> Result<PathBuf> {
    let name = dir
        .file_name()
        .ok_or_else(|| MaestroError::InvalidPath(dir.display().to_string()))?;
    let parent = match dir.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let container = tempfile::Builder::new()
        .prefix(OVERWRITE_BACKUP_PREFIX)
        .tempdir_in(parent)
        .map_err(MaestroError::fs("creating temporary backup for", dir))?;
    let backup = container.path().join(name);
    // On failure `container` is dropped here and removed with it.
    fs::rename(dir, &backup).map_err(MaestroError::fs("preparing overwrite for", dir))?;
    let _ = container.keep();
    Ok(backup)
}
