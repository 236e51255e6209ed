use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Boxed error produced by a fetch collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The point in an install at which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Input,
    Fetch,
    Conflict,
    Write,
    Finalize,
    Rollback,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Input => "input",
            Stage::Fetch => "fetch",
            Stage::Conflict => "conflict",
            Stage::Write => "write",
            Stage::Finalize => "finalize",
            Stage::Rollback => "rollback",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One backup that could not be moved back onto its original path.
#[derive(Debug, Error)]
#[error("restoring {} from {}: {source}", .original.display(), .backup.display())]
pub struct RestoreFailure {
    pub original: PathBuf,
    pub backup: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, Error)]
pub enum MaestroError {
    #[error("no content to write")]
    EmptyContent,

    #[error("no content fetched for {}", .0.display())]
    EmptyStagedContent(PathBuf),

    #[error("duplicate target directory: {}", .0.display())]
    DuplicateTarget(PathBuf),

    #[error("target exists and is not a directory: {}", .0.display())]
    TargetOccupied(PathBuf),

    #[error("path contains \"..\": {0}")]
    ParentTraversal(String),

    #[error("path traversal detected: {0}")]
    PathTraversal(String),

    #[error("symlink detected at {}", .0.display())]
    SymlinkDetected(PathBuf),

    #[error("invalid content path '{0}': must name a file inside the target directory")]
    InvalidPath(String),

    #[error("path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("backup path already exists: {}", .0.display())]
    BackupExists(PathBuf),

    #[error("installation cancelled")]
    Cancelled,

    #[error("another install is in progress (lock file {})", .0.display())]
    Locked(PathBuf),

    #[error("{op} {}: {source}", .path.display())]
    Fs {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("fetching starter assets for {}: {source}", .dir.display())]
    Fetch {
        dir: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("preparing conflicting directory {}: {source}", .dir.display())]
    Conflict {
        dir: PathBuf,
        #[source]
        source: Box<MaestroError>,
    },

    #[error("writing starter assets for {}: {source}", .dir.display())]
    Write {
        dir: PathBuf,
        #[source]
        source: Box<MaestroError>,
    },

    #[error("removing temporary backup {}: {source}", .path.display())]
    Finalize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{cause} (rollback failed: {rollback})")]
    RollbackFailed {
        #[source]
        cause: Box<MaestroError>,
        rollback: Box<MaestroError>,
    },

    #[error("{}", restore_summary(.0))]
    Restore(Vec<RestoreFailure>),

    #[error(
        "temporary backup of {} was already removed; new content left in place",
        .0.display()
    )]
    BackupPurged(PathBuf),

    #[error("rollback incomplete: {}", join_errors(.0))]
    RollbackIncomplete(Vec<MaestroError>),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, MaestroError>;

fn restore_summary(failures: &[RestoreFailure]) -> String {
    let details: Vec<String> = failures.iter().map(ToString::to_string).collect();
    format!(
        "{} of the original directories could not be restored: {}",
        failures.len(),
        details.join("; ")
    )
}

fn join_errors(errors: &[MaestroError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl MaestroError {
    /// Builds a `map_err` adapter that tags an I/O error with the operation and path.
    pub(crate) fn fs(op: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.to_path_buf();
        move |source| MaestroError::Fs { op, path, source }
    }

    /// Fold the outcome of an undo step into this error. A failed rollback
    /// is never dropped: it becomes `RollbackFailed` carrying both errors.
    pub(crate) fn with_rollback(self, rollback: Result<()>) -> Self {
        match rollback {
            Ok(()) => self,
            Err(rollback) => MaestroError::RollbackFailed {
                cause: Box::new(self),
                rollback: Box::new(rollback),
            },
        }
    }

    /// Stage tag for errors raised by the transactional installer.
    ///
    /// Leaf errors (path checks, raw I/O) return `None`; they only acquire a
    /// stage once the installer wraps them.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            MaestroError::EmptyStagedContent(_)
            | MaestroError::DuplicateTarget(_)
            | MaestroError::TargetOccupied(_) => Some(Stage::Input),
            MaestroError::Fetch { .. } => Some(Stage::Fetch),
            MaestroError::Cancelled | MaestroError::Conflict { .. } => Some(Stage::Conflict),
            MaestroError::Write { .. } => Some(Stage::Write),
            MaestroError::Finalize { .. } => Some(Stage::Finalize),
            MaestroError::RollbackFailed { .. }
            | MaestroError::Restore(_)
            | MaestroError::RollbackIncomplete(_)
            | MaestroError::BackupPurged(_) => Some(Stage::Rollback),
            _ => None,
        }
    }

    /// Stage of the failure that started things, looking through a failed rollback.
    pub fn original_stage(&self) -> Option<Stage> {
        match self {
            MaestroError::RollbackFailed { cause, .. } => cause.original_stage(),
            other => other.stage(),
        }
    }

    /// True when the caller chose to cancel; this is an expected outcome, not a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, MaestroError::Cancelled)
    }

    /// True when restoring the pre-install state also failed and the
    /// filesystem needs manual attention.
    pub fn rollback_failed(&self) -> bool {
        matches!(
            self,
            MaestroError::RollbackFailed { .. }
                | MaestroError::Restore(_)
                | MaestroError::RollbackIncomplete(_)
        )
    }
}
