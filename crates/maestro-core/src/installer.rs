//! All-or-nothing installation of a set of target directories.
//!
//! An install runs in a fixed order:
//!
//! 1. fetch content for every target (nothing on disk changes yet),
//! 2. move existing targets aside according to one [`ConflictDecision`],
//! 3. write every target in the order given,
//! 4. for `Overwrite`, delete the temporary safety copies.
//!
//! A target occupied by anything other than a directory is refused before
//! step 1. A failure in step 3 or 4 removes what the install wrote and moves
//! the pre-install directories back. Parent directories the install had to
//! create are removed as well, so after the call returns the targets are
//! either all installed or all as they were before.

use crate::backup::{self, RollbackRecord};
use crate::conflict::{self, ConflictDecision};
use crate::error::{MaestroError, Result};
use crate::fetch::{AssetFetcher, ContentMap};
use crate::{io, writer};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of a successful install.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallResult {
    /// Targets written, in install order.
    pub installed: Vec<PathBuf>,
    /// Backups kept for the user. Only populated for [`ConflictDecision::Backup`].
    pub backups: Vec<PathBuf>,
}

/// Install every directory in `targets` as one transaction.
///
/// `targets` is both the write order and the removal order on rollback.
/// Concurrent installs into the same targets are not coordinated here; see
/// [`crate::lock::InstallLock`].
pub fn install_required_assets<F>(
    targets: &[PathBuf],
    decision: ConflictDecision,
    fetcher: &F,
) -> Result<InstallResult>
where
    F: AssetFetcher + ?Sized,
{
    if targets.is_empty() {
        return Ok(InstallResult::default());
    }
    reject_duplicates(targets)?;
    reject_occupied(targets)?;

    let staged = fetch_all(targets, fetcher)?;

    let conflicting = conflict::detect_conflicts(targets);
    let plan = conflict::apply_decision(&conflicting, decision)?;
    // Every target is now absent, so whatever ends up there was written by us.
    let parents = missing_parents(targets);

    let mut installed = Vec::with_capacity(targets.len());
    for (dir, content) in &staged {
        debug!(dir = %dir.display(), files = content.len(), "writing target");
        if let Err(e) = writer::write_dir(content, dir) {
            let err = MaestroError::Write {
                dir: dir.clone(),
                source: Box::new(e),
            };
            warn!(error = %err, "install failed, rolling back");
            let touched = &targets[..=installed.len()];
            return Err(err.with_rollback(roll_back(touched, &plan.rollback, &[], &parents)));
        }
        installed.push(dir.clone());
    }

    if decision == ConflictDecision::Overwrite {
        let mut purged = Vec::new();
        if let Err(err) = finalize(&plan.rollback, &mut purged) {
            warn!(error = %err, "finalize failed, rolling back");
            return Err(err.with_rollback(roll_back(targets, &plan.rollback, &purged, &parents)));
        }
    }

    info!(
        installed = installed.len(),
        backups = plan.user_backups.len(),
        %decision,
        "install complete"
    );
    Ok(InstallResult {
        installed,
        backups: plan.user_backups,
    })
}

fn reject_duplicates(targets: &[PathBuf]) -> Result<()> {
    let mut seen = HashSet::with_capacity(targets.len());
    for dir in targets {
        let key: PathBuf = dir.components().collect();
        if !seen.insert(key) {
            return Err(MaestroError::DuplicateTarget(dir.clone()));
        }
    }
    Ok(())
}

/// A target slot holding a file or a symlink that does not resolve to a
/// directory is neither a conflict to move aside nor free to write into.
fn reject_occupied(targets: &[PathBuf]) -> Result<()> {
    match targets.iter().find(|t| io::occupied(t) && !io::is_dir(t)) {
        Some(dir) => Err(MaestroError::TargetOccupied(dir.clone())),
        None => Ok(()),
    }
}

/// Ancestors of the targets that do not exist yet, deepest first.
fn missing_parents(targets: &[PathBuf]) -> Vec<PathBuf> {
    let mut parents: Vec<PathBuf> = Vec::new();
    for dir in targets {
        for parent in dir.ancestors().skip(1) {
            if parent.as_os_str().is_empty() || io::occupied(parent) {
                break;
            }
            if !parents.iter().any(|p| p == parent) {
                parents.push(parent.to_path_buf());
            }
        }
    }
    parents.sort_by_key(|p| std::cmp::Reverse(p.components().count()));
    parents
}

/// Fetch every target up front. Fails fast on the first error; the disk is untouched.
fn fetch_all<F>(targets: &[PathBuf], fetcher: &F) -> Result<Vec<(PathBuf, ContentMap)>>
where
    F: AssetFetcher + ?Sized,
{
    let mut staged = Vec::with_capacity(targets.len());
    for dir in targets {
        debug!(dir = %dir.display(), "fetching");
        let content = fetcher.fetch(dir).map_err(|e| MaestroError::Fetch {
            dir: dir.clone(),
            source: e.into(),
        })?;
        if content.is_empty() {
            return Err(MaestroError::EmptyStagedContent(dir.clone()));
        }
        staged.push((dir.clone(), content));
    }
    Ok(staged)
}

/// Delete the overwrite safety containers now that the new content is live.
///
/// `purged` collects the originals whose safety copy is gone (or possibly
/// half gone), including the one whose removal failed.
fn finalize(records: &[RollbackRecord], purged: &mut Vec<PathBuf>) -> Result<()> {
    for record in records {
        let container = backup::overwrite_container(&record.backup)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| record.backup.clone());
        purged.push(record.original.clone());
        fs::remove_dir_all(&container).map_err(|source| MaestroError::Finalize {
            path: container.clone(),
            source,
        })?;
        debug!(container = %container.display(), "removed temporary backup");
    }
    Ok(())
}

/// Remove the targets this install wrote into, move the recorded backups
/// back into place, then drop the parent directories the install created.
///
/// `targets` must only name paths that were absent or moved aside before
/// writing began. Targets listed in `purged` are left alone: their previous
/// content no longer exists, so the new content is the only copy. Every step
/// is attempted even after an earlier one fails.
fn roll_back(
    targets: &[PathBuf],
    records: &[RollbackRecord],
    purged: &[PathBuf],
    parents: &[PathBuf],
) -> Result<()> {
    let mut failures = Vec::new();

    for dir in targets {
        if purged.contains(dir) {
            failures.push(MaestroError::BackupPurged(dir.clone()));
            continue;
        }
        if let Err(e) = io::remove_path(dir) {
            warn!(dir = %dir.display(), error = %e, "could not remove partial target");
            failures.push(e);
        }
    }

    let restorable: Vec<RollbackRecord> = records
        .iter()
        .filter(|r| !purged.contains(&r.original))
        .cloned()
        .collect();
    if let Err(e) = backup::restore(&restorable) {
        failures.push(e);
    }

    // Only empty directories go; anything still holding files stays.
    for parent in parents {
        if let Err(e) = fs::remove_dir(parent) {
            debug!(dir = %parent.display(), error = %e, "leaving parent directory in place");
        }
    }

    if failures.is_empty() {
        info!(targets = targets.len(), restored = restorable.len(), "rollback complete");
        Ok(())
    } else {
        Err(MaestroError::RollbackIncomplete(failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn required(root: &Path) -> Vec<PathBuf> {
        ["scripts", "skills", "templates"]
            .iter()
            .map(|name| root.join(".maestro").join(name))
            .collect()
    }

    fn readme_for(dir: &Path) -> anyhow::Result<ContentMap> {
        Ok(ContentMap::from([(
            "README.md".to_string(),
            format!("installed: {}", dir.display()).into_bytes(),
        )]))
    }

    fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let rel = e.path().strip_prefix(dir).unwrap().to_path_buf();
                (rel, std::fs::read(e.path()).unwrap())
            })
            .collect()
    }

    fn seed(dir: &Path, files: &[(&str, &str)]) {
        for (rel, body) in files {
            let path = dir.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, body).unwrap();
        }
    }

    fn sibling_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn fresh_install_writes_every_target() {
        let root = TempDir::new().unwrap();
        let targets = required(root.path());

        let result =
            install_required_assets(&targets, ConflictDecision::Overwrite, &readme_for).unwrap();

        assert_eq!(result.installed, targets);
        assert!(result.backups.is_empty());
        for dir in &targets {
            let body = std::fs::read_to_string(dir.join("README.md")).unwrap();
            assert_eq!(body, format!("installed: {}", dir.display()));
            assert_eq!(std::fs::read_dir(dir).unwrap().count(), 1);
        }
    }

    #[test]
    fn no_targets_is_an_empty_install() {
        let calls = RefCell::new(0);
        let fetch = |_: &Path| -> anyhow::Result<ContentMap> {
            *calls.borrow_mut() += 1;
            Ok(ContentMap::new())
        };
        let result = install_required_assets(&[], ConflictDecision::Cancel, &fetch).unwrap();
        assert_eq!(result, InstallResult::default());
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn fetch_failure_writes_nothing() {
        let root = TempDir::new().unwrap();
        let targets = required(root.path());
        seed(&targets[2], &[("keep.md", "existing")]);
        let before = snapshot(root.path());

        let fetch = |dir: &Path| -> anyhow::Result<ContentMap> {
            if dir.ends_with("skills") {
                anyhow::bail!("network failure");
            }
            readme_for(dir)
        };
        let err =
            install_required_assets(&targets, ConflictDecision::Overwrite, &fetch).unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Fetch));
        assert!(err.to_string().contains("network failure"));
        assert!(!targets[0].exists());
        assert!(!targets[1].exists());
        assert_eq!(snapshot(root.path()), before);
    }

    #[test]
    fn all_fetches_happen_before_any_write() {
        let root = TempDir::new().unwrap();
        let targets = required(root.path());
        let seen_on_disk = RefCell::new(Vec::new());

        let fetch = |dir: &Path| -> anyhow::Result<ContentMap> {
            seen_on_disk
                .borrow_mut()
                .extend(required(root.path()).into_iter().filter(|t| t.exists()));
            readme_for(dir)
        };
        install_required_assets(&targets, ConflictDecision::Overwrite, &fetch).unwrap();
        assert!(seen_on_disk.borrow().is_empty());
    }

    #[test]
    fn write_failure_removes_every_target() {
        let root = TempDir::new().unwrap();
        let targets = required(root.path());

        let fetch = |dir: &Path| -> anyhow::Result<ContentMap> {
            if dir.ends_with("skills") {
                return Ok(ContentMap::from([(
                    "../bad.txt".to_string(),
                    b"bad".to_vec(),
                )]));
            }
            Ok(ContentMap::from([("ok.txt".to_string(), b"ok".to_vec())]))
        };
        let err =
            install_required_assets(&targets, ConflictDecision::Overwrite, &fetch).unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Write));
        assert!(!err.rollback_failed());
        for dir in &targets {
            assert!(!dir.exists(), "{} should have been rolled back", dir.display());
        }
        assert!(!root.path().join(".maestro/bad.txt").exists());
        assert!(!root.path().join(".maestro").exists(), "created parent left behind");
    }

    #[test]
    fn write_failure_keeps_parents_that_already_existed() {
        let root = TempDir::new().unwrap();
        let targets = required(root.path());
        seed(&root.path().join(".maestro"), &[("config.yaml", "cli_version: v1\n")]);

        let fetch = |dir: &Path| -> anyhow::Result<ContentMap> {
            if dir.ends_with("templates") {
                return Ok(ContentMap::from([("../x".to_string(), b"x".to_vec())]));
            }
            readme_for(dir)
        };
        install_required_assets(&targets, ConflictDecision::Backup, &fetch).unwrap_err();

        assert_eq!(sibling_names(&targets[0]), vec!["config.yaml"]);
    }

    #[test]
    fn file_in_place_of_a_target_is_rejected() {
        let root = TempDir::new().unwrap();
        let a = root.path().join("a");
        let b = root.path().join("b");
        std::fs::write(&b, "user notes").unwrap();

        let targets = vec![a.clone(), b.clone()];
        let err =
            install_required_assets(&targets, ConflictDecision::Backup, &readme_for).unwrap_err();

        assert!(matches!(&err, MaestroError::TargetOccupied(p) if *p == b), "{err}");
        assert_eq!(err.stage(), Some(Stage::Input));
        assert_eq!(std::fs::read_to_string(&b).unwrap(), "user notes");
        assert!(!a.exists());
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_in_place_of_a_target_is_rejected() {
        let root = TempDir::new().unwrap();
        let targets = required(root.path());
        std::fs::create_dir_all(root.path().join(".maestro")).unwrap();
        std::os::unix::fs::symlink(root.path().join("nowhere"), &targets[1]).unwrap();

        let err =
            install_required_assets(&targets, ConflictDecision::Overwrite, &readme_for).unwrap_err();

        assert!(matches!(err, MaestroError::TargetOccupied(_)), "{err}");
        assert!(std::fs::symlink_metadata(&targets[1]).unwrap().file_type().is_symlink());
        assert!(!targets[0].exists());
        assert!(!targets[2].exists());
    }

    #[test]
    fn rollback_leaves_paths_it_did_not_write() {
        let root = TempDir::new().unwrap();
        let a = root.path().join("a");
        let b = root.path().join("b");
        seed(&a, &[("new.md", "new a")]);
        std::fs::write(&b, "user notes").unwrap();

        roll_back(&[a.clone()], &[], &[], &[]).unwrap();

        assert!(!a.exists());
        assert_eq!(std::fs::read_to_string(&b).unwrap(), "user notes");
    }

    #[test]
    fn empty_fetched_content_is_an_input_error() {
        let root = TempDir::new().unwrap();
        let targets = required(root.path());
        let fetch = |dir: &Path| -> anyhow::Result<ContentMap> {
            if dir.ends_with("templates") {
                return Ok(ContentMap::new());
            }
            readme_for(dir)
        };
        let err =
            install_required_assets(&targets, ConflictDecision::Overwrite, &fetch).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Input));
        assert!(!root.path().join(".maestro").exists());
    }

    #[test]
    fn duplicate_targets_are_rejected() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("skills");
        let targets = vec![dir.clone(), root.path().join("skills/")];
        let err =
            install_required_assets(&targets, ConflictDecision::Backup, &readme_for).unwrap_err();
        assert!(matches!(err, MaestroError::DuplicateTarget(_)), "{err}");
        assert!(!dir.exists());
    }

    #[test]
    fn cancel_with_conflicts_changes_nothing() {
        let root = TempDir::new().unwrap();
        let targets = required(root.path());
        seed(&targets[1], &[("old.md", "old skills")]);
        let before = snapshot(root.path());

        let err =
            install_required_assets(&targets, ConflictDecision::Cancel, &readme_for).unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(snapshot(root.path()), before);
        assert!(!targets[0].exists());
    }

    #[test]
    fn cancel_without_conflicts_installs() {
        let root = TempDir::new().unwrap();
        let targets = required(root.path());
        let result =
            install_required_assets(&targets, ConflictDecision::Cancel, &readme_for).unwrap();
        assert_eq!(result.installed.len(), 3);
    }

    #[test]
    fn backup_keeps_old_content_beside_new() {
        let root = TempDir::new().unwrap();
        let targets = required(root.path());
        seed(&targets[1], &[("old.md", "old skills"), ("deep/x.md", "x")]);
        let old = snapshot(&targets[1]);

        let result =
            install_required_assets(&targets, ConflictDecision::Backup, &readme_for).unwrap();

        assert_eq!(result.backups.len(), 1);
        let backup = &result.backups[0];
        let backup_name = backup.file_name().unwrap().to_string_lossy().into_owned();
        assert!(backup_name.starts_with("skills-backup-"), "{backup_name}");
        assert_eq!(backup.parent(), targets[1].parent());
        assert_eq!(snapshot(backup), old);

        let new = snapshot(&targets[1]);
        assert_eq!(new.len(), 1);
        assert!(new.contains_key(Path::new("README.md")));
    }

    #[test]
    fn overwrite_success_leaves_no_safety_copies() {
        let root = TempDir::new().unwrap();
        let targets = required(root.path());
        seed(&targets[0], &[("stale.sh", "old")]);

        let result =
            install_required_assets(&targets, ConflictDecision::Overwrite, &readme_for).unwrap();

        assert!(result.backups.is_empty());
        assert!(!targets[0].join("stale.sh").exists());
        assert!(targets[0].join("README.md").exists());
        assert_eq!(sibling_names(&targets[0]), vec!["scripts", "skills", "templates"]);
    }

    #[test]
    fn overwrite_write_failure_restores_original() {
        let root = TempDir::new().unwrap();
        let targets = required(root.path());
        seed(&targets[0], &[("run.sh", "original script")]);
        let original = snapshot(&targets[0]);

        let fetch = |dir: &Path| -> anyhow::Result<ContentMap> {
            if dir.ends_with("templates") {
                return Ok(ContentMap::from([(
                    "../../escape.txt".to_string(),
                    b"bad".to_vec(),
                )]));
            }
            readme_for(dir)
        };
        let err =
            install_required_assets(&targets, ConflictDecision::Overwrite, &fetch).unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Write));
        assert_eq!(snapshot(&targets[0]), original);
        assert!(!targets[1].exists());
        assert!(!targets[2].exists());
        assert_eq!(sibling_names(&targets[0]), vec!["scripts"]);
    }

    #[test]
    fn backup_write_failure_restores_original_path() {
        let root = TempDir::new().unwrap();
        let targets = required(root.path());
        seed(&targets[2], &[("spec.md", "template")]);
        let original = snapshot(&targets[2]);

        let fetch = |dir: &Path| -> anyhow::Result<ContentMap> {
            if dir.ends_with("templates") {
                return Ok(ContentMap::from([("/abs.txt".to_string(), b"bad".to_vec())]));
            }
            readme_for(dir)
        };
        let err = install_required_assets(&targets, ConflictDecision::Backup, &fetch).unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Write));
        assert_eq!(snapshot(&targets[2]), original);
        assert_eq!(sibling_names(&targets[2]), vec!["templates"]);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_in_conflicting_dir_moves_with_backup() {
        let root = TempDir::new().unwrap();
        let outside = root.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();
        let targets = required(root.path());
        seed(&targets[1], &[("old.md", "old")]);
        std::os::unix::fs::symlink(&outside, targets[1].join("linked")).unwrap();

        // The conflicting dir is moved aside before writing, so the symlink
        // travels with it and the fresh target has none.
        let fetch = |dir: &Path| -> anyhow::Result<ContentMap> {
            Ok(ContentMap::from([(
                "linked/file.md".to_string(),
                dir.display().to_string().into_bytes(),
            )]))
        };
        install_required_assets(&targets, ConflictDecision::Backup, &fetch).unwrap();
        assert_eq!(std::fs::read_dir(&outside).unwrap().count(), 0);
        assert!(targets[1].join("linked").is_dir());
    }

    #[test]
    fn rollback_keeps_targets_whose_backup_was_purged() {
        let root = TempDir::new().unwrap();
        let a = root.path().join("a");
        let b = root.path().join("b");
        seed(&a, &[("new.md", "new a")]);
        seed(&b, &[("new.md", "new b")]);
        let b_backup = root.path().join("b-backup");
        seed(&b_backup, &[("old.md", "old b")]);

        let records = vec![
            RollbackRecord::new(&a, root.path().join("a-backup-gone")),
            RollbackRecord::new(&b, &b_backup),
        ];
        let err = roll_back(&[a.clone(), b.clone()], &records, &[a.clone()], &[]).unwrap_err();

        assert!(err.rollback_failed());
        assert!(err.to_string().contains("already removed"));
        assert_eq!(std::fs::read_to_string(a.join("new.md")).unwrap(), "new a");
        assert_eq!(std::fs::read_to_string(b.join("old.md")).unwrap(), "old b");
        assert!(!b.join("new.md").exists());
    }

    #[cfg(unix)]
    #[test]
    fn finalize_failure_keeps_purged_targets_and_restores_the_rest() {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new().unwrap();
        let targets = required(root.path());
        seed(&targets[0], &[("old.sh", "old scripts")]);
        seed(&targets[1], &[("locked/old.md", "old skills")]);
        seed(&targets[2], &[("old.md", "old templates")]);
        let old_templates = snapshot(&targets[2]);

        let locked = targets[1].join("locked");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();
        if std::fs::write(locked.join("writable"), "").is_ok() {
            // Permission bits are not enforced for this user.
            std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let err =
            install_required_assets(&targets, ConflictDecision::Overwrite, &readme_for).unwrap_err();

        assert_eq!(err.original_stage(), Some(Stage::Finalize));
        assert_eq!(err.stage(), Some(Stage::Rollback));
        assert!(err.rollback_failed());
        assert!(err.to_string().contains("already removed"), "{err}");

        // scripts lost its safety copy before the failure and skills lost
        // part of it, so both keep the new content.
        for dir in &targets[..2] {
            let new = snapshot(dir);
            assert_eq!(new.len(), 1, "{}", dir.display());
            assert!(new.contains_key(Path::new("README.md")));
        }
        assert_eq!(snapshot(&targets[2]), old_templates);

        let leftover: Vec<PathBuf> = sibling_names(&targets[0])
            .into_iter()
            .filter(|n| n.starts_with(backup::OVERWRITE_BACKUP_PREFIX))
            .map(|n| root.path().join(".maestro").join(n))
            .collect();
        assert_eq!(leftover.len(), 1, "only the skills container survives");
        std::fs::set_permissions(
            leftover[0].join("skills/locked"),
            std::fs::Permissions::from_mode(0o755),
        )
        .unwrap();
    }

    #[test]
    fn finalize_removes_containers_and_tracks_purged() {
        let root = TempDir::new().unwrap();
        let original = root.path().join("skills");
        let container = root
            .path()
            .join(format!("{}x1", backup::OVERWRITE_BACKUP_PREFIX));
        seed(&container.join("skills"), &[("old.md", "old")]);

        let records = vec![RollbackRecord::new(&original, container.join("skills"))];
        let mut purged = Vec::new();
        finalize(&records, &mut purged).unwrap();

        assert!(!container.exists());
        assert_eq!(purged, vec![original]);
    }
}
