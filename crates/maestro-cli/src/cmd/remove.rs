use crate::prompt;
use anyhow::Context;
use maestro_core::config::ProjectConfig;
use maestro_core::lock::InstallLock;
use maestro_core::{backup, io, paths};
use std::path::Path;

/// `maestro remove`: delete `.maestro/`, or move it aside with `--backup`.
pub fn run(root: &Path, force: bool, keep_backup: bool) -> anyhow::Result<()> {
    let maestro = paths::maestro_dir(root);
    if !io::is_dir(&maestro) {
        println!("No {}/ directory found, nothing to remove.", paths::MAESTRO_DIR);
        return Ok(());
    }

    if !force {
        let question = format!(
            "Are you sure you want to remove {}/ from this project?",
            paths::MAESTRO_DIR
        );
        let confirmed = prompt::confirm(
            &mut std::io::stdin().lock(),
            &mut std::io::stdout(),
            &question,
        )?;
        if !confirmed {
            eprintln!("Aborted.");
            return Ok(());
        }
    }

    let settings = ProjectConfig::load(root)
        .context("failed to load config.yaml")?
        .install;
    let _lock = if settings.lock {
        Some(InstallLock::acquire(root).context("failed to take the install lock")?)
    } else {
        None
    };

    if keep_backup {
        let backup = backup::backup_dir(&maestro).context("failed to back up .maestro/")?;
        println!("Backup created at {}", backup.display());
    } else {
        io::remove_path(&maestro).context("failed to remove .maestro/")?;
    }

    println!("✓ {}/ removed successfully.", paths::MAESTRO_DIR);
    Ok(())
}
