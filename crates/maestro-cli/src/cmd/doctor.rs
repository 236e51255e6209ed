use crate::output::{print_checks, print_json};
use anyhow::Context;
use maestro_core::config::ProjectConfig;
use maestro_core::doctor;
use std::path::Path;

/// `maestro doctor`: report every check and fail when a required one fails.
/// Missing agent directories are warnings and never fail the command.
pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = ProjectConfig::load(root).context("failed to load config.yaml")?;
    let results = doctor::check(root, &config.install);
    let healthy = doctor::all_ok(&results);

    if json {
        print_json(&results)?;
    } else {
        print_checks(&results);
        if healthy {
            println!("\n✓ All checks passed, project looks healthy!");
        }
    }

    if !healthy {
        anyhow::bail!("some checks failed");
    }
    Ok(())
}
