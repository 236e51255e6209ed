use crate::output::print_json;
use crate::prompt;
use anyhow::{bail, Context};
use maestro_core::config::{InstallSettings, ProjectConfig};
use maestro_core::fetch::DirectoryFetcher;
use maestro_core::lock::InstallLock;
use maestro_core::{conflict, install_required_assets, io, paths, ConflictDecision};
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};

pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct InitOptions {
    pub source: Option<PathBuf>,
    pub on_conflict: Option<ConflictDecision>,
    pub agents: Vec<String>,
}

/// `maestro init`: install the required starter directories plus any chosen
/// agent directories in one transaction, then stamp `.maestro/config.yaml`.
pub fn run(root: &Path, opts: InitOptions, json: bool) -> anyhow::Result<()> {
    let mut config = ProjectConfig::load(root).context("failed to load config.yaml")?;
    let settings = config.install.clone();

    let source = match opts.source {
        Some(source) => source,
        None => default_source()?,
    };
    let agents = select_agents(&settings, opts.agents, json)?;

    let _lock = if settings.lock {
        Some(InstallLock::acquire(root).context("failed to take the install lock")?)
    } else {
        None
    };

    let mut dirs = settings.required_dirs.clone();
    dirs.extend(agents);
    let targets = paths::resolve_all(root, &dirs);

    let decision = match opts.on_conflict.or(settings.on_conflict) {
        Some(decision) => decision,
        None => ask_conflict_decision(root, &targets, json)?,
    };

    let fetcher = DirectoryFetcher::new(&source, root);
    let result = install_required_assets(&targets, decision, &fetcher)?;

    io::ensure_dir(&paths::maestro_dir(root))?;
    config.stamp(CLI_VERSION);
    config.save(root).context("failed to write config.yaml")?;

    if json {
        return print_json(&result);
    }

    println!("Installed from {}:", source.display());
    for dir in &result.installed {
        println!("  ✓ {}", relative(root, dir));
    }
    for backup in &result.backups {
        println!("Backup created: {}", relative(root, backup));
    }
    println!("\n✓ Maestro initialized successfully!");
    Ok(())
}

fn default_source() -> anyhow::Result<PathBuf> {
    let home = home::home_dir()
        .context("cannot locate the home directory; pass --source to name the starter assets")?;
    Ok(home.join(paths::DEFAULT_STARTER_SOURCE))
}

/// Agent directories to install. Explicit `--agents` wins; otherwise ask on
/// an interactive terminal and install none when there is nobody to ask.
fn select_agents(
    settings: &InstallSettings,
    requested: Vec<String>,
    json: bool,
) -> anyhow::Result<Vec<String>> {
    if requested.is_empty() {
        if !std::io::stdin().is_terminal() {
            return Ok(Vec::new());
        }
        let mut out = prompt_writer(json);
        let picked = prompt::prompt_agent_selection(
            &mut std::io::stdin().lock(),
            &mut out,
            &settings.agent_dirs,
        )?;
        writeln!(out)?;
        return Ok(picked);
    }

    let mut selected: Vec<String> = Vec::with_capacity(requested.len());
    for dir in requested {
        let dir = dir.trim_end_matches('/').to_string();
        if !settings.agent_dirs.contains(&dir) {
            bail!(
                "unknown agent directory '{dir}' (known: {})",
                settings.agent_dirs.join(", ")
            );
        }
        if !selected.contains(&dir) {
            selected.push(dir);
        }
    }
    Ok(selected)
}

fn ask_conflict_decision(
    root: &Path,
    targets: &[PathBuf],
    json: bool,
) -> anyhow::Result<ConflictDecision> {
    let conflicting: Vec<String> = conflict::detect_conflicts(targets)
        .iter()
        .map(|dir| relative(root, dir))
        .collect();
    if conflicting.is_empty() {
        // Nothing to decide; any decision installs.
        return Ok(ConflictDecision::Cancel);
    }
    let mut out = prompt_writer(json);
    prompt::prompt_conflict_resolution(&mut std::io::stdin().lock(), &mut out, &conflicting)
}

/// Prompts go to stderr under `--json` so stdout stays parseable.
fn prompt_writer(json: bool) -> Box<dyn Write> {
    if json {
        Box::new(std::io::stderr())
    } else {
        Box::new(std::io::stdout())
    }
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}
