mod cmd;
mod output;
mod prompt;
mod root;

use clap::{Parser, Subcommand};
use maestro_core::{ConflictDecision, MaestroError};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "maestro",
    about = "Install maestro starter assets into a project, all or nothing",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .maestro/ or .git/)
    #[arg(long, global = true, env = "MAESTRO_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the starter directories into this project
    Init {
        /// Directory holding the starter assets (default: ~/.cache/maestro/starter)
        #[arg(long, env = "MAESTRO_SOURCE")]
        source: Option<PathBuf>,

        /// What to do with directories that already exist (asks when omitted)
        #[arg(long, value_name = "overwrite|backup|cancel")]
        on_conflict: Option<ConflictDecision>,

        /// Agent config directories to install alongside (e.g. .claude)
        #[arg(long, num_args = 1..)]
        agents: Vec<String>,
    },

    /// Validate the project setup
    Doctor,

    /// Remove .maestro/ from this project
    Remove {
        /// Skip the confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,

        /// Keep the directory as a timestamped backup instead of deleting it
        #[arg(long)]
        backup: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init {
            source,
            on_conflict,
            agents,
        } => cmd::init::run(
            &root,
            cmd::init::InitOptions {
                source,
                on_conflict,
                agents,
            },
            cli.json,
        ),
        Commands::Doctor => cmd::doctor::run(&root, cli.json),
        Commands::Remove { force, backup } => cmd::remove::run(&root, force, backup),
    };

    if let Err(e) = result {
        if is_cancelled(&e) {
            eprintln!("{}", MaestroError::Cancelled);
        } else {
            // Print the full error chain (anyhow's alternate Display)
            eprintln!("error: {e:#}");
        }
        std::process::exit(1);
    }
}

fn is_cancelled(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|e| e.downcast_ref::<MaestroError>())
        .any(MaestroError::is_cancelled)
}
