use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const MAESTRO_DIR: &str = ".maestro";
pub const SCRIPTS_DIR: &str = ".maestro/scripts";
pub const SKILLS_DIR: &str = ".maestro/skills";
pub const TEMPLATES_DIR: &str = ".maestro/templates";

pub const CONFIG_FILE: &str = ".maestro/config.yaml";
pub const LOCK_FILE: &str = ".maestro-install.lock";

pub const OPENCODE_DIR: &str = ".opencode";
pub const CLAUDE_DIR: &str = ".claude";

/// Where `maestro init` looks for starter assets when `--source` is not given,
/// relative to the user's home directory.
pub const DEFAULT_STARTER_SOURCE: &str = ".cache/maestro/starter";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn maestro_dir(root: &Path) -> PathBuf {
    root.join(MAESTRO_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn lock_path(root: &Path) -> PathBuf {
    root.join(LOCK_FILE)
}

/// Resolve project-relative directory names against `root`, keeping order.
pub fn resolve_all<S: AsRef<str>>(root: &Path, dirs: &[S]) -> Vec<PathBuf> {
    dirs.iter().map(|d| root.join(AsRef::<str>::as_ref(d))).collect()
}
