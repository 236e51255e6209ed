use crate::io;
use crate::paths;
use std::path::Path;

/// Directories every `maestro init` installs, relative to the project root.
pub fn required_starter_asset_dirs() -> &'static [&'static str] {
    &[paths::SCRIPTS_DIR, paths::SKILLS_DIR, paths::TEMPLATES_DIR]
}

/// Agent config directories maestro knows how to manage.
pub fn known_agent_dirs() -> &'static [&'static str] {
    &[paths::OPENCODE_DIR, paths::CLAUDE_DIR]
}

/// Short human description of an agent directory, for prompts.
pub fn agent_description(dir: &str) -> &'static str {
    match dir {
        paths::OPENCODE_DIR => "slash commands and skills for OpenCode",
        paths::CLAUDE_DIR => "slash commands and skills for Claude Code",
        _ => "agent configuration",
    }
}

/// The entries of `dirs` that exist as directories under `root`, in order.
pub fn detect_installed<S: AsRef<str>>(root: &Path, dirs: &[S]) -> Vec<String> {
    dirs.iter()
        .map(|d| -> &str { d.as_ref() })
        .filter(|d| io::is_dir(&root.join(d)))
        .map(str::to_string)
        .collect()
}
