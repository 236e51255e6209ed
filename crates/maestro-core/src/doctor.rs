//! Health checks for an initialized project.

use crate::agents;
use crate::config::InstallSettings;
use crate::{io, paths};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
    /// Failed warnings are reported but do not make the project unhealthy.
    pub is_warning: bool,
}

impl CheckResult {
    fn presence(name: String, found: bool, fix: String) -> Self {
        Self {
            name,
            ok: found,
            message: if found { "found" } else { "missing" }.to_string(),
            fix: (!found).then_some(fix),
            is_warning: false,
        }
    }

    fn optional(name: String, found: bool, fix: String) -> Self {
        Self {
            name,
            ok: found,
            message: if found {
                "found (optional)"
            } else {
                "not found (optional)"
            }
            .to_string(),
            fix: (!found).then_some(fix),
            is_warning: true,
        }
    }
}

/// Run every check against `root`.
///
/// When `.maestro/` itself is missing only that check is returned, since
/// nothing below it can be present.
pub fn check(root: &Path, settings: &InstallSettings) -> Vec<CheckResult> {
    let maestro = paths::maestro_dir(root);
    let mut results = vec![CheckResult::presence(
        format!("{}/ directory", paths::MAESTRO_DIR),
        io::is_dir(&maestro),
        "Run 'maestro init' to initialize this project".to_string(),
    )];
    if !results[0].ok {
        return results;
    }

    results.push(CheckResult::presence(
        paths::CONFIG_FILE.to_string(),
        paths::config_path(root).is_file(),
        format!("Run 'maestro init' to restore {}", paths::CONFIG_FILE),
    ));

    for dir in &settings.required_dirs {
        results.push(CheckResult::presence(
            format!("{dir}/"),
            io::is_dir(&root.join(dir)),
            format!("Run 'maestro init' to restore {dir}/"),
        ));
    }

    let installed = agents::detect_installed(root, &settings.agent_dirs);
    for dir in &settings.agent_dirs {
        results.push(CheckResult::optional(
            format!("{dir}/"),
            installed.contains(dir),
            format!("Optional: run 'maestro init --agents {dir}' to add {dir}/"),
        ));
    }

    results
}

/// True when no non-warning check failed.
pub fn all_ok(results: &[CheckResult]) -> bool {
    results.iter().all(|r| r.ok || r.is_warning)
}
