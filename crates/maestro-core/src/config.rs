use crate::agents;
use crate::conflict::ConflictDecision;
use crate::error::Result;
use crate::paths;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// ProjectSection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_branch: Option<String>,
}

impl ProjectSection {
    fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

// ---------------------------------------------------------------------------
// InstallSettings
// ---------------------------------------------------------------------------

/// Which directories an install covers and how it treats existing ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallSettings {
    #[serde(default = "default_required_dirs")]
    pub required_dirs: Vec<String>,
    #[serde(default = "default_agent_dirs")]
    pub agent_dirs: Vec<String>,
    /// Decision applied without prompting. `None` means ask.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_conflict: Option<ConflictDecision>,
    #[serde(default = "default_lock")]
    pub lock: bool,
}

fn default_required_dirs() -> Vec<String> {
    agents::required_starter_asset_dirs()
        .iter()
        .map(|d| d.to_string())
        .collect()
}

fn default_agent_dirs() -> Vec<String> {
    agents::known_agent_dirs()
        .iter()
        .map(|d| d.to_string())
        .collect()
}

fn default_lock() -> bool {
    true
}

impl Default for InstallSettings {
    fn default() -> Self {
        Self {
            required_dirs: default_required_dirs(),
            agent_dirs: default_agent_dirs(),
            on_conflict: None,
            lock: default_lock(),
        }
    }
}

impl InstallSettings {
    fn is_default(&self) -> bool {
        self == &Self::default()
    }
}

// ---------------------------------------------------------------------------
// ProjectConfig
// ---------------------------------------------------------------------------

/// Contents of `.maestro/config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cli_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialized_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "ProjectSection::is_empty")]
    pub project: ProjectSection,
    #[serde(default, skip_serializing_if = "InstallSettings::is_default")]
    pub install: InstallSettings,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, serde_yaml::Value>,
}

impl ProjectConfig {
    /// Load the project config. A missing file yields the defaults; an empty
    /// file does too.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: ProjectConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Write the config atomically. `.maestro/` must already exist.
    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    /// Record the CLI version that last installed into this project,
    /// keeping every other field.
    pub fn update_cli_version(root: &Path, version: &str) -> Result<()> {
        let mut cfg = Self::load(root)?;
        cfg.cli_version = Some(version.to_string());
        cfg.save(root)
    }

    /// Mark the project as initialized by `version` now. The first
    /// initialization time is kept on re-init.
    pub fn stamp(&mut self, version: &str) {
        self.cli_version = Some(version.to_string());
        if self.initialized_at.is_none() {
            self.initialized_at = Some(Utc::now());
        }
    }
}
