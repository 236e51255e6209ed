use anyhow::Context;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Relative path inside a target directory mapped to its file bytes.
///
/// Ordered so that writes and error reports are deterministic.
pub type ContentMap = BTreeMap<String, Vec<u8>>;

/// Source of the bytes to install into one target directory.
///
/// The installer calls `fetch` once per target before touching the disk.
pub trait AssetFetcher {
    fn fetch(&self, dir: &Path) -> anyhow::Result<ContentMap>;
}

impl<F> AssetFetcher for F
where
    F: Fn(&Path) -> anyhow::Result<ContentMap>,
{
    fn fetch(&self, dir: &Path) -> anyhow::Result<ContentMap> {
        self(dir)
    }
}

/// Fetches starter assets from a local template tree laid out like the project.
///
/// A target at `<project_root>/.maestro/skills` is served from
/// `<source>/.maestro/skills`.
#[derive(Debug, Clone)]
pub struct DirectoryFetcher {
    source: PathBuf,
    project_root: PathBuf,
}

impl DirectoryFetcher {
    pub fn new(source: impl Into<PathBuf>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            project_root: project_root.into(),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Template directory that backs the target `dir`.
    pub fn source_for(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        let rel = if dir.is_absolute() {
            dir.strip_prefix(&self.project_root).with_context(|| {
                format!(
                    "{} is outside project root {}",
                    dir.display(),
                    self.project_root.display()
                )
            })?
        } else {
            dir
        };
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            anyhow::bail!("unsupported target directory: {}", dir.display());
        }
        Ok(self.source.join(rel))
    }
}

impl AssetFetcher for DirectoryFetcher {
    fn fetch(&self, dir: &Path) -> anyhow::Result<ContentMap> {
        let src = self.source_for(dir)?;
        if !src.is_dir() {
            anyhow::bail!("starter assets not found at {}", src.display());
        }

        let mut content = ContentMap::new();
        for entry in WalkDir::new(&src).follow_links(false).sort_by_file_name() {
            let entry = entry.with_context(|| format!("walking {}", src.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&src)
                .with_context(|| format!("resolving {}", entry.path().display()))?;
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let data = std::fs::read(entry.path())
                .with_context(|| format!("reading {}", entry.path().display()))?;
            content.insert(key, data);
        }
        Ok(content)
    }
}
