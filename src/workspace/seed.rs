//! Declarative workspace seeds.
//!
//! A seed is a small list of filesystem entries written relative to the
//! workspace root. Plans use one to populate the workspace and others to
//! mutate it before individual steps.
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

pub const MAX_SEED_ENTRIES: usize = 128;
pub const MAX_SEED_TOTAL_BYTES: usize = 64 * 1024;

/// Seed entry type.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeedEntryKind {
    Dir,
    File,
    Symlink,
    Remove,
}

/// Single filesystem entry relative to the workspace root.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SeedEntry {
    pub path: String,
    pub kind: SeedEntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
}

impl SeedEntry {
    pub fn file(path: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: SeedEntryKind::File,
            contents: Some(contents.into()),
            target: None,
            mode: None,
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: SeedEntryKind::Dir,
            contents: None,
            target: None,
            mode: None,
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: SeedEntryKind::Remove,
            contents: None,
            target: None,
            mode: None,
        }
    }

    /// Workspace-relative location with `.` segments dropped.
    pub fn relative_path(&self) -> Result<PathBuf> {
        workspace_relative(&self.path).with_context(|| format!("seed entry path {:?}", self.path))
    }

    /// Reject field combinations that make no sense for the kind; returns the
    /// bytes this entry adds to the seed total.
    fn checked_size(&self, rel_path: &Path) -> Result<usize> {
        if let Some(mode) = self.mode {
            if self.kind == SeedEntryKind::Remove || self.kind == SeedEntryKind::Symlink {
                bail!("seed {rel_path:?} cannot carry a mode");
            }
            if cfg!(not(unix)) {
                bail!("seed mode is unsupported on this platform");
            }
            if mode > 0o777 {
                bail!("seed {rel_path:?} mode {mode:o} exceeds 0777");
            }
        }
        if self.contents.is_some() && self.kind != SeedEntryKind::File {
            bail!("seed {rel_path:?} only files take contents");
        }
        match (self.kind, self.target.as_deref()) {
            (SeedEntryKind::Symlink, Some(target)) => {
                workspace_relative(target).with_context(|| format!("symlink target {target:?}"))?;
                Ok(target.len())
            }
            (SeedEntryKind::Symlink, None) => bail!("seed symlink {rel_path:?} missing target"),
            (_, Some(_)) => bail!("seed {rel_path:?} only symlinks take a target"),
            (SeedEntryKind::File, None) => Ok(self.contents.as_deref().map_or(0, str::len)),
            (_, None) => Ok(0),
        }
    }

    fn write_under(&self, root: &Path) -> Result<()> {
        let dest = root.join(self.relative_path()?);
        if self.kind == SeedEntryKind::Remove {
            return remove_existing(&dest);
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        match self.kind {
            SeedEntryKind::Dir => fs::create_dir_all(&dest)
                .with_context(|| format!("create dir {}", dest.display()))?,
            SeedEntryKind::File => {
                fs::write(&dest, self.contents.as_deref().unwrap_or("").as_bytes())
                    .with_context(|| format!("write {}", dest.display()))?;
            }
            SeedEntryKind::Symlink => {
                let target = workspace_relative(self.target.as_deref().unwrap_or_default())?;
                remove_existing(&dest)?;
                #[cfg(unix)]
                std::os::unix::fs::symlink(&target, &dest)
                    .with_context(|| format!("create symlink {}", dest.display()))?;
                #[cfg(not(unix))]
                bail!("cannot link {} to {}: unsupported platform", dest.display(), target.display());
            }
            SeedEntryKind::Remove => {}
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = self.mode {
                fs::set_permissions(&dest, fs::Permissions::from_mode(mode))
                    .with_context(|| format!("set mode {mode:o} on {}", dest.display()))?;
            }
        }
        Ok(())
    }
}

/// Ordered collection of seed entries.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceSeed {
    #[serde(default)]
    pub entries: Vec<SeedEntry>,
}

impl WorkspaceSeed {
    pub fn new(entries: Vec<SeedEntry>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check limits, path hygiene and per-kind field rules without touching disk.
    pub fn validate(&self) -> Result<()> {
        if self.entries.len() > MAX_SEED_ENTRIES {
            bail!("seed exceeds max entries ({MAX_SEED_ENTRIES})");
        }
        let mut seen = HashSet::new();
        let mut total_bytes = 0usize;
        for entry in &self.entries {
            let rel_path = entry.relative_path()?;
            let size = entry.checked_size(&rel_path)?;
            if !seen.insert(rel_path) {
                bail!("seed entry path {:?} is duplicated", entry.path);
            }
            total_bytes = total_bytes.saturating_add(size);
            if total_bytes > MAX_SEED_TOTAL_BYTES {
                bail!("seed exceeds max total bytes ({MAX_SEED_TOTAL_BYTES})");
            }
        }
        Ok(())
    }

    /// Validate, then write every entry under `root` in order.
    pub fn materialize(&self, root: &Path) -> Result<()> {
        self.validate()?;
        for entry in &self.entries {
            entry.write_under(root)?;
        }
        tracing::debug!(
            root = %root.display(),
            entries = self.entries.len(),
            "seed materialized"
        );
        Ok(())
    }
}

fn workspace_relative(raw: &str) -> Result<PathBuf> {
    let unified = raw.trim().replace('\\', "/");
    let mut cleaned = PathBuf::new();
    for component in Path::new(&unified).components() {
        match component {
            Component::Normal(part) => cleaned.push(part),
            Component::CurDir => {}
            Component::ParentDir => bail!("'..' would leave the workspace"),
            Component::RootDir | Component::Prefix(_) => {
                bail!("path must be relative to the workspace")
            }
        }
    }
    if cleaned.as_os_str().is_empty() {
        bail!("path is empty");
    }
    Ok(cleaned)
}

fn remove_existing(path: &Path) -> Result<()> {
    match path.symlink_metadata() {
        Ok(meta) if meta.is_dir() => {
            fs::remove_dir_all(path).with_context(|| format!("remove dir {}", path.display()))
        }
        Ok(_) => fs::remove_file(path).with_context(|| format!("remove {}", path.display())),
        Err(_) => Ok(()),
    }
}
