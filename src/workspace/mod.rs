//! Workspace resolution and one-time population.
//!
//! A workspace is the directory every step of one scenario run shares. It is
//! either caller-provided or a fresh temporary directory that lives as long as
//! the `Workspace` value.
mod seed;

pub use seed::{SeedEntry, SeedEntryKind, WorkspaceSeed, MAX_SEED_ENTRIES, MAX_SEED_TOTAL_BYTES};

use crate::error::ScenarioError;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const TEMP_WORKSPACE_PREFIX: &str = "scenario-";

/// Population routine run once against the resolved workspace.
pub type WorkspaceBuilder = Box<dyn FnOnce(&Path) -> Result<()>>;

/// Resolved workspace directory for one scenario run.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    temp: Option<TempDir>,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the directory was provisioned by the engine and is removed on drop.
    pub fn is_temporary(&self) -> bool {
        self.temp.is_some()
    }
}

/// Resolves the base directory and applies the population routine.
pub struct WorkspaceManager {
    base_dir: Option<PathBuf>,
    builder: Option<WorkspaceBuilder>,
}

impl WorkspaceManager {
    pub fn new(base_dir: Option<PathBuf>, builder: Option<WorkspaceBuilder>) -> Self {
        Self { base_dir, builder }
    }

    /// Resolve or provision the directory, then run the builder exactly once.
    pub fn prepare(self) -> Result<Workspace, ScenarioError> {
        let workspace = match self.base_dir {
            Some(base_dir) => resolve_base_dir(&base_dir).map_err(|source| {
                ScenarioError::WorkspaceSetup {
                    path: base_dir.clone(),
                    source,
                }
            })?,
            None => provision_temp_dir().map_err(|source| ScenarioError::WorkspaceSetup {
                path: std::env::temp_dir(),
                source,
            })?,
        };
        tracing::debug!(
            path = %workspace.path.display(),
            temporary = workspace.is_temporary(),
            "workspace resolved"
        );

        if let Some(builder) = self.builder {
            builder(&workspace.path)
                .context("populate workspace")
                .map_err(|source| ScenarioError::WorkspaceSetup {
                    path: workspace.path.clone(),
                    source,
                })?;
            tracing::debug!(path = %workspace.path.display(), "workspace populated");
        }
        Ok(workspace)
    }
}

fn resolve_base_dir(base_dir: &Path) -> Result<Workspace> {
    if base_dir.exists() && !base_dir.is_dir() {
        return Err(anyhow!("base directory is not a directory"));
    }
    fs::create_dir_all(base_dir)
        .with_context(|| format!("create base directory {}", base_dir.display()))?;
    let path = base_dir
        .canonicalize()
        .with_context(|| format!("resolve base directory {}", base_dir.display()))?;
    ensure_writable(&path)?;
    Ok(Workspace { path, temp: None })
}

fn provision_temp_dir() -> Result<Workspace> {
    let temp = tempfile::Builder::new()
        .prefix(TEMP_WORKSPACE_PREFIX)
        .tempdir()
        .context("provision temporary workspace")?;
    let path = temp
        .path()
        .canonicalize()
        .context("resolve temporary workspace")?;
    Ok(Workspace {
        path,
        temp: Some(temp),
    })
}

fn ensure_writable(path: &Path) -> Result<()> {
    tempfile::Builder::new()
        .prefix(".skit-probe")
        .tempfile_in(path)
        .map(drop)
        .with_context(|| format!("base directory {} is not writable", path.display()))
}
