//! Workspace discovery and configuration loading for CLI commands

use crate::errors;
use anyhow::{Context, Result};
use biodiv_core::config::{CliConfigOverrides, LayeredConfig};
use std::path::{Path, PathBuf};

/// Name of the workspace directory
pub const BIODIV_DIR: &str = ".biodiv";

/// A directory holding a `.biodiv` workspace
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn dir(&self) -> PathBuf {
        self.root.join(BIODIV_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir().join("config.toml")
    }

    pub fn lookups_path(&self) -> PathBuf {
        self.dir().join("lookups.toml")
    }

    pub fn project_path(&self) -> PathBuf {
        self.dir().join("project.toml")
    }

    pub fn exists(&self) -> bool {
        self.dir().is_dir()
    }
}

/// Find the workspace by looking for `.biodiv` here and in every parent
pub fn find_workspace_root() -> Result<Workspace> {
    let current = std::env::current_dir()?;
    find_workspace_from(&current).ok_or_else(|| errors::workspace_not_found().into())
}

pub fn find_workspace_from(start: &Path) -> Option<Workspace> {
    start.ancestors().map(Workspace::new).find(Workspace::exists)
}

/// Load layered configuration for a workspace
pub fn load_workspace_config(workspace: &Workspace) -> Result<LayeredConfig> {
    let mut config = LayeredConfig::with_defaults();

    let config_path = workspace.config_path();
    if config_path.exists() {
        config = config
            .load_from_file(&config_path)
            .context("Failed to load configuration file")?;
    }

    Ok(config.load_from_env())
}

/// Load layered configuration with CLI overrides
pub fn load_workspace_config_with_overrides(
    workspace: &Workspace,
    overrides: CliConfigOverrides,
) -> Result<LayeredConfig> {
    let mut config = load_workspace_config(workspace)?;
    config.update_from_cli(overrides)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_found_from_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(BIODIV_DIR)).unwrap();
        let nested = dir.path().join("zones").join("2024");
        std::fs::create_dir_all(&nested).unwrap();

        let workspace = find_workspace_from(&nested).unwrap();
        assert_eq!(workspace.root, dir.path());
        assert!(workspace.project_path().ends_with(".biodiv/project.toml"));
    }
}
