//! CLI command implementations

mod config;
mod deploy;
mod target;

pub use config::{config_path, config_show};
pub use deploy::deploy_command;
pub use target::{target_forget, target_show};

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Absolute path of the project directory, which must exist
pub(crate) fn project_root(project: &Path) -> Result<PathBuf> {
    let root = project
        .canonicalize()
        .with_context(|| format!("Project directory not found: {}", project.display()))?;
    if !root.is_dir() {
        anyhow::bail!("Not a directory: {}", root.display());
    }
    Ok(root)
}
