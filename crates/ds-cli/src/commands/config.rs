//! Config command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::project_root;
use crate::output::print_info;
use ds_core::config;

/// Show the effective configuration for a project
pub fn config_show(config_path: Option<&PathBuf>, project: &Path) -> Result<()> {
    let root = project_root(project)?;
    let explicit = config_path.map(PathBuf::as_path);

    match config::locate(explicit, &root) {
        Some(path) => print_info(&format!("Configuration from {}", path.display())),
        None => print_info("No configuration file found, showing defaults"),
    }

    let config = config::discover(explicit, &root)?;
    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    println!("{}", rendered);
    Ok(())
}

/// Show the path of the configuration file in use
pub fn config_path(config_path: Option<&PathBuf>, project: &Path) -> Result<()> {
    let root = project_root(project)?;
    let path = config::locate(config_path.map(PathBuf::as_path), &root)
        .unwrap_or_else(config::default_config_path);
    println!("{}", path.display());
    Ok(())
}
