//! Saved target commands

use std::path::{Path, PathBuf};

use anyhow::Result;

use ds_core::config;
use ds_core::state::StateStore;

use super::project_root;
use crate::output::{format_target, print_info, print_success};

fn store_for(config_path: Option<&PathBuf>, project: &Path) -> Result<StateStore> {
    let root = project_root(project)?;
    let config = config::discover(config_path.map(PathBuf::as_path), &root)?;
    Ok(StateStore::for_project(&root, &config.state_file))
}

/// Print the target saved for a project
pub fn target_show(config_path: Option<&PathBuf>, project: &Path) -> Result<()> {
    let store = store_for(config_path, project)?;

    match store.load()? {
        Some(target) => {
            println!("{}", format_target(&target));
            println!("State:    {}", store.path().display());
        }
        None => print_info("No saved deployment target"),
    }
    Ok(())
}

/// Delete the target saved for a project
pub fn target_forget(config_path: Option<&PathBuf>, project: &Path) -> Result<()> {
    let store = store_for(config_path, project)?;

    if store.clear()? {
        print_success(&format!("Removed {}", store.path().display()));
    } else {
        print_info("No saved deployment target");
    }
    Ok(())
}
