//! Configuration management for dropship

mod deploy;
pub mod serde_utils;

pub use deploy::{DeployConfig, DEFAULT_EXCLUDES};

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Name of the per-project configuration file
pub const PROJECT_CONFIG_FILE: &str = "dropship.toml";

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dropship")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Find the configuration file that applies to a project, if any.
///
/// An explicit path is returned as-is. Otherwise `<project>/dropship.toml`
/// wins over the user-wide file.
pub fn locate(explicit: Option<&Path>, project_root: &Path) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    [project_root.join(PROJECT_CONFIG_FILE), default_config_path()]
        .into_iter()
        .find(|candidate| candidate.exists())
}

/// Pick the configuration for a project.
///
/// An explicit path must exist. Defaults apply when no file is found.
pub fn discover(explicit: Option<&Path>, project_root: &Path) -> Result<DeployConfig, ConfigError> {
    match locate(explicit, project_root) {
        Some(path) => {
            tracing::debug!("Loading configuration from {:?}", path);
            load_config(&path)
        }
        None => {
            tracing::debug!("No configuration file found, using defaults");
            Ok(DeployConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = discover(Some(&missing), dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_project_config_is_picked_up() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(PROJECT_CONFIG_FILE),
            "port = 2222\ncommand_timeout = 5\n",
        )
        .unwrap();

        let config = discover(None, dir.path()).unwrap();
        assert_eq!(config.port, 2222);
        assert_eq!(config.command_timeout, Duration::from_secs(5));
        // Untouched keys keep their defaults
        assert_eq!(config.app_port, 8000);
    }

    #[test]
    fn test_locate_prefers_explicit_then_project() {
        let dir = TempDir::new().unwrap();
        let explicit = dir.path().join("custom.toml");
        assert_eq!(locate(Some(&explicit), dir.path()), Some(explicit.clone()));

        let project_file = dir.path().join(PROJECT_CONFIG_FILE);
        std::fs::write(&project_file, "").unwrap();
        assert_eq!(locate(None, dir.path()), Some(project_file));
    }
}
