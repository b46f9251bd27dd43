//! Deployment configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::types::DeploymentTarget;

/// Directory and file names that are never synchronized.
///
/// Matched against exact basenames, never as patterns.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "venv",
    ".venv",
    "env",
    ".env",
    "__pycache__",
    ".git",
    ".idea",
    "node_modules",
    ".DS_Store",
];

/// Configuration for a deployment run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// SSH port on the target host
    pub port: u16,

    /// Ceiling for connecting and authenticating
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Ceiling for an ordinary remote command
    #[serde(with = "duration_secs")]
    pub command_timeout: Duration,

    /// Ceiling for each step of the runtime installation
    #[serde(with = "duration_secs")]
    pub install_timeout: Duration,

    /// Ceiling for the build-and-run command
    #[serde(with = "duration_secs")]
    pub launch_timeout: Duration,

    /// Remote working directory (defaults to `~/app` of the SSH user)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_dir: Option<String>,

    /// Basenames excluded from synchronization
    pub exclude: Vec<String>,

    /// Port the deployed application listens on, for the success message
    pub app_port: u16,

    /// Name of the state file inside the project directory
    pub state_file: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            port: 22,
            connect_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(120),
            install_timeout: Duration::from_secs(300),
            launch_timeout: Duration::from_secs(600),
            remote_dir: None,
            exclude: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
            app_port: 8000,
            state_file: crate::state::DEFAULT_STATE_FILE.to_string(),
        }
    }
}

impl DeployConfig {
    /// Remote working directory for a target
    pub fn remote_root(&self, target: &DeploymentTarget) -> String {
        match &self.remote_dir {
            Some(dir) => dir.trim_end_matches('/').to_string(),
            None => target.default_remote_root(),
        }
    }

    /// URL the deployed application should answer on
    pub fn app_url(&self, target: &DeploymentTarget) -> String {
        format!("http://{}:{}", target.host, self.app_port)
    }
}
