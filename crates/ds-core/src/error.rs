//! Error taxonomy for dropship
//!
//! Every stage reports one of these; the orchestrator wraps the error in a
//! [`DeployFailure`] naming the stage it happened in.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::types::Stage;

/// Top-level error type for a deployment run
#[derive(Error, Debug)]
pub enum DeployError {
    /// Bad or incomplete target data
    #[error(transparent)]
    Input(#[from] InputError),

    /// Persisted record present but unreadable
    #[error(transparent)]
    StateCorrupt(#[from] StateCorruptError),

    /// SSH connection or command channel failure
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// File synchronization failure
    #[error(transparent)]
    FileTransfer(#[from] FileTransferError),

    /// Container runtime could not be provided
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    /// Remote build/run command failed
    #[error(transparent)]
    Launch(#[from] LaunchError),
}

/// A deployment error tagged with the stage that produced it
#[derive(Error, Debug)]
#[error("{stage} failed: {error}")]
pub struct DeployFailure {
    pub stage: Stage,
    #[source]
    pub error: DeployError,
}

impl DeployFailure {
    pub fn new(stage: Stage, error: impl Into<DeployError>) -> Self {
        Self {
            stage,
            error: error.into(),
        }
    }
}

/// Invalid or incomplete deployment target
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid deployment target: {}", .problems.join("; "))]
pub struct InputError {
    pub problems: Vec<String>,
}

impl InputError {
    pub fn new(problem: impl Into<String>) -> Self {
        Self {
            problems: vec![problem.into()],
        }
    }
}

/// Persisted deployment record exists but cannot be read back
#[derive(Error, Debug)]
#[error("Deployment state file {path:?} is corrupt: {reason}")]
pub struct StateCorruptError {
    pub path: PathBuf,
    pub reason: String,
}

/// Persisted deployment record could not be written
#[derive(Error, Debug)]
#[error("Failed to write deployment state {path:?}: {source}")]
pub struct StateWriteError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Why a connection attempt (or a command on it) failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionFailure {
    /// Credentials rejected or unusable
    AuthFailed,
    /// Host could not be reached or the channel broke
    Unreachable,
    /// Configured ceiling exceeded
    Timeout,
}

impl fmt::Display for ConnectionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionFailure::AuthFailed => write!(f, "authentication failed"),
            ConnectionFailure::Unreachable => write!(f, "host unreachable"),
            ConnectionFailure::Timeout => write!(f, "timed out"),
        }
    }
}

/// Connection-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Connection error ({reason}): {detail}")]
pub struct ConnectionError {
    pub reason: ConnectionFailure,
    pub detail: String,
}

impl ConnectionError {
    pub fn auth_failed(detail: impl Into<String>) -> Self {
        Self {
            reason: ConnectionFailure::AuthFailed,
            detail: detail.into(),
        }
    }

    pub fn unreachable(detail: impl Into<String>) -> Self {
        Self {
            reason: ConnectionFailure::Unreachable,
            detail: detail.into(),
        }
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self {
            reason: ConnectionFailure::Timeout,
            detail: detail.into(),
        }
    }
}

/// A single file or directory could not be reproduced remotely
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("File transfer failed for {path}: {reason}")]
pub struct FileTransferError {
    pub path: String,
    pub reason: String,
}

impl FileTransferError {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Remote bootstrap errors
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// Runtime still absent after running the install procedure
    #[error("Container runtime installation failed on {os}: {missing} still missing")]
    InstallFailed { os: String, missing: String },

    /// The command channel failed while probing or installing
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// Remote build/run command exited non-zero
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Launch failed with exit code {exit_code}: {stderr}")]
pub struct LaunchError {
    pub exit_code: u32,
    pub stderr: String,
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Config file could not be read
    #[error("Config I/O error for {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_message_names_stage() {
        let failure = DeployFailure::new(
            Stage::Launching,
            LaunchError {
                exit_code: 1,
                stderr: "port already in use".to_string(),
            },
        );
        assert_eq!(
            failure.to_string(),
            "launching failed: Launch failed with exit code 1: port already in use"
        );
    }

    #[test]
    fn test_input_error_lists_all_problems() {
        let err = InputError {
            problems: vec!["host is required".into(), "username is required".into()],
        };
        assert_eq!(
            err.to_string(),
            "Invalid deployment target: host is required; username is required"
        );
    }
}
