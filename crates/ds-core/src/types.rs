//! Core domain types

use std::fmt;
use std::path::PathBuf;

/// Default remote working directory name, placed in the user's home
const REMOTE_APP_DIR: &str = "app";

/// A credential value that must never end up in logs
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the raw value (only for handing it to the SSH layer or the state file)
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// How the deployment authenticates against the target host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// Path to a private key file
    PrivateKeyPath(PathBuf),
    /// Plain password
    Password(Secret),
}

/// Remote host and credentials a deployment run connects to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentTarget {
    /// IPv4 address or hostname
    pub host: String,
    /// SSH username
    pub username: String,
    /// Exactly one authentication method
    pub auth: AuthMethod,
}

impl DeploymentTarget {
    /// Create a target authenticating with a private key
    pub fn with_key(
        host: impl Into<String>,
        username: impl Into<String>,
        key: impl Into<PathBuf>,
    ) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            auth: AuthMethod::PrivateKeyPath(key.into()),
        }
    }

    /// Create a target authenticating with a password
    pub fn with_password(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            auth: AuthMethod::Password(Secret::new(password)),
        }
    }

    /// Remote working directory used when none is configured.
    ///
    /// `root` deploys into `/root/app`, everybody else into `/home/<user>/app`.
    pub fn default_remote_root(&self) -> String {
        if self.username == "root" {
            format!("/root/{}", REMOTE_APP_DIR)
        } else {
            format!("/home/{}/{}", self.username, REMOTE_APP_DIR)
        }
    }
}

impl fmt::Display for DeploymentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.username, self.host)
    }
}

/// Pipeline stage of one deployment run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Resolving,
    Connecting,
    Syncing,
    Bootstrapping,
    Launching,
    Done,
    Failed,
}

impl Stage {
    /// Whether the run has finished, successfully or not
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Resolving => "resolving",
            Stage::Connecting => "connecting",
            Stage::Syncing => "syncing",
            Stage::Bootstrapping => "bootstrapping",
            Stage::Launching => "launching",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_redacted_in_debug() {
        let target = DeploymentTarget::with_password("10.0.0.5", "deploy", "hunter2");
        let debug = format!("{:?}", target);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_default_remote_root() {
        let root = DeploymentTarget::with_key("10.0.0.5", "root", "/k");
        assert_eq!(root.default_remote_root(), "/root/app");

        let user = DeploymentTarget::with_key("10.0.0.5", "deploy", "/k");
        assert_eq!(user.default_remote_root(), "/home/deploy/app");
    }

    #[test]
    fn test_stage_display_and_terminal() {
        assert_eq!(Stage::Bootstrapping.to_string(), "bootstrapping");
        assert!(Stage::Done.is_terminal());
        assert!(Stage::Failed.is_terminal());
        assert!(!Stage::Launching.is_terminal());
    }
}
