//! Transport traits
//!
//! Every stage talks to the remote host through [`RemoteSession`], so the
//! pipeline can run against the real SSH session or an in-memory fake.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use ds_core::error::{ConnectionError, FileTransferError};
use ds_core::DeploymentTarget;

/// Result of one remote command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: u32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command exited with status zero
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// One open, authenticated session: a command channel plus a file-transfer channel
#[async_trait]
pub trait RemoteSession: Send {
    /// Run a command to completion and collect its output.
    ///
    /// The exit code is reported, never interpreted.
    async fn execute(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, ConnectionError>;

    /// Create a remote directory (and missing parents) if it does not exist
    async fn ensure_dir(&mut self, remote: &str) -> Result<(), FileTransferError>;

    /// Upload a whole local file, overwriting the remote copy
    async fn put_file(&mut self, local: &Path, remote: &str) -> Result<(), FileTransferError>;

    /// Release both channels. Safe to call more than once.
    async fn close(&mut self);
}

/// Opens sessions to a target
#[async_trait]
pub trait Connector: Send + Sync {
    /// The session type produced by this connector
    type Session: RemoteSession;

    /// Authenticate once with the target's credentials and open both channels
    async fn open(&self, target: &DeploymentTarget) -> Result<Self::Session, ConnectionError>;
}
