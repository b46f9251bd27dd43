//! SSH transport
//!
//! One russh connection per run. Commands each get a fresh exec channel on
//! that connection; files go through a single SFTP subsystem channel opened
//! right after authentication.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Config, Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use russh_keys::key::{KeyPair, PublicKey};
use russh_sftp::client::SftpSession;
use tokio::io::AsyncWriteExt;

use ds_core::config::DeployConfig;
use ds_core::error::{ConnectionError, FileTransferError};
use ds_core::{AuthMethod, DeploymentTarget};

use crate::transport::{CommandOutput, Connector, RemoteSession};

/// Exit code reported when the remote command was killed by a signal
const SIGNAL_EXIT_CODE: u32 = 255;

/// Opens [`SshSession`]s
#[derive(Debug, Clone)]
pub struct SshConnector {
    /// SSH port on the target
    port: u16,
    /// Ceiling for TCP connect, handshake, authentication and SFTP setup
    connect_timeout: Duration,
    /// Ceiling for each file upload
    transfer_timeout: Duration,
}

impl SshConnector {
    pub fn new(port: u16, connect_timeout: Duration, transfer_timeout: Duration) -> Self {
        Self {
            port,
            connect_timeout,
            transfer_timeout,
        }
    }

    pub fn from_config(config: &DeployConfig) -> Self {
        Self::new(config.port, config.connect_timeout, config.command_timeout)
    }

    async fn authenticate(
        &self,
        target: &DeploymentTarget,
        credentials: &Credentials,
    ) -> Result<Handle<ClientHandler>, ConnectionError> {
        let config = Arc::new(Config::default());
        let handler = ClientHandler::new(target.host.clone());

        tracing::debug!("Connecting to {}:{}", target.host, self.port);
        let mut handle = client::connect(config, (target.host.as_str(), self.port), handler)
            .await
            .map_err(|e| {
                ConnectionError::unreachable(format!(
                    "failed to connect to {}:{}: {}",
                    target.host, self.port, e
                ))
            })?;

        tracing::debug!("Authenticating as user '{}'", target.username);
        let accepted = match credentials {
            Credentials::Key(key) => {
                handle
                    .authenticate_publickey(&target.username, Arc::clone(key))
                    .await
            }
            Credentials::Password(password) => {
                handle
                    .authenticate_password(&target.username, password.as_str())
                    .await
            }
        }
        .map_err(|e| ConnectionError::unreachable(format!("authentication exchange failed: {}", e)))?;

        if !accepted {
            disconnect(&handle).await;
            return Err(ConnectionError::auth_failed(format!(
                "{} rejected the {} for user '{}'",
                target.host,
                credentials.describe(),
                target.username
            )));
        }

        Ok(handle)
    }
}

#[async_trait]
impl Connector for SshConnector {
    type Session = SshSession;

    async fn open(&self, target: &DeploymentTarget) -> Result<SshSession, ConnectionError> {
        // Load the key before touching the network so a bad path fails as an auth problem
        let credentials = Credentials::load(&target.auth)?;

        let handle = tokio::time::timeout(
            self.connect_timeout,
            self.authenticate(target, &credentials),
        )
        .await
        .map_err(|_| {
            ConnectionError::timeout(format!(
                "connecting to {} took longer than {:?}",
                target.host, self.connect_timeout
            ))
        })??;

        tracing::debug!("Authentication successful, opening file-transfer channel");
        let sftp = match tokio::time::timeout(self.connect_timeout, open_sftp(&handle)).await {
            Ok(Ok(sftp)) => sftp,
            Ok(Err(e)) => {
                disconnect(&handle).await;
                return Err(e);
            }
            Err(_) => {
                disconnect(&handle).await;
                return Err(ConnectionError::timeout(format!(
                    "opening the file-transfer channel took longer than {:?}",
                    self.connect_timeout
                )));
            }
        };

        Ok(SshSession {
            host: target.host.clone(),
            handle: Some(handle),
            sftp: Some(sftp),
            transfer_timeout: self.transfer_timeout,
        })
    }
}

/// Credentials ready to hand to russh
enum Credentials {
    Key(Arc<KeyPair>),
    Password(String),
}

impl Credentials {
    fn load(auth: &AuthMethod) -> Result<Self, ConnectionError> {
        match auth {
            AuthMethod::PrivateKeyPath(path) => {
                let key = russh_keys::load_secret_key(path, None).map_err(|e| {
                    ConnectionError::auth_failed(format!(
                        "could not load private key {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Ok(Credentials::Key(Arc::new(key)))
            }
            AuthMethod::Password(secret) => Ok(Credentials::Password(secret.expose().to_string())),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Credentials::Key(_) => "private key",
            Credentials::Password(_) => "password",
        }
    }
}

async fn open_sftp(handle: &Handle<ClientHandler>) -> Result<SftpSession, ConnectionError> {
    let channel = handle
        .channel_open_session()
        .await
        .map_err(|e| ConnectionError::unreachable(format!("failed to open channel: {}", e)))?;
    channel
        .request_subsystem(true, "sftp")
        .await
        .map_err(|e| ConnectionError::unreachable(format!("sftp subsystem refused: {}", e)))?;
    SftpSession::new(channel.into_stream())
        .await
        .map_err(|e| ConnectionError::unreachable(format!("sftp handshake failed: {}", e)))
}

async fn disconnect(handle: &Handle<ClientHandler>) {
    if let Err(e) = handle
        .disconnect(Disconnect::ByApplication, "closing", "en")
        .await
    {
        tracing::debug!("Disconnect failed: {}", e);
    }
}

/// An authenticated SSH connection with its SFTP channel
pub struct SshSession {
    host: String,
    handle: Option<Handle<ClientHandler>>,
    sftp: Option<SftpSession>,
    transfer_timeout: Duration,
}

impl SshSession {
    fn handle(&self) -> Result<&Handle<ClientHandler>, ConnectionError> {
        self.handle
            .as_ref()
            .ok_or_else(|| ConnectionError::unreachable("session is closed"))
    }

    fn sftp(&self, path: &str) -> Result<&SftpSession, FileTransferError> {
        self.sftp
            .as_ref()
            .ok_or_else(|| FileTransferError::new(path, "session is closed"))
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<(), FileTransferError> {
        let fail = |reason: String| FileTransferError::new(remote, reason);

        let data = tokio::fs::read(local)
            .await
            .map_err(|e| fail(format!("cannot read {}: {}", local.display(), e)))?;

        let sftp = self.sftp(remote)?;
        let mut file = sftp
            .create(remote)
            .await
            .map_err(|e| fail(format!("cannot create remote file: {}", e)))?;
        file.write_all(&data)
            .await
            .map_err(|e| fail(format!("write failed: {}", e)))?;
        file.shutdown()
            .await
            .map_err(|e| fail(format!("close failed: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn execute(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, ConnectionError> {
        tracing::debug!("[{}] $ {}", self.host, command);

        let handle = self.handle()?;
        let mut opened = None;
        let outcome =
            tokio::time::timeout(timeout, run_command(handle, &mut opened, command)).await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                if let Some(channel) = opened {
                    let _ = channel.close().await;
                }
                Err(ConnectionError::timeout(format!(
                    "command exceeded {:?}: {}",
                    timeout,
                    abbreviate(command)
                )))
            }
        }
    }

    async fn ensure_dir(&mut self, remote: &str) -> Result<(), FileTransferError> {
        let sftp = self.sftp(remote)?;

        let mut current = String::new();
        for component in remote.split('/').filter(|c| !c.is_empty()) {
            if !current.is_empty() || remote.starts_with('/') {
                current.push('/');
            }
            current.push_str(component);

            let exists = sftp
                .try_exists(current.as_str())
                .await
                .map_err(|e| FileTransferError::new(remote, format!("stat {}: {}", current, e)))?;
            if !exists {
                tracing::debug!("[{}] mkdir {}", self.host, current);
                sftp.create_dir(current.as_str()).await.map_err(|e| {
                    FileTransferError::new(remote, format!("mkdir {}: {}", current, e))
                })?;
            }
        }

        Ok(())
    }

    async fn put_file(&mut self, local: &Path, remote: &str) -> Result<(), FileTransferError> {
        tracing::debug!("[{}] put {} -> {}", self.host, local.display(), remote);
        tokio::time::timeout(self.transfer_timeout, self.upload(local, remote))
            .await
            .map_err(|_| {
                FileTransferError::new(
                    remote,
                    format!("upload exceeded {:?}", self.transfer_timeout),
                )
            })?
    }

    async fn close(&mut self) {
        // Dropping the SFTP session closes its channel
        if self.sftp.take().is_some() {
            tracing::debug!("[{}] File-transfer channel closed", self.host);
        }
        if let Some(handle) = self.handle.take() {
            disconnect(&handle).await;
            tracing::debug!("[{}] Connection closed", self.host);
        }
    }
}

/// Open an exec channel, start `command` and collect its output.
///
/// The channel is parked in `slot` as soon as it exists so the caller can
/// close it if the whole exchange times out.
async fn run_command(
    handle: &Handle<ClientHandler>,
    slot: &mut Option<Channel<Msg>>,
    command: &str,
) -> Result<CommandOutput, ConnectionError> {
    let channel = handle
        .channel_open_session()
        .await
        .map_err(|e| ConnectionError::unreachable(format!("failed to open channel: {}", e)))?;
    let channel = slot.insert(channel);
    channel
        .exec(true, command)
        .await
        .map_err(|e| ConnectionError::unreachable(format!("failed to start command: {}", e)))?;
    collect_output(channel).await
}

/// Read a command's output until the channel closes
async fn collect_output(channel: &mut Channel<Msg>) -> Result<CommandOutput, ConnectionError> {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut exit_code = None;

    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
            ChannelMsg::ExtendedData { ref data, ext: 1 } => stderr.extend_from_slice(data),
            ChannelMsg::ExitStatus { exit_status } => exit_code = Some(exit_status),
            ChannelMsg::ExitSignal { signal_name, .. } => {
                stderr.extend_from_slice(format!("killed by signal {:?}", signal_name).as_bytes());
                exit_code = Some(SIGNAL_EXIT_CODE);
            }
            _ => {}
        }
    }

    let exit_code = exit_code.ok_or_else(|| {
        ConnectionError::unreachable("channel closed before the command reported an exit status")
    })?;

    Ok(CommandOutput {
        exit_code,
        stdout: String::from_utf8_lossy(&stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
    })
}

/// Shorten long command lines for error messages
fn abbreviate(command: &str) -> String {
    const MAX: usize = 60;
    match command.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &command[..idx]),
        None => command.to_string(),
    }
}

/// SSH client handler
///
/// Host keys are accepted on first sight, the same trust model as
/// `StrictHostKeyChecking=accept-new` without a known_hosts file.
struct ClientHandler {
    host: String,
}

impl ClientHandler {
    fn new(host: String) -> Self {
        Self { host }
    }
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = anyhow::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        tracing::debug!(
            "Host key for {}: {}",
            self.host,
            server_public_key.fingerprint()
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_fails_as_auth_before_connecting() {
        // Port 9 on TEST-NET-1 is never contacted: the key load fails first
        let connector = SshConnector::new(9, Duration::from_secs(1), Duration::from_secs(1));
        let target = DeploymentTarget::with_key("192.0.2.1", "root", "/nonexistent/id_rsa");

        let err = connector.open(&target).await.err().unwrap();
        assert_eq!(err.reason, ds_core::error::ConnectionFailure::AuthFailed);
    }

    #[tokio::test]
    async fn test_garbage_key_fails_as_auth() {
        let dir = tempfile::TempDir::new().unwrap();
        let key = dir.path().join("id_rsa");
        std::fs::write(&key, "this is not a private key").unwrap();

        let connector = SshConnector::new(9, Duration::from_secs(1), Duration::from_secs(1));
        let target = DeploymentTarget::with_key("192.0.2.1", "root", &key);

        let err = connector.open(&target).await.err().unwrap();
        assert_eq!(err.reason, ds_core::error::ConnectionFailure::AuthFailed);
    }

    fn closed_session() -> SshSession {
        SshSession {
            host: "192.0.2.1".to_string(),
            handle: None,
            sftp: None,
            transfer_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_closed_session_reports_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let local = dir.path().join("app.py");
        std::fs::write(&local, "print('hi')").unwrap();

        let mut session = closed_session();
        session.close().await;
        session.close().await;

        let err = session
            .execute("docker --version", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.reason, ds_core::error::ConnectionFailure::Unreachable);

        let err = session.put_file(&local, "/root/app/app.py").await.unwrap_err();
        assert_eq!(err.path, "/root/app/app.py");
        assert_eq!(err.reason, "session is closed");

        assert!(session.ensure_dir("/root/app").await.is_err());
    }

    #[test]
    fn test_abbreviate() {
        assert_eq!(abbreviate("docker --version"), "docker --version");
        let long = "x".repeat(100);
        assert_eq!(abbreviate(&long).len(), 63);
    }
}
