//! In-memory remote host for pipeline tests

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use ds_core::error::{ConnectionError, FileTransferError};
use ds_core::DeploymentTarget;

use crate::transport::{CommandOutput, Connector, RemoteSession};

pub const DEBIAN_OS_RELEASE: &str = "PRETTY_NAME=\"Debian GNU/Linux 12 (bookworm)\"\nID=debian\nVERSION_ID=\"12\"\n";

/// Observable state of the fake host
#[derive(Debug)]
pub struct RemoteState {
    pub dirs: BTreeSet<String>,
    pub files: BTreeMap<String, Vec<u8>>,
    pub commands: Vec<String>,
    pub os_release: Option<String>,
    pub uid: u32,
    pub docker_installed: bool,
    pub compose_plugin: bool,
    pub compose_standalone: bool,
    /// Whether running the install procedure actually installs docker
    pub install_works: bool,
    pub install_attempts: usize,
    /// Result of `compose up`
    pub launch_result: CommandOutput,
    /// Remote path whose upload fails
    pub fail_put: Option<String>,
    /// Command substring that never finishes
    pub hang_on: Option<String>,
    pub opened: usize,
    pub closed: usize,
}

impl Default for RemoteState {
    fn default() -> Self {
        Self {
            dirs: BTreeSet::new(),
            files: BTreeMap::new(),
            commands: Vec::new(),
            os_release: Some(DEBIAN_OS_RELEASE.to_string()),
            uid: 0,
            docker_installed: true,
            compose_plugin: true,
            compose_standalone: false,
            install_works: true,
            install_attempts: 0,
            launch_result: ok(""),
            fail_put: None,
            hang_on: None,
            opened: 0,
            closed: 0,
        }
    }
}

impl RemoteState {
    fn respond(&mut self, command: &str) -> CommandOutput {
        self.commands.push(command.to_string());

        if command == "docker --version" {
            return if self.docker_installed {
                ok("Docker version 27.3.1, build ce12230")
            } else {
                fail(127, "sh: docker: not found")
            };
        }
        if command == "docker compose version" {
            return if self.docker_installed && self.compose_plugin {
                ok("Docker Compose version v2.29.7")
            } else {
                fail(1, "docker: 'compose' is not a docker command.")
            };
        }
        if command == "docker-compose --version" {
            return if self.compose_standalone {
                ok("docker-compose version 1.29.2")
            } else {
                fail(127, "sh: docker-compose: not found")
            };
        }
        if command == "cat /etc/os-release" {
            return match &self.os_release {
                Some(content) => ok(content),
                None => fail(1, "cat: /etc/os-release: No such file or directory"),
            };
        }
        if command == "id -u" {
            return ok(&self.uid.to_string());
        }
        if command.contains("get.docker.com")
            || command.contains("apk add")
            || command.contains("pacman -Sy")
        {
            self.install_attempts += 1;
            if self.install_works {
                self.docker_installed = true;
                self.compose_plugin = true;
                return ok("installed");
            }
            return fail(1, "install script failed");
        }
        if command.contains(" up -d") {
            return self.launch_result.clone();
        }
        if command.contains(" ps") {
            return ok("NAME   IMAGE   STATUS\nweb    app     Up 2 seconds");
        }
        if command.contains(" logs") {
            return ok("web  | Error: bind: address already in use");
        }
        ok("")
    }
}

pub fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        exit_code: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

pub fn fail(exit_code: u32, stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code,
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

/// Session handle onto a shared [`RemoteState`]
#[derive(Clone, Default)]
pub struct FakeRemote {
    state: Arc<Mutex<RemoteState>>,
}

impl FakeRemote {
    pub fn new(state: RemoteState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, RemoteState> {
        self.state.lock().unwrap()
    }

    /// Remote file paths, sorted
    pub fn file_paths(&self) -> Vec<String> {
        self.state().files.keys().cloned().collect()
    }

    /// Commands matching a predicate
    pub fn commands_matching(&self, needle: &str) -> Vec<String> {
        self.state()
            .commands
            .iter()
            .filter(|c| c.contains(needle))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RemoteSession for FakeRemote {
    async fn execute(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, ConnectionError> {
        let hangs = {
            let state = self.state();
            state
                .hang_on
                .as_deref()
                .map(|needle| command.contains(needle))
                .unwrap_or(false)
        };
        if hangs {
            self.state().commands.push(command.to_string());
            return Err(ConnectionError::timeout(format!(
                "command exceeded {:?}",
                timeout
            )));
        }
        Ok(self.state().respond(command))
    }

    async fn ensure_dir(&mut self, remote: &str) -> Result<(), FileTransferError> {
        self.state().dirs.insert(remote.to_string());
        Ok(())
    }

    async fn put_file(&mut self, local: &Path, remote: &str) -> Result<(), FileTransferError> {
        let mut state = self.state();
        if state.fail_put.as_deref() == Some(remote) {
            return Err(FileTransferError::new(remote, "permission denied"));
        }
        let parent = remote.rsplit_once('/').map(|(p, _)| p).unwrap_or("");
        if !state.dirs.contains(parent) {
            return Err(FileTransferError::new(remote, "no such directory"));
        }
        let data = std::fs::read(local)
            .map_err(|e| FileTransferError::new(remote, e.to_string()))?;
        state.files.insert(remote.to_string(), data);
        Ok(())
    }

    async fn close(&mut self) {
        self.state().closed += 1;
    }
}

/// Connector handing out sessions onto one fake host, or a fixed error
#[derive(Clone, Default)]
pub struct FakeConnector {
    pub remote: FakeRemote,
    pub refuse: Option<ConnectionError>,
}

#[async_trait]
impl Connector for FakeConnector {
    type Session = FakeRemote;

    async fn open(&self, _target: &DeploymentTarget) -> Result<FakeRemote, ConnectionError> {
        if let Some(err) = &self.refuse {
            return Err(err.clone());
        }
        self.remote.state().opened += 1;
        Ok(self.remote.clone())
    }
}
