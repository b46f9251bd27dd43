//! Remote bootstrap: make sure docker and compose exist on the target
//!
//! Absence is an expected outcome of a probe, not an error. When something
//! is missing the install procedure for the detected OS family runs once and
//! the host is probed again; only that second probe decides success.

use std::fmt;
use std::time::Duration;

use ds_core::config::DeployConfig;
use ds_core::error::{BootstrapError, ConnectionError, ConnectionFailure};

use crate::shell;
use crate::transport::RemoteSession;

/// Linux distribution family, as far as installation is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Debian,
    RedHat,
    Alpine,
    Arch,
    Unknown,
}

impl OsFamily {
    /// Classify from the contents of `/etc/os-release`.
    ///
    /// `ID` is consulted before `ID_LIKE`.
    pub fn from_os_release(content: &str) -> Self {
        let mut id = Vec::new();
        let mut id_like = Vec::new();
        for line in content.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let values = value
                .trim()
                .trim_matches(|c: char| c == '"' || c == '\'')
                .split_whitespace()
                .map(str::to_ascii_lowercase);
            match key.trim() {
                "ID" => id.extend(values),
                "ID_LIKE" => id_like.extend(values),
                _ => {}
            }
        }

        id.iter()
            .chain(id_like.iter())
            .find_map(|name| Self::from_id(name))
            .unwrap_or(OsFamily::Unknown)
    }

    fn from_id(id: &str) -> Option<Self> {
        match id {
            "debian" | "ubuntu" | "raspbian" | "linuxmint" | "pop" => Some(OsFamily::Debian),
            "fedora" | "rhel" | "centos" | "rocky" | "almalinux" | "amzn" | "ol" => {
                Some(OsFamily::RedHat)
            }
            "alpine" => Some(OsFamily::Alpine),
            "arch" | "manjaro" | "endeavouros" => Some(OsFamily::Arch),
            _ => None,
        }
    }

    /// Commands that install docker with the compose plugin
    pub fn install_steps(self) -> &'static [&'static str] {
        match self {
            OsFamily::Debian => &[
                "apt-get update -y",
                "DEBIAN_FRONTEND=noninteractive apt-get install -y ca-certificates curl",
                "curl -fsSL https://get.docker.com | sh",
                "systemctl enable --now docker || service docker start",
            ],
            OsFamily::RedHat => &[
                "dnf install -y curl || yum install -y curl",
                "curl -fsSL https://get.docker.com | sh",
                "systemctl enable --now docker",
            ],
            OsFamily::Alpine => &[
                "apk add --no-cache docker docker-cli-compose",
                "rc-update add docker default",
                "service docker start",
            ],
            OsFamily::Arch => &[
                "pacman -Sy --noconfirm docker docker-compose",
                "systemctl enable --now docker",
            ],
            OsFamily::Unknown => &[
                "curl -fsSL https://get.docker.com | sh",
                "systemctl start docker || service docker start",
                "systemctl enable docker || true",
            ],
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OsFamily::Debian => "debian",
            OsFamily::RedHat => "redhat",
            OsFamily::Alpine => "alpine",
            OsFamily::Arch => "arch",
            OsFamily::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Which compose front-end the host provides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeCommand {
    /// `docker compose` (v2 CLI plugin)
    Plugin,
    /// `docker-compose` (standalone binary)
    Standalone,
}

impl ComposeCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            ComposeCommand::Plugin => "docker compose",
            ComposeCommand::Standalone => "docker-compose",
        }
    }
}

impl fmt::Display for ComposeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a probe found on the host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeProbe {
    /// `docker --version` output, if docker is present
    pub runtime: Option<String>,
    pub compose: Option<ComposeCommand>,
}

impl RuntimeProbe {
    pub fn runtime_present(&self) -> bool {
        self.runtime.is_some()
    }

    pub fn compose_present(&self) -> bool {
        self.compose.is_some()
    }

    fn missing(&self) -> String {
        let mut missing = Vec::new();
        if !self.runtime_present() {
            missing.push("docker");
        }
        if !self.compose_present() {
            missing.push("docker compose");
        }
        missing.join(", ")
    }

    fn into_report(self, installed_on: Option<OsFamily>) -> Option<BootstrapReport> {
        Some(BootstrapReport {
            runtime_version: self.runtime?,
            compose: self.compose?,
            installed_on,
        })
    }
}

/// Outcome of [`ensure_runtime`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub runtime_version: String,
    pub compose: ComposeCommand,
    /// Set when this run had to install, naming the procedure used
    pub installed_on: Option<OsFamily>,
}

/// Check for docker and a compose front-end. Non-zero exits mean "absent".
///
/// The compose plugin (`docker compose`) is preferred over the standalone
/// `docker-compose` binary.
///
/// # Returns
/// What was found, or the [`ConnectionError`] if a probe command could not
/// be run at all.
pub async fn probe<S: RemoteSession + ?Sized>(
    session: &mut S,
    timeout: Duration,
) -> Result<RuntimeProbe, ConnectionError> {
    let version = session.execute("docker --version", timeout).await?;
    if !version.success() {
        return Ok(RuntimeProbe::default());
    }

    let compose = if session.execute("docker compose version", timeout).await?.success() {
        Some(ComposeCommand::Plugin)
    } else if session
        .execute("docker-compose --version", timeout)
        .await?
        .success()
    {
        Some(ComposeCommand::Standalone)
    } else {
        None
    };

    Ok(RuntimeProbe {
        runtime: Some(version.stdout),
        compose,
    })
}

/// Read `/etc/os-release` over the command channel
pub async fn detect_os<S: RemoteSession + ?Sized>(
    session: &mut S,
    timeout: Duration,
) -> Result<OsFamily, ConnectionError> {
    let output = session.execute("cat /etc/os-release", timeout).await?;
    if !output.success() {
        tracing::debug!("No /etc/os-release: {}", output.stderr);
        return Ok(OsFamily::Unknown);
    }
    Ok(OsFamily::from_os_release(&output.stdout))
}

/// Ensure docker and compose are present, installing them if needed
///
/// # Arguments
/// * `session` - Open session to the target host
/// * `config` - Supplies the probe and per-step install timeouts
///
/// # Returns
/// The runtime version and compose command to use, with `installed_on` set
/// when an install ran. [`BootstrapError::InstallFailed`] when the final
/// probe still finds something missing.
pub async fn ensure_runtime<S: RemoteSession + ?Sized>(
    session: &mut S,
    config: &DeployConfig,
) -> Result<BootstrapReport, BootstrapError> {
    let found = probe(session, config.command_timeout).await?;
    if let Some(report) = found.clone().into_report(None) {
        tracing::info!("Docker is already installed: {}", report.runtime_version);
        return Ok(report);
    }

    tracing::info!("Missing {} - installing", found.missing());
    let os = detect_os(session, config.command_timeout).await?;
    let needs_sudo = !is_root(session, config.command_timeout).await?;
    tracing::info!(
        "Using the {} install procedure{}",
        os,
        if needs_sudo { " via sudo" } else { "" }
    );

    for step in os.install_steps() {
        let command = if needs_sudo {
            format!("sudo -n sh -c {}", shell::quote(step))
        } else {
            step.to_string()
        };

        tracing::info!("Running: {}", step);
        match session.execute(&command, config.install_timeout).await {
            Ok(output) if output.success() => {}
            Ok(output) => tracing::warn!(
                "Install step exited with {}: {}",
                output.exit_code,
                output.stderr
            ),
            Err(e) if e.reason == ConnectionFailure::Timeout => {
                tracing::warn!("Install step timed out: {}", e.detail)
            }
            Err(e) => return Err(e.into()),
        }
    }

    let found = probe(session, config.command_timeout).await?;
    let missing = found.missing();
    match found.into_report(Some(os)) {
        Some(report) => {
            tracing::info!("Docker installed: {}", report.runtime_version);
            Ok(report)
        }
        None => Err(BootstrapError::InstallFailed {
            os: os.to_string(),
            missing,
        }),
    }
}

async fn is_root<S: RemoteSession + ?Sized>(
    session: &mut S,
    timeout: Duration,
) -> Result<bool, ConnectionError> {
    let output = session.execute("id -u", timeout).await?;
    // Unknown uid: run the steps as-is and let the re-probe judge
    Ok(!output.success() || output.stdout.trim() == "0")
}
