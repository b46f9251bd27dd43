//! Launch the compose stack on the remote host

use ds_core::config::DeployConfig;
use ds_core::error::{DeployError, LaunchError};

use crate::bootstrap::ComposeCommand;
use crate::shell;
use crate::transport::RemoteSession;

/// Lines of container logs fetched when a launch fails
const FAILURE_LOG_LINES: u32 = 50;

/// Outcome of a successful launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchReport {
    /// The command that was run
    pub command: String,
    /// Its standard output
    pub output: String,
    /// `ps` listing after start, when it could be fetched
    pub containers: Option<String>,
}

/// Stop the existing stack, rebuild images and start detached
pub fn launch_command(remote_root: &str, compose: ComposeCommand) -> String {
    format!(
        "cd {root} && {compose} down --remove-orphans && {compose} up -d --build --force-recreate --remove-orphans",
        root = shell::quote(remote_root),
        compose = compose,
    )
}

/// Run the build-and-run command once. A non-zero exit is a [`LaunchError`]
/// carrying the remote stderr unchanged.
pub async fn launch<S: RemoteSession + ?Sized>(
    session: &mut S,
    remote_root: &str,
    compose: ComposeCommand,
    config: &DeployConfig,
) -> Result<LaunchReport, DeployError> {
    let command = launch_command(remote_root, compose);
    tracing::info!("Building and starting containers with {}", compose);

    let output = session.execute(&command, config.launch_timeout).await?;
    if !output.success() {
        tracing::error!("{} failed (exit code {})", compose, output.exit_code);
        log_recent_container_output(session, remote_root, compose, config).await;
        return Err(LaunchError {
            exit_code: output.exit_code,
            stderr: output.stderr,
        }
        .into());
    }

    let ps = format!("cd {} && {} ps", shell::quote(remote_root), compose);
    let containers = match session.execute(&ps, config.command_timeout).await {
        Ok(listing) if listing.success() => Some(listing.stdout),
        Ok(listing) => {
            tracing::debug!("ps exited with {}: {}", listing.exit_code, listing.stderr);
            None
        }
        Err(e) => {
            tracing::warn!("Could not list containers: {}", e);
            None
        }
    };

    tracing::info!("Application started");
    Ok(LaunchReport {
        command,
        output: output.stdout,
        containers,
    })
}

async fn log_recent_container_output<S: RemoteSession + ?Sized>(
    session: &mut S,
    remote_root: &str,
    compose: ComposeCommand,
    config: &DeployConfig,
) {
    let logs = format!(
        "cd {} && {} logs --tail={}",
        shell::quote(remote_root),
        compose,
        FAILURE_LOG_LINES
    );
    match session.execute(&logs, config.command_timeout).await {
        Ok(output) if !output.stdout.is_empty() => {
            tracing::error!("Container logs:\n{}", output.stdout)
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("Could not fetch container logs: {}", e),
    }
}
