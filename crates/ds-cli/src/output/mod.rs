//! Output formatting utilities for the CLI
//!
//! Coloured status lines plus plain-text renderings of targets and
//! deployment reports.

use std::io::Write;

use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

use ds_core::error::{ConnectionFailure, DeployError};
use ds_core::{AuthMethod, DeployFailure, DeploymentTarget};
use ds_deploy::DeployReport;

fn print_tagged(out: &mut impl Write, color: Color, tag: &str, msg: &str) {
    let _ = crossterm::execute!(
        out,
        SetForegroundColor(color),
        Print(tag),
        Print(" "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Green checkmark line on stdout
pub fn print_success(msg: &str) {
    print_tagged(&mut std::io::stdout(), Color::Green, "✓", msg);
}

/// Red cross line on stderr
pub fn print_error(msg: &str) {
    print_tagged(&mut std::io::stderr(), Color::Red, "✗", msg);
}

/// Yellow warning line on stderr
pub fn print_warning(msg: &str) {
    print_tagged(&mut std::io::stderr(), Color::Yellow, "⚠", msg);
}

/// Cyan info line on stdout
pub fn print_info(msg: &str) {
    print_tagged(&mut std::io::stdout(), Color::Cyan, "ℹ", msg);
}

/// Describe a saved target, never revealing a password
pub fn format_target(target: &DeploymentTarget) -> String {
    let auth = match &target.auth {
        AuthMethod::PrivateKeyPath(path) => format!("private key {}", path.display()),
        AuthMethod::Password(_) => "password (stored)".to_string(),
    };
    format!(
        "Host:     {}\nUser:     {}\nAuth:     {}",
        target.host, target.username, auth
    )
}

/// Summary of a successful deployment
pub fn format_report(report: &DeployReport) -> String {
    let mut lines = vec![
        format!("Target:     {}", report.target),
        format!("Remote dir: {}", report.remote_root),
        format!(
            "Uploaded:   {} files in {} directories ({} bytes)",
            report.sync.files, report.sync.directories, report.sync.bytes
        ),
        format!(
            "Runtime:    {} ({})",
            report.bootstrap.runtime_version, report.bootstrap.compose
        ),
    ];
    if let Some(os) = report.bootstrap.installed_on {
        lines.push(format!("Installed:  docker via the {} procedure", os));
    }
    if let Some(containers) = &report.launch.containers {
        lines.push(format!("Containers:\n{}", indent(containers)));
    }
    lines.push(format!("Your app should be available at {}", report.app_url));
    lines.join("\n")
}

/// Operator advice for a failure, when there is something useful to say
pub fn failure_hint(failure: &DeployFailure) -> Option<&'static str> {
    match &failure.error {
        DeployError::Input(_) => Some("Pass --host, --user and --key (or --password)."),
        DeployError::StateCorrupt(_) => {
            Some("Fix or remove the state file, e.g. with 'dropship target forget'.")
        }
        DeployError::Connection(e) => match e.reason {
            ConnectionFailure::AuthFailed => Some("Check your SSH key and username."),
            ConnectionFailure::Unreachable => Some("Check the server address and that SSH is running."),
            ConnectionFailure::Timeout => Some("Connection timed out. Check the server address and network."),
        },
        DeployError::FileTransfer(_) => Some("Re-run the deploy once the problem is fixed; files are re-uploaded."),
        DeployError::Bootstrap(_) => Some("Install Docker on the server manually, then re-run."),
        DeployError::Launch(_) => None,
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("  {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ds_core::error::{ConnectionError, LaunchError};
    use ds_core::Stage;

    #[test]
    fn test_format_target_hides_password() {
        let target = DeploymentTarget::with_password("1.2.3.4", "ops", "hunter2");
        let text = format_target(&target);
        assert!(text.contains("1.2.3.4"));
        assert!(!text.contains("hunter2"));
    }

    #[test]
    fn test_failure_hints() {
        let auth = DeployFailure::new(Stage::Connecting, ConnectionError::auth_failed("no"));
        assert_eq!(failure_hint(&auth), Some("Check your SSH key and username."));

        let launch = DeployFailure::new(
            Stage::Launching,
            LaunchError {
                exit_code: 1,
                stderr: "boom".into(),
            },
        );
        assert_eq!(failure_hint(&launch), None);
    }

    #[test]
    fn test_indent() {
        assert_eq!(indent("a\nb"), "  a\n  b");
    }
}
