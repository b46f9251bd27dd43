//! Deploy command implementation

use std::path::{Path, PathBuf};

use anyhow::Result;

use ds_core::config;
use ds_deploy::{Orchestrator, SshConnector};

use super::project_root;
use crate::output::{
    failure_hint, format_report, print_error, print_info, print_success, print_warning,
};
use crate::resolver::{ArgsResolver, TargetArgs};

/// Deploy a project directory to the resolved target
pub async fn deploy_command(
    config_path: Option<&PathBuf>,
    project: &Path,
    target: TargetArgs,
    port: Option<u16>,
) -> Result<()> {
    let root = project_root(project)?;
    let mut config = config::discover(config_path.map(PathBuf::as_path), &root)?;
    if let Some(port) = port {
        config.port = port;
    }

    if target.password.is_some() {
        print_warning(&format!(
            "The password will be saved in plain text in {}",
            root.join(&config.state_file).display()
        ));
    }
    print_info(&format!("Deploying {}", root.display()));

    let connector = SshConnector::from_config(&config);
    let orchestrator = Orchestrator::new(&root, config, ArgsResolver::new(target), connector);

    match orchestrator.run().await {
        Ok(report) => {
            print_success(&format!("Deployed to {}", report.target));
            println!("{}", format_report(&report));
            Ok(())
        }
        Err(failure) => {
            print_error(&failure.to_string());
            if let Some(hint) = failure_hint(&failure) {
                print_info(hint);
            }
            Err(failure.into())
        }
    }
}
