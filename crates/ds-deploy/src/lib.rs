//! ds-deploy: Remote deployment pipeline for dropship
//!
//! Opens one SSH session to the target host, mirrors the local project tree
//! over SFTP, makes sure a container runtime is installed and starts the
//! compose stack. The [`Orchestrator`] sequences the stages and owns the
//! session for the whole run.

pub mod bootstrap;
pub mod launch;
pub mod orchestrator;
pub mod shell;
pub mod ssh;
pub mod sync;
pub mod transport;

#[cfg(test)]
mod testing;

pub use orchestrator::{DeployReport, Orchestrator};
pub use ssh::{SshConnector, SshSession};
pub use transport::{CommandOutput, Connector, RemoteSession};
