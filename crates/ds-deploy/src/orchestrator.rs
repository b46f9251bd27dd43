//! Deployment orchestrator
//!
//! Runs one deployment as a linear pipeline:
//! `Idle → Resolving → Connecting → Syncing → Bootstrapping → Launching → Done`,
//! with `Failed` reachable from every non-terminal stage. The orchestrator
//! owns the only session of the run and closes it on every exit path.
//! Nothing is retried.

use std::path::PathBuf;

use ds_core::config::DeployConfig;
use ds_core::resolver::TargetResolver;
use ds_core::state::{self, StateStore};
use ds_core::{DeployError, DeployFailure, DeploymentTarget, Stage};

use crate::bootstrap::{self, BootstrapReport};
use crate::launch::{self, LaunchReport};
use crate::sync::{self, SyncReport};
use crate::transport::{Connector, RemoteSession};

/// Everything a successful run did
#[derive(Debug, Clone)]
pub struct DeployReport {
    pub target: DeploymentTarget,
    pub remote_root: String,
    pub sync: SyncReport,
    pub bootstrap: BootstrapReport,
    pub launch: LaunchReport,
    pub app_url: String,
}

/// Sequences one deployment run. Not reusable: [`Orchestrator::run`] consumes it.
pub struct Orchestrator<R, C> {
    project_root: PathBuf,
    config: DeployConfig,
    store: StateStore,
    resolver: R,
    connector: C,
    stage: Stage,
}

impl<R, C> Orchestrator<R, C>
where
    R: TargetResolver,
    C: Connector,
{
    /// Create an orchestrator for a finished project directory
    pub fn new(project_root: impl Into<PathBuf>, config: DeployConfig, resolver: R, connector: C) -> Self {
        let project_root = project_root.into();
        let store = StateStore::for_project(&project_root, &config.state_file);
        Self {
            project_root,
            config,
            store,
            resolver,
            connector,
            stage: Stage::Idle,
        }
    }

    /// Run the whole pipeline
    pub async fn run(mut self) -> Result<DeployReport, DeployFailure> {
        match self.execute().await {
            Ok(report) => {
                self.advance(Stage::Done);
                tracing::info!("Deployment to {} completed", report.target);
                Ok(report)
            }
            Err(error) => {
                let stage = self.stage;
                self.advance(Stage::Failed);
                Err(DeployFailure { stage, error })
            }
        }
    }

    async fn execute(&mut self) -> Result<DeployReport, DeployError> {
        self.advance(Stage::Resolving);
        let saved = self.store.load()?;
        let target = self.resolver.resolve(saved.as_ref())?;

        self.advance(Stage::Connecting);
        tracing::info!("Connecting to {}", target);
        let mut session = self.connector.open(&target).await?;
        tracing::info!("Connected");

        // Remember a reachable target even if a later stage fails
        if let Err(e) = self.store.save(&target) {
            tracing::warn!("Could not save deployment target: {}", e);
        }

        let result = self.drive(&mut session, &target).await;
        session.close().await;
        let (remote_root, sync, bootstrap, launch) = result?;

        Ok(DeployReport {
            app_url: self.config.app_url(&target),
            target,
            remote_root,
            sync,
            bootstrap,
            launch,
        })
    }

    async fn drive(
        &mut self,
        session: &mut C::Session,
        target: &DeploymentTarget,
    ) -> Result<(String, SyncReport, BootstrapReport, LaunchReport), DeployError> {
        let remote_root = self.config.remote_root(target);

        self.advance(Stage::Syncing);
        tracing::info!("Uploading project to {}", remote_root);
        let exclude = upload_exclusions(&self.config);
        let synced = sync::sync(session, &self.project_root, &remote_root, &exclude).await?;

        self.advance(Stage::Bootstrapping);
        tracing::info!("Checking Docker installation");
        let bootstrapped = bootstrap::ensure_runtime(session, &self.config).await?;

        self.advance(Stage::Launching);
        let launched =
            launch::launch(session, &remote_root, bootstrapped.compose, &self.config).await?;

        Ok((remote_root, synced, bootstrapped, launched))
    }

    fn advance(&mut self, next: Stage) {
        tracing::debug!("Stage {} -> {}", self.stage, next);
        self.stage = next;
    }
}

/// Configured exclusions plus the state file and its staging copy, which
/// may hold a password
fn upload_exclusions(config: &DeployConfig) -> Vec<String> {
    let mut exclude = config.exclude.clone();
    exclude.push(config.state_file.clone());
    exclude.push(state::staging_file_name(&config.state_file));
    exclude
}
