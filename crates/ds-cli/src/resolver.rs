//! Flag-driven target resolution

use std::path::PathBuf;

use clap::Args;

use ds_core::error::InputError;
use ds_core::resolver::{TargetDraft, TargetResolver};
use ds_core::{AuthMethod, DeploymentTarget, Secret};

/// Target flags shared by commands that connect
#[derive(Debug, Clone, Default, Args)]
pub struct TargetArgs {
    /// IP address or hostname of the server (default: saved target)
    #[arg(long)]
    pub host: Option<String>,

    /// SSH username (default: saved target, then root)
    #[arg(short, long)]
    pub user: Option<String>,

    /// Path to the private SSH key (default: saved target, then ~/.ssh/id_rsa)
    #[arg(short, long, conflicts_with = "password")]
    pub key: Option<PathBuf>,

    /// SSH password; stored in plain text in the state file
    #[arg(long, env = "DROPSHIP_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl TargetArgs {
    /// What the operator supplied, without defaults
    pub fn draft(&self) -> TargetDraft {
        let auth = match (&self.password, &self.key) {
            (Some(password), _) => Some(AuthMethod::Password(Secret::new(password.clone()))),
            (None, Some(key)) => Some(AuthMethod::PrivateKeyPath(key.clone())),
            (None, None) => None,
        };
        TargetDraft {
            host: self.host.clone(),
            username: self.user.clone(),
            auth,
        }
    }
}

/// Resolves the target from command-line flags over the saved record
#[derive(Debug, Clone)]
pub struct ArgsResolver {
    args: TargetArgs,
}

impl ArgsResolver {
    pub fn new(args: TargetArgs) -> Self {
        Self { args }
    }
}

impl TargetResolver for ArgsResolver {
    fn resolve(&self, default: Option<&DeploymentTarget>) -> Result<DeploymentTarget, InputError> {
        if let Some(saved) = default {
            tracing::info!("Using saved target {} as default", saved);
        }
        self.args.draft().complete(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_flag_wins_over_saved_key() {
        let dir = tempfile::TempDir::new().unwrap();
        let key = dir.path().join("id_rsa");
        std::fs::write(&key, "k").unwrap();
        let saved = DeploymentTarget::with_key("10.1.1.1", "ops", key);

        let resolver = ArgsResolver::new(TargetArgs {
            password: Some("pw".into()),
            ..Default::default()
        });
        let target = resolver.resolve(Some(&saved)).unwrap();

        assert_eq!(target, DeploymentTarget::with_password("10.1.1.1", "ops", "pw"));
    }

    #[test]
    fn test_missing_key_is_input_error() {
        let resolver = ArgsResolver::new(TargetArgs {
            host: Some("10.1.1.1".into()),
            key: Some("/no/such/key".into()),
            ..Default::default()
        });

        let err = resolver.resolve(None).unwrap_err();
        assert_eq!(err.problems, vec!["private key not found: /no/such/key"]);
    }
}
