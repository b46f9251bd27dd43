//! Credential/target resolution
//!
//! The orchestrator never talks to the operator directly. It asks a
//! [`TargetResolver`] for a target, offering the last persisted one as a
//! default. [`TargetDraft`] holds whatever the operator supplied and turns it
//! into a validated [`DeploymentTarget`].

use std::path::{Path, PathBuf};

use crate::error::InputError;
use crate::types::{AuthMethod, DeploymentTarget};

/// Username used when neither the operator nor a saved record provides one
pub const DEFAULT_USERNAME: &str = "root";

/// Produces the target for a run, given the previously saved one (if any)
pub trait TargetResolver {
    fn resolve(&self, default: Option<&DeploymentTarget>) -> Result<DeploymentTarget, InputError>;
}

impl<F> TargetResolver for F
where
    F: Fn(Option<&DeploymentTarget>) -> Result<DeploymentTarget, InputError>,
{
    fn resolve(&self, default: Option<&DeploymentTarget>) -> Result<DeploymentTarget, InputError> {
        self(default)
    }
}

/// Partially specified target as supplied by the operator
#[derive(Debug, Clone, Default)]
pub struct TargetDraft {
    pub host: Option<String>,
    pub username: Option<String>,
    pub auth: Option<AuthMethod>,
}

impl TargetDraft {
    /// Fill gaps from the saved default, then validate.
    ///
    /// Fields supplied in the draft override the default one by one. Without
    /// any auth method the draft falls back to `~/.ssh/id_rsa`.
    pub fn complete(self, default: Option<&DeploymentTarget>) -> Result<DeploymentTarget, InputError> {
        let host = self
            .host
            .or_else(|| default.map(|d| d.host.clone()))
            .unwrap_or_default();
        let username = self
            .username
            .or_else(|| default.map(|d| d.username.clone()))
            .unwrap_or_else(|| DEFAULT_USERNAME.to_string());
        let auth = self
            .auth
            .or_else(|| default.map(|d| d.auth.clone()))
            .unwrap_or_else(|| AuthMethod::PrivateKeyPath(default_key_path()));

        let target = DeploymentTarget {
            host: host.trim().to_string(),
            username: username.trim().to_string(),
            auth: match auth {
                AuthMethod::PrivateKeyPath(path) => AuthMethod::PrivateKeyPath(expand_tilde(&path)),
                other => other,
            },
        };
        validate(&target)?;
        Ok(target)
    }
}

/// Check a target before any connection is attempted.
///
/// Collects every problem instead of stopping at the first.
pub fn validate(target: &DeploymentTarget) -> Result<(), InputError> {
    let mut problems = Vec::new();

    if target.host.trim().is_empty() {
        problems.push("host is required".to_string());
    }
    if target.username.trim().is_empty() {
        problems.push("username is required".to_string());
    }

    match &target.auth {
        AuthMethod::PrivateKeyPath(path) if path.as_os_str().is_empty() => {
            problems.push("private key path is required".to_string());
        }
        AuthMethod::PrivateKeyPath(path) if !path.exists() => {
            problems.push(format!("private key not found: {}", path.display()));
        }
        AuthMethod::PrivateKeyPath(path) if !path.is_file() => {
            problems.push(format!("private key path is not a file: {}", path.display()));
        }
        AuthMethod::Password(secret) if secret.expose().is_empty() => {
            problems.push("password is empty".to_string());
        }
        _ => {}
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(InputError { problems })
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

fn default_key_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".ssh")
        .join("id_rsa")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Secret;
    use tempfile::TempDir;

    fn key_file(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("id_ed25519");
        std::fs::write(&path, "not really a key").unwrap();
        path
    }

    #[test]
    fn test_complete_from_draft_only() {
        let dir = TempDir::new().unwrap();
        let key = key_file(&dir);
        let draft = TargetDraft {
            host: Some(" 10.0.0.9 ".into()),
            username: None,
            auth: Some(AuthMethod::PrivateKeyPath(key.clone())),
        };

        let target = draft.complete(None).unwrap();
        assert_eq!(target, DeploymentTarget::with_key("10.0.0.9", "root", key));
    }

    #[test]
    fn test_draft_overrides_default_field_by_field() {
        let dir = TempDir::new().unwrap();
        let key = key_file(&dir);
        let saved = DeploymentTarget::with_key("10.0.0.1", "deploy", key.clone());
        let draft = TargetDraft {
            host: Some("10.0.0.2".into()),
            ..Default::default()
        };

        let target = draft.complete(Some(&saved)).unwrap();
        assert_eq!(target.host, "10.0.0.2");
        assert_eq!(target.username, "deploy");
        assert_eq!(target.auth, AuthMethod::PrivateKeyPath(key));
    }

    #[test]
    fn test_password_replaces_saved_key() {
        let dir = TempDir::new().unwrap();
        let saved = DeploymentTarget::with_key("10.0.0.1", "root", key_file(&dir));
        let draft = TargetDraft {
            auth: Some(AuthMethod::Password(Secret::new("pw"))),
            ..Default::default()
        };

        let target = draft.complete(Some(&saved)).unwrap();
        assert_eq!(target.auth, AuthMethod::Password(Secret::new("pw")));
    }

    #[test]
    fn test_missing_host_and_key_reported_together() {
        let draft = TargetDraft {
            host: None,
            username: Some("root".into()),
            auth: Some(AuthMethod::PrivateKeyPath("/definitely/not/here".into())),
        };

        let err = draft.complete(None).unwrap_err();
        assert_eq!(err.problems.len(), 2);
        assert_eq!(err.problems[0], "host is required");
        assert!(err.problems[1].starts_with("private key not found"));
    }

    #[test]
    fn test_key_path_must_be_a_file() {
        let dir = TempDir::new().unwrap();
        let target = DeploymentTarget::with_key("h", "u", dir.path());
        let err = validate(&target).unwrap_err();
        assert!(err.problems[0].contains("not a file"));
    }

    #[test]
    fn test_closure_resolver_receives_default() {
        let saved = DeploymentTarget::with_password("h", "u", "pw");
        let resolver = |default: Option<&DeploymentTarget>| {
            default.cloned().ok_or_else(|| InputError::new("no default"))
        };

        assert_eq!(resolver.resolve(Some(&saved)).unwrap(), saved);
        assert!(resolver.resolve(None).is_err());
    }

    #[test]
    fn test_expand_tilde() {
        let plain = PathBuf::from("/etc/key");
        assert_eq!(expand_tilde(&plain), plain);

        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde(Path::new("~/.ssh/id_rsa")), home.join(".ssh/id_rsa"));
        }
    }
}
