//! Persisted record of the last-used deployment target
//!
//! One JSON file per project directory. Writes go to a temporary file in the
//! same directory which is renamed over the old record only once fully
//! written, so an interrupted save leaves the previous record loadable.
//! The staging file has a fixed name (see [`staging_file_name`]) so callers
//! can keep a leftover one out of uploads.

use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::{Builder, NamedTempFile};

use crate::error::{StateCorruptError, StateWriteError};
use crate::types::{AuthMethod, DeploymentTarget, Secret};

/// Default state file name inside the project directory
pub const DEFAULT_STATE_FILE: &str = "deployment_target.json";

/// Suffix of the file a save is written to before it replaces the record
const STAGING_SUFFIX: &str = ".tmp";

/// Basename of the staging file for a state file named `file_name`.
///
/// A save interrupted before its rename leaves this file behind, holding
/// the same data as the record, password included.
pub fn staging_file_name(file_name: &str) -> String {
    format!("{}{}", file_name, STAGING_SUFFIX)
}

/// Authentication kind as stored on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    PrivateKey,
    Password,
}

/// On-disk form of a [`DeploymentTarget`].
///
/// The password, if any, is stored in plain text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub host: String,
    pub username: String,
    pub auth_method: AuthKind,
    pub auth_value: String,
}

impl From<&DeploymentTarget> for DeploymentRecord {
    fn from(target: &DeploymentTarget) -> Self {
        let (auth_method, auth_value) = match &target.auth {
            AuthMethod::PrivateKeyPath(path) => {
                (AuthKind::PrivateKey, path.to_string_lossy().into_owned())
            }
            AuthMethod::Password(secret) => (AuthKind::Password, secret.expose().to_string()),
        };
        Self {
            host: target.host.clone(),
            username: target.username.clone(),
            auth_method,
            auth_value,
        }
    }
}

impl From<DeploymentRecord> for DeploymentTarget {
    fn from(record: DeploymentRecord) -> Self {
        let auth = match record.auth_method {
            AuthKind::PrivateKey => AuthMethod::PrivateKeyPath(PathBuf::from(record.auth_value)),
            AuthKind::Password => AuthMethod::Password(Secret::new(record.auth_value)),
        };
        Self {
            host: record.host,
            username: record.username,
            auth,
        }
    }
}

/// Reads and writes the deployment record for one project
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Store backed by an explicit file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store for a project directory
    pub fn for_project(project_root: &Path, file_name: &str) -> Self {
        Self::new(project_root.join(file_name))
    }

    /// Location of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Location of the staging file used by [`StateStore::save`]
    pub fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        name.push(STAGING_SUFFIX);
        self.path.with_file_name(name)
    }

    /// Load the last saved target.
    ///
    /// A missing file is `Ok(None)`; a present file that cannot be read or
    /// parsed is a [`StateCorruptError`].
    pub fn load(&self) -> Result<Option<DeploymentTarget>, StateCorruptError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.corrupt(e.to_string())),
        };

        let record: DeploymentRecord =
            serde_json::from_str(&content).map_err(|e| self.corrupt(e.to_string()))?;

        tracing::debug!("Loaded deployment target from {:?}", self.path);
        Ok(Some(record.into()))
    }

    /// Save a target, replacing the previous record atomically
    pub fn save(&self, target: &DeploymentTarget) -> Result<(), StateWriteError> {
        let staged = self.stage(target).map_err(|source| self.write_error(source))?;
        staged
            .persist(&self.path)
            .map_err(|e| self.write_error(e.error))?;

        tracing::debug!("Saved deployment target to {:?}", self.path);
        Ok(())
    }

    /// Remove the record. Returns whether one existed.
    pub fn clear(&self) -> Result<bool, StateWriteError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.write_error(e)),
        }
    }

    /// Write the serialized record to the staging file next to the state file.
    ///
    /// A staging file left over from an interrupted save is replaced.
    fn stage(&self, target: &DeploymentTarget) -> io::Result<NamedTempFile> {
        let record = DeploymentRecord::from(target);
        let body = serde_json::to_string_pretty(&record).map_err(io::Error::other)?;

        let staging = self.staging_path();
        let dir = match staging.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        match fs::remove_file(&staging) {
            Ok(()) => tracing::debug!("Removed stale staging file {:?}", staging),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        let name = staging.file_name().unwrap_or_default();
        let mut staged = Builder::new().prefix(name).rand_bytes(0).tempfile_in(dir)?;
        staged.write_all(body.as_bytes())?;
        staged.write_all(b"\n")?;
        staged.as_file().sync_all()?;
        Ok(staged)
    }

    fn corrupt(&self, reason: String) -> StateCorruptError {
        StateCorruptError {
            path: self.path.clone(),
            reason,
        }
    }

    fn write_error(&self, source: io::Error) -> StateWriteError {
        StateWriteError {
            path: self.path.clone(),
            source,
        }
    }
}
