//! File synchronization
//!
//! Walks the local project, prunes excluded names and replays the tree on
//! the remote host: each directory is ensured before any file inside it is
//! uploaded. Files are always uploaded whole, and the first failed upload
//! aborts the run.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use ds_core::error::FileTransferError;

use crate::transport::RemoteSession;

/// Log upload progress every this many files
const PROGRESS_EVERY: usize = 10;

/// One directory or file to reproduce remotely
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEntry {
    pub local: PathBuf,
    pub remote: String,
    pub is_dir: bool,
    pub size: u64,
}

/// Ordered list of directories and files to reproduce.
///
/// Every directory precedes the files it contains.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    entries: Vec<SyncEntry>,
}

impl SyncPlan {
    /// Walk `local_root` and map it under `remote_root`.
    ///
    /// Any entry whose basename exactly equals a name in `exclude` is skipped;
    /// excluded directories are not descended into. Symlinks to files are
    /// uploaded as the file they point at. Symlinked directories, dangling
    /// links and special files are skipped.
    ///
    /// # Arguments
    /// * `local_root` - Project directory to mirror
    /// * `remote_root` - Absolute remote directory the project maps onto
    /// * `exclude` - Basenames to leave out, at any depth
    ///
    /// # Returns
    /// The plan, or a [`FileTransferError`] naming the first local path that
    /// could not be read.
    pub fn build(
        local_root: &Path,
        remote_root: &str,
        exclude: &[String],
    ) -> Result<Self, FileTransferError> {
        let remote_root = remote_root.trim_end_matches('/');
        let remote_root = if remote_root.is_empty() { "/" } else { remote_root };

        // Files before subdirectories, each group by name
        let walker = WalkDir::new(local_root)
            .follow_links(false)
            .sort_by(|a, b| {
                a.file_type()
                    .is_dir()
                    .cmp(&b.file_type().is_dir())
                    .then_with(|| a.file_name().cmp(b.file_name()))
            })
            .into_iter()
            .filter_entry(|entry| {
                let keep = entry.depth() == 0 || !is_excluded(entry.file_name(), exclude);
                if !keep {
                    tracing::debug!("Skipping excluded {}", entry.path().display());
                }
                keep
            });

        let mut plan = Self::default();
        for entry in walker {
            let entry = entry.map_err(|e| walk_error(local_root, e))?;
            let remote = remote_path(remote_root, local_root, entry.path())?;

            if entry.file_type().is_dir() {
                plan.entries.push(SyncEntry {
                    local: entry.into_path(),
                    remote,
                    is_dir: true,
                    size: 0,
                });
                continue;
            }

            let metadata = match fs::metadata(entry.path()) {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == io::ErrorKind::NotFound && entry.path_is_symlink() => {
                    tracing::debug!("Skipping dangling symlink {}", entry.path().display());
                    continue;
                }
                Err(e) => return Err(local_error(entry.path(), e)),
            };

            if metadata.is_file() {
                plan.entries.push(SyncEntry {
                    local: entry.into_path(),
                    remote,
                    is_dir: false,
                    size: metadata.len(),
                });
            } else if metadata.is_dir() {
                tracing::debug!("Skipping symlinked directory {}", entry.path().display());
            } else {
                tracing::debug!("Skipping special file {}", entry.path().display());
            }
        }
        Ok(plan)
    }

    /// All entries, each directory ahead of its contents
    pub fn entries(&self) -> &[SyncEntry] {
        &self.entries
    }

    pub fn files(&self) -> impl Iterator<Item = &SyncEntry> {
        self.entries.iter().filter(|e| !e.is_dir)
    }

    pub fn file_count(&self) -> usize {
        self.files().count()
    }

    pub fn dir_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_dir).count()
    }

    /// Sum of all file sizes, as measured when the plan was built
    pub fn total_bytes(&self) -> u64 {
        self.files().map(|e| e.size).sum()
    }
}

/// Outcome of a synchronization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub directories: usize,
    pub files: usize,
    pub bytes: u64,
}

/// Reproduce `local_root` under `remote_root` on the session's host
///
/// # Arguments
/// * `session` - Open session whose file-transfer channel is used
/// * `local_root` - Project directory to mirror
/// * `remote_root` - Absolute remote directory, created if missing
/// * `exclude` - Basenames left out at any depth
///
/// # Returns
/// Counts of what was created and uploaded. An empty project is refused
/// with the reason "no files to upload".
pub async fn sync<S: RemoteSession + ?Sized>(
    session: &mut S,
    local_root: &Path,
    remote_root: &str,
    exclude: &[String],
) -> Result<SyncReport, FileTransferError> {
    let plan = SyncPlan::build(local_root, remote_root, exclude)?;
    if plan.file_count() == 0 {
        return Err(FileTransferError::new(
            local_root.display().to_string(),
            "no files to upload",
        ));
    }

    tracing::info!(
        "Uploading {} files ({} bytes) to {}",
        plan.file_count(),
        plan.total_bytes(),
        remote_root
    );
    apply(session, &plan).await
}

/// Execute a plan entry by entry, stopping at the first failure.
///
/// Entries already uploaded stay on the remote host when a later one fails.
pub async fn apply<S: RemoteSession + ?Sized>(
    session: &mut S,
    plan: &SyncPlan,
) -> Result<SyncReport, FileTransferError> {
    let total = plan.file_count();
    let mut report = SyncReport::default();

    for entry in plan.entries() {
        if entry.is_dir {
            session.ensure_dir(&entry.remote).await?;
            report.directories += 1;
            continue;
        }

        session.put_file(&entry.local, &entry.remote).await?;
        report.files += 1;
        report.bytes += entry.size;
        if report.files % PROGRESS_EVERY == 0 || report.files == total {
            tracing::info!("Uploaded {}/{} files", report.files, total);
        }
    }

    Ok(report)
}

fn is_excluded(name: &OsStr, exclude: &[String]) -> bool {
    exclude.iter().any(|excluded| OsStr::new(excluded) == name)
}

fn local_error(path: &Path, e: io::Error) -> FileTransferError {
    FileTransferError::new(path.display().to_string(), e.to_string())
}

fn walk_error(local_root: &Path, e: walkdir::Error) -> FileTransferError {
    let path = e.path().unwrap_or(local_root).display().to_string();
    FileTransferError::new(path, e.to_string())
}

/// Remote counterpart of a local path below `local_root`
fn remote_path(remote_root: &str, local_root: &Path, path: &Path) -> Result<String, FileTransferError> {
    let relative = path
        .strip_prefix(local_root)
        .map_err(|e| FileTransferError::new(path.display().to_string(), e.to_string()))?;

    let mut remote = remote_root.to_string();
    for component in relative.components() {
        let name = component.as_os_str().to_str().ok_or_else(|| {
            FileTransferError::new(path.display().to_string(), "file name is not valid UTF-8")
        })?;
        remote = join_remote(&remote, name);
    }
    Ok(remote)
}

fn join_remote(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}
