//! Per-job scratch directories.
//!
//! Every job gets its own directory under the configured workspace root,
//! named with [`WORKSPACE_PREFIX`]. The directory is removed when the job
//! finishes, when the owning future is dropped, and (for directories left
//! behind by a crashed host) by [`sweep_stale`] at start-up.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use tracing::{debug, warn};

use super::error::ConverterError;
use super::types::EbookFormat;

/// Name prefix shared by all workspaces. The sweeper only touches these.
pub const WORKSPACE_PREFIX: &str = "inkpress-job-";

/// An isolated scratch directory owned by one job.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl Workspace {
    /// Creates a fresh workspace under `root`, creating `root` if needed.
    pub fn create(root: &Path) -> Result<Self, ConverterError> {
        std::fs::create_dir_all(root).map_err(|source| ConverterError::OutputUnwritable {
            path: root.to_path_buf(),
            source,
        })?;

        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(root)
            .map_err(|source| ConverterError::OutputUnwritable {
                path: root.to_path_buf(),
                source,
            })?;
        let path = dir.path().to_path_buf();
        debug!(workspace = %path.display(), "Created workspace");

        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path the engine should write its output to.
    pub fn output_file(&self, stem: &str, format: EbookFormat) -> PathBuf {
        self.path.join(format!("{}.{}", stem, format.extension()))
    }

    pub fn is_closed(&self) -> bool {
        self.dir.is_none()
    }

    /// Removes the directory. Safe to call more than once.
    pub fn close(&mut self) -> io::Result<()> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };
        match dir.close() {
            Ok(()) => {
                debug!(workspace = %self.path.display(), "Removed workspace");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Removes leftover workspaces under `root` older than `max_age`.
///
/// Returns the number of directories removed. A missing root is not an error.
pub async fn sweep_stale(root: &Path, max_age: Duration) -> io::Result<usize> {
    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let now = SystemTime::now();
    let mut removed = 0;

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(WORKSPACE_PREFIX) {
            continue;
        }

        let metadata = match entry.metadata().await {
            Ok(m) if m.is_dir() => m,
            _ => continue,
        };

        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if age < max_age {
            continue;
        }

        match tokio::fs::remove_dir_all(entry.path()).await {
            Ok(()) => {
                debug!(workspace = %entry.path().display(), "Removed stale workspace");
                removed += 1;
            }
            Err(e) => warn!(
                workspace = %entry.path().display(),
                "Failed to remove stale workspace: {}", e
            ),
        }
    }

    Ok(removed)
}
