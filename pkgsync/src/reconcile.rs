//! Mark-and-sweep reconciliation of the local content directory.
//!
//! A run snapshots every file in the content directory as a deletion
//! candidate, confirms each file the index still references, and finally
//! deletes whatever was never confirmed.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};

/// Result of a sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepResult {
    /// Number of files deleted.
    pub files_deleted: usize,
    /// Total bytes freed.
    pub bytes_freed: u64,
    /// Files that could not be deleted.
    pub failed: Vec<PathBuf>,
}

impl fmt::Display for SweepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "removed {} obsolete files, freed {} bytes",
            self.files_deleted, self.bytes_freed
        )?;
        if !self.failed.is_empty() {
            write!(f, " ({} could not be deleted)", self.failed.len())?;
        }
        Ok(())
    }
}

/// Working set of local files that are candidates for deletion.
#[derive(Debug, Default)]
pub struct LocalFileSet {
    files: HashSet<PathBuf>,
}

impl LocalFileSet {
    /// List the regular files directly inside `directory` (non-recursive).
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ReadFailed`] if the directory cannot be listed.
    pub fn snapshot(directory: &Path) -> SyncResult<Self> {
        let read_failed = |e| SyncError::ReadFailed {
            path: directory.to_path_buf(),
            source: e,
        };

        let mut files = HashSet::new();
        for entry in fs::read_dir(directory).map_err(read_failed)? {
            let entry = entry.map_err(read_failed)?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if is_file {
                files.insert(entry.path());
            }
        }

        info!(
            directory = %directory.display(),
            count = files.len(),
            "Found packages on disk"
        );
        Ok(Self { files })
    }

    /// Remove a file from the deletion candidates.
    ///
    /// Returns `true` if the file was a candidate.
    pub fn confirm(&mut self, file: &Path) -> bool {
        self.files.remove(file)
    }

    /// Whether a file is still a deletion candidate.
    pub fn contains(&self, file: &Path) -> bool {
        self.files.contains(file)
    }

    /// Number of remaining candidates.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether no candidates remain.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Delete every remaining candidate.
    ///
    /// Deletion failures are logged and reported, never returned as errors.
    /// The working set is empty afterwards.
    pub fn sweep(&mut self) -> SweepResult {
        let mut result = SweepResult::default();
        info!(count = self.files.len(), "Deleting obsolete packages");

        for file in self.files.drain() {
            let size = file.metadata().map(|m| m.len()).unwrap_or(0);
            match fs::remove_file(&file) {
                Ok(()) => {
                    debug!(path = %file.display(), "Deleted unused file");
                    result.files_deleted += 1;
                    result.bytes_freed += size;
                }
                Err(e) => {
                    warn!(path = %file.display(), error = %e, "Failed to delete unused file");
                    result.failed.push(file);
                }
            }
        }

        result
    }
}
