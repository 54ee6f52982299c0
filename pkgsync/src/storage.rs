//! On-disk layout of the package cache.
//!
//! ```text
//! base_dir/
//! ├── downloading/   temporary transfer output
//! ├── incoming/      relocated downloads awaiting validation
//! └── packages/      validated content, one file per digest
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use url::Url;

use crate::error::{SyncError, SyncResult};

/// Subdirectory for in-flight transfers.
pub const DOWNLOADING_SUBDIR: &str = "downloading";

/// Subdirectory for completed transfers relocated by the orchestrator.
pub const INCOMING_SUBDIR: &str = "incoming";

/// Subdirectory for validated package content.
pub const PACKAGES_SUBDIR: &str = "packages";

/// Resolves cache paths below a base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a layout rooted at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Root directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory for a named subdirectory.
    pub fn directory(&self, subdirectory: &str) -> PathBuf {
        self.base_dir.join(subdirectory)
    }

    /// File below a named subdirectory.
    pub fn file(&self, subdirectory: &str, relative: impl AsRef<Path>) -> PathBuf {
        self.directory(subdirectory).join(relative)
    }

    /// Directory holding validated packages.
    pub fn packages_dir(&self) -> PathBuf {
        self.directory(PACKAGES_SUBDIR)
    }

    /// Content path for a package storage name.
    pub fn package_file(&self, storage_name: &str) -> PathBuf {
        self.file(PACKAGES_SUBDIR, storage_name)
    }

    /// Path below `subdirectory` mirroring the URL's host and path.
    ///
    /// Pure; performs no I/O. `http://cdn.example.com/a/b.xz` under
    /// `incoming` maps to `base/incoming/cdn.example.com/a/b.xz`.
    pub fn url_path(&self, remote: &Url, subdirectory: &str) -> PathBuf {
        let mut path = self.directory(subdirectory);
        if let Some(host) = remote.host_str() {
            path.push(host);
        }
        if let Some(segments) = remote.path_segments() {
            for segment in segments.filter(|s| !s.is_empty() && *s != "..") {
                path.push(segment);
            }
        }
        path
    }

    /// Create a subdirectory if needed.
    pub fn ensure_directory(&self, subdirectory: &str) -> SyncResult<PathBuf> {
        let dir = self.directory(subdirectory);
        ensure_dir(&dir)?;
        Ok(dir)
    }
}

/// Create a directory and its parents.
pub(crate) fn ensure_dir(dir: &Path) -> SyncResult<()> {
    fs::create_dir_all(dir).map_err(|e| SyncError::CreateDirFailed {
        path: dir.to_path_buf(),
        source: e,
    })
}

/// Move `from` onto `to`, replacing any existing file.
///
/// Parent directories of `to` are created first.
pub(crate) fn replace_file(from: &Path, to: &Path) -> SyncResult<()> {
    if let Some(parent) = to.parent() {
        ensure_dir(parent)?;
    }
    if to.exists() {
        fs::remove_file(to).map_err(|e| SyncError::DeleteFailed {
            path: to.to_path_buf(),
            source: e,
        })?;
    }
    fs::rename(from, to).map_err(|e| SyncError::MoveFailed {
        from: from.to_path_buf(),
        path: to.to_path_buf(),
        source: e,
    })
}
