//! Error types for package synchronization.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Coarse classification of a [`SyncError`].
///
/// Callers use this to decide whether a failure aborts the whole run or only
/// the current package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transfer failure or timeout.
    Network,
    /// Malformed or truncated compressed payload.
    Decompression,
    /// Malformed index content.
    Parse,
    /// Digest mismatch after a download.
    PackageIntegrity,
    /// Directory, move, read, write or delete failure.
    Filesystem,
    /// Everything else (configuration, caller misuse, store failures).
    Other,
}

/// Errors that can occur while synchronizing the package cache.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transfer failed.
    #[error("failed to download {url}: {reason}")]
    Network { url: String, reason: String },

    /// Transfer timed out.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// Compressed payload could not be fully decoded.
    #[error("decompression failed: {0}")]
    Decompression(String),

    /// Index content is not a well-formed package list.
    #[error("failed to parse index from {url}: {reason}")]
    Parse { url: String, reason: String },

    /// Downloaded package does not match its expected digest.
    #[error("checksum mismatch for {file}: expected {expected}, got {actual}")]
    PackageIntegrity {
        file: String,
        expected: String,
        actual: String,
    },

    /// Failed to read a file or directory.
    #[error("failed to read {}: {source}", path.display())]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file.
    #[error("failed to write {}: {source}", path.display())]
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to create a directory.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// Failed to delete a file.
    #[error("failed to delete {}: {source}", path.display())]
    DeleteFailed { path: PathBuf, source: io::Error },

    /// Failed to move a file into place.
    #[error("failed to move {} to {}: {source}", from.display(), path.display())]
    MoveFailed {
        from: PathBuf,
        path: PathBuf,
        source: io::Error,
    },

    /// URL could not be parsed or resolved.
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Download request rejected before submission.
    #[error("invalid download request: {0}")]
    InvalidRequest(String),

    /// Metadata store failure.
    #[error("metadata store error: {0}")]
    Store(String),

    /// A synchronization run is already active.
    #[error("a synchronization run is already active")]
    AlreadyRunning,

    /// Token does not belong to the active run.
    #[error("run {0} is not the active synchronization run")]
    UnknownRun(u64),

    /// Operation stopped because cancellation was requested.
    #[error("operation cancelled")]
    Cancelled,

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The background worker thread could not be started.
    #[error("failed to start synchronization worker: {0}")]
    WorkerSpawn(#[source] io::Error),

    /// A collaborator panicked while the run was in progress.
    #[error("synchronization worker panicked: {0}")]
    Panicked(String),
}

impl SyncError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => ErrorKind::Network,
            Self::Decompression(_) => ErrorKind::Decompression,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::PackageIntegrity { .. } => ErrorKind::PackageIntegrity,
            Self::ReadFailed { .. }
            | Self::WriteFailed { .. }
            | Self::CreateDirFailed { .. }
            | Self::DeleteFailed { .. }
            | Self::MoveFailed { .. } => ErrorKind::Filesystem,
            _ => ErrorKind::Other,
        }
    }

    /// Whether a failure on one package may be skipped under
    /// [`FailurePolicy::SkipAndContinue`](crate::config::FailurePolicy).
    pub fn is_package_scoped(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Network | ErrorKind::PackageIntegrity | ErrorKind::Filesystem
        )
    }
}
