//! End-of-run summary.

use std::fmt;
use std::time::Duration;

use super::state::SyncState;
use crate::error::{ErrorKind, SyncError};
use crate::package::PackageDescriptor;

/// A package that could not be stored intact during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedPackage {
    /// Digest of the package.
    pub hash_digest: String,
    /// Remote file name of the package.
    pub file_name: String,
    /// Error class.
    pub kind: ErrorKind,
    /// Error text.
    pub reason: String,
}

impl FailedPackage {
    pub(crate) fn new(descriptor: &PackageDescriptor, error: &SyncError) -> Self {
        Self {
            hash_digest: descriptor.hash_digest.clone(),
            file_name: descriptor.remote_file_name(),
            kind: error.kind(),
            reason: error.to_string(),
        }
    }
}

/// Outcome of one synchronization run.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    /// Id of the run's [`RunToken`](super::RunToken).
    pub run_id: u64,
    /// Terminal state.
    pub state: SyncState,
    /// Packages handled (valid, downloaded or failed).
    pub processed: usize,
    /// Packages listed by the index.
    pub total: usize,
    /// Combined size of the packages stored intact.
    pub total_bytes: u64,
    /// Obsolete local files deleted by the sweep.
    pub deleted: usize,
    /// Packages downloaded this run.
    pub downloaded: usize,
    /// Packages skipped after a failure.
    pub failed: Vec<FailedPackage>,
    /// Error text for a failed run.
    pub error: Option<String>,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl SyncReport {
    pub(crate) fn new(run_id: u64) -> Self {
        Self {
            run_id,
            state: SyncState::Init,
            processed: 0,
            total: 0,
            total_bytes: 0,
            deleted: 0,
            downloaded: 0,
            failed: Vec::new(),
            error: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Whether the run finished with every package stored intact.
    pub fn is_success(&self) -> bool {
        self.state == SyncState::Done && self.failed.is_empty()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state {
            SyncState::Done => {
                write!(
                    f,
                    "Synchronized {} packages ({} bytes): {} downloaded, {} obsolete removed",
                    self.processed, self.total_bytes, self.downloaded, self.deleted
                )?;
                if !self.failed.is_empty() {
                    write!(f, ", {} failed", self.failed.len())?;
                }
                Ok(())
            }
            SyncState::Cancelled => write!(
                f,
                "Synchronization cancelled after {} of {} packages",
                self.processed, self.total
            ),
            SyncState::Failed => write!(
                f,
                "Synchronization failed: {}",
                self.error.as_deref().unwrap_or("unknown error")
            ),
            other => write!(f, "Synchronization {}", other),
        }
    }
}
