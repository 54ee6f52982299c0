//! Tracked download jobs.
//!
//! A [`DownloadJob`] is created when a transfer is queued, updated once when
//! its completion notification arrives, and then dropped from tracking
//! whatever the outcome.

use url::Url;

use super::subsystem::JobId;

/// Caller-supplied tag echoed back with a finished job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ActionTag(pub u32);

/// Outcome of a tracked job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobOutcome {
    /// No completion notification handled yet.
    #[default]
    Pending,
    /// Transfer finished and the output was moved to its final path.
    Succeeded,
    /// Transfer or relocation failed.
    Failed,
}

/// State of one in-flight transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    /// Remote resource.
    pub remote: Url,
    /// Subdirectory of the storage layout receiving the final file.
    pub target_subdirectory: String,
    /// Caller tag.
    pub action: ActionTag,
    /// Identifier issued by the subsystem.
    pub job_id: JobId,
    /// Outcome once finalized.
    pub outcome: JobOutcome,
}

impl DownloadJob {
    /// Create a pending job.
    pub fn new(
        remote: Url,
        target_subdirectory: impl Into<String>,
        action: ActionTag,
        job_id: JobId,
    ) -> Self {
        Self {
            remote,
            target_subdirectory: target_subdirectory.into(),
            action,
            job_id,
            outcome: JobOutcome::Pending,
        }
    }

    /// Whether the job finished successfully.
    pub fn is_success(&self) -> bool {
        self.outcome == JobOutcome::Succeeded
    }

    /// Record a successful relocation.
    pub fn record_success(&mut self) {
        self.outcome = JobOutcome::Succeeded;
    }

    /// Record a failure.
    pub fn record_failure(&mut self) {
        self.outcome = JobOutcome::Failed;
    }
}
