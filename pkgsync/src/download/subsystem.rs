//! Contract of the external asynchronous download subsystem.
//!
//! The subsystem is owned by the host platform; this crate only queues
//! requests, queries status and removes finished jobs. Completion is pushed
//! as a [`JobId`] on a channel the host wires up when constructing its
//! subsystem (see [`completion_channel`]), one push per job, in no particular
//! order relative to other jobs.

use std::fmt;
use std::path::PathBuf;

use tokio::sync::mpsc;
use url::Url;

use crate::error::SyncResult;

/// Identifier issued by the subsystem for a queued transfer.
pub type JobId = u64;

/// Sender half of the completion notification channel.
pub type CompletionSender = mpsc::UnboundedSender<JobId>;

/// Receiver half of the completion notification channel.
pub type CompletionReceiver = mpsc::UnboundedReceiver<JobId>;

/// Create a completion notification channel.
pub fn completion_channel() -> (CompletionSender, CompletionReceiver) {
    mpsc::unbounded_channel()
}

/// Transfer status as reported by the subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Failed,
    Paused,
    Pending,
    Running,
    Successful,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Failed => "failed",
            Self::Paused => "paused",
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Successful => "successful",
        };
        f.write_str(name)
    }
}

/// A transfer request handed to the subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Remote resource to fetch.
    pub remote: Url,
    /// Where the subsystem should write the transfer output.
    pub destination: PathBuf,
}

/// Status snapshot for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    /// Current status.
    pub status: JobStatus,
    /// Location of the transfer output, once known.
    pub local_path: Option<PathBuf>,
}

/// External asynchronous download subsystem.
pub trait DownloadSubsystem: Send + Sync {
    /// Submit a transfer and return immediately with its job id.
    fn enqueue(&self, request: TransferRequest) -> SyncResult<JobId>;

    /// Query a job; `None` if the subsystem does not know the id.
    fn query(&self, job_id: JobId) -> Option<JobInfo>;

    /// Forget a job, cancelling it if still in flight.
    fn remove(&self, job_id: JobId);

    /// Every job currently known to the subsystem, from any consumer.
    fn job_ids(&self) -> Vec<JobId>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_display() {
        assert_eq!(JobStatus::Successful.to_string(), "successful");
        assert_eq!(JobStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_completion_channel_preserves_order() {
        let (tx, mut rx) = completion_channel();
        tx.send(3).unwrap();
        tx.send(1).unwrap();
        assert_eq!(rx.try_recv().unwrap(), 3);
        assert_eq!(rx.try_recv().unwrap(), 1);
        assert!(rx.try_recv().is_err());
    }
}
