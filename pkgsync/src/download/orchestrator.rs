//! Bridge between the engine and the external download subsystem.
//!
//! The orchestrator queues transfers, tracks one [`DownloadJob`] per job id,
//! and finalizes a job when its completion notification arrives: successful
//! output is moved from the subsystem's temporary location to a deterministic
//! final path derived from the remote URL.
//!
//! # Sole-owner cleanup
//!
//! After handling any completion notification the orchestrator removes
//! *every* job the subsystem knows about, not only the ones it tracks. The
//! subsystem is assumed to be dedicated to this crate; jobs queued on the same
//! subsystem by other consumers are removed as well.

use std::collections::HashMap;
use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use url::Url;

use super::job::{ActionTag, DownloadJob};
use super::subsystem::{DownloadSubsystem, JobId, JobInfo, JobStatus, TransferRequest};
use crate::error::{SyncError, SyncResult};
use crate::storage::{self, StorageLayout, DOWNLOADING_SUBDIR};

/// Download orchestrator over a subsystem `S`.
pub struct DownloadOrchestrator<S: DownloadSubsystem> {
    subsystem: S,
    layout: StorageLayout,
    jobs: Mutex<HashMap<JobId, DownloadJob>>,
}

impl<S: DownloadSubsystem> DownloadOrchestrator<S> {
    /// Create an orchestrator writing below `layout`.
    pub fn new(subsystem: S, layout: StorageLayout) -> Self {
        Self {
            subsystem,
            layout,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// The wrapped subsystem.
    pub fn subsystem(&self) -> &S {
        &self.subsystem
    }

    /// Number of tracked jobs.
    pub fn tracked_count(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Whether a job id is tracked.
    pub fn is_tracked(&self, job_id: JobId) -> bool {
        self.jobs.lock().contains_key(&job_id)
    }

    /// Final location for a remote resource under `subdirectory`.
    ///
    /// Pure; performs no I/O.
    pub fn final_path(&self, remote: &Url, subdirectory: &str) -> PathBuf {
        self.layout.url_path(remote, subdirectory)
    }

    /// Queue a transfer.
    ///
    /// Returns as soon as the subsystem accepted the request. A job id that
    /// is already tracked is kept as is and reported with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidRequest`] if the subdirectory is blank or
    /// the URL has no file path, and [`SyncError::InvalidUrl`] if it does not
    /// parse.
    pub fn queue(
        &self,
        remote: &str,
        target_subdirectory: &str,
        action: ActionTag,
    ) -> SyncResult<JobId> {
        let target_subdirectory = target_subdirectory.trim();
        if target_subdirectory.is_empty() {
            return Err(SyncError::InvalidRequest(
                "target subdirectory cannot be empty".to_string(),
            ));
        }

        let remote = Url::parse(remote.trim()).map_err(|e| SyncError::InvalidUrl {
            url: remote.to_string(),
            reason: e.to_string(),
        })?;
        let path = remote.path();
        if path.is_empty() || path.ends_with('/') {
            return Err(SyncError::InvalidRequest(format!(
                "URL path must include a file name: {}",
                remote
            )));
        }

        let request = TransferRequest {
            destination: self.layout.url_path(&remote, DOWNLOADING_SUBDIR),
            remote: remote.clone(),
        };
        debug!(destination = %request.destination.display(), "Queueing transfer");

        let mut jobs = self.jobs.lock();
        let job_id = self.subsystem.enqueue(request)?;
        if jobs.contains_key(&job_id) {
            warn!(job_id, "Download already running under this id");
        } else {
            info!(job_id, url = %remote, "Downloading");
            jobs.insert(
                job_id,
                DownloadJob::new(remote, target_subdirectory, action, job_id),
            );
        }
        Ok(job_id)
    }

    /// Handle one completion notification.
    ///
    /// Returns the finalized job, or `None` for an id this orchestrator does
    /// not track. The job is dropped from tracking in every case, and all
    /// subsystem jobs are purged afterwards (see the module docs).
    pub fn on_complete(&self, job_id: JobId) -> Option<DownloadJob> {
        let tracked = self.jobs.lock().remove(&job_id);

        let finalized = match tracked {
            None => {
                warn!(job_id, "Unknown download id, ignoring");
                None
            }
            Some(mut job) => {
                self.finalize(&mut job);
                Some(job)
            }
        };

        self.subsystem.remove(job_id);
        self.purge_all();
        finalized
    }

    /// Stop tracking a job that will not be waited for any more.
    ///
    /// The job is removed from the subsystem as well; a late completion
    /// notification for it is then handled as an unknown id.
    pub fn abandon(&self, job_id: JobId) -> Option<DownloadJob> {
        let job = self.jobs.lock().remove(&job_id);
        self.subsystem.remove(job_id);
        if job.is_some() {
            warn!(job_id, "Download abandoned");
        }
        job
    }

    fn finalize(&self, job: &mut DownloadJob) {
        let Some(info) = self.subsystem.query(job.job_id) else {
            error!(job_id = job.job_id, "No download found for id in subsystem");
            job.record_failure();
            return;
        };

        match info.status {
            JobStatus::Successful => match self.relocate(job, info) {
                Ok(dst) => {
                    info!(job_id = job.job_id, path = %dst.display(), "Download stored");
                    job.record_success();
                }
                Err(e) => {
                    error!(job_id = job.job_id, error = %e, "Moving download failed");
                    job.record_failure();
                }
            },
            JobStatus::Failed => {
                error!(job_id = job.job_id, url = %job.remote, "Download failed");
                job.record_failure();
            }
            JobStatus::Paused => {
                warn!(job_id = job.job_id, "Download paused");
                job.record_failure();
            }
            JobStatus::Pending | JobStatus::Running => {
                info!(job_id = job.job_id, status = %info.status, "Download not finished");
                job.record_failure();
            }
        }
    }

    fn relocate(&self, job: &DownloadJob, info: JobInfo) -> SyncResult<PathBuf> {
        let src = info.local_path.ok_or_else(|| {
            SyncError::InvalidRequest(format!(
                "subsystem reported no output for job {}",
                job.job_id
            ))
        })?;
        let dst = self.final_path(&job.remote, &job.target_subdirectory);
        storage::replace_file(&src, &dst)?;
        Ok(dst)
    }

    fn purge_all(&self) -> usize {
        let ids = self.subsystem.job_ids();
        for id in &ids {
            self.subsystem.remove(*id);
        }
        if !ids.is_empty() {
            info!(count = ids.len(), "Downloads cleaned up");
        }
        ids.len()
    }
}
