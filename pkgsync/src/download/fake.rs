//! In-process download subsystem for unit tests.

use std::collections::{HashMap, HashSet};
use std::fs;

use parking_lot::Mutex;

use super::subsystem::{
    CompletionSender, DownloadSubsystem, JobId, JobInfo, JobStatus, TransferRequest,
};
use crate::error::SyncResult;

#[derive(Default)]
struct State {
    next_id: JobId,
    reuse_id: bool,
    jobs: HashMap<JobId, (Option<TransferRequest>, JobInfo)>,
    removed: HashSet<JobId>,
}

/// Subsystem whose jobs complete only when a test says so.
#[derive(Default)]
pub(crate) struct FakeSubsystem {
    state: Mutex<State>,
    notifier: Option<CompletionSender>,
}

impl FakeSubsystem {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_notifier(notifier: CompletionSender) -> Self {
        Self {
            state: Mutex::default(),
            notifier: Some(notifier),
        }
    }

    pub(crate) fn request(&self, job_id: JobId) -> Option<TransferRequest> {
        self.state
            .lock()
            .jobs
            .get(&job_id)
            .and_then(|(r, _)| r.clone())
    }

    /// Make the next enqueue return the same id as the previous one.
    pub(crate) fn reuse_next_id(&self) {
        self.state.lock().reuse_id = true;
    }

    /// Register a job queued by some other consumer.
    pub(crate) fn insert_foreign_job(&self) -> JobId {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.jobs.insert(
            id,
            (
                None,
                JobInfo {
                    status: JobStatus::Running,
                    local_path: None,
                },
            ),
        );
        id
    }

    pub(crate) fn was_removed(&self, job_id: JobId) -> bool {
        self.state.lock().removed.contains(&job_id)
    }

    /// Complete a job, writing `output` to its destination when given.
    pub(crate) fn finish(&self, job_id: JobId, status: JobStatus, output: Option<&[u8]>) {
        {
            let mut state = self.state.lock();
            if let Some((request, info)) = state.jobs.get_mut(&job_id) {
                info.status = status;
                if let Some(request) = request {
                    if let Some(bytes) = output {
                        if let Some(parent) = request.destination.parent() {
                            fs::create_dir_all(parent).unwrap();
                        }
                        fs::write(&request.destination, bytes).unwrap();
                    }
                    if status == JobStatus::Successful {
                        info.local_path = Some(request.destination.clone());
                    }
                }
            }
        }
        if let Some(notifier) = &self.notifier {
            let _ = notifier.send(job_id);
        }
    }
}

impl DownloadSubsystem for FakeSubsystem {
    fn enqueue(&self, request: TransferRequest) -> SyncResult<JobId> {
        let mut state = self.state.lock();
        if !state.reuse_id || state.next_id == 0 {
            state.next_id += 1;
        }
        let id = state.next_id;
        state.jobs.entry(id).or_insert((
            Some(request),
            JobInfo {
                status: JobStatus::Pending,
                local_path: None,
            },
        ));
        Ok(id)
    }

    fn query(&self, job_id: JobId) -> Option<JobInfo> {
        self.state.lock().jobs.get(&job_id).map(|(_, i)| i.clone())
    }

    fn remove(&self, job_id: JobId) {
        let mut state = self.state.lock();
        if state.jobs.remove(&job_id).is_some() {
            state.removed.insert(job_id);
        }
    }

    fn job_ids(&self) -> Vec<JobId> {
        self.state.lock().jobs.keys().copied().collect()
    }
}
