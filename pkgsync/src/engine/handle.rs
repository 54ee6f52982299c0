//! Caller-side view of a started run.

use std::thread::JoinHandle;

use tokio::sync::mpsc::error::TryRecvError;
use tokio_util::sync::CancellationToken;

use super::progress::{EventReceiver, SyncEvent};
use super::report::SyncReport;
use super::state::{SharedState, SyncState};

/// Identifies one run; required to cancel it.
#[derive(Debug, Clone)]
pub struct RunToken {
    id: u64,
    cancellation: CancellationToken,
}

impl RunToken {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            cancellation: CancellationToken::new(),
        }
    }

    /// Run id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether cancellation has been requested for this run.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub(crate) fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}

impl PartialEq for RunToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RunToken {}

/// Handle to a running synchronization.
///
/// Events arrive in the order the engine produced them; the channel closes
/// after the terminal event.
pub struct SyncHandle {
    token: RunToken,
    events: EventReceiver,
    state: SharedState,
    worker: JoinHandle<SyncReport>,
}

impl SyncHandle {
    pub(crate) fn new(
        token: RunToken,
        events: EventReceiver,
        state: SharedState,
        worker: JoinHandle<SyncReport>,
    ) -> Self {
        Self {
            token,
            events,
            state,
            worker,
        }
    }

    /// Token of this run.
    pub fn token(&self) -> &RunToken {
        &self.token
    }

    /// Current stage of the run.
    pub fn state(&self) -> SyncState {
        *self.state.lock()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&mut self) -> Result<SyncEvent, TryRecvError> {
        self.events.try_recv()
    }

    /// Wait for the next event; `None` once the run has ended and every
    /// event was received.
    pub async fn next_event(&mut self) -> Option<SyncEvent> {
        self.events.recv().await
    }

    /// Blocking variant of [`next_event`](Self::next_event).
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn blocking_next_event(&mut self) -> Option<SyncEvent> {
        self.events.blocking_recv()
    }

    /// Whether the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Wait for the run to end and return its report.
    ///
    /// Panics inside the run already end it as [`SyncState::Failed`]. A
    /// worker that panicked afterwards, in the finished callback, also
    /// yields a `Failed` report here.
    pub fn join(self) -> SyncReport {
        let run_id = self.token.id;
        self.worker.join().unwrap_or_else(|_| {
            let mut report = SyncReport::new(run_id);
            report.state = SyncState::Failed;
            report.error = Some("synchronization worker panicked".to_string());
            report
        })
    }
}
