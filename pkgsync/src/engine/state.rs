//! Run state machine.
//!
//! ```text
//! Init → ListingLocal → FetchingIndex → Processing(0..n) → Sweeping → Done
//!                                   │              │
//!                                   └──────────────┴──→ Cancelled | Failed
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Stage of a synchronization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// Counters reset, nothing done yet.
    #[default]
    Init,
    /// Snapshotting the local content directory.
    ListingLocal,
    /// Retrieving the remote index.
    FetchingIndex,
    /// Handling package `current` of `total`.
    Processing { current: usize, total: usize },
    /// Deleting unconfirmed local files.
    Sweeping,
    /// Finished successfully.
    Done,
    /// Stopped by a cancellation request.
    Cancelled,
    /// Stopped by an error.
    Failed,
}

impl SyncState {
    /// Whether the run has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => f.write_str("init"),
            Self::ListingLocal => f.write_str("listing local packages"),
            Self::FetchingIndex => f.write_str("fetching index"),
            Self::Processing { current, total } => {
                write!(f, "processing {}/{}", current, total)
            }
            Self::Sweeping => f.write_str("sweeping"),
            Self::Done => f.write_str("done"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Run state shared between the worker and the caller's handle.
pub type SharedState = Arc<Mutex<SyncState>>;
