//! Package downloads.
//!
//! This module provides:
//! - The contract of the external asynchronous download subsystem (`subsystem`)
//! - Per-job tracking (`job`)
//! - The orchestrator bridging the engine to the subsystem (`orchestrator`)
//! - The fetchers the engine downloads packages through (`fetcher`)
//!
//! # Architecture
//!
//! ```text
//! SyncEngine
//!     │
//!     └── PackageFetcher (trait)
//!             ├── DirectFetcher ──── Transport (blocking stream)
//!             │
//!             └── OrchestratedFetcher
//!                     │
//!                     └── DownloadOrchestrator
//!                             │
//!                             ├── DownloadJob (one per job id)
//!                             │
//!                             └── DownloadSubsystem (trait, host supplied)
//!                                     └── completion channel (JobId)
//! ```

#[cfg(test)]
pub(crate) mod fake;
mod fetcher;
mod job;
mod orchestrator;
mod subsystem;

pub use fetcher::{
    DirectFetcher, OrchestratedFetcher, PackageFetcher, DEFAULT_DOWNLOAD_TIMEOUT,
    DEFAULT_POLL_INTERVAL,
};
pub use job::{ActionTag, DownloadJob, JobOutcome};
pub use orchestrator::DownloadOrchestrator;
pub use subsystem::{
    completion_channel, CompletionReceiver, CompletionSender, DownloadSubsystem, JobId, JobInfo,
    JobStatus, TransferRequest,
};
