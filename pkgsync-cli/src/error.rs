//! CLI error types.

use pkgsync::SyncError;
use thiserror::Error;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Missing or invalid configuration.
    #[error("{0}")]
    Config(String),

    /// Library failure.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// The run ended in the failed state.
    #[error("synchronization failed: {0}")]
    SyncFailed(String),

    /// The run finished but some packages could not be stored.
    #[error("{0} package(s) failed to synchronize")]
    SyncIncomplete(usize),

    /// The run was cancelled.
    #[error("synchronization cancelled")]
    Cancelled,

    /// Verification found problems.
    #[error("{0} package(s) missing or corrupt")]
    VerifyFailed(usize),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 2,
            CliError::Sync(SyncError::InvalidConfig(_)) => 2,
            CliError::Cancelled => 130,
            _ => 1,
        }
    }
}
