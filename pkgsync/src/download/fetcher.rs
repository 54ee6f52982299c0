//! Package transfer strategies used by the synchronization engine.
//!
//! The engine downloads one package at a time through a [`PackageFetcher`]:
//!
//! - [`DirectFetcher`] streams the package through a [`Transport`] on the
//!   engine's worker thread.
//! - [`OrchestratedFetcher`] hands the transfer to the external download
//!   subsystem and waits for its completion notification.
//!
//! Both write to a temporary location first and move the finished file onto
//! the destination, so a failed transfer never leaves a partial package at
//! the content path.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::job::{ActionTag, DownloadJob};
use super::orchestrator::DownloadOrchestrator;
use super::subsystem::{CompletionReceiver, DownloadSubsystem};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::storage::{self, StorageLayout, DOWNLOADING_SUBDIR, INCOMING_SUBDIR};
use crate::transport::Transport;

/// Buffer size for reading/writing during downloads (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Default interval between completion channel polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default time to wait for an orchestrated transfer to complete.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Downloads one package to a destination path.
pub trait PackageFetcher: Send + Sync {
    /// Download `url` to `dest`, replacing any existing file.
    ///
    /// # Returns
    ///
    /// The number of bytes stored at `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] if `cancel` fires while the fetcher is
    /// waiting, or the transfer/filesystem error that stopped the download.
    fn fetch(&self, url: &Url, dest: &Path, cancel: &CancellationToken) -> SyncResult<u64>;
}

/// Fetches packages synchronously through a transport.
pub struct DirectFetcher {
    transport: Arc<dyn Transport>,
    layout: StorageLayout,
}

impl DirectFetcher {
    /// Create a fetcher staging transfers below `layout`.
    pub fn new(transport: Arc<dyn Transport>, layout: StorageLayout) -> Self {
        Self { transport, layout }
    }

    fn part_path(&self, dest: &Path) -> PathBuf {
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "package".to_string());
        self.layout
            .file(DOWNLOADING_SUBDIR, format!("{}.part", name))
    }

    fn stream_to(
        &self,
        url: &Url,
        part: &Path,
        cancel: &CancellationToken,
    ) -> SyncResult<u64> {
        let mut response = self.transport.open(url)?;

        let file = File::create(part).map_err(|e| SyncError::WriteFailed {
            path: part.to_path_buf(),
            source: e,
        })?;
        let mut writer = BufWriter::new(file);
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut downloaded = 0u64;

        loop {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let bytes_read = response
                .read(&mut buffer)
                .map_err(|e| SyncError::Network {
                    url: url.to_string(),
                    reason: format!("Read error: {}", e),
                })?;

            if bytes_read == 0 {
                break;
            }

            writer
                .write_all(&buffer[..bytes_read])
                .map_err(|e| SyncError::WriteFailed {
                    path: part.to_path_buf(),
                    source: e,
                })?;

            downloaded += bytes_read as u64;
        }

        writer.flush().map_err(|e| SyncError::WriteFailed {
            path: part.to_path_buf(),
            source: e,
        })?;

        Ok(downloaded)
    }
}

impl PackageFetcher for DirectFetcher {
    fn fetch(&self, url: &Url, dest: &Path, cancel: &CancellationToken) -> SyncResult<u64> {
        self.layout.ensure_directory(DOWNLOADING_SUBDIR)?;
        let part = self.part_path(dest);

        let downloaded = match self.stream_to(url, &part, cancel) {
            Ok(bytes) => bytes,
            Err(e) => {
                fs::remove_file(&part).ok();
                return Err(e);
            }
        };

        storage::replace_file(&part, dest)?;
        debug!(url = %url, bytes = downloaded, "Package downloaded");
        Ok(downloaded)
    }
}

/// Fetches packages through the external download subsystem.
///
/// Completion notifications for jobs other than the awaited one are still
/// handed to the orchestrator (which finalizes and discards them).
pub struct OrchestratedFetcher<S: DownloadSubsystem> {
    orchestrator: DownloadOrchestrator<S>,
    completions: Mutex<CompletionReceiver>,
    next_action: AtomicU32,
    poll_interval: Duration,
    timeout: Duration,
}

impl<S: DownloadSubsystem> OrchestratedFetcher<S> {
    /// Create a fetcher over an orchestrator and its completion channel.
    pub fn new(orchestrator: DownloadOrchestrator<S>, completions: CompletionReceiver) -> Self {
        Self {
            orchestrator,
            completions: Mutex::new(completions),
            next_action: AtomicU32::new(0),
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }

    /// Create a fetcher with the polling interval and download timeout of
    /// `config`.
    pub fn from_config(
        orchestrator: DownloadOrchestrator<S>,
        completions: CompletionReceiver,
        config: &SyncConfig,
    ) -> Self {
        Self::new(orchestrator, completions)
            .with_poll_interval(config.poll_interval)
            .with_timeout(config.download_timeout)
    }

    /// Set the completion polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set how long to wait for one transfer.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The underlying orchestrator.
    pub fn orchestrator(&self) -> &DownloadOrchestrator<S> {
        &self.orchestrator
    }

    fn wait_for(
        &self,
        url: &Url,
        awaited: u64,
        cancel: &CancellationToken,
    ) -> SyncResult<DownloadJob> {
        let deadline = Instant::now() + self.timeout;

        loop {
            let next = self.completions.lock().try_recv();
            match next {
                Ok(job_id) => match self.orchestrator.on_complete(job_id) {
                    Some(job) if job.job_id == awaited => return Ok(job),
                    Some(job) => debug!(job_id = job.job_id, "Discarding unrelated completion"),
                    None => {}
                },
                Err(TryRecvError::Empty) => {
                    if cancel.is_cancelled() {
                        self.orchestrator.abandon(awaited);
                        return Err(SyncError::Cancelled);
                    }
                    if Instant::now() >= deadline {
                        self.orchestrator.abandon(awaited);
                        return Err(SyncError::Timeout {
                            url: url.to_string(),
                            timeout_secs: self.timeout.as_secs(),
                        });
                    }
                    thread::sleep(self.poll_interval);
                }
                Err(TryRecvError::Disconnected) => {
                    self.orchestrator.abandon(awaited);
                    return Err(SyncError::Network {
                        url: url.to_string(),
                        reason: "download subsystem stopped sending completions".to_string(),
                    });
                }
            }
        }
    }
}

impl<S: DownloadSubsystem> PackageFetcher for OrchestratedFetcher<S> {
    fn fetch(&self, url: &Url, dest: &Path, cancel: &CancellationToken) -> SyncResult<u64> {
        let action = ActionTag(self.next_action.fetch_add(1, Ordering::SeqCst));
        let job_id = self
            .orchestrator
            .queue(url.as_str(), INCOMING_SUBDIR, action)?;

        let job = self.wait_for(url, job_id, cancel)?;
        if !job.is_success() {
            return Err(SyncError::Network {
                url: url.to_string(),
                reason: format!("download job {} did not complete", job_id),
            });
        }

        let relocated = self.orchestrator.final_path(&job.remote, INCOMING_SUBDIR);
        let size = relocated
            .metadata()
            .map_err(|e| SyncError::ReadFailed {
                path: relocated.clone(),
                source: e,
            })?
            .len();
        storage::replace_file(&relocated, dest)?;
        Ok(size)
    }
}
