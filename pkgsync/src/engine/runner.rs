//! The synchronization engine and its worker.

use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::handle::{RunToken, SyncHandle};
use super::progress::{event_channel, ProgressPublisher};
use super::report::{FailedPackage, SyncReport};
use super::state::{SharedState, SyncState};
use crate::checksum::{self, DigestAlgorithm};
use crate::config::{FailurePolicy, SyncConfig};
use crate::download::{
    CompletionReceiver, DirectFetcher, DownloadOrchestrator, DownloadSubsystem,
    OrchestratedFetcher, PackageFetcher,
};
use crate::error::{SyncError, SyncResult};
use crate::index::{IndexFetcher, PackageIndex};
use crate::package::{PackageDescriptor, PackageRecord};
use crate::reconcile::LocalFileSet;
use crate::storage::{StorageLayout, PACKAGES_SUBDIR};
use crate::store::PackageStore;
use crate::transport::{HttpTransport, Transport};

type ActiveSlot = Arc<Mutex<Option<RunToken>>>;

/// Keeps a package cache in sync with a remote index.
///
/// At most one run is active at a time. [`start`](Self::start) spawns the
/// run on a dedicated worker thread and returns immediately.
pub struct SyncEngine {
    config: SyncConfig,
    store: Arc<dyn PackageStore>,
    transport: Arc<dyn Transport>,
    fetcher: Arc<dyn PackageFetcher>,
    active: ActiveSlot,
    next_run_id: AtomicU64,
}

impl SyncEngine {
    /// Create an engine from its collaborators.
    pub fn new(
        config: SyncConfig,
        store: Arc<dyn PackageStore>,
        transport: Arc<dyn Transport>,
        fetcher: Arc<dyn PackageFetcher>,
    ) -> Self {
        Self {
            config,
            store,
            transport,
            fetcher,
            active: Arc::new(Mutex::new(None)),
            next_run_id: AtomicU64::new(1),
        }
    }

    /// Create an engine downloading everything over HTTP on its worker.
    pub fn with_http(config: SyncConfig, store: Arc<dyn PackageStore>) -> SyncResult<Self> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::with_timeout(config.timeout)?);
        let fetcher = Arc::new(DirectFetcher::new(Arc::clone(&transport), config.layout()));
        Ok(Self::new(config, store, transport, fetcher))
    }

    /// Create an engine handing package transfers to `subsystem`.
    ///
    /// The index is still fetched through `transport`. Completion polling and
    /// the per-download timeout come from `config`.
    pub fn orchestrated<S: DownloadSubsystem + 'static>(
        config: SyncConfig,
        store: Arc<dyn PackageStore>,
        transport: Arc<dyn Transport>,
        subsystem: S,
        completions: CompletionReceiver,
    ) -> Self {
        let orchestrator = DownloadOrchestrator::new(subsystem, config.layout());
        let fetcher = OrchestratedFetcher::from_config(orchestrator, completions, &config);
        Self::new(config, store, transport, Arc::new(fetcher))
    }

    /// Create an engine fetching the index over HTTP and packages through
    /// `subsystem`.
    pub fn with_subsystem<S: DownloadSubsystem + 'static>(
        config: SyncConfig,
        store: Arc<dyn PackageStore>,
        subsystem: S,
        completions: CompletionReceiver,
    ) -> SyncResult<Self> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::with_timeout(config.timeout)?);
        Ok(Self::orchestrated(config, store, transport, subsystem, completions))
    }

    /// Engine configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Token of the active run, if any.
    pub fn active_run(&self) -> Option<RunToken> {
        self.active.lock().clone()
    }

    /// Whether a run is active.
    pub fn is_running(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Start a run against the index at `index_url`.
    ///
    /// `on_finished` is called exactly once, on the worker thread, after the
    /// run's terminal event was published. The single-run guard is already
    /// released at that point, so the callback may start the next run.
    /// A panic in the store, transport or fetcher ends the run as
    /// [`SyncState::Failed`] and is reported the same way.
    ///
    /// # Errors
    ///
    /// - [`SyncError::InvalidUrl`] if `index_url` does not parse
    /// - [`SyncError::AlreadyRunning`] while another run is active
    /// - [`SyncError::WorkerSpawn`] if the worker thread cannot be created
    pub fn start<F>(&self, index_url: &str, on_finished: F) -> SyncResult<SyncHandle>
    where
        F: FnOnce(&SyncReport) + Send + 'static,
    {
        let index_url = Url::parse(index_url.trim()).map_err(|e| SyncError::InvalidUrl {
            url: index_url.to_string(),
            reason: e.to_string(),
        })?;

        let token = {
            let mut active = self.active.lock();
            if let Some(running) = active.as_ref() {
                warn!(run_id = running.id(), "Synchronization already running");
                return Err(SyncError::AlreadyRunning);
            }
            let token = RunToken::new(self.next_run_id.fetch_add(1, Ordering::SeqCst));
            *active = Some(token.clone());
            token
        };
        let run_id = token.id();

        let (sender, receiver) = event_channel();
        let state: SharedState = Arc::new(Mutex::new(SyncState::Init));

        let run = SyncRun {
            run_id,
            index_url,
            policy: self.config.failure_policy,
            layout: self.config.layout(),
            store: Arc::clone(&self.store),
            index_fetcher: IndexFetcher::new(Arc::clone(&self.transport)),
            fetcher: Arc::clone(&self.fetcher),
            publisher: ProgressPublisher::new(run_id, sender),
            state: Arc::clone(&state),
            cancel: token.cancellation().clone(),
        };
        // Dropping the guard on spawn failure frees the slot.
        let guard = RunGuard {
            slot: Arc::clone(&self.active),
            run_id,
        };

        let worker = thread::Builder::new()
            .name(format!("pkgsync-run-{}", run_id))
            .spawn(move || {
                let report = run.execute();
                guard.release();
                run.publish_terminal(&report);
                drop(run);
                on_finished(&report);
                report
            })
            .map_err(SyncError::WorkerSpawn)?;

        info!(run_id, "Synchronization started");
        Ok(SyncHandle::new(token, receiver, state, worker))
    }

    /// Request cancellation of the active run.
    ///
    /// The run stops at its next checkpoint: after the index fetch, after
    /// each package, or while waiting on an orchestrated download.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::UnknownRun`] if `token` is not the active run.
    pub fn cancel(&self, token: &RunToken) -> SyncResult<()> {
        match self.active.lock().as_ref() {
            Some(active) if active.id() == token.id() => {
                info!(run_id = token.id(), "Cancellation requested");
                active.cancellation().cancel();
                Ok(())
            }
            _ => Err(SyncError::UnknownRun(token.id())),
        }
    }
}

/// Clears the active-run slot when the run ends, including on panic.
struct RunGuard {
    slot: ActiveSlot,
    run_id: u64,
}

impl RunGuard {
    fn release(&self) {
        let mut slot = self.slot.lock();
        if slot.as_ref().map(RunToken::id) == Some(self.run_id) {
            *slot = None;
        }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Everything one run needs, moved onto the worker thread.
struct SyncRun {
    run_id: u64,
    index_url: Url,
    policy: FailurePolicy,
    layout: StorageLayout,
    store: Arc<dyn PackageStore>,
    index_fetcher: IndexFetcher,
    fetcher: Arc<dyn PackageFetcher>,
    publisher: ProgressPublisher,
    state: SharedState,
    cancel: CancellationToken,
}

/// How a single package ended up on disk.
struct StoredPackage {
    bytes: u64,
    downloaded: bool,
}

impl SyncRun {
    fn execute(&self) -> SyncReport {
        let started = Instant::now();
        let mut report = SyncReport::new(self.run_id);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_stages(&mut report)))
            .unwrap_or_else(|payload| Err(SyncError::Panicked(panic_message(payload.as_ref()))));
        report.elapsed = started.elapsed();
        report.state = match outcome {
            Ok(()) => SyncState::Done,
            Err(SyncError::Cancelled) => SyncState::Cancelled,
            Err(e) => {
                report.error = Some(e.to_string());
                SyncState::Failed
            }
        };
        self.set_state(report.state);
        report
    }

    fn run_stages(&self, report: &mut SyncReport) -> SyncResult<()> {
        self.set_state(SyncState::ListingLocal);
        let packages_dir = self.layout.ensure_directory(PACKAGES_SUBDIR)?;
        self.publisher.info("Listing local packages", 0, 1);
        let mut local = LocalFileSet::snapshot(&packages_dir)?;

        self.set_state(SyncState::FetchingIndex);
        self.publisher
            .info(format!("Fetching index {}", self.index_url), 0, 1);
        let index = self.index_fetcher.fetch(&self.index_url)?;
        let total = index.len();
        report.total = total;
        self.publisher
            .info(format!("Index lists {} packages", total), 0, total);

        self.checkpoint()?;
        self.store.truncate()?;

        for (position, descriptor) in index.packages.iter().enumerate() {
            self.set_state(SyncState::Processing {
                current: position,
                total,
            });

            match self.process(&index, descriptor, &mut local, position) {
                Ok(stored) => {
                    report.total_bytes += stored.bytes;
                    if stored.downloaded {
                        report.downloaded += 1;
                    }
                }
                Err(e) if e.is_package_scoped() && self.policy == FailurePolicy::SkipAndContinue => {
                    self.publisher.error(
                        format!("Skipping {}: {}", descriptor.remote_file_name(), e),
                        position,
                        total,
                    );
                    report.failed.push(FailedPackage::new(descriptor, &e));
                }
                Err(e) => return Err(e),
            }

            report.processed = position + 1;
            self.publisher.info(
                format!("Processed {}", descriptor.remote_file_name()),
                position + 1,
                total,
            );
            self.checkpoint()?;
        }

        self.set_state(SyncState::Sweeping);
        let sweep = local.sweep();
        self.publisher.info(sweep.to_string(), total, total);
        report.deleted = sweep.files_deleted;

        Ok(())
    }

    fn process(
        &self,
        index: &PackageIndex,
        descriptor: &PackageDescriptor,
        local: &mut LocalFileSet,
        position: usize,
    ) -> SyncResult<StoredPackage> {
        self.store.upsert(PackageRecord::from(descriptor))?;

        if DigestAlgorithm::for_digest(&descriptor.hash_digest).is_none() {
            return Err(SyncError::PackageIntegrity {
                file: descriptor.remote_file_name(),
                expected: descriptor.hash_digest.clone(),
                actual: "<unsupported digest length>".to_string(),
            });
        }

        let file = self.layout.package_file(&descriptor.storage_file_name());
        if checksum::is_valid(&file, &descriptor.hash_digest) {
            local.confirm(&file);
            self.publisher.debug(
                format!("{} is up to date", descriptor.remote_file_name()),
                position,
                index.len(),
            );
            return Ok(StoredPackage {
                bytes: file_size(&file)?,
                downloaded: false,
            });
        }

        let url = index.package_url(descriptor)?;
        debug!(url = %url, path = %file.display(), "Downloading package");
        self.fetcher.fetch(&url, &file, &self.cancel)?;

        if let Err(e) = checksum::verify_checksum(&file, &descriptor.hash_digest) {
            // A stale file from the snapshot is left for the sweep.
            if !local.contains(&file) {
                fs::remove_file(&file).ok();
            }
            return Err(e);
        }

        local.confirm(&file);
        Ok(StoredPackage {
            bytes: file_size(&file)?,
            downloaded: true,
        })
    }

    fn checkpoint(&self) -> SyncResult<()> {
        if self.cancel.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn set_state(&self, state: SyncState) {
        *self.state.lock() = state;
    }

    fn publish_terminal(&self, report: &SyncReport) {
        match report.state {
            SyncState::Cancelled => {
                self.publisher
                    .warning(report.to_string(), report.processed, report.total)
            }
            SyncState::Failed => {
                self.publisher
                    .error(report.to_string(), report.processed, report.total)
            }
            _ => self
                .publisher
                .info(report.to_string(), report.processed, report.total),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn file_size(path: &Path) -> SyncResult<u64> {
    fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| SyncError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })
}
