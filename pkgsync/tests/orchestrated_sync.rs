//! Integration tests for runs that download through an external subsystem.
//!
//! A threaded fake subsystem performs each transfer on its own thread and
//! pushes the job id on the completion channel, the way a platform download
//! service would.
//!
//! Run with: `cargo test --test orchestrated_sync`

mod common;

use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tempfile::TempDir;

use common::{file_names, run, FakeCatalog, Package};
use pkgsync::download::{
    completion_channel, CompletionSender, DownloadSubsystem, JobId, JobInfo, JobStatus,
    TransferRequest,
};
use pkgsync::{
    FailurePolicy, MemoryPackageStore, PackageStore, SyncConfig, SyncEngine, SyncResult,
    SyncState, Transport,
};

// ============================================================================
// Threaded subsystem
// ============================================================================

struct ThreadedSubsystem {
    catalog: Arc<FakeCatalog>,
    notifier: CompletionSender,
    next_id: AtomicU64,
    jobs: Arc<Mutex<HashMap<JobId, JobInfo>>>,
}

impl ThreadedSubsystem {
    fn new(catalog: Arc<FakeCatalog>, notifier: CompletionSender) -> Self {
        Self {
            catalog,
            notifier,
            next_id: AtomicU64::new(100),
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn transfer(catalog: &FakeCatalog, request: &TransferRequest) -> Option<PathBuf> {
        let mut body = Vec::new();
        catalog
            .open(&request.remote)
            .ok()?
            .read_to_end(&mut body)
            .ok()?;
        fs::create_dir_all(request.destination.parent()?).ok()?;
        fs::write(&request.destination, body).ok()?;
        Some(request.destination.clone())
    }
}

impl DownloadSubsystem for ThreadedSubsystem {
    fn enqueue(&self, request: TransferRequest) -> SyncResult<JobId> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.jobs.lock().insert(
            id,
            JobInfo {
                status: JobStatus::Pending,
                local_path: None,
            },
        );

        let catalog = Arc::clone(&self.catalog);
        let jobs = Arc::clone(&self.jobs);
        let notifier = self.notifier.clone();
        thread::spawn(move || {
            let output = Self::transfer(&catalog, &request);
            if let Some(info) = jobs.lock().get_mut(&id) {
                info.status = if output.is_some() {
                    JobStatus::Successful
                } else {
                    JobStatus::Failed
                };
                info.local_path = output;
            }
            let _ = notifier.send(id);
        });
        Ok(id)
    }

    fn query(&self, job_id: JobId) -> Option<JobInfo> {
        self.jobs.lock().get(&job_id).cloned()
    }

    fn remove(&self, job_id: JobId) {
        self.jobs.lock().remove(&job_id);
    }

    fn job_ids(&self) -> Vec<JobId> {
        self.jobs.lock().keys().copied().collect()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn orchestrated_engine(
    temp: &TempDir,
    catalog: &Arc<FakeCatalog>,
    store: &Arc<MemoryPackageStore>,
) -> SyncEngine {
    let config = SyncConfig::new(temp.path())
        .with_poll_interval(Duration::from_millis(5))
        .with_download_timeout(Duration::from_secs(10));
    let (notifier, completions) = completion_channel();
    let subsystem = ThreadedSubsystem::new(Arc::clone(catalog), notifier);
    let transport: Arc<dyn Transport> = catalog.clone();
    SyncEngine::orchestrated(config, store.clone(), transport, subsystem, completions)
}

fn catalog_packages() -> Vec<Package> {
    vec![
        Package::new("posts", 1, 500, b"orchestrated posts"),
        Package::new("posts", 501, 1000, b"more orchestrated posts"),
        Package::new("tags", 1, 40, b"orchestrated tags"),
    ]
}

// ============================================================================
// Integration Tests
// ============================================================================

/// Every package is fetched through the subsystem and lands at its content
/// path.
#[test]
fn test_orchestrated_run_stores_every_package() {
    let temp = TempDir::new().unwrap();
    let catalog = FakeCatalog::new();
    let packages = catalog_packages();
    catalog.publish(&packages);
    let store = Arc::new(MemoryPackageStore::new());
    let engine = orchestrated_engine(&temp, &catalog, &store);

    let (_, report) = run(&engine);

    assert_eq!(report.state, SyncState::Done);
    assert!(report.is_success());
    assert_eq!(report.downloaded, 3);
    assert_eq!(store.count().unwrap(), 3);

    let mut expected: Vec<String> = packages.iter().map(Package::digest).collect();
    expected.sort();
    assert_eq!(file_names(&temp.path().join("packages")), expected);
    for package in &packages {
        assert_eq!(
            fs::read(temp.path().join("packages").join(package.digest())).unwrap(),
            package.content
        );
    }
}

/// A transfer the subsystem reports as failed is skipped.
#[test]
fn test_orchestrated_failed_transfer_is_skipped() {
    let temp = TempDir::new().unwrap();
    let catalog = FakeCatalog::new();
    let packages = catalog_packages();
    catalog.publish(&packages);
    catalog.withdraw(&packages[1].url());
    let store = Arc::new(MemoryPackageStore::new());
    let engine = orchestrated_engine(&temp, &catalog, &store);

    let (_, report) = run(&engine);

    assert_eq!(report.state, SyncState::Done);
    assert_eq!(report.downloaded, 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].hash_digest, packages[1].digest());
    assert!(!temp
        .path()
        .join("packages")
        .join(packages[1].digest())
        .exists());
}

/// Under the abort policy a failed transfer fails the run.
#[test]
fn test_orchestrated_failed_transfer_aborts_under_abort_policy() {
    let temp = TempDir::new().unwrap();
    let catalog = FakeCatalog::new();
    let packages = catalog_packages();
    catalog.publish(&packages);
    catalog.withdraw(&packages[0].url());
    let store = Arc::new(MemoryPackageStore::new());

    let config = SyncConfig::new(temp.path())
        .with_failure_policy(FailurePolicy::AbortRun)
        .with_poll_interval(Duration::from_millis(5));
    let (notifier, completions) = completion_channel();
    let subsystem = ThreadedSubsystem::new(Arc::clone(&catalog), notifier);
    let transport: Arc<dyn Transport> = catalog.clone();
    let engine =
        SyncEngine::orchestrated(config, store.clone(), transport, subsystem, completions);

    let (_, report) = run(&engine);

    assert_eq!(report.state, SyncState::Failed);
    assert_eq!(report.processed, 0);
    assert_eq!(store.count().unwrap(), 1);
}
