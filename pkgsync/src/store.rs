//! Package metadata store.
//!
//! The engine uses the store only through upsert-by-digest and truncate. It
//! truncates at the start of a run and upserts every descriptor as it goes,
//! so after a successful run the store mirrors the latest index exactly.
//!
//! The rebuild is not atomic: a concurrent reader may observe a partially
//! rebuilt table and must tolerate it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::package::PackageRecord;

/// Persistent package metadata keyed by digest.
///
/// All implementations must be `Send + Sync`; the engine calls them from its
/// worker thread.
pub trait PackageStore: Send + Sync {
    /// Insert a record, replacing any record with the same digest.
    fn upsert(&self, record: PackageRecord) -> SyncResult<()>;

    /// Delete every record.
    fn truncate(&self) -> SyncResult<()>;

    /// Number of stored records.
    fn count(&self) -> SyncResult<usize>;

    /// Look up a record by digest (case-insensitive).
    fn get(&self, hash_digest: &str) -> SyncResult<Option<PackageRecord>>;

    /// All records ordered by digest.
    fn records(&self) -> SyncResult<Vec<PackageRecord>>;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryPackageStore {
    records: Mutex<BTreeMap<String, PackageRecord>>,
}

impl MemoryPackageStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PackageStore for MemoryPackageStore {
    fn upsert(&self, record: PackageRecord) -> SyncResult<()> {
        self.records.lock().insert(record.key(), record);
        Ok(())
    }

    fn truncate(&self) -> SyncResult<()> {
        self.records.lock().clear();
        Ok(())
    }

    fn count(&self) -> SyncResult<usize> {
        Ok(self.records.lock().len())
    }

    fn get(&self, hash_digest: &str) -> SyncResult<Option<PackageRecord>> {
        Ok(self
            .records
            .lock()
            .get(&hash_digest.to_ascii_lowercase())
            .cloned())
    }

    fn records(&self) -> SyncResult<Vec<PackageRecord>> {
        Ok(self.records.lock().values().cloned().collect())
    }
}

/// Store persisted as a JSON file.
///
/// The whole table is rewritten after each mutation through a temporary file
/// and a rename, so the file on disk is always a complete document.
#[derive(Debug)]
pub struct JsonPackageStore {
    path: PathBuf,
    records: Mutex<BTreeMap<String, PackageRecord>>,
}

impl JsonPackageStore {
    /// Open the store at `path`, loading existing records if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> SyncResult<Self> {
        let path = path.into();
        let records = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| SyncError::ReadFailed {
                path: path.clone(),
                source: e,
            })?;
            let list: Vec<PackageRecord> = serde_json::from_str(&content)
                .map_err(|e| SyncError::Store(format!("{}: {}", path.display(), e)))?;
            list.into_iter().map(|r| (r.key(), r)).collect()
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), count = records.len(), "Opened package store");
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, records: &BTreeMap<String, PackageRecord>) -> SyncResult<()> {
        if let Some(parent) = self.path.parent() {
            crate::storage::ensure_dir(parent)?;
        }

        let list: Vec<&PackageRecord> = records.values().collect();
        let content =
            serde_json::to_string_pretty(&list).map_err(|e| SyncError::Store(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| SyncError::WriteFailed {
            path: tmp.clone(),
            source: e,
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| SyncError::MoveFailed {
            from: tmp,
            path: self.path.clone(),
            source: e,
        })
    }
}

impl PackageStore for JsonPackageStore {
    fn upsert(&self, record: PackageRecord) -> SyncResult<()> {
        let mut records = self.records.lock();
        records.insert(record.key(), record);
        self.persist(&records)
    }

    fn truncate(&self) -> SyncResult<()> {
        let mut records = self.records.lock();
        records.clear();
        self.persist(&records)
    }

    fn count(&self) -> SyncResult<usize> {
        Ok(self.records.lock().len())
    }

    fn get(&self, hash_digest: &str) -> SyncResult<Option<PackageRecord>> {
        Ok(self
            .records
            .lock()
            .get(&hash_digest.to_ascii_lowercase())
            .cloned())
    }

    fn records(&self) -> SyncResult<Vec<PackageRecord>> {
        Ok(self.records.lock().values().cloned().collect())
    }
}
