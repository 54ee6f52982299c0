//! pkgsync - Content-addressed package cache synchronization
//!
//! This library keeps a local directory of packages in sync with a remote,
//! xz-compressed JSON index: it validates local copies by digest, downloads
//! what is missing or corrupt, records package metadata, and removes local
//! files the index no longer references.

pub mod checksum;
pub mod config;
pub mod decompress;
pub mod download;
pub mod engine;
pub mod error;
pub mod index;
pub mod logging;
pub mod package;
pub mod reconcile;
pub mod storage;
pub mod store;
pub mod transport;

pub use config::{ConfigFile, FailurePolicy, SyncConfig};
pub use engine::{
    LogLevel, RunToken, SyncEngine, SyncEvent, SyncHandle, SyncReport, SyncState,
};
pub use error::{ErrorKind, SyncError, SyncResult};
pub use index::{IndexFetcher, PackageIndex};
pub use package::{PackageDescriptor, PackageRecord};
pub use store::{JsonPackageStore, MemoryPackageStore, PackageStore};
pub use transport::{HttpTransport, Transport};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
