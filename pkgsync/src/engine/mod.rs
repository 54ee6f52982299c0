//! Synchronization engine.
//!
//! One run lists the local content directory, fetches the remote index,
//! makes sure every listed package is present and intact, and finally
//! deletes local files the index no longer references.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use pkgsync::{JsonPackageStore, SyncConfig, SyncEngine};
//!
//! let config = SyncConfig::new("/var/cache/pkgsync");
//! let store = Arc::new(JsonPackageStore::open("/var/cache/pkgsync/packages.json")?);
//! let engine = SyncEngine::with_http(config, store)?;
//!
//! let mut handle = engine.start("https://cdn.example.com/catalog/index.json.xz", |report| {
//!     println!("{}", report);
//! })?;
//!
//! while let Some(event) = handle.blocking_next_event() {
//!     println!("[{}] {}/{} {}", event.level, event.current, event.total, event.text);
//! }
//! let report = handle.join();
//! ```

mod handle;
mod progress;
mod report;
mod runner;
mod state;

pub use handle::{RunToken, SyncHandle};
pub use progress::{event_channel, EventReceiver, EventSender, LogLevel, SyncEvent};
pub use report::{FailedPackage, SyncReport};
pub use runner::SyncEngine;
pub use state::{SharedState, SyncState};
