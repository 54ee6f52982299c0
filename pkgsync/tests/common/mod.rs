//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;

use md5::{Digest, Md5};
use parking_lot::Mutex;
use url::Url;
use xz2::write::XzEncoder;

use pkgsync::download::DirectFetcher;
use pkgsync::{
    FailurePolicy, MemoryPackageStore, SyncConfig, SyncEngine, SyncError, SyncEvent, SyncHandle,
    SyncReport, SyncResult, Transport,
};

pub const INDEX_URL: &str = "http://cdn.example.com/catalog/index.json.xz";
pub const BASE_URL: &str = "http://cdn.example.com/catalog/";

/// Compress bytes as a single xz stream.
pub fn xz(data: &[u8]) -> Vec<u8> {
    let mut encoder = XzEncoder::new(Vec::new(), 6);
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Lowercase hex MD5 of `data`.
pub fn md5_hex(data: &[u8]) -> String {
    Md5::digest(data)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// One package served by the fake catalog.
#[derive(Clone)]
pub struct Package {
    pub content_type: String,
    pub min_id: i64,
    pub max_id: i64,
    pub content: Vec<u8>,
}

impl Package {
    pub fn new(content_type: &str, min_id: i64, max_id: i64, content: &[u8]) -> Self {
        Self {
            content_type: content_type.to_string(),
            min_id,
            max_id,
            content: content.to_vec(),
        }
    }

    pub fn digest(&self) -> String {
        md5_hex(&self.content)
    }

    pub fn file_name(&self) -> String {
        format!("{}_{}_{}.json.xz", self.content_type, self.min_id, self.max_id)
    }

    pub fn url(&self) -> String {
        format!("{}{}", BASE_URL, self.file_name())
    }

    fn json(&self) -> String {
        format!(
            r#"{{"md5":"{}","type":"{}","min_id":{},"max_id":{},"tags":true}}"#,
            self.digest(),
            self.content_type,
            self.min_id,
            self.max_id
        )
    }
}

/// In-memory catalog server implementing [`Transport`].
#[derive(Default)]
pub struct FakeCatalog {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<HashMap<String, usize>>,
    gates: Mutex<HashMap<String, mpsc::Receiver<()>>>,
}

impl FakeCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Publish an index listing `packages` and serve each package body.
    pub fn publish(&self, packages: &[Package]) {
        let entries: Vec<String> = packages.iter().map(Package::json).collect();
        let index = format!("[{}]", entries.join(","));
        let mut bodies = self.bodies.lock();
        bodies.insert(INDEX_URL.to_string(), xz(index.as_bytes()));
        for package in packages {
            bodies.insert(package.url(), package.content.clone());
        }
    }

    /// Serve raw bytes at `url`.
    pub fn serve(&self, url: &str, body: Vec<u8>) {
        self.bodies.lock().insert(url.to_string(), body);
    }

    /// Stop serving `url`.
    pub fn withdraw(&self, url: &str) {
        self.bodies.lock().remove(url);
    }

    /// Hold requests for `url` until the returned sender fires.
    pub fn gate(&self, url: &str) -> mpsc::Sender<()> {
        let (tx, rx) = mpsc::channel();
        self.gates.lock().insert(url.to_string(), rx);
        tx
    }

    /// Number of requests made for `url`.
    pub fn requests(&self, url: &str) -> usize {
        self.requests.lock().get(url).copied().unwrap_or(0)
    }

    /// Requests made for anything other than the index.
    pub fn package_requests(&self) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|(url, _)| url.as_str() != INDEX_URL)
            .map(|(_, count)| *count)
            .sum()
    }
}

impl Transport for FakeCatalog {
    fn open(&self, url: &Url) -> SyncResult<Box<dyn Read + Send>> {
        *self.requests.lock().entry(url.to_string()).or_insert(0) += 1;

        let gate = self.gates.lock().remove(url.as_str());
        if let Some(gate) = gate {
            let _ = gate.recv();
        }

        self.bodies
            .lock()
            .get(url.as_str())
            .map(|body| Box::new(Cursor::new(body.clone())) as Box<dyn Read + Send>)
            .ok_or_else(|| SyncError::Network {
                url: url.to_string(),
                reason: "404 Not Found".to_string(),
            })
    }
}

/// Engine downloading directly through `catalog`.
pub fn direct_engine(
    base_dir: &Path,
    catalog: &Arc<FakeCatalog>,
    store: &Arc<MemoryPackageStore>,
    policy: FailurePolicy,
) -> SyncEngine {
    let config = SyncConfig::new(base_dir).with_failure_policy(policy);
    let transport: Arc<dyn Transport> = catalog.clone();
    let fetcher = Arc::new(DirectFetcher::new(Arc::clone(&transport), config.layout()));
    SyncEngine::new(config, store.clone(), transport, fetcher)
}

/// Run to completion, returning every event and the report.
pub fn run(engine: &SyncEngine) -> (Vec<SyncEvent>, SyncReport) {
    let handle = engine.start(INDEX_URL, |_| {}).unwrap();
    drain(handle)
}

/// Drain a started run's events, then wait for its report.
pub fn drain(mut handle: SyncHandle) -> (Vec<SyncEvent>, SyncReport) {
    let mut events = Vec::new();
    while let Some(event) = handle.blocking_next_event() {
        events.push(event);
    }
    (events, handle.join())
}

/// Names of the files in `dir`, sorted.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
