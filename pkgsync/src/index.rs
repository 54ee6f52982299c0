//! Remote package index retrieval.
//!
//! The index is an xz-compressed UTF-8 JSON array of package descriptors.
//! Fetching is all-or-nothing: one malformed element rejects the whole index,
//! so a partial catalog is never handed to the engine.

use std::sync::Arc;

use tracing::{debug, info, warn};
use url::Url;

use crate::checksum::DigestAlgorithm;
use crate::decompress;
use crate::error::{SyncError, SyncResult};
use crate::package::PackageDescriptor;
use crate::transport::Transport;

/// A fetched index together with the location packages resolve against.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageIndex {
    /// URL the index was fetched from.
    pub url: Url,
    /// Parent location of `url`; package names are relative to it.
    pub base: Url,
    /// Descriptors in index order.
    pub packages: Vec<PackageDescriptor>,
}

impl PackageIndex {
    /// Number of descriptors.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the index lists no packages.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Resolve the retrieval URL of a package.
    pub fn package_url(&self, descriptor: &PackageDescriptor) -> SyncResult<Url> {
        let name = descriptor.remote_file_name();
        self.base.join(&name).map_err(|e| SyncError::InvalidUrl {
            url: name,
            reason: e.to_string(),
        })
    }
}

/// Compute the parent location of an index URL.
///
/// `http://host/a/index.json.xz` becomes `http://host/a/`.
pub fn base_url(index_url: &Url) -> SyncResult<Url> {
    index_url.join(".").map_err(|e| SyncError::InvalidUrl {
        url: index_url.to_string(),
        reason: e.to_string(),
    })
}

/// Parse decompressed index content.
///
/// # Errors
///
/// Returns [`SyncError::Parse`] if the content is not UTF-8, not a JSON array
/// of descriptors, or any descriptor carries an invalid digest. A hex digest
/// whose length matches no supported algorithm is accepted with a warning;
/// that package can never validate.
pub fn parse_index(url: &Url, content: &[u8]) -> SyncResult<Vec<PackageDescriptor>> {
    let parse_error = |reason: String| SyncError::Parse {
        url: url.to_string(),
        reason,
    };

    let text = std::str::from_utf8(content).map_err(|e| parse_error(e.to_string()))?;
    let packages: Vec<PackageDescriptor> =
        serde_json::from_str(text).map_err(|e| parse_error(e.to_string()))?;

    if let Some((position, bad)) = packages
        .iter()
        .enumerate()
        .find(|(_, d)| !d.has_valid_digest())
    {
        return Err(parse_error(format!(
            "element {} has invalid digest '{}'",
            position, bad.hash_digest
        )));
    }

    for descriptor in packages
        .iter()
        .filter(|d| DigestAlgorithm::for_digest(&d.hash_digest).is_none())
    {
        warn!(
            digest = %descriptor.hash_digest,
            file = %descriptor.remote_file_name(),
            "Digest length matches no supported algorithm"
        );
    }

    Ok(packages)
}

/// Fetches and parses the remote index.
pub struct IndexFetcher {
    transport: Arc<dyn Transport>,
}

impl IndexFetcher {
    /// Create a fetcher using the given transport.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Fetch the index at `url`.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Network`]/[`SyncError::Timeout`] if retrieval fails
    /// - [`SyncError::Decompression`] if the payload is malformed
    /// - [`SyncError::Parse`] if the content is malformed
    pub fn fetch(&self, url: &Url) -> SyncResult<PackageIndex> {
        info!(url = %url, "Synchronizing index");
        let base = base_url(url)?;

        let stream = self.transport.open(url)?;
        let content = decompress::extract(stream)?;
        debug!(url = %url, bytes = content.len(), "Index payload decompressed");

        let packages = parse_index(url, &content)?;
        info!(count = packages.len(), "Index references packages");

        Ok(PackageIndex {
            url: url.clone(),
            base,
            packages,
        })
    }
}
