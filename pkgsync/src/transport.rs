//! Blocking byte transports for index and package retrieval.
//!
//! The synchronization engine runs on its own worker thread and may block, so
//! transports hand out plain [`Read`] streams. [`HttpTransport`] serves
//! `http`/`https` through a reqwest blocking client and `file` URLs from the
//! local filesystem (useful for mirrors on removable media).

use std::fs::File;
use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;
use url::Url;

use crate::error::{SyncError, SyncResult};

/// Default timeout for HTTP requests in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300; // 5 minutes

/// Source of remote bytes.
pub trait Transport: Send + Sync {
    /// Open a stream over the content at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Network`] or [`SyncError::Timeout`] when the
    /// content cannot be retrieved.
    fn open(&self, url: &Url) -> SyncResult<Box<dyn Read + Send>>;
}

/// HTTP(S) and `file://` transport.
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport with the default timeout.
    pub fn new() -> SyncResult<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a transport with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    /// Configured request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn open_http(&self, url: &Url) -> SyncResult<Box<dyn Read + Send>> {
        let response = self.client.get(url.as_str()).send().map_err(|e| {
            if e.is_timeout() {
                SyncError::Timeout {
                    url: url.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                SyncError::Network {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Network {
                url: url.to_string(),
                reason: format!("GET request failed with status {}", status),
            });
        }

        debug!(url = %url, length = ?response.content_length(), "Opened HTTP stream");
        Ok(Box::new(response))
    }

    fn open_file(&self, url: &Url) -> SyncResult<Box<dyn Read + Send>> {
        let path = url.to_file_path().map_err(|_| SyncError::InvalidUrl {
            url: url.to_string(),
            reason: "not a local file path".to_string(),
        })?;

        let file = File::open(&path).map_err(|e| SyncError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        debug!(path = %path.display(), "Opened local file stream");
        Ok(Box::new(file))
    }
}

impl Transport for HttpTransport {
    fn open(&self, url: &Url) -> SyncResult<Box<dyn Read + Send>> {
        match url.scheme() {
            "http" | "https" => self.open_http(url),
            "file" => self.open_file(url),
            other => Err(SyncError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", other),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_http_transport_default_timeout() {
        let transport = HttpTransport::new().unwrap();
        assert_eq!(transport.timeout().as_secs(), DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_http_transport_with_timeout() {
        let transport = HttpTransport::with_timeout(Duration::from_secs(60)).unwrap();
        assert_eq!(transport.timeout().as_secs(), 60);
    }

    #[test]
    fn test_file_url_is_readable() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.json.xz");
        File::create(&path).unwrap().write_all(b"payload").unwrap();

        let transport = HttpTransport::new().unwrap();
        let url = Url::from_file_path(&path).unwrap();
        let mut content = Vec::new();
        transport
            .open(&url)
            .unwrap()
            .read_to_end(&mut content)
            .unwrap();

        assert_eq!(content, b"payload");
    }

    #[test]
    fn test_missing_file_is_network_error() {
        let temp = TempDir::new().unwrap();
        let url = Url::from_file_path(temp.path().join("absent")).unwrap();

        let transport = HttpTransport::new().unwrap();
        assert!(matches!(
            transport.open(&url),
            Err(SyncError::Network { .. })
        ));
    }

    #[test]
    fn test_unsupported_scheme() {
        let transport = HttpTransport::new().unwrap();
        let url = Url::parse("ftp://example.com/index.json.xz").unwrap();
        assert!(matches!(
            transport.open(&url),
            Err(SyncError::InvalidUrl { .. })
        ));
    }
}
