//! Configuration for synchronization runs.
//!
//! [`SyncConfig`] is what the engine consumes. [`ConfigFile`] reads the
//! optional user configuration at `~/.pkgsync/config.ini`:
//!
//! ```ini
//! [sync]
//! index_url = https://cdn.example.com/catalog/index.json.xz
//! base_dir = ~/.pkgsync/cache
//! timeout = 300
//! download_timeout = 600
//! on_integrity_failure = skip
//!
//! [logging]
//! level = info
//! directory = ~/.pkgsync/logs
//! ```
//!
//! Every key is optional; a missing file yields the defaults.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;

use crate::download::{DEFAULT_DOWNLOAD_TIMEOUT, DEFAULT_POLL_INTERVAL};
use crate::error::{SyncError, SyncResult};
use crate::logging::LoggingConfig;
use crate::storage::StorageLayout;
use crate::transport::DEFAULT_TIMEOUT_SECS;

/// Name of the per-user configuration directory below the home directory.
pub const CONFIG_DIR_NAME: &str = ".pkgsync";

/// Name of the configuration file inside [`CONFIG_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// What the engine does when a single package cannot be stored intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the failure, record it in the report and continue with the next
    /// package.
    #[default]
    SkipAndContinue,
    /// Fail the whole run on the first package failure.
    AbortRun,
}

impl FromStr for FailurePolicy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" | "continue" => Ok(Self::SkipAndContinue),
            "abort" | "fail" => Ok(Self::AbortRun),
            other => Err(SyncError::InvalidConfig(format!(
                "on_integrity_failure must be 'skip' or 'abort', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SkipAndContinue => f.write_str("skip"),
            Self::AbortRun => f.write_str("abort"),
        }
    }
}

/// Settings for one synchronization engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Root of the local cache (packages, temporary downloads).
    pub base_dir: PathBuf,

    /// Network request timeout.
    pub timeout: Duration,

    /// Behaviour on a failed or corrupt package.
    pub failure_policy: FailurePolicy,

    /// How often an orchestrated download polls for completion.
    pub poll_interval: Duration,

    /// How long to wait for one orchestrated download.
    pub download_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            failure_policy: FailurePolicy::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }
}

impl SyncConfig {
    /// Create a configuration rooted at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Default::default()
        }
    }

    /// Set the network timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the orchestrated download polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the orchestrated download timeout.
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Storage layout below `base_dir`.
    pub fn layout(&self) -> StorageLayout {
        StorageLayout::new(&self.base_dir)
    }
}

/// Default cache root: `~/.pkgsync/cache`, or `./.pkgsync/cache` without a
/// home directory.
pub fn default_base_dir() -> PathBuf {
    config_dir()
        .unwrap_or_else(|| PathBuf::from(CONFIG_DIR_NAME))
        .join("cache")
}

/// The per-user configuration directory, if a home directory is known.
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR_NAME))
}

/// Values read from the user configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    /// Index to synchronize against.
    pub index_url: Option<String>,
    /// Cache root.
    pub base_dir: Option<PathBuf>,
    /// Network timeout.
    pub timeout: Option<Duration>,
    /// Orchestrated download timeout.
    pub download_timeout: Option<Duration>,
    /// Failure policy.
    pub failure_policy: Option<FailurePolicy>,
    /// Logging settings.
    pub logging: LoggingConfig,
}

impl ConfigFile {
    /// Default location of the configuration file.
    pub fn default_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
    }

    /// Load the configuration from its default location.
    ///
    /// A missing file (or unknown home directory) yields the defaults.
    pub fn load() -> SyncResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load the configuration from `path`; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] if the file cannot be parsed or
    /// holds an invalid value.
    pub fn load_from(path: &Path) -> SyncResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|e| {
            SyncError::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_ini(&ini)
    }

    /// Parse configuration from INI text.
    pub fn parse(content: &str) -> SyncResult<Self> {
        let ini = Ini::load_from_str(content)
            .map_err(|e| SyncError::InvalidConfig(e.to_string()))?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("sync")) {
            config.index_url = non_empty(section.get("index_url")).map(str::to_string);
            config.base_dir = non_empty(section.get("base_dir")).map(expand_tilde);
            config.timeout = non_empty(section.get("timeout"))
                .map(|v| parse_seconds("timeout", v))
                .transpose()?;
            config.download_timeout = non_empty(section.get("download_timeout"))
                .map(|v| parse_seconds("download_timeout", v))
                .transpose()?;
            config.failure_policy = non_empty(section.get("on_integrity_failure"))
                .map(FailurePolicy::from_str)
                .transpose()?;
        }

        if let Some(section) = ini.section(Some("logging")) {
            if let Some(level) = non_empty(section.get("level")) {
                config.logging.level = level.to_string();
            }
            config.logging.directory = non_empty(section.get("directory")).map(expand_tilde);
        }

        Ok(config)
    }

    /// Build the engine configuration, falling back to defaults for unset
    /// values.
    pub fn sync_config(&self) -> SyncConfig {
        let mut config = SyncConfig::default();
        if let Some(base_dir) = &self.base_dir {
            config.base_dir = base_dir.clone();
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(timeout) = self.download_timeout {
            config.download_timeout = timeout;
        }
        if let Some(policy) = self.failure_policy {
            config.failure_policy = policy;
        }
        config
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_seconds(key: &str, value: &str) -> SyncResult<Duration> {
    value
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| {
            SyncError::InvalidConfig(format!(
                "{} must be a whole number of seconds, got '{}'",
                key, value
            ))
        })
}

fn expand_tilde(value: &str) -> PathBuf {
    match value.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(value),
        },
        None => PathBuf::from(value),
    }
}
