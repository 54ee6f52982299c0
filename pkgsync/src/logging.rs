//! Tracing subscriber setup.
//!
//! Logs go to stderr and, when a directory is configured, to a daily rolling
//! file written by a background thread. The `PKGSYNC_LOG` environment
//! variable overrides the configured level using `EnvFilter` syntax, e.g.
//! `PKGSYNC_LOG=pkgsync=debug,reqwest=warn`.

use std::fs;
use std::path::PathBuf;

use time::format_description::well_known::Rfc3339;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::error::{SyncError, SyncResult};

/// Environment variable overriding the configured filter.
pub const LOG_ENV_VAR: &str = "PKGSYNC_LOG";

/// Default filter level.
pub const DEFAULT_LEVEL: &str = "info";

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `pkgsync=debug`.
    pub level: String,
    /// Directory for rolling log files; `None` logs to stderr only.
    pub directory: Option<PathBuf>,
    /// File name prefix for rolling log files.
    pub file_prefix: String,
    /// Extra threshold for stderr only, e.g. `warn` while a progress bar
    /// owns the terminal. Files still receive `level`.
    pub console_level: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL.to_string(),
            directory: None,
            file_prefix: "pkgsync.log".to_string(),
            console_level: None,
        }
    }
}

impl LoggingConfig {
    /// Set the filter level.
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Restrict stderr output to `level` and above.
    pub fn with_console_level(mut self, level: impl Into<String>) -> Self {
        self.console_level = Some(level.into());
        self
    }

    /// Also write logs below `directory`.
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }
}

/// Keeps the file writer alive; drop it only when the process exits.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns [`SyncError::InvalidConfig`] if the level is not a valid filter,
/// the log directory cannot be created, or a subscriber is already
/// installed.
pub fn init_logging(config: &LoggingConfig) -> SyncResult<LoggingGuard> {
    let filter = build_filter(config)?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(LocalTime::new(Rfc3339))
        .with_target(true)
        .with_filter(console_filter(config)?);

    let mut file_guard = None;
    let file_layer = match &config.directory {
        Some(directory) => {
            fs::create_dir_all(directory).map_err(|e| {
                SyncError::InvalidConfig(format!(
                    "cannot create log directory {}: {}",
                    directory.display(),
                    e
                ))
            })?;
            let appender = tracing_appender::rolling::daily(directory, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            file_guard = Some(guard);
            Some(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_timer(LocalTime::new(Rfc3339)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| SyncError::InvalidConfig(format!("logging already initialized: {}", e)))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

fn build_filter(config: &LoggingConfig) -> SyncResult<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV_VAR) {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|e| {
        SyncError::InvalidConfig(format!("invalid log level '{}': {}", config.level, e))
    })
}

fn console_filter(config: &LoggingConfig) -> SyncResult<LevelFilter> {
    match config.console_level.as_deref() {
        None => Ok(LevelFilter::TRACE),
        Some(level) => level.parse().map_err(|e| {
            SyncError::InvalidConfig(format!("invalid console log level '{}': {}", level, e))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.directory.is_none());
    }

    #[test]
    fn test_logging_config_builder() {
        let config = LoggingConfig::default()
            .with_level("debug")
            .with_directory("/tmp/logs");
        assert_eq!(config.level, "debug");
        assert_eq!(config.directory, Some(PathBuf::from("/tmp/logs")));
    }

    #[test]
    fn test_console_filter() {
        let config = LoggingConfig::default();
        assert_eq!(console_filter(&config).unwrap(), LevelFilter::TRACE);

        let config = config.with_console_level("warn");
        assert_eq!(console_filter(&config).unwrap(), LevelFilter::WARN);

        let config = LoggingConfig::default().with_console_level("loud");
        assert!(matches!(
            console_filter(&config),
            Err(SyncError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_build_filter_accepts_directives() {
        let config = LoggingConfig::default().with_level("pkgsync=debug,warn");
        assert!(build_filter(&config).is_ok());
    }
}
