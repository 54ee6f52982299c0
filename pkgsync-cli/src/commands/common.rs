//! Common types and utilities shared across CLI commands.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use pkgsync::{ConfigFile, FailurePolicy, JsonPackageStore, SyncConfig};

use crate::error::CliError;

/// Name of the metadata store file inside the cache directory.
pub const STORE_FILE_NAME: &str = "packages.json";

/// Cache location shared by every command.
#[derive(Debug, Clone, Default, Args)]
pub struct CacheArgs {
    /// Cache directory (defaults to base_dir in config.ini, then ~/.pkgsync/cache)
    #[arg(long, value_name = "DIR")]
    pub base_dir: Option<PathBuf>,
}

/// Resolve the engine configuration; CLI values take precedence over the
/// config file.
pub fn resolve_config(
    cache: &CacheArgs,
    timeout_secs: Option<u64>,
    abort_on_failure: bool,
    file: &ConfigFile,
) -> SyncConfig {
    let mut config = file.sync_config();
    if let Some(base_dir) = &cache.base_dir {
        config.base_dir = base_dir.clone();
    }
    if let Some(secs) = timeout_secs {
        config.timeout = Duration::from_secs(secs);
    }
    if abort_on_failure {
        config.failure_policy = FailurePolicy::AbortRun;
    }
    config
}

/// Index URL from the command line or the config file.
pub fn require_index_url(cli_url: Option<String>, file: &ConfigFile) -> Result<String, CliError> {
    cli_url.or_else(|| file.index_url.clone()).ok_or_else(|| {
        CliError::Config(
            "No index URL specified. Use --index-url or set index_url in config.ini [sync] section."
                .to_string(),
        )
    })
}

/// Open the metadata store kept next to the cached packages.
pub fn open_store(config: &SyncConfig) -> Result<JsonPackageStore, CliError> {
    Ok(JsonPackageStore::open(
        config.base_dir.join(STORE_FILE_NAME),
    )?)
}

/// Format a byte count for humans.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
