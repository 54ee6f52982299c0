//! `pkgsync status`: describe the local cache.

use std::fs;
use std::path::Path;

use clap::Args;
use pkgsync::{ConfigFile, PackageStore};

use super::common::{format_size, open_store, resolve_config, CacheArgs};
use crate::error::CliError;

/// Arguments for the status command.
#[derive(Debug, Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub cache: CacheArgs,
}

/// Run the status command.
pub fn run(args: StatusArgs, file: &ConfigFile) -> Result<(), CliError> {
    let config = resolve_config(&args.cache, None, false, file);
    let packages_dir = config.layout().packages_dir();
    let (files, bytes) = directory_stats(&packages_dir);
    let store = open_store(&config)?;

    println!("Cache: {}", config.base_dir.display());
    println!(
        "  Index:    {}",
        file.index_url.as_deref().unwrap_or("(not set)")
    );
    println!("  Files:    {}", files);
    println!("  Size:     {}", format_size(bytes));
    println!("  Records:  {}", store.count()?);
    println!("  Store:    {}", store.path().display());

    Ok(())
}

/// Count regular files directly inside `dir` and their combined size.
///
/// A missing directory counts as empty.
fn directory_stats(dir: &Path) -> (usize, u64) {
    let Ok(entries) = fs::read_dir(dir) else {
        return (0, 0);
    };
    entries
        .filter_map(|e| e.ok())
        .filter_map(|e| e.metadata().ok())
        .filter(|m| m.is_file())
        .fold((0, 0), |(files, bytes), m| (files + 1, bytes + m.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_directory_stats() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a"), b"12345").unwrap();
        fs::write(temp.path().join("b"), b"123").unwrap();
        fs::create_dir(temp.path().join("nested")).unwrap();

        assert_eq!(directory_stats(temp.path()), (2, 8));
    }

    #[test]
    fn test_directory_stats_missing_dir() {
        let temp = TempDir::new().unwrap();
        assert_eq!(directory_stats(&temp.path().join("missing")), (0, 0));
    }
}
