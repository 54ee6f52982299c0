//! `pkgsync verify`: check every recorded package against its digest.

use std::path::PathBuf;

use clap::Args;
use console::style;
use pkgsync::checksum;
use pkgsync::storage::StorageLayout;
use pkgsync::{ConfigFile, PackageRecord, PackageStore};

use super::common::{open_store, resolve_config, CacheArgs};
use crate::error::CliError;

/// Arguments for the verify command.
#[derive(Debug, Args)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub cache: CacheArgs,
}

/// Problem found with one recorded package.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Problem {
    Missing(PathBuf),
    Corrupt(PathBuf),
}

/// Run the verify command.
pub fn run(args: VerifyArgs, file: &ConfigFile) -> Result<(), CliError> {
    let config = resolve_config(&args.cache, None, false, file);
    let store = open_store(&config)?;
    let records = store.records()?;

    println!(
        "Verifying {} packages in {}",
        records.len(),
        config.base_dir.display()
    );

    let problems = inspect(&config.layout(), &records);
    for (record, problem) in &problems {
        match problem {
            Problem::Missing(path) => println!(
                "  {} {} ({})",
                style("missing").yellow().bold(),
                record.descriptor.remote_file_name(),
                path.display()
            ),
            Problem::Corrupt(path) => println!(
                "  {} {} ({})",
                style("corrupt").red().bold(),
                record.descriptor.remote_file_name(),
                path.display()
            ),
        }
    }

    if problems.is_empty() {
        println!("{} all packages intact", style("ok:").green().bold());
        Ok(())
    } else {
        Err(CliError::VerifyFailed(problems.len()))
    }
}

fn inspect<'a>(
    layout: &StorageLayout,
    records: &'a [PackageRecord],
) -> Vec<(&'a PackageRecord, Problem)> {
    records
        .iter()
        .filter_map(|record| {
            let path = layout.package_file(&record.descriptor.storage_file_name());
            if !path.is_file() {
                Some((record, Problem::Missing(path)))
            } else if !checksum::is_valid(&path, &record.descriptor.hash_digest) {
                Some((record, Problem::Corrupt(path)))
            } else {
                None
            }
        })
        .collect()
}
