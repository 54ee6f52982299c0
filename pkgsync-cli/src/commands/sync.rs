//! `pkgsync sync`: run one synchronization with a progress bar.

use std::sync::Arc;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use pkgsync::{ConfigFile, LogLevel, SyncEngine, SyncEvent, SyncReport, SyncState};

use super::common::{format_size, open_store, require_index_url, resolve_config, CacheArgs};
use crate::error::CliError;

/// Arguments for the sync command.
#[derive(Debug, Args)]
pub struct SyncArgs {
    /// URL of the compressed package index
    #[arg(long, value_name = "URL")]
    pub index_url: Option<String>,

    #[command(flatten)]
    pub cache: CacheArgs,

    /// Fail the run on the first package that cannot be stored intact
    #[arg(long)]
    pub abort_on_failure: bool,

    /// Network timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

/// Run the sync command.
pub fn run(args: SyncArgs, file: &ConfigFile) -> Result<(), CliError> {
    let index_url = require_index_url(args.index_url, file)?;
    let config = resolve_config(&args.cache, args.timeout, args.abort_on_failure, file);

    println!("Cache:  {}", config.base_dir.display());
    println!("Index:  {}", index_url);
    println!("Policy: on failure {}", config.failure_policy);
    println!();

    let store = Arc::new(open_store(&config)?);
    let engine = Arc::new(SyncEngine::with_http(config, store)?);

    let canceller = Arc::clone(&engine);
    ctrlc::set_handler(move || {
        if let Some(token) = canceller.active_run() {
            eprintln!();
            eprintln!("Cancelling, finishing the current package...");
            let _ = canceller.cancel(&token);
        }
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let mut handle = engine.start(&index_url, |_| {})?;

    let bar = progress_bar();
    while let Some(event) = handle.blocking_next_event() {
        show_event(&bar, &event);
    }
    bar.finish_and_clear();

    let report = handle.join();
    print_summary(&report);
    outcome(&report)
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(style);
    bar
}

fn show_event(bar: &ProgressBar, event: &SyncEvent) {
    if event.total > 0 {
        bar.set_length(event.total as u64);
        bar.set_position(event.current as u64);
    }
    match event.level {
        LogLevel::Critical | LogLevel::Error => {
            bar.println(format!("{} {}", style("error:").red().bold(), event.text))
        }
        LogLevel::Warning => {
            bar.println(format!("{} {}", style("warning:").yellow().bold(), event.text))
        }
        LogLevel::Info => bar.set_message(event.text.clone()),
        LogLevel::Debug => bar.tick(),
    }
}

fn print_summary(report: &SyncReport) {
    println!("Synchronization Summary");
    println!("───────────────────────");
    println!("  State:      {}", report.state);
    println!("  Packages:   {}/{}", report.processed, report.total);
    println!("  Downloaded: {}", report.downloaded);
    println!("  Removed:    {}", report.deleted);
    println!("  Size:       {}", format_size(report.total_bytes));
    println!("  Elapsed:    {:.1}s", report.elapsed.as_secs_f64());

    if !report.failed.is_empty() {
        println!();
        println!("Failed packages:");
        for failed in &report.failed {
            println!("  {} ({}): {}", failed.file_name, failed.hash_digest, failed.reason);
        }
    }
}

fn outcome(report: &SyncReport) -> Result<(), CliError> {
    match report.state {
        SyncState::Done if report.failed.is_empty() => Ok(()),
        SyncState::Done => Err(CliError::SyncIncomplete(report.failed.len())),
        SyncState::Cancelled => Err(CliError::Cancelled),
        _ => Err(CliError::SyncFailed(
            report
                .error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
        )),
    }
}
