//! pkgsync CLI - Command-line interface
//!
//! Keeps a local package cache in sync with a remote catalog index.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use console::style;
use pkgsync::logging::{init_logging, LoggingConfig};
use pkgsync::ConfigFile;

use commands::{StatusArgs, SyncArgs, VerifyArgs};
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "pkgsync", version, about = "Keep a local package cache in sync with a remote catalog")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download new packages and remove obsolete ones
    Sync(SyncArgs),
    /// Show cache location, size and record count
    Status(StatusArgs),
    /// Check every recorded package against its digest
    Verify(VerifyArgs),
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = ConfigFile::load()?;
    let _logging = init_logging(&logging_config(&config, &cli))?;
    tracing::debug!(version = pkgsync::VERSION, "pkgsync starting");

    match cli.command {
        Commands::Sync(args) => commands::sync::run(args, &config),
        Commands::Status(args) => commands::status::run(args, &config),
        Commands::Verify(args) => commands::verify::run(args, &config),
    }
}

/// Logging settings for this invocation.
///
/// The sync progress bar owns the terminal, so only warnings and errors reach
/// stderr during `sync` unless `--verbose` was given.
fn logging_config(config: &ConfigFile, cli: &Cli) -> LoggingConfig {
    let logging = config.logging.clone();
    if cli.verbose {
        logging.with_level("debug")
    } else if matches!(cli.command, Commands::Sync(_)) {
        logging.with_console_level("warn")
    } else {
        logging
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sync_flags() {
        let cli = Cli::try_parse_from([
            "pkgsync",
            "sync",
            "--index-url",
            "http://cdn.example.com/index.json.xz",
            "--base-dir",
            "/tmp/cache",
            "--abort-on-failure",
            "--timeout",
            "15",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Sync(args) => {
                assert_eq!(
                    args.index_url.as_deref(),
                    Some("http://cdn.example.com/index.json.xz")
                );
                assert_eq!(
                    args.cache.base_dir,
                    Some(std::path::PathBuf::from("/tmp/cache"))
                );
                assert!(args.abort_on_failure);
                assert_eq!(args.timeout, Some(15));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_status_and_verify() {
        let cli = Cli::try_parse_from(["pkgsync", "status"]).unwrap();
        assert!(matches!(cli.command, Commands::Status(_)));

        let cli = Cli::try_parse_from(["pkgsync", "--verbose", "verify", "--base-dir", "/c"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Verify(_)));
    }

    #[test]
    fn test_sync_quiets_console_logging() {
        let config = ConfigFile::default();

        let cli = Cli::try_parse_from(["pkgsync", "sync"]).unwrap();
        let logging = logging_config(&config, &cli);
        assert_eq!(logging.console_level.as_deref(), Some("warn"));
        assert_eq!(logging.level, config.logging.level);

        let cli = Cli::try_parse_from(["pkgsync", "sync", "--verbose"]).unwrap();
        let logging = logging_config(&config, &cli);
        assert_eq!(logging.console_level, None);
        assert_eq!(logging.level, "debug");

        let cli = Cli::try_parse_from(["pkgsync", "status"]).unwrap();
        assert_eq!(logging_config(&config, &cli).console_level, None);
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
