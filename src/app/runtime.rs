use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use harvester_core::browser::ChromiumLauncher;
use harvester_core::{BatchSize, HarvestConfig, HarvestState, Orchestrator, RunSummary};
use tracing::{debug, info, warn};

use crate::ProcessExit;
use crate::app::{config_file, exit_handler};
use crate::cli::{Cli, Command};

pub(crate) async fn run_harvester() -> Result<ProcessExit> {
    let cli = Cli::parse();
    init_tracing(resolve_default_log_level(cli.verbose, cli.quiet));
    debug!("CLI arguments parsed");

    let file_config = config_file::load_file_config(cli.config.as_deref())?;
    let config = build_config(&cli, file_config.as_ref())?;

    match cli.subcommand() {
        Command::Status => {
            print_status(&config)?;
            Ok(ProcessExit::Success)
        }
        Command::ResetCursor => {
            let mut state = load_state(&config)?;
            state
                .reset_cursor()
                .context("Failed to persist the reset cursor")?;
            println!(
                "Cursor reset to page 0 ({} indexed files kept)",
                state.index().len()
            );
            Ok(ProcessExit::Success)
        }
        Command::Auto(args) => run_auto(config, args.batch_size).await,
        Command::Scrape(args) => {
            warn!("`scrape` is deprecated, use `auto`");
            run_auto(config, args.batch_size).await
        }
        Command::Download(args) => {
            if !HarvestState::index_exists(&config.index_path) {
                bail!(
                    "No index at '{}'. Run `harvester auto` first to discover files.",
                    config.index_path.display()
                );
            }
            let batch = args.batch_size.unwrap_or(BatchSize::Unbounded);
            let mut state = load_state(&config)?;
            let orchestrator = Orchestrator::new(ChromiumLauncher::new(), Arc::new(config))?;
            let summary = orchestrator
                .run_download(&mut state, args.start, batch)
                .await
                .context("Download run failed")?;
            Ok(report(&summary))
        }
    }
}

async fn run_auto(config: HarvestConfig, batch_override: Option<BatchSize>) -> Result<ProcessExit> {
    let batch = batch_override.unwrap_or(config.batch_size);
    let mut state = load_state(&config)?;
    info!(
        output_dir = %config.output_dir.display(),
        listing = %config.listing_url,
        batch = %batch,
        "harvester starting"
    );
    let orchestrator = Orchestrator::new(ChromiumLauncher::new(), Arc::new(config))?;
    let summary = orchestrator
        .run_auto(&mut state, batch)
        .await
        .context("Harvest run failed")?;
    Ok(report(&summary))
}

fn report(summary: &RunSummary) -> ProcessExit {
    let stats = summary.downloads;
    println!(
        "{}: {} round(s), {} page(s), {} new file(s); downloaded {}, skipped {}, failed {}",
        summary.outcome,
        summary.rounds,
        summary.pages_visited,
        summary.new_files,
        stats.downloaded,
        stats.skipped,
        stats.failed
    );
    if !summary.outcome.is_complete() {
        println!("Run again to resume.");
    }
    exit_handler::determine_exit_outcome(&summary.outcome)
}

fn load_state(config: &HarvestConfig) -> Result<HarvestState> {
    HarvestState::load(&config.index_path, &config.cursor_path).with_context(|| {
        format!(
            "Failed to load harvest state from '{}'",
            config.output_dir.display()
        )
    })
}

fn print_status(config: &HarvestConfig) -> Result<()> {
    let state = load_state(config)?;
    let index = state.index();
    let cursor = state.cursor();
    println!("Output directory: {}", config.output_dir.display());
    println!("Known files:      {}", index.len());
    println!("Downloaded:       {}", index.downloaded_count());
    println!("Pending:          {}", index.pending_count());
    println!("Next page:        {}", cursor.next_page);
    match (cursor.max_page, cursor.end_confirmed) {
        (Some(max), true) => println!("Last page:        {max} (confirmed)"),
        (Some(max), false) => println!("Last page:        {max} (estimated)"),
        (None, _) => println!("Last page:        unknown"),
    }
    if cursor.is_exhausted() {
        println!("Crawl:            exhausted");
    }
    Ok(())
}

/// Layers command-line values over the config file over built-in defaults.
fn build_config(cli: &Cli, file: Option<&config_file::FileConfig>) -> Result<HarvestConfig> {
    let output_dir = cli
        .output_dir
        .clone()
        .or_else(|| file.and_then(|file| file.output_dir.clone()))
        .unwrap_or_else(|| PathBuf::from("."));

    let mut config =
        HarvestConfig::new(output_dir).context("Built-in listing URL failed to parse")?;
    if let Some(file) = file {
        file.apply_to(&mut config)?;
    }
    if let Some(listing_url) = &cli.listing_url {
        config.listing_url = listing_url.clone();
    }
    if cli.headless {
        config.browser.headless = true;
    }
    Ok(config)
}

fn resolve_default_log_level(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_resolution() {
        assert_eq!(resolve_default_log_level(0, false), "info");
        assert_eq!(resolve_default_log_level(1, false), "debug");
        assert_eq!(resolve_default_log_level(3, false), "trace");
        assert_eq!(resolve_default_log_level(2, true), "error");
    }

    #[test]
    fn test_cli_overrides_file_config() {
        let file: config_file::FileConfig = toml::from_str(
            r#"
            output_dir = "/from/file"
            listing_url = "https://file.example/listing"
            [browser]
            headless = false
            "#,
        )
        .unwrap();
        let cli = Cli::try_parse_from([
            "harvester",
            "--output-dir",
            "/from/cli",
            "--headless",
            "status",
        ])
        .unwrap();

        let config = build_config(&cli, Some(&file)).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/from/cli"));
        assert_eq!(config.listing_url.as_str(), "https://file.example/listing");
        assert!(config.browser.headless);
        assert!(config.index_path.starts_with("/from/cli"));
    }

    #[test]
    fn test_defaults_without_file() {
        let cli = Cli::try_parse_from(["harvester"]).unwrap();
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("."));
        assert_eq!(config.batch_size, BatchSize::Limited(100));
        assert!(!config.browser.headless);
    }
}
