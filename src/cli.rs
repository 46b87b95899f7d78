//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use harvester_core::BatchSize;
use url::Url;

/// Resumable bulk download of a paginated document listing.
///
/// Walks the listing in a real browser session, records every file reference
/// in an index next to the downloads, and streams each file to disk. Safe to
/// interrupt at any point; the next invocation resumes where this one stopped.
#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding downloads, the index and the cursor
    #[arg(short = 'o', long, global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Listing page 0 to crawl
    #[arg(long, global = true, value_name = "URL")]
    pub listing_url: Option<Url>,

    /// Hide the browser window
    #[arg(long, global = true)]
    pub headless: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Drain pending downloads, then crawl new pages until nothing new turns up (default)
    Auto(BatchArgs),

    /// Download indexed files starting at an index position, without crawling
    Download(DownloadArgs),

    /// Show index totals and crawl progress
    Status,

    /// Restart the crawl from page 0, keeping the index
    ResetCursor,

    /// Deprecated alias of `auto`
    #[command(hide = true)]
    Scrape(BatchArgs),
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchArgs {
    /// New files per round: a number, or `all` to drain each round completely
    #[arg(short = 'b', long, value_name = "N|all")]
    pub batch_size: Option<BatchSize>,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadArgs {
    /// Index position to start from (0-based)
    #[arg(long, default_value_t = 0)]
    pub start: usize,

    /// Maximum number of records to process: a number, or `all`
    #[arg(short = 'b', long, value_name = "N|all")]
    pub batch_size: Option<BatchSize>,
}

impl Cli {
    /// The subcommand to run, `auto` when none was given.
    #[must_use]
    pub fn subcommand(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Auto(BatchArgs::default()))
    }
}
