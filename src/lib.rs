//! Harvester Core Library
//!
//! This library drives a resumable, rate-limited bulk acquisition of a large
//! paginated document listing served behind a bot-resistant gateway. It walks
//! the listing through a real browser session, deduplicates discovered file
//! references into a persisted index, and streams each file to local storage.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`config`] - Immutable run configuration shared by every component
//! - [`state`] - Persisted index and crawl cursor documents
//! - [`parser`] - Link extraction and access-gate classification over markup
//! - [`browser`] - Browser collaborator seam and the Chromium driver
//! - [`crawl`] - Listing navigation with session-preserving pagination
//! - [`download`] - Streaming download engine with retry support
//! - [`auth`] - Session cookies shared between the browser and HTTP client
//! - [`orchestrator`] - Drain/crawl state machine tying it all together
//! - [`error`] - Run-level error type

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod browser;
pub mod config;
pub mod crawl;
pub mod download;
pub mod error;
pub mod orchestrator;
pub mod parser;
pub mod state;
mod user_agent;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use auth::{SessionCookie, load_cookies_into_jar};
pub use browser::{BrowserDriver, BrowserError, BrowserLauncher, ControlDescriptor};
pub use config::{BatchSize, HarvestConfig};
pub use crawl::{GateResolution, Navigator, RoundReport, StopReason};
pub use download::{
    BatchStats, DownloadError, DownloadSession, Downloader, HttpClient, RetryPolicy, StaticSession,
};
pub use error::HarvestError;
pub use orchestrator::{Orchestrator, RunOutcome, RunSummary};
pub use parser::{GateState, LinkPattern, classify_gate, extract_links};
pub use state::{CrawlCursor, FileRecord, HarvestState, Index, StateError};
