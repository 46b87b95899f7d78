//! Streaming file downloads with retry and session refresh.
//!
//! - [`HttpClient`] streams one URL to disk through a `.part` file.
//! - [`Downloader`] works through a batch of index records sequentially.
//! - [`RetryPolicy`] and [`classify_error`] decide whether a failed attempt is
//!   retried.
//! - [`DownloadSession`] supplies the cookies the client carries.

mod client;
mod engine;
mod error;
mod retry;
mod session;

pub use client::HttpClient;
pub use engine::{BatchStats, Downloader};
pub use error::DownloadError;
pub use retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
pub use session::{DownloadSession, StaticSession};
