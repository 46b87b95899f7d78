//! Run-level error type.

use thiserror::Error;

use crate::download::DownloadError;
use crate::state::StateError;

/// Errors surfaced at the orchestrator boundary.
///
/// Browser and download failures during a run are converted into stop
/// reasons and counters before they reach this point. What remains ends the
/// process: persistence failures, an unusable file-reference pattern, and an
/// HTTP client that cannot be built.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// The index or cursor could not be persisted.
    #[error(transparent)]
    State(#[from] StateError),

    /// The download client could not be constructed.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// The configured collection marker or extension does not form a valid pattern.
    #[error("invalid file reference pattern: {0}")]
    Pattern(#[from] regex::Error),
}
