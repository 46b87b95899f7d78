//! Error types for state persistence.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading or writing the persisted documents.
///
/// Every write failure is fatal for a run: durability is the only thing that
/// makes resumption safe, so callers propagate these instead of continuing
/// with unflushed in-memory state.
#[derive(Debug, Error)]
pub enum StateError {
    /// File system error (create, write, rename, read).
    #[error("IO error on {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Document could not be encoded or decoded.
    #[error("malformed state document {path}: {source}")]
    Json {
        /// The document path.
        path: PathBuf,
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

impl StateError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a JSON error.
    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}
