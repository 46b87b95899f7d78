//! Index record type.

use serde::{Deserialize, Serialize};

/// One discovered file.
///
/// Serialized with the `filename`/`url` keys used by existing index documents;
/// `identity`/`locator` are accepted on input as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Canonical file name taken from the reference path; the dedup key.
    #[serde(rename = "filename", alias = "identity")]
    pub identity: String,
    /// Absolute retrieval URL.
    #[serde(rename = "url", alias = "locator")]
    pub locator: String,
    /// True once the file was durably written and verified.
    #[serde(default)]
    pub downloaded: bool,
}

impl FileRecord {
    /// Creates a pending record.
    #[must_use]
    pub fn new(identity: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            locator: locator.into(),
            downloaded: false,
        }
    }
}
