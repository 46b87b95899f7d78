//! Error types for the download module.
//!
//! Every variant carries the URL or path it concerns so a failed attempt can
//! be logged without extra bookkeeping by the caller.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while fetching one file.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Any status other than 200.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The server answered with a page instead of the file, usually the
    /// age-verification interstitial or an error page.
    #[error("HTML response ({content_type}) downloading {url}")]
    HtmlPayload {
        /// The URL that returned markup.
        url: String,
        /// The offending Content-Type header value.
        content_type: String,
    },

    /// The response completed with a zero-length body.
    #[error("empty body downloading {url}")]
    EmptyBody {
        /// The URL that returned nothing.
        url: String,
    },

    /// File system error during download (create file, write, rename).
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    Client {
        #[source]
        source: reqwest::Error,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a network or timeout error depending on what `source` reports.
    pub fn from_transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::timeout(url)
        } else {
            Self::network(url, source)
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an HTML payload error.
    pub fn html_payload(url: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self::HtmlPayload {
            url: url.into(),
            content_type: content_type.into(),
        }
    }

    /// Creates an empty body error.
    pub fn empty_body(url: impl Into<String>) -> Self {
        Self::EmptyBody { url: url.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// True when the response was markup instead of the expected file.
    #[must_use]
    pub fn is_html_payload(&self) -> bool {
        matches!(self, Self::HtmlPayload { .. })
    }
}

// No From<reqwest::Error> or From<std::io::Error>: every variant needs a URL
// or path that the source error does not carry.
