//! Error types for browser sessions.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while driving the listing browser.
///
/// None of these are fatal to a run: the orchestrator ends the round and the
/// persisted cursor lets the next invocation resume.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// No Chromium executable could be located.
    #[error("browser executable not found: {hint}")]
    ExecutableNotFound {
        /// Where the executable was looked for.
        hint: String,
    },

    /// The browser process or its first page could not be started.
    #[error("failed to launch browser: {message}")]
    Launch {
        /// Launcher diagnostic.
        message: String,
    },

    /// A navigation request failed.
    #[error("navigation to {url} failed: {message}")]
    Navigation {
        /// Target URL.
        url: String,
        /// Protocol diagnostic.
        message: String,
    },

    /// A navigation or settle wait exceeded its bound.
    #[error("navigation to {url} timed out after {timeout:?}")]
    Timeout {
        /// Target URL.
        url: String,
        /// The bound that was exceeded.
        timeout: Duration,
    },

    /// Locating, reading or clicking a page control failed.
    #[error("page interaction failed: {message}")]
    Interaction {
        /// Protocol diagnostic.
        message: String,
    },

    /// Reading or seeding session cookies failed.
    #[error("cookie operation failed: {message}")]
    Cookie {
        /// Protocol diagnostic.
        message: String,
    },

    /// This build carries no browser backend.
    #[error("browser support not compiled in (rebuild with --features browser)")]
    Unavailable,
}

impl BrowserError {
    /// Creates a launch error.
    pub fn launch(message: impl ToString) -> Self {
        Self::Launch {
            message: message.to_string(),
        }
    }

    /// Creates a navigation error.
    pub fn navigation(url: impl Into<String>, message: impl ToString) -> Self {
        Self::Navigation {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Creates a navigation timeout error.
    pub fn timeout(url: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            url: url.into(),
            timeout,
        }
    }

    /// Creates an interaction error.
    pub fn interaction(message: impl ToString) -> Self {
        Self::Interaction {
            message: message.to_string(),
        }
    }

    /// Creates a cookie error.
    pub fn cookie(message: impl ToString) -> Self {
        Self::Cookie {
            message: message.to_string(),
        }
    }
}
