//! Retry logic with linear backoff for failed file fetches.
//!
//! When a fetch fails, the error is classified into a [`FailureType`]:
//! - [`FailureType::Transient`] - network trouble, timeouts, non-200 status,
//!   empty bodies, local write failures
//! - [`FailureType::SessionExpired`] - the server answered with markup; the
//!   session should be re-verified before the next attempt
//! - [`FailureType::Permanent`] - a malformed locator or an unusable client
//!
//! The [`RetryPolicy`] then decides whether another attempt is made and how
//! long to wait first: `attempt × backoff_base`.
//!
//! # Example
//!
//! ```
//! use harvester_core::download::{
//!     DownloadError, RetryDecision, RetryPolicy, classify_error,
//! };
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new(5, Duration::from_secs(2));
//! let error = DownloadError::http_status("https://example.com/file.pdf", 503);
//!
//! match policy.should_retry(classify_error(&error), 2) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         assert_eq!(delay, Duration::from_secs(4));
//!         assert_eq!(attempt, 3);
//!     }
//!     RetryDecision::DoNotRetry { reason } => panic!("{reason}"),
//! }
//! ```

use std::time::Duration;

use tracing::{debug, instrument};

use super::DownloadError;
use crate::config::DownloadSettings;

/// Classification of fetch failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    Transient,

    /// Markup came back instead of the file. Retryable once the session has
    /// been re-verified.
    SessionExpired,

    /// Failure that won't succeed regardless of retries.
    Permanent,
}

/// Decision on whether to retry a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Give up on this file for the current batch.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Bounded attempts with a linearly growing pause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Delay unit; the pause after attempt `n` is `n * backoff_base`.
    backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&DownloadSettings::default())
    }
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
        }
    }

    /// Creates the policy configured for downloads.
    #[must_use]
    pub fn from_settings(settings: &DownloadSettings) -> Self {
        Self::new(settings.max_attempts, settings.backoff_base)
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Determines whether to retry after `attempt` (1-indexed) failed.
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.delay_after(attempt);
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );
        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    /// Pause that follows failed attempt `attempt`.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(attempt)
    }
}

/// Classifies a download error into a failure type for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | HttpStatus (any non-200) | Transient |
/// | Timeout / Network | Transient |
/// | EmptyBody | Transient |
/// | Io | Transient |
/// | HtmlPayload | SessionExpired |
/// | InvalidUrl / Client | Permanent |
#[instrument]
pub fn classify_error(error: &DownloadError) -> FailureType {
    match error {
        DownloadError::HttpStatus { .. }
        | DownloadError::Timeout { .. }
        | DownloadError::Network { .. }
        | DownloadError::EmptyBody { .. }
        | DownloadError::Io { .. } => FailureType::Transient,

        DownloadError::HtmlPayload { .. } => FailureType::SessionExpired,

        DownloadError::InvalidUrl { .. } | DownloadError::Client { .. } => FailureType::Permanent,
    }
}
