//! Listing traversal.
//!
//! A [`Navigator`] owns one browser session for one crawl round: it opens the
//! listing, clicks through the age interstitial, walks forward with the
//! "Next page" control until the persisted cursor is reached, and then
//! harvests file references page by page into the index.

mod navigator;

use std::fmt;

pub use navigator::{GateResolution, Navigator};

/// Why a crawl round ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The round discovered at least the configured number of new files.
    BatchFilled,
    /// The last visited page had no "Next page" control.
    NoNextPage { page: u64 },
    /// No file references on the page, even after rechecks.
    NoLinks { page: u64 },
    /// The gateway answered with an access-denial page.
    Blocked { page: u64 },
    /// The "Next page" control disappeared before the cursor was reached.
    CursorUnreachable { reached: u64, target: u64 },
    /// A browser interaction failed mid-round.
    Aborted { page: u64, reason: String },
}

impl StopReason {
    /// True when the listing has nothing further to offer this invocation.
    #[must_use]
    pub fn is_end_of_listing(&self) -> bool {
        matches!(self, Self::NoNextPage { .. } | Self::NoLinks { .. })
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BatchFilled => f.write_str("batch filled"),
            Self::NoNextPage { page } => write!(f, "no next page after page {page}"),
            Self::NoLinks { page } => write!(f, "no file links on page {page}"),
            Self::Blocked { page } => write!(f, "access denied on page {page}"),
            Self::CursorUnreachable { reached, target } => {
                write!(f, "could not page forward past {reached} to reach page {target}")
            }
            Self::Aborted { page, reason } => write!(f, "aborted on page {page}: {reason}"),
        }
    }
}

/// Outcome of one crawl round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundReport {
    /// Pages whose links were recorded.
    pub pages_visited: u64,
    /// Identities appended to the index, in discovery order.
    pub new_identities: Vec<String>,
    pub stop: StopReason,
}

impl RoundReport {
    #[must_use]
    pub fn found_nothing(&self) -> bool {
        self.new_identities.is_empty()
    }
}
