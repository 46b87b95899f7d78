//! Crawl progress cursor.

use serde::{Deserialize, Serialize};

/// Persisted pointer to the next unvisited listing page.
///
/// Written as `{nextPage, maxPage, endConfirmed}`; snake_case documents are
/// read as well.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlCursor {
    /// Next listing page to visit (0-based).
    #[serde(default, rename = "nextPage", alias = "next_page")]
    pub next_page: u64,
    /// Last listing page, when known. Only an estimate unless
    /// `end_confirmed` is set.
    #[serde(default, rename = "maxPage", alias = "max_page")]
    pub max_page: Option<u64>,
    /// Set when a crawl reached a page with no "Next page" control.
    #[serde(default, rename = "endConfirmed", alias = "end_confirmed")]
    pub end_confirmed: bool,
}

impl CrawlCursor {
    /// Moves the cursor forward to `next_page`; never moves it back.
    ///
    /// Returns `true` when the cursor moved.
    pub fn advance_to(&mut self, next_page: u64) -> bool {
        if next_page > self.next_page {
            self.next_page = next_page;
            true
        } else {
            false
        }
    }

    /// Records an estimated last page. Replaces any confirmed end.
    ///
    /// Returns `true` when the cursor changed.
    pub fn estimate_max_page(&mut self, max_page: u64) -> bool {
        let changed = self.max_page != Some(max_page) || self.end_confirmed;
        self.max_page = Some(max_page);
        self.end_confirmed = false;
        changed
    }

    /// Records `last_page` as the definitive end of the listing.
    ///
    /// Returns `true` when the cursor changed.
    pub fn confirm_end(&mut self, last_page: u64) -> bool {
        let changed = self.max_page != Some(last_page) || !self.end_confirmed;
        self.max_page = Some(last_page);
        self.end_confirmed = true;
        changed
    }

    /// True when a crawl saw the last page and every page up to it has been
    /// visited. An estimated `max_page` never exhausts the cursor.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.end_confirmed && self.max_page.is_some_and(|max| self.next_page > max)
    }

    /// Manual reset back to page 0.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
