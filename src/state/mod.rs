//! Persisted crawl state: the file index and the crawl cursor.
//!
//! [`HarvestState`] owns both documents and flushes them to disk after every
//! mutation. It is owned by the orchestrator and lent (`&mut`) to the
//! navigator and downloader for the duration of a round or batch.
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::state::{FileRecord, HarvestState};
//! use std::path::Path;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut state = HarvestState::load(Path::new("out/index.json"), Path::new("out/state.json"))?;
//! let added = state.record_discovered(vec![FileRecord::new("a.pdf", "https://host/a.pdf")])?;
//! println!("{} new, {} known", added.len(), state.index().len());
//! # Ok(())
//! # }
//! ```

mod cursor;
mod error;
mod index;
mod record;
mod store;

use std::path::{Path, PathBuf};

use tracing::{debug, info};

pub use cursor::CrawlCursor;
pub use error::StateError;
pub use index::Index;
pub use record::FileRecord;

/// Index and cursor together with the paths they persist to.
#[derive(Debug)]
pub struct HarvestState {
    index: Index,
    cursor: CrawlCursor,
    index_path: PathBuf,
    cursor_path: PathBuf,
}

impl HarvestState {
    /// Loads both documents, starting empty when a document does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if a document exists but is unreadable or
    /// malformed.
    pub fn load(index_path: &Path, cursor_path: &Path) -> Result<Self, StateError> {
        let records: Vec<FileRecord> = store::read_json(index_path)?.unwrap_or_default();
        let cursor: CrawlCursor = store::read_json(cursor_path)?.unwrap_or_default();
        let index = Index::from_records(records);
        info!(
            known = index.len(),
            downloaded = index.downloaded_count(),
            next_page = cursor.next_page,
            max_page = ?cursor.max_page,
            end_confirmed = cursor.end_confirmed,
            "loaded harvest state"
        );
        Ok(Self {
            index,
            cursor,
            index_path: index_path.to_path_buf(),
            cursor_path: cursor_path.to_path_buf(),
        })
    }

    /// True when an index document exists on disk.
    #[must_use]
    pub fn index_exists(index_path: &Path) -> bool {
        index_path.exists()
    }

    #[must_use]
    pub fn index(&self) -> &Index {
        &self.index
    }

    #[must_use]
    pub fn cursor(&self) -> &CrawlCursor {
        &self.cursor
    }

    /// Appends records whose identity is new, in order, and persists the
    /// index when anything was added.
    ///
    /// Returns the identities that were added.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the index cannot be persisted.
    pub fn record_discovered(
        &mut self,
        records: impl IntoIterator<Item = FileRecord>,
    ) -> Result<Vec<String>, StateError> {
        let mut added = Vec::new();
        for record in records {
            let identity = record.identity.clone();
            if self.index.insert(record) {
                added.push(identity);
            }
        }
        if !added.is_empty() {
            self.flush_index()?;
        }
        Ok(added)
    }

    /// Flags a record as downloaded and persists the index.
    ///
    /// Returns `true` when the flag flipped.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the index cannot be persisted.
    pub fn mark_downloaded(&mut self, identity: &str) -> Result<bool, StateError> {
        let flipped = self.index.mark_downloaded(identity);
        self.flush_index()?;
        Ok(flipped)
    }

    /// Advances the cursor and persists it.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the cursor cannot be persisted.
    pub fn advance_cursor(&mut self, next_page: u64) -> Result<(), StateError> {
        if self.cursor.advance_to(next_page) {
            debug!(next_page, "cursor advanced");
        }
        self.flush_cursor()
    }

    /// Records an estimated last listing page and persists the cursor.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the cursor cannot be persisted.
    pub fn record_max_page(&mut self, max_page: u64) -> Result<(), StateError> {
        if self.cursor.estimate_max_page(max_page) {
            self.flush_cursor()?;
        }
        Ok(())
    }

    /// Records `last_page` as the confirmed end of the listing and persists
    /// the cursor.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the cursor cannot be persisted.
    pub fn confirm_end(&mut self, last_page: u64) -> Result<(), StateError> {
        if self.cursor.confirm_end(last_page) {
            debug!(last_page, "end of listing confirmed");
            self.flush_cursor()?;
        }
        Ok(())
    }

    /// Manual reset of the cursor to page 0. The index is untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the cursor cannot be persisted.
    pub fn reset_cursor(&mut self) -> Result<(), StateError> {
        self.cursor.reset();
        self.flush_cursor()
    }

    /// Rewrites the index document.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] on any write failure.
    pub fn flush_index(&self) -> Result<(), StateError> {
        store::write_json_atomic(&self.index_path, self.index.records())
    }

    /// Rewrites the cursor document.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] on any write failure.
    pub fn flush_cursor(&self) -> Result<(), StateError> {
        store::write_json_atomic(&self.cursor_path, &self.cursor)
    }

    /// Writes a markup snapshot next to the state documents.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] if the snapshot cannot be written.
    pub fn write_snapshot(&self, path: &Path, markup: &str) -> Result<(), StateError> {
        store::write_snapshot(path, markup)?;
        info!(path = %path.display(), "saved page snapshot");
        Ok(())
    }
}
