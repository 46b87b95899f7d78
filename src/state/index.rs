//! In-memory index of discovered files.

use std::collections::HashMap;

use tracing::warn;

use super::FileRecord;
use crate::config::BatchSize;

/// Discovery-ordered set of [`FileRecord`]s, unique by identity.
#[derive(Debug, Clone, Default)]
pub struct Index {
    records: Vec<FileRecord>,
    positions: HashMap<String, usize>,
}

impl Index {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from persisted records, keeping the first record for
    /// any repeated identity.
    #[must_use]
    pub fn from_records(records: Vec<FileRecord>) -> Self {
        let mut index = Self::new();
        for record in records {
            let identity = record.identity.clone();
            if !index.insert(record) {
                warn!(identity = %identity, "dropping duplicate record from persisted index");
            }
        }
        index
    }

    /// Appends `record` unless its identity is already known.
    ///
    /// Returns `true` when the record was added.
    pub fn insert(&mut self, record: FileRecord) -> bool {
        if self.positions.contains_key(&record.identity) {
            return false;
        }
        self.positions
            .insert(record.identity.clone(), self.records.len());
        self.records.push(record);
        true
    }

    /// Flags `identity` as downloaded.
    ///
    /// Returns `true` only when the flag flipped from false to true; unknown
    /// identities and already-downloaded records return `false`.
    pub fn mark_downloaded(&mut self, identity: &str) -> bool {
        let Some(&position) = self.positions.get(identity) else {
            return false;
        };
        let record = &mut self.records[position];
        if record.downloaded {
            return false;
        }
        record.downloaded = true;
        true
    }

    #[must_use]
    pub fn get(&self, identity: &str) -> Option<&FileRecord> {
        self.positions
            .get(identity)
            .map(|&position| &self.records[position])
    }

    #[must_use]
    pub fn contains(&self, identity: &str) -> bool {
        self.positions.contains_key(identity)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in discovery order.
    #[must_use]
    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    #[must_use]
    pub fn downloaded_count(&self) -> usize {
        self.records.iter().filter(|r| r.downloaded).count()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.len() - self.downloaded_count()
    }

    /// Identities of pending records in discovery order, capped by `limit`.
    #[must_use]
    pub fn pending(&self, limit: BatchSize) -> Vec<String> {
        let pending = self
            .records
            .iter()
            .filter(|r| !r.downloaded)
            .map(|r| r.identity.clone());
        match limit.cap() {
            Some(cap) => pending.take(cap).collect(),
            None => pending.collect(),
        }
    }

    /// Identities from position `start` onward, capped by `limit`.
    #[must_use]
    pub fn slice_from(&self, start: usize, limit: BatchSize) -> Vec<String> {
        let tail = self
            .records
            .iter()
            .skip(start)
            .map(|r| r.identity.clone());
        match limit.cap() {
            Some(cap) => tail.take(cap).collect(),
            None => tail.collect(),
        }
    }
}
