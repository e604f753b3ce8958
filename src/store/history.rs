//! # History Ring
//!
//! Fixed-capacity FIFO of archived runs. Appended to only at rollover.

use std::collections::VecDeque;

use chrono::NaiveDate;

use crate::status::timestamp::Timestamp;
use crate::status::StatusDocument;

/// Default number of archived runs kept
pub const DEFAULT_HISTORY_CAPACITY: usize = 7;

/// One archived run with its freshness timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub document: StatusDocument,
    pub last_modified: Timestamp,
}

impl HistoryEntry {
    /// Archives `document`, caching its last-modified time.
    #[must_use]
    pub fn new(document: StatusDocument) -> Self {
        let last_modified = document.last_modified();
        Self {
            document,
            last_modified,
        }
    }
}

/// Circular buffer of past runs, oldest evicted first.
#[derive(Debug, Clone)]
pub struct HistoryRing {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl Default for HistoryRing {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistoryRing {
    /// Creates a ring holding up to `capacity` runs (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends an entry, evicting the oldest when full.
    pub fn push(&mut self, entry: HistoryEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Most recently archived run.
    #[must_use]
    pub fn newest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// Newest run whose capture started on `date`.
    ///
    /// Entries without a usable start time never match.
    #[must_use]
    pub fn find_by_date(&self, date: NaiveDate) -> Option<&HistoryEntry> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.document.run_date() == Some(date))
    }

    /// Start dates of all archived runs, oldest first, skipping entries
    /// without a usable start time.
    #[must_use]
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.entries
            .iter()
            .filter_map(|entry| entry.document.run_date())
            .collect()
    }
}
