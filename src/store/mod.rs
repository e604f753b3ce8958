//! # Telemetry Store
//!
//! Holds the current [`StatusDocument`] and the [`HistoryRing`] of archived
//! runs behind a single lock.
//!
//! This module handles:
//! - Accepting new documents from the polling driver (the only writer)
//! - Archiving the previous document at the end-of-day boundary
//! - Resetting run counters when the archived run had already ended
//! - Serving deep copies and freshness timestamps to any number of readers
//!
//! Every method holds the lock for its full duration and does nothing but
//! in-memory copies while holding it.

pub mod history;

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use tracing::info;

use crate::error::{Result, TelemetryError};
use crate::status::timestamp::{sentinel, Timestamp};
use crate::status::StatusDocument;

pub use history::{HistoryEntry, HistoryRing, DEFAULT_HISTORY_CAPACITY};

#[derive(Debug)]
struct StoreInner {
    current: StatusDocument,
    current_modified: Timestamp,
    history: HistoryRing,
}

/// Shared telemetry state.
///
/// Wrap in an `Arc` to share between the driver thread and HTTP handlers.
#[derive(Debug)]
pub struct TelemetryStore {
    inner: Mutex<StoreInner>,
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl TelemetryStore {
    /// Creates an empty store keeping up to `max_history` archived runs.
    #[must_use]
    pub fn new(max_history: usize) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                current: StatusDocument::new(),
                current_modified: sentinel(),
                history: HistoryRing::new(max_history),
            }),
        }
    }

    // The guarded data is only ever replaced wholesale, so a poisoned lock
    // still holds a complete document.
    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the current document.
    ///
    /// If `doc` carries the end-of-day marker, the previous document is
    /// archived first. When that archived run was no longer capturing, the
    /// run counters of `doc` are zeroed so the new day starts clean. Error
    /// and critical lines are dropped at every rollover. The marker is
    /// cleared before `doc` is stored.
    ///
    /// # Returns
    ///
    /// `true` if a rollover was performed.
    pub fn set_current(&self, doc: StatusDocument) -> bool {
        let mut doc = doc;
        let rolled_over = doc.end_of_day;
        let mut archived_date = None;

        let mut inner = self.lock();
        if rolled_over {
            doc.end_of_day = false;

            let was_running = inner
                .current
                .capture
                .as_ref()
                .is_some_and(|capture| capture.running);

            if !inner.current.is_untouched() {
                let entry = HistoryEntry::new(inner.current.clone());
                archived_date = entry.document.run_date();
                inner.history.push(entry);
            }

            if !was_running {
                doc.reset_run_counters();
            }
            doc.error.clear();
            doc.critical.clear();
        }

        inner.current_modified = doc.last_modified();
        inner.current = doc;
        let archived = inner.history.len();
        drop(inner);

        if rolled_over {
            match archived_date {
                Some(date) => info!("Archived run of {} ({} in history)", date, archived),
                None => info!("Day rollover ({} in history)", archived),
            }
        }
        rolled_over
    }

    /// Copy of the current document.
    #[must_use]
    pub fn get_current(&self) -> StatusDocument {
        self.lock().current.clone()
    }

    /// Latest mutation time of the current document.
    #[must_use]
    pub fn current_last_modified(&self) -> Timestamp {
        self.lock().current_modified
    }

    /// Copy of the current document together with its last-modified time.
    #[must_use]
    pub fn current_entry(&self) -> HistoryEntry {
        let inner = self.lock();
        HistoryEntry {
            document: inner.current.clone(),
            last_modified: inner.current_modified,
        }
    }

    /// Look up an archived run.
    ///
    /// # Arguments
    ///
    /// * `date` - Start date of the wanted run, or `None` for the newest
    ///
    /// # Errors
    ///
    /// Returns `HistoryEmpty` if nothing has been archived yet, and
    /// `HistoryNotFound` if no archived run started on `date`
    pub fn get_history(&self, date: Option<NaiveDate>) -> Result<HistoryEntry> {
        let inner = self.lock();
        if inner.history.is_empty() {
            return Err(TelemetryError::HistoryEmpty);
        }
        match date {
            None => inner.history.newest().cloned().ok_or(TelemetryError::HistoryEmpty),
            Some(date) => inner
                .history
                .find_by_date(date)
                .cloned()
                .ok_or(TelemetryError::HistoryNotFound(date)),
        }
    }

    /// Last-modified time of the newest archived run.
    #[must_use]
    pub fn history_last_modified(&self) -> Option<Timestamp> {
        self.lock().history.newest().map(|entry| entry.last_modified)
    }

    /// Start dates of the archived runs, oldest first.
    #[must_use]
    pub fn list_history_dates(&self) -> Vec<NaiveDate> {
        self.lock().history.dates()
    }

    /// Number of archived runs.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.lock().history.len()
    }
}
