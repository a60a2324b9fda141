//! Scan cursors
//!
//! Lazy, snapshot-bound iterators over the version table. Each `next()`
//! takes the table's read lock only for the duration of that step.

use std::ops::Bound;
use std::sync::Arc;

use super::{HistoryEntry, VersionTable};

/// Registration of an open cursor, released on drop
struct CursorLease {
    table: Arc<VersionTable>,
}

impl CursorLease {
    fn acquire(table: Arc<VersionTable>) -> Self {
        table.cursor_opened();
        Self { table }
    }
}

impl Drop for CursorLease {
    fn drop(&mut self) {
        self.table.cursor_closed();
    }
}

/// Iterator over live `(key, value)` pairs in `[start, end)`
///
/// Keys come out in byte-wise order, as they stood at the commit point
/// captured when the scan was opened.
pub struct RangeIter {
    lease: CursorLease,
    /// Where the next step resumes
    position: Bound<Vec<u8>>,
    /// Exclusive upper bound, `None` = to the end
    end: Option<Vec<u8>>,
    as_of: u64,
    done: bool,
}

impl RangeIter {
    /// Open a scan; an empty `start` or `end` leaves that side unbounded
    pub fn new(table: Arc<VersionTable>, start: &[u8], end: &[u8]) -> Self {
        let as_of = table.committed_lsn();
        let position = if start.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Included(start.to_vec())
        };
        let end = if end.is_empty() { None } else { Some(end.to_vec()) };

        Self {
            lease: CursorLease::acquire(table),
            position,
            end,
            as_of,
            done: false,
        }
    }

    /// Commit point this scan reads at
    pub fn as_of(&self) -> u64 {
        self.as_of
    }
}

impl Iterator for RangeIter {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let lower = match &self.position {
            Bound::Included(k) => Bound::Included(k.as_slice()),
            Bound::Excluded(k) => Bound::Excluded(k.as_slice()),
            Bound::Unbounded => Bound::Unbounded,
        };

        match self
            .lease
            .table
            .next_live(lower, self.end.as_deref(), self.as_of)
        {
            Some((key, value)) => {
                self.position = Bound::Excluded(key.clone());
                Some((key, value))
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

/// Iterator over a key's history entries, oldest first
pub struct HistoryIter {
    lease: CursorLease,
    key: Vec<u8>,
    index: usize,
    as_of: u64,
}

impl HistoryIter {
    pub fn new(table: Arc<VersionTable>, key: &[u8]) -> Self {
        let as_of = table.committed_lsn();
        Self {
            lease: CursorLease::acquire(table),
            key: key.to_vec(),
            index: 0,
            as_of,
        }
    }

    /// Key whose history is being read
    pub fn key(&self) -> &[u8] {
        &self.key
    }
}

impl Iterator for HistoryIter {
    type Item = HistoryEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self
            .lease
            .table
            .history_at(&self.key, self.index, self.as_of)?;
        self.index += 1;
        Some(entry)
    }
}
