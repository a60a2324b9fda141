//! Version table implementation
//!
//! BTreeMap of key → history with RwLock for concurrency.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::wal::{Operation, WalEntry};

use super::{HistoryEntry, TxId};

/// Every key the ledger has seen, with its write history
///
/// ## Concurrency:
/// - `keys`: RwLock, readers share, `apply` takes it exclusively
/// - `committed_lsn`: published after the entry is in `keys`, so a snapshot
///   taken from it never names a half-applied write
pub struct VersionTable {
    keys: RwLock<BTreeMap<Vec<u8>, Vec<HistoryEntry>>>,

    /// LSN of the newest applied entry
    committed_lsn: AtomicU64,

    /// Keys whose latest entry is a value
    live_count: AtomicUsize,

    /// Range/history cursors not yet dropped
    open_cursors: AtomicUsize,
}

impl VersionTable {
    /// Create a new empty table
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(BTreeMap::new()),
            committed_lsn: AtomicU64::new(0),
            live_count: AtomicUsize::new(0),
            open_cursors: AtomicUsize::new(0),
        }
    }

    /// Apply a committed log entry
    ///
    /// Entries must arrive in LSN order; the caller serializes writers.
    pub fn apply(&self, entry: &WalEntry) {
        let (key, value) = match &entry.operation {
            Operation::Put { key, value } => (key, Some(value.clone())),
            Operation::Delete { key } => (key, None),
        };

        let mut keys = self.keys.write();
        let history = keys.entry(key.clone()).or_default();
        let was_live = history.last().map_or(false, |e| !e.is_delete());
        let is_live = value.is_some();

        history.push(HistoryEntry {
            tx_id: TxId(entry.lsn),
            timestamp: entry.timestamp,
            value,
        });

        match (was_live, is_live) {
            (false, true) => {
                self.live_count.fetch_add(1, Ordering::SeqCst);
            }
            (true, false) => {
                self.live_count.fetch_sub(1, Ordering::SeqCst);
            }
            _ => {}
        }

        self.committed_lsn.store(entry.lsn, Ordering::SeqCst);
    }

    /// Current value of a live key
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let keys = self.keys.read();
        keys.get(key)?.last()?.value.clone()
    }

    /// Whether the key's latest entry holds a value
    pub fn is_live(&self, key: &[u8]) -> bool {
        let keys = self.keys.read();
        keys.get(key)
            .and_then(|history| history.last())
            .map_or(false, |e| !e.is_delete())
    }

    /// History entry at `index` for `key`, if committed at or before `as_of`
    pub fn history_at(&self, key: &[u8], index: usize, as_of: u64) -> Option<HistoryEntry> {
        let keys = self.keys.read();
        let entry = keys.get(key)?.get(index)?;
        if entry.tx_id.0 <= as_of {
            Some(entry.clone())
        } else {
            None
        }
    }

    /// Number of history entries for `key` (0 if never written)
    pub fn history_len(&self, key: &[u8]) -> usize {
        self.keys.read().get(key).map_or(0, Vec::len)
    }

    /// First key after `lower` and before `upper` that was live at `as_of`
    ///
    /// Returns the key with the value it held at that commit point.
    pub fn next_live(
        &self,
        lower: Bound<&[u8]>,
        upper: Option<&[u8]>,
        as_of: u64,
    ) -> Option<(Vec<u8>, Vec<u8>)> {
        if let Some(end) = upper {
            let empty = match lower {
                Bound::Included(start) => start >= end,
                Bound::Excluded(start) => start >= end,
                Bound::Unbounded => false,
            };
            if empty {
                return None;
            }
        }
        let upper = upper.map_or(Bound::Unbounded, Bound::Excluded);

        let keys = self.keys.read();
        keys.range::<[u8], _>((lower, upper)).find_map(|(key, history)| {
            let value = history
                .iter()
                .rev()
                .find(|e| e.tx_id.0 <= as_of)?
                .value
                .clone()?;
            Some((key.clone(), value))
        })
    }

    /// LSN of the newest applied entry (the current snapshot point)
    pub fn committed_lsn(&self) -> u64 {
        self.committed_lsn.load(Ordering::SeqCst)
    }

    /// Number of live keys
    pub fn live_count(&self) -> usize {
        self.live_count.load(Ordering::SeqCst)
    }

    /// Number of keys ever written, live or not
    pub fn key_count(&self) -> usize {
        self.keys.read().len()
    }

    /// Number of scan cursors currently open
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    pub(super) fn cursor_opened(&self) {
        self.open_cursors.fetch_add(1, Ordering::SeqCst);
    }

    pub(super) fn cursor_closed(&self) {
        self.open_cursors.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Default for VersionTable {
    fn default() -> Self {
        Self::new()
    }
}
