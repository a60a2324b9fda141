//! Ledger Module
//!
//! In-memory view of the commit log: every key with its full write history.
//!
//! ## Responsibilities
//! - Keep per-key history entries in commit order (append-only)
//! - Answer "is this key live" and "what is its value" from the latest entry
//! - Serve range and history scans as of a commit point (snapshot reads)
//! - Track open scan cursors so leaks are observable
//!
//! ## Data Structure Choice
//! BTreeMap keyed by raw key bytes inside a RwLock:
//! - Ordered keys give byte-wise lexicographic range scans for free
//! - History is never purged, so any past commit point can be reconstructed
//!   by ignoring entries with a later LSN

mod table;
mod cursor;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

pub use table::VersionTable;
pub use cursor::{HistoryIter, RangeIter};

/// Largest key accepted by the ledger (64 KB)
pub const MAX_KEY_SIZE: usize = 64 * 1024;

/// Transaction identifier assigned by the commit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxId(pub u64);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// One committed write (or deletion) of a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Transaction that produced this entry
    pub tx_id: TxId,

    /// Commit time (unix millis)
    pub timestamp: u64,

    /// Resulting value, `None` for a deletion
    pub value: Option<Vec<u8>>,
}

impl HistoryEntry {
    /// True when this entry records a deletion
    pub fn is_delete(&self) -> bool {
        self.value.is_none()
    }
}

/// Reject keys the ledger cannot store
pub fn validate_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(LedgerError::InvalidKey("key must not be empty".to_string()));
    }
    if key.len() > MAX_KEY_SIZE {
        return Err(LedgerError::InvalidKey(format!(
            "key is {} bytes (max {})",
            key.len(),
            MAX_KEY_SIZE
        )));
    }
    Ok(())
}
