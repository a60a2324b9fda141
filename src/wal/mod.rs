//! Write-Ahead Log (WAL) Module
//!
//! The commit log that orders and persists every ledger write.
//!
//! ## Responsibilities
//! - Assign each write a Log Sequence Number (LSN), used as its transaction id
//! - Stamp each write with its commit time
//! - CRC32 checksums for corruption detection
//! - Crash recovery and replay
//!
//! Unlike a conventional WAL this log is never truncated after a checkpoint:
//! it is the ledger's full history, and the version table is rebuilt from it
//! on open.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Entry 1                                 │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Entry 2                                 │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! └─────────────────────────────────────────┘
//! ```

mod entry;
mod writer;
mod reader;
mod recovery;

pub use entry::{WalEntry, Operation, HEADER_SIZE, MAX_ENTRY_SIZE};
pub use writer::{LogSink, WalWriter};
pub use reader::{WalReader, WalIterator};
pub use recovery::{WalRecovery, RecoveryResult};

use crate::error::Result;

/// The ordering and durability seam between the ledger and its host
///
/// Implementations assign LSNs and timestamps; the ledger trusts that LSNs
/// are strictly increasing in append order.
pub trait CommitLog: Send {
    /// Durably record an operation and return the committed entry
    fn append(&mut self, operation: Operation) -> Result<WalEntry>;

    /// Flush anything buffered to stable storage
    fn sync(&mut self) -> Result<()>;

    /// LSN the next append will receive
    fn next_lsn(&self) -> u64;
}

/// Volatile commit log for tests and ephemeral ledgers
#[derive(Debug)]
pub struct MemoryLog {
    next_lsn: u64,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self { next_lsn: 1 }
    }
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl CommitLog for MemoryLog {
    fn append(&mut self, operation: Operation) -> Result<WalEntry> {
        let entry = WalEntry::new(self.next_lsn, operation);
        self.next_lsn += 1;
        Ok(entry)
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }

    fn next_lsn(&self) -> u64 {
        self.next_lsn
    }
}
