//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::fs::{self, OpenOptions};
use std::path::Path;

use crate::error::{LedgerError, Result};

use super::{WalEntry, WalReader};

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries skipped
    pub entries_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Whether the WAL was truncated (partial writes removed)
    ///
    /// From `verify`, whether `recover` would truncate it.
    pub was_truncated: bool,
}

/// Outcome of reading a log up to its first bad frame
struct Scan {
    entries: Vec<WalEntry>,
    result: RecoveryResult,
    /// Length of the valid prefix in bytes
    valid_len: u64,
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Read all valid entries
    /// 2. Stop at the first corrupted entry or partial write
    /// 3. Truncate everything after the last valid entry
    /// 4. Return all valid entries in order
    pub fn recover(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let scan = Self::scan(path)?;

        if scan.result.was_truncated {
            tracing::warn!(
                "Truncating WAL {} at byte {} after {} valid entries",
                path.display(),
                scan.valid_len,
                scan.result.entries_recovered
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(scan.valid_len)?;
            file.sync_all()?;
        }

        Ok((scan.entries, scan.result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        Ok(Self::scan(path)?.result)
    }

    /// Read entries until the first bad frame
    ///
    /// Nothing after a bad frame can be trusted to be framed correctly, so the
    /// whole tail counts as one corrupted entry.
    fn scan(path: &Path) -> Result<Scan> {
        let file_len = fs::metadata(path)?.len();
        let mut reader = WalReader::open(path)?;
        let mut entries = Vec::new();
        let mut result = RecoveryResult::default();
        let mut valid_len = 0;

        loop {
            match reader.next_entry() {
                Ok(Some(entry)) => {
                    if entry.lsn <= result.last_lsn {
                        tracing::warn!(
                            "Non-monotonic LSN {} after {} in {}",
                            entry.lsn,
                            result.last_lsn,
                            path.display()
                        );
                        result.entries_corrupted += 1;
                        break;
                    }
                    result.last_lsn = entry.lsn;
                    result.entries_recovered += 1;
                    valid_len = reader.position();
                    entries.push(entry);
                }
                Ok(None) => break,
                Err(LedgerError::WalCorruption(reason)) | Err(LedgerError::Serialization(reason)) => {
                    tracing::warn!("WAL corruption in {}: {}", path.display(), reason);
                    result.entries_corrupted += 1;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        result.was_truncated = valid_len < file_len;

        Ok(Scan {
            entries,
            result,
            valid_len,
        })
    }
}
