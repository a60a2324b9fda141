//! WAL Writer
//!
//! Handles appending entries to the WAL file.
//!
//! An append either lands completely or not at all: if writing or syncing a
//! frame fails, the file is cut back to its length before the append so the
//! failed entry can never be replayed. If that rollback fails too, the
//! writer refuses all further appends.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::{LedgerError, Result};

use super::{CommitLog, Operation, WalEntry, WalRecovery};

/// Byte sink underneath a [`WalWriter`]
///
/// Implemented for `File`; other implementations let tests inject failures.
pub trait LogSink: Write + Send {
    /// Force written bytes to stable storage
    fn sync(&mut self) -> io::Result<()>;

    /// Current length in bytes
    fn size(&self) -> io::Result<u64>;

    /// Cut the sink back to `len` bytes
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl LogSink for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Writes entries to the WAL file
pub struct WalWriter<S: LogSink = File> {
    path: PathBuf,
    sink: S,
    /// Length of the log up to the last successful append
    len: u64,
    next_lsn: u64,
    sync_strategy: WalSyncStrategy,
    /// Entries written since the last fsync
    uncommitted: usize,
    /// Set when a failed append could not be rolled back
    poisoned: bool,
}

impl WalWriter<File> {
    /// Open or create a WAL file, resuming after its last valid entry
    ///
    /// A torn tail left by a crash is cut off before new entries are appended.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let next_lsn = if path.exists() {
            let (_, result) = WalRecovery::recover(path)?;
            result.last_lsn + 1
        } else {
            1
        };
        Self::resume(path, sync_strategy, next_lsn)
    }

    /// Open a WAL already known to be clean, continuing at `next_lsn`
    pub fn resume(path: &Path, sync_strategy: WalSyncStrategy, next_lsn: u64) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Self::with_sink(path, file, sync_strategy, next_lsn)
    }
}

impl<S: LogSink> WalWriter<S> {
    /// Append to an already-open sink positioned at its end
    pub fn with_sink(
        path: &Path,
        sink: S,
        sync_strategy: WalSyncStrategy,
        next_lsn: u64,
    ) -> Result<Self> {
        let len = sink.size()?;
        Ok(Self {
            path: path.to_path_buf(),
            sink,
            len,
            next_lsn: next_lsn.max(1),
            sync_strategy,
            uncommitted: 0,
            poisoned: false,
        })
    }

    /// Append an operation, returning the committed entry
    ///
    /// On error nothing of the entry remains in the log and its LSN is
    /// handed to the next append.
    pub fn append(&mut self, operation: Operation) -> Result<WalEntry> {
        if self.poisoned {
            return Err(poisoned_error());
        }

        let entry = WalEntry::new(self.next_lsn, operation);
        let bytes = entry.serialize()?;

        let should_sync = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.uncommitted + 1 >= count.max(1),
        };

        if let Err(e) = self.write_frame(&bytes, should_sync) {
            self.rollback(entry.lsn);
            return Err(e.into());
        }

        self.len += bytes.len() as u64;
        self.next_lsn += 1;
        self.uncommitted = if should_sync { 0 } else { self.uncommitted + 1 };

        Ok(entry)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        if self.poisoned {
            return Err(poisoned_error());
        }
        self.sink.flush()?;
        self.sink.sync()?;
        self.uncommitted = 0;
        Ok(())
    }

    /// LSN that the next append will receive
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Entries written but not yet fsynced
    pub fn uncommitted_count(&self) -> usize {
        self.uncommitted
    }

    /// Whether a failed rollback has disabled this writer
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_frame(&mut self, bytes: &[u8], sync: bool) -> io::Result<()> {
        self.sink.write_all(bytes)?;
        self.sink.flush()?;
        if sync {
            self.sink.sync()?;
        }
        Ok(())
    }

    /// Drop whatever part of a failed frame reached the sink
    fn rollback(&mut self, lsn: u64) {
        let result = self
            .sink
            .truncate(self.len)
            .and_then(|()| self.sink.sync());
        match result {
            Ok(()) => {
                tracing::warn!(
                    "Rolled back failed append of LSN {} in {}",
                    lsn,
                    self.path.display()
                );
            }
            Err(e) => {
                tracing::error!(
                    "Could not roll back LSN {} in {}: {}; refusing further writes",
                    lsn,
                    self.path.display(),
                    e
                );
                self.poisoned = true;
            }
        }
    }
}

fn poisoned_error() -> LedgerError {
    LedgerError::Io(io::Error::new(
        io::ErrorKind::Other,
        "commit log disabled after a failed rollback",
    ))
}

impl<S: LogSink> CommitLog for WalWriter<S> {
    fn append(&mut self, operation: Operation) -> Result<WalEntry> {
        WalWriter::append(self, operation)
    }

    fn sync(&mut self) -> Result<()> {
        WalWriter::sync(self)
    }

    fn next_lsn(&self) -> u64 {
        self.next_lsn
    }
}
