//! Store Module
//!
//! The ledger store that coordinates the commit log and the version table.
//!
//! ## Responsibilities
//! - Validate keys and enforce per-key preconditions (update/delete need a live key)
//! - Commit every write to the log before it becomes visible
//! - Serve point reads, range scans and history scans
//! - Rebuild the version table from the log on startup

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Config;
use crate::contract::{self, Contract};
use crate::error::{LedgerError, Result};
use crate::ledger::{self, HistoryIter, RangeIter, TxId, VersionTable};
use crate::protocol::Command;
use crate::wal::{CommitLog, MemoryLog, Operation, WalRecovery, WalWriter};

/// Versioned key-value ledger
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/update/delete/modify): serialized by the `log` mutex
///   - The existence check, log append and table apply happen under one lock,
///     so a precondition cannot go stale before its write lands
///   - A failed append leaves both the log and the table untouched
///
/// - **Reads** (get/exists/scans): never touch the `log` mutex
///   - The version table's RwLock admits many concurrent readers
///   - Scans read at the commit point captured when they were opened
pub struct LedgerStore {
    /// Directory holding the commit log, `None` for in-memory ledgers
    data_dir: Option<PathBuf>,

    /// Commit log; holding this lock is what makes a caller the writer
    log: Mutex<Box<dyn CommitLog>>,

    /// Every key with its history (internal RwLock)
    table: Arc<VersionTable>,
}

impl LedgerStore {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "ledger.wal";

    /// Open or create a file-backed ledger with the given config
    ///
    /// On startup:
    /// 1. Create the data directory
    /// 2. Recover the commit log, cutting off any torn tail
    /// 3. Replay every entry into the version table
    /// 4. Resume appending after the last recovered LSN
    pub fn open(config: &Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);

        let table = Arc::new(VersionTable::new());
        let mut next_lsn = 1;

        if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;
            if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
                tracing::info!(
                    "WAL recovery: {} entries recovered, {} corrupted, last_lsn={}",
                    recovery.entries_recovered,
                    recovery.entries_corrupted,
                    recovery.last_lsn
                );
            }
            for entry in &entries {
                table.apply(entry);
            }
            next_lsn = recovery.last_lsn + 1;
        }

        let writer = WalWriter::resume(&wal_path, config.wal_sync_strategy, next_lsn)?;

        tracing::info!(
            "Ledger opened at {}: {} keys, {} live",
            config.data_dir.display(),
            table.key_count(),
            table.live_count()
        );

        Ok(Self {
            data_dir: Some(config.data_dir.clone()),
            log: Mutex::new(Box::new(writer)),
            table,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(&config)
    }

    /// Create a ledger whose history lives only in memory
    pub fn in_memory() -> Self {
        Self::with_log(Box::new(MemoryLog::new()))
    }

    /// Create an empty ledger on top of a caller-supplied commit log
    pub fn with_log(log: Box<dyn CommitLog>) -> Self {
        Self {
            data_dir: None,
            log: Mutex::new(log),
            table: Arc::new(VersionTable::new()),
        }
    }

    /// Execute a protocol command
    ///
    /// Routes commands to appropriate handlers
    pub fn execute(&self, command: Command) -> Result<Option<Vec<u8>>> {
        match command {
            Command::Get { key } => self.get(&key).map(Some),
            Command::Put { key, value } => {
                self.put(&key, &value)?;
                Ok(None)
            }
            Command::Update { key, value } => {
                self.update(&key, &value)?;
                Ok(None)
            }
            Command::Delete { key } => {
                self.delete(&key)?;
                Ok(None)
            }
            Command::Exists { key } => {
                let exists = self.exists(&key)?;
                Ok(Some(exists.to_string().into_bytes()))
            }
            Command::Range { start, end } => {
                let json = contract::records_to_json(self.range_scan(&start, &end))?;
                Ok(Some(json.into_bytes()))
            }
            Command::History { key } => {
                let json = contract::history_to_json(self.history_of(&key)?)?;
                Ok(Some(json.into_bytes()))
            }
            Command::Invoke { function, args } => {
                let output = Contract::new(self).invoke(&function, &args)?;
                Ok(output.map(String::into_bytes))
            }
            Command::Ping => Ok(Some(b"PONG".to_vec())),
        }
    }

    // =========================================================================
    // Ledger Operations
    // =========================================================================

    /// Insert or overwrite the value at `key`
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<TxId> {
        ledger::validate_key(key)?;
        let mut log = self.log.lock();
        self.commit(
            &mut **log,
            Operation::Put {
                key: key.to_vec(),
                value: value.to_vec(),
            },
        )
    }

    /// Current value of a live key
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        ledger::validate_key(key)?;
        self.table.get(key).ok_or_else(|| LedgerError::not_found(key))
    }

    /// Whether `key` holds a live record
    pub fn exists(&self, key: &[u8]) -> Result<bool> {
        ledger::validate_key(key)?;
        Ok(self.table.is_live(key))
    }

    /// Delete a live key, recording the deletion in its history
    pub fn delete(&self, key: &[u8]) -> Result<TxId> {
        ledger::validate_key(key)?;
        let mut log = self.log.lock();
        if !self.table.is_live(key) {
            tracing::debug!("delete of absent key {}", String::from_utf8_lossy(key));
            return Err(LedgerError::not_found(key));
        }
        self.commit(&mut **log, Operation::Delete { key: key.to_vec() })
    }

    /// Overwrite a key that must already be live
    pub fn update(&self, key: &[u8], value: &[u8]) -> Result<TxId> {
        ledger::validate_key(key)?;
        let mut log = self.log.lock();
        if !self.table.is_live(key) {
            tracing::debug!("update of absent key {}", String::from_utf8_lossy(key));
            return Err(LedgerError::not_found(key));
        }
        self.commit(
            &mut **log,
            Operation::Put {
                key: key.to_vec(),
                value: value.to_vec(),
            },
        )
    }

    /// Replace the value of a live key with `f(current value)`
    ///
    /// The read, `f` and the write all happen under the write lock, so no
    /// other write to the ledger can land in between. If `f` fails nothing
    /// is written. `f` must not write to this ledger itself.
    pub fn modify<F>(&self, key: &[u8], f: F) -> Result<TxId>
    where
        F: FnOnce(&[u8]) -> Result<Vec<u8>>,
    {
        ledger::validate_key(key)?;
        let mut log = self.log.lock();
        let current = self.table.get(key).ok_or_else(|| {
            tracing::debug!("modify of absent key {}", String::from_utf8_lossy(key));
            LedgerError::not_found(key)
        })?;
        let value = f(&current)?;
        self.commit(
            &mut **log,
            Operation::Put {
                key: key.to_vec(),
                value,
            },
        )
    }

    /// Live records with keys in `[start, end)`, in byte-wise order
    ///
    /// Empty bounds are open, so `range_scan(b"", b"")` visits every live key.
    pub fn range_scan(&self, start: &[u8], end: &[u8]) -> RangeIter {
        RangeIter::new(Arc::clone(&self.table), start, end)
    }

    /// Every history entry for `key`, oldest first
    pub fn history_of(&self, key: &[u8]) -> Result<HistoryIter> {
        ledger::validate_key(key)?;
        Ok(HistoryIter::new(Arc::clone(&self.table), key))
    }

    /// Bulk-load records through `put`, returning how many were written
    ///
    /// Running it again overwrites the same keys and grows their histories.
    pub fn init_seed<I, K, V>(&self, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let mut written = 0;
        for (key, value) in records {
            self.put(key.as_ref(), value.as_ref())?;
            tracing::info!("Asset {} initialized", String::from_utf8_lossy(key.as_ref()));
            written += 1;
        }
        Ok(written)
    }

    /// Append to the log, then make the write visible
    fn commit(&self, log: &mut dyn CommitLog, operation: Operation) -> Result<TxId> {
        let entry = log.append(operation)?;
        self.table.apply(&entry);

        let kind = match &entry.operation {
            Operation::Put { .. } => "put",
            Operation::Delete { .. } => "delete",
        };
        tracing::debug!(
            "committed {} {} as tx {}",
            kind,
            String::from_utf8_lossy(entry.operation.key()),
            TxId(entry.lsn)
        );
        Ok(TxId(entry.lsn))
    }

    /// Force the commit log to stable storage
    pub fn sync(&self) -> Result<()> {
        self.log.lock().sync()
    }

    /// Close the ledger gracefully, syncing the commit log
    pub fn close(self) -> Result<()> {
        self.sync()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Data directory, `None` for in-memory ledgers
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Number of live records
    pub fn live_count(&self) -> usize {
        self.table.live_count()
    }

    /// Number of keys ever written
    pub fn key_count(&self) -> usize {
        self.table.key_count()
    }

    /// Number of history entries recorded for `key`
    pub fn history_len(&self, key: &[u8]) -> usize {
        self.table.history_len(key)
    }

    /// Most recent committed transaction, if any
    pub fn last_tx(&self) -> Option<TxId> {
        match self.table.committed_lsn() {
            0 => None,
            lsn => Some(TxId(lsn)),
        }
    }

    /// Scans that have not been dropped yet
    pub fn open_cursors(&self) -> usize {
        self.table.open_cursors()
    }
}
