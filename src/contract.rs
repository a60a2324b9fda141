//! Accreditation contract
//!
//! The transactions the accreditation application runs against the ledger.
//! Each one is a thin wrapper over a [`LedgerStore`] operation that speaks
//! in [`Accreditation`] records and JSON result strings.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;

use crate::error::{LedgerError, Result};
use crate::ledger::HistoryEntry;
use crate::record::{Accreditation, Decoded, STATUS_APPLIED};
use crate::store::LedgerStore;

/// Transaction names accepted by [`Contract::invoke`]
pub const TRANSACTIONS: &[&str] = &[
    "InitLedger",
    "CreateAsset",
    "ReadAsset",
    "UpdateAsset",
    "UpdateStatus",
    "DeleteAsset",
    "AssetExists",
    "GetAllAssets",
    "GetAssetHistory",
];

/// One row of `GetAllAssets`
#[derive(Debug, Clone, Serialize)]
pub struct KeyedRecord {
    #[serde(rename = "Key")]
    pub key: String,

    #[serde(rename = "Record")]
    pub record: Decoded,
}

impl From<(Vec<u8>, Vec<u8>)> for KeyedRecord {
    fn from((key, value): (Vec<u8>, Vec<u8>)) -> Self {
        Self {
            key: String::from_utf8_lossy(&key).into_owned(),
            record: Decoded::from_payload(&value),
        }
    }
}

/// One row of `GetAssetHistory`
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRecord {
    #[serde(rename = "TxId")]
    pub tx_id: String,

    /// Commit time, unix millis
    #[serde(rename = "Timestamp")]
    pub timestamp: u64,

    #[serde(rename = "IsDelete")]
    pub is_delete: bool,

    /// `null` for deletions
    #[serde(rename = "Value")]
    pub value: Option<Decoded>,
}

impl From<HistoryEntry> for HistoryRecord {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            tx_id: entry.tx_id.to_string(),
            timestamp: entry.timestamp,
            is_delete: entry.is_delete(),
            value: entry.value.as_deref().map(Decoded::from_payload),
        }
    }
}

/// The three accreditations written by `InitLedger`
pub fn sample_accreditations() -> Vec<Accreditation> {
    vec![
        Accreditation::new(
            "acc1",
            "Barbara Davis Center",
            "Jane Doe",
            STATUS_APPLIED,
            "Ophthalmology",
        ),
        Accreditation::new(
            "acc2",
            "Lucile Packard Pediatric Hospital",
            "Jane Doe",
            STATUS_APPLIED,
            "Ophthalmology",
        ),
        Accreditation::new(
            "acc3",
            "Barbara Davis Center",
            "Jack Brown",
            STATUS_APPLIED,
            "Medical Genetics and Genomics",
        ),
    ]
}

/// Fresh asset id derived from the clock, e.g. `accf18c2e4a1b07`
pub fn generate_asset_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("accf{:x}", millis)
}

/// Render a range scan as the `GetAllAssets` JSON array
pub fn records_to_json<I>(records: I) -> Result<String>
where
    I: IntoIterator<Item = (Vec<u8>, Vec<u8>)>,
{
    let rows: Vec<KeyedRecord> = records.into_iter().map(KeyedRecord::from).collect();
    Ok(serde_json::to_string(&rows)?)
}

/// Render a history scan as the `GetAssetHistory` JSON array
pub fn history_to_json<I>(entries: I) -> Result<String>
where
    I: IntoIterator<Item = HistoryEntry>,
{
    let rows: Vec<HistoryRecord> = entries.into_iter().map(HistoryRecord::from).collect();
    Ok(serde_json::to_string(&rows)?)
}

/// Accreditation transactions bound to one ledger
pub struct Contract<'a> {
    store: &'a LedgerStore,
}

impl<'a> Contract<'a> {
    pub fn new(store: &'a LedgerStore) -> Self {
        Self { store }
    }

    /// Seed the ledger with [`sample_accreditations`]
    pub fn init_ledger(&self) -> Result<usize> {
        let seed = sample_accreditations()
            .into_iter()
            .map(|acc| Ok((acc.id.clone(), acc.to_bytes()?)))
            .collect::<Result<Vec<_>>>()?;
        self.store.init_seed(seed)
    }

    /// Write a new accreditation; its status always starts as `Applied`
    ///
    /// Like the ledger's `put`, this overwrites an existing record with the
    /// same id.
    pub fn create_asset(
        &self,
        id: &str,
        clinic: &str,
        doctor: &str,
        speciality: &str,
    ) -> Result<Accreditation> {
        let asset = Accreditation::new(id, clinic, doctor, STATUS_APPLIED, speciality);
        self.store.put(id.as_bytes(), &asset.to_bytes()?)?;
        Ok(asset)
    }

    /// Stored JSON of an accreditation
    pub fn read_asset(&self, id: &str) -> Result<String> {
        let bytes = self.store.get(id.as_bytes())?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Typed accreditation; malformed payloads are a `Serialization` error
    pub fn read_accreditation(&self, id: &str) -> Result<Accreditation> {
        let bytes = self.store.get(id.as_bytes())?;
        Accreditation::from_bytes(&bytes)
    }

    /// Replace an existing accreditation wholesale
    pub fn update_asset(&self, asset: &Accreditation) -> Result<()> {
        self.store.update(asset.id.as_bytes(), &asset.to_bytes()?)?;
        Ok(())
    }

    /// Change only the `Status` field of an existing accreditation
    ///
    /// Fields the record carries beyond the known five are preserved. The
    /// read and the write form one [`LedgerStore::modify`].
    pub fn update_status(&self, id: &str, status: &str) -> Result<()> {
        self.store.modify(id.as_bytes(), |bytes| {
            let mut record: Value = serde_json::from_slice(bytes)?;
            let fields = record.as_object_mut().ok_or_else(|| {
                LedgerError::Serialization(format!("asset {} is not a JSON object", id))
            })?;
            fields.insert("Status".to_string(), Value::String(status.to_string()));
            Ok(serde_json::to_vec(&record)?)
        })?;
        Ok(())
    }

    pub fn delete_asset(&self, id: &str) -> Result<()> {
        self.store.delete(id.as_bytes())?;
        Ok(())
    }

    pub fn asset_exists(&self, id: &str) -> Result<bool> {
        self.store.exists(id.as_bytes())
    }

    /// Every live record, with non-JSON payloads passed through as text
    pub fn get_all_assets(&self) -> Vec<KeyedRecord> {
        self.store
            .range_scan(b"", b"")
            .map(KeyedRecord::from)
            .collect()
    }

    /// Every write ever made to `id`, oldest first
    pub fn get_asset_history(&self, id: &str) -> Result<Vec<HistoryRecord>> {
        Ok(self
            .store
            .history_of(id.as_bytes())?
            .map(HistoryRecord::from)
            .collect())
    }

    /// Run a transaction by name
    ///
    /// Queries return their JSON result; writes return `None`.
    pub fn invoke(&self, function: &str, args: &[String]) -> Result<Option<String>> {
        tracing::debug!("invoke {} with {} args", function, args.len());
        match function {
            "InitLedger" => {
                expect_args(function, args, 0)?;
                self.init_ledger()?;
                Ok(None)
            }
            "CreateAsset" => {
                // ID, Clinic, Doctor, Status, Speciality; Status is ignored
                expect_args(function, args, 5)?;
                self.create_asset(&args[0], &args[1], &args[2], &args[4])?;
                Ok(None)
            }
            "ReadAsset" => {
                expect_args(function, args, 1)?;
                self.read_asset(&args[0]).map(Some)
            }
            "UpdateAsset" => {
                expect_args(function, args, 5)?;
                let asset = Accreditation::new(
                    args[0].as_str(),
                    args[1].as_str(),
                    args[2].as_str(),
                    args[3].as_str(),
                    args[4].as_str(),
                );
                self.update_asset(&asset)?;
                Ok(None)
            }
            "UpdateStatus" => {
                expect_args(function, args, 2)?;
                self.update_status(&args[0], &args[1])?;
                Ok(None)
            }
            "DeleteAsset" => {
                expect_args(function, args, 1)?;
                self.delete_asset(&args[0])?;
                Ok(None)
            }
            "AssetExists" => {
                expect_args(function, args, 1)?;
                Ok(Some(self.asset_exists(&args[0])?.to_string()))
            }
            "GetAllAssets" => {
                expect_args(function, args, 0)?;
                Ok(Some(serde_json::to_string(&self.get_all_assets())?))
            }
            "GetAssetHistory" => {
                expect_args(function, args, 1)?;
                Ok(Some(serde_json::to_string(&self.get_asset_history(&args[0])?)?))
            }
            other => Err(LedgerError::InvalidArgument(format!(
                "unknown transaction {} (expected one of {})",
                other,
                TRANSACTIONS.join(", ")
            ))),
        }
    }
}

fn expect_args(function: &str, args: &[String], count: usize) -> Result<()> {
    if args.len() != count {
        return Err(LedgerError::InvalidArgument(format!(
            "{} takes {} arguments, got {}",
            function,
            count,
            args.len()
        )));
    }
    Ok(())
}
