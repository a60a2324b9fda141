//! WAL Entry definitions
//!
//! Defines the structure of individual commit log entries.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Entry header: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// Upper bound on a single entry's data block (64 MB)
pub const MAX_ENTRY_SIZE: u32 = 64 * 1024 * 1024;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing, doubles as the tx id
    pub lsn: u64,

    /// The committed operation
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },
}

impl Operation {
    /// Key touched by this operation
    pub fn key(&self) -> &[u8] {
        match self {
            Operation::Put { key, .. } => key,
            Operation::Delete { key } => key,
        }
    }
}

impl WalEntry {
    /// Create an entry stamped with the current wall clock time
    pub fn new(lsn: u64, operation: Operation) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            lsn,
            operation,
            timestamp,
        }
    }

    /// Serialize to the on-disk frame: header followed by the bincode body
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let data = bincode::serialize(self)?;
        let crc = crc32fast::hash(&data);

        let mut bytes = Vec::with_capacity(HEADER_SIZE + data.len());
        bytes.extend_from_slice(&self.lsn.to_le_bytes());
        bytes.extend_from_slice(&crc.to_le_bytes());
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&data);
        Ok(bytes)
    }

    /// Deserialize one complete frame, verifying length, CRC and LSN
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let header = FrameHeader::parse(bytes)?;
        let end = HEADER_SIZE + header.len as usize;
        if bytes.len() < end {
            return Err(LedgerError::WalCorruption(format!(
                "Incomplete entry: expected {} bytes, got {}",
                end,
                bytes.len()
            )));
        }
        Self::decode_body(&header, &bytes[HEADER_SIZE..end])
    }

    /// Compute the CRC32 of this entry's serialized body
    pub fn compute_crc(&self) -> Result<u32> {
        Ok(crc32fast::hash(&bincode::serialize(self)?))
    }

    pub(crate) fn decode_body(header: &FrameHeader, data: &[u8]) -> Result<Self> {
        let actual = crc32fast::hash(data);
        if actual != header.crc {
            return Err(LedgerError::WalCorruption(format!(
                "CRC mismatch at lsn {}: expected {:08x}, got {:08x}",
                header.lsn, header.crc, actual
            )));
        }

        let entry: WalEntry = bincode::deserialize(data)?;
        if entry.lsn != header.lsn {
            return Err(LedgerError::WalCorruption(format!(
                "LSN mismatch: header {} vs body {}",
                header.lsn, entry.lsn
            )));
        }
        Ok(entry)
    }
}

/// Parsed fixed-size frame header
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameHeader {
    pub lsn: u64,
    pub crc: u32,
    pub len: u32,
}

impl FrameHeader {
    pub(crate) fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(LedgerError::WalCorruption(format!(
                "Incomplete header: expected {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        let mut lsn = [0u8; 8];
        lsn.copy_from_slice(&bytes[0..8]);
        let mut crc = [0u8; 4];
        crc.copy_from_slice(&bytes[8..12]);
        let mut len = [0u8; 4];
        len.copy_from_slice(&bytes[12..16]);

        let header = Self {
            lsn: u64::from_le_bytes(lsn),
            crc: u32::from_le_bytes(crc),
            len: u32::from_le_bytes(len),
        };
        if header.len > MAX_ENTRY_SIZE {
            return Err(LedgerError::WalCorruption(format!(
                "Entry length {} exceeds maximum {}",
                header.len, MAX_ENTRY_SIZE
            )));
        }
        Ok(header)
    }
}
