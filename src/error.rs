//! Error types for LedgerKV
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using LedgerError
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Unified error type for LedgerKV operations
#[derive(Debug, Error)]
pub enum LedgerError {
    // -------------------------------------------------------------------------
    // Ledger Errors
    // -------------------------------------------------------------------------
    #[error("The asset {0} does not exist")]
    NotFound(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LedgerError {
    /// Build a `NotFound` error for a raw key
    pub fn not_found(key: &[u8]) -> Self {
        LedgerError::NotFound(String::from_utf8_lossy(key).into_owned())
    }

    /// True for the `NotFound` variant
    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::NotFound(_))
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        LedgerError::Serialization(e.to_string())
    }
}

impl From<bincode::Error> for LedgerError {
    fn from(e: bincode::Error) -> Self {
        LedgerError::Serialization(e.to_string())
    }
}
