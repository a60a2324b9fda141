//! # LedgerKV
//!
//! A versioned key-value ledger with:
//! - Point lookups, existence checks and half-open range scans
//! - Full per-key write history, including deletions
//! - An append-only commit log with crash recovery
//! - Single-writer/multi-reader concurrency model
//! - An accreditation contract and a TCP gateway on top
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 TCP Server / CLI Client                      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │            Command Router  ──►  Accreditation Contract       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      LedgerStore                             │
//! │            (Single Writer / Multi Reader)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌───────────────┐
//!   │ Commit Log  │          │ Version Table │
//!   │  (Append)   │─replay──►│   (RwLock)    │
//!   └─────────────┘          └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;
pub mod ledger;
pub mod record;
pub mod store;
pub mod contract;
pub mod protocol;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{LedgerError, Result};
pub use config::Config;
pub use ledger::{HistoryEntry, TxId};
pub use record::{Accreditation, Decoded};
pub use store::LedgerStore;
pub use contract::Contract;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of LedgerKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
