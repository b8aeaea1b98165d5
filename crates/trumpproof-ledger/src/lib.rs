//! TrumpProof Ledger - Append-only receipt ledger
//!
//! The ledger is:
//! - The system of record (it exclusively owns the receipt sequence)
//! - Append-only (receipts are write-once)
//! - Hash-chained (each `prev_hash` is the predecessor's `receipt_hash`)
//! - Serialized on append, snapshot-isolated on read
//!
//! # Invariants
//!
//! 1. Every receipt's `payload_hash` recomputes from its payload
//! 2. The `prev_hash` chain has no gaps, starting from the genesis value
//! 3. Nothing is appended while frozen, except the rollback receipt that froze it

pub mod chain;
pub mod ledger;
pub mod store;

pub use chain::*;
pub use ledger::*;
pub use store::*;

use thiserror::Error;
use trumpproof_receipts::SchemaError;

/// Errors that can occur in ledger operations
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Payload hash mismatch: claimed {claimed}, computed {computed}")]
    HashMismatch { claimed: String, computed: String },

    #[error("Ledger is frozen; appends are refused until resume")]
    Frozen,

    #[error("Ledger is corrupted at sequence {at_sequence_no}; appends are refused")]
    Corrupted { at_sequence_no: u64 },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl From<std::io::Error> for LedgerError {
    fn from(e: std::io::Error) -> Self {
        LedgerError::Storage {
            message: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
