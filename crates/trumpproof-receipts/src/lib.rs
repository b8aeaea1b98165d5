//! TrumpProof Receipts - Receipt toolkit
//!
//! Receipts are the unit of truth in TrumpProof:
//! - Shape-checked before they reach the ledger
//! - Dual-hashed over canonical JSON
//! - Machine-verifiable after the fact, one file at a time
//!
//! This crate provides:
//! - The schema registry and the structural validator
//! - Envelope hashing (the digest that links receipts into a chain)
//! - Standalone receipt verification and inspection

pub mod envelope;
pub mod inspect;
pub mod registry;
pub mod shape;

pub use envelope::*;
pub use inspect::*;
pub use registry::*;
pub use shape::*;

use thiserror::Error;

/// Errors raised by the schema validator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Unknown receipt type: {0}")]
    UnknownReceiptType(String),

    #[error("Invalid field {field_path}: {reason}")]
    InvalidField { field_path: String, reason: String },

    #[error("Payload too large: {size} bytes exceeds {limit}")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Payload nested too deep: depth {depth} exceeds {limit}")]
    TooDeep { depth: usize, limit: usize },

    #[error("Receipt type {receipt_type} may not be produced by domain {domain}")]
    DomainMismatch { receipt_type: String, domain: String },

    #[error("Invalid schema registry: {0}")]
    InvalidRegistry(String),
}

impl SchemaError {
    pub(crate) fn field(path: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::InvalidField {
            field_path: path.into(),
            reason: reason.into(),
        }
    }

    /// Offending field path, when the error is about a single field
    pub fn field_path(&self) -> Option<&str> {
        match self {
            SchemaError::InvalidField { field_path, .. } => Some(field_path),
            _ => None,
        }
    }
}

/// Errors raised while verifying or inspecting receipt files
#[derive(Error, Debug)]
pub enum ReceiptError {
    #[error("JSON error: {message}")]
    JsonError { message: String },

    #[error("File error: {message}")]
    FileError { message: String },
}

pub type SchemaResult<T> = std::result::Result<T, SchemaError>;
pub type Result<T> = std::result::Result<T, ReceiptError>;
