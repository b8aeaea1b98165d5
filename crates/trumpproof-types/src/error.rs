//! Parse errors for the enumerated wire values

use thiserror::Error;

/// Errors raised when a wire string does not name a known value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    #[error("Unknown receipt type: {0}")]
    UnknownReceiptType(String),

    #[error("Unknown domain: {0}")]
    UnknownDomain(String),
}
