//! Domain error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, DomainError>;
