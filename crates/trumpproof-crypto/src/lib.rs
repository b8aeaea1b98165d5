//! TrumpProof Crypto - Dual-hash engine
//!
//! This crate provides:
//! - Dual digests (`"<sha256>:<blake3>"`) over bytes and JSON payloads
//! - Canonical JSON serialization (recursively sorted keys)
//! - Merkle roots over dual digests for batch summaries
//!
//! # Integrity Invariant
//!
//! **The same logical payload always yields the same digest**, regardless of
//! the insertion order of its fields.

pub mod canonical;
pub mod hash;
pub mod merkle;

pub use canonical::*;
pub use hash::*;
pub use merkle::*;

use thiserror::Error;

/// Errors raised while parsing digests
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("Malformed dual digest: {0}")]
    MalformedDigest(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
