//! Dual hashing: SHA-256 (collision resistant) paired with BLAKE3 (fast)

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};

use crate::{canonical_bytes, CryptoError};

/// Genesis `prev_hash` for the first receipt in a ledger
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000:0000000000000000000000000000000000000000000000000000000000000000";

/// Compute SHA-256 hash and return as hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute BLAKE3 hash and return as hex string
pub fn blake3_hex(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

/// A parsed `"<sha256>:<blake3>"` digest pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DualHash {
    pub sha256: String,
    pub blake3: String,
}

impl DualHash {
    /// Hash raw bytes with both algorithms
    pub fn of_bytes(data: &[u8]) -> Self {
        Self {
            sha256: sha256_hex(data),
            blake3: blake3_hex(data),
        }
    }

    /// Hash a JSON value under canonical serialization
    pub fn of_json(value: &serde_json::Value) -> Self {
        Self::of_bytes(&canonical_bytes(value))
    }

    /// Compare against bytes: the fast half first, the strong half only if
    /// the fast half agrees.
    pub fn matches_bytes(&self, data: &[u8]) -> bool {
        self.blake3 == blake3_hex(data) && self.sha256 == sha256_hex(data)
    }
}

impl fmt::Display for DualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.sha256, self.blake3)
    }
}

impl FromStr for DualHash {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (sha, b3) = s
            .split_once(':')
            .ok_or_else(|| CryptoError::MalformedDigest(s.to_string()))?;
        let well_formed = |h: &str| h.len() == 64 && h.bytes().all(|b| b.is_ascii_hexdigit());
        if !well_formed(sha) || !well_formed(b3) {
            return Err(CryptoError::MalformedDigest(s.to_string()));
        }
        Ok(Self {
            sha256: sha.to_ascii_lowercase(),
            blake3: b3.to_ascii_lowercase(),
        })
    }
}

/// Dual digest of raw bytes as `"<sha256>:<blake3>"`
pub fn dual_hash(data: &[u8]) -> String {
    DualHash::of_bytes(data).to_string()
}

/// Dual digest of a JSON payload under canonical serialization
pub fn digest(payload: &serde_json::Value) -> String {
    DualHash::of_json(payload).to_string()
}

/// Verify a payload against a dual digest. Malformed digests never verify.
pub fn verify(payload: &serde_json::Value, digest: &str) -> bool {
    match digest.parse::<DualHash>() {
        Ok(expected) => expected.matches_bytes(&canonical_bytes(payload)),
        Err(_) => false,
    }
}
