//! Standalone receipt verification and inspection

use serde::{Deserialize, Serialize};
use trumpproof_crypto::verify;
use trumpproof_types::{Receipt, TENANT_ID};

use crate::{envelope_hash, ReceiptError, Result};

/// Result of verifying a single receipt in isolation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub valid: bool,
    pub sequence_no: Option<u64>,
    pub receipt_type: String,
    pub payload_hash_valid: bool,
    pub receipt_hash_valid: bool,
    pub errors: Vec<String>,
}

/// Verify a receipt's own digests. The link to its predecessor needs the
/// ledger and is not checked here.
pub fn verify_receipt(receipt: &Receipt) -> VerificationResult {
    let mut errors = vec![];

    let payload_hash_valid = verify(&receipt.payload, &receipt.payload_hash);
    if !payload_hash_valid {
        errors.push("payload_hash does not match payload".to_string());
    }

    let receipt_hash_valid = envelope_hash(receipt) == receipt.receipt_hash;
    if !receipt_hash_valid {
        errors.push("receipt_hash does not match envelope".to_string());
    }

    if receipt.tenant_id != TENANT_ID {
        errors.push(format!("unexpected tenant_id {}", receipt.tenant_id));
    }

    VerificationResult {
        valid: errors.is_empty(),
        sequence_no: Some(receipt.sequence_no),
        receipt_type: receipt.receipt_type.to_string(),
        payload_hash_valid,
        receipt_hash_valid,
        errors,
    }
}

/// Verify a receipt from JSON
pub fn verify_receipt_json(json: &str) -> VerificationResult {
    match serde_json::from_str::<Receipt>(json) {
        Ok(receipt) => verify_receipt(&receipt),
        Err(e) => VerificationResult {
            valid: false,
            sequence_no: None,
            receipt_type: "unknown".to_string(),
            payload_hash_valid: false,
            receipt_hash_valid: false,
            errors: vec![format!("Failed to parse receipt: {}", e)],
        },
    }
}

/// Load and verify a receipt from a file
pub fn verify_receipt_file(path: &str) -> Result<VerificationResult> {
    let content = std::fs::read_to_string(path).map_err(|e| ReceiptError::FileError {
        message: e.to_string(),
    })?;

    Ok(verify_receipt_json(&content))
}

/// Inspection details for a receipt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptInspection {
    pub reference: String,
    pub receipt_type: String,
    pub domain: String,
    pub ts: String,
    pub payload_hash: String,
    pub prev_hash: String,
    pub receipt_hash: String,
    pub verification: VerificationResult,
    pub payload: serde_json::Value,
}

/// Inspect a receipt's contents
pub fn inspect_receipt_json(json: &str) -> Result<ReceiptInspection> {
    let receipt: Receipt = serde_json::from_str(json).map_err(|e| ReceiptError::JsonError {
        message: e.to_string(),
    })?;

    Ok(ReceiptInspection {
        reference: receipt.reference(),
        receipt_type: receipt.receipt_type.to_string(),
        domain: receipt.domain.to_string(),
        ts: crate::envelope_ts(&receipt.ts),
        payload_hash: receipt.payload_hash.clone(),
        prev_hash: receipt.prev_hash.clone(),
        receipt_hash: receipt.receipt_hash.clone(),
        verification: verify_receipt(&receipt),
        payload: receipt.payload,
    })
}

/// Inspect a receipt from a file
pub fn inspect_receipt_file(path: &str) -> Result<ReceiptInspection> {
    let content = std::fs::read_to_string(path).map_err(|e| ReceiptError::FileError {
        message: e.to_string(),
    })?;

    inspect_receipt_json(&content)
}
