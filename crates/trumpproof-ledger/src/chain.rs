//! Hash-chain verification

use thiserror::Error;
use trumpproof_crypto::{verify, GENESIS_HASH};
use trumpproof_receipts::envelope_hash;
use trumpproof_types::{Receipt, TENANT_ID};

/// What went wrong at the first divergent receipt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainErrorKind {
    #[error("payload does not match payload_hash")]
    PayloadHash,

    #[error("envelope does not match receipt_hash")]
    ReceiptHash,

    #[error("prev_hash does not link to the preceding receipt")]
    BrokenLink,

    #[error("sequence_no {found} out of place")]
    Sequence { found: u64 },

    #[error("persisted record does not parse: {0}")]
    Unparseable(String),
}

/// Chain integrity failure, located at the first divergent sequence number
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Chain integrity failure at sequence {at_sequence_no}: {kind}")]
pub struct ChainError {
    pub at_sequence_no: u64,
    pub kind: ChainErrorKind,
}

impl ChainError {
    pub fn new(at_sequence_no: u64, kind: ChainErrorKind) -> Self {
        Self {
            at_sequence_no,
            kind,
        }
    }
}

/// Verify a contiguous run of receipts starting at sequence `start`.
///
/// `anchor` is the `receipt_hash` of receipt `start - 1`, or `None` at the
/// start of the ledger. Per receipt the payload digest is checked first,
/// then the envelope digest, then the link, so an alteration confined to one
/// receipt is reported at that receipt.
pub fn verify_run<'a, I>(start: u64, anchor: Option<&str>, receipts: I) -> Result<(), ChainError>
where
    I: IntoIterator<Item = &'a Receipt>,
{
    let mut expected_prev = anchor.unwrap_or(GENESIS_HASH).to_string();

    for (offset, receipt) in receipts.into_iter().enumerate() {
        let position = start + offset as u64;

        if !verify(&receipt.payload, &receipt.payload_hash) {
            return Err(ChainError::new(position, ChainErrorKind::PayloadHash));
        }
        if receipt.sequence_no != position {
            return Err(ChainError::new(
                position,
                ChainErrorKind::Sequence {
                    found: receipt.sequence_no,
                },
            ));
        }
        if receipt.tenant_id != TENANT_ID || envelope_hash(receipt) != receipt.receipt_hash {
            return Err(ChainError::new(position, ChainErrorKind::ReceiptHash));
        }
        if receipt.prev_hash != expected_prev {
            return Err(ChainError::new(position, ChainErrorKind::BrokenLink));
        }

        expected_prev.clone_from(&receipt.receipt_hash);
    }

    Ok(())
}
