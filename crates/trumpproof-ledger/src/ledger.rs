//! The receipt ledger
//!
//! Append is split in two. [`ReceiptLedger::prepare`] validates and digests a
//! draft without touching the ledger. [`ReceiptLedger::commit`] takes the
//! append lock, assigns the sequence number and link, persists, and publishes
//! the receipt to readers. Anything that may abort an append (a reject-class
//! SLO breach, a claimed-hash mismatch) happens between the two.

use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{SubsecRound, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, info, warn};
use trumpproof_crypto::{digest, GENESIS_HASH};
use trumpproof_receipts::{envelope_hash, SchemaRegistry};
use trumpproof_types::{Domain, Receipt, ReceiptDraft, ReceiptType, TENANT_ID};

use crate::{load_jsonl, verify_run, ChainError, JsonlStore, LedgerError, Result};

/// A validated, digested draft that has not been appended yet
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedReceipt {
    receipt_type: ReceiptType,
    domain: Domain,
    payload: Value,
    payload_hash: String,
}

impl PreparedReceipt {
    pub fn receipt_type(&self) -> ReceiptType {
        self.receipt_type
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn payload_hash(&self) -> &str {
        &self.payload_hash
    }
}

/// State guarded by the append lock
struct AppendState {
    next_sequence_no: u64,
    head_hash: String,
    frozen: bool,
    corrupted_at: Option<u64>,
    mono_base: u64,
    store: Option<JsonlStore>,
}

/// Append-only, hash-chained receipt ledger
pub struct ReceiptLedger {
    registry: Arc<SchemaRegistry>,
    append: Mutex<AppendState>,
    receipts: RwLock<Vec<Arc<Receipt>>>,
    unparseable: Option<ChainError>,
    opened_at: Instant,
}

impl ReceiptLedger {
    /// A ledger that lives only in memory
    pub fn in_memory(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            append: Mutex::new(AppendState {
                next_sequence_no: 0,
                head_hash: GENESIS_HASH.to_string(),
                frozen: false,
                corrupted_at: None,
                mono_base: 0,
                store: None,
            }),
            receipts: RwLock::new(Vec::new()),
            unparseable: None,
            opened_at: Instant::now(),
        }
    }

    /// Open a JSONL-backed ledger, loading existing receipts without
    /// verifying them. Run [`ReceiptLedger::verify_chain`] to check them.
    pub fn open(path: impl AsRef<Path>, registry: Arc<SchemaRegistry>) -> Result<Self> {
        let path = path.as_ref();
        let loaded = load_jsonl(path)?;
        let store = JsonlStore::open(path)?;

        let head_hash = loaded
            .receipts
            .last()
            .map(|r| r.receipt_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());
        let mono_base = loaded.receipts.last().map(|r| r.mono_ns + 1).unwrap_or(0);
        let corrupted_at = loaded.unparseable.as_ref().map(|e| e.at_sequence_no);
        let next_sequence_no = loaded.receipts.len() as u64;

        info!(
            path = %path.display(),
            receipts = next_sequence_no,
            corrupted = corrupted_at.is_some(),
            "Opened receipt ledger"
        );

        Ok(Self {
            registry,
            append: Mutex::new(AppendState {
                next_sequence_no,
                head_hash,
                frozen: false,
                corrupted_at,
                mono_base,
                store: Some(store),
            }),
            receipts: RwLock::new(loaded.receipts.into_iter().map(Arc::new).collect()),
            unparseable: loaded.unparseable,
            opened_at: Instant::now(),
        })
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Validate and digest a draft. No lock is taken and nothing is mutated.
    pub fn prepare(&self, draft: ReceiptDraft) -> Result<PreparedReceipt> {
        let receipt_type = self.registry.validate_draft(&draft)?;
        let payload_hash = digest(&draft.payload);

        if let Some(claimed) = &draft.claimed_hash {
            if *claimed != payload_hash {
                return Err(LedgerError::HashMismatch {
                    claimed: claimed.clone(),
                    computed: payload_hash,
                });
            }
        }

        Ok(PreparedReceipt {
            receipt_type,
            domain: draft.domain,
            payload: draft.payload,
            payload_hash,
        })
    }

    /// Append a prepared receipt. Serialized against every other commit.
    pub fn commit(&self, prepared: PreparedReceipt) -> Result<Arc<Receipt>> {
        let mut state = self.append.lock();
        if state.frozen {
            return Err(LedgerError::Frozen);
        }
        self.commit_locked(&mut state, prepared)
    }

    /// Validate, digest and append in one call
    pub fn append(&self, draft: ReceiptDraft) -> Result<u64> {
        let prepared = self.prepare(draft)?;
        Ok(self.commit(prepared)?.sequence_no)
    }

    /// Freeze the ledger and append `draft` as the last receipt before the
    /// freeze, atomically. The ledger stays frozen even if the append fails.
    pub fn freeze_with(&self, draft: ReceiptDraft) -> Result<Arc<Receipt>> {
        let prepared = self.prepare(draft);
        let mut state = self.append.lock();
        state.frozen = true;
        warn!(next_sequence_no = state.next_sequence_no, "Ledger frozen");
        self.commit_locked(&mut state, prepared?)
    }

    /// Lift a freeze. Returns whether the ledger was frozen.
    pub fn unfreeze(&self) -> bool {
        let mut state = self.append.lock();
        let was_frozen = std::mem::replace(&mut state.frozen, false);
        if was_frozen {
            info!(next_sequence_no = state.next_sequence_no, "Ledger unfrozen");
        }
        was_frozen
    }

    pub fn is_frozen(&self) -> bool {
        self.append.lock().frozen
    }

    fn commit_locked(&self, state: &mut AppendState, prepared: PreparedReceipt) -> Result<Arc<Receipt>> {
        if let Some(at_sequence_no) = state.corrupted_at {
            return Err(LedgerError::Corrupted { at_sequence_no });
        }

        let mono_ns = state.mono_base
            + u64::try_from(self.opened_at.elapsed().as_nanos()).unwrap_or(u64::MAX - state.mono_base);
        let mut receipt = Receipt {
            sequence_no: state.next_sequence_no,
            receipt_type: prepared.receipt_type,
            ts: Utc::now().trunc_subsecs(6),
            mono_ns,
            tenant_id: TENANT_ID.to_string(),
            domain: prepared.domain,
            payload: prepared.payload,
            payload_hash: prepared.payload_hash,
            prev_hash: state.head_hash.clone(),
            receipt_hash: String::new(),
        };
        receipt.receipt_hash = envelope_hash(&receipt);

        if let Some(store) = state.store.as_mut() {
            store.append(&receipt)?;
        }

        let receipt = Arc::new(receipt);
        self.receipts.write().push(Arc::clone(&receipt));
        state.next_sequence_no += 1;
        state.head_hash.clone_from(&receipt.receipt_hash);

        debug!(
            sequence_no = receipt.sequence_no,
            receipt_type = %receipt.receipt_type,
            domain = %receipt.domain,
            "Appended receipt"
        );
        Ok(receipt)
    }

    /// Number of committed receipts
    pub fn len(&self) -> u64 {
        self.receipts.read().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `receipt_hash` of the newest receipt, or the genesis value
    pub fn head_hash(&self) -> String {
        self.receipts
            .read()
            .last()
            .map(|r| r.receipt_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string())
    }

    pub fn get(&self, sequence_no: u64) -> Option<Arc<Receipt>> {
        let index = usize::try_from(sequence_no).ok()?;
        self.receipts.read().get(index).cloned()
    }

    /// Committed receipts in `range`, in order. The range is clamped to the
    /// committed length.
    pub fn read(&self, range: Range<u64>) -> Vec<Arc<Receipt>> {
        let receipts = self.receipts.read();
        let (start, end) = clamp(&range, receipts.len());
        receipts[start..end].to_vec()
    }

    /// Every committed receipt
    pub fn snapshot(&self) -> Vec<Arc<Receipt>> {
        self.receipts.read().clone()
    }

    /// The newest `n` receipts, oldest first
    pub fn tail(&self, n: usize) -> Vec<Arc<Receipt>> {
        let receipts = self.receipts.read();
        let start = receipts.len().saturating_sub(n);
        receipts[start..].to_vec()
    }

    /// Recompute every digest and link over `range` and report the first
    /// divergent sequence number. Works on a snapshot, so appends proceed
    /// concurrently.
    pub fn verify_chain(&self, range: Range<u64>) -> std::result::Result<(), ChainError> {
        let (run, anchor, start) = {
            let receipts = self.receipts.read();
            let (start, end) = clamp(&range, receipts.len());
            let anchor = start
                .checked_sub(1)
                .and_then(|i| receipts.get(i))
                .map(|r| r.receipt_hash.clone());
            (receipts[start..end].to_vec(), anchor, start as u64)
        };

        verify_run(start, anchor.as_deref(), run.iter().map(|r| r.as_ref()))?;

        if let Some(err) = &self.unparseable {
            if range.contains(&err.at_sequence_no) {
                return Err(err.clone());
            }
        }
        Ok(())
    }

    /// Verify the whole ledger
    pub fn verify_all(&self) -> std::result::Result<(), ChainError> {
        self.verify_chain(0..u64::MAX)
    }
}

fn clamp(range: &Range<u64>, len: usize) -> (usize, usize) {
    let len = len as u64;
    let end = range.end.min(len);
    let start = range.start.min(end);
    (start as usize, end as usize)
}
