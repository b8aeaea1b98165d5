//! Ledger commands - verify a persisted hash chain

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::json;
use tracing::{info, warn};
use trumpproof_crypto::GENESIS_HASH;
use trumpproof_ledger::{load_jsonl, verify_run, ChainError};
use trumpproof_types::Receipt;

use crate::display;

/// What a ledger file holds and where its chain first breaks, if anywhere
#[derive(Debug)]
pub struct LedgerReport {
    pub receipts: usize,
    pub head_hash: String,
    pub by_type: BTreeMap<String, usize>,
    pub failure: Option<ChainError>,
}

impl LedgerReport {
    pub fn valid(&self) -> bool {
        self.failure.is_none()
    }
}

/// Walk the file from genesis. A line that does not parse counts as a break
/// at its position, after the receipts before it verify.
pub fn check_ledger(path: &Path) -> anyhow::Result<LedgerReport> {
    if !path.exists() {
        anyhow::bail!("No ledger at {}", path.display());
    }

    let loaded = load_jsonl(path)?;
    let failure = verify_run(0, None, &loaded.receipts).err().or(loaded.unparseable);

    let mut by_type = BTreeMap::new();
    for receipt in &loaded.receipts {
        *by_type.entry(receipt.receipt_type.to_string()).or_insert(0) += 1;
    }

    Ok(LedgerReport {
        receipts: loaded.receipts.len(),
        head_hash: loaded
            .receipts
            .last()
            .map(|r: &Receipt| r.receipt_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string()),
        by_type,
        failure,
    })
}

/// Verify a ledger file and print the result
pub fn verify_ledger(path: &str, as_json: bool) -> anyhow::Result<()> {
    let report = check_ledger(Path::new(path))?;

    match &report.failure {
        Some(e) => warn!(path, at_sequence_no = e.at_sequence_no, error = %e, "Ledger chain broken"),
        None => info!(path, receipts = report.receipts, "Ledger chain verified"),
    }

    if as_json {
        display::json(&json!({
            "path": path,
            "valid": report.valid(),
            "receipts": report.receipts,
            "head_hash": report.head_hash,
            "by_type": report.by_type,
            "failure": report.failure.as_ref().map(|e| json!({
                "at_sequence_no": e.at_sequence_no,
                "reason": e.kind.to_string(),
            })),
        }))?;
    } else {
        display::heading("Ledger");
        display::field("file", path);
        display::field("receipts", report.receipts);
        display::digest("head", &report.head_hash);
        for (receipt_type, count) in &report.by_type {
            display::detail(receipt_type, count);
        }
        println!();
        match &report.failure {
            None => display::chain_status(report.receipts, None),
            Some(e) => display::chain_status(report.receipts, Some((e.at_sequence_no, e.kind.to_string().as_str()))),
        }
        println!();
    }

    if let Some(e) = report.failure {
        anyhow::bail!(e);
    }
    Ok(())
}
