//! Receipt commands - inspect receipts and digest payloads

use colored::*;
use serde_json::{json, Value};
use trumpproof_crypto::{canonical_json, digest as dual_digest, verify};
use trumpproof_receipts::inspect_receipt_json;

use super::load_json;
use crate::display;

/// Inspect a receipt and verify its own digests
pub fn inspect(input: &str, as_json: bool) -> anyhow::Result<()> {
    let inspection = inspect_receipt_json(&load_json(input)?)?;

    if as_json {
        display::json(&inspection)?;
    } else {
        display::heading(&format!("Receipt {}", inspection.reference));
        display::field("type", &inspection.receipt_type);
        display::field("domain", &inspection.domain);
        display::field("ts", &inspection.ts);
        display::digest("payload", &inspection.payload_hash);
        display::digest("prev", &inspection.prev_hash);
        display::digest("receipt", &inspection.receipt_hash);
        println!();
        for line in serde_json::to_string_pretty(&inspection.payload)?.lines() {
            println!("   {}", line.dimmed());
        }
        println!();
        if inspection.verification.valid {
            display::status(display::Mark::Pass, "payload and receipt digests recompute");
            display::status(
                display::Mark::Caution,
                "link to the preceding receipt is unchecked; run `trumpproof verify` on the ledger",
            );
        } else {
            for error in &inspection.verification.errors {
                display::status(display::Mark::Fail, error);
            }
        }
    }

    if !inspection.verification.valid {
        anyhow::bail!("receipt {} does not verify", inspection.reference);
    }
    Ok(())
}

/// Print the dual digest of a payload, or check it against `expect`
pub fn digest(input: &str, expect: Option<&str>, as_json: bool) -> anyhow::Result<()> {
    let payload: Value = serde_json::from_str(&load_json(input)?)?;
    let computed = dual_digest(&payload);
    let matches = expect.map(|d| verify(&payload, d));

    if as_json {
        display::json(&json!({
            "digest": computed,
            "canonical": canonical_json(&payload),
            "matches": matches,
        }))?;
    } else {
        display::field("canonical", canonical_json(&payload));
        display::digest("digest", &computed);
        match matches {
            Some(true) => display::status(display::Mark::Pass, "matches the expected digest"),
            Some(false) => display::status(display::Mark::Fail, "does not match the expected digest"),
            None => {}
        }
    }

    if matches == Some(false) {
        anyhow::bail!("digest mismatch");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_order_independent() {
        let a = r#"{"amount": 1, "recipient_name": "b"}"#;
        let b = r#"{"recipient_name": "b", "amount": 1}"#;
        let expected = dual_digest(&serde_json::from_str(a).unwrap());

        digest(b, Some(&expected), true).unwrap();
        assert!(digest(r#"{"amount": 2}"#, Some(&expected), true).is_err());
    }

    #[test]
    fn test_inspect_ledger_receipt() {
        use std::sync::Arc;
        use trumpproof_ledger::ReceiptLedger;
        use trumpproof_receipts::SchemaRegistry;
        use trumpproof_types::{ReceiptDraft, ReceiptType};

        let ledger = ReceiptLedger::in_memory(Arc::new(SchemaRegistry::builtin()));
        let seq = ledger
            .append(ReceiptDraft::new(
                ReceiptType::Payment,
                json!({"source_name": "PIF", "recipient_name": "LIV Golf", "amount": 250000}),
            ))
            .unwrap();
        let receipt = serde_json::to_string(&*ledger.get(seq).unwrap()).unwrap();
        inspect(&receipt, true).unwrap();

        let tampered = receipt.replace("250000", "25");
        assert!(inspect(&tampered, true).is_err());
    }

    #[test]
    fn test_inspect_refuses_non_receipts() {
        assert!(inspect(r#"{"amount": 1}"#, true).is_err());
    }
}
