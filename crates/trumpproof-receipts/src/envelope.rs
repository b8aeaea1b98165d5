//! Receipt envelopes
//!
//! The envelope is everything about a receipt except its payload body: the
//! payload enters only through `payload_hash`. `receipt_hash` is the dual
//! digest of the canonical envelope, and the next receipt's `prev_hash`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use trumpproof_crypto::digest;
use trumpproof_types::Receipt;

/// Timestamp rendering used inside envelopes (microsecond precision, `Z`)
pub fn envelope_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Canonical envelope of a receipt
pub fn envelope(receipt: &Receipt) -> Value {
    json!({
        "sequence_no": receipt.sequence_no,
        "receipt_type": receipt.receipt_type.as_str(),
        "ts": envelope_ts(&receipt.ts),
        "mono_ns": receipt.mono_ns,
        "tenant_id": receipt.tenant_id,
        "domain": receipt.domain.as_str(),
        "payload_hash": receipt.payload_hash,
        "prev_hash": receipt.prev_hash,
    })
}

/// Dual digest of the canonical envelope
pub fn envelope_hash(receipt: &Receipt) -> String {
    digest(&envelope(receipt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use trumpproof_crypto::GENESIS_HASH;
    use trumpproof_types::{Domain, ReceiptType, TENANT_ID};

    fn receipt() -> Receipt {
        let payload = serde_json::json!({"deaths": 0});
        Receipt {
            sequence_no: 0,
            receipt_type: ReceiptType::DeathRate,
            ts: Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap(),
            mono_ns: 42,
            tenant_id: TENANT_ID.to_string(),
            domain: Domain::Border,
            payload_hash: digest(&payload),
            payload,
            prev_hash: GENESIS_HASH.to_string(),
            receipt_hash: String::new(),
        }
    }

    #[test]
    fn test_envelope_ts_format() {
        let r = receipt();
        assert_eq!(envelope_ts(&r.ts), "2026-01-15T12:00:00.000000Z");
    }

    #[test]
    fn test_envelope_covers_link_and_position() {
        let base = receipt();
        let h = envelope_hash(&base);

        let mut moved = base.clone();
        moved.sequence_no = 1;
        assert_ne!(envelope_hash(&moved), h);

        let mut relinked = base.clone();
        relinked.prev_hash = digest(&serde_json::json!("elsewhere"));
        assert_ne!(envelope_hash(&relinked), h);
    }

    #[test]
    fn test_envelope_ignores_receipt_hash_field() {
        let mut r = receipt();
        let h = envelope_hash(&r);
        r.receipt_hash = h.clone();
        assert_eq!(envelope_hash(&r), h);
    }
}
