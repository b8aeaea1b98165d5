//! Schema registry and the structural validator

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use trumpproof_types::{Domain, ReceiptDraft, ReceiptType};

use crate::{FieldKind as K, FieldSpec as F, SchemaError, SchemaResult, Shape};

/// Size and nesting bounds applied before any shape check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationLimits {
    /// Upper bound on the compact JSON encoding of a payload
    pub max_payload_bytes: usize,
    /// Upper bound on container nesting (the payload object itself is depth 1)
    pub max_depth: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_payload_bytes: 64 * 1024,
            max_depth: 32,
        }
    }
}

/// Maps receipt types to payload shapes. Read-only after construction.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    shapes: HashMap<ReceiptType, Shape>,
    limits: ValidationLimits,
}

impl SchemaRegistry {
    /// Registry with no shapes; every type is unknown until registered
    pub fn empty() -> Self {
        Self {
            shapes: HashMap::new(),
            limits: ValidationLimits::default(),
        }
    }

    /// Built-in shapes for every receipt type
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for receipt_type in ReceiptType::ALL {
            registry.register(receipt_type, builtin_shape(receipt_type));
        }
        registry
    }

    /// Load shapes from a JSON object of `{"<wire name>": {"fields": [...]}}`
    pub fn from_json(json: &str) -> SchemaResult<Self> {
        let raw: HashMap<String, Shape> =
            serde_json::from_str(json).map_err(|e| SchemaError::InvalidRegistry(e.to_string()))?;
        let mut registry = Self::empty();
        for (name, shape) in raw {
            let receipt_type: ReceiptType = name
                .parse()
                .map_err(|_| SchemaError::InvalidRegistry(format!("unknown receipt type {name}")))?;
            registry.register(receipt_type, shape);
        }
        Ok(registry)
    }

    pub fn with_limits(mut self, limits: ValidationLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn register(&mut self, receipt_type: ReceiptType, shape: Shape) {
        self.shapes.insert(receipt_type, shape);
    }

    pub fn shape(&self, receipt_type: ReceiptType) -> Option<&Shape> {
        self.shapes.get(&receipt_type)
    }

    pub fn limits(&self) -> ValidationLimits {
        self.limits
    }

    /// Validate a payload against the shape registered for `receipt_type`.
    ///
    /// Terminates on any input: size and depth are measured with an explicit
    /// stack that stops as soon as either bound is crossed.
    pub fn validate(&self, receipt_type: &str, payload: &Value) -> SchemaResult<ReceiptType> {
        let parsed: ReceiptType = receipt_type
            .parse()
            .map_err(|_| SchemaError::UnknownReceiptType(receipt_type.to_string()))?;
        let shape = self
            .shapes
            .get(&parsed)
            .ok_or_else(|| SchemaError::UnknownReceiptType(receipt_type.to_string()))?;

        measure(payload, self.limits)?;

        let object = payload
            .as_object()
            .ok_or_else(|| SchemaError::field("$", "payload must be an object"))?;
        shape.check(object)?;
        Ok(parsed)
    }

    /// Validate a draft, including whether its domain may produce its type
    pub fn validate_draft(&self, draft: &ReceiptDraft) -> SchemaResult<ReceiptType> {
        self.validate(&draft.receipt_type, &draft.payload)
            .and_then(|receipt_type| check_domain(receipt_type, draft.domain).map(|_| receipt_type))
            .map_err(|e| {
                debug!(
                    receipt_type = %draft.receipt_type,
                    domain = %draft.domain,
                    error = %e,
                    "Schema validation failed"
                );
                e
            })
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn check_domain(receipt_type: ReceiptType, domain: Domain) -> SchemaResult<()> {
    if receipt_type.permits(domain) {
        Ok(())
    } else {
        Err(SchemaError::DomainMismatch {
            receipt_type: receipt_type.to_string(),
            domain: domain.to_string(),
        })
    }
}

/// Estimate the compact encoded size and the nesting depth of `value`,
/// failing fast on the first bound crossed.
fn measure(value: &Value, limits: ValidationLimits) -> SchemaResult<()> {
    let mut size = 0usize;
    let mut stack: Vec<(&Value, usize)> = vec![(value, 1)];

    while let Some((current, depth)) = stack.pop() {
        match current {
            Value::Null => size += 4,
            Value::Bool(b) => size += if *b { 4 } else { 5 },
            Value::Number(n) => size += n.to_string().len(),
            Value::String(s) => size += s.len() + 2,
            Value::Array(items) => {
                if depth > limits.max_depth {
                    return Err(SchemaError::TooDeep {
                        depth,
                        limit: limits.max_depth,
                    });
                }
                size += 2 + items.len().saturating_sub(1);
                stack.extend(items.iter().map(|item| (item, depth + 1)));
            }
            Value::Object(map) => {
                if depth > limits.max_depth {
                    return Err(SchemaError::TooDeep {
                        depth,
                        limit: limits.max_depth,
                    });
                }
                size += 2 + map.len().saturating_sub(1);
                for (key, item) in map {
                    size += key.len() + 3;
                    stack.push((item, depth + 1));
                }
            }
        }
        if size > limits.max_payload_bytes {
            return Err(SchemaError::PayloadTooLarge {
                size,
                limit: limits.max_payload_bytes,
            });
        }
    }
    Ok(())
}

const IEEPA_STATUSES: &[&str] = &["pending", "affirmed", "struck_partial", "struck"];
const SEVERITIES: &[&str] = &["REVIEW", "ESCALATE", "HALT"];
const CYCLE_STATES: &[&str] = &[
    "RUNNING",
    "HALTED",
    "ESCALATED",
    "REVIEW",
    "COMPLETED",
    "ROLLED_BACK",
];

fn builtin_shape(receipt_type: ReceiptType) -> Shape {
    let fields = match receipt_type {
        ReceiptType::TariffIngest => vec![
            F::required("revenue_amount", K::amount()),
            F::required("period", K::NonEmptyString),
            F::optional("source", K::String),
        ],
        ReceiptType::Allocation => vec![
            F::required("total_revenue", K::amount()),
            F::required("allocations", K::Object),
            F::optional("allocated_total", K::amount()).not_greater_than("total_revenue"),
        ],
        ReceiptType::Verification => vec![
            F::required("check", K::NonEmptyString),
            F::required("verified", K::Boolean),
            F::optional("subject", K::String),
        ],
        ReceiptType::ExemptionApplication => vec![
            F::required("applicant", K::NonEmptyString),
            F::required("product", K::String),
            F::required("amount_requested", K::amount()),
            F::optional("hts_code", K::String),
        ],
        ReceiptType::ExemptionOutcome => vec![
            F::required("exemption_id", K::NonEmptyString),
            F::required("outcome", K::one_of(&["approved", "denied", "pending"])),
            F::optional("rationale", K::String),
            F::optional("has_documented_criteria", K::Boolean),
        ],
        ReceiptType::RefundLiability => vec![
            F::required("total_collected", K::amount()),
            F::required("ieepa_status", K::one_of(IEEPA_STATUSES)),
            F::required("refund_liability", K::amount()).not_greater_than("total_collected"),
            F::optional("exposure_percentage", K::Number {
                min: Some(0.0),
                max: Some(100.0),
            }),
        ],
        ReceiptType::Detention => vec![
            F::required("anonymized_id", K::NonEmptyString),
            F::required("facility_id", K::NonEmptyString),
            F::optional("category", K::String),
            F::optional("citizenship_verified", K::Boolean),
        ],
        ReceiptType::CitizenshipVerification => vec![
            F::required("detainee_id", K::NonEmptyString),
            F::required("citizenship_likely", K::Boolean),
            F::optional("verification_strength", K::one_of(&["high", "medium", "low"])),
            F::optional("documents_reviewed", K::count()),
        ],
        ReceiptType::Facility => vec![
            F::required("facility_id", K::NonEmptyString),
            F::required("capacity", K::count()),
            F::required("current_population", K::count()),
            F::optional("occupancy_rate", K::amount()),
        ],
        ReceiptType::DeathRate => vec![
            F::required("facility_id", K::NonEmptyString),
            F::required("period", K::NonEmptyString),
            F::required("deaths", K::count()),
            F::required("detainee_days", K::count()),
            F::optional("rate_per_10k_days", K::amount()),
        ],
        ReceiptType::SwfInvestment => vec![
            F::required("fund_name", K::NonEmptyString),
            F::required("recipient_name", K::NonEmptyString),
            F::required("amount", K::amount()),
            F::optional("realized_return", K::number()),
            F::optional("government_source", K::Boolean),
            F::optional("fara_registered", K::Boolean),
        ],
        ReceiptType::FaraViolation => vec![
            F::required("entity_id", K::NonEmptyString),
            F::required("foreign_payments", K::amount()),
            F::optional("registration_status", K::String),
            F::optional("activities", K::Array),
        ],
        ReceiptType::Payment => vec![
            F::required("source_name", K::NonEmptyString),
            F::required("recipient_name", K::NonEmptyString),
            F::required("amount", K::amount()),
            F::optional("source_country", K::String),
            F::optional("verified", K::Boolean),
        ],
        ReceiptType::EmolumentAssessment => vec![
            F::required("payment_id", K::NonEmptyString),
            F::required("amount", K::amount()),
            F::required("source_name", K::NonEmptyString),
            F::required("is_emolument", K::Boolean),
            F::required("disclosed", K::Boolean),
        ],
        ReceiptType::Ownership => vec![
            F::required("entity_name", K::NonEmptyString),
            F::required("ownership_chain", K::Array),
            F::required("owner_identified", K::Boolean),
            F::optional("opacity_score", K::fraction()),
        ],
        ReceiptType::PifConnection => vec![
            F::required("entity_key", K::NonEmptyString),
            F::required("domains", K::Array),
            F::required("domain_count", K::count()),
            F::required("supporting_receipts", K::Array),
            F::required("fingerprint", K::NonEmptyString),
        ],
        ReceiptType::LoopCycle => vec![
            F::required("cycle_id", K::NonEmptyString),
            F::required("state", K::one_of(CYCLE_STATES)),
            F::required("receipts_emitted", K::count()),
            F::required("merkle_root", K::NonEmptyString),
            F::optional("elapsed_ms", K::count()),
        ],
        ReceiptType::Harvest => vec![
            F::required("cycle_id", K::NonEmptyString),
            F::required("fact_counts", K::Object),
            F::required("total_facts", K::count()),
        ],
        ReceiptType::RemediationProposal => vec![
            F::required("cycle_id", K::NonEmptyString),
            F::required("violations_analyzed", K::count()),
            F::required("recurring_patterns", K::count()),
            F::required("proposals", K::Array),
            F::optional("total_exposure", K::amount()),
            F::optional("ranked_exposure", K::Array),
        ],
        ReceiptType::Anomaly => vec![
            F::required("rule_id", K::NonEmptyString),
            F::required("severity", K::one_of(SEVERITIES)),
            F::required("action", K::one_of(&["review", "escalate", "halt"])),
            F::optional("cycle_id", K::String),
            F::optional("trigger_sequence_no", K::count()),
            F::optional("trigger_payload_hash", K::String),
        ],
        ReceiptType::Rollback => vec![
            F::required("reason", K::NonEmptyString),
            F::required("cycles_rolled_back", K::Array),
        ],
    };
    Shape::new(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_covers_every_type() {
        let registry = SchemaRegistry::builtin();
        for receipt_type in ReceiptType::ALL {
            assert!(registry.shape(receipt_type).is_some(), "{receipt_type}");
        }
    }

    #[test]
    fn test_unknown_type_is_distinct() {
        let registry = SchemaRegistry::builtin();
        let err = registry.validate("horoscope_receipt", &json!({})).unwrap_err();
        assert_eq!(err, SchemaError::UnknownReceiptType("horoscope_receipt".into()));

        let err = registry.validate("payment_receipt", &json!({})).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidField { .. }));
    }

    #[test]
    fn test_zero_return_investment_valid() {
        let registry = SchemaRegistry::builtin();
        let payload = json!({
            "fund_name": "Public Investment Fund",
            "recipient_name": "Affinity Partners",
            "amount": 2_000_000_000u64,
            "realized_return": 0
        });
        assert_eq!(
            registry.validate("swf_investment_receipt", &payload).unwrap(),
            ReceiptType::SwfInvestment
        );
    }

    #[test]
    fn test_refund_cannot_exceed_collected() {
        let registry = SchemaRegistry::builtin();
        let payload = json!({
            "total_collected": 100,
            "ieepa_status": "struck",
            "refund_liability": 101
        });
        let err = registry.validate("refund_liability_receipt", &payload).unwrap_err();
        assert_eq!(err.field_path(), Some("refund_liability"));
    }

    #[test]
    fn test_non_object_payload() {
        let registry = SchemaRegistry::builtin();
        let err = registry.validate("payment_receipt", &json!([1, 2])).unwrap_err();
        assert_eq!(err.field_path(), Some("$"));
    }

    #[test]
    fn test_deep_payload_terminates() {
        let registry = SchemaRegistry::builtin();
        let mut nested = json!(0);
        for _ in 0..1_000 {
            nested = Value::Array(vec![nested]);
        }
        let payload = json!({"check": "x", "verified": true, "blob": nested});
        let err = registry.validate("verification_receipt", &payload).unwrap_err();
        assert!(matches!(err, SchemaError::TooDeep { limit: 32, .. }));
    }

    #[test]
    fn test_oversized_payload() {
        let registry = SchemaRegistry::builtin().with_limits(ValidationLimits {
            max_payload_bytes: 128,
            max_depth: 8,
        });
        let payload = json!({"check": "x", "verified": true, "note": "y".repeat(500)});
        let err = registry.validate("verification_receipt", &payload).unwrap_err();
        assert!(matches!(err, SchemaError::PayloadTooLarge { limit: 128, .. }));
    }

    #[test]
    fn test_domain_mismatch() {
        let registry = SchemaRegistry::builtin();
        let draft = ReceiptDraft::in_domain(
            ReceiptType::DeathRate,
            Domain::Gulf,
            json!({"facility_id": "f", "period": "p", "deaths": 0, "detainee_days": 0}),
        );
        assert!(matches!(
            registry.validate_draft(&draft),
            Err(SchemaError::DomainMismatch { .. })
        ));

        let shared = ReceiptDraft::in_domain(
            ReceiptType::Verification,
            Domain::Border,
            json!({"check": "fara_registration", "verified": true}),
        );
        assert!(registry.validate_draft(&shared).is_ok());
    }

    #[test]
    fn test_from_json() {
        let registry = SchemaRegistry::from_json(
            r#"{"payment_receipt": {"fields": [{"name": "amount", "kind": {"type": "number", "min": 0}}]}}"#,
        )
        .unwrap();
        assert!(registry.validate("payment_receipt", &json!({"amount": 5})).is_ok());
        assert!(matches!(
            registry.validate("detention_receipt", &json!({})),
            Err(SchemaError::UnknownReceiptType(_))
        ));
        assert!(SchemaRegistry::from_json(r#"{"nope": {"fields": []}}"#).is_err());
    }
}
