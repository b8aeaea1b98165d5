//! Scenario fixture format
//!
//! A scenario is an ordered list of steps replayed against a fresh kernel.
//! Each step may carry expectations; unset expectations are not checked.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use trumpproof_domain::DomainInput;
use trumpproof_kernel::{ErrorKind, KernelConfig};
use trumpproof_types::{CycleState, Domain, ReceiptDraft};

use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Kernel configuration; sections left out take their defaults
    #[serde(default)]
    pub config: KernelConfig,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Run one full cycle over the listed facts, one adapter per domain
    Cycle {
        #[serde(default)]
        facts: BTreeMap<Domain, Vec<FactSpec>>,
        #[serde(default)]
        expect: Expectation,
    },
    /// Resume the most recent cycle, ingest `facts` into it and complete it
    ResumeCycle {
        operator: String,
        #[serde(default)]
        reason: String,
        #[serde(default)]
        facts: BTreeMap<Domain, Vec<FactSpec>>,
        #[serde(default)]
        expect: Expectation,
    },
    /// Clear every review hold on the most recent cycle
    ClearReview {
        operator: String,
        #[serde(default)]
        reason: String,
        #[serde(default)]
        expect: Expectation,
    },
    /// Roll the ledger back, as the coordinator does on an integrity failure
    Rollback {
        reason: String,
        #[serde(default)]
        expect: Expectation,
    },
    /// Unfreeze the ledger with an operator signal
    ResumeLedger {
        operator: String,
        #[serde(default)]
        reason: String,
        #[serde(default)]
        expect: Expectation,
    },
}

impl Step {
    pub fn kind(&self) -> &'static str {
        match self {
            Step::Cycle { .. } => "cycle",
            Step::ResumeCycle { .. } => "resume_cycle",
            Step::ClearReview { .. } => "clear_review",
            Step::Rollback { .. } => "rollback",
            Step::ResumeLedger { .. } => "resume_ledger",
        }
    }

    pub fn expect(&self) -> &Expectation {
        match self {
            Step::Cycle { expect, .. }
            | Step::ResumeCycle { expect, .. }
            | Step::ClearReview { expect, .. }
            | Step::Rollback { expect, .. }
            | Step::ResumeLedger { expect, .. } => expect,
        }
    }
}

/// A fact as written in a fixture: either a literal receipt or raw figures
/// for a derived domain fact
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactSpec {
    Literal {
        receipt_type: String,
        payload: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        claimed_hash: Option<String>,
    },
    Derived(DomainInput),
}

impl FactSpec {
    /// Draft the fact for `domain`'s adapter
    pub fn draft(&self, domain: Domain) -> Result<ReceiptDraft> {
        match self {
            FactSpec::Literal {
                receipt_type,
                payload,
                claimed_hash,
            } => Ok(ReceiptDraft {
                receipt_type: receipt_type.clone(),
                domain,
                payload: payload.clone(),
                claimed_hash: claimed_hash.clone(),
            }),
            FactSpec::Derived(input) => Ok(input.draft()?),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Expectation {
    pub state: Option<CycleState>,
    /// Stoprule ids recorded on the cycle, in trigger order
    pub violations: Option<Vec<String>>,
    pub ingested: Option<usize>,
    pub rejected: Option<usize>,
    pub skipped: Option<usize>,
    /// `pif_connection_receipt`s appended by the step
    pub pif_connections: Option<usize>,
    /// Domain set every appended `pif_connection_receipt` must name
    pub pif_domains: Option<Vec<Domain>>,
    /// Rule ids of the `anomaly_receipt`s appended by the step, in order
    pub anomalies: Option<Vec<String>>,
    /// Receipt types that must appear among the step's appended receipts
    pub receipt_types: Option<Vec<String>>,
    pub chain_valid: Option<bool>,
    pub frozen: Option<bool>,
    /// The step must fail with this error kind
    pub error: Option<ErrorKind>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_steps_and_facts() {
        let scenario: Scenario = serde_json::from_value(json!({
            "name": "MINI",
            "steps": [
                {
                    "step": "cycle",
                    "facts": {
                        "tariff": [
                            {"receipt_type": "tariff_ingest_receipt", "payload": {"revenue_amount": 1, "period": "FY2025"}},
                            {"kind": "refund_liability", "collections": [100], "ieepa_status": "struck"}
                        ]
                    },
                    "expect": {"state": "COMPLETED", "violations": []}
                },
                {"step": "rollback", "reason": "drill", "expect": {"frozen": true}},
                {"step": "resume_ledger", "operator": "ops"}
            ]
        }))
        .unwrap();

        assert_eq!(scenario.steps.len(), 3);
        assert_eq!(scenario.config, KernelConfig::default());
        let Step::Cycle { facts, expect } = &scenario.steps[0] else {
            panic!("expected a cycle step");
        };
        assert_eq!(expect.state, Some(CycleState::Completed));
        let tariff = &facts[&Domain::Tariff];
        assert!(matches!(tariff[0], FactSpec::Literal { .. }));
        assert!(matches!(tariff[1], FactSpec::Derived(DomainInput::RefundLiability { .. })));

        let draft = tariff[1].draft(Domain::Tariff).unwrap();
        assert_eq!(draft.payload["refund_liability"], 100.0);
        assert_eq!(scenario.steps[2].kind(), "resume_ledger");
    }

    #[test]
    fn test_unknown_expectation_is_refused() {
        let parsed: std::result::Result<Expectation, _> = serde_json::from_value(json!({"stat": "COMPLETED"}));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_literal_keeps_claimed_hash() {
        let fact: FactSpec = serde_json::from_value(json!({
            "receipt_type": "ownership_receipt",
            "payload": {},
            "claimed_hash": "0:0"
        }))
        .unwrap();
        let draft = fact.draft(Domain::License).unwrap();
        assert_eq!(draft.claimed_hash.as_deref(), Some("0:0"));
        assert_eq!(draft.domain, Domain::License);
    }
}
