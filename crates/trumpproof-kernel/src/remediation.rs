//! Violation harvest and remediation proposals
//!
//! At cycle close the kernel gathers the stoprule violations the cycle
//! recorded, ranks them by the dollar exposure of the fact that triggered
//! each one, and proposes a remediation for every rule that keeps firing
//! across the recent ledger. Proposals are written as a
//! `remediation_proposal_receipt`.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;
use trumpproof_types::{Receipt, ReceiptDraft, ReceiptType};

use crate::kernel::ActiveCycle;
use crate::{Kernel, RemediationConfig, Result};

/// Payload fields carrying a dollar amount, most specific first
const EXPOSURE_FIELDS: [&str; 6] = [
    "amount",
    "refund_liability",
    "foreign_payments",
    "amount_requested",
    "total_revenue",
    "revenue_amount",
];

/// Rule-name fragment -> proposed action
const REMEDIATION_MAP: [(&str, &str); 7] = [
    ("favoritism", "implement_blind_review_process"),
    ("excessive_fee", "fee_structure_review"),
    ("fara_violation", "doj_referral"),
    ("emolument", "disclosure_requirement"),
    ("citizen_flag", "immediate_review_protocol"),
    ("death_rate", "facility_inspection_mandate"),
    ("opacity", "beneficial_ownership_disclosure"),
];

const MANUAL_REVIEW: &str = "manual_review_required";

/// One violation and the dollar exposure of the fact behind it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exposure {
    pub rule_id: String,
    /// The `anomaly_receipt` recording the violation
    pub anomaly_sequence_no: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_sequence_no: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_type: Option<ReceiptType>,
    pub exposure: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Medium,
    High,
}

/// A recurring stoprule and what to do about it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemediationProposal {
    pub rule_id: String,
    pub occurrence_count: usize,
    pub proposed_action: &'static str,
    pub priority: Priority,
}

/// First positive dollar amount in a payload, zero if it carries none
pub fn exposure_of(payload: &Value) -> f64 {
    EXPOSURE_FIELDS
        .iter()
        .filter_map(|field| payload.get(field).and_then(Value::as_f64))
        .find(|amount| *amount > 0.0)
        .unwrap_or(0.0)
}

/// Highest exposure first; ties keep ledger order
pub fn rank_by_exposure(mut exposures: Vec<Exposure>) -> Vec<Exposure> {
    exposures.sort_by(|a, b| {
        b.exposure
            .total_cmp(&a.exposure)
            .then(a.anomaly_sequence_no.cmp(&b.anomaly_sequence_no))
    });
    exposures
}

pub fn remediation_action(rule_id: &str) -> &'static str {
    let rule = rule_id.to_lowercase();
    REMEDIATION_MAP
        .iter()
        .find(|(fragment, _)| rule.contains(fragment))
        .map(|(_, action)| *action)
        .unwrap_or(MANUAL_REVIEW)
}

/// Proposals for every rule whose occurrence count reaches the recurrence
/// threshold, in rule-id order
pub fn propose(occurrences: &BTreeMap<String, usize>, config: &RemediationConfig) -> Vec<RemediationProposal> {
    occurrences
        .iter()
        .filter(|(_, count)| **count >= config.min_recurrence)
        .map(|(rule_id, count)| RemediationProposal {
            rule_id: rule_id.clone(),
            occurrence_count: *count,
            proposed_action: remediation_action(rule_id),
            priority: if *count >= config.high_priority_at {
                Priority::High
            } else {
                Priority::Medium
            },
        })
        .collect()
}

impl Kernel {
    /// The cycle's violations with the exposure of each triggering fact
    pub(crate) fn harvest_violations(&self, receipts: &[Arc<Receipt>]) -> Vec<Exposure> {
        let exposures = receipts
            .iter()
            .filter(|r| r.receipt_type == ReceiptType::Anomaly)
            .map(|anomaly| {
                let trigger_sequence_no = anomaly.payload.get("trigger_sequence_no").and_then(Value::as_u64);
                let trigger = trigger_sequence_no.and_then(|seq| {
                    receipts
                        .iter()
                        .find(|r| r.sequence_no == seq)
                        .cloned()
                        .or_else(|| self.ledger.get(seq))
                });
                Exposure {
                    rule_id: anomaly.payload_str("rule_id").unwrap_or_default().to_string(),
                    anomaly_sequence_no: anomaly.sequence_no,
                    trigger_sequence_no,
                    trigger_type: trigger.as_ref().map(|t| t.receipt_type),
                    exposure: trigger.map(|t| exposure_of(&t.payload)).unwrap_or(0.0),
                }
            })
            .collect();
        rank_by_exposure(exposures)
    }

    /// Rank the cycle's violations and, when any of its rules recur across
    /// the recent ledger, append a `remediation_proposal_receipt`
    pub(crate) fn propose_remediation(&self, active: &mut ActiveCycle) -> Result<Option<Arc<Receipt>>> {
        let ranked = self.harvest_violations(&active.receipts);
        active.tally.exposure = ranked.clone();
        if ranked.is_empty() {
            return Ok(None);
        }

        let config = &self.config.remediation;
        let mut occurrences: BTreeMap<String, usize> =
            ranked.iter().map(|e| (e.rule_id.clone(), 0)).collect();
        for receipt in self.ledger.tail(config.window) {
            if receipt.receipt_type != ReceiptType::Anomaly {
                continue;
            }
            if let Some(count) = receipt.payload_str("rule_id").and_then(|id| occurrences.get_mut(id)) {
                *count += 1;
            }
        }

        let proposals = propose(&occurrences, config);
        active.tally.remediation = proposals.clone();
        if proposals.is_empty() {
            return Ok(None);
        }

        let total_exposure: f64 = ranked.iter().map(|e| e.exposure).sum();
        let payload = json!({
            "cycle_id": active.cycle.cycle_id.to_string(),
            "violations_analyzed": ranked.len(),
            "recurring_patterns": proposals.len(),
            "proposals": proposals,
            "total_exposure": total_exposure,
            "ranked_exposure": ranked.iter().take(config.ranked_limit).collect::<Vec<_>>(),
        });
        let receipt = self.emit(active, ReceiptDraft::new(ReceiptType::RemediationProposal, payload))?;
        info!(
            cycle_id = %active.cycle.cycle_id,
            sequence_no = receipt.sequence_no,
            recurring_patterns = proposals.len(),
            total_exposure,
            "Remediation proposed"
        );
        Ok(Some(receipt))
    }
}
