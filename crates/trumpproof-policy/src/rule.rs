//! Stoprule definitions and predicates

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use trumpproof_types::{Receipt, ReceiptType, Severity};

use crate::StopRuleConfig;

pub const CITIZEN_FLAG: &str = "stoprule_citizen_flag";
pub const DEATH_RATE: &str = "stoprule_death_rate";
pub const EMOLUMENT_DISCLOSURE: &str = "stoprule_emolument_disclosure";
pub const FARA_VIOLATION: &str = "stoprule_fara_violation";
pub const HASH_MISMATCH: &str = "stoprule_hash_mismatch";
pub const UNVERIFIED_CLAIM: &str = "stoprule_unverified_claim";

/// What a predicate measured when it matched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub metric: String,
    pub baseline: f64,
    pub threshold: f64,
    pub observed: f64,
}

impl Finding {
    fn flag(metric: &str) -> Self {
        Self {
            metric: metric.to_string(),
            baseline: 0.0,
            threshold: 0.0,
            observed: 1.0,
        }
    }
}

/// A receipt under evaluation together with the ledger window before it
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub candidate: &'a Receipt,
    /// Most recent ledger receipts preceding the candidate, oldest first
    pub window: &'a [Arc<Receipt>],
}

impl<'a> EvaluationContext<'a> {
    pub fn new(candidate: &'a Receipt, window: &'a [Arc<Receipt>]) -> Self {
        Self { candidate, window }
    }

    /// Window receipts followed by the candidate
    pub fn receipts(&self) -> impl Iterator<Item = &'a Receipt> + 'a {
        let candidate = self.candidate;
        let window = self.window;
        window
            .iter()
            .map(|r| r.as_ref())
            .filter(move |r| r.sequence_no != candidate.sequence_no)
            .chain(std::iter::once(candidate))
    }
}

/// Predicate kinds. Pure functions of the evaluation context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopRulePredicate {
    /// A citizenship verification concluding the detainee is likely a citizen
    CitizenFlag,
    /// Aggregated facility death rate above a multiple of baseline
    DeathRate { baseline: f64, multiplier: f64 },
    /// Undisclosed emolument at or above the disclosure threshold
    EmolumentDisclosure { threshold: f64 },
    /// FARA violation on record, or an unregistered government-sourced
    /// investment above the threshold
    FaraViolation { investment_threshold: f64 },
    /// Raised by the kernel before append; never matches a committed receipt
    HashMismatch,
    /// A verification that failed
    UnverifiedClaim,
}

impl StopRulePredicate {
    pub fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Option<Finding> {
        let receipt = ctx.candidate;
        match self {
            StopRulePredicate::CitizenFlag => {
                (receipt.receipt_type == ReceiptType::CitizenshipVerification
                    && receipt.payload_bool("citizenship_likely") == Some(true))
                .then(|| Finding::flag("citizenship_likely"))
            }
            StopRulePredicate::DeathRate {
                baseline,
                multiplier,
            } => death_rate(ctx, *baseline, *multiplier),
            StopRulePredicate::EmolumentDisclosure { threshold } => {
                if receipt.receipt_type != ReceiptType::EmolumentAssessment {
                    return None;
                }
                let amount = receipt.payload_f64("amount")?;
                let undisclosed = receipt.payload_bool("is_emolument") == Some(true)
                    && receipt.payload_bool("disclosed") == Some(false);
                (undisclosed && amount >= *threshold).then(|| Finding {
                    metric: "undisclosed_emolument_amount".to_string(),
                    baseline: 0.0,
                    threshold: *threshold,
                    observed: amount,
                })
            }
            StopRulePredicate::FaraViolation {
                investment_threshold,
            } => fara_violation(ctx, *investment_threshold),
            StopRulePredicate::HashMismatch => None,
            StopRulePredicate::UnverifiedClaim => {
                (receipt.receipt_type == ReceiptType::Verification
                    && receipt.payload_bool("verified") == Some(false))
                .then(|| Finding::flag("verification_failed"))
            }
        }
    }
}

fn death_rate(ctx: &EvaluationContext<'_>, baseline: f64, multiplier: f64) -> Option<Finding> {
    let receipt = ctx.candidate;
    if receipt.receipt_type != ReceiptType::DeathRate {
        return None;
    }
    let facility = receipt.payload_str("facility_id")?;

    let (deaths, detainee_days) = ctx
        .receipts()
        .filter(|r| r.receipt_type == ReceiptType::DeathRate && r.payload_str("facility_id") == Some(facility))
        .fold((0.0, 0.0), |(deaths, days), r| {
            (
                deaths + r.payload_f64("deaths").unwrap_or(0.0),
                days + r.payload_f64("detainee_days").unwrap_or(0.0),
            )
        });
    if detainee_days <= 0.0 {
        return None;
    }

    let rate = deaths * 10_000.0 / detainee_days;
    let threshold = baseline * multiplier;
    (rate > threshold).then(|| Finding {
        metric: "deaths_per_10k_detainee_days".to_string(),
        baseline,
        threshold,
        observed: rate,
    })
}

fn fara_violation(ctx: &EvaluationContext<'_>, investment_threshold: f64) -> Option<Finding> {
    let receipt = ctx.candidate;
    match receipt.receipt_type {
        ReceiptType::FaraViolation => Some(Finding {
            metric: "fara_violation_recorded".to_string(),
            baseline: 0.0,
            threshold: 0.0,
            observed: receipt.payload_f64("foreign_payments").unwrap_or(0.0),
        }),
        ReceiptType::SwfInvestment => {
            let amount = receipt.payload_f64("amount")?;
            let unregistered_government_money = receipt.payload_bool("government_source") == Some(true)
                && receipt.payload_bool("fara_registered") == Some(false);
            if !unregistered_government_money || amount <= investment_threshold {
                return None;
            }
            let recipient = normalize(receipt.payload_str("recipient_name")?);
            let registered = ctx.receipts().any(|r| {
                r.receipt_type == ReceiptType::Verification
                    && r.payload_str("check") == Some("fara_registration")
                    && r.payload_bool("verified") == Some(true)
                    && r.payload_str("subject").map(normalize).as_deref() == Some(recipient.as_str())
            });
            (!registered).then(|| Finding {
                metric: "unregistered_government_investment".to_string(),
                baseline: 0.0,
                threshold: investment_threshold,
                observed: amount,
            })
        }
        _ => None,
    }
}

fn normalize(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// A registered stoprule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopRule {
    pub id: String,
    pub description: String,
    pub severity: Severity,
    pub predicate: StopRulePredicate,
    /// Receipt type emitted when the rule matches
    pub anomaly_receipt_type: ReceiptType,
}

impl StopRule {
    pub fn new(id: &str, description: &str, severity: Severity, predicate: StopRulePredicate) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            severity,
            predicate,
            anomaly_receipt_type: ReceiptType::Anomaly,
        }
    }

    /// The built-in rule set, in id order
    pub fn builtin(config: &StopRuleConfig) -> Vec<StopRule> {
        vec![
            StopRule::new(
                CITIZEN_FLAG,
                "Detainee likely a U.S. citizen; hold for manual review",
                Severity::Review,
                StopRulePredicate::CitizenFlag,
            ),
            StopRule::new(
                DEATH_RATE,
                "Facility death rate above the baseline multiple",
                Severity::Halt,
                StopRulePredicate::DeathRate {
                    baseline: config.death_rate_baseline,
                    multiplier: config.death_rate_multiplier,
                },
            ),
            StopRule::new(
                EMOLUMENT_DISCLOSURE,
                "Foreign-government emolument above the disclosure threshold, undisclosed",
                Severity::Escalate,
                StopRulePredicate::EmolumentDisclosure {
                    threshold: config.emolument_threshold,
                },
            ),
            StopRule::new(
                FARA_VIOLATION,
                "FARA violation or unregistered foreign-government investment",
                Severity::Escalate,
                StopRulePredicate::FaraViolation {
                    investment_threshold: config.fara_investment_threshold,
                },
            ),
            StopRule::new(
                HASH_MISMATCH,
                "Ingested payload does not match its claimed hash",
                Severity::Halt,
                StopRulePredicate::HashMismatch,
            ),
            StopRule::new(
                UNVERIFIED_CLAIM,
                "Verification of a claim failed",
                Severity::Escalate,
                StopRulePredicate::UnverifiedClaim,
            ),
        ]
    }
}
