//! The stoprule evaluator

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;
use trumpproof_types::{CycleId, Severity};

use crate::{EvaluationContext, Finding, StopRule, StopRuleConfig, HASH_MISMATCH};

/// What triggered a violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// A committed receipt
    Receipt { sequence_no: u64 },
    /// A fact refused before append, identified by its computed payload hash
    Rejected { payload_hash: String },
}

/// A matched stoprule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub rule_id: String,
    pub severity: Severity,
    pub trigger: Trigger,
    pub finding: Finding,
}

impl Violation {
    /// Payload of the `anomaly_receipt` recording this violation
    pub fn anomaly_payload(&self, cycle_id: Option<&CycleId>) -> Value {
        let mut payload = json!({
            "rule_id": self.rule_id,
            "severity": self.severity.to_string(),
            "action": self.severity.action(),
            "cycle_id": cycle_id.map(|c| c.to_string()).unwrap_or_default(),
            "metric": self.finding.metric,
            "baseline": self.finding.baseline,
            "threshold": self.finding.threshold,
            "observed": self.finding.observed,
        });
        match &self.trigger {
            Trigger::Receipt { sequence_no } => {
                payload["trigger_sequence_no"] = json!(sequence_no);
            }
            Trigger::Rejected { payload_hash } => {
                payload["trigger_payload_hash"] = json!(payload_hash);
            }
        }
        payload
    }
}

/// Evaluates every registered stoprule, in rule-id order
#[derive(Debug, Clone)]
pub struct StopRuleEvaluator {
    rules: Vec<StopRule>,
    context_window: usize,
}

impl StopRuleEvaluator {
    pub fn new(mut rules: Vec<StopRule>, context_window: usize) -> Self {
        rules.sort_by(|a, b| a.id.cmp(&b.id));
        Self {
            rules,
            context_window,
        }
    }

    pub fn builtin(config: &StopRuleConfig) -> Self {
        Self::new(StopRule::builtin(config), config.context_window)
    }

    pub fn rules(&self) -> &[StopRule] {
        &self.rules
    }

    pub fn rule(&self, id: &str) -> Option<&StopRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Number of preceding ledger receipts predicates may look at
    pub fn context_window(&self) -> usize {
        self.context_window
    }

    /// Every rule matching the candidate, in rule-id order
    pub fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Vec<Violation> {
        self.rules
            .iter()
            .filter_map(|rule| {
                let finding = rule.predicate.evaluate(ctx)?;
                warn!(
                    rule_id = %rule.id,
                    severity = %rule.severity,
                    sequence_no = ctx.candidate.sequence_no,
                    receipt_type = %ctx.candidate.receipt_type,
                    metric = %finding.metric,
                    observed = finding.observed,
                    "Stoprule triggered"
                );
                Some(Violation {
                    rule_id: rule.id.clone(),
                    severity: rule.severity,
                    trigger: Trigger::Receipt {
                        sequence_no: ctx.candidate.sequence_no,
                    },
                    finding,
                })
            })
            .collect()
    }

    /// Violation for a fact whose claimed payload hash did not recompute.
    /// `None` when the hash-mismatch rule is not registered.
    pub fn hash_mismatch(&self, claimed: &str, computed: &str) -> Option<Violation> {
        let rule = self.rule(HASH_MISMATCH)?;
        warn!(
            rule_id = %rule.id,
            severity = %rule.severity,
            claimed = %claimed,
            computed = %computed,
            "Stoprule triggered"
        );
        Some(Violation {
            rule_id: rule.id.clone(),
            severity: rule.severity,
            trigger: Trigger::Rejected {
                payload_hash: computed.to_string(),
            },
            finding: Finding {
                metric: "claimed_payload_hash_mismatch".to_string(),
                baseline: 0.0,
                threshold: 0.0,
                observed: 1.0,
            },
        })
    }
}

/// The highest severity among `violations`
pub fn highest_severity(violations: &[Violation]) -> Option<Severity> {
    violations.iter().map(|v| v.severity).max()
}
