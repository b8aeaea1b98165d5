//! Stoprule thresholds

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopRuleConfig {
    /// Expected deaths per 10,000 detainee-days
    pub death_rate_baseline: f64,
    /// Multiple of the baseline that halts the cycle
    pub death_rate_multiplier: f64,
    /// Undisclosed emoluments at or above this amount escalate
    pub emolument_threshold: f64,
    /// Government-sourced investments above this amount need a FARA registration
    pub fara_investment_threshold: f64,
    /// Ledger receipts visible to predicates, not counting the candidate
    pub context_window: usize,
}

impl Default for StopRuleConfig {
    fn default() -> Self {
        Self {
            death_rate_baseline: 0.5,
            death_rate_multiplier: 2.0,
            emolument_threshold: 10_000.0,
            fara_investment_threshold: 100_000.0,
            context_window: 256,
        }
    }
}
