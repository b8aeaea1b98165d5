//! SLO thresholds and actions

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Operation kinds with their own latency window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Ingest,
    Verification,
    CostComputation,
    CycleCompletion,
    FacilityStaleness,
}

impl OpKind {
    /// Kinds measured as call latency
    pub const TIMED: [OpKind; 4] = [
        OpKind::Ingest,
        OpKind::Verification,
        OpKind::CostComputation,
        OpKind::CycleCompletion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Ingest => "ingest",
            OpKind::Verification => "verification",
            OpKind::CostComputation => "cost_computation",
            OpKind::CycleCompletion => "cycle_completion",
            OpKind::FacilityStaleness => "facility_staleness",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens when a threshold is exceeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SloAction {
    Reject,
    Escalate,
    Alert,
}

impl fmt::Display for SloAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SloAction::Reject => "reject",
            SloAction::Escalate => "escalate",
            SloAction::Alert => "alert",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SloThreshold {
    pub threshold_ms: u64,
    pub action: SloAction,
}

impl SloThreshold {
    pub const fn new(threshold_ms: u64, action: SloAction) -> Self {
        Self {
            threshold_ms,
            action,
        }
    }

    pub fn threshold(&self) -> Duration {
        Duration::from_millis(self.threshold_ms)
    }
}

/// Gate configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SloConfig {
    pub ingest: SloThreshold,
    pub verification: SloThreshold,
    pub cost_computation: SloThreshold,
    pub cycle_completion: SloThreshold,
    pub facility_staleness: SloThreshold,
    /// Samples kept per operation kind
    pub window_size: usize,
}

impl Default for SloConfig {
    fn default() -> Self {
        Self {
            ingest: SloThreshold::new(50, SloAction::Reject),
            verification: SloThreshold::new(100, SloAction::Escalate),
            cost_computation: SloThreshold::new(1_000, SloAction::Alert),
            cycle_completion: SloThreshold::new(60_000, SloAction::Escalate),
            facility_staleness: SloThreshold::new(24 * 60 * 60 * 1_000, SloAction::Alert),
            window_size: 1_000,
        }
    }
}

impl SloConfig {
    pub fn threshold(&self, op_kind: OpKind) -> SloThreshold {
        match op_kind {
            OpKind::Ingest => self.ingest,
            OpKind::Verification => self.verification,
            OpKind::CostComputation => self.cost_computation,
            OpKind::CycleCompletion => self.cycle_completion,
            OpKind::FacilityStaleness => self.facility_staleness,
        }
    }
}
