//! Cycle states and stoprule severities

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of one processing cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleState {
    Running,
    Halted,
    Escalated,
    Review,
    Completed,
    RolledBack,
}

impl CycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleState::Running => "RUNNING",
            CycleState::Halted => "HALTED",
            CycleState::Escalated => "ESCALATED",
            CycleState::Review => "REVIEW",
            CycleState::Completed => "COMPLETED",
            CycleState::RolledBack => "ROLLED_BACK",
        }
    }

    /// Whether facts may still be appended within the cycle
    pub fn accepts_appends(&self) -> bool {
        matches!(
            self,
            CycleState::Running | CycleState::Escalated | CycleState::Review
        )
    }

    /// Terminal pending an external resume signal
    pub fn requires_resume(&self) -> bool {
        matches!(self, CycleState::Halted | CycleState::RolledBack)
    }

    /// Archived states
    pub fn is_final(&self) -> bool {
        matches!(self, CycleState::Completed | CycleState::RolledBack)
    }

    /// Severity rank of the state, used to ratchet transitions upward
    pub fn rank(&self) -> u8 {
        match self {
            CycleState::Running | CycleState::Completed => 0,
            CycleState::Review => 1,
            CycleState::Escalated => 2,
            CycleState::Halted => 3,
            CycleState::RolledBack => 4,
        }
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a stoprule. Ordering is REVIEW < ESCALATE < HALT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Review,
    Escalate,
    Halt,
}

impl Severity {
    /// Cycle state a match of this severity moves the cycle to
    pub fn target_state(&self) -> CycleState {
        match self {
            Severity::Review => CycleState::Review,
            Severity::Escalate => CycleState::Escalated,
            Severity::Halt => CycleState::Halted,
        }
    }

    /// Action label carried on anomaly receipts
    pub fn action(&self) -> &'static str {
        match self {
            Severity::Review => "review",
            Severity::Escalate => "escalate",
            Severity::Halt => "halt",
        }
    }

    /// Whether operators are paged for this severity
    pub fn pages_operators(&self) -> bool {
        matches!(self, Severity::Escalate | Severity::Halt)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Review => "REVIEW",
            Severity::Escalate => "ESCALATE",
            Severity::Halt => "HALT",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Halt > Severity::Escalate);
        assert!(Severity::Escalate > Severity::Review);
        let highest = [Severity::Review, Severity::Halt, Severity::Escalate]
            .into_iter()
            .max()
            .unwrap();
        assert_eq!(highest.target_state(), CycleState::Halted);
    }

    #[test]
    fn test_state_properties() {
        assert!(CycleState::Escalated.accepts_appends());
        assert!(!CycleState::Halted.accepts_appends());
        assert!(CycleState::RolledBack.requires_resume());
        assert_eq!(
            serde_json::to_string(&CycleState::RolledBack).unwrap(),
            "\"ROLLED_BACK\""
        );
    }
}
