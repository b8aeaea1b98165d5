//! Per-cycle state machine

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use trumpproof_types::{CycleId, CycleState, Severity};

use crate::{PolicyError, Result, Trigger, Violation};

/// An external, operator-issued signal releasing a halted cycle, a review
/// hold or a frozen ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeSignal {
    pub operator: String,
    pub reason: String,
}

impl ResumeSignal {
    pub fn new(operator: impl Into<String>, reason: impl Into<String>) -> Result<Self> {
        let signal = Self {
            operator: operator.into(),
            reason: reason.into(),
        };
        signal.authorize()?;
        Ok(signal)
    }

    /// Signals without an operator identity are refused
    pub fn authorize(&self) -> Result<()> {
        if self.operator.trim().is_empty() {
            return Err(PolicyError::Unauthorized(
                "missing operator identity".to_string(),
            ));
        }
        Ok(())
    }
}

/// One bounded run of harvest, ingest, verify and correlate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cycle {
    pub cycle_id: CycleId,
    pub state: CycleState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub receipts_emitted: u64,
    /// Triggered stoprule ids, in trigger order
    pub violations: Vec<String>,
    /// Receipts held out of correlation until cleared
    pub review_holds: BTreeSet<u64>,
}

impl Cycle {
    pub fn start() -> Self {
        Self::new(CycleId::new())
    }

    pub fn new(cycle_id: CycleId) -> Self {
        Self {
            cycle_id,
            state: CycleState::Running,
            started_at: Utc::now(),
            finished_at: None,
            receipts_emitted: 0,
            violations: Vec::new(),
            review_holds: BTreeSet::new(),
        }
    }

    pub fn accepts_appends(&self) -> bool {
        self.finished_at.is_none() && self.state.accepts_appends()
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    pub fn note_emitted(&mut self) {
        self.receipts_emitted += 1;
    }

    /// Record a violation and ratchet the state toward its target.
    /// Returns the new state when it changed.
    pub fn apply(&mut self, violation: &Violation) -> Option<CycleState> {
        self.violations.push(violation.rule_id.clone());
        if violation.severity == Severity::Review {
            if let Trigger::Receipt { sequence_no } = violation.trigger {
                self.review_holds.insert(sequence_no);
            }
        }

        if self.state.is_final() {
            return None;
        }
        let target = violation.severity.target_state();
        if target.rank() <= self.state.rank() {
            return None;
        }
        info!(
            cycle_id = %self.cycle_id,
            from = %self.state,
            to = %target,
            rule_id = %violation.rule_id,
            "Cycle state changed"
        );
        self.state = target;
        Some(target)
    }

    /// Close the cycle. HALTED stays HALTED, outstanding review holds leave
    /// it in REVIEW, anything else completes.
    pub fn finish(&mut self) -> CycleState {
        if self.finished_at.is_none() {
            self.finished_at = Some(Utc::now());
        }
        self.state = match self.state {
            CycleState::Halted | CycleState::RolledBack => self.state,
            _ if !self.review_holds.is_empty() => CycleState::Review,
            _ => CycleState::Completed,
        };
        self.state
    }

    /// Release a HALTED cycle back to RUNNING
    pub fn resume(&mut self, signal: &ResumeSignal) -> Result<()> {
        signal.authorize()?;
        if self.state != CycleState::Halted {
            return Err(PolicyError::InvalidTransition {
                state: self.state,
                action: "resume",
            });
        }
        info!(
            cycle_id = %self.cycle_id,
            operator = %signal.operator,
            reason = %signal.reason,
            "Cycle resumed"
        );
        self.state = CycleState::Running;
        self.finished_at = None;
        Ok(())
    }

    /// Clear one review hold. Clearing the last hold of a finished cycle
    /// completes it; mid-cycle the cycle returns to RUNNING.
    pub fn clear_review(&mut self, sequence_no: u64, signal: &ResumeSignal) -> Result<CycleState> {
        signal.authorize()?;
        if !self.review_holds.remove(&sequence_no) {
            return Err(PolicyError::NotUnderReview(sequence_no));
        }
        info!(
            cycle_id = %self.cycle_id,
            sequence_no,
            operator = %signal.operator,
            "Review hold cleared"
        );
        if self.review_holds.is_empty() && self.state == CycleState::Review {
            self.state = if self.is_finished() {
                CycleState::Completed
            } else {
                CycleState::Running
            };
        }
        Ok(self.state)
    }

    /// Move an unarchived cycle to ROLLED_BACK. Returns false for cycles
    /// already archived.
    pub fn roll_back(&mut self) -> bool {
        if self.state.is_final() {
            return false;
        }
        self.state = CycleState::RolledBack;
        if self.finished_at.is_none() {
            self.finished_at = Some(Utc::now());
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Finding;

    fn violation(rule_id: &str, severity: Severity, sequence_no: u64) -> Violation {
        Violation {
            rule_id: rule_id.to_string(),
            severity,
            trigger: Trigger::Receipt { sequence_no },
            finding: Finding {
                metric: "m".to_string(),
                baseline: 0.0,
                threshold: 0.0,
                observed: 1.0,
            },
        }
    }

    fn operator() -> ResumeSignal {
        ResumeSignal::new("ops@trumpproof", "reviewed").unwrap()
    }

    #[test]
    fn test_severity_only_ratchets_upward() {
        let mut cycle = Cycle::start();
        assert_eq!(
            cycle.apply(&violation("a", Severity::Escalate, 1)),
            Some(CycleState::Escalated)
        );
        assert_eq!(cycle.apply(&violation("b", Severity::Review, 2)), None);
        assert_eq!(cycle.state, CycleState::Escalated);
        assert_eq!(
            cycle.apply(&violation("c", Severity::Halt, 3)),
            Some(CycleState::Halted)
        );
        assert_eq!(cycle.apply(&violation("d", Severity::Escalate, 4)), None);
        assert_eq!(cycle.violations, vec!["a", "b", "c", "d"]);
        assert!(cycle.review_holds.contains(&2));
        assert!(!cycle.accepts_appends());
    }

    #[test]
    fn test_finish() {
        let mut clean = Cycle::start();
        assert_eq!(clean.finish(), CycleState::Completed);

        let mut escalated = Cycle::start();
        escalated.apply(&violation("a", Severity::Escalate, 0));
        assert_eq!(escalated.finish(), CycleState::Completed);
        assert_eq!(escalated.violations.len(), 1);

        let mut halted = Cycle::start();
        halted.apply(&violation("a", Severity::Halt, 0));
        assert_eq!(halted.finish(), CycleState::Halted);

        let mut held = Cycle::start();
        held.apply(&violation("a", Severity::Review, 7));
        held.apply(&violation("b", Severity::Escalate, 8));
        assert_eq!(held.finish(), CycleState::Review);
    }

    #[test]
    fn test_resume_requires_halted_and_operator() {
        let mut cycle = Cycle::start();
        assert!(matches!(
            cycle.resume(&operator()),
            Err(PolicyError::InvalidTransition { .. })
        ));

        cycle.apply(&violation("a", Severity::Halt, 0));
        cycle.finish();
        let anonymous = ResumeSignal {
            operator: "  ".to_string(),
            reason: String::new(),
        };
        assert!(matches!(
            cycle.resume(&anonymous),
            Err(PolicyError::Unauthorized(_))
        ));
        assert_eq!(cycle.state, CycleState::Halted);

        cycle.resume(&operator()).unwrap();
        assert_eq!(cycle.state, CycleState::Running);
        assert!(cycle.accepts_appends());
        assert_eq!(cycle.finish(), CycleState::Completed);
    }

    #[test]
    fn test_clear_review() {
        let mut cycle = Cycle::start();
        cycle.apply(&violation("a", Severity::Review, 3));
        cycle.apply(&violation("a", Severity::Review, 5));
        cycle.finish();

        assert_eq!(
            cycle.clear_review(4, &operator()),
            Err(PolicyError::NotUnderReview(4))
        );
        assert_eq!(cycle.clear_review(3, &operator()).unwrap(), CycleState::Review);
        assert_eq!(cycle.clear_review(5, &operator()).unwrap(), CycleState::Completed);
    }

    #[test]
    fn test_rolled_back_is_terminal() {
        let mut cycle = Cycle::start();
        assert!(cycle.roll_back());
        assert_eq!(cycle.state, CycleState::RolledBack);
        assert_eq!(cycle.apply(&violation("a", Severity::Halt, 0)), None);
        assert!(cycle.resume(&operator()).is_err());
        assert_eq!(cycle.finish(), CycleState::RolledBack);

        let mut done = Cycle::start();
        done.finish();
        assert!(!done.roll_back());
    }

    #[test]
    fn test_empty_operator_rejected() {
        assert!(ResumeSignal::new("", "x").is_err());
    }
}
