//! Rollback coordinator
//!
//! Decides when integrity failures are fatal and drafts the terminal
//! receipt. Rollback itself (cycles to ROLLED_BACK, ledger frozen, receipt
//! appended, operators paged) is carried out by [`crate::Kernel::rollback`].

use std::sync::atomic::{AtomicU32, Ordering};

use serde_json::json;
use tracing::warn;
use trumpproof_slo::{SloAction, SloBreach};
use trumpproof_types::{CycleId, ReceiptDraft, ReceiptType};

use crate::RollbackConfig;

#[derive(Debug)]
pub struct RollbackCoordinator {
    budget: u32,
    consecutive_breaches: AtomicU32,
}

impl RollbackCoordinator {
    pub fn new(config: &RollbackConfig) -> Self {
        Self {
            budget: config.verification_breach_budget,
            consecutive_breaches: AtomicU32::new(0),
        }
    }

    pub fn budget(&self) -> u32 {
        self.budget
    }

    pub fn consecutive_breaches(&self) -> u32 {
        self.consecutive_breaches.load(Ordering::SeqCst)
    }

    /// Record the outcome of one chain verification. Returns true once the
    /// run of reject-class breaches reaches the budget.
    pub fn observe_verification(&self, breach: Option<&SloBreach>) -> bool {
        match breach {
            Some(b) if b.action == SloAction::Reject => {
                let run = self.consecutive_breaches.fetch_add(1, Ordering::SeqCst) + 1;
                warn!(run, budget = self.budget, "Verification breached its reject threshold");
                run >= self.budget
            }
            _ => {
                self.consecutive_breaches.store(0, Ordering::SeqCst);
                false
            }
        }
    }

    pub fn reset(&self) {
        self.consecutive_breaches.store(0, Ordering::SeqCst);
    }

    pub fn rollback_draft(reason: &str, cycles: &[CycleId]) -> ReceiptDraft {
        ReceiptDraft::new(
            ReceiptType::Rollback,
            json!({
                "reason": reason,
                "cycles_rolled_back": cycles.iter().map(|c| c.to_string()).collect::<Vec<_>>(),
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use trumpproof_slo::OpKind;

    fn breach(action: SloAction) -> SloBreach {
        SloBreach {
            op_kind: OpKind::Verification,
            elapsed: Duration::from_millis(500),
            threshold: Duration::from_millis(100),
            action,
        }
    }

    #[test]
    fn test_budget_counts_consecutive_reject_breaches() {
        let coordinator = RollbackCoordinator::new(&RollbackConfig::default());
        let reject = breach(SloAction::Reject);
        assert!(!coordinator.observe_verification(Some(&reject)));
        assert!(!coordinator.observe_verification(Some(&reject)));
        assert!(!coordinator.observe_verification(None));
        assert_eq!(coordinator.consecutive_breaches(), 0);

        assert!(!coordinator.observe_verification(Some(&reject)));
        assert!(!coordinator.observe_verification(Some(&reject)));
        assert!(coordinator.observe_verification(Some(&reject)));
    }

    #[test]
    fn test_escalate_breaches_do_not_count() {
        let coordinator = RollbackCoordinator::new(&RollbackConfig {
            verification_breach_budget: 1,
        });
        assert!(!coordinator.observe_verification(Some(&breach(SloAction::Escalate))));
        assert!(coordinator.observe_verification(Some(&breach(SloAction::Reject))));
    }

    #[test]
    fn test_rollback_draft() {
        let cycle = CycleId::new();
        let draft = RollbackCoordinator::rollback_draft("chain broken", &[cycle]);
        assert_eq!(draft.receipt_type, "rollback_receipt");
        assert_eq!(draft.payload["cycles_rolled_back"][0], cycle.to_string());
    }
}
