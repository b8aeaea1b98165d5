//! Operator notification channel
//!
//! Emit and forget: delivery guarantees belong to the channel, so a
//! notifier cannot fail the kernel operation that raised it.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, warn};
use trumpproof_types::{Receipt, ReceiptType};

pub trait OperatorNotifier: Send + Sync {
    /// Page operators about a rollback or a HALT/ESCALATE anomaly
    fn notify(&self, receipt: &Arc<Receipt>);
}

/// Notifier that writes pages to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl OperatorNotifier for TracingNotifier {
    fn notify(&self, receipt: &Arc<Receipt>) {
        match receipt.receipt_type {
            ReceiptType::Rollback => error!(
                sequence_no = receipt.sequence_no,
                reason = receipt.payload_str("reason").unwrap_or_default(),
                "OPERATOR PAGE: ledger rolled back"
            ),
            _ => warn!(
                sequence_no = receipt.sequence_no,
                rule_id = receipt.payload_str("rule_id").unwrap_or_default(),
                severity = receipt.payload_str("severity").unwrap_or_default(),
                "OPERATOR PAGE: stoprule anomaly"
            ),
        }
    }
}

/// Notifier that keeps every page, for tests and the scenario harness
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pages: Mutex<Vec<Arc<Receipt>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pages(&self) -> Vec<Arc<Receipt>> {
        self.pages.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.pages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.lock().is_empty()
    }
}

impl OperatorNotifier for RecordingNotifier {
    fn notify(&self, receipt: &Arc<Receipt>) {
        self.pages.lock().push(Arc::clone(receipt));
    }
}
