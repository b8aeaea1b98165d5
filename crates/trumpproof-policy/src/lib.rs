//! TrumpProof Policy - Stoprules and the cycle state machine
//!
//! A stoprule is a pure predicate over an appended receipt and the recent
//! ledger window. A match produces a [`Violation`], which the kernel records
//! as an `anomaly_receipt` and applies to the cycle:
//!
//! - HALT: the cycle refuses further appends until an operator resumes it
//! - ESCALATE: the cycle continues with a visible flag
//! - REVIEW: the triggering record is held out of correlation until cleared
//!
//! Severity only ratchets upward within a cycle.

pub mod config;
pub mod cycle;
pub mod evaluator;
pub mod rule;

pub use config::*;
pub use cycle::*;
pub use evaluator::*;
pub use rule::*;

use thiserror::Error;
use trumpproof_types::CycleState;

/// Errors raised by cycle transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Resume signal rejected: {0}")]
    Unauthorized(String),

    #[error("Cannot {action} a cycle in state {state}")]
    InvalidTransition { state: CycleState, action: &'static str },

    #[error("Receipt #{0} is not held for review")]
    NotUnderReview(u64),
}

pub type Result<T> = std::result::Result<T, PolicyError>;
