//! TrumpProof SLO - Latency SLO gate
//!
//! Every kernel operation kind has a latency threshold and an action taken
//! when a single call exceeds it:
//!
//! - `reject`: the operation is aborted before it mutates anything
//! - `escalate`: the operation completes and the cycle is flagged
//! - `alert`: advisory only
//!
//! Facility-metric staleness is judged on wall-clock age of the last update,
//! not on call latency.

pub mod config;
pub mod gate;
pub mod window;

pub use config::*;
pub use gate::*;
pub use window::*;

use std::time::Duration;

use thiserror::Error;

/// A reject-class breach: the operation was aborted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("SLO breach on {op_kind}: {elapsed_ms}ms exceeds {threshold_ms}ms")]
pub struct SloBreachError {
    pub op_kind: OpKind,
    pub elapsed_ms: u64,
    pub threshold_ms: u64,
}

impl From<SloBreach> for SloBreachError {
    fn from(breach: SloBreach) -> Self {
        Self {
            op_kind: breach.op_kind,
            elapsed_ms: duration_ms(breach.elapsed),
            threshold_ms: duration_ms(breach.threshold),
        }
    }
}

pub(crate) fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
