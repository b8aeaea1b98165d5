//! TrumpProof Kernel - The receipts-native verification kernel
//!
//! The kernel is the single ingestion entry point. Every fact a domain
//! adapter harvests flows through the same path:
//!
//! ```text
//! adapter -> schema -> dual hash -> SLO gate -> ledger append
//!         -> stoprules -> (per cycle) correlation -> remediation
//!         -> loop_cycle_receipt
//! ```
//!
//! The kernel never self-resumes: a HALTED cycle or a frozen ledger stays
//! that way until an operator sends a [`ResumeSignal`].

pub mod adapter;
pub mod config;
pub mod kernel;
pub mod notify;
pub mod orchestrator;
pub mod remediation;
pub mod rollback;

pub use adapter::{AdapterError, DomainAdapter, StaticAdapter};
pub use config::{
    CycleSettings, KernelConfig, LedgerSettings, LoggingConfig, RemediationConfig, RollbackConfig,
};
pub use kernel::{IngestOutcome, Kernel};
pub use notify::{OperatorNotifier, RecordingNotifier, TracingNotifier};
pub use orchestrator::{CycleReport, HarvestFailure, RejectedFact, SkippedFact};
pub use remediation::{Exposure, Priority, RemediationProposal};
pub use rollback::RollbackCoordinator;

pub use trumpproof_policy::ResumeSignal;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use trumpproof_correlation::CorrelationError;
use trumpproof_ledger::{ChainError, LedgerError};
use trumpproof_policy::PolicyError;
use trumpproof_receipts::SchemaError;
use trumpproof_slo::SloBreachError;
use trumpproof_types::{CycleId, CycleState};

/// Kernel errors
#[derive(Error, Debug)]
pub enum KernelError {
    #[error("Schema error: {0}")]
    Schema(SchemaError),

    #[error("Payload hash mismatch: claimed {claimed}, computed {computed}")]
    HashMismatch { claimed: String, computed: String },

    #[error(transparent)]
    SloBreach(#[from] SloBreachError),

    #[error(transparent)]
    ChainIntegrity(#[from] ChainError),

    #[error("Ledger is frozen; appends are refused until resume")]
    LedgerFrozen,

    #[error("Cycle {cycle_id} is {state}; appends are refused")]
    CycleHalted { cycle_id: CycleId, state: CycleState },

    #[error("Unknown cycle: {0}")]
    UnknownCycle(CycleId),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("Ledger error: {0}")]
    Ledger(LedgerError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<LedgerError> for KernelError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Schema(e) => KernelError::Schema(e),
            LedgerError::HashMismatch { claimed, computed } => {
                KernelError::HashMismatch { claimed, computed }
            }
            LedgerError::Frozen => KernelError::LedgerFrozen,
            other => KernelError::Ledger(other),
        }
    }
}

impl From<CorrelationError> for KernelError {
    fn from(e: CorrelationError) -> Self {
        KernelError::Config(e.to_string())
    }
}

impl From<::config::ConfigError> for KernelError {
    fn from(e: ::config::ConfigError) -> Self {
        KernelError::Config(e.to_string())
    }
}

impl From<SchemaError> for KernelError {
    fn from(e: SchemaError) -> Self {
        KernelError::Schema(e)
    }
}

/// Error taxonomy surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Schema,
    HashMismatch,
    SloBreach,
    ChainIntegrity,
    LedgerFrozen,
    CycleHalted,
    Unauthorized,
    InvalidTransition,
    Storage,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Schema => "schema",
            ErrorKind::HashMismatch => "hash_mismatch",
            ErrorKind::SloBreach => "slo_breach",
            ErrorKind::ChainIntegrity => "chain_integrity",
            ErrorKind::LedgerFrozen => "ledger_frozen",
            ErrorKind::CycleHalted => "cycle_halted",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::Storage => "storage",
            ErrorKind::Config => "config",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl KernelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KernelError::Schema(_) => ErrorKind::Schema,
            KernelError::HashMismatch { .. } => ErrorKind::HashMismatch,
            KernelError::SloBreach(_) => ErrorKind::SloBreach,
            KernelError::ChainIntegrity(_) => ErrorKind::ChainIntegrity,
            KernelError::LedgerFrozen => ErrorKind::LedgerFrozen,
            KernelError::CycleHalted { .. } => ErrorKind::CycleHalted,
            KernelError::UnknownCycle(_) => ErrorKind::InvalidTransition,
            KernelError::Policy(PolicyError::Unauthorized(_)) => ErrorKind::Unauthorized,
            KernelError::Policy(_) => ErrorKind::InvalidTransition,
            KernelError::Ledger(LedgerError::Corrupted { .. }) => ErrorKind::ChainIntegrity,
            KernelError::Ledger(_) => ErrorKind::Storage,
            KernelError::Config(_) => ErrorKind::Config,
        }
    }

    /// Offending field path, for schema errors
    pub fn field_path(&self) -> Option<&str> {
        match self {
            KernelError::Schema(e) => e.field_path(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, KernelError>;

#[cfg(test)]
mod tests {
    use super::*;
    use trumpproof_ledger::ChainErrorKind;

    #[test]
    fn test_ledger_errors_map_to_kinds() {
        assert_eq!(KernelError::from(LedgerError::Frozen).kind(), ErrorKind::LedgerFrozen);
        assert_eq!(
            KernelError::from(LedgerError::HashMismatch {
                claimed: "a".into(),
                computed: "b".into()
            })
            .kind(),
            ErrorKind::HashMismatch
        );
        assert_eq!(
            KernelError::from(LedgerError::Corrupted { at_sequence_no: 3 }).kind(),
            ErrorKind::ChainIntegrity
        );
        assert_eq!(
            KernelError::from(ChainError::new(1, ChainErrorKind::BrokenLink)).kind(),
            ErrorKind::ChainIntegrity
        );
    }

    #[test]
    fn test_config_errors_map_to_config_kind() {
        let err = KernelError::from(::config::ConfigError::NotFound("slo.window_size".into()));
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("slo.window_size"));
    }

    #[test]
    fn test_schema_error_keeps_field_path() {
        let err = KernelError::from(LedgerError::Schema(SchemaError::InvalidField {
            field_path: "amount".into(),
            reason: "must be >= 0".into(),
        }));
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert_eq!(err.field_path(), Some("amount"));
    }
}
