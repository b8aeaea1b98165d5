//! TrumpProof Correlation - Cross-domain entity detection
//!
//! Indexes the entities referenced by verified receipts into a graph keyed
//! by normalized identity, with one edge per (domain, receipt). An entity
//! referenced from at least `threshold` distinct governance domains within
//! the lookback window is flagged, and the kernel records it as a
//! `pif_connection_receipt`.
//!
//! Flagging is idempotent: each flag carries a fingerprint over the entity
//! key and its domain set, and a fingerprint is emitted at most once.
//!
//! [`analysis`] answers questions about one entity over a set of receipts:
//! where its money came from and went, and how central it is.

pub mod analysis;
pub mod config;
pub mod engine;
pub mod graph;
pub mod normalize;

pub use analysis::*;
pub use config::*;
pub use engine::*;
pub use graph::*;
pub use normalize::*;

use thiserror::Error;

/// Errors raised by correlation configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorrelationError {
    #[error("Invalid correlation config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, CorrelationError>;
