//! Governance domains
//!
//! Five independent domains produce facts; the `loop` domain covers
//! receipts the kernel itself authors (cycles, anomalies, rollbacks,
//! cross-domain connections).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// Domain that produced a receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Tariff revenue, exemptions and refunds
    Tariff,
    /// Border detention and citizenship verification
    Border,
    /// Sovereign-fund investment and FARA
    Gulf,
    /// Event payments and emoluments
    Golf,
    /// Licensing and beneficial ownership
    License,
    /// Kernel-authored receipts
    Loop,
}

impl Domain {
    /// The five fact-producing domains, in ingestion priority order
    /// (life-safety first).
    pub const PRIORITY: [Domain; 5] = [
        Domain::Border,
        Domain::Tariff,
        Domain::Gulf,
        Domain::Golf,
        Domain::License,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Tariff => "tariff",
            Domain::Border => "border",
            Domain::Gulf => "gulf",
            Domain::Golf => "golf",
            Domain::License => "license",
            Domain::Loop => "loop",
        }
    }

    /// Whether this domain produces external facts (as opposed to kernel receipts)
    pub fn is_governance(&self) -> bool {
        !matches!(self, Domain::Loop)
    }

    /// Position in the ingestion priority order; `Loop` sorts last.
    pub fn priority(&self) -> usize {
        Self::PRIORITY
            .iter()
            .position(|d| d == self)
            .unwrap_or(Self::PRIORITY.len())
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tariff" => Ok(Domain::Tariff),
            "border" => Ok(Domain::Border),
            "gulf" => Ok(Domain::Gulf),
            "golf" => Ok(Domain::Golf),
            "license" => Ok(Domain::License),
            "loop" => Ok(Domain::Loop),
            other => Err(TypesError::UnknownDomain(other.to_string())),
        }
    }
}
