//! Receipt types for TrumpProof
//!
//! A receipt is the immutable, hash-verifiable record of a single observed
//! fact or kernel decision. No receipt, no fact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Domain, TypesError};

/// Enumerated receipt types. Wire names carry the `_receipt` suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReceiptType {
    #[serde(rename = "tariff_ingest_receipt")]
    TariffIngest,
    #[serde(rename = "allocation_receipt")]
    Allocation,
    #[serde(rename = "verification_receipt")]
    Verification,
    #[serde(rename = "exemption_application_receipt")]
    ExemptionApplication,
    #[serde(rename = "exemption_outcome_receipt")]
    ExemptionOutcome,
    #[serde(rename = "refund_liability_receipt")]
    RefundLiability,
    #[serde(rename = "detention_receipt")]
    Detention,
    #[serde(rename = "citizenship_verification_receipt")]
    CitizenshipVerification,
    #[serde(rename = "facility_receipt")]
    Facility,
    #[serde(rename = "death_rate_receipt")]
    DeathRate,
    #[serde(rename = "swf_investment_receipt")]
    SwfInvestment,
    #[serde(rename = "fara_violation_receipt")]
    FaraViolation,
    #[serde(rename = "payment_receipt")]
    Payment,
    #[serde(rename = "emolument_assessment_receipt")]
    EmolumentAssessment,
    #[serde(rename = "ownership_receipt")]
    Ownership,
    #[serde(rename = "pif_connection_receipt")]
    PifConnection,
    #[serde(rename = "loop_cycle_receipt")]
    LoopCycle,
    #[serde(rename = "harvest_receipt")]
    Harvest,
    #[serde(rename = "remediation_proposal_receipt")]
    RemediationProposal,
    #[serde(rename = "anomaly_receipt")]
    Anomaly,
    #[serde(rename = "rollback_receipt")]
    Rollback,
}

impl ReceiptType {
    pub const ALL: [ReceiptType; 21] = [
        ReceiptType::TariffIngest,
        ReceiptType::Allocation,
        ReceiptType::Verification,
        ReceiptType::ExemptionApplication,
        ReceiptType::ExemptionOutcome,
        ReceiptType::RefundLiability,
        ReceiptType::Detention,
        ReceiptType::CitizenshipVerification,
        ReceiptType::Facility,
        ReceiptType::DeathRate,
        ReceiptType::SwfInvestment,
        ReceiptType::FaraViolation,
        ReceiptType::Payment,
        ReceiptType::EmolumentAssessment,
        ReceiptType::Ownership,
        ReceiptType::PifConnection,
        ReceiptType::LoopCycle,
        ReceiptType::Harvest,
        ReceiptType::RemediationProposal,
        ReceiptType::Anomaly,
        ReceiptType::Rollback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptType::TariffIngest => "tariff_ingest_receipt",
            ReceiptType::Allocation => "allocation_receipt",
            ReceiptType::Verification => "verification_receipt",
            ReceiptType::ExemptionApplication => "exemption_application_receipt",
            ReceiptType::ExemptionOutcome => "exemption_outcome_receipt",
            ReceiptType::RefundLiability => "refund_liability_receipt",
            ReceiptType::Detention => "detention_receipt",
            ReceiptType::CitizenshipVerification => "citizenship_verification_receipt",
            ReceiptType::Facility => "facility_receipt",
            ReceiptType::DeathRate => "death_rate_receipt",
            ReceiptType::SwfInvestment => "swf_investment_receipt",
            ReceiptType::FaraViolation => "fara_violation_receipt",
            ReceiptType::Payment => "payment_receipt",
            ReceiptType::EmolumentAssessment => "emolument_assessment_receipt",
            ReceiptType::Ownership => "ownership_receipt",
            ReceiptType::PifConnection => "pif_connection_receipt",
            ReceiptType::LoopCycle => "loop_cycle_receipt",
            ReceiptType::Harvest => "harvest_receipt",
            ReceiptType::RemediationProposal => "remediation_proposal_receipt",
            ReceiptType::Anomaly => "anomaly_receipt",
            ReceiptType::Rollback => "rollback_receipt",
        }
    }

    /// Domain that normally produces this receipt type
    pub fn home_domain(&self) -> Domain {
        match self {
            ReceiptType::TariffIngest
            | ReceiptType::Allocation
            | ReceiptType::Verification
            | ReceiptType::ExemptionApplication
            | ReceiptType::ExemptionOutcome
            | ReceiptType::RefundLiability => Domain::Tariff,
            ReceiptType::Detention
            | ReceiptType::CitizenshipVerification
            | ReceiptType::Facility
            | ReceiptType::DeathRate => Domain::Border,
            ReceiptType::SwfInvestment | ReceiptType::FaraViolation => Domain::Gulf,
            ReceiptType::Payment | ReceiptType::EmolumentAssessment => Domain::Golf,
            ReceiptType::Ownership => Domain::License,
            ReceiptType::PifConnection
            | ReceiptType::LoopCycle
            | ReceiptType::Harvest
            | ReceiptType::RemediationProposal
            | ReceiptType::Anomaly
            | ReceiptType::Rollback => Domain::Loop,
        }
    }

    /// Receipt types any governance domain may produce
    pub fn is_shared(&self) -> bool {
        matches!(self, ReceiptType::Verification | ReceiptType::Payment)
    }

    /// Receipt types only the kernel may author
    pub fn is_kernel_authored(&self) -> bool {
        self.home_domain() == Domain::Loop
    }

    /// Whether `domain` may produce this receipt type
    pub fn permits(&self, domain: Domain) -> bool {
        if self.is_shared() {
            domain.is_governance()
        } else {
            self.home_domain() == domain
        }
    }
}

impl fmt::Display for ReceiptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReceiptType {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReceiptType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TypesError::UnknownReceiptType(s.to_string()))
    }
}

/// An unhashed fact on its way into the ledger.
///
/// The receipt type is kept as the raw wire string so that an unknown type
/// reaches the schema validator and is rejected there, not at parse time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptDraft {
    /// Wire name of the receipt type
    pub receipt_type: String,
    /// Producing domain
    pub domain: Domain,
    /// Type-specific payload
    pub payload: serde_json::Value,
    /// Payload hash claimed by the producer, checked on ingest when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_hash: Option<String>,
}

impl ReceiptDraft {
    /// Draft a receipt of a known type in its home domain
    pub fn new(receipt_type: ReceiptType, payload: serde_json::Value) -> Self {
        Self {
            receipt_type: receipt_type.as_str().to_string(),
            domain: receipt_type.home_domain(),
            payload,
            claimed_hash: None,
        }
    }

    /// Draft a receipt attributed to an explicit domain
    pub fn in_domain(receipt_type: ReceiptType, domain: Domain, payload: serde_json::Value) -> Self {
        Self {
            receipt_type: receipt_type.as_str().to_string(),
            domain,
            payload,
            claimed_hash: None,
        }
    }

    /// Attach the producer's claimed payload hash
    pub fn with_claimed_hash(mut self, hash: impl Into<String>) -> Self {
        self.claimed_hash = Some(hash.into());
        self
    }
}

/// A committed receipt as persisted and exchanged.
///
/// `prev_hash`, `sequence_no`, `mono_ns` and `receipt_hash` are
/// kernel-internal and assigned at append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    /// Position in the ledger, starting at 0
    pub sequence_no: u64,
    /// Receipt type
    pub receipt_type: ReceiptType,
    /// Wall-clock timestamp (ISO-8601)
    pub ts: DateTime<Utc>,
    /// Monotonic nanoseconds since the ledger was opened
    pub mono_ns: u64,
    /// Always [`crate::TENANT_ID`]
    pub tenant_id: String,
    /// Producing domain
    pub domain: Domain,
    /// Type-specific payload
    pub payload: serde_json::Value,
    /// Dual digest of the canonical payload, `"<sha256>:<blake3>"`
    pub payload_hash: String,
    /// `receipt_hash` of the preceding receipt, or the genesis value
    pub prev_hash: String,
    /// Dual digest of the canonical envelope
    pub receipt_hash: String,
}

impl Receipt {
    /// Short human reference, e.g. `#12 death_rate_receipt`
    pub fn reference(&self) -> String {
        format!("#{} {}", self.sequence_no, self.receipt_type)
    }

    /// Read a string field from the payload
    pub fn payload_str(&self, field: &str) -> Option<&str> {
        self.payload.get(field).and_then(|v| v.as_str())
    }

    /// Read a numeric field from the payload
    pub fn payload_f64(&self, field: &str) -> Option<f64> {
        self.payload.get(field).and_then(|v| v.as_f64())
    }

    /// Read a boolean field from the payload
    pub fn payload_bool(&self, field: &str) -> Option<bool> {
        self.payload.get(field).and_then(|v| v.as_bool())
    }
}
