//! TrumpProof domain facts
//!
//! Typed payloads for the facts each governance domain reports, together
//! with the derived figures computed at the source (refund exposure, death
//! rates, fee ratios, emolument status, ownership opacity), and the checks
//! run against them (exemption favoritism, sanctions screening). Every fact turns
//! into a [`ReceiptDraft`]; the kernel validates it like any other input.

pub mod border;
pub mod error;
pub mod golf;
pub mod gulf;
pub mod input;
pub mod license;
pub mod tariff;

pub use border::{
    CitizenshipVerification, DeathRate, Detention, DetentionCost, DocumentReview, Facility,
    VerificationStrength,
};
pub use error::{DomainError, Result};
pub use golf::{
    EmolumentAssessment, Payment, PaymentSource, SanctionsScreening, SdnEntry, SdnMatch, SdnMatchType,
    EMOLUMENT_DISCLOSURE_THRESHOLD,
};
pub use gulf::{FaraViolation, FeeRatio, SwfInvestment, FEE_TO_RETURNS_EXCESSIVE};
pub use input::DomainInput;
pub use license::{OpacityLevel, Ownership, OwnershipLink};
pub use tariff::{
    Allocation, ExemptionApplication, ExemptionDecision, ExemptionOutcome, FavoritismAnalysis,
    IeepaStatus, RefundLiability, TariffIngest, FAVORITISM_THRESHOLD,
};

use serde::Serialize;
use trumpproof_types::{Domain, ReceiptDraft, ReceiptType};

/// A typed fact with a fixed receipt type
pub trait DomainFact: Serialize {
    const RECEIPT_TYPE: ReceiptType;

    /// Draft attributed to the receipt type's home domain
    fn to_draft(&self) -> Result<ReceiptDraft> {
        Ok(ReceiptDraft::new(Self::RECEIPT_TYPE, serde_json::to_value(self)?))
    }

    /// Draft attributed to `domain`, for shared types such as payments
    fn to_draft_in(&self, domain: Domain) -> Result<ReceiptDraft> {
        Ok(ReceiptDraft::in_domain(
            Self::RECEIPT_TYPE,
            domain,
            serde_json::to_value(self)?,
        ))
    }
}

/// Outcome of an independent check (registration lookup, document match)
#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
pub struct Verification {
    pub check: String,
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl Verification {
    pub fn new(check: impl Into<String>, verified: bool) -> Self {
        Self {
            check: check.into(),
            verified,
            subject: None,
        }
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// A FARA registration lookup for `subject`
    pub fn fara_registration(subject: impl Into<String>, registered: bool) -> Self {
        Self::new("fara_registration", registered).subject(subject)
    }
}

impl DomainFact for Verification {
    const RECEIPT_TYPE: ReceiptType = ReceiptType::Verification;
}

pub(crate) fn non_negative(field: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(DomainError::InvalidInput {
            field,
            reason: format!("must be a finite non-negative number, got {value}"),
        })
    }
}

pub(crate) fn non_empty(field: &'static str, value: impl Into<String>) -> Result<String> {
    let value = value.into();
    if value.trim().is_empty() {
        Err(DomainError::InvalidInput {
            field,
            reason: "must not be empty".to_string(),
        })
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_verification_keeps_requested_domain() {
        let draft = Verification::fara_registration("Affinity Partners", true)
            .to_draft_in(Domain::Gulf)
            .unwrap();
        assert_eq!(draft.receipt_type, "verification_receipt");
        assert_eq!(draft.domain, Domain::Gulf);
        assert_eq!(draft.payload["check"], "fara_registration");
        assert_eq!(draft.payload["subject"], "Affinity Partners");
    }

    #[test]
    fn test_input_guards() {
        assert!(non_negative("amount", -1.0).is_err());
        assert!(non_negative("amount", f64::NAN).is_err());
        assert_eq!(non_negative("amount", 0.0).unwrap(), 0.0);
        assert!(non_empty("name", "  ").is_err());
    }
}
