//! Declarative inputs for derived facts
//!
//! Source systems (and scenario fixtures) often report raw figures rather
//! than finished payloads. A [`DomainInput`] carries those figures and runs
//! the domain computation to produce the draft.

use serde::{Deserialize, Serialize};
use tracing::debug;
use trumpproof_types::{Domain, ReceiptDraft};

use crate::{
    CitizenshipVerification, DeathRate, DocumentReview, DomainFact, EmolumentAssessment, Facility,
    IeepaStatus, Ownership, OwnershipLink, PaymentSource, RefundLiability, Result, Verification,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainInput {
    RefundLiability {
        collections: Vec<f64>,
        ieepa_status: IeepaStatus,
    },
    DeathRate {
        facility_id: String,
        period: String,
        deaths: u64,
        detainee_days: u64,
    },
    CitizenshipVerification {
        detainee_id: String,
        documents: Vec<DocumentReview>,
    },
    Facility {
        facility_id: String,
        capacity: u64,
        current_population: u64,
        #[serde(default)]
        contractor_name: Option<String>,
    },
    EmolumentAssessment {
        payment_id: String,
        amount: f64,
        source: PaymentSource,
        #[serde(default)]
        disclosed: bool,
    },
    Ownership {
        entity_name: String,
        #[serde(default)]
        chain: Vec<OwnershipLink>,
        #[serde(default)]
        unresolved_layers: u32,
    },
    FaraRegistration {
        subject: String,
        registered: bool,
        domain: Domain,
    },
}

impl DomainInput {
    /// Compute the fact and draft it
    pub fn draft(&self) -> Result<ReceiptDraft> {
        let draft = match self {
            DomainInput::RefundLiability {
                collections,
                ieepa_status,
            } => RefundLiability::compute(collections, *ieepa_status)?.to_draft()?,
            DomainInput::DeathRate {
                facility_id,
                period,
                deaths,
                detainee_days,
            } => DeathRate::compute(facility_id.as_str(), period.as_str(), *deaths, *detainee_days)?.to_draft()?,
            DomainInput::CitizenshipVerification {
                detainee_id,
                documents,
            } => CitizenshipVerification::assess(detainee_id.as_str(), documents)?.to_draft()?,
            DomainInput::Facility {
                facility_id,
                capacity,
                current_population,
                contractor_name,
            } => {
                let mut facility = Facility::observe(facility_id.as_str(), *capacity, *current_population)?;
                if let Some(contractor) = contractor_name {
                    facility = facility.operated_by(contractor.as_str());
                }
                facility.to_draft()?
            }
            DomainInput::EmolumentAssessment {
                payment_id,
                amount,
                source,
                disclosed,
            } => EmolumentAssessment::assess(payment_id.as_str(), *amount, source, *disclosed)?.to_draft()?,
            DomainInput::Ownership {
                entity_name,
                chain,
                unresolved_layers,
            } => Ownership::resolve(entity_name.as_str(), chain.clone(), *unresolved_layers)?.to_draft()?,
            DomainInput::FaraRegistration {
                subject,
                registered,
                domain,
            } => Verification::fara_registration(subject.as_str(), *registered).to_draft_in(*domain)?,
        };
        debug!(receipt_type = %draft.receipt_type, domain = %draft.domain, "Drafted derived fact");
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_death_rate_input_from_json() {
        let input: DomainInput = serde_json::from_value(json!({
            "kind": "death_rate",
            "facility_id": "dilley",
            "period": "2025-09",
            "deaths": 6,
            "detainee_days": 30000
        }))
        .unwrap();
        let draft = input.draft().unwrap();
        assert_eq!(draft.receipt_type, "death_rate_receipt");
        assert_eq!(draft.domain, Domain::Border);
        assert_eq!(draft.payload["rate_per_10k_days"], 2.0);
    }

    #[test]
    fn test_emolument_input() {
        let input: DomainInput = serde_json::from_value(json!({
            "kind": "emolument_assessment",
            "payment_id": "pay-7",
            "amount": 25000,
            "source": {"name": "Embassy of Qatar", "country": "QA", "government": true}
        }))
        .unwrap();
        let draft = input.draft().unwrap();
        assert_eq!(draft.domain, Domain::Golf);
        assert_eq!(draft.payload["is_emolument"], true);
        assert_eq!(draft.payload["disclosed"], false);
    }

    #[test]
    fn test_fara_registration_in_requested_domain() {
        let input = DomainInput::FaraRegistration {
            subject: "Affinity Partners".into(),
            registered: true,
            domain: Domain::Gulf,
        };
        let draft = input.draft().unwrap();
        assert_eq!(draft.receipt_type, "verification_receipt");
        assert_eq!(draft.domain, Domain::Gulf);
    }

    #[test]
    fn test_invalid_input_surfaces() {
        let input = DomainInput::RefundLiability {
            collections: vec![-5.0],
            ieepa_status: IeepaStatus::Struck,
        };
        assert!(input.draft().is_err());
    }
}
