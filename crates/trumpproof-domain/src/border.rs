//! Border detention, citizenship verification and facility accountability

use serde::{Deserialize, Serialize};
use trumpproof_types::ReceiptType;

use crate::{non_empty, non_negative, DomainFact, Result};

/// Historical deaths per 10,000 detainee-days
pub const DEATH_RATE_BASELINE: f64 = 0.5;
/// Standard cost of one detainee-day, in dollars
pub const STANDARD_DAILY_COST: f64 = 150.0;
/// Multiple of the standard daily cost considered excessive
pub const EXCESSIVE_COST_MULTIPLE: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detention {
    pub anonymized_id: String,
    pub facility_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citizenship_verified: Option<bool>,
}

impl Detention {
    pub fn new(anonymized_id: impl Into<String>, facility_id: impl Into<String>) -> Result<Self> {
        Ok(Self {
            anonymized_id: non_empty("anonymized_id", anonymized_id)?,
            facility_id: non_empty("facility_id", facility_id)?,
            category: None,
            citizenship_verified: None,
        })
    }
}

impl DomainFact for Detention {
    const RECEIPT_TYPE: ReceiptType = ReceiptType::Detention;
}

/// One identity document looked at during a citizenship check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentReview {
    pub doc_type: String,
    #[serde(default)]
    pub indicates_citizenship: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStrength {
    Low,
    Medium,
    High,
}

impl VerificationStrength {
    fn of(doc_type: &str) -> Self {
        match doc_type.to_lowercase().as_str() {
            "passport" | "birth_certificate" | "naturalization_certificate" => VerificationStrength::High,
            "ssn_card" | "drivers_license" | "military_id" => VerificationStrength::Medium,
            _ => VerificationStrength::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitizenshipVerification {
    pub detainee_id: String,
    pub citizenship_likely: bool,
    pub verification_strength: VerificationStrength,
    pub documents_reviewed: u64,
}

impl CitizenshipVerification {
    /// Assess the documents on file. Only medium or high strength documents
    /// can indicate citizenship; low-strength evidence never does.
    pub fn assess(detainee_id: impl Into<String>, documents: &[DocumentReview]) -> Result<Self> {
        let verification_strength = documents
            .iter()
            .map(|d| VerificationStrength::of(&d.doc_type))
            .max()
            .unwrap_or(VerificationStrength::Low);
        let citizenship_likely = verification_strength > VerificationStrength::Low
            && documents.iter().any(|d| d.indicates_citizenship);

        Ok(Self {
            detainee_id: non_empty("detainee_id", detainee_id)?,
            citizenship_likely,
            verification_strength,
            documents_reviewed: documents.len() as u64,
        })
    }
}

impl DomainFact for CitizenshipVerification {
    const RECEIPT_TYPE: ReceiptType = ReceiptType::CitizenshipVerification;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub facility_id: String,
    pub capacity: u64,
    pub current_population: u64,
    pub occupancy_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contractor_name: Option<String>,
}

impl Facility {
    pub fn observe(facility_id: impl Into<String>, capacity: u64, current_population: u64) -> Result<Self> {
        let occupancy_rate = if capacity > 0 {
            current_population as f64 / capacity as f64
        } else {
            0.0
        };
        Ok(Self {
            facility_id: non_empty("facility_id", facility_id)?,
            capacity,
            current_population,
            occupancy_rate,
            contractor_name: None,
        })
    }

    pub fn operated_by(mut self, contractor: impl Into<String>) -> Self {
        self.contractor_name = Some(contractor.into());
        self
    }

    pub fn is_overcrowded(&self) -> bool {
        self.occupancy_rate > 1.0
    }
}

impl DomainFact for Facility {
    const RECEIPT_TYPE: ReceiptType = ReceiptType::Facility;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeathRate {
    pub facility_id: String,
    pub period: String,
    pub deaths: u64,
    pub detainee_days: u64,
    pub rate_per_10k_days: f64,
}

impl DeathRate {
    /// Deaths per 10,000 detainee-days; zero when no detainee-days were recorded
    pub fn compute(facility_id: impl Into<String>, period: impl Into<String>, deaths: u64, detainee_days: u64) -> Result<Self> {
        let rate_per_10k_days = if detainee_days > 0 {
            deaths as f64 * 10_000.0 / detainee_days as f64
        } else {
            0.0
        };
        Ok(Self {
            facility_id: non_empty("facility_id", facility_id)?,
            period: non_empty("period", period)?,
            deaths,
            detainee_days,
            rate_per_10k_days,
        })
    }

    /// Rate as a multiple of the historical baseline
    pub fn baseline_multiple(&self) -> f64 {
        self.rate_per_10k_days / DEATH_RATE_BASELINE
    }
}

impl DomainFact for DeathRate {
    const RECEIPT_TYPE: ReceiptType = ReceiptType::DeathRate;
}

/// Cost of detention per detainee-day over a reporting period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetentionCost {
    pub facility_id: String,
    pub total_cost: f64,
    pub detainee_days: u64,
    pub cost_per_detainee_day: f64,
    pub cost_multiple: f64,
    pub excessive: bool,
}

impl DetentionCost {
    pub fn compute(facility_id: impl Into<String>, total_cost: f64, average_population: u64, days: u64) -> Result<Self> {
        let total_cost = non_negative("total_cost", total_cost)?;
        let detainee_days = average_population.saturating_mul(days);
        let cost_per_detainee_day = if detainee_days > 0 {
            total_cost / detainee_days as f64
        } else {
            0.0
        };
        let cost_multiple = cost_per_detainee_day / STANDARD_DAILY_COST;
        Ok(Self {
            facility_id: non_empty("facility_id", facility_id)?,
            total_cost,
            detainee_days,
            cost_per_detainee_day,
            cost_multiple,
            excessive: cost_multiple > EXCESSIVE_COST_MULTIPLE,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(doc_type: &str, indicates_citizenship: bool) -> DocumentReview {
        DocumentReview {
            doc_type: doc_type.to_string(),
            indicates_citizenship,
        }
    }

    #[test]
    fn test_death_rate_per_10k() {
        let rate = DeathRate::compute("dilley", "2025-09", 6, 30_000).unwrap();
        assert_eq!(rate.rate_per_10k_days, 2.0);
        assert_eq!(rate.baseline_multiple(), 4.0);

        let empty = DeathRate::compute("dilley", "2025-10", 0, 0).unwrap();
        assert_eq!(empty.rate_per_10k_days, 0.0);
    }

    #[test]
    fn test_death_rate_draft_uses_integer_counts() {
        let draft = DeathRate::compute("dilley", "2025-09", 1, 20_000).unwrap().to_draft().unwrap();
        assert_eq!(draft.receipt_type, "death_rate_receipt");
        assert!(draft.payload["deaths"].is_u64());
        assert!(draft.payload["detainee_days"].is_u64());
    }

    #[test]
    fn test_cost_per_detainee_day() {
        let standard = DetentionCost::compute("krome", 150.0 * 500.0 * 30.0, 500, 30).unwrap();
        assert_eq!(standard.cost_per_detainee_day, 150.0);
        assert!(!standard.excessive);

        let offshore = DetentionCost::compute("gtmo", 100_000.0 * 30.0, 1, 30).unwrap();
        assert!(offshore.excessive);

        let idle = DetentionCost::compute("empty", 1_000.0, 0, 30).unwrap();
        assert_eq!(idle.cost_per_detainee_day, 0.0);
        assert!(!idle.excessive);
    }

    #[test]
    fn test_citizenship_strength() {
        let strong = CitizenshipVerification::assess("D-1", &[doc("Passport", true)]).unwrap();
        assert_eq!(strong.verification_strength, VerificationStrength::High);
        assert!(strong.citizenship_likely);

        let weak = CitizenshipVerification::assess("D-2", &[doc("utility_bill", true)]).unwrap();
        assert_eq!(weak.verification_strength, VerificationStrength::Low);
        assert!(!weak.citizenship_likely);

        let medium = CitizenshipVerification::assess("D-3", &[doc("ssn_card", false)]).unwrap();
        assert_eq!(medium.verification_strength, VerificationStrength::Medium);
        assert!(!medium.citizenship_likely);
        assert_eq!(medium.documents_reviewed, 1);
    }

    #[test]
    fn test_facility_occupancy() {
        let facility = Facility::observe("krome", 600, 900).unwrap().operated_by("GEO Group");
        assert!(facility.is_overcrowded());
        assert_eq!(facility.occupancy_rate, 1.5);
        let draft = facility.to_draft().unwrap();
        assert_eq!(draft.payload["contractor_name"], "GEO Group");

        let closed = Facility::observe("closed", 0, 0).unwrap();
        assert_eq!(closed.occupancy_rate, 0.0);
    }
}
