//! Event payments and emoluments

use serde::{Deserialize, Serialize};
use trumpproof_types::ReceiptType;

use crate::{non_empty, non_negative, DomainFact, Result, Verification};

/// Emoluments at or above this amount must be disclosed
pub const EMOLUMENT_DISCLOSURE_THRESHOLD: f64 = 10_000.0;

const DOMESTIC: &[&str] = &["us", "usa", "united states"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub source_name: String,
    pub recipient_name: String,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
}

impl Payment {
    pub fn new(source: &PaymentSource, recipient_name: impl Into<String>, amount: f64) -> Result<Self> {
        Ok(Self {
            source_name: non_empty("source_name", source.name.clone())?,
            recipient_name: non_empty("recipient_name", recipient_name)?,
            amount: non_negative("amount", amount)?,
            source_country: source.country.clone(),
            verified: None,
        })
    }
}

impl DomainFact for Payment {
    const RECEIPT_TYPE: ReceiptType = ReceiptType::Payment;
}

/// Who a payment came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSource {
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    /// Government, state-owned or sovereign money
    #[serde(default)]
    pub government: bool,
}

impl PaymentSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            country: None,
            government: false,
        }
    }

    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn government(mut self) -> Self {
        self.government = true;
        self
    }

    /// A source with no recorded country is treated as foreign
    pub fn is_foreign(&self) -> bool {
        self.country
            .as_deref()
            .map_or(true, |c| !DOMESTIC.contains(&c.trim().to_lowercase().as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmolumentAssessment {
    pub payment_id: String,
    pub amount: f64,
    pub source_name: String,
    pub is_emolument: bool,
    pub disclosed: bool,
}

impl EmolumentAssessment {
    /// Anything of value from a foreign government counts as an emolument
    pub fn assess(payment_id: impl Into<String>, amount: f64, source: &PaymentSource, disclosed: bool) -> Result<Self> {
        let amount = non_negative("amount", amount)?;
        Ok(Self {
            payment_id: non_empty("payment_id", payment_id)?,
            amount,
            source_name: non_empty("source_name", source.name.clone())?,
            is_emolument: source.is_foreign() && source.government && amount > 0.0,
            disclosed,
        })
    }

    pub fn requires_disclosure(&self) -> bool {
        self.is_emolument && self.amount >= EMOLUMENT_DISCLOSURE_THRESHOLD
    }

    /// Disclosure required but not made
    pub fn is_violation(&self) -> bool {
        self.requires_disclosure() && !self.disclosed
    }
}

impl DomainFact for EmolumentAssessment {
    const RECEIPT_TYPE: ReceiptType = ReceiptType::EmolumentAssessment;
}

/// Countries whose entities are screened as possible matches against any
/// listed party from the same country
const HIGH_RISK_COUNTRIES: [&str; 5] = ["russia", "iran", "north korea", "syria", "cuba"];

/// An entry on the OFAC Specially Designated Nationals list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdnEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SdnMatchType {
    ExactName,
    HighRiskCountry,
}

impl SdnMatchType {
    pub fn confidence(&self) -> f64 {
        match self {
            SdnMatchType::ExactName => 1.0,
            SdnMatchType::HighRiskCountry => 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdnMatch {
    pub sdn_id: String,
    pub sdn_name: String,
    pub match_type: SdnMatchType,
    pub confidence: f64,
}

/// Result of screening a payment source against the SDN list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanctionsScreening {
    pub entity_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_country: Option<String>,
    pub entries_checked: usize,
    pub matches: Vec<SdnMatch>,
}

impl SanctionsScreening {
    /// Exact (case-insensitive) name matches, plus every listed party
    /// sharing a high-risk country with the source
    pub fn screen(source: &PaymentSource, sdn_list: &[SdnEntry]) -> Self {
        let name = source.name.trim().to_lowercase();
        let country = source.country.as_deref().map(|c| c.trim().to_lowercase());
        let high_risk = country
            .as_deref()
            .filter(|c| HIGH_RISK_COUNTRIES.contains(c));

        let matches = sdn_list
            .iter()
            .filter_map(|entry| {
                let match_type = if entry.name.trim().to_lowercase() == name {
                    SdnMatchType::ExactName
                } else if high_risk.is_some()
                    && entry.country.as_deref().map(|c| c.trim().to_lowercase()).as_deref() == high_risk
                {
                    SdnMatchType::HighRiskCountry
                } else {
                    return None;
                };
                Some(SdnMatch {
                    sdn_id: entry.id.clone(),
                    sdn_name: entry.name.clone(),
                    match_type,
                    confidence: match_type.confidence(),
                })
            })
            .collect();

        Self {
            entity_name: source.name.clone(),
            entity_country: source.country.clone(),
            entries_checked: sdn_list.len(),
            matches,
        }
    }

    pub fn cleared(&self) -> bool {
        self.matches.is_empty()
    }

    /// Highest-confidence match, if any
    pub fn strongest(&self) -> Option<&SdnMatch> {
        self.matches
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    }

    /// The screening as an independent check on the source
    pub fn to_verification(&self) -> Verification {
        Verification::new("ofac_sanctions_screen", self.cleared()).subject(self.entity_name.clone())
    }
}
