//! Sovereign-fund investment, fees and FARA

use serde::{Deserialize, Serialize};
use trumpproof_types::ReceiptType;

use crate::{non_empty, non_negative, DomainFact, Result};

/// Fee-to-returns ratio above which fees are excessive
pub const FEE_TO_RETURNS_EXCESSIVE: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwfInvestment {
    pub fund_name: String,
    pub recipient_name: String,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realized_return: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub government_source: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fara_registered: Option<bool>,
}

impl SwfInvestment {
    pub fn new(fund_name: impl Into<String>, recipient_name: impl Into<String>, amount: f64) -> Result<Self> {
        Ok(Self {
            fund_name: non_empty("fund_name", fund_name)?,
            recipient_name: non_empty("recipient_name", recipient_name)?,
            amount: non_negative("amount", amount)?,
            realized_return: None,
            government_source: None,
            fara_registered: None,
        })
    }

    pub fn realized_return(mut self, realized: f64) -> Self {
        self.realized_return = Some(realized);
        self
    }

    /// Mark the money as government-sourced, with the recipient's FARA status
    pub fn government_sourced(mut self, fara_registered: bool) -> Self {
        self.government_source = Some(true);
        self.fara_registered = Some(fara_registered);
        self
    }

    /// Ratio of `fees` collected to the realized return; no reported return
    /// counts as zero
    pub fn fee_ratio(&self, fees: f64) -> FeeRatio {
        FeeRatio::compute(fees, self.realized_return.unwrap_or(0.0))
    }
}

impl DomainFact for SwfInvestment {
    const RECEIPT_TYPE: ReceiptType = ReceiptType::SwfInvestment;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaraViolation {
    pub entity_id: String,
    pub foreign_payments: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_status: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub activities: Vec<String>,
}

impl FaraViolation {
    pub fn new(entity_id: impl Into<String>, foreign_payments: f64) -> Result<Self> {
        Ok(Self {
            entity_id: non_empty("entity_id", entity_id)?,
            foreign_payments: non_negative("foreign_payments", foreign_payments)?,
            registration_status: Some("unregistered".to_string()),
            activities: Vec::new(),
        })
    }

    pub fn activity(mut self, activity: impl Into<String>) -> Self {
        self.activities.push(activity.into());
        self
    }
}

impl DomainFact for FaraViolation {
    const RECEIPT_TYPE: ReceiptType = ReceiptType::FaraViolation;
}

/// Fees collected relative to returns generated
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "classification", content = "ratio", rename_all = "snake_case")]
pub enum FeeRatio {
    /// Fees collected on zero returns
    Unbounded,
    /// Fees collected while investors lost money; magnitude of fees over losses
    NegativeReturns(f64),
    Calculated(f64),
}

impl FeeRatio {
    pub fn compute(fees: f64, returns: f64) -> Self {
        if returns == 0.0 {
            FeeRatio::Unbounded
        } else if returns < 0.0 {
            FeeRatio::NegativeReturns((fees / returns).abs())
        } else {
            FeeRatio::Calculated(fees / returns)
        }
    }

    /// The finite ratio, if there is one
    pub fn value(&self) -> Option<f64> {
        match self {
            FeeRatio::Unbounded => None,
            FeeRatio::NegativeReturns(r) | FeeRatio::Calculated(r) => Some(*r),
        }
    }

    pub fn is_excessive(&self) -> bool {
        self.value().map_or(true, |r| r > FEE_TO_RETURNS_EXCESSIVE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_return_is_unbounded_not_a_division() {
        let investment = SwfInvestment::new("PIF", "Affinity Partners", 2.0e9)
            .unwrap()
            .realized_return(0.0);
        let ratio = investment.fee_ratio(157.0e6);
        assert_eq!(ratio, FeeRatio::Unbounded);
        assert!(ratio.value().is_none());
        assert!(ratio.is_excessive());

        let json = serde_json::to_value(ratio).unwrap();
        assert_eq!(json["classification"], "unbounded");
    }

    #[test]
    fn test_ratio_classes() {
        assert_eq!(FeeRatio::compute(50.0, 10.0), FeeRatio::Calculated(5.0));
        assert!(!FeeRatio::compute(50.0, 10.0).is_excessive());
        assert!(FeeRatio::compute(200.0, 10.0).is_excessive());
        assert_eq!(FeeRatio::compute(30.0, -10.0), FeeRatio::NegativeReturns(3.0));
    }

    #[test]
    fn test_government_sourced_investment_draft() {
        let draft = SwfInvestment::new("Public Investment Fund", "Affinity Partners", 2.0e9)
            .unwrap()
            .government_sourced(false)
            .to_draft()
            .unwrap();
        assert_eq!(draft.receipt_type, "swf_investment_receipt");
        assert_eq!(draft.payload["government_source"], true);
        assert_eq!(draft.payload["fara_registered"], false);
        assert!(draft.payload.get("realized_return").is_none());
    }
}
