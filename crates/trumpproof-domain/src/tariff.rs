//! Tariff revenue, exemptions and refund exposure

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use trumpproof_types::ReceiptType;

use crate::{non_empty, non_negative, DomainFact, Result, Verification};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffIngest {
    pub revenue_amount: f64,
    pub period: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl TariffIngest {
    pub fn new(revenue_amount: f64, period: impl Into<String>) -> Result<Self> {
        Ok(Self {
            revenue_amount: non_negative("revenue_amount", revenue_amount)?,
            period: non_empty("period", period)?,
            source: None,
        })
    }
}

impl DomainFact for TariffIngest {
    const RECEIPT_TYPE: ReceiptType = ReceiptType::TariffIngest;
}

/// Where collected revenue was directed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub total_revenue: f64,
    pub allocations: BTreeMap<String, f64>,
    pub allocated_total: f64,
}

impl Allocation {
    pub fn new(total_revenue: f64, allocations: BTreeMap<String, f64>) -> Result<Self> {
        let total_revenue = non_negative("total_revenue", total_revenue)?;
        for amount in allocations.values() {
            non_negative("allocations", *amount)?;
        }
        let allocated_total = allocations.values().sum();
        Ok(Self {
            total_revenue,
            allocations,
            allocated_total,
        })
    }

    pub fn unallocated(&self) -> f64 {
        self.total_revenue - self.allocated_total
    }
}

impl DomainFact for Allocation {
    const RECEIPT_TYPE: ReceiptType = ReceiptType::Allocation;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExemptionApplication {
    pub applicant: String,
    pub product: String,
    pub amount_requested: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hts_code: Option<String>,
}

impl ExemptionApplication {
    pub fn new(applicant: impl Into<String>, product: impl Into<String>, amount_requested: f64) -> Result<Self> {
        Ok(Self {
            applicant: non_empty("applicant", applicant)?,
            product: product.into(),
            amount_requested: non_negative("amount_requested", amount_requested)?,
            hts_code: None,
        })
    }
}

impl DomainFact for ExemptionApplication {
    const RECEIPT_TYPE: ReceiptType = ReceiptType::ExemptionApplication;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExemptionDecision {
    Approved,
    Denied,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExemptionOutcome {
    pub exemption_id: String,
    pub outcome: ExemptionDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_documented_criteria: Option<bool>,
}

impl ExemptionOutcome {
    /// Record a decision. A decision with no rationale has no documented criteria.
    pub fn new(exemption_id: impl Into<String>, outcome: ExemptionDecision, rationale: Option<String>) -> Result<Self> {
        let rationale = rationale.filter(|r| !r.trim().is_empty());
        Ok(Self {
            exemption_id: non_empty("exemption_id", exemption_id)?,
            outcome,
            has_documented_criteria: Some(rationale.is_some()),
            rationale,
        })
    }
}

impl DomainFact for ExemptionOutcome {
    const RECEIPT_TYPE: ReceiptType = ReceiptType::ExemptionOutcome;
}

/// Approval-rate gap between lobbying and non-lobbying applicants that
/// counts as favoritism
pub const FAVORITISM_THRESHOLD: f64 = 0.15;

/// Approval rates of lobbying applicants against everyone else
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoritismAnalysis {
    /// Approved and denied outcomes; pending ones are left out
    pub decided: usize,
    pub approved: usize,
    pub lobbying_approval_rate: f64,
    pub baseline_approval_rate: f64,
    pub deviation: f64,
    pub favoritism_detected: bool,
    /// Applicants with a lobbying disclosure, normalized and sorted
    pub connected_applicants: Vec<String>,
}

impl FavoritismAnalysis {
    /// Cross-reference `(applicant, decision)` outcomes with the clients
    /// named in lobbying disclosures
    pub fn analyze<'a>(
        outcomes: impl IntoIterator<Item = (&'a str, ExemptionDecision)>,
        lobbying_clients: &[&str],
    ) -> Self {
        let clients: BTreeSet<String> = lobbying_clients
            .iter()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();

        // (approved, total) per group
        let mut lobbying = (0usize, 0usize);
        let mut baseline = (0usize, 0usize);
        let mut connected = BTreeSet::new();
        for (applicant, decision) in outcomes {
            let approved = match decision {
                ExemptionDecision::Approved => 1,
                ExemptionDecision::Denied => 0,
                ExemptionDecision::Pending => continue,
            };
            let applicant = applicant.trim().to_lowercase();
            let group = if clients.contains(&applicant) {
                connected.insert(applicant);
                &mut lobbying
            } else {
                &mut baseline
            };
            group.0 += approved;
            group.1 += 1;
        }

        let rate = |(approved, total): (usize, usize)| {
            if total == 0 {
                0.0
            } else {
                approved as f64 / total as f64
            }
        };
        let lobbying_approval_rate = rate(lobbying);
        let baseline_approval_rate = rate(baseline);
        let deviation = (lobbying_approval_rate - baseline_approval_rate).abs();

        Self {
            decided: lobbying.1 + baseline.1,
            approved: lobbying.0 + baseline.0,
            lobbying_approval_rate,
            baseline_approval_rate,
            deviation,
            favoritism_detected: deviation > FAVORITISM_THRESHOLD,
            connected_applicants: connected.into_iter().collect(),
        }
    }

    /// The analysis as an independent check; a detected pattern is an
    /// unverified claim of even-handed review
    pub fn to_verification(&self) -> Verification {
        Verification::new("exemption_favoritism", !self.favoritism_detected)
    }
}

/// Status of the emergency-powers authority the tariffs were collected under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IeepaStatus {
    Pending,
    Affirmed,
    StruckPartial,
    Struck,
}

impl IeepaStatus {
    /// Share of collections that would be refunded, in percent. Pending is
    /// priced as affirmed until a decision lands.
    pub fn exposure_percentage(&self) -> f64 {
        match self {
            IeepaStatus::Pending | IeepaStatus::Affirmed => 0.0,
            IeepaStatus::StruckPartial => 30.0,
            IeepaStatus::Struck => 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundLiability {
    pub total_collected: f64,
    pub ieepa_status: IeepaStatus,
    pub refund_liability: f64,
    pub exposure_percentage: f64,
}

impl RefundLiability {
    /// Refund exposure over a set of collections under `status`
    pub fn compute(collections: &[f64], status: IeepaStatus) -> Result<Self> {
        let mut total_collected = 0.0;
        for amount in collections {
            total_collected += non_negative("collections", *amount)?;
        }
        let exposure_percentage = status.exposure_percentage();
        let refund_liability = if exposure_percentage >= 100.0 {
            total_collected
        } else {
            total_collected * exposure_percentage / 100.0
        };
        Ok(Self {
            total_collected,
            ieepa_status: status,
            refund_liability,
            exposure_percentage,
        })
    }
}

impl DomainFact for RefundLiability {
    const RECEIPT_TYPE: ReceiptType = ReceiptType::RefundLiability;
}
