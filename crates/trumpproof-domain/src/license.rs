//! Licensing partners and beneficial ownership

use serde::{Deserialize, Serialize};
use trumpproof_types::ReceiptType;

use crate::{non_empty, DomainFact, Result};

/// Unresolved layers at which opacity saturates
pub const OPACITY_SATURATION_LAYERS: u32 = 5;

/// One level of an ownership chain, from the licensee up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipLink {
    pub entity_name: String,
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jurisdiction: Option<String>,
}

impl OwnershipLink {
    pub fn new(entity_name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            entity_name: entity_name.into(),
            entity_type: entity_type.into(),
            jurisdiction: None,
        }
    }

    pub fn is_individual(&self) -> bool {
        self.entity_type.eq_ignore_ascii_case("individual")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpacityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl OpacityLevel {
    pub fn of(score: f64) -> Self {
        if score >= 0.8 {
            OpacityLevel::Critical
        } else if score >= 0.6 {
            OpacityLevel::High
        } else if score >= 0.4 {
            OpacityLevel::Medium
        } else {
            OpacityLevel::Low
        }
    }
}

/// Opacity in [0, 1] from the number of ownership layers left unresolved
pub fn opacity_score(unresolved_layers: u32) -> f64 {
    (f64::from(unresolved_layers) / f64::from(OPACITY_SATURATION_LAYERS)).min(1.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ownership {
    pub entity_name: String,
    pub ownership_chain: Vec<OwnershipLink>,
    pub owner_identified: bool,
    pub opacity_score: f64,
}

impl Ownership {
    /// Resolve a chain. The owner is identified when the chain ends at an
    /// individual; `unresolved_layers` counts the layers that could not be
    /// looked through.
    pub fn resolve(entity_name: impl Into<String>, chain: Vec<OwnershipLink>, unresolved_layers: u32) -> Result<Self> {
        let owner_identified = chain.last().is_some_and(OwnershipLink::is_individual);
        Ok(Self {
            entity_name: non_empty("entity_name", entity_name)?,
            ownership_chain: chain,
            owner_identified,
            opacity_score: opacity_score(unresolved_layers),
        })
    }

    pub fn opacity(&self) -> OpacityLevel {
        OpacityLevel::of(self.opacity_score)
    }

    /// The ultimate owner, when the chain resolved to one
    pub fn ultimate_owner(&self) -> Option<&OwnershipLink> {
        self.ownership_chain.last().filter(|_| self.owner_identified)
    }
}

impl DomainFact for Ownership {
    const RECEIPT_TYPE: ReceiptType = ReceiptType::Ownership;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opacity_score_saturates() {
        assert_eq!(opacity_score(0), 0.0);
        assert_eq!(opacity_score(2), 0.4);
        assert_eq!(opacity_score(5), 1.0);
        assert_eq!(opacity_score(12), 1.0);
        assert_eq!(OpacityLevel::of(opacity_score(4)), OpacityLevel::Critical);
        assert_eq!(OpacityLevel::of(opacity_score(3)), OpacityLevel::High);
        assert_eq!(OpacityLevel::of(opacity_score(1)), OpacityLevel::Low);
    }

    #[test]
    fn test_owner_identified_only_at_individual() {
        let resolved = Ownership::resolve(
            "Trump Tower Jeddah",
            vec![
                OwnershipLink::new("Dar Global", "company"),
                OwnershipLink::new("Yousef Al Shelash", "individual"),
            ],
            0,
        )
        .unwrap();
        assert!(resolved.owner_identified);
        assert_eq!(resolved.ultimate_owner().unwrap().entity_name, "Yousef Al Shelash");

        let shell = Ownership::resolve(
            "Opaque Holdings LLC",
            vec![OwnershipLink::new("Nominee Trust", "trust")],
            4,
        )
        .unwrap();
        assert!(!shell.owner_identified);
        assert!(shell.ultimate_owner().is_none());
        assert_eq!(shell.opacity(), OpacityLevel::Critical);
    }

    #[test]
    fn test_empty_chain() {
        let ownership = Ownership::resolve("Unknown LLC", Vec::new(), 5).unwrap();
        assert!(!ownership.owner_identified);
        let draft = ownership.to_draft().unwrap();
        assert_eq!(draft.payload["ownership_chain"], serde_json::json!([]));
        assert_eq!(draft.payload["opacity_score"], 1.0);
    }
}
