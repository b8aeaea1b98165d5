//! Correlation configuration

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{CorrelationError, Result};

/// Payload fields holding entity names
pub const DEFAULT_ENTITY_FIELDS: [&str; 10] = [
    "entity_name",
    "entity_id",
    "applicant",
    "contractor_name",
    "partner_name",
    "fund_name",
    "recipient_name",
    "source_name",
    "licensee_name",
    "licensor_name",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Distinct governance domains needed to flag an entity
    pub threshold: usize,
    /// Days back from the newest indexed receipt that still count
    pub lookback_days: i64,
    pub entity_fields: Vec<String>,
    /// Normalized variant -> canonical name
    pub aliases: BTreeMap<String, String>,
    /// Most receipt sequence numbers remembered as already considered
    pub seen_capacity: usize,
}

impl CorrelationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.threshold < 2 {
            return Err(CorrelationError::InvalidConfig(format!(
                "threshold must be at least 2 domains, got {}",
                self.threshold
            )));
        }
        if self.lookback_days <= 0 {
            return Err(CorrelationError::InvalidConfig(format!(
                "lookback_days must be positive, got {}",
                self.lookback_days
            )));
        }
        if self.seen_capacity == 0 {
            return Err(CorrelationError::InvalidConfig(
                "seen_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        let aliases = [
            "pif",
            "saudi pif",
            "saudi public investment fund",
            "public investment fund of saudi arabia",
        ]
        .into_iter()
        .map(|variant| (variant.to_string(), "public investment fund".to_string()))
        .collect();

        Self {
            threshold: 4,
            lookback_days: 30,
            entity_fields: DEFAULT_ENTITY_FIELDS.iter().map(|f| f.to_string()).collect(),
            aliases,
            seen_capacity: 100_000,
        }
    }
}
