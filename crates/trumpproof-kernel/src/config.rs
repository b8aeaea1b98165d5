//! Kernel configuration
//!
//! Loaded once at process start and passed explicitly to every component.
//! Sources, later ones overriding earlier ones:
//!
//! 1. Built-in defaults
//! 2. An optional config file (TOML or JSON)
//! 3. `config/default` and `config/local` if present
//! 4. `TRUMPPROOF__*` environment variables, `__` separated
//!    (e.g. `TRUMPPROOF__SLO__INGEST__THRESHOLD_MS=75`)

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use trumpproof_correlation::CorrelationConfig;
use trumpproof_policy::StopRuleConfig;
use trumpproof_receipts::{SchemaRegistry, ValidationLimits};
use trumpproof_slo::SloConfig;

use crate::{KernelError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub slo: SloConfig,
    pub stoprules: StopRuleConfig,
    pub correlation: CorrelationConfig,
    pub ledger: LedgerSettings,
    pub rollback: RollbackConfig,
    pub remediation: RemediationConfig,
    pub cycles: CycleSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// JSONL file backing the ledger; in memory when unset
    pub path: Option<PathBuf>,
    /// JSON schema registry replacing the built-in shapes
    pub schema_path: Option<PathBuf>,
    pub max_payload_bytes: usize,
    pub max_depth: usize,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        let limits = ValidationLimits::default();
        Self {
            path: None,
            schema_path: None,
            max_payload_bytes: limits.max_payload_bytes,
            max_depth: limits.max_depth,
        }
    }
}

impl LedgerSettings {
    /// Build the schema registry these settings describe
    pub fn registry(&self) -> Result<SchemaRegistry> {
        let registry = match &self.schema_path {
            Some(path) => {
                let json = std::fs::read_to_string(path).map_err(|e| {
                    KernelError::Config(format!("cannot read schema registry {}: {e}", path.display()))
                })?;
                SchemaRegistry::from_json(&json)?
            }
            None => SchemaRegistry::builtin(),
        };
        Ok(registry.with_limits(ValidationLimits {
            max_payload_bytes: self.max_payload_bytes,
            max_depth: self.max_depth,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollbackConfig {
    /// Consecutive reject-class verification breaches that trigger rollback
    pub verification_breach_budget: u32,
}

impl Default for RollbackConfig {
    fn default() -> Self {
        Self {
            verification_breach_budget: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemediationConfig {
    /// Occurrences of one stoprule, over the recent ledger, that make a
    /// recurring pattern
    pub min_recurrence: usize,
    /// Occurrences at which a proposal is high priority
    pub high_priority_at: usize,
    /// Recent receipts searched for earlier occurrences
    pub window: usize,
    /// Ranked exposures carried on the proposal receipt
    pub ranked_limit: usize,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            min_recurrence: 3,
            high_priority_at: 5,
            window: 1_000,
            ranked_limit: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleSettings {
    /// Finished cycles kept for lookup once they leave the live set
    pub archive_capacity: usize,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            archive_capacity: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl KernelConfig {
    /// Load configuration from an optional file and the environment
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }
        builder = builder
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("TRUMPPROOF")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: KernelConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.correlation.validate()?;
        if self.slo.window_size == 0 {
            return Err(KernelError::Config("slo.window_size must be positive".to_string()));
        }
        if self.rollback.verification_breach_budget == 0 {
            return Err(KernelError::Config(
                "rollback.verification_breach_budget must be positive".to_string(),
            ));
        }
        if self.remediation.min_recurrence < 2 {
            return Err(KernelError::Config(
                "remediation.min_recurrence must be at least 2".to_string(),
            ));
        }
        if self.cycles.archive_capacity == 0 {
            return Err(KernelError::Config("cycles.archive_capacity must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use trumpproof_slo::SloAction;

    #[test]
    fn test_defaults() {
        let config = KernelConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.slo.ingest.threshold_ms, 50);
        assert_eq!(config.slo.ingest.action, SloAction::Reject);
        assert_eq!(config.correlation.threshold, 4);
        assert_eq!(config.rollback.verification_breach_budget, 3);
        assert_eq!(config.remediation.min_recurrence, 3);
        assert_eq!(config.cycles.archive_capacity, 1_000);
        assert!(config.ledger.path.is_none());
    }

    #[test]
    fn test_load_from_file_overrides_sections() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[slo.verification]\nthreshold_ms = 250\naction = \"reject\"\n\n[correlation]\nlookback_days = 7\n"
        )
        .unwrap();

        let config = KernelConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.slo.verification.threshold_ms, 250);
        assert_eq!(config.slo.verification.action, SloAction::Reject);
        assert_eq!(config.slo.ingest.threshold_ms, 50);
        assert_eq!(config.correlation.lookback_days, 7);
        assert_eq!(config.correlation.threshold, 4);
    }

    #[test]
    fn test_invalid_budget_rejected() {
        let config = KernelConfig {
            rollback: RollbackConfig {
                verification_breach_budget: 0,
            },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(KernelError::Config(_))));
    }

    #[test]
    fn test_empty_archive_rejected() {
        let mut config = KernelConfig::default();
        config.cycles.archive_capacity = 0;
        assert!(matches!(config.validate(), Err(KernelError::Config(_))));

        let mut config = KernelConfig::default();
        config.remediation.min_recurrence = 1;
        assert!(matches!(config.validate(), Err(KernelError::Config(_))));
    }
}
