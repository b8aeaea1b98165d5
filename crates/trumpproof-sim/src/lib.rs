//! TrumpProof scenario harness
//!
//! Acceptance scenarios are data: JSON fixtures under `scenarios/`, embedded
//! at compile time and replayed through the kernel's public API. No scenario
//! has a code path of its own.

pub mod catalog;
pub mod fixture;
pub mod runner;

pub use catalog::{builtin, by_name, SCENARIO_NAMES};
pub use fixture::{Expectation, FactSpec, Scenario, Step};
pub use runner::{ScenarioOutcome, ScenarioRunner, StepObservation, StepOutcome};

use thiserror::Error;
use trumpproof_domain::DomainError;
use trumpproof_kernel::KernelError;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("invalid scenario fixture: {0}")]
    Fixture(#[from] serde_json::Error),

    #[error("unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("step needs a cycle but none has run")]
    NoCycle,

    #[error("kernel error: {0}")]
    Kernel(#[from] KernelError),

    #[error("fact error: {0}")]
    Domain(#[from] DomainError),

    #[error("scenario {scenario} failed: {}", mismatches.join("; "))]
    Failed {
        scenario: String,
        mismatches: Vec<String>,
    },
}

pub type Result<T> = std::result::Result<T, ScenarioError>;

/// Run the named built-in scenario, failing on any unmet expectation
pub async fn run_named(name: &str) -> Result<ScenarioOutcome> {
    let scenario = by_name(name)?;
    ScenarioRunner::run(&scenario).await?.into_result()
}
