//! Scenario replay against a fresh kernel

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use trumpproof_kernel::{
    CycleReport, DomainAdapter, ErrorKind, Kernel, KernelError, RecordingNotifier, ResumeSignal,
    StaticAdapter,
};
use trumpproof_types::{CycleId, CycleState, Domain, ReceiptType};

use crate::{Expectation, FactSpec, Result, Scenario, ScenarioError, Step};

/// What a step did, as compared against its expectation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StepObservation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<CycleState>,
    pub violations: Vec<String>,
    pub ingested: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub pif_domains: Vec<Vec<Domain>>,
    pub anomalies: Vec<String>,
    pub receipt_types: Vec<String>,
    pub chain_valid: bool,
    pub frozen: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl StepObservation {
    fn with_report(mut self, report: &CycleReport) -> Self {
        self.state = Some(report.state);
        self.violations = report.violations.clone();
        self.ingested = report.ingested;
        self.rejected = report.rejected_count();
        self.skipped = report.skipped_count();
        self
    }

    /// Every way the observation departs from `expect`
    pub fn mismatches(&self, expect: &Expectation) -> Vec<String> {
        let mut out = Vec::new();
        check(&mut out, "state", expect.state.as_ref(), self.state.as_ref());
        check(&mut out, "violations", expect.violations.as_ref(), Some(&self.violations));
        check(&mut out, "ingested", expect.ingested.as_ref(), Some(&self.ingested));
        check(&mut out, "rejected", expect.rejected.as_ref(), Some(&self.rejected));
        check(&mut out, "skipped", expect.skipped.as_ref(), Some(&self.skipped));
        check(
            &mut out,
            "pif_connections",
            expect.pif_connections.as_ref(),
            Some(&self.pif_domains.len()),
        );
        if let Some(domains) = &expect.pif_domains {
            for (i, found) in self.pif_domains.iter().enumerate() {
                if found != domains {
                    out.push(format!("pif_domains[{i}]: expected {domains:?}, found {found:?}"));
                }
            }
        }
        check(&mut out, "anomalies", expect.anomalies.as_ref(), Some(&self.anomalies));
        if let Some(types) = &expect.receipt_types {
            for wanted in types {
                if !self.receipt_types.contains(wanted) {
                    out.push(format!("receipt_types: no {wanted} appended"));
                }
            }
        }
        check(&mut out, "chain_valid", expect.chain_valid.as_ref(), Some(&self.chain_valid));
        check(&mut out, "frozen", expect.frozen.as_ref(), Some(&self.frozen));
        check(&mut out, "error", expect.error.as_ref(), self.error.as_ref());
        out
    }
}

fn check<T: PartialEq + std::fmt::Debug>(out: &mut Vec<String>, field: &str, expected: Option<&T>, found: Option<&T>) {
    if let Some(expected) = expected {
        if found != Some(expected) {
            out.push(format!("{field}: expected {expected:?}, found {found:?}"));
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub kind: &'static str,
    pub observation: StepObservation,
    pub mismatches: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub steps: Vec<StepOutcome>,
    pub receipts: u64,
    /// Operator pages raised during the run
    pub pages: usize,
}

impl ScenarioOutcome {
    pub fn passed(&self) -> bool {
        self.steps.iter().all(|s| s.mismatches.is_empty())
    }

    pub fn mismatches(&self) -> Vec<String> {
        self.steps
            .iter()
            .flat_map(|s| s.mismatches.iter().map(move |m| format!("step {} ({}): {m}", s.index, s.kind)))
            .collect()
    }

    /// Fail with [`ScenarioError::Failed`] unless every expectation held
    pub fn into_result(self) -> Result<Self> {
        if self.passed() {
            Ok(self)
        } else {
            Err(ScenarioError::Failed {
                scenario: self.name.clone(),
                mismatches: self.mismatches(),
            })
        }
    }
}

/// Replays a scenario on a kernel built from the scenario's config
pub struct ScenarioRunner {
    kernel: Kernel,
    notifier: Arc<RecordingNotifier>,
    last_cycle: Option<CycleId>,
}

impl ScenarioRunner {
    pub fn new(scenario: &Scenario) -> Result<Self> {
        let notifier = Arc::new(RecordingNotifier::new());
        let kernel = Kernel::new(scenario.config.clone())?.with_notifier(notifier.clone());
        Ok(Self {
            kernel,
            notifier,
            last_cycle: None,
        })
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub async fn run(scenario: &Scenario) -> Result<ScenarioOutcome> {
        let mut runner = Self::new(scenario)?;
        let mut steps = Vec::with_capacity(scenario.steps.len());

        for (index, step) in scenario.steps.iter().enumerate() {
            let before = runner.kernel.ledger().len();
            let observation = match runner.execute(step).await {
                Ok(observation) => observation,
                Err(ScenarioError::Kernel(e)) => {
                    warn!(scenario = %scenario.name, step = index, error = %e, "Step failed");
                    StepObservation {
                        error: Some(e.kind()),
                        ..StepObservation::default()
                    }
                }
                Err(e) => return Err(e),
            };
            let observation = runner.observe_ledger(observation, before);
            let mismatches = observation.mismatches(step.expect());
            steps.push(StepOutcome {
                index,
                kind: step.kind(),
                observation,
                mismatches,
            });
        }

        let outcome = ScenarioOutcome {
            name: scenario.name.clone(),
            steps,
            receipts: runner.kernel.ledger().len(),
            pages: runner.notifier.len(),
        };
        info!(
            scenario = %outcome.name,
            passed = outcome.passed(),
            receipts = outcome.receipts,
            pages = outcome.pages,
            "Scenario finished"
        );
        Ok(outcome)
    }

    async fn execute(&mut self, step: &Step) -> Result<StepObservation> {
        match step {
            Step::Cycle { facts, .. } => {
                let adapters = adapters(facts)?;
                let report = self.kernel.run_cycle(&adapters).await?;
                self.last_cycle = Some(report.cycle_id);
                Ok(StepObservation::default().with_report(&report))
            }
            Step::ResumeCycle {
                operator,
                reason,
                facts,
                ..
            } => {
                let cycle_id = self.last_cycle()?;
                let signal = ResumeSignal::new(operator.as_str(), reason.as_str()).map_err(KernelError::from)?;
                self.kernel.resume_cycle(&cycle_id, &signal)?;
                for (domain, specs) in facts {
                    for spec in specs {
                        let mut draft = spec.draft(*domain)?;
                        draft.domain = *domain;
                        match self.kernel.ingest(&cycle_id, draft) {
                            Ok(_) => {}
                            Err(e) if matches!(e.kind(), ErrorKind::CycleHalted | ErrorKind::LedgerFrozen) => break,
                            // tallied on the cycle report
                            Err(_) => {}
                        }
                    }
                }
                let report = self.kernel.complete_cycle(&cycle_id)?;
                Ok(StepObservation::default().with_report(&report))
            }
            Step::ClearReview { operator, reason, .. } => {
                let cycle_id = self.last_cycle()?;
                let signal = ResumeSignal::new(operator.as_str(), reason.as_str()).map_err(KernelError::from)?;
                let cycle = self.kernel.cycle(&cycle_id).ok_or(KernelError::UnknownCycle(cycle_id))?;
                let mut state = cycle.state;
                for sequence_no in &cycle.review_holds {
                    state = self.kernel.clear_review(&cycle_id, *sequence_no, &signal)?;
                }
                Ok(StepObservation {
                    state: Some(state),
                    violations: cycle.violations,
                    ..StepObservation::default()
                })
            }
            Step::Rollback { reason, .. } => {
                self.kernel.rollback(reason)?;
                Ok(StepObservation::default())
            }
            Step::ResumeLedger { operator, reason, .. } => {
                let signal = ResumeSignal::new(operator.as_str(), reason.as_str()).map_err(KernelError::from)?;
                self.kernel.resume_ledger(&signal)?;
                Ok(StepObservation::default())
            }
        }
    }

    fn last_cycle(&self) -> Result<CycleId> {
        self.last_cycle.ok_or(ScenarioError::NoCycle)
    }

    /// Fill in what the step appended and the ledger's integrity afterwards
    fn observe_ledger(&self, mut observation: StepObservation, before: u64) -> StepObservation {
        let ledger = self.kernel.ledger();
        for receipt in ledger.read(before..ledger.len()) {
            match receipt.receipt_type {
                ReceiptType::Anomaly => {
                    if let Some(rule_id) = receipt.payload_str("rule_id") {
                        observation.anomalies.push(rule_id.to_string());
                    }
                }
                ReceiptType::PifConnection => {
                    let domains: Vec<Domain> = receipt
                        .payload
                        .get("domains")
                        .cloned()
                        .and_then(|d| serde_json::from_value(d).ok())
                        .unwrap_or_default();
                    observation.pif_domains.push(domains);
                }
                _ => {}
            }
            observation.receipt_types.push(receipt.receipt_type.as_str().to_string());
        }
        observation.chain_valid = ledger.verify_all().is_ok();
        observation.frozen = ledger.is_frozen();
        observation
    }
}

fn adapters(facts: &BTreeMap<Domain, Vec<FactSpec>>) -> Result<Vec<Arc<dyn DomainAdapter>>> {
    let mut out: Vec<Arc<dyn DomainAdapter>> = Vec::with_capacity(facts.len());
    for (domain, specs) in facts {
        let mut adapter = StaticAdapter::new(*domain);
        for spec in specs {
            adapter = adapter.draft(spec.draft(*domain)?);
        }
        out.push(Arc::new(adapter));
    }
    Ok(out)
}
