//! Built-in acceptance scenarios replayed end to end

use serde_json::json;
use trumpproof_kernel::ErrorKind;
use trumpproof_sim::{builtin, by_name, run_named, Scenario, ScenarioError, ScenarioRunner, SCENARIO_NAMES};
use trumpproof_types::{CycleState, Domain};

async fn run(name: &str) -> trumpproof_sim::ScenarioOutcome {
    let outcome = ScenarioRunner::run(&by_name(name).unwrap()).await.unwrap();
    assert!(outcome.passed(), "{name}: {:#?}", outcome.mismatches());
    outcome
}

#[tokio::test]
async fn every_builtin_scenario_passes() {
    for scenario in builtin().unwrap() {
        let outcome = ScenarioRunner::run(&scenario).await.unwrap();
        assert!(outcome.passed(), "{}: {:#?}", scenario.name, outcome.mismatches());
    }
    for name in SCENARIO_NAMES {
        run_named(name).await.unwrap();
    }
}

#[tokio::test]
async fn baseline_completes_without_violations() {
    let outcome = run("BASELINE").await;
    for step in &outcome.steps {
        assert_eq!(step.observation.state, Some(CycleState::Completed));
        assert!(step.observation.violations.is_empty());
    }
    assert_eq!(outcome.pages, 0);
}

#[tokio::test]
async fn death_rate_halt_pages_once() {
    let outcome = run("BORDER_ACCOUNTABILITY").await;
    assert_eq!(outcome.steps[0].observation.state, Some(CycleState::Halted));
    // HALT pages; REVIEW does not
    assert_eq!(outcome.pages, 1);
}

#[tokio::test]
async fn cross_domain_connection_emitted_once() {
    let outcome = run("CROSS_DOMAIN_PIF").await;
    let emitted: Vec<_> = outcome
        .steps
        .iter()
        .flat_map(|s| s.observation.pif_domains.clone())
        .collect();
    assert_eq!(
        emitted,
        vec![vec![Domain::Border, Domain::Gulf, Domain::License, Domain::Tariff]]
    );
}

#[tokio::test]
async fn godel_inputs_are_rejected_not_dropped() {
    let outcome = run("GÖDEL").await;
    let first = &outcome.steps[0].observation;
    assert_eq!(first.rejected + first.ingested + first.skipped, 6);
    assert_eq!(outcome.steps[1].observation.error, Some(ErrorKind::Unauthorized));
    assert!(outcome.steps.iter().all(|s| s.observation.chain_valid));
}

#[tokio::test]
async fn rollback_refuses_appends_until_resumed() {
    let outcome = run("LEDGER_ROLLBACK").await;
    let frozen: Vec<bool> = outcome.steps.iter().map(|s| s.observation.frozen).collect();
    assert_eq!(frozen, vec![false, true, true, true, false, false]);
    assert_eq!(outcome.steps[2].observation.error, Some(ErrorKind::LedgerFrozen));
}

#[tokio::test]
async fn unmet_expectation_fails_the_scenario() {
    let scenario: Scenario = serde_json::from_value(json!({
        "name": "WRONG",
        "steps": [{
            "step": "cycle",
            "facts": {"golf": [{"receipt_type": "payment_receipt", "payload": {"source_name": "a", "recipient_name": "b", "amount": 1}}]},
            "expect": {"state": "HALTED", "ingested": 2}
        }]
    }))
    .unwrap();

    let outcome = ScenarioRunner::run(&scenario).await.unwrap();
    assert!(!outcome.passed());
    assert_eq!(outcome.mismatches().len(), 2);
    match outcome.into_result() {
        Err(ScenarioError::Failed { scenario, mismatches }) => {
            assert_eq!(scenario, "WRONG");
            assert!(mismatches[0].starts_with("step 0 (cycle): state"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn resume_before_any_cycle_is_an_error() {
    let scenario: Scenario = serde_json::from_value(json!({
        "name": "EARLY",
        "steps": [{"step": "resume_cycle", "operator": "ops"}]
    }))
    .unwrap();
    assert!(matches!(ScenarioRunner::run(&scenario).await, Err(ScenarioError::NoCycle)));
}
