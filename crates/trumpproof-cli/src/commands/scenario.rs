//! Scenario commands - replay the built-in acceptance scenarios

use colored::*;
use serde_json::json;
use tracing::info;
use trumpproof_sim::{builtin, by_name, Scenario, ScenarioOutcome, ScenarioRunner};

use crate::display::{self, Mark};

/// Replay one scenario by name
pub async fn run_one(name: &str, as_json: bool) -> anyhow::Result<()> {
    let scenario = by_name(name)?;
    let outcome = ScenarioRunner::run(&scenario).await?;

    if as_json {
        display::json(&outcome)?;
    } else {
        report(&scenario, &outcome);
    }

    if !outcome.passed() {
        anyhow::bail!("scenario {} failed", outcome.name);
    }
    Ok(())
}

/// Replay every built-in scenario, failing if any does
pub async fn run_all(as_json: bool) -> anyhow::Result<()> {
    let mut outcomes = Vec::new();
    for scenario in builtin()? {
        let outcome = ScenarioRunner::run(&scenario).await?;
        if !as_json {
            report(&scenario, &outcome);
        }
        outcomes.push(outcome);
    }

    let failed: Vec<&str> = outcomes
        .iter()
        .filter(|o| !o.passed())
        .map(|o| o.name.as_str())
        .collect();
    info!(total = outcomes.len(), failed = failed.len(), "Scenario run finished");

    if as_json {
        display::json(&outcomes)?;
    } else {
        display::heading("Scenarios");
        display::field("passed", format!("{}/{}", outcomes.len() - failed.len(), outcomes.len()));
        for name in &failed {
            display::status(Mark::Fail, name);
        }
        println!();
    }

    if !failed.is_empty() {
        anyhow::bail!("{} of {} scenarios failed: {}", failed.len(), outcomes.len(), failed.join(", "));
    }
    Ok(())
}

/// Print the catalog
pub fn list(as_json: bool) -> anyhow::Result<()> {
    let scenarios = builtin()?;
    if as_json {
        let entries: Vec<_> = scenarios
            .iter()
            .map(|s| json!({"name": s.name, "description": s.description, "steps": s.steps.len()}))
            .collect();
        return display::json(&entries);
    }

    display::heading("Built-in scenarios");
    for scenario in &scenarios {
        display::field(&scenario.name, &scenario.description);
        display::detail("steps", scenario.steps.len());
    }
    println!();
    Ok(())
}

fn report(scenario: &Scenario, outcome: &ScenarioOutcome) {
    display::heading(&format!("Scenario {}", scenario.name));
    if !scenario.description.is_empty() {
        println!("   {}", scenario.description.dimmed());
        println!();
    }

    for step in &outcome.steps {
        let observed = &step.observation;
        let mut summary = format!("{:>2} {}", step.index, step.kind);
        if let Some(state) = observed.state {
            summary.push_str(&format!(" -> {}", display::cycle_state(state)));
        }
        if let Some(error) = observed.error {
            summary.push_str(&format!(" ({error})"));
        }
        let mark = if step.mismatches.is_empty() { Mark::Pass } else { Mark::Fail };
        display::status(mark, &summary);
        for mismatch in &step.mismatches {
            display::detail("expected", mismatch);
        }

        if observed.ingested + observed.rejected + observed.skipped > 0 {
            display::detail(
                "facts",
                format!("+{} -{} ~{}", observed.ingested, observed.rejected, observed.skipped),
            );
        }
        if !observed.violations.is_empty() {
            display::detail("violations", observed.violations.join(", "));
        }
        for domains in &observed.pif_domains {
            let names: Vec<String> = domains.iter().map(|d| d.to_string()).collect();
            display::detail("pif", names.join(" + "));
        }
        if !observed.chain_valid {
            display::status(Mark::Caution, "chain does not verify");
        }
        if observed.frozen {
            display::status(Mark::Caution, "ledger frozen");
        }
    }

    println!();
    display::field("receipts", outcome.receipts);
    display::field("pages", outcome.pages);
    let verdict = if outcome.passed() { Mark::Pass } else { Mark::Fail };
    display::status(verdict, if outcome.passed() { "scenario passed" } else { "scenario failed" });
}
