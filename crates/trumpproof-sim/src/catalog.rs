//! Built-in scenarios

use crate::{Result, Scenario, ScenarioError};

pub const SCENARIO_NAMES: [&str; 7] = [
    "BASELINE",
    "TARIFF_SCOTUS",
    "BORDER_ACCOUNTABILITY",
    "GULF_RETURNS",
    "CROSS_DOMAIN_PIF",
    "GODEL",
    "LEDGER_ROLLBACK",
];

fn fixture(name: &str) -> Option<&'static str> {
    let json = match name {
        "BASELINE" => include_str!("../scenarios/baseline.json"),
        "TARIFF_SCOTUS" => include_str!("../scenarios/tariff_scotus.json"),
        "BORDER_ACCOUNTABILITY" => include_str!("../scenarios/border_accountability.json"),
        "GULF_RETURNS" => include_str!("../scenarios/gulf_returns.json"),
        "CROSS_DOMAIN_PIF" => include_str!("../scenarios/cross_domain_pif.json"),
        "GODEL" => include_str!("../scenarios/godel.json"),
        "LEDGER_ROLLBACK" => include_str!("../scenarios/ledger_rollback.json"),
        _ => return None,
    };
    Some(json)
}

/// Look up a scenario by name, case-insensitively; `GÖDEL` is accepted for `GODEL`
pub fn by_name(name: &str) -> Result<Scenario> {
    let key = name.trim().to_uppercase().replace('Ö', "O").replace('-', "_");
    let json = fixture(&key).ok_or_else(|| ScenarioError::UnknownScenario(name.to_string()))?;
    Scenario::from_json(json)
}

/// Every built-in scenario, in catalog order
pub fn builtin() -> Result<Vec<Scenario>> {
    SCENARIO_NAMES.iter().map(|name| by_name(name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_fixture_parses() {
        let scenarios = builtin().unwrap();
        assert_eq!(scenarios.len(), SCENARIO_NAMES.len());
        for (scenario, name) in scenarios.iter().zip(SCENARIO_NAMES) {
            assert_eq!(scenario.name, name);
            assert!(!scenario.steps.is_empty(), "{name} has no steps");
        }
    }

    #[test]
    fn test_name_lookup() {
        assert_eq!(by_name("gödel").unwrap().name, "GODEL");
        assert_eq!(by_name("cross-domain-pif").unwrap().name, "CROSS_DOMAIN_PIF");
        assert!(matches!(by_name("MONTE_CARLO"), Err(ScenarioError::UnknownScenario(_))));
    }
}
