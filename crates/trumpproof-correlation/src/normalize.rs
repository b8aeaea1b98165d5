//! Entity identity normalization

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::CorrelationConfig;

const CORPORATE_SUFFIXES: [&str; 7] = ["inc", "llc", "ltd", "corp", "co", "plc", "sa"];

/// Normalized entity identity, `name:<canonical name>` or `<scheme>:<id>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKey(String);

impl EntityKey {
    pub fn name(canonical: &str) -> Self {
        Self(format!("name:{canonical}"))
    }

    pub fn scheme(scheme: &str, id: &str) -> Self {
        Self(format!("{}:{}", scheme.trim().to_lowercase(), id.trim().to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps raw entity references in payloads to [`EntityKey`]s
#[derive(Debug, Clone)]
pub struct EntityNormalizer {
    fields: Vec<String>,
    aliases: BTreeMap<String, String>,
}

impl EntityNormalizer {
    pub fn new(config: &CorrelationConfig) -> Self {
        // Alias keys go through the same folding as names, so config may
        // list them in any case or punctuation.
        let aliases = config
            .aliases
            .iter()
            .map(|(variant, canonical)| (fold(variant), fold(canonical)))
            .collect();
        Self {
            fields: config.entity_fields.clone(),
            aliases,
        }
    }

    /// Canonical form of an entity name; `None` if nothing is left
    pub fn canonical_name(&self, raw: &str) -> Option<String> {
        let folded = fold(raw);
        if folded.is_empty() {
            return None;
        }
        Some(self.aliases.get(&folded).cloned().unwrap_or(folded))
    }

    /// Name key for a raw reference
    pub fn key(&self, raw: &str) -> Option<EntityKey> {
        self.canonical_name(raw).map(|n| EntityKey::name(&n))
    }

    /// Every entity a payload references, deduplicated and sorted
    pub fn entities(&self, payload: &Value) -> Vec<EntityKey> {
        let mut keys = Vec::new();

        let scheme = payload.get("entity_scheme").and_then(Value::as_str);
        let scheme_id = payload.get("entity_id").and_then(Value::as_str);
        let keyed_by_scheme = match (scheme, scheme_id) {
            (Some(scheme), Some(id)) if !scheme.trim().is_empty() && !id.trim().is_empty() => {
                keys.push(EntityKey::scheme(scheme, id));
                true
            }
            _ => false,
        };

        for field in &self.fields {
            if keyed_by_scheme && field == "entity_id" {
                continue;
            }
            if let Some(raw) = payload.get(field).and_then(Value::as_str) {
                keys.extend(self.canonical_name(raw).map(|n| EntityKey::name(&n)));
            }
        }

        if let Some(listed) = payload.get("entities").and_then(Value::as_array) {
            keys.extend(
                listed
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(|raw| self.canonical_name(raw))
                    .map(|n| EntityKey::name(&n)),
            );
        }

        keys.sort();
        keys.dedup();
        keys
    }
}

/// Lowercase, punctuation to spaces, collapse whitespace, strip trailing
/// corporate suffixes
fn fold(raw: &str) -> String {
    let spaced: String = raw
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let mut words: Vec<&str> = spaced.split_whitespace().collect();
    while words.len() > 1 && words.last().is_some_and(|w| CORPORATE_SUFFIXES.contains(w)) {
        words.pop();
    }
    words.join(" ")
}
