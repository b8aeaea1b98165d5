//! Entity graph: one node per entity, one edge per referencing receipt

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trumpproof_types::Domain;

use crate::EntityKey;

/// A verified receipt referencing an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub domain: Domain,
    pub sequence_no: u64,
    /// Human reference, e.g. `#3 swf_investment_receipt`
    pub reference: String,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct CorrelationGraph {
    nodes: BTreeMap<EntityKey, Vec<Edge>>,
    newest: Option<DateTime<Utc>>,
}

impl CorrelationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an edge. A receipt already linked to the entity is ignored.
    pub fn insert(&mut self, entity: EntityKey, edge: Edge) -> bool {
        let edges = self.nodes.entry(entity).or_default();
        if edges.iter().any(|e| e.sequence_no == edge.sequence_no) {
            return false;
        }
        if self.newest.map_or(true, |newest| edge.ts > newest) {
            self.newest = Some(edge.ts);
        }
        edges.push(edge);
        true
    }

    /// Drop edges older than `cutoff`, and any entity left without edges.
    /// Returns the number of edges removed.
    pub fn prune_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.nodes.retain(|_, edges| {
            let before = edges.len();
            edges.retain(|e| e.ts >= cutoff);
            removed += before - edges.len();
            !edges.is_empty()
        });
        removed
    }

    pub fn entity_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(Vec::len).sum()
    }

    /// Timestamp of the newest indexed receipt
    pub fn newest(&self) -> Option<DateTime<Utc>> {
        self.newest
    }

    pub fn edges(&self, entity: &EntityKey) -> &[Edge] {
        self.nodes.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityKey> {
        self.nodes.keys()
    }

    /// Edges of `entity` no older than `cutoff`, in sequence order
    pub fn edges_since(&self, entity: &EntityKey, cutoff: DateTime<Utc>) -> Vec<&Edge> {
        let mut edges: Vec<&Edge> = self
            .edges(entity)
            .iter()
            .filter(|e| e.ts >= cutoff)
            .collect();
        edges.sort_by_key(|e| e.sequence_no);
        edges
    }

    /// Distinct domains referencing `entity` since `cutoff`
    pub fn domains_since(&self, entity: &EntityKey, cutoff: DateTime<Utc>) -> BTreeSet<Domain> {
        self.edges(entity)
            .iter()
            .filter(|e| e.ts >= cutoff)
            .map(|e| e.domain)
            .collect()
    }
}
