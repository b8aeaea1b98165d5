//! The cross-domain correlation engine

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use trumpproof_crypto::{dual_hash, verify};
use trumpproof_types::{Domain, Receipt, ReceiptType};

use crate::{CorrelationConfig, CorrelationGraph, Edge, EntityKey, EntityNormalizer, Result};

/// An entity referenced from at least the threshold number of domains
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggedEntity {
    pub entity_key: EntityKey,
    /// Sorted by domain name
    pub domains: Vec<Domain>,
    pub supporting_receipts: Vec<String>,
    pub supporting_sequence_nos: Vec<u64>,
    pub fingerprint: String,
}

impl FlaggedEntity {
    /// Payload of the `pif_connection_receipt` recording this flag
    pub fn pif_payload(&self) -> Value {
        json!({
            "entity_key": self.entity_key,
            "domains": self.domains.iter().map(Domain::as_str).collect::<Vec<_>>(),
            "domain_count": self.domains.len(),
            "supporting_receipts": self.supporting_receipts,
            "fingerprint": self.fingerprint,
        })
    }
}

/// Fingerprint of an entity and the domain set it was flagged for
pub fn fingerprint(entity: &EntityKey, domains: &[Domain]) -> String {
    let mut names: Vec<&str> = domains.iter().map(Domain::as_str).collect();
    names.sort_unstable();
    dual_hash(format!("{}|{}", entity, names.join(",")).as_bytes())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CorrelationOutcome {
    /// Every entity currently over the threshold
    pub flagged: Vec<FlaggedEntity>,
    /// Flags whose fingerprint has not been emitted yet
    pub new: Vec<FlaggedEntity>,
    /// Receipts indexed by this call
    pub indexed: usize,
    /// Receipts waiting on a review hold
    pub deferred: usize,
}

pub struct CorrelationEngine {
    config: CorrelationConfig,
    normalizer: EntityNormalizer,
    graph: CorrelationGraph,
    /// Sequence numbers already considered, indexed or not, with their
    /// timestamps. Forgotten once they fall out of the lookback window.
    seen: BTreeMap<u64, DateTime<Utc>>,
    /// Receipts held for review, indexed once their hold is released
    deferred: BTreeMap<u64, Arc<Receipt>>,
    emitted: BTreeSet<String>,
}

impl CorrelationEngine {
    pub fn new(config: CorrelationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            normalizer: EntityNormalizer::new(&config),
            config,
            graph: CorrelationGraph::new(),
            seen: BTreeMap::new(),
            deferred: BTreeMap::new(),
            emitted: BTreeSet::new(),
        })
    }

    pub fn config(&self) -> &CorrelationConfig {
        &self.config
    }

    pub fn graph(&self) -> &CorrelationGraph {
        &self.graph
    }

    pub fn normalizer(&self) -> &EntityNormalizer {
        &self.normalizer
    }

    pub fn is_emitted(&self, fingerprint: &str) -> bool {
        self.emitted.contains(fingerprint)
    }

    /// Record that a flag has been written to the ledger
    pub fn mark_emitted(&mut self, fingerprint: &str) -> bool {
        self.emitted.insert(fingerprint.to_string())
    }

    /// Recover emitted fingerprints from existing `pif_connection_receipt`s
    pub fn recover<'a>(&mut self, receipts: impl IntoIterator<Item = &'a Receipt>) -> usize {
        let mut recovered = 0;
        for receipt in receipts {
            if receipt.receipt_type != ReceiptType::PifConnection {
                continue;
            }
            if let Some(fp) = receipt.payload_str("fingerprint") {
                if self.emitted.insert(fp.to_string()) {
                    recovered += 1;
                }
            }
        }
        recovered
    }

    /// Index `receipts`, release deferred receipts whose hold has cleared,
    /// and evaluate every entity against the threshold.
    pub fn correlate(&mut self, receipts: &[Arc<Receipt>], holds: &BTreeSet<u64>) -> CorrelationOutcome {
        let mut indexed = 0;

        let released: Vec<u64> = self
            .deferred
            .keys()
            .copied()
            .filter(|seq| !holds.contains(seq))
            .collect();
        for seq in released {
            if let Some(receipt) = self.deferred.remove(&seq) {
                indexed += self.index(&receipt);
            }
        }

        for receipt in receipts {
            if self.seen.contains_key(&receipt.sequence_no) {
                continue;
            }
            self.seen.insert(receipt.sequence_no, receipt.ts);
            if holds.contains(&receipt.sequence_no) {
                debug!(sequence_no = receipt.sequence_no, "Receipt under review, deferring correlation");
                self.deferred.insert(receipt.sequence_no, Arc::clone(receipt));
                continue;
            }
            indexed += self.index(receipt);
        }

        self.prune();
        let flagged = self.evaluate();
        let new: Vec<FlaggedEntity> = flagged
            .iter()
            .filter(|f| !self.emitted.contains(&f.fingerprint))
            .cloned()
            .collect();
        for entity in &new {
            info!(
                entity_key = %entity.entity_key,
                domains = entity.domains.len(),
                fingerprint = %entity.fingerprint,
                "Cross-domain entity flagged"
            );
        }

        CorrelationOutcome {
            flagged,
            new,
            indexed,
            deferred: self.deferred.len(),
        }
    }

    /// Add the edges of one receipt; returns 1 if it was indexed
    fn index(&mut self, receipt: &Receipt) -> usize {
        if !receipt.domain.is_governance() {
            return 0;
        }
        if !verify(&receipt.payload, &receipt.payload_hash) {
            warn!(
                sequence_no = receipt.sequence_no,
                "Payload digest does not re-verify, receipt not correlated"
            );
            return 0;
        }
        for entity in self.normalizer.entities(&receipt.payload) {
            self.graph.insert(
                entity,
                Edge {
                    domain: receipt.domain,
                    sequence_no: receipt.sequence_no,
                    reference: receipt.reference(),
                    ts: receipt.ts,
                },
            );
        }
        1
    }

    /// Number of sequence numbers currently remembered
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    fn cutoff(&self) -> Option<DateTime<Utc>> {
        self.graph
            .newest()
            .map(|newest| newest - Duration::days(self.config.lookback_days))
    }

    /// Forget edges and sequence numbers outside the lookback window, then
    /// hold `seen` to its capacity, oldest sequence numbers first
    fn prune(&mut self) {
        if let Some(cutoff) = self.cutoff() {
            let removed = self.graph.prune_before(cutoff);
            self.seen.retain(|_, ts| *ts >= cutoff);
            if removed > 0 {
                debug!(removed, cutoff = %cutoff, "Pruned stale correlation edges");
            }
        }
        while self.seen.len() > self.config.seen_capacity {
            self.seen.pop_first();
        }
    }

    fn evaluate(&self) -> Vec<FlaggedEntity> {
        let Some(cutoff) = self.cutoff() else {
            return Vec::new();
        };

        self.graph
            .entities()
            .filter_map(|entity| {
                let domain_set = self.graph.domains_since(entity, cutoff);
                if domain_set.len() < self.config.threshold {
                    return None;
                }
                let mut domains: Vec<Domain> = domain_set.into_iter().collect();
                domains.sort_by_key(|d| d.as_str());
                let edges = self.graph.edges_since(entity, cutoff);
                Some(FlaggedEntity {
                    fingerprint: fingerprint(entity, &domains),
                    entity_key: entity.clone(),
                    domains,
                    supporting_receipts: edges.iter().map(|e| e.reference.clone()).collect(),
                    supporting_sequence_nos: edges.iter().map(|e| e.sequence_no).collect(),
                })
            })
            .collect()
    }
}
