//! Per-entity analysis over receipts: money flow and centrality

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use trumpproof_types::{Domain, Receipt, ReceiptType};

use crate::{EntityKey, EntityNormalizer};

/// Payload fields carrying the value moved by a transaction
const FLOW_FIELDS: [&str; 5] = ["amount", "payment_amount", "fee_amount", "contract_value", "foreign_payments"];

/// Fields naming the party money came from
const SOURCE_FIELDS: [&str; 3] = ["source_name", "fund_name", "applicant"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowDirection {
    Inflow,
    Outflow,
}

/// One transaction touching the traced entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Flow {
    pub sequence_no: u64,
    pub receipt_type: ReceiptType,
    pub domain: Domain,
    pub amount: f64,
    pub direction: FlowDirection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoneyFlow {
    pub entity_key: EntityKey,
    pub flows: Vec<Flow>,
    pub total_inflow: f64,
    pub total_outflow: f64,
}

impl MoneyFlow {
    pub fn net_flow(&self) -> f64 {
        self.total_inflow - self.total_outflow
    }
}

/// How connected an entity is across domains and transactions.
///
/// `score = connections × domains × log10(total_value + 1)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Centrality {
    pub entity_key: EntityKey,
    pub connections: usize,
    pub domains: Vec<Domain>,
    pub total_value: f64,
    pub score: f64,
}

fn flow_amount(payload: &Value) -> f64 {
    FLOW_FIELDS
        .iter()
        .filter_map(|field| payload.get(field).and_then(Value::as_f64))
        .find(|amount| *amount > 0.0)
        .unwrap_or(0.0)
}

fn referencing<'a>(
    normalizer: &'a EntityNormalizer,
    entity: &'a EntityKey,
    receipts: &'a [Arc<Receipt>],
) -> impl Iterator<Item = &'a Arc<Receipt>> + 'a {
    receipts
        .iter()
        .filter(|r| r.domain.is_governance())
        .filter(move |r| normalizer.entities(&r.payload).contains(entity))
}

/// Trace every valued transaction naming `entity`. Money is inflow when the
/// entity is the recipient, outflow otherwise.
pub fn trace_money_flow(normalizer: &EntityNormalizer, entity: &EntityKey, receipts: &[Arc<Receipt>]) -> MoneyFlow {
    let mut flows = Vec::new();
    let (mut total_inflow, mut total_outflow) = (0.0, 0.0);

    for receipt in referencing(normalizer, entity, receipts) {
        let amount = flow_amount(&receipt.payload);
        if amount <= 0.0 {
            continue;
        }
        let recipient = receipt.payload_str("recipient_name");
        let inflow = recipient.and_then(|r| normalizer.key(r)).as_ref() == Some(entity);
        let counterparty = if inflow {
            SOURCE_FIELDS.iter().find_map(|f| receipt.payload_str(f))
        } else {
            recipient
        };

        let direction = if inflow {
            total_inflow += amount;
            FlowDirection::Inflow
        } else {
            total_outflow += amount;
            FlowDirection::Outflow
        };
        flows.push(Flow {
            sequence_no: receipt.sequence_no,
            receipt_type: receipt.receipt_type,
            domain: receipt.domain,
            amount,
            direction,
            counterparty: counterparty.map(str::to_string),
        });
    }

    MoneyFlow {
        entity_key: entity.clone(),
        flows,
        total_inflow,
        total_outflow,
    }
}

/// Score each entity, most central first
pub fn compute_centrality(normalizer: &EntityNormalizer, entities: &[EntityKey], receipts: &[Arc<Receipt>]) -> Vec<Centrality> {
    let mut scores: Vec<Centrality> = entities
        .iter()
        .map(|entity| {
            let mut connections = 0;
            let mut domains = BTreeSet::new();
            let mut total_value = 0.0;
            for receipt in referencing(normalizer, entity, receipts) {
                connections += 1;
                domains.insert(receipt.domain);
                total_value += flow_amount(&receipt.payload);
            }
            let mut domains: Vec<Domain> = domains.into_iter().collect();
            domains.sort_by_key(|d| d.as_str());
            Centrality {
                entity_key: entity.clone(),
                connections,
                score: connections as f64 * domains.len() as f64 * (total_value + 1.0).log10(),
                domains,
                total_value,
            }
        })
        .collect();
    scores.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.entity_key.cmp(&b.entity_key)));
    scores
}
