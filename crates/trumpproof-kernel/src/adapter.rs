//! Domain adapters
//!
//! An adapter is the only way facts reach the kernel. Adapters harvest
//! drafts; the kernel stamps each draft with the adapter's domain and
//! validates it like any other input, so an adapter cannot author receipts
//! for another domain or for the kernel.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use trumpproof_types::{Domain, ReceiptDraft};

/// A harvest that failed as a whole
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Harvest failed for {domain}: {message}")]
pub struct AdapterError {
    pub domain: Domain,
    pub message: String,
}

impl AdapterError {
    pub fn new(domain: Domain, message: impl Into<String>) -> Self {
        Self {
            domain,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait DomainAdapter: Send + Sync {
    /// The governance domain this adapter produces facts for
    fn domain(&self) -> Domain;

    /// Pull the facts observed since the last harvest, in source order
    async fn harvest(&self) -> Result<Vec<ReceiptDraft>, AdapterError>;
}

/// Adapter replaying a fixed list of facts on every harvest
#[derive(Debug, Clone)]
pub struct StaticAdapter {
    domain: Domain,
    facts: Vec<ReceiptDraft>,
}

impl StaticAdapter {
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            facts: Vec::new(),
        }
    }

    /// Add a fact by wire type name; unknown names reach the validator
    pub fn fact(mut self, receipt_type: &str, payload: Value) -> Self {
        self.facts.push(ReceiptDraft {
            receipt_type: receipt_type.to_string(),
            domain: self.domain,
            payload,
            claimed_hash: None,
        });
        self
    }

    pub fn draft(mut self, draft: ReceiptDraft) -> Self {
        self.facts.push(draft);
        self
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

#[async_trait]
impl DomainAdapter for StaticAdapter {
    fn domain(&self) -> Domain {
        self.domain
    }

    async fn harvest(&self) -> Result<Vec<ReceiptDraft>, AdapterError> {
        Ok(self.facts.clone())
    }
}
