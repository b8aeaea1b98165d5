//! Cycle orchestration: harvest, ingest, correlate, verify, summarize

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};
use trumpproof_correlation::FlaggedEntity;
use trumpproof_crypto::merkle_root;
use trumpproof_policy::PolicyError;
use trumpproof_slo::{OpKind, SloBreach};
use trumpproof_types::{CycleId, CycleState, Domain, ReceiptDraft, ReceiptType};

use crate::kernel::{ActiveCycle, CycleHandle};
use crate::{DomainAdapter, ErrorKind, Exposure, Kernel, KernelError, RemediationProposal, Result};

/// A fact the kernel refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedFact {
    pub domain: Domain,
    pub receipt_type: String,
    pub kind: ErrorKind,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_path: Option<String>,
}

impl RejectedFact {
    pub(crate) fn new(domain: Domain, receipt_type: String, error: &KernelError) -> Self {
        Self {
            domain,
            receipt_type,
            kind: error.kind(),
            reason: error.to_string(),
            field_path: error.field_path().map(str::to_string),
        }
    }
}

/// A fact never attempted because the cycle stopped accepting appends
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFact {
    pub domain: Domain,
    pub receipt_type: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarvestFailure {
    pub domain: Domain,
    pub message: String,
}

/// Running tallies kept for a cycle across harvest, ingest and resume
#[derive(Debug, Clone, Default)]
pub(crate) struct CycleTally {
    pub(crate) harvested: usize,
    pub(crate) ingested: usize,
    pub(crate) rejected: Vec<RejectedFact>,
    pub(crate) skipped: Vec<SkippedFact>,
    pub(crate) harvest_failures: Vec<HarvestFailure>,
    pub(crate) flagged: Vec<FlaggedEntity>,
    pub(crate) pif_connections: Vec<u64>,
    pub(crate) exposure: Vec<Exposure>,
    pub(crate) remediation: Vec<RemediationProposal>,
}

/// Summary of one cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: CycleId,
    pub state: CycleState,
    pub receipts_emitted: u64,
    pub harvested: usize,
    pub ingested: usize,
    pub rejected: Vec<RejectedFact>,
    pub skipped: Vec<SkippedFact>,
    pub harvest_failures: Vec<HarvestFailure>,
    /// Triggered stoprule ids, in trigger order
    pub violations: Vec<String>,
    pub review_holds: Vec<u64>,
    pub slo_escalations: Vec<SloBreach>,
    pub stale_facilities: Vec<String>,
    pub flagged_entities: Vec<FlaggedEntity>,
    /// Sequence numbers of the `pif_connection_receipt`s this cycle emitted
    pub pif_connections: Vec<u64>,
    /// The cycle's violations, highest dollar exposure first
    pub exposure: Vec<Exposure>,
    pub remediation: Vec<RemediationProposal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation_receipt: Option<u64>,
    pub merkle_root: String,
    pub elapsed_ms: u64,
    /// Whether the cycle finished inside its completion threshold
    pub within_target: bool,
    pub chain_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_error: Option<String>,
    /// Sequence number of the `loop_cycle_receipt`, absent after rollback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_receipt: Option<u64>,
}

impl CycleReport {
    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

impl Kernel {
    /// Run one cycle over `adapters`.
    ///
    /// Harvests run concurrently; their facts are merged in domain priority
    /// order (adapter order within a domain) and ingested one at a time. A
    /// HALT stops ingestion and the remaining facts are reported as skipped.
    pub async fn run_cycle(&self, adapters: &[Arc<dyn DomainAdapter>]) -> Result<CycleReport> {
        let cycle_id = self.begin_cycle()?;

        let harvests = join_all(adapters.iter().map(|adapter| async move {
            (adapter.domain(), adapter.harvest().await)
        }))
        .await;

        let mut facts: Vec<ReceiptDraft> = Vec::new();
        let mut failures = Vec::new();
        for (domain, harvest) in harvests {
            match harvest {
                Ok(drafts) => facts.extend(drafts.into_iter().map(|mut draft| {
                    draft.domain = domain;
                    draft
                })),
                Err(e) => {
                    warn!(domain = %domain, error = %e, "Harvest failed");
                    failures.push(HarvestFailure {
                        domain,
                        message: e.message,
                    });
                }
            }
        }
        facts.sort_by_key(|draft| draft.domain.priority());

        let handle = self.handle(&cycle_id)?;
        {
            let mut active = handle.lock();
            active.tally.harvested = facts.len();
            active.tally.harvest_failures = failures;

            let mut counts: BTreeMap<&str, usize> = Domain::PRIORITY
                .iter()
                .map(|d| (d.as_str(), 0))
                .collect();
            for draft in &facts {
                *counts.entry(draft.domain.as_str()).or_default() += 1;
            }
            self.emit(
                &mut active,
                ReceiptDraft::new(
                    ReceiptType::Harvest,
                    json!({
                        "cycle_id": cycle_id.to_string(),
                        "fact_counts": counts,
                        "total_facts": facts.len(),
                    }),
                ),
            )?;

            let mut pending = facts.into_iter();
            while let Some(draft) = pending.next() {
                if !active.cycle.accepts_appends() {
                    let reason = format!("cycle {}", active.cycle.state);
                    skip(&mut active, draft, &reason);
                    for rest in pending.by_ref() {
                        skip(&mut active, rest, &reason);
                    }
                    break;
                }
                let (domain, receipt_type) = (draft.domain, draft.receipt_type.clone());
                match self.ingest_tracked(&mut active, draft) {
                    Ok(_) => {}
                    Err(KernelError::LedgerFrozen) => {
                        active.tally.skipped.push(SkippedFact {
                            domain,
                            receipt_type,
                            reason: "ledger frozen".to_string(),
                        });
                        for rest in pending.by_ref() {
                            skip(&mut active, rest, "ledger frozen");
                        }
                        break;
                    }
                    Err(e) => {
                        warn!(cycle_id = %cycle_id, domain = %domain, error = %e, "Fact rejected");
                    }
                }
            }

            self.correlate_locked(&mut active)?;
        }

        self.close_cycle(&handle)
    }

    /// Finalize a cycle resumed after a HALT, correlating whatever it
    /// appended since
    pub fn complete_cycle(&self, cycle_id: &CycleId) -> Result<CycleReport> {
        let handle = self.handle(cycle_id)?;
        {
            let mut active = handle.lock();
            if !active.cycle.accepts_appends() {
                return Err(PolicyError::InvalidTransition {
                    state: active.cycle.state,
                    action: "complete",
                }
                .into());
            }
            self.correlate_locked(&mut active)?;
        }
        self.close_cycle(&handle)
    }

    /// Correlate the cycle's receipts and record new cross-domain flags
    fn correlate_locked(&self, active: &mut ActiveCycle) -> Result<()> {
        if !active.cycle.accepts_appends() {
            return Ok(());
        }
        let holds = self.review_holds();
        let mut engine = self.correlation.lock();
        let outcome = engine.correlate(&active.receipts, &holds);

        for flagged in outcome.new {
            let receipt = self.emit(
                active,
                ReceiptDraft::new(ReceiptType::PifConnection, flagged.pif_payload()),
            )?;
            engine.mark_emitted(&flagged.fingerprint);
            active.tally.pif_connections.push(receipt.sequence_no);
        }
        active.tally.flagged = outcome.flagged;
        Ok(())
    }

    /// Verify the chain, finish the cycle and append its summary. The cycle
    /// lock is released while verifying so a rollback can reach every cycle.
    fn close_cycle(&self, handle: &CycleHandle) -> Result<CycleReport> {
        let (chain_valid, chain_error, verification_breach) = match self.verify_ledger() {
            Ok(breach) => (true, None, breach),
            Err(KernelError::ChainIntegrity(err)) => (false, Some(err.to_string()), None),
            Err(KernelError::SloBreach(err)) => {
                warn!(error = %err, "Chain verification exceeded its threshold");
                (true, None, None)
            }
            Err(e) => return Err(e),
        };

        let mut active = handle.lock();
        active.flag_breach(verification_breach);

        let state = active.cycle.finish();
        let elapsed = active.started.elapsed();
        let completion_breach = self.slo.record(OpKind::CycleCompletion, elapsed);
        let within_target = completion_breach.is_none();
        active.flag_breach(completion_breach);

        let stale_facilities: Vec<String> = self
            .slo
            .stale_facilities(Utc::now())
            .into_iter()
            .map(|(facility, _)| facility)
            .collect();

        let summarize = state != CycleState::RolledBack && !self.ledger.is_frozen();
        let mut remediation_receipt = None;
        if summarize {
            match self.propose_remediation(&mut active) {
                Ok(receipt) => remediation_receipt = receipt.map(|r| r.sequence_no),
                Err(KernelError::LedgerFrozen) => {}
                Err(e) => error!(error = %e, "Remediation proposal could not be appended"),
            }
        }

        let leaves: Vec<String> = active.receipts.iter().map(|r| r.receipt_hash.clone()).collect();
        let root = merkle_root(&leaves);
        let elapsed_ms = duration_ms(elapsed);

        let mut loop_receipt = None;
        if summarize && !self.ledger.is_frozen() {
            let payload = json!({
                "cycle_id": active.cycle.cycle_id.to_string(),
                "state": state,
                "receipts_emitted": active.cycle.receipts_emitted,
                "merkle_root": root,
                "elapsed_ms": elapsed_ms,
                "within_target": within_target,
                "ingested": active.tally.ingested,
                "rejected": active.tally.rejected.len(),
                "skipped": active.tally.skipped.len(),
                "violations": active.cycle.violations,
                "slo_escalations": active
                    .slo_escalations
                    .iter()
                    .map(|b| b.op_kind.as_str())
                    .collect::<Vec<_>>(),
                "flagged_entities": active
                    .tally
                    .flagged
                    .iter()
                    .map(|f| f.entity_key.to_string())
                    .collect::<Vec<_>>(),
                "total_exposure": active.tally.exposure.iter().map(|e| e.exposure).sum::<f64>(),
                "remediation_proposals": active.tally.remediation.len(),
            });
            match self.emit(&mut active, ReceiptDraft::new(ReceiptType::LoopCycle, payload)) {
                Ok(receipt) => loop_receipt = Some(receipt.sequence_no),
                Err(KernelError::LedgerFrozen) => {}
                Err(e) => error!(error = %e, "Cycle summary could not be appended"),
            }
        }

        info!(
            cycle_id = %active.cycle.cycle_id,
            state = %state,
            receipts_emitted = active.cycle.receipts_emitted,
            ingested = active.tally.ingested,
            rejected = active.tally.rejected.len(),
            skipped = active.tally.skipped.len(),
            violations = active.cycle.violations.len(),
            elapsed_ms,
            "Cycle finished"
        );

        let report = CycleReport {
            cycle_id: active.cycle.cycle_id,
            state,
            receipts_emitted: active.cycle.receipts_emitted,
            harvested: active.tally.harvested,
            ingested: active.tally.ingested,
            rejected: active.tally.rejected.clone(),
            skipped: active.tally.skipped.clone(),
            harvest_failures: active.tally.harvest_failures.clone(),
            violations: active.cycle.violations.clone(),
            review_holds: active.cycle.review_holds.iter().copied().collect(),
            slo_escalations: active.slo_escalations.clone(),
            stale_facilities,
            flagged_entities: active.tally.flagged.clone(),
            pif_connections: active.tally.pif_connections.clone(),
            exposure: active.tally.exposure.clone(),
            remediation: active.tally.remediation.clone(),
            remediation_receipt,
            merkle_root: root,
            elapsed_ms,
            within_target,
            chain_valid,
            chain_error,
            loop_receipt,
        };
        drop(active);
        self.archive_if_final(handle);
        Ok(report)
    }
}

fn skip(active: &mut ActiveCycle, draft: ReceiptDraft, reason: &str) {
    active.tally.skipped.push(SkippedFact {
        domain: draft.domain,
        receipt_type: draft.receipt_type,
        reason: reason.to_string(),
    });
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
