//! The kernel: single ingestion entry point over the receipt ledger

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use trumpproof_correlation::{
    compute_centrality, trace_money_flow, Centrality, CorrelationEngine, EntityKey, MoneyFlow,
};
use trumpproof_ledger::{LedgerError, ReceiptLedger};
use trumpproof_policy::{Cycle, EvaluationContext, ResumeSignal, StopRuleEvaluator, Violation};
use trumpproof_receipts::SchemaError;
use trumpproof_slo::{Measured, OpKind, SloAction, SloBreach, SloBreachError, SloGate};
use trumpproof_types::{CycleId, CycleState, Receipt, ReceiptDraft, ReceiptType, Severity};

use crate::orchestrator::CycleTally;
use crate::{
    KernelConfig, KernelError, OperatorNotifier, RejectedFact, Result, RollbackCoordinator,
    TracingNotifier,
};

/// What one successful ingestion produced
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub receipt: Arc<Receipt>,
    pub violations: Vec<Violation>,
    pub anomalies: Vec<Arc<Receipt>>,
    /// Cycle state after stoprules ran
    pub state: CycleState,
    /// Non-reject SLO breach observed while ingesting
    pub slo_breach: Option<SloBreach>,
}

/// A cycle together with the receipts it appended and its tallies
pub(crate) struct ActiveCycle {
    pub(crate) cycle: Cycle,
    pub(crate) receipts: Vec<Arc<Receipt>>,
    pub(crate) slo_escalations: Vec<SloBreach>,
    pub(crate) tally: CycleTally,
    pub(crate) started: Instant,
}

impl ActiveCycle {
    fn new(cycle: Cycle) -> Self {
        Self {
            cycle,
            receipts: Vec::new(),
            slo_escalations: Vec::new(),
            tally: CycleTally::default(),
            started: Instant::now(),
        }
    }

    fn record(&mut self, receipt: &Arc<Receipt>) {
        self.receipts.push(Arc::clone(receipt));
        self.cycle.note_emitted();
    }

    pub(crate) fn flag_breach(&mut self, breach: Option<SloBreach>) {
        if let Some(breach) = breach {
            if breach.action == SloAction::Escalate {
                self.slo_escalations.push(breach);
            }
        }
    }
}

pub(crate) type CycleHandle = Arc<Mutex<ActiveCycle>>;

pub struct Kernel {
    pub(crate) config: KernelConfig,
    pub(crate) ledger: Arc<ReceiptLedger>,
    pub(crate) slo: SloGate,
    pub(crate) evaluator: StopRuleEvaluator,
    pub(crate) correlation: Mutex<CorrelationEngine>,
    /// Cycles that have not reached COMPLETED or ROLLED_BACK
    pub(crate) cycles: RwLock<BTreeMap<CycleId, CycleHandle>>,
    /// Finished cycles, oldest first, bounded by `cycles.archive_capacity`
    pub(crate) archive: Mutex<VecDeque<Cycle>>,
    /// Receipts under REVIEW across every cycle
    pub(crate) review_holds: Mutex<BTreeSet<u64>>,
    pub(crate) rollback: RollbackCoordinator,
    pub(crate) notifier: Arc<dyn OperatorNotifier>,
}

impl Kernel {
    /// Build a kernel from configuration, opening the configured ledger.
    /// An existing ledger is indexed for correlation and its emitted
    /// cross-domain fingerprints recovered.
    pub fn new(config: KernelConfig) -> Result<Self> {
        config.validate()?;
        let registry = Arc::new(config.ledger.registry()?);
        let ledger = match &config.ledger.path {
            Some(path) => ReceiptLedger::open(path, registry)?,
            None => ReceiptLedger::in_memory(registry),
        };

        let mut correlation = CorrelationEngine::new(config.correlation.clone())?;
        let existing = ledger.snapshot();
        if !existing.is_empty() {
            let recovered = correlation.recover(existing.iter().map(|r| r.as_ref()));
            correlation.correlate(&existing, &BTreeSet::new());
            info!(
                receipts = existing.len(),
                recovered_fingerprints = recovered,
                "Indexed existing ledger"
            );
        }

        Ok(Self {
            slo: SloGate::new(config.slo.clone()),
            evaluator: StopRuleEvaluator::builtin(&config.stoprules),
            rollback: RollbackCoordinator::new(&config.rollback),
            ledger: Arc::new(ledger),
            correlation: Mutex::new(correlation),
            cycles: RwLock::new(BTreeMap::new()),
            archive: Mutex::new(VecDeque::new()),
            review_holds: Mutex::new(BTreeSet::new()),
            notifier: Arc::new(TracingNotifier),
            config,
        })
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn OperatorNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<ReceiptLedger> {
        &self.ledger
    }

    pub fn slo(&self) -> &SloGate {
        &self.slo
    }

    pub fn evaluator(&self) -> &StopRuleEvaluator {
        &self.evaluator
    }

    // ---------------------------------------------------------------------
    // Cycles
    // ---------------------------------------------------------------------

    /// Start a new RUNNING cycle
    pub fn begin_cycle(&self) -> Result<CycleId> {
        if self.ledger.is_frozen() {
            return Err(KernelError::LedgerFrozen);
        }
        let cycle = Cycle::start();
        let cycle_id = cycle.cycle_id;
        self.cycles
            .write()
            .insert(cycle_id, Arc::new(Mutex::new(ActiveCycle::new(cycle))));
        info!(cycle_id = %cycle_id, "Cycle started");
        Ok(cycle_id)
    }

    pub(crate) fn handle(&self, cycle_id: &CycleId) -> Result<CycleHandle> {
        self.cycles
            .read()
            .get(cycle_id)
            .cloned()
            .ok_or(KernelError::UnknownCycle(*cycle_id))
    }

    /// Current view of a cycle, live or archived
    pub fn cycle(&self, cycle_id: &CycleId) -> Option<Cycle> {
        let live = self.cycles.read().get(cycle_id).cloned();
        match live {
            Some(handle) => Some(handle.lock().cycle.clone()),
            None => self
                .archive
                .lock()
                .iter()
                .rev()
                .find(|c| c.cycle_id == *cycle_id)
                .cloned(),
        }
    }

    /// Live cycles and the archived ones still retained, oldest first
    pub fn cycles(&self) -> Vec<Cycle> {
        let handles: Vec<CycleHandle> = self.cycles.read().values().cloned().collect();
        let mut cycles: Vec<Cycle> = handles.iter().map(|h| h.lock().cycle.clone()).collect();
        cycles.extend(self.archive.lock().iter().cloned());
        cycles.sort_by_key(|c| c.started_at);
        cycles
    }

    /// Number of cycles not yet finished
    pub fn live_cycles(&self) -> usize {
        self.cycles.read().len()
    }

    /// Move a COMPLETED or ROLLED_BACK cycle out of the live set. The
    /// oldest archived cycles are dropped past the archive capacity.
    pub(crate) fn archive_if_final(&self, handle: &CycleHandle) {
        let cycle = {
            let active = handle.lock();
            if !active.cycle.state.is_final() {
                return;
            }
            active.cycle.clone()
        };
        if self.cycles.write().remove(&cycle.cycle_id).is_none() {
            return;
        }
        debug!(cycle_id = %cycle.cycle_id, state = %cycle.state, "Cycle archived");
        let mut archive = self.archive.lock();
        archive.push_back(cycle);
        while archive.len() > self.config.cycles.archive_capacity {
            archive.pop_front();
        }
    }

    /// Sequence numbers currently held for review
    pub fn review_holds(&self) -> BTreeSet<u64> {
        self.review_holds.lock().clone()
    }

    /// Release a HALTED cycle back to RUNNING on an operator signal
    pub fn resume_cycle(&self, cycle_id: &CycleId, signal: &ResumeSignal) -> Result<CycleState> {
        let handle = self.handle(cycle_id)?;
        let mut active = handle.lock();
        active.cycle.resume(signal)?;
        active.started = Instant::now();
        Ok(active.cycle.state)
    }

    /// Clear one review hold, making the receipt eligible for correlation
    pub fn clear_review(&self, cycle_id: &CycleId, sequence_no: u64, signal: &ResumeSignal) -> Result<CycleState> {
        let handle = self.handle(cycle_id)?;
        let state = handle.lock().cycle.clear_review(sequence_no, signal)?;
        self.review_holds.lock().remove(&sequence_no);
        self.archive_if_final(&handle);
        Ok(state)
    }

    // ---------------------------------------------------------------------
    // Ingestion
    // ---------------------------------------------------------------------

    /// Ingest one fact into a cycle: validate, digest, append and run every
    /// stoprule against it.
    pub fn ingest(&self, cycle_id: &CycleId, draft: ReceiptDraft) -> Result<IngestOutcome> {
        let handle = self.handle(cycle_id).map_err(|e| match self.cycle(cycle_id) {
            Some(archived) => KernelError::CycleHalted {
                cycle_id: *cycle_id,
                state: archived.state,
            },
            None => e,
        })?;
        let mut active = handle.lock();
        self.ingest_tracked(&mut active, draft)
    }

    /// [`Kernel::ingest_locked`] plus the cycle's ingested/rejected tallies
    pub(crate) fn ingest_tracked(&self, active: &mut ActiveCycle, draft: ReceiptDraft) -> Result<IngestOutcome> {
        let domain = draft.domain;
        let receipt_type = draft.receipt_type.clone();
        match self.ingest_locked(active, draft) {
            Ok(outcome) => {
                active.tally.ingested += 1;
                Ok(outcome)
            }
            Err(e) => {
                if !matches!(e.kind(), crate::ErrorKind::LedgerFrozen | crate::ErrorKind::CycleHalted) {
                    active.tally.rejected.push(RejectedFact::new(domain, receipt_type, &e));
                }
                Err(e)
            }
        }
    }

    /// The ingestion path. The caller holds the cycle lock, so stoprules see
    /// this cycle's receipts in append order and a HALT is visible before the
    /// next append attempt.
    fn ingest_locked(&self, active: &mut ActiveCycle, draft: ReceiptDraft) -> Result<IngestOutcome> {
        if !active.cycle.accepts_appends() {
            return Err(KernelError::CycleHalted {
                cycle_id: active.cycle.cycle_id,
                state: active.cycle.state,
            });
        }
        refuse_kernel_authored(&draft)?;

        let (prepared, slo_breach) = self
            .slo
            .measure(OpKind::Ingest, || self.ledger.prepare(draft))
            .enforce()?;
        active.flag_breach(slo_breach.clone());

        let prepared = match prepared {
            Ok(prepared) => prepared,
            Err(LedgerError::HashMismatch { claimed, computed }) => {
                if let Some(violation) = self.evaluator.hash_mismatch(&claimed, &computed) {
                    self.record_violation(active, &violation)?;
                }
                return Err(KernelError::HashMismatch { claimed, computed });
            }
            Err(e) => return Err(e.into()),
        };

        let receipt = self.ledger.commit(prepared)?;
        active.record(&receipt);

        if receipt.receipt_type == ReceiptType::Facility {
            if let Some(facility_id) = receipt.payload_str("facility_id") {
                self.slo.record_facility_update(facility_id, receipt.ts);
            }
        }

        let first = (receipt.sequence_no + 1).saturating_sub(self.evaluator.context_window() as u64 + 1);
        let window = self.ledger.read(first..receipt.sequence_no + 1);
        let violations = self
            .evaluator
            .evaluate(&EvaluationContext::new(&receipt, &window));

        let mut anomalies = Vec::with_capacity(violations.len());
        for violation in &violations {
            anomalies.push(self.record_violation(active, violation)?);
        }

        Ok(IngestOutcome {
            receipt,
            violations,
            anomalies,
            state: active.cycle.state,
            slo_breach,
        })
    }

    /// Record a violation as an `anomaly_receipt`, then apply its transition
    fn record_violation(&self, active: &mut ActiveCycle, violation: &Violation) -> Result<Arc<Receipt>> {
        let draft = ReceiptDraft::new(
            ReceiptType::Anomaly,
            violation.anomaly_payload(Some(&active.cycle.cycle_id)),
        );
        let anomaly = self.emit(active, draft)?;

        active.cycle.apply(violation);
        if violation.severity == Severity::Review {
            self.review_holds
                .lock()
                .extend(active.cycle.review_holds.iter().copied());
        }
        if violation.severity.pages_operators() {
            self.notifier.notify(&anomaly);
        }
        Ok(anomaly)
    }

    /// Append a kernel-authored receipt on behalf of a cycle
    pub(crate) fn emit(&self, active: &mut ActiveCycle, draft: ReceiptDraft) -> Result<Arc<Receipt>> {
        let prepared = self.ledger.prepare(draft)?;
        let receipt = self.ledger.commit(prepared)?;
        active.record(&receipt);
        Ok(receipt)
    }

    // ---------------------------------------------------------------------
    // Verification and rollback
    // ---------------------------------------------------------------------

    /// Verify the whole chain under the verification SLO. A chain failure,
    /// or a run of reject-class breaches reaching the budget, rolls back.
    /// Returns the non-reject breach, if any.
    pub fn verify_ledger(&self) -> Result<Option<SloBreach>> {
        let Measured { value, breach, .. } = self
            .slo
            .measure(OpKind::Verification, || self.ledger.verify_all());

        if let Err(err) = value {
            error!(at_sequence_no = err.at_sequence_no, error = %err, "Chain verification failed");
            if let Err(rollback_err) = self.rollback(&format!("chain verification failed: {err}")) {
                error!(error = %rollback_err, "Rollback receipt could not be appended");
            }
            return Err(KernelError::ChainIntegrity(err));
        }

        if self.rollback.observe_verification(breach.as_ref()) {
            if let Err(rollback_err) = self.rollback("verification SLO breach budget exhausted") {
                error!(error = %rollback_err, "Rollback receipt could not be appended");
            }
        }

        match breach {
            Some(breach) if breach.action == SloAction::Reject => {
                Err(SloBreachError::from(breach).into())
            }
            other => Ok(other),
        }
    }

    /// Halt every unarchived cycle, freeze the ledger and append the
    /// `rollback_receipt`. The ledger stays frozen even if the append fails.
    pub fn rollback(&self, reason: &str) -> Result<Arc<Receipt>> {
        let handles: Vec<CycleHandle> = self.cycles.read().values().cloned().collect();
        let mut rolled_back: Vec<(DateTime<Utc>, CycleId)> = handles
            .iter()
            .filter_map(|handle| {
                let mut active = handle.lock();
                active
                    .cycle
                    .roll_back()
                    .then(|| (active.cycle.started_at, active.cycle.cycle_id))
            })
            .collect();
        rolled_back.sort();
        let cycle_ids: Vec<CycleId> = rolled_back.into_iter().map(|(_, id)| id).collect();

        error!(reason, cycles = cycle_ids.len(), "Rolling back");
        let frozen = self
            .ledger
            .freeze_with(RollbackCoordinator::rollback_draft(reason, &cycle_ids));
        for handle in &handles {
            self.archive_if_final(handle);
        }
        let receipt = frozen?;
        self.notifier.notify(&receipt);
        Ok(receipt)
    }

    /// Lift a rollback freeze on an operator signal. Rolled-back cycles stay
    /// archived; new cycles may start. Returns whether the ledger was frozen.
    pub fn resume_ledger(&self, signal: &ResumeSignal) -> Result<bool> {
        signal.authorize()?;
        let was_frozen = self.ledger.unfreeze();
        self.rollback.reset();
        if was_frozen {
            info!(operator = %signal.operator, reason = %signal.reason, "Ledger resumed");
        } else {
            warn!(operator = %signal.operator, "Resume signal for a ledger that was not frozen");
        }
        Ok(was_frozen)
    }

    pub fn is_frozen(&self) -> bool {
        self.ledger.is_frozen()
    }

    // ---------------------------------------------------------------------
    // Entity analysis
    // ---------------------------------------------------------------------

    /// Money flowing to and from a named entity across the whole ledger.
    /// `None` when the name normalizes to nothing.
    pub fn trace_money_flow(&self, entity_name: &str) -> Option<MoneyFlow> {
        let engine = self.correlation.lock();
        let entity = engine.normalizer().key(entity_name)?;
        Some(trace_money_flow(engine.normalizer(), &entity, &self.ledger.snapshot()))
    }

    /// Centrality of each named entity across the ledger, most central first
    pub fn centrality(&self, entity_names: &[&str]) -> Vec<Centrality> {
        let engine = self.correlation.lock();
        let entities: Vec<EntityKey> = entity_names
            .iter()
            .filter_map(|name| engine.normalizer().key(name))
            .collect();
        compute_centrality(engine.normalizer(), &entities, &self.ledger.snapshot())
    }

    // ---------------------------------------------------------------------
    // SLO-gated computation
    // ---------------------------------------------------------------------

    /// Run a computation under the SLO gate for `op_kind`. A reject-class
    /// breach discards the result.
    pub fn compute<T>(&self, op_kind: OpKind, f: impl FnOnce() -> T) -> Result<(T, Option<SloBreach>)> {
        Ok(self.slo.measure(op_kind, f).enforce()?)
    }

    /// Facilities whose metrics are older than the staleness threshold
    pub fn stale_facilities(&self, now: DateTime<Utc>) -> Vec<(String, SloBreach)> {
        self.slo.stale_facilities(now)
    }
}

/// Facts come from governance domains only; loop-domain receipts are
/// written through [`Kernel::emit`] and never ingested.
fn refuse_kernel_authored(draft: &ReceiptDraft) -> Result<()> {
    let kernel_type = draft
        .receipt_type
        .parse::<ReceiptType>()
        .map(|t| t.is_kernel_authored())
        .unwrap_or(false);
    if kernel_type || !draft.domain.is_governance() {
        warn!(
            receipt_type = %draft.receipt_type,
            domain = %draft.domain,
            "Refusing kernel-authored receipt from ingestion"
        );
        return Err(SchemaError::DomainMismatch {
            receipt_type: draft.receipt_type.clone(),
            domain: draft.domain.to_string(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, RecordingNotifier};
    use serde_json::json;
    use trumpproof_crypto::digest;
    use trumpproof_types::Domain;

    fn kernel() -> (Kernel, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::new());
        let kernel = Kernel::new(KernelConfig::default())
            .unwrap()
            .with_notifier(notifier.clone());
        (kernel, notifier)
    }

    fn verification(verified: bool) -> ReceiptDraft {
        ReceiptDraft::new(
            ReceiptType::Verification,
            json!({"check": "allocation_sum", "verified": verified}),
        )
    }

    #[test]
    fn test_ingest_appends_and_counts() {
        let (kernel, _) = kernel();
        let cycle = kernel.begin_cycle().unwrap();
        let outcome = kernel.ingest(&cycle, verification(true)).unwrap();
        assert_eq!(outcome.receipt.sequence_no, 0);
        assert!(outcome.violations.is_empty());
        assert_eq!(outcome.state, CycleState::Running);
        assert_eq!(kernel.cycle(&cycle).unwrap().receipts_emitted, 1);
    }

    #[test]
    fn test_escalation_emits_anomaly_and_pages() {
        let (kernel, notifier) = kernel();
        let cycle = kernel.begin_cycle().unwrap();
        let outcome = kernel.ingest(&cycle, verification(false)).unwrap();
        assert_eq!(outcome.state, CycleState::Escalated);
        assert_eq!(outcome.anomalies.len(), 1);

        let anomaly = &outcome.anomalies[0];
        assert_eq!(anomaly.receipt_type, ReceiptType::Anomaly);
        assert_eq!(anomaly.payload["rule_id"], "stoprule_unverified_claim");
        assert_eq!(anomaly.payload["trigger_sequence_no"], 0);
        assert_eq!(notifier.len(), 1);

        // escalated cycles keep accepting facts
        assert!(kernel.ingest(&cycle, verification(true)).is_ok());
    }

    #[test]
    fn test_schema_error_leaves_ledger_untouched() {
        let (kernel, _) = kernel();
        let cycle = kernel.begin_cycle().unwrap();
        let err = kernel
            .ingest(&cycle, ReceiptDraft::new(ReceiptType::Verification, json!({"check": "x"})))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert_eq!(err.field_path(), Some("verified"));
        assert!(kernel.ledger().is_empty());
    }

    #[test]
    fn test_hash_mismatch_halts_cycle() {
        let (kernel, notifier) = kernel();
        let cycle = kernel.begin_cycle().unwrap();
        let draft = verification(true).with_claimed_hash(digest(&json!({"forged": true})));
        let err = kernel.ingest(&cycle, draft).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HashMismatch);

        // only the anomaly was appended
        assert_eq!(kernel.ledger().len(), 1);
        let anomaly = kernel.ledger().get(0).unwrap();
        assert_eq!(anomaly.payload["rule_id"], "stoprule_hash_mismatch");
        assert!(anomaly.payload["trigger_payload_hash"].is_string());
        assert_eq!(notifier.len(), 1);

        let err = kernel.ingest(&cycle, verification(true)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CycleHalted);
        assert_eq!(kernel.cycle(&cycle).unwrap().state, CycleState::Halted);
    }

    #[test]
    fn test_reject_class_ingest_breach_aborts_without_mutation() {
        let mut config = KernelConfig::default();
        config.slo.ingest.threshold_ms = 0;
        let kernel = Kernel::new(config).unwrap();
        let cycle = kernel.begin_cycle().unwrap();

        // a payload large enough that digesting it takes measurable time
        let big: Vec<String> = (0..2_000).map(|i| format!("supporting-record-{i}")).collect();
        let draft = ReceiptDraft::new(
            ReceiptType::Verification,
            json!({"check": "bulk", "verified": true, "records": big}),
        );
        match kernel.ingest(&cycle, draft) {
            Err(err) => {
                assert_eq!(err.kind(), ErrorKind::SloBreach);
                assert!(kernel.ledger().is_empty());
            }
            // a clock too coarse to see the elapsed time is not a failure
            Ok(outcome) => assert_eq!(outcome.receipt.sequence_no, 0),
        }
    }

    #[test]
    fn test_review_hold_and_clear() {
        let (kernel, notifier) = kernel();
        let cycle = kernel.begin_cycle().unwrap();
        let outcome = kernel
            .ingest(
                &cycle,
                ReceiptDraft::new(
                    ReceiptType::CitizenshipVerification,
                    json!({"detainee_id": "D-1", "citizenship_likely": true}),
                ),
            )
            .unwrap();
        assert_eq!(outcome.state, CycleState::Review);
        assert!(kernel.review_holds().contains(&0));
        // REVIEW does not page
        assert!(notifier.is_empty());

        let signal = ResumeSignal::new("ops", "citizenship confirmed").unwrap();
        assert_eq!(kernel.clear_review(&cycle, 0, &signal).unwrap(), CycleState::Running);
        assert!(kernel.review_holds().is_empty());
    }

    #[test]
    fn test_finished_cycles_leave_the_live_set() {
        let mut config = KernelConfig::default();
        config.cycles.archive_capacity = 2;
        let kernel = Kernel::new(config).unwrap();

        let mut ids = Vec::new();
        for _ in 0..3 {
            let cycle = kernel.begin_cycle().unwrap();
            kernel.ingest(&cycle, verification(true)).unwrap();
            let report = kernel.complete_cycle(&cycle).unwrap();
            assert_eq!(report.state, CycleState::Completed);
            ids.push(cycle);
        }

        assert_eq!(kernel.live_cycles(), 0);
        assert_eq!(kernel.cycles().len(), 2);
        assert!(kernel.cycle(&ids[0]).is_none());
        assert_eq!(kernel.cycle(&ids[2]).unwrap().state, CycleState::Completed);
        assert_eq!(kernel.ingest(&ids[2], verification(true)).unwrap_err().kind(), ErrorKind::CycleHalted);
        assert_eq!(kernel.complete_cycle(&ids[2]).unwrap_err().kind(), ErrorKind::InvalidTransition);

        // a rollback only reaches cycles still live
        let running = kernel.begin_cycle().unwrap();
        let receipt = kernel.rollback("operator drill").unwrap();
        assert_eq!(receipt.payload["cycles_rolled_back"], json!([running.to_string()]));
        assert_eq!(kernel.live_cycles(), 0);
        assert_eq!(kernel.cycle(&running).unwrap().state, CycleState::RolledBack);
        assert_eq!(kernel.cycle(&ids[2]).unwrap().state, CycleState::Completed);
    }

    #[test]
    fn test_rollback_freezes_and_resume_unfreezes() {
        let (kernel, notifier) = kernel();
        let cycle = kernel.begin_cycle().unwrap();
        kernel.ingest(&cycle, verification(true)).unwrap();

        let receipt = kernel.rollback("operator drill").unwrap();
        assert_eq!(receipt.receipt_type, ReceiptType::Rollback);
        assert_eq!(receipt.payload["cycles_rolled_back"][0], cycle.to_string());
        assert!(kernel.is_frozen());
        assert_eq!(kernel.cycle(&cycle).unwrap().state, CycleState::RolledBack);
        assert_eq!(notifier.len(), 1);

        assert_eq!(kernel.ingest(&cycle, verification(true)).unwrap_err().kind(), ErrorKind::CycleHalted);
        assert_eq!(kernel.begin_cycle().unwrap_err().kind(), ErrorKind::LedgerFrozen);

        let anonymous = ResumeSignal {
            operator: String::new(),
            reason: String::new(),
        };
        assert_eq!(kernel.resume_ledger(&anonymous).unwrap_err().kind(), ErrorKind::Unauthorized);
        assert!(kernel.is_frozen());

        let signal = ResumeSignal::new("ops", "drill over").unwrap();
        assert!(kernel.resume_ledger(&signal).unwrap());
        let next = kernel.begin_cycle().unwrap();
        kernel.ingest(&next, verification(true)).unwrap();
        assert_eq!(kernel.cycle(&cycle).unwrap().state, CycleState::RolledBack);
        kernel.verify_ledger().unwrap();
    }

    #[test]
    fn test_adapter_cannot_author_kernel_receipts() {
        let (kernel, _) = kernel();
        let cycle = kernel.begin_cycle().unwrap();
        let forged = ReceiptDraft::in_domain(
            ReceiptType::Rollback,
            Domain::Gulf,
            json!({"reason": "x", "cycles_rolled_back": []}),
        );
        assert_eq!(kernel.ingest(&cycle, forged).unwrap_err().kind(), ErrorKind::Schema);

        // home-domain drafts of every loop-domain type are refused too
        let loop_drafts = [
            ReceiptDraft::new(ReceiptType::Rollback, json!({"reason": "x", "cycles_rolled_back": []})),
            ReceiptDraft::new(
                ReceiptType::Anomaly,
                json!({"rule_id": "stoprule_death_rate", "severity": "HALT", "action": "halt"}),
            ),
            ReceiptDraft::new(
                ReceiptType::PifConnection,
                json!({"entity_key": "name:public investment fund", "domains": ["border", "gulf", "golf", "tariff"]}),
            ),
            ReceiptDraft::in_domain(ReceiptType::Verification, Domain::Loop, json!({"check": "x", "verified": true})),
        ];
        for draft in loop_drafts {
            let err = kernel.ingest(&cycle, draft).unwrap_err();
            assert!(matches!(err, KernelError::Schema(SchemaError::DomainMismatch { .. })), "{err}");
        }
        assert!(kernel.ledger().is_empty());
        assert!(!kernel.is_frozen());
        assert_eq!(kernel.cycle(&cycle).unwrap().state, CycleState::Running);
    }

    #[test]
    fn test_compute_gates_cost_computation() {
        let (kernel, _) = kernel();
        let (value, breach) = kernel.compute(OpKind::CostComputation, || 150.0 * 10.0).unwrap();
        assert_eq!(value, 1500.0);
        assert!(breach.is_none());
        assert_eq!(kernel.slo().stats(OpKind::CostComputation), (1, 0));
    }

    #[test]
    fn test_facility_receipts_feed_staleness() {
        let (kernel, _) = kernel();
        let cycle = kernel.begin_cycle().unwrap();
        kernel
            .ingest(
                &cycle,
                ReceiptDraft::new(
                    ReceiptType::Facility,
                    json!({"facility_id": "adelanto", "capacity": 1940, "current_population": 1800}),
                ),
            )
            .unwrap();
        assert!(kernel.stale_facilities(Utc::now()).is_empty());
        let later = Utc::now() + chrono::Duration::hours(25);
        assert_eq!(kernel.stale_facilities(later)[0].0, "adelanto");
    }
}
