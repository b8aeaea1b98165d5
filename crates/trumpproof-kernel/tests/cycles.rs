//! End-to-end cycle tests: harvest through loop_cycle_receipt.

use std::fs;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use trumpproof_kernel::{
    AdapterError, DomainAdapter, ErrorKind, Kernel, KernelConfig, Priority, RecordingNotifier,
    ResumeSignal, StaticAdapter,
};
use trumpproof_slo::{OpKind, SloAction};
use trumpproof_types::{CycleState, Domain, ReceiptDraft, ReceiptType};

fn kernel() -> (Kernel, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::new());
    let kernel = Kernel::new(KernelConfig::default())
        .unwrap()
        .with_notifier(notifier.clone());
    (kernel, notifier)
}

fn adapters(list: Vec<StaticAdapter>) -> Vec<Arc<dyn DomainAdapter>> {
    list.into_iter()
        .map(|a| Arc::new(a) as Arc<dyn DomainAdapter>)
        .collect()
}

fn operator() -> ResumeSignal {
    ResumeSignal::new("duty-officer", "investigated").unwrap()
}

struct FailingAdapter;

#[async_trait]
impl DomainAdapter for FailingAdapter {
    fn domain(&self) -> Domain {
        Domain::License
    }

    async fn harvest(&self) -> Result<Vec<ReceiptDraft>, AdapterError> {
        Err(AdapterError::new(Domain::License, "feed unavailable"))
    }
}

#[tokio::test]
async fn clean_cycle_completes_with_summary() {
    let (kernel, notifier) = kernel();
    let sources = adapters(vec![
        StaticAdapter::new(Domain::Tariff)
            .fact("tariff_ingest_receipt", json!({"revenue_amount": 195_000_000_000u64, "period": "FY2025"})),
        StaticAdapter::new(Domain::Border).fact(
            "facility_receipt",
            json!({"facility_id": "krome", "capacity": 600, "current_population": 550}),
        ),
    ]);

    let report = kernel.run_cycle(&sources).await.unwrap();
    assert_eq!(report.state, CycleState::Completed);
    assert!(report.violations.is_empty());
    assert_eq!(report.harvested, 2);
    assert_eq!(report.ingested, 2);
    assert!(report.chain_valid);
    assert!(report.within_target);
    assert!(notifier.is_empty());

    // harvest, two facts, loop summary
    let ledger = kernel.ledger().snapshot();
    assert_eq!(ledger.len(), 4);
    assert_eq!(ledger[0].receipt_type, ReceiptType::Harvest);
    assert_eq!(ledger[0].payload["fact_counts"]["border"], 1);
    // border outranks tariff in ingestion order
    assert_eq!(ledger[1].receipt_type, ReceiptType::Facility);
    assert_eq!(ledger[2].receipt_type, ReceiptType::TariffIngest);

    let summary = &ledger[3];
    assert_eq!(summary.receipt_type, ReceiptType::LoopCycle);
    assert_eq!(summary.payload["state"], "COMPLETED");
    assert_eq!(summary.payload["receipts_emitted"], 3);
    assert_eq!(summary.payload["merkle_root"], report.merkle_root.as_str());
    assert_eq!(Some(summary.sequence_no), report.loop_receipt);
}

#[tokio::test]
async fn halt_skips_remaining_facts_until_resumed() {
    let (kernel, notifier) = kernel();
    let sources = adapters(vec![
        StaticAdapter::new(Domain::Border)
            .fact(
                "death_rate_receipt",
                json!({"facility_id": "dilley", "period": "2025-09", "deaths": 6, "detainee_days": 30_000}),
            )
            .fact(
                "detention_receipt",
                json!({"anonymized_id": "A-1", "facility_id": "dilley"}),
            ),
        StaticAdapter::new(Domain::Golf).fact(
            "payment_receipt",
            json!({"source_name": "LIV Golf", "recipient_name": "Trump National Bedminster", "amount": 250_000}),
        ),
    ]);

    let report = kernel.run_cycle(&sources).await.unwrap();
    assert_eq!(report.state, CycleState::Halted);
    assert_eq!(report.violations, vec!["stoprule_death_rate"]);
    assert_eq!(report.ingested, 1);
    assert_eq!(report.skipped_count(), 2);
    assert!(report.skipped.iter().all(|s| s.reason == "cycle HALTED"));
    assert_eq!(notifier.len(), 1);

    let anomalies: Vec<_> = kernel
        .ledger()
        .snapshot()
        .into_iter()
        .filter(|r| r.receipt_type == ReceiptType::Anomaly)
        .collect();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].payload["rule_id"], "stoprule_death_rate");

    let cycle_id = report.cycle_id;
    let refused = kernel
        .ingest(&cycle_id, ReceiptDraft::new(ReceiptType::Detention, json!({"anonymized_id": "A-2", "facility_id": "x"})))
        .unwrap_err();
    assert_eq!(refused.kind(), ErrorKind::CycleHalted);
    assert_eq!(kernel.complete_cycle(&cycle_id).unwrap_err().kind(), ErrorKind::InvalidTransition);

    kernel.resume_cycle(&cycle_id, &operator()).unwrap();
    kernel
        .ingest(&cycle_id, ReceiptDraft::new(ReceiptType::Detention, json!({"anonymized_id": "A-2", "facility_id": "x"})))
        .unwrap();
    let completed = kernel.complete_cycle(&cycle_id).unwrap();
    assert_eq!(completed.state, CycleState::Completed);
    assert_eq!(completed.ingested, 2);
    assert_eq!(completed.violations, vec!["stoprule_death_rate"]);
    kernel.ledger().verify_all().unwrap();
}

#[tokio::test]
async fn harvest_failure_is_reported_not_fatal() {
    let (kernel, _) = kernel();
    let mut sources = adapters(vec![StaticAdapter::new(Domain::Gulf).fact(
        "swf_investment_receipt",
        json!({"fund_name": "PIF", "recipient_name": "Affinity Partners", "amount": 2_000_000_000u64, "realized_return": 0}),
    )]);
    sources.push(Arc::new(FailingAdapter));

    let report = kernel.run_cycle(&sources).await.unwrap();
    assert_eq!(report.state, CycleState::Completed);
    assert_eq!(report.harvest_failures.len(), 1);
    assert_eq!(report.harvest_failures[0].domain, Domain::License);
    assert_eq!(report.ingested, 1);
}

#[tokio::test]
async fn rejected_facts_are_reported_with_field_paths() {
    let (kernel, _) = kernel();
    let sources = adapters(vec![StaticAdapter::new(Domain::Tariff)
        .fact("tariff_ingest_receipt", json!({"revenue_amount": -5, "period": "FY2025"}))
        .fact("tariff_ingest_receipt", json!({"revenue_amount": 5, "period": "FY2025"}))
        .fact("tariff_forecast_receipt", json!({}))]);

    let report = kernel.run_cycle(&sources).await.unwrap();
    assert_eq!(report.state, CycleState::Completed);
    assert_eq!(report.ingested, 1);
    assert_eq!(report.rejected_count(), 2);
    assert_eq!(report.rejected[0].kind, ErrorKind::Schema);
    assert_eq!(report.rejected[0].field_path.as_deref(), Some("revenue_amount"));
    assert_eq!(report.rejected[1].kind, ErrorKind::Schema);
    assert!(report.rejected[1].field_path.is_none());
}

#[tokio::test]
async fn loop_domain_adapter_cannot_forge_kernel_receipts() {
    let (kernel, notifier) = kernel();
    let sources = adapters(vec![StaticAdapter::new(Domain::Loop)
        .fact("rollback_receipt", json!({"reason": "forged", "cycles_rolled_back": []}))
        .fact("anomaly_receipt", json!({"anomaly_type": "forged", "details": "x"}))
        .fact(
            "pif_connection_receipt",
            json!({"entity_key": "name:forged", "domains": ["gulf", "golf"], "sequence_nos": [0, 1]}),
        )]);

    let report = kernel.run_cycle(&sources).await.unwrap();
    assert_eq!(report.state, CycleState::Completed);
    assert_eq!(report.harvested, 3);
    assert_eq!(report.ingested, 0);
    assert_eq!(report.rejected_count(), 3);
    assert!(report.rejected.iter().all(|r| r.kind == ErrorKind::Schema));
    assert!(!kernel.is_frozen());
    assert_eq!(notifier.len(), 0);

    let types: Vec<ReceiptType> = kernel.ledger().snapshot().iter().map(|r| r.receipt_type).collect();
    assert_eq!(types, vec![ReceiptType::Harvest, ReceiptType::LoopCycle]);
}

#[tokio::test]
async fn escalated_verification_is_reported_and_cycle_completes() {
    let mut config = KernelConfig::default();
    config.slo.verification.threshold_ms = 0;
    config.slo.verification.action = SloAction::Escalate;
    let kernel = Kernel::new(config).unwrap();
    let sources = adapters(vec![StaticAdapter::new(Domain::Tariff)
        .fact("tariff_ingest_receipt", json!({"revenue_amount": 5, "period": "FY2025"}))]);

    let report = kernel.run_cycle(&sources).await.unwrap();
    assert_eq!(report.state, CycleState::Completed);
    assert!(report.chain_valid);
    assert!(report
        .slo_escalations
        .iter()
        .any(|b| b.op_kind == OpKind::Verification && b.action == SloAction::Escalate));
    assert!(!kernel.is_frozen());

    let summary = kernel.ledger().get(report.loop_receipt.unwrap()).unwrap();
    let escalated = summary.payload["slo_escalations"].as_array().unwrap();
    assert!(escalated.iter().any(|op| op == "verification"));
}

fn undisclosed_emoluments(amounts: &[u64]) -> Vec<Arc<dyn DomainAdapter>> {
    let adapter = amounts.iter().enumerate().fold(StaticAdapter::new(Domain::Golf), |adapter, (i, amount)| {
        adapter.fact(
            "emolument_assessment_receipt",
            json!({"payment_id": format!("P-{i}"), "amount": amount, "source_name": "Saudi Embassy", "is_emolument": true, "disclosed": false}),
        )
    });
    adapters(vec![adapter])
}

#[tokio::test]
async fn recurring_violations_are_ranked_and_remediated() {
    let (kernel, _) = kernel();
    let report = kernel
        .run_cycle(&undisclosed_emoluments(&[25_000, 400_000, 90_000]))
        .await
        .unwrap();
    assert_eq!(report.state, CycleState::Completed);
    assert_eq!(report.violations.len(), 3);

    let ranked: Vec<f64> = report.exposure.iter().map(|e| e.exposure).collect();
    assert_eq!(ranked, vec![400_000.0, 90_000.0, 25_000.0]);
    assert_eq!(report.exposure[0].trigger_type, Some(ReceiptType::EmolumentAssessment));

    assert_eq!(report.remediation.len(), 1);
    let proposal = &report.remediation[0];
    assert_eq!(proposal.rule_id, "stoprule_emolument_disclosure");
    assert_eq!(proposal.occurrence_count, 3);
    assert_eq!(proposal.proposed_action, "disclosure_requirement");
    assert_eq!(proposal.priority, Priority::Medium);

    let receipt = kernel.ledger().get(report.remediation_receipt.unwrap()).unwrap();
    assert_eq!(receipt.receipt_type, ReceiptType::RemediationProposal);
    assert_eq!(receipt.domain, Domain::Loop);
    assert_eq!(receipt.payload["violations_analyzed"], 3);
    assert_eq!(receipt.payload["total_exposure"], 515_000.0);
    assert_eq!(receipt.payload["ranked_exposure"][0]["exposure"], 400_000.0);
    assert!(report.remediation_receipt < report.loop_receipt);

    // two more next cycle: five across the recent ledger
    let next = kernel.run_cycle(&undisclosed_emoluments(&[15_000, 12_000])).await.unwrap();
    assert_eq!(next.remediation[0].occurrence_count, 5);
    assert_eq!(next.remediation[0].priority, Priority::High);
    kernel.ledger().verify_all().unwrap();
}

#[tokio::test]
async fn isolated_violations_are_ranked_without_a_proposal() {
    let (kernel, _) = kernel();
    let report = kernel.run_cycle(&undisclosed_emoluments(&[25_000, 400_000])).await.unwrap();
    assert_eq!(report.exposure.len(), 2);
    assert!(report.remediation.is_empty());
    assert!(report.remediation_receipt.is_none());
    assert!(kernel
        .ledger()
        .snapshot()
        .iter()
        .all(|r| r.receipt_type != ReceiptType::RemediationProposal));
}

fn pif_everywhere() -> Vec<Arc<dyn DomainAdapter>> {
    adapters(vec![
        StaticAdapter::new(Domain::Tariff).fact(
            "exemption_application_receipt",
            json!({"applicant": "Saudi PIF", "product": "aluminum", "amount_requested": 40_000_000}),
        ),
        StaticAdapter::new(Domain::Border).fact(
            "facility_receipt",
            json!({"facility_id": "f-9", "capacity": 900, "current_population": 700, "contractor_name": "PIF"}),
        ),
        StaticAdapter::new(Domain::Gulf).fact(
            "swf_investment_receipt",
            json!({"fund_name": "Public Investment Fund", "recipient_name": "Affinity Partners", "amount": 2_000_000_000u64}),
        ),
        StaticAdapter::new(Domain::License).fact(
            "ownership_receipt",
            json!({"entity_name": "Public Investment Fund of Saudi Arabia", "ownership_chain": ["PIF"], "owner_identified": true}),
        ),
    ])
}

#[tokio::test]
async fn cross_domain_entity_flagged_exactly_once() {
    let (kernel, _) = kernel();
    let first = kernel.run_cycle(&pif_everywhere()).await.unwrap();
    assert_eq!(first.pif_connections.len(), 1);
    assert_eq!(first.flagged_entities.len(), 1);

    let pif = kernel.ledger().get(first.pif_connections[0]).unwrap();
    assert_eq!(pif.receipt_type, ReceiptType::PifConnection);
    assert_eq!(pif.payload["domains"], json!(["border", "gulf", "license", "tariff"]));
    assert_eq!(pif.payload["entity_key"], "name:public investment fund");

    // the same facts again: still flagged, nothing new emitted
    let second = kernel.run_cycle(&pif_everywhere()).await.unwrap();
    assert_eq!(second.flagged_entities.len(), 1);
    assert!(second.pif_connections.is_empty());

    let count = kernel
        .ledger()
        .snapshot()
        .iter()
        .filter(|r| r.receipt_type == ReceiptType::PifConnection)
        .count();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn money_flow_and_centrality_over_the_ledger() {
    let (kernel, _) = kernel();
    kernel.run_cycle(&pif_everywhere()).await.unwrap();

    // the exemption request and facility contract name PIF but move no money
    let flow = kernel.trace_money_flow("Saudi PIF").unwrap();
    assert_eq!(flow.flows.len(), 1);
    assert_eq!(flow.flows[0].domain, Domain::Gulf);
    assert_eq!(flow.total_outflow, 2_000_000_000.0);
    assert_eq!(flow.total_inflow, 0.0);

    let affinity = kernel.trace_money_flow("Affinity Partners LLC").unwrap();
    assert_eq!(affinity.total_inflow, 2_000_000_000.0);
    assert_eq!(affinity.flows[0].counterparty.as_deref(), Some("Public Investment Fund"));
    assert!(kernel.trace_money_flow(" ... ").is_none());

    let scores = kernel.centrality(&["Affinity Partners", "PIF"]);
    assert_eq!(scores[0].entity_key.as_str(), "name:public investment fund");
    assert_eq!(scores[0].domains.len(), 4);
    assert_eq!(scores[1].connections, 1);
}

#[tokio::test]
async fn reopened_kernel_does_not_re_emit_flags() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = KernelConfig::default();
    config.ledger.path = Some(dir.path().join("receipts.jsonl"));

    {
        let kernel = Kernel::new(config.clone()).unwrap();
        let report = kernel.run_cycle(&pif_everywhere()).await.unwrap();
        assert_eq!(report.pif_connections.len(), 1);
    }

    let kernel = Kernel::new(config).unwrap();
    kernel.ledger().verify_all().unwrap();
    let report = kernel.run_cycle(&pif_everywhere()).await.unwrap();
    assert!(report.pif_connections.is_empty());
    assert_eq!(report.flagged_entities.len(), 1);
}

#[tokio::test]
async fn tampered_ledger_rolls_back_and_freezes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("receipts.jsonl");
    let mut config = KernelConfig::default();
    config.ledger.path = Some(path.clone());

    {
        let kernel = Kernel::new(config.clone()).unwrap();
        let sources = adapters(vec![StaticAdapter::new(Domain::Golf).fact(
            "payment_receipt",
            json!({"source_name": "LIV Golf", "recipient_name": "Trump Doral", "amount": 1_000_000}),
        )]);
        kernel.run_cycle(&sources).await.unwrap();
    }

    let content = fs::read_to_string(&path).unwrap();
    fs::write(&path, content.replacen("1000000", "1000", 1)).unwrap();

    let notifier = Arc::new(RecordingNotifier::new());
    let kernel = Kernel::new(config).unwrap().with_notifier(notifier.clone());
    let err = kernel.verify_ledger().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ChainIntegrity);
    assert!(kernel.is_frozen());
    assert_eq!(notifier.len(), 1);
    assert_eq!(notifier.pages()[0].receipt_type, ReceiptType::Rollback);

    assert_eq!(kernel.begin_cycle().unwrap_err().kind(), ErrorKind::LedgerFrozen);
    assert!(kernel.resume_ledger(&operator()).unwrap());
    assert!(!kernel.is_frozen());
}

#[tokio::test]
async fn concurrent_cycles_share_one_chain() {
    let (kernel, _) = kernel();
    let kernel = Arc::new(kernel);

    let tasks: Vec<_> = (0..4)
        .map(|i| {
            let kernel = Arc::clone(&kernel);
            tokio::spawn(async move {
                let sources = adapters(vec![StaticAdapter::new(Domain::Golf).fact(
                    "payment_receipt",
                    json!({"source_name": format!("sponsor-{i}"), "recipient_name": "venue", "amount": i}),
                )]);
                kernel.run_cycle(&sources).await.unwrap()
            })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap().state, CycleState::Completed);
    }
    assert_eq!(kernel.ledger().len(), 12);
    kernel.ledger().verify_all().unwrap();
    assert_eq!(kernel.cycles().len(), 4);
}
