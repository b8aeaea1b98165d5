//! The SLO gate
//!
//! One lock per timed op kind, so measuring ingest never contends with
//! measuring verification.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{error, warn};

use crate::{duration_ms, OpKind, SloAction, SloBreachError, SloConfig, SloWindow};

/// A single call that exceeded its threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SloBreach {
    pub op_kind: OpKind,
    pub elapsed: Duration,
    pub threshold: Duration,
    pub action: SloAction,
}

/// The result of a measured call
#[derive(Debug)]
pub struct Measured<T> {
    pub value: T,
    pub elapsed: Duration,
    pub breach: Option<SloBreach>,
}

impl<T> Measured<T> {
    /// Apply the breach action: a reject-class breach becomes an error,
    /// anything else hands back the value and the (advisory) breach.
    pub fn enforce(self) -> Result<(T, Option<SloBreach>), SloBreachError> {
        match self.breach {
            Some(breach) if breach.action == SloAction::Reject => Err(breach.into()),
            breach => Ok((self.value, breach)),
        }
    }
}

/// Latency gate over every kernel operation kind
pub struct SloGate {
    config: SloConfig,
    ingest: Mutex<SloWindow>,
    verification: Mutex<SloWindow>,
    cost_computation: Mutex<SloWindow>,
    cycle_completion: Mutex<SloWindow>,
    /// Last successful update per facility
    facility_updates: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl SloGate {
    pub fn new(config: SloConfig) -> Self {
        let window = || Mutex::new(SloWindow::new(config.window_size));
        Self {
            ingest: window(),
            verification: window(),
            cost_computation: window(),
            cycle_completion: window(),
            facility_updates: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &SloConfig {
        &self.config
    }

    fn window(&self, op_kind: OpKind) -> Option<&Mutex<SloWindow>> {
        match op_kind {
            OpKind::Ingest => Some(&self.ingest),
            OpKind::Verification => Some(&self.verification),
            OpKind::CostComputation => Some(&self.cost_computation),
            OpKind::CycleCompletion => Some(&self.cycle_completion),
            OpKind::FacilityStaleness => None,
        }
    }

    /// Run `f`, recording its elapsed time against `op_kind`
    pub fn measure<T>(&self, op_kind: OpKind, f: impl FnOnce() -> T) -> Measured<T> {
        let started = Instant::now();
        let value = f();
        let elapsed = started.elapsed();
        let breach = self.record(op_kind, elapsed);
        Measured {
            value,
            elapsed,
            breach,
        }
    }

    /// Record an externally timed sample and judge it against the threshold
    pub fn record(&self, op_kind: OpKind, elapsed: Duration) -> Option<SloBreach> {
        let threshold = self.config.threshold(op_kind);
        let breached = elapsed > threshold.threshold();

        if let Some(window) = self.window(op_kind) {
            window.lock().record(elapsed, breached);
        }

        if !breached {
            return None;
        }

        let breach = SloBreach {
            op_kind,
            elapsed,
            threshold: threshold.threshold(),
            action: threshold.action,
        };
        log_breach(&breach);
        Some(breach)
    }

    pub fn p95(&self, op_kind: OpKind) -> Option<Duration> {
        self.window(op_kind).and_then(|w| w.lock().p95())
    }

    /// Sample count and lifetime breach count for an op kind
    pub fn stats(&self, op_kind: OpKind) -> (u64, u64) {
        self.window(op_kind)
            .map(|w| {
                let w = w.lock();
                (w.recorded(), w.breaches())
            })
            .unwrap_or((0, 0))
    }

    /// Note a successful facility-metrics update
    pub fn record_facility_update(&self, facility_id: &str, at: DateTime<Utc>) {
        let mut updates = self.facility_updates.lock();
        let entry = updates.entry(facility_id.to_string()).or_insert(at);
        if at > *entry {
            *entry = at;
        }
    }

    /// Facilities whose last update is older than the staleness threshold
    /// as of `now`, sorted by facility id
    pub fn stale_facilities(&self, now: DateTime<Utc>) -> Vec<(String, SloBreach)> {
        let threshold = self.config.threshold(OpKind::FacilityStaleness);
        let limit = threshold.threshold();
        let mut stale: Vec<(String, SloBreach)> = self
            .facility_updates
            .lock()
            .iter()
            .filter_map(|(facility, updated)| {
                let age = (now - *updated).to_std().unwrap_or(Duration::ZERO);
                (age > limit).then(|| {
                    (
                        facility.clone(),
                        SloBreach {
                            op_kind: OpKind::FacilityStaleness,
                            elapsed: age,
                            threshold: limit,
                            action: threshold.action,
                        },
                    )
                })
            })
            .collect();
        stale.sort_by(|a, b| a.0.cmp(&b.0));
        for (facility, breach) in &stale {
            warn!(
                facility_id = %facility,
                age_ms = duration_ms(breach.elapsed),
                threshold_ms = duration_ms(breach.threshold),
                "Facility metrics stale"
            );
        }
        stale
    }
}

impl Default for SloGate {
    fn default() -> Self {
        Self::new(SloConfig::default())
    }
}

fn log_breach(breach: &SloBreach) {
    let elapsed_ms = duration_ms(breach.elapsed);
    let threshold_ms = duration_ms(breach.threshold);
    match breach.action {
        SloAction::Reject => error!(
            op_kind = %breach.op_kind,
            elapsed_ms,
            threshold_ms,
            "SLO breach, operation rejected"
        ),
        SloAction::Escalate | SloAction::Alert => warn!(
            op_kind = %breach.op_kind,
            action = %breach.action,
            elapsed_ms,
            threshold_ms,
            "SLO breach"
        ),
    }
}
