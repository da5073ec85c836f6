//! # Scan Orchestrator
//!
//! Drives one scan run to completion: fans probe-and-evaluate units out
//! across the target set with the connection pool as the single point of
//! backpressure, collects per-target outcomes as they finish, and hands
//! detections to the remediation engine.
//!
//! A single target's failure never aborts the run; it becomes a typed
//! partial-failure entry. Pool-contended targets are deferred to a later
//! pass within the same run. Only the global scan timeout ends a run
//! early, and it yields a `Partial` run rather than a hard failure. On
//! cancellation no new units are dispatched; in-flight calls finish or
//! time out naturally.

use crate::config::SentinelConfig;
use crate::connector::{BackendKind, BackendTarget, Connector};
use crate::error::{Result, SentinelError};
use crate::events::{DiagnosticEvent, EventPublisher};
use crate::health::HealthMonitor;
use crate::models::{
    FailureKind, Issue, ScanRun, ScanStatus, TargetFailure, TargetOutcome,
};
use crate::pool::ConnectionPoolManager;
use crate::remediation::RemediationEngine;
use crate::rules::{RuleCatalog, RuleEngine};
use chrono::Utc;
use dashmap::DashMap;
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What one probe-and-evaluate unit produced
enum UnitOutcome {
    Completed(TargetOutcome),
    /// Pool contention: retry the target in a later pass of the same run
    Deferred,
}

/// Fan-out coordinator for scan runs
pub struct ScanOrchestrator {
    connector: Arc<dyn Connector>,
    pool: Arc<ConnectionPoolManager>,
    remediation: Arc<RemediationEngine>,
    health: Arc<HealthMonitor>,
    publisher: EventPublisher,
    config: Arc<SentinelConfig>,
    runs: DashMap<Uuid, ScanRun>,
    run_order: Mutex<VecDeque<Uuid>>,
    cancel_flags: DashMap<Uuid, Arc<AtomicBool>>,
}

impl ScanOrchestrator {
    pub fn new(
        connector: Arc<dyn Connector>,
        pool: Arc<ConnectionPoolManager>,
        remediation: Arc<RemediationEngine>,
        health: Arc<HealthMonitor>,
        publisher: EventPublisher,
        config: Arc<SentinelConfig>,
    ) -> Self {
        Self {
            connector,
            pool,
            remediation,
            health,
            publisher,
            config,
            runs: DashMap::new(),
            run_order: Mutex::new(VecDeque::new()),
            cancel_flags: DashMap::new(),
        }
    }

    /// Drive one run to completion and return the sealed result
    pub async fn run_scan(
        &self,
        targets: Vec<BackendTarget>,
        catalog: Arc<RuleCatalog>,
    ) -> Result<ScanRun> {
        let run_id = self.prepare_run(&targets);
        self.drive(run_id, targets, catalog).await;
        self.scan_status(run_id)
            .ok_or_else(|| SentinelError::ScanNotFound {
                scan_id: run_id.to_string(),
            })
    }

    /// Start a run in the background and return its id immediately
    pub fn start_scan(
        self: &Arc<Self>,
        targets: Vec<BackendTarget>,
        catalog: Arc<RuleCatalog>,
    ) -> Uuid {
        let run_id = self.prepare_run(&targets);
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            orchestrator.drive(run_id, targets, catalog).await;
        });
        run_id
    }

    /// Request cancellation: no new units are dispatched, in-flight units
    /// finish naturally. Returns whether the run was still cancellable.
    pub fn cancel_scan(&self, run_id: Uuid) -> bool {
        match self.cancel_flags.get(&run_id) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                info!(scan_id = %run_id, "Scan cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Current snapshot of a run (final once its status is finished)
    pub fn scan_status(&self, run_id: Uuid) -> Option<ScanRun> {
        self.runs.get(&run_id).map(|entry| entry.clone())
    }

    /// Most recent runs, newest last
    pub fn recent_runs(&self) -> Vec<ScanRun> {
        let order = self.run_order.lock();
        order
            .iter()
            .filter_map(|id| self.runs.get(id).map(|entry| entry.clone()))
            .collect()
    }

    fn prepare_run(&self, targets: &[BackendTarget]) -> Uuid {
        let run = ScanRun::new(targets.len());
        let run_id = run.id;
        self.runs.insert(run_id, run);
        self.cancel_flags
            .insert(run_id, Arc::new(AtomicBool::new(false)));

        // Retain only the most recent runs
        let mut order = self.run_order.lock();
        order.push_back(run_id);
        while order.len() > self.config.scan.run_history_limit {
            if let Some(evicted) = order.pop_front() {
                self.runs.remove(&evicted);
            }
        }
        run_id
    }

    async fn drive(&self, run_id: Uuid, targets: Vec<BackendTarget>, catalog: Arc<RuleCatalog>) {
        let deadline = tokio::time::Instant::now() + self.config.scan.global_timeout();
        let cancel = self
            .cancel_flags
            .get(&run_id)
            .map(|flag| Arc::clone(&flag))
            .unwrap_or_else(|| Arc::new(AtomicBool::new(false)));

        self.publisher.publish(DiagnosticEvent::ScanStarted {
            scan_id: run_id,
            target_count: targets.len(),
            started_at: Utc::now(),
        });
        info!(
            scan_id = %run_id,
            target_count = targets.len(),
            "🚀 Scan started"
        );

        // Identity of every target, kept for the final completeness sweep
        let roster: Vec<(Uuid, BackendKind, String)> = targets
            .iter()
            .map(|t| (t.id, t.kind, t.name.clone()))
            .collect();

        let mut pending = targets;
        let mut pass: u32 = 0;
        let mut timed_out = false;
        let mut cancelled = false;

        loop {
            let mut units = FuturesUnordered::new();
            for target in pending.drain(..) {
                if cancel.load(Ordering::SeqCst) {
                    cancelled = true;
                    continue;
                }
                let catalog = Arc::clone(&catalog);
                units.push(async move {
                    let outcome = self.probe_and_evaluate(&target, &catalog).await;
                    (target, outcome)
                });
            }

            let mut deferred: Vec<BackendTarget> = Vec::new();
            loop {
                match tokio::time::timeout_at(deadline, units.next()).await {
                    Ok(Some((_target, UnitOutcome::Completed(outcome)))) => {
                        self.record_outcome(run_id, outcome);
                    }
                    Ok(Some((target, UnitOutcome::Deferred))) => {
                        debug!(
                            scan_id = %run_id,
                            target = %target.name,
                            "Target deferred on pool contention"
                        );
                        deferred.push(target);
                    }
                    Ok(None) => break,
                    Err(_elapsed) => {
                        warn!(scan_id = %run_id, "Global scan timeout reached");
                        timed_out = true;
                        break;
                    }
                }
            }

            if timed_out || cancelled || deferred.is_empty() {
                break;
            }
            if pass >= self.config.scan.max_deferred_passes {
                debug!(
                    scan_id = %run_id,
                    deferred = deferred.len(),
                    "Deferred-pass budget exhausted"
                );
                break;
            }
            pass += 1;
            if let Some(mut run) = self.runs.get_mut(&run_id) {
                run.deferred_passes = pass;
            }
            pending = deferred;
        }

        self.sweep_missing_outcomes(run_id, &roster, cancelled, timed_out);

        let status_override = if cancelled {
            Some(ScanStatus::Cancelled)
        } else if timed_out {
            Some(ScanStatus::Partial)
        } else {
            None
        };

        let (status, issue_count) = {
            let mut run = self
                .runs
                .get_mut(&run_id)
                .expect("run exists until evicted from the ledger");
            run.finish(status_override);
            (run.status, run.issue_ids().len())
        };

        self.cancel_flags.remove(&run_id);
        self.publisher.publish(DiagnosticEvent::ScanCompleted {
            scan_id: run_id,
            status,
            issue_count,
            completed_at: Utc::now(),
        });
        info!(
            scan_id = %run_id,
            status = %status,
            issue_count,
            deferred_passes = pass,
            "🏁 Scan completed"
        );
    }

    /// Every target must end with an outcome; assign a typed failure to any
    /// target the run never resolved (cancelled before dispatch, still
    /// deferred at the end, or cut off by the global timeout).
    fn sweep_missing_outcomes(
        &self,
        run_id: Uuid,
        roster: &[(Uuid, BackendKind, String)],
        cancelled: bool,
        timed_out: bool,
    ) {
        let recorded: HashSet<Uuid> = match self.runs.get(&run_id) {
            Some(run) => run.outcomes.iter().map(TargetOutcome::target_id).collect(),
            None => return,
        };

        let (failure, message) = if cancelled {
            (FailureKind::Cancelled, "scan cancelled before this target completed")
        } else if timed_out {
            (FailureKind::ScanTimeout, "global scan timeout elapsed before this target completed")
        } else {
            (FailureKind::PoolExhausted, "no pool slot freed within the deferred-pass budget")
        };

        for (target_id, kind, name) in roster {
            if recorded.contains(target_id) {
                continue;
            }
            warn!(
                scan_id = %run_id,
                target = %name,
                failure = %failure,
                "Target yielded no result set"
            );
            self.record_outcome(
                run_id,
                TargetOutcome::Failed(TargetFailure {
                    target_id: *target_id,
                    kind: *kind,
                    failure,
                    message: message.to_string(),
                }),
            );
        }
    }

    fn record_outcome(&self, run_id: Uuid, outcome: TargetOutcome) {
        match &outcome {
            TargetOutcome::Completed {
                target_id,
                issue_ids,
                ..
            } => {
                self.publisher.publish(DiagnosticEvent::TargetCompleted {
                    scan_id: run_id,
                    target_id: *target_id,
                    issue_count: issue_ids.len(),
                });
            }
            TargetOutcome::Failed(failure) => {
                self.publisher.publish(DiagnosticEvent::TargetFailed {
                    scan_id: run_id,
                    target_id: failure.target_id,
                    reason: failure.message.clone(),
                });
            }
        }

        if let Some(mut run) = self.runs.get_mut(&run_id) {
            run.record_outcome(outcome);
        }
    }

    /// One unit of work: probe the target, evaluate the catalog, register
    /// and remediate detections. Connector- and pool-level failures are
    /// converted to structured outcomes here and never propagate further.
    async fn probe_and_evaluate(
        &self,
        target: &BackendTarget,
        catalog: &RuleCatalog,
    ) -> UnitOutcome {
        let mut pooled = match self.pool.acquire(target).await {
            Ok(pooled) => pooled,
            Err(SentinelError::PoolExhausted { .. }) => return UnitOutcome::Deferred,
            Err(err) => {
                let failure = match err {
                    SentinelError::ProbeTimeout { .. } => FailureKind::ProbeTimeout,
                    _ => FailureKind::Connection,
                };
                return UnitOutcome::Completed(TargetOutcome::Failed(TargetFailure {
                    target_id: target.id,
                    kind: target.kind,
                    failure,
                    message: err.to_string(),
                }));
            }
        };

        let specs = catalog.probes_for(target.kind);
        let mut results = Vec::with_capacity(specs.len());
        let mut probes_failed = 0usize;
        let mut first_failure: Option<(FailureKind, String)> = None;

        for spec in &specs {
            match self.connector.probe(pooled.connection(), spec).await {
                Ok(result) => {
                    if spec.metric {
                        self.health.ingest_probe_result(&result);
                    }
                    results.push(result);
                }
                Err(err) => {
                    probes_failed += 1;
                    if matches!(err, SentinelError::Authentication { .. }) {
                        pooled.mark_auth_failed();
                    }
                    let kind = match &err {
                        SentinelError::ProbeTimeout { .. } => FailureKind::ProbeTimeout,
                        SentinelError::Connection { .. }
                        | SentinelError::Authentication { .. } => FailureKind::Connection,
                        _ => FailureKind::Probe,
                    };
                    if first_failure.is_none() {
                        first_failure = Some((kind, err.to_string()));
                    }
                    debug!(
                        target = %target.name,
                        probe = %spec.name,
                        error = %err,
                        "Probe failed"
                    );
                }
            }
        }
        self.pool.release(pooled);

        if results.is_empty() {
            let (failure, message) = first_failure
                .unwrap_or((FailureKind::Probe, "no probes configured for kind".to_string()));
            return UnitOutcome::Completed(TargetOutcome::Failed(TargetFailure {
                target_id: target.id,
                kind: target.kind,
                failure,
                message,
            }));
        }

        let evaluation = RuleEngine::evaluate(target, &results, catalog);
        for rule_failure in &evaluation.failures {
            // Fatal to that single rule only
            warn!(
                target = %target.name,
                rule_id = %rule_failure.rule_id,
                message = %rule_failure.message,
                "Rule evaluation failed"
            );
        }

        let mut issue_ids = Vec::with_capacity(evaluation.detections.len());
        for detection in evaluation.detections {
            let issue = Issue::new(
                detection.rule_id,
                detection.severity,
                target.id,
                detection.evidence,
                detection.action,
            );
            let issue_id = self.remediation.register(issue);
            issue_ids.push(issue_id);

            if let Err(err) = self.remediation.remediate(issue_id, target, catalog).await {
                warn!(
                    issue_id = %issue_id,
                    target = %target.name,
                    error = %err,
                    "Remediation errored"
                );
            }
        }

        UnitOutcome::Completed(TargetOutcome::Completed {
            target_id: target.id,
            kind: target.kind,
            issue_ids,
            probes_succeeded: results.len(),
            probes_failed,
        })
    }
}
