//! # Remediation Engine
//!
//! Drives the auto-fix lifecycle for detected issues: guards on
//! auto-remediation policy, dispatches the rule's corrective action with a
//! bounded retry budget and exponential backoff, and verifies the fix with
//! a fresh probe before declaring the issue resolved.
//!
//! Every dispatch for one issue carries the same idempotency key (the
//! issue id), so a retry against a backend that already applied the fix
//! duplicates no remote side effects. The engine also owns the issue
//! ledger: lookup, listing, and operator acknowledgement go through it.

use super::events::IssueEvent;
use super::state_machine::IssueStateMachine;
use super::states::IssueState;
use crate::config::SentinelConfig;
use crate::connector::{
    ActionOutcome, ActionRequest, BackendTarget, Connector, ProbeResult,
};
use crate::error::{Result, SentinelError};
use crate::events::{DiagnosticEvent, EventPublisher};
use crate::models::Issue;
use crate::pool::{BackoffPolicy, ConnectionPoolManager};
use crate::rules::{Rule, RuleCatalog, RuleEngine};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Auto-fix driver and issue ledger
pub struct RemediationEngine {
    connector: Arc<dyn Connector>,
    pool: Arc<ConnectionPoolManager>,
    config: Arc<SentinelConfig>,
    publisher: EventPublisher,
    backoff: BackoffPolicy,
    issues: DashMap<Uuid, Issue>,
}

impl RemediationEngine {
    pub fn new(
        connector: Arc<dyn Connector>,
        pool: Arc<ConnectionPoolManager>,
        config: Arc<SentinelConfig>,
        publisher: EventPublisher,
    ) -> Self {
        let backoff = BackoffPolicy::new(
            config.remediation.backoff_base(),
            config.remediation.backoff_max(),
        );
        Self {
            connector,
            pool,
            config,
            publisher,
            backoff,
            issues: DashMap::new(),
        }
    }

    /// Add a freshly detected issue to the ledger
    pub fn register(&self, issue: Issue) -> Uuid {
        let id = issue.id;
        self.publisher.publish(DiagnosticEvent::IssueDetected {
            issue_id: id,
            rule_id: issue.rule_id.clone(),
            severity: issue.severity,
            target_id: issue.target_id,
            detected_at: issue.detected_at,
        });
        info!(
            issue_id = %id,
            rule_id = %issue.rule_id,
            severity = %issue.severity,
            target_id = %issue.target_id,
            "🔍 Issue detected"
        );
        self.issues.insert(id, issue);
        id
    }

    /// Current snapshot of one issue
    pub fn issue(&self, issue_id: Uuid) -> Option<Issue> {
        self.issues.get(&issue_id).map(|entry| entry.clone())
    }

    /// All issues recorded for one target
    pub fn issues_for_target(&self, target_id: Uuid) -> Vec<Issue> {
        self.issues
            .iter()
            .filter(|entry| entry.target_id == target_id)
            .map(|entry| entry.clone())
            .collect()
    }

    /// Operator acknowledgement: the issue is handled, stop automating
    pub fn acknowledge(&self, issue_id: Uuid) -> Result<IssueState> {
        let mut entry = self
            .issues
            .get_mut(&issue_id)
            .ok_or_else(|| SentinelError::IssueNotFound {
                issue_id: issue_id.to_string(),
            })?;

        let state = IssueStateMachine::transition(&mut entry, IssueEvent::Acknowledge)?;
        self.publisher.publish(DiagnosticEvent::IssueAcknowledged {
            issue_id,
            final_state: state,
        });
        info!(issue_id = %issue_id, "Issue acknowledged by operator");
        Ok(state)
    }

    /// Attempt automated remediation of a registered issue.
    ///
    /// Report-only rules and severities with auto-remediation disabled stay
    /// in `Detected` until acknowledged. Otherwise the issue moves to
    /// `ActionPending` and ends in `Resolved` or `Failed`; the final state
    /// is returned either way.
    pub async fn remediate(
        &self,
        issue_id: Uuid,
        target: &BackendTarget,
        catalog: &RuleCatalog,
    ) -> Result<IssueState> {
        let mut issue = self.issue(issue_id).ok_or_else(|| SentinelError::IssueNotFound {
            issue_id: issue_id.to_string(),
        })?;

        let Some(action) = issue.action.clone() else {
            debug!(issue_id = %issue_id, rule_id = %issue.rule_id, "Rule is report-only");
            return Ok(issue.state);
        };

        if !self
            .config
            .remediation
            .auto_remediate
            .is_enabled(issue.severity)
        {
            debug!(
                issue_id = %issue_id,
                severity = %issue.severity,
                "Auto-remediation disabled for this severity"
            );
            return Ok(issue.state);
        }

        let Some(rule) = catalog.rule(&issue.rule_id) else {
            warn!(
                issue_id = %issue_id,
                rule_id = %issue.rule_id,
                "Rule no longer in catalog, leaving issue detected"
            );
            return Ok(issue.state);
        };

        IssueStateMachine::transition(&mut issue, IssueEvent::StartRemediation)?;
        self.store(&issue);

        let max_retries = self.config.remediation.max_retries;
        let request = ActionRequest::new(action.clone(), issue.id);
        let mut last_error = String::new();

        for attempt in 1..=max_retries {
            issue.attempts = attempt;
            self.store(&issue);
            self.publisher.publish(DiagnosticEvent::RemediationStarted {
                issue_id,
                action: action.name().to_string(),
                attempt,
            });
            debug!(
                issue_id = %issue_id,
                action = %action,
                attempt,
                max_retries,
                "Dispatching remediation action"
            );

            match self.apply_once(target, &request).await {
                Ok(ActionOutcome::Applied) | Ok(ActionOutcome::AlreadyApplied) => {
                    match self.verify(target, rule, catalog).await {
                        // Condition no longer holds: the fix landed
                        Ok(false) => {
                            IssueStateMachine::transition(
                                &mut issue,
                                IssueEvent::VerificationConfirmed,
                            )?;
                            self.store(&issue);
                            self.publisher.publish(DiagnosticEvent::IssueResolved {
                                issue_id,
                                attempts: attempt,
                            });
                            info!(
                                issue_id = %issue_id,
                                rule_id = %issue.rule_id,
                                attempts = attempt,
                                "🟢 Issue resolved"
                            );
                            return Ok(IssueState::Resolved);
                        }
                        Ok(true) => {
                            last_error = "verification shows condition persisting".to_string();
                        }
                        Err(err) => {
                            last_error = format!("verification probe failed: {err}");
                        }
                    }
                }
                Ok(ActionOutcome::Rejected { reason }) => {
                    last_error = format!("action rejected: {reason}");
                }
                Err(err) => {
                    last_error = err.to_string();
                }
            }

            issue.last_error = Some(last_error.clone());
            self.store(&issue);

            if attempt < max_retries {
                let delay = self.backoff.delay_for_attempt(attempt);
                debug!(
                    issue_id = %issue_id,
                    attempt,
                    backoff_ms = delay.as_millis() as u64,
                    "Remediation attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }

        IssueStateMachine::transition(&mut issue, IssueEvent::exhausted(&last_error))?;
        self.store(&issue);
        self.publisher.publish(DiagnosticEvent::RemediationFailed {
            issue_id,
            attempts: max_retries,
            reason: last_error.clone(),
        });
        warn!(
            issue_id = %issue_id,
            rule_id = %issue.rule_id,
            attempts = max_retries,
            reason = %last_error,
            "🔴 Remediation failed"
        );
        Ok(IssueState::Failed)
    }

    /// One action dispatch through the pool
    async fn apply_once(
        &self,
        target: &BackendTarget,
        request: &ActionRequest,
    ) -> Result<ActionOutcome> {
        let mut pooled = self.pool.acquire(target).await?;
        let result = self
            .connector
            .apply_action(pooled.connection(), request)
            .await;
        if matches!(result, Err(SentinelError::Authentication { .. })) {
            pooled.mark_auth_failed();
        }
        self.pool.release(pooled);
        result
    }

    /// Fresh verification probe: re-collect the rule's required probes and
    /// re-check its condition. `Ok(true)` means the condition still holds.
    async fn verify(
        &self,
        target: &BackendTarget,
        rule: &Rule,
        catalog: &RuleCatalog,
    ) -> Result<bool> {
        let specs: Vec<_> = catalog
            .probes_for(target.kind)
            .into_iter()
            .filter(|spec| rule.required_probes.contains(&spec.name))
            .collect();

        let mut pooled = self.pool.acquire(target).await?;
        let mut fresh: Vec<ProbeResult> = Vec::with_capacity(specs.len());
        let mut probe_error = None;

        for spec in &specs {
            match self.connector.probe(pooled.connection(), spec).await {
                Ok(result) => fresh.push(result),
                Err(err) => {
                    if matches!(err, SentinelError::Authentication { .. }) {
                        pooled.mark_auth_failed();
                    }
                    probe_error = Some(err);
                    break;
                }
            }
        }
        self.pool.release(pooled);

        if let Some(err) = probe_error {
            return Err(err);
        }

        RuleEngine::condition_holds(rule, &fresh)
            .map_err(|message| SentinelError::rule_evaluation(&rule.id, message))
    }

    fn store(&self, issue: &Issue) {
        self.issues.insert(issue.id, issue.clone());
    }
}
