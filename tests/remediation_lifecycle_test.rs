//! Remediation engine lifecycle: policy guards, retry budget, idempotent
//! action dispatch, and post-action verification.

mod common;

use common::{fast_config, target, ActionMode, MockConnector, TargetScript};
use sentinel_core::config::SentinelConfig;
use sentinel_core::connector::{BackendKind, ProbeValue, RemediationAction};
use sentinel_core::events::EventPublisher;
use sentinel_core::models::{Issue, Severity};
use sentinel_core::pool::{ConnectionPoolManager, SystemClock};
use sentinel_core::remediation::{IssueState, RemediationEngine};
use sentinel_core::rules::builtin_catalog;
use std::collections::HashMap;
use std::sync::Arc;

fn build_engine(
    config: SentinelConfig,
    connector: Arc<MockConnector>,
) -> Arc<RemediationEngine> {
    let config = Arc::new(config);
    let pool = Arc::new(ConnectionPoolManager::new(
        connector.clone(),
        Arc::clone(&config),
        Arc::new(SystemClock),
    ));
    Arc::new(RemediationEngine::new(
        connector,
        pool,
        config,
        EventPublisher::default(),
    ))
}

/// Issue matching the built-in cm-cache-degraded rule
fn cache_issue(target_id: uuid::Uuid) -> Issue {
    Issue::new(
        "cm-cache-degraded",
        Severity::Warning,
        target_id,
        vec![],
        Some(RemediationAction::ClearCache),
    )
}

#[tokio::test]
async fn test_auto_remediation_disabled_keeps_issue_detected() {
    let mut config = fast_config();
    config.remediation.auto_remediate.warning = false;

    let connector = MockConnector::new();
    let target = target(BackendKind::ContentManager, "cm-01");
    connector.script_target(
        &target,
        TargetScript::healthy(BackendKind::ContentManager)
            .with_value("cache_hit_ratio", ProbeValue::Float(0.2)),
    );

    let engine = build_engine(config, connector.clone());
    let issue_id = engine.register(cache_issue(target.id));

    let state = engine
        .remediate(issue_id, &target, &builtin_catalog())
        .await
        .unwrap();

    assert_eq!(state, IssueState::Detected);
    assert_eq!(engine.issue(issue_id).unwrap().state, IssueState::Detected);
    assert_eq!(connector.action_calls(), 0);
}

#[tokio::test]
async fn test_report_only_issue_never_enters_action_pending() {
    let connector = MockConnector::new();
    let target = target(BackendKind::ContentManager, "cm-01");
    connector.script_target(&target, TargetScript::healthy(BackendKind::ContentManager));

    let engine = build_engine(fast_config(), connector.clone());
    let issue_id = engine.register(Issue::new(
        "cpu-warning",
        Severity::Warning,
        target.id,
        vec![],
        None,
    ));

    let state = engine
        .remediate(issue_id, &target, &builtin_catalog())
        .await
        .unwrap();

    assert_eq!(state, IssueState::Detected);
    assert_eq!(connector.action_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_always_failing_action_reaches_failed_after_exact_budget() {
    let mut config = fast_config();
    config.remediation.max_retries = 3;

    let connector = MockConnector::new();
    let target = target(BackendKind::ContentManager, "cm-01");
    connector.script_target(
        &target,
        TargetScript::healthy(BackendKind::ContentManager)
            .with_value("cache_hit_ratio", ProbeValue::Float(0.2))
            .with_action_mode(ActionMode::AlwaysErrors),
    );

    let engine = build_engine(config, connector.clone());
    let issue_id = engine.register(cache_issue(target.id));

    let state = engine
        .remediate(issue_id, &target, &builtin_catalog())
        .await
        .unwrap();

    assert_eq!(state, IssueState::Failed);
    // Exactly max_retries dispatches, not more
    assert_eq!(connector.action_calls(), 3);

    let issue = engine.issue(issue_id).unwrap();
    assert_eq!(issue.attempts, 3);
    assert!(issue.last_error.as_deref().unwrap().contains("backend error"));
}

#[tokio::test]
async fn test_successful_fix_is_verified_and_resolves() {
    let connector = MockConnector::new();
    let target = target(BackendKind::ContentManager, "cm-01");
    connector.script_target(
        &target,
        TargetScript::healthy(BackendKind::ContentManager)
            .with_value("cache_hit_ratio", ProbeValue::Float(0.2))
            .with_action_mode(ActionMode::FixProbes(HashMap::from([(
                "cache_hit_ratio".to_string(),
                ProbeValue::Float(0.95),
            )]))),
    );

    let engine = build_engine(fast_config(), connector.clone());
    let issue_id = engine.register(cache_issue(target.id));

    let state = engine
        .remediate(issue_id, &target, &builtin_catalog())
        .await
        .unwrap();

    assert_eq!(state, IssueState::Resolved);
    let issue = engine.issue(issue_id).unwrap();
    assert_eq!(issue.attempts, 1);
    assert_eq!(connector.distinct_mutations(), 1);
    // History: Detected -> ActionPending -> Resolved
    assert_eq!(issue.history.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_retries_carry_one_idempotency_key_no_duplicate_side_effects() {
    let mut config = fast_config();
    config.remediation.max_retries = 2;

    let connector = MockConnector::new();
    let target = target(BackendKind::ContentManager, "cm-01");
    // Action applies but the condition persists, forcing a retry of the
    // same action against an already-applied backend.
    connector.script_target(
        &target,
        TargetScript::healthy(BackendKind::ContentManager)
            .with_value("cache_hit_ratio", ProbeValue::Float(0.2))
            .with_action_mode(ActionMode::AppliesNoEffect),
    );

    let engine = build_engine(config, connector.clone());
    let issue_id = engine.register(cache_issue(target.id));

    let state = engine
        .remediate(issue_id, &target, &builtin_catalog())
        .await
        .unwrap();

    assert_eq!(state, IssueState::Failed);
    assert_eq!(connector.action_calls(), 2);
    // Both dispatches presented the same idempotency key: exactly one
    // remote mutation happened.
    assert_eq!(connector.distinct_mutations(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_action_exhausts_budget_with_reason() {
    let mut config = fast_config();
    config.remediation.max_retries = 2;

    let connector = MockConnector::new();
    let target = target(BackendKind::ContentManager, "cm-01");
    connector.script_target(
        &target,
        TargetScript::healthy(BackendKind::ContentManager)
            .with_value("cache_hit_ratio", ProbeValue::Float(0.2))
            .with_action_mode(ActionMode::Rejects("maintenance window".to_string())),
    );

    let engine = build_engine(config, connector.clone());
    let issue_id = engine.register(cache_issue(target.id));

    let state = engine
        .remediate(issue_id, &target, &builtin_catalog())
        .await
        .unwrap();

    assert_eq!(state, IssueState::Failed);
    let issue = engine.issue(issue_id).unwrap();
    assert!(issue
        .last_error
        .as_deref()
        .unwrap()
        .contains("maintenance window"));
}

#[tokio::test]
async fn test_acknowledge_lifecycle() {
    let connector = MockConnector::new();
    let target = target(BackendKind::Studio, "studio-01");
    connector.script_target(&target, TargetScript::healthy(BackendKind::Studio));

    let engine = build_engine(fast_config(), connector);
    let issue_id = engine.register(Issue::new(
        "studio-publish-backlog",
        Severity::Info,
        target.id,
        vec![],
        None,
    ));

    assert_eq!(engine.acknowledge(issue_id).unwrap(), IssueState::Acknowledged);
    // Acknowledged is terminal
    assert!(engine.acknowledge(issue_id).is_err());
    assert!(engine.acknowledge(uuid::Uuid::new_v4()).is_err());
}
