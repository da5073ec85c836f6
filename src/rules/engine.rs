//! # Rule Engine
//!
//! Deterministic, side-effect-free evaluation of a rule catalog against one
//! target's probe batch. No I/O, no hidden state, no randomness: identical
//! inputs always yield identical detections, which keeps test fixtures
//! reproducible and makes change detection between scan runs meaningful.
//!
//! A failing rule (missing probe, type mismatch) is fatal to that rule
//! only; the remaining rules still run.

use super::catalog::{Rule, RuleCatalog, RuleCondition};
use crate::connector::{BackendTarget, ProbeResult, RemediationAction};
use crate::models::Severity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Pure evaluation output: what an issue will be made of.
///
/// Identity and timestamps are attached by the orchestrator when it turns a
/// detection into an [`crate::models::Issue`]; keeping them out of the
/// engine is what makes evaluation deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub rule_id: String,
    pub severity: Severity,
    pub evidence: Vec<ProbeResult>,
    pub action: Option<RemediationAction>,
}

/// A rule that could not be evaluated against the batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleFailure {
    pub rule_id: String,
    pub message: String,
}

/// Result of evaluating one catalog against one target's batch
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Evaluation {
    pub detections: Vec<Detection>,
    pub failures: Vec<RuleFailure>,
}

/// Stateless catalog evaluator
pub struct RuleEngine;

impl RuleEngine {
    /// Evaluate every applicable rule in catalog order.
    ///
    /// When the same probe name appears more than once in the batch the
    /// first occurrence wins; evaluation stays order-stable either way.
    pub fn evaluate(
        target: &BackendTarget,
        results: &[ProbeResult],
        catalog: &RuleCatalog,
    ) -> Evaluation {
        let mut batch: HashMap<&str, &ProbeResult> = HashMap::new();
        for result in results {
            batch.entry(result.probe.as_str()).or_insert(result);
        }

        let mut evaluation = Evaluation::default();

        for rule in catalog.rules_for(target.kind) {
            match Self::evaluate_rule(rule, &batch) {
                Ok(true) => {
                    let evidence = rule
                        .required_probes
                        .iter()
                        .filter_map(|name| batch.get(name.as_str()).map(|r| (*r).clone()))
                        .collect();
                    debug!(
                        rule_id = %rule.id,
                        target = %target.name,
                        severity = %rule.severity,
                        "Rule fired"
                    );
                    evaluation.detections.push(Detection {
                        rule_id: rule.id.clone(),
                        severity: rule.severity,
                        evidence,
                        action: rule.action.clone(),
                    });
                }
                Ok(false) => {}
                Err(message) => {
                    evaluation.failures.push(RuleFailure {
                        rule_id: rule.id.clone(),
                        message,
                    });
                }
            }
        }

        evaluation
    }

    /// Re-check a single rule's condition, used by post-action verification
    pub fn condition_holds(rule: &Rule, results: &[ProbeResult]) -> Result<bool, String> {
        let mut batch: HashMap<&str, &ProbeResult> = HashMap::new();
        for result in results {
            batch.entry(result.probe.as_str()).or_insert(result);
        }
        Self::evaluate_rule(rule, &batch)
    }

    fn evaluate_rule(rule: &Rule, batch: &HashMap<&str, &ProbeResult>) -> Result<bool, String> {
        for probe in &rule.required_probes {
            if !batch.contains_key(probe.as_str()) {
                return Err(format!("required probe '{probe}' missing from batch"));
            }
        }
        Self::condition_matches(&rule.condition, batch)
    }

    fn condition_matches(
        condition: &RuleCondition,
        batch: &HashMap<&str, &ProbeResult>,
    ) -> Result<bool, String> {
        match condition {
            RuleCondition::Threshold { probe, op, value } => {
                let result = batch
                    .get(probe.as_str())
                    .ok_or_else(|| format!("probe '{probe}' missing from batch"))?;
                let observed = result
                    .value
                    .as_f64()
                    .ok_or_else(|| format!("probe '{probe}' is not numeric"))?;
                Ok(op.compare(observed, *value))
            }
            RuleCondition::TextEquals { probe, expected } => {
                let result = batch
                    .get(probe.as_str())
                    .ok_or_else(|| format!("probe '{probe}' missing from batch"))?;
                let observed = result
                    .value
                    .as_text()
                    .ok_or_else(|| format!("probe '{probe}' is not text"))?;
                Ok(observed == expected)
            }
            RuleCondition::TextNotEquals { probe, expected } => {
                let result = batch
                    .get(probe.as_str())
                    .ok_or_else(|| format!("probe '{probe}' missing from batch"))?;
                let observed = result
                    .value
                    .as_text()
                    .ok_or_else(|| format!("probe '{probe}' is not text"))?;
                Ok(observed != expected)
            }
            RuleCondition::All(conditions) => {
                for condition in conditions {
                    if !Self::condition_matches(condition, batch)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            RuleCondition::Any(conditions) => {
                for condition in conditions {
                    if Self::condition_matches(condition, batch)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{BackendKind, ProbeValue};
    use crate::rules::catalog::{builtin_catalog, ComparisonOp};
    use std::time::Duration;
    use uuid::Uuid;

    fn target(kind: BackendKind) -> BackendTarget {
        BackendTarget::new(kind, "t-test", "https://t.test", "vault://t")
    }

    fn probe(target_id: Uuid, name: &str, value: ProbeValue) -> ProbeResult {
        ProbeResult::new(name, target_id, value, Duration::from_millis(3))
    }

    fn healthy_batch(target_id: Uuid) -> Vec<ProbeResult> {
        vec![
            probe(target_id, "cpu_usage_percent", ProbeValue::Float(20.0)),
            probe(target_id, "memory_used_percent", ProbeValue::Float(40.0)),
            probe(target_id, "active_connections", ProbeValue::Integer(12)),
            probe(target_id, "service_responsive", ProbeValue::Bool(true)),
            probe(target_id, "cache_hit_ratio", ProbeValue::Float(0.92)),
            probe(
                target_id,
                "repository_status",
                ProbeValue::Text("ready".to_string()),
            ),
            probe(target_id, "store_used_percent", ProbeValue::Float(41.0)),
        ]
    }

    #[test]
    fn test_healthy_batch_yields_no_detections() {
        let target = target(BackendKind::ContentManager);
        let results = healthy_batch(target.id);
        let evaluation = RuleEngine::evaluate(&target, &results, &builtin_catalog());
        assert!(evaluation.detections.is_empty());
        assert!(evaluation.failures.is_empty());
    }

    #[test]
    fn test_threshold_rule_fires_with_evidence() {
        let target = target(BackendKind::ContentManager);
        let mut results = healthy_batch(target.id);
        results[1] = probe(target.id, "memory_used_percent", ProbeValue::Float(97.5));

        let evaluation = RuleEngine::evaluate(&target, &results, &builtin_catalog());
        let detection = evaluation
            .detections
            .iter()
            .find(|d| d.rule_id == "memory-critical")
            .expect("memory rule fires");
        assert_eq!(detection.severity, Severity::Critical);
        assert_eq!(detection.evidence.len(), 1);
        assert_eq!(detection.evidence[0].probe, "memory_used_percent");
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let target = target(BackendKind::ContentManager);
        let mut results = healthy_batch(target.id);
        results[0] = probe(target.id, "cpu_usage_percent", ProbeValue::Float(99.0));
        results[4] = probe(target.id, "cache_hit_ratio", ProbeValue::Float(0.2));

        let catalog = builtin_catalog();
        let first = RuleEngine::evaluate(&target, &results, &catalog);
        let second = RuleEngine::evaluate(&target, &results, &catalog);
        assert_eq!(first.detections, second.detections);
        assert_eq!(first.failures, second.failures);
        // cpu 99 trips both the critical and the warning rule
        assert_eq!(first.detections.len(), 3);
    }

    #[test]
    fn test_detections_follow_catalog_order() {
        let target = target(BackendKind::SearchEngine);
        let results = vec![
            probe(target.id, "cpu_usage_percent", ProbeValue::Float(99.0)),
            probe(target.id, "memory_used_percent", ProbeValue::Float(99.0)),
            probe(target.id, "active_connections", ProbeValue::Integer(1)),
            probe(target.id, "service_responsive", ProbeValue::Bool(true)),
            probe(target.id, "index_lag_seconds", ProbeValue::Float(900.0)),
            probe(
                target.id,
                "index_status",
                ProbeValue::Text("green".to_string()),
            ),
        ];

        let evaluation = RuleEngine::evaluate(&target, &results, &builtin_catalog());
        let ids: Vec<_> = evaluation
            .detections
            .iter()
            .map(|d| d.rule_id.as_str())
            .collect();
        assert_eq!(ids, vec!["memory-critical", "cpu-critical", "cpu-warning", "se-index-lag"]);
    }

    #[test]
    fn test_missing_probe_fails_only_that_rule() {
        let target = target(BackendKind::ContentManager);
        // Everything present except service_responsive
        let results: Vec<_> = healthy_batch(target.id)
            .into_iter()
            .filter(|r| r.probe != "service_responsive")
            .collect();

        let evaluation = RuleEngine::evaluate(&target, &results, &builtin_catalog());
        assert_eq!(evaluation.failures.len(), 1);
        assert_eq!(evaluation.failures[0].rule_id, "service-unresponsive");
        assert!(evaluation.failures[0].message.contains("service_responsive"));
        // Other rules still evaluated cleanly
        assert!(evaluation.detections.is_empty());
    }

    #[test]
    fn test_type_mismatch_is_a_rule_failure() {
        let target = target(BackendKind::ContentManager);
        let mut results = healthy_batch(target.id);
        results[5] = probe(target.id, "repository_status", ProbeValue::Float(1.0));

        let evaluation = RuleEngine::evaluate(&target, &results, &builtin_catalog());
        assert!(evaluation
            .failures
            .iter()
            .any(|f| f.rule_id == "cm-repository-not-ready" && f.message.contains("not text")));
    }

    #[test]
    fn test_composite_conditions() {
        let batch = vec![
            ProbeResult::new("a", Uuid::new_v4(), ProbeValue::Float(5.0), Duration::ZERO),
            ProbeResult::new("b", Uuid::new_v4(), ProbeValue::Float(50.0), Duration::ZERO),
        ];
        let rule = Rule {
            id: "composite".to_string(),
            name: "Composite".to_string(),
            applies_to: None,
            required_probes: vec!["a".to_string(), "b".to_string()],
            condition: RuleCondition::All(vec![
                RuleCondition::Threshold {
                    probe: "a".to_string(),
                    op: ComparisonOp::Ge,
                    value: 5.0,
                },
                RuleCondition::Any(vec![
                    RuleCondition::Threshold {
                        probe: "b".to_string(),
                        op: ComparisonOp::Gt,
                        value: 100.0,
                    },
                    RuleCondition::Threshold {
                        probe: "b".to_string(),
                        op: ComparisonOp::Ge,
                        value: 50.0,
                    },
                ]),
            ]),
            severity: Severity::Info,
            action: None,
        };

        assert_eq!(RuleEngine::condition_holds(&rule, &batch), Ok(true));
    }

    #[test]
    fn test_bool_probe_via_threshold() {
        let target = target(BackendKind::Studio);
        let results = vec![
            probe(target.id, "cpu_usage_percent", ProbeValue::Float(10.0)),
            probe(target.id, "memory_used_percent", ProbeValue::Float(10.0)),
            probe(target.id, "active_connections", ProbeValue::Integer(2)),
            probe(target.id, "service_responsive", ProbeValue::Bool(false)),
            probe(target.id, "publish_queue_depth", ProbeValue::Integer(3)),
        ];

        let evaluation = RuleEngine::evaluate(&target, &results, &builtin_catalog());
        assert!(evaluation
            .detections
            .iter()
            .any(|d| d.rule_id == "service-unresponsive"));
    }
}
