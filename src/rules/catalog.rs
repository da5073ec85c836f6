//! # Diagnostic Rule Catalog
//!
//! Rules are data: a declarative condition over named probes, a severity,
//! and an optional remediation action. The engine contract is fixed by
//! [`crate::rules::RuleEngine`]; catalog contents are expected to be tuned
//! or replaced wholesale per deployment. A starting catalog covering the
//! three backend kinds ships in [`builtin_catalog`].

use crate::connector::{BackendKind, ProbeCategory, ProbeSpec, RemediationAction};
use crate::models::Severity;
use serde::{Deserialize, Serialize};

/// Comparison operator for threshold conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl ComparisonOp {
    pub fn compare(&self, left: f64, right: f64) -> bool {
        match self {
            Self::Gt => left > right,
            Self::Ge => left >= right,
            Self::Lt => left < right,
            Self::Le => left <= right,
            Self::Eq => (left - right).abs() < f64::EPSILON,
            Self::Ne => (left - right).abs() >= f64::EPSILON,
        }
    }
}

/// Declarative predicate over a batch of probe results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleCondition {
    /// Numeric comparison against a probe's value
    Threshold {
        probe: String,
        op: ComparisonOp,
        value: f64,
    },
    /// Probe's text value equals the expected string
    TextEquals { probe: String, expected: String },
    /// Probe's text value differs from the expected string
    TextNotEquals { probe: String, expected: String },
    /// Every sub-condition holds
    All(Vec<RuleCondition>),
    /// At least one sub-condition holds
    Any(Vec<RuleCondition>),
}

/// One diagnostic rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    /// Backend kind this rule applies to; `None` applies to all kinds
    pub applies_to: Option<BackendKind>,
    /// Probe names the condition reads; all must be present in the batch
    pub required_probes: Vec<String>,
    pub condition: RuleCondition,
    pub severity: Severity,
    /// Automatic corrective step; `None` makes the rule report-only
    pub action: Option<RemediationAction>,
}

impl Rule {
    pub fn applies_to_kind(&self, kind: BackendKind) -> bool {
        self.applies_to.map_or(true, |k| k == kind)
    }
}

/// A probe the catalog wants collected for a backend kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogProbe {
    /// Backend kind this probe targets; `None` targets all kinds
    pub applies_to: Option<BackendKind>,
    pub spec: ProbeSpec,
}

/// Ordered rule catalog plus the probe set it evaluates over.
///
/// Evaluation order is catalog order, which makes rule priority explicit
/// and keeps evaluation reproducible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RuleCatalog {
    rules: Vec<Rule>,
    probes: Vec<CatalogProbe>,
}

impl RuleCatalog {
    pub fn new(rules: Vec<Rule>, probes: Vec<CatalogProbe>) -> Self {
        Self { rules, probes }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    /// Rules applicable to one backend kind, in catalog order
    pub fn rules_for(&self, kind: BackendKind) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(move |rule| rule.applies_to_kind(kind))
    }

    /// The probe set to collect for one backend kind
    pub fn probes_for(&self, kind: BackendKind) -> Vec<ProbeSpec> {
        self.probes
            .iter()
            .filter(|probe| probe.applies_to.map_or(true, |k| k == kind))
            .map(|probe| probe.spec.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Starting catalog for the three managed backend kinds
pub fn builtin_catalog() -> RuleCatalog {
    let probes = vec![
        // Collected on every kind
        CatalogProbe {
            applies_to: None,
            spec: ProbeSpec::metric("cpu_usage_percent", ProbeCategory::Resource),
        },
        CatalogProbe {
            applies_to: None,
            spec: ProbeSpec::metric("memory_used_percent", ProbeCategory::Resource),
        },
        CatalogProbe {
            applies_to: None,
            spec: ProbeSpec::metric("active_connections", ProbeCategory::Resource),
        },
        CatalogProbe {
            applies_to: None,
            spec: ProbeSpec::new("service_responsive", ProbeCategory::Health),
        },
        // Content manager
        CatalogProbe {
            applies_to: Some(BackendKind::ContentManager),
            spec: ProbeSpec::metric("cache_hit_ratio", ProbeCategory::Subsystem),
        },
        CatalogProbe {
            applies_to: Some(BackendKind::ContentManager),
            spec: ProbeSpec::new("repository_status", ProbeCategory::Health),
        },
        CatalogProbe {
            applies_to: Some(BackendKind::ContentManager),
            spec: ProbeSpec::metric("store_used_percent", ProbeCategory::Subsystem),
        },
        // Retrieval engine
        CatalogProbe {
            applies_to: Some(BackendKind::SearchEngine),
            spec: ProbeSpec::metric("index_lag_seconds", ProbeCategory::Subsystem),
        },
        CatalogProbe {
            applies_to: Some(BackendKind::SearchEngine),
            spec: ProbeSpec::new("index_status", ProbeCategory::Health),
        },
        // Studio
        CatalogProbe {
            applies_to: Some(BackendKind::Studio),
            spec: ProbeSpec::metric("publish_queue_depth", ProbeCategory::Subsystem),
        },
    ];

    let rules = vec![
        Rule {
            id: "service-unresponsive".to_string(),
            name: "Service unresponsive".to_string(),
            applies_to: None,
            required_probes: vec!["service_responsive".to_string()],
            condition: RuleCondition::Threshold {
                probe: "service_responsive".to_string(),
                op: ComparisonOp::Eq,
                value: 0.0,
            },
            severity: Severity::Critical,
            action: Some(RemediationAction::RestartService),
        },
        Rule {
            id: "memory-critical".to_string(),
            name: "Memory exhaustion".to_string(),
            applies_to: None,
            required_probes: vec!["memory_used_percent".to_string()],
            condition: RuleCondition::Threshold {
                probe: "memory_used_percent".to_string(),
                op: ComparisonOp::Ge,
                value: 95.0,
            },
            severity: Severity::Critical,
            action: Some(RemediationAction::RestartService),
        },
        Rule {
            id: "cpu-critical".to_string(),
            name: "CPU saturation".to_string(),
            applies_to: None,
            required_probes: vec!["cpu_usage_percent".to_string()],
            condition: RuleCondition::Threshold {
                probe: "cpu_usage_percent".to_string(),
                op: ComparisonOp::Ge,
                value: 95.0,
            },
            severity: Severity::Critical,
            action: None,
        },
        Rule {
            id: "cpu-warning".to_string(),
            name: "CPU elevated".to_string(),
            applies_to: None,
            required_probes: vec!["cpu_usage_percent".to_string()],
            condition: RuleCondition::Threshold {
                probe: "cpu_usage_percent".to_string(),
                op: ComparisonOp::Ge,
                value: 80.0,
            },
            severity: Severity::Warning,
            action: None,
        },
        Rule {
            id: "cm-repository-not-ready".to_string(),
            name: "Repository not ready".to_string(),
            applies_to: Some(BackendKind::ContentManager),
            required_probes: vec!["repository_status".to_string()],
            condition: RuleCondition::TextNotEquals {
                probe: "repository_status".to_string(),
                expected: "ready".to_string(),
            },
            severity: Severity::Critical,
            action: Some(RemediationAction::RestartService),
        },
        Rule {
            id: "cm-connection-saturation".to_string(),
            name: "Connection limit near saturation".to_string(),
            applies_to: Some(BackendKind::ContentManager),
            required_probes: vec!["active_connections".to_string()],
            condition: RuleCondition::Threshold {
                probe: "active_connections".to_string(),
                op: ComparisonOp::Ge,
                value: 180.0,
            },
            severity: Severity::Warning,
            action: Some(RemediationAction::ResetConnectionLimit { limit: 200 }),
        },
        Rule {
            id: "cm-cache-degraded".to_string(),
            name: "Content cache degraded".to_string(),
            applies_to: Some(BackendKind::ContentManager),
            required_probes: vec!["cache_hit_ratio".to_string()],
            condition: RuleCondition::Threshold {
                probe: "cache_hit_ratio".to_string(),
                op: ComparisonOp::Lt,
                value: 0.5,
            },
            severity: Severity::Warning,
            action: Some(RemediationAction::ClearCache),
        },
        Rule {
            id: "cm-store-bloat".to_string(),
            name: "Content store near capacity".to_string(),
            applies_to: Some(BackendKind::ContentManager),
            required_probes: vec!["store_used_percent".to_string()],
            condition: RuleCondition::Threshold {
                probe: "store_used_percent".to_string(),
                op: ComparisonOp::Ge,
                value: 90.0,
            },
            severity: Severity::Warning,
            action: Some(RemediationAction::CompactStore),
        },
        Rule {
            id: "se-index-corrupt".to_string(),
            name: "Index corruption detected".to_string(),
            applies_to: Some(BackendKind::SearchEngine),
            required_probes: vec!["index_status".to_string()],
            condition: RuleCondition::TextEquals {
                probe: "index_status".to_string(),
                expected: "corrupt".to_string(),
            },
            severity: Severity::Critical,
            action: Some(RemediationAction::RebuildIndex),
        },
        Rule {
            id: "se-index-lag".to_string(),
            name: "Index lagging behind content".to_string(),
            applies_to: Some(BackendKind::SearchEngine),
            required_probes: vec!["index_lag_seconds".to_string()],
            condition: RuleCondition::Threshold {
                probe: "index_lag_seconds".to_string(),
                op: ComparisonOp::Ge,
                value: 300.0,
            },
            severity: Severity::Warning,
            action: Some(RemediationAction::RebuildIndex),
        },
        Rule {
            id: "studio-publish-backlog".to_string(),
            name: "Publish queue backlog".to_string(),
            applies_to: Some(BackendKind::Studio),
            required_probes: vec!["publish_queue_depth".to_string()],
            condition: RuleCondition::Threshold {
                probe: "publish_queue_depth".to_string(),
                op: ComparisonOp::Ge,
                value: 100.0,
            },
            severity: Severity::Info,
            action: None,
        },
    ];

    RuleCatalog::new(rules, probes)
}
