//! # Connector Types
//!
//! Core data structures shared by every backend adapter: target identity,
//! live connections, probe specifications and results, and the declarative
//! remediation actions dispatched through a connector.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// The three managed-system backend kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Primary content management system
    ContentManager,
    /// Retrieval / indexing engine
    SearchEngine,
    /// Studio / administration service
    Studio,
}

impl BackendKind {
    /// All known backend kinds, in canonical order
    pub const ALL: [BackendKind; 3] = [
        BackendKind::ContentManager,
        BackendKind::SearchEngine,
        BackendKind::Studio,
    ];
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContentManager => write!(f, "content_manager"),
            Self::SearchEngine => write!(f, "search_engine"),
            Self::Studio => write!(f, "studio"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "content_manager" => Ok(Self::ContentManager),
            "search_engine" => Ok(Self::SearchEngine),
            "studio" => Ok(Self::Studio),
            _ => Err(format!("Invalid backend kind: {s}")),
        }
    }
}

/// One managed-system instance under diagnosis.
///
/// Immutable during a scan cycle; owned by the connector registry. The
/// credentials reference is an opaque handle resolved by the secret store of
/// the deployment, never a raw secret, and is excluded from Debug output.
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendTarget {
    pub id: Uuid,
    pub kind: BackendKind,
    pub name: String,
    /// Base URL of the backend's administrative API
    pub base_url: String,
    /// Opaque reference into the deployment's secret store
    pub credentials_ref: String,
    /// Per-target probe timeout override; falls back to the per-kind default
    pub timeout_override: Option<Duration>,
}

impl BackendTarget {
    pub fn new(
        kind: BackendKind,
        name: impl Into<String>,
        base_url: impl Into<String>,
        credentials_ref: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            name: name.into(),
            base_url: base_url.into(),
            credentials_ref: credentials_ref.into(),
            timeout_override: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_override = Some(timeout);
        self
    }
}

impl fmt::Debug for BackendTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendTarget")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("credentials_ref", &"[redacted]")
            .field("timeout_override", &self.timeout_override)
            .finish()
    }
}

/// A live, authenticated session against one backend target.
///
/// Owned exclusively by the connection pool; checked out to exactly one
/// in-flight probe at a time. A connection that reports an authentication
/// failure is discarded by the pool rather than reused.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: Uuid,
    pub target_id: Uuid,
    pub kind: BackendKind,
    /// Resolved admin-API base URL of the owning target
    pub base_url: String,
    pub session_token: String,
    pub established_at: DateTime<Utc>,
    /// Per-target probe timeout carried over from the target, if any
    pub timeout_override: Option<Duration>,
    auth_failed: bool,
}

impl Connection {
    pub fn new(target: &BackendTarget, session_token: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            target_id: target.id,
            kind: target.kind,
            base_url: target.base_url.clone(),
            session_token: session_token.into(),
            established_at: Utc::now(),
            timeout_override: target.timeout_override,
            auth_failed: false,
        }
    }

    /// Mark this connection as invalid after a backend-reported auth failure
    pub fn mark_auth_failed(&mut self) {
        self.auth_failed = true;
    }

    pub fn is_auth_failed(&self) -> bool {
        self.auth_failed
    }

    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.established_at
    }
}

/// Endpoint category a probe reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeCategory {
    /// Liveness / responsiveness of the service itself
    Health,
    /// Numeric resource metrics (CPU, memory, connections)
    Resource,
    /// Backend-specific subsystem state (index lag, cache, sessions)
    Subsystem,
}

/// Specification of one read-only diagnostic query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSpec {
    pub name: String,
    pub category: ProbeCategory,
    /// Metric-tagged results are also ingested by the health monitor
    pub metric: bool,
}

impl ProbeSpec {
    pub fn new(name: impl Into<String>, category: ProbeCategory) -> Self {
        Self {
            name: name.into(),
            category,
            metric: false,
        }
    }

    pub fn metric(name: impl Into<String>, category: ProbeCategory) -> Self {
        Self {
            name: name.into(),
            category,
            metric: true,
        }
    }
}

/// Typed value carried by a probe result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ProbeValue {
    Float(f64),
    Integer(i64),
    Text(String),
    Bool(bool),
}

impl ProbeValue {
    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            Self::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ProbeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// Raw structured output of one diagnostic probe.
///
/// Immutable once produced; consumed by the rule engine and discarded unless
/// an issue is derived from it or it is metric-tagged for the health monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub probe: String,
    pub target_id: Uuid,
    pub value: ProbeValue,
    pub recorded_at: DateTime<Utc>,
    pub latency: Duration,
}

impl ProbeResult {
    pub fn new(
        probe: impl Into<String>,
        target_id: Uuid,
        value: ProbeValue,
        latency: Duration,
    ) -> Self {
        Self {
            probe: probe.into(),
            target_id,
            value,
            recorded_at: Utc::now(),
            latency,
        }
    }
}

/// Declarative corrective step bound to a rule.
///
/// Actions are idempotent on the backend side: applying one twice to an
/// already-fixed condition is a no-op, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemediationAction {
    /// Restart the backend service process
    RestartService,
    /// Drop the backend's content / query cache
    ClearCache,
    /// Reset the backend's connection limit to the given ceiling
    ResetConnectionLimit { limit: u32 },
    /// Trigger a full index rebuild on the retrieval engine
    RebuildIndex,
    /// Compact the content store to reclaim space
    CompactStore,
}

impl RemediationAction {
    /// Stable identifier used in logs and idempotency bookkeeping
    pub fn name(&self) -> &'static str {
        match self {
            Self::RestartService => "restart_service",
            Self::ClearCache => "clear_cache",
            Self::ResetConnectionLimit { .. } => "reset_connection_limit",
            Self::RebuildIndex => "rebuild_index",
            Self::CompactStore => "compact_store",
        }
    }
}

impl fmt::Display for RemediationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// An action dispatch carrying its idempotency key.
///
/// The key is the issue id: every retry of the same issue presents the same
/// key, so the backend can deduplicate the mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action: RemediationAction,
    pub idempotency_key: Uuid,
}

impl ActionRequest {
    pub fn new(action: RemediationAction, idempotency_key: Uuid) -> Self {
        Self {
            action,
            idempotency_key,
        }
    }
}

/// Backend response to an action dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// The backend applied the corrective step
    Applied,
    /// The backend had already applied this idempotency key
    AlreadyApplied,
    /// The backend refused the action
    Rejected { reason: String },
}

impl ActionOutcome {
    /// Whether the action landed (either now or on a previous attempt)
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Applied | Self::AlreadyApplied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_string_round_trip() {
        assert_eq!(BackendKind::ContentManager.to_string(), "content_manager");
        assert_eq!(
            "search_engine".parse::<BackendKind>().unwrap(),
            BackendKind::SearchEngine
        );
        assert!("solr".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_backend_kind_serde() {
        let json = serde_json::to_string(&BackendKind::Studio).unwrap();
        assert_eq!(json, "\"studio\"");
        let parsed: BackendKind = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, BackendKind::Studio);
    }

    #[test]
    fn test_target_debug_redacts_credentials() {
        let target = BackendTarget::new(
            BackendKind::ContentManager,
            "cm-prod-01",
            "https://cm.internal:8080",
            "vault://cm-prod-01/admin",
        );
        let debug = format!("{target:?}");
        assert!(debug.contains("[redacted]"));
        assert!(!debug.contains("vault://"));
    }

    #[test]
    fn test_connection_auth_failure_flag() {
        let target = BackendTarget::new(
            BackendKind::Studio,
            "studio-01",
            "https://studio.internal",
            "vault://studio",
        );
        let mut conn = Connection::new(&target, "session-abc");
        assert!(!conn.is_auth_failed());
        conn.mark_auth_failed();
        assert!(conn.is_auth_failed());
    }

    #[test]
    fn test_probe_value_numeric_view() {
        assert_eq!(ProbeValue::Float(82.5).as_f64(), Some(82.5));
        assert_eq!(ProbeValue::Integer(12).as_f64(), Some(12.0));
        assert_eq!(ProbeValue::Bool(true).as_f64(), Some(1.0));
        assert_eq!(ProbeValue::Text("green".to_string()).as_f64(), None);
    }

    #[test]
    fn test_action_outcome_success() {
        assert!(ActionOutcome::Applied.is_success());
        assert!(ActionOutcome::AlreadyApplied.is_success());
        assert!(!ActionOutcome::Rejected {
            reason: "unsupported".to_string()
        }
        .is_success());
    }
}
