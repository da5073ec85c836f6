//! Shared test support: a scriptable mock connector and config/target
//! builders used across the integration suites.

#![allow(dead_code)]

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use sentinel_core::config::SentinelConfig;
use sentinel_core::connector::{
    ActionOutcome, ActionRequest, BackendKind, BackendTarget, Connection, Connector, ProbeResult,
    ProbeSpec, ProbeValue,
};
use sentinel_core::error::{Result, SentinelError};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// How a scripted target responds to remediation actions
#[derive(Clone)]
pub enum ActionMode {
    /// First application mutates the listed probe values (the "fix")
    FixProbes(HashMap<String, ProbeValue>),
    /// Applies cleanly but changes nothing, so verification keeps failing
    AppliesNoEffect,
    /// Every dispatch errors
    AlwaysErrors,
    /// Backend refuses the action
    Rejects(String),
}

/// Scripted behavior for one backend target
#[derive(Clone)]
pub struct TargetScript {
    pub connect_fails: bool,
    pub connect_delay: Option<Duration>,
    /// Probes that always time out
    pub timeout_probes: HashSet<String>,
    /// Current probe values by probe name
    pub values: HashMap<String, ProbeValue>,
    pub action_mode: ActionMode,
}

impl TargetScript {
    pub fn healthy(kind: BackendKind) -> Self {
        Self {
            connect_fails: false,
            connect_delay: None,
            timeout_probes: HashSet::new(),
            values: healthy_values(kind),
            action_mode: ActionMode::AppliesNoEffect,
        }
    }

    /// Every probe times out
    pub fn unreachable_probes(kind: BackendKind) -> Self {
        let mut script = Self::healthy(kind);
        script.timeout_probes = script.values.keys().cloned().collect();
        script
    }

    pub fn with_value(mut self, probe: &str, value: ProbeValue) -> Self {
        self.values.insert(probe.to_string(), value);
        self
    }

    pub fn with_action_mode(mut self, mode: ActionMode) -> Self {
        self.action_mode = mode;
        self
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }
}

/// Baseline healthy probe values matching the built-in catalog's probe set
pub fn healthy_values(kind: BackendKind) -> HashMap<String, ProbeValue> {
    let mut values = HashMap::from([
        ("cpu_usage_percent".to_string(), ProbeValue::Float(20.0)),
        ("memory_used_percent".to_string(), ProbeValue::Float(40.0)),
        ("active_connections".to_string(), ProbeValue::Integer(10)),
        ("service_responsive".to_string(), ProbeValue::Bool(true)),
    ]);
    match kind {
        BackendKind::ContentManager => {
            values.insert("cache_hit_ratio".to_string(), ProbeValue::Float(0.9));
            values.insert(
                "repository_status".to_string(),
                ProbeValue::Text("ready".to_string()),
            );
            values.insert("store_used_percent".to_string(), ProbeValue::Float(30.0));
        }
        BackendKind::SearchEngine => {
            values.insert("index_lag_seconds".to_string(), ProbeValue::Float(10.0));
            values.insert(
                "index_status".to_string(),
                ProbeValue::Text("green".to_string()),
            );
        }
        BackendKind::Studio => {
            values.insert("publish_queue_depth".to_string(), ProbeValue::Integer(5));
        }
    }
    values
}

/// Scriptable connector double that counts connects and mutating actions.
///
/// Mutations are keyed by (idempotency key, action name): a repeat dispatch
/// with a key the backend has already applied reports `AlreadyApplied` and
/// performs no new side effect, mirroring the idempotency contract real
/// backends implement.
pub struct MockConnector {
    scripts: DashMap<Uuid, TargetScript>,
    connect_calls: DashMap<Uuid, usize>,
    applied_keys: Mutex<HashSet<(Uuid, String)>>,
    action_calls: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            scripts: DashMap::new(),
            connect_calls: DashMap::new(),
            applied_keys: Mutex::new(HashSet::new()),
            action_calls: AtomicUsize::new(0),
        })
    }

    pub fn script_target(&self, target: &BackendTarget, script: TargetScript) {
        self.scripts.insert(target.id, script);
    }

    pub fn connect_calls(&self, target_id: Uuid) -> usize {
        self.connect_calls.get(&target_id).map(|c| *c).unwrap_or(0)
    }

    /// Total action dispatches, including deduplicated ones
    pub fn action_calls(&self) -> usize {
        self.action_calls.load(Ordering::SeqCst)
    }

    /// Distinct remote mutations actually performed
    pub fn distinct_mutations(&self) -> usize {
        self.applied_keys.lock().len()
    }

    fn script(&self, target_id: Uuid) -> Result<TargetScript> {
        self.scripts
            .get(&target_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| SentinelError::TargetNotFound {
                target_id: target_id.to_string(),
            })
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, target: &BackendTarget) -> Result<Connection> {
        *self.connect_calls.entry(target.id).or_insert(0) += 1;
        let script = self.script(target.id)?;
        if let Some(delay) = script.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if script.connect_fails {
            return Err(SentinelError::connection(&target.name, "connection refused"));
        }
        Ok(Connection::new(target, format!("mock-session-{}", target.id)))
    }

    async fn probe(&self, connection: &Connection, spec: &ProbeSpec) -> Result<ProbeResult> {
        let script = self.script(connection.target_id)?;
        if script.timeout_probes.contains(&spec.name) {
            return Err(SentinelError::probe_timeout(
                &spec.name,
                connection.target_id.to_string(),
                Duration::from_millis(50),
            ));
        }
        match script.values.get(&spec.name) {
            Some(value) => Ok(ProbeResult::new(
                &spec.name,
                connection.target_id,
                value.clone(),
                Duration::from_millis(2),
            )),
            None => Err(SentinelError::probe(
                &spec.name,
                connection.target_id.to_string(),
                "probe not scripted",
            )),
        }
    }

    async fn apply_action(
        &self,
        connection: &Connection,
        request: &ActionRequest,
    ) -> Result<ActionOutcome> {
        self.action_calls.fetch_add(1, Ordering::SeqCst);
        let mode = self.script(connection.target_id)?.action_mode;

        match mode {
            ActionMode::AlwaysErrors => Err(SentinelError::action(
                request.action.name(),
                connection.target_id.to_string(),
                "backend error",
            )),
            ActionMode::Rejects(reason) => Ok(ActionOutcome::Rejected { reason }),
            ActionMode::AppliesNoEffect | ActionMode::FixProbes(_) => {
                let key = (request.idempotency_key, request.action.name().to_string());
                let newly_applied = self.applied_keys.lock().insert(key);
                if !newly_applied {
                    return Ok(ActionOutcome::AlreadyApplied);
                }
                if let ActionMode::FixProbes(fixes) = mode {
                    if let Some(mut script) = self.scripts.get_mut(&connection.target_id) {
                        for (probe, value) in fixes {
                            script.values.insert(probe, value);
                        }
                    }
                }
                Ok(ActionOutcome::Applied)
            }
        }
    }
}

/// Config tuned for fast tests
pub fn fast_config() -> SentinelConfig {
    let mut config = SentinelConfig::default();
    config.pool.acquire_timeout_ms = 200;
    config.remediation.backoff_base_ms = 10;
    config.remediation.backoff_max_ms = 40;
    config.scan.global_timeout_ms = 10_000;
    config
}

pub fn target(kind: BackendKind, name: &str) -> BackendTarget {
    BackendTarget::new(
        kind,
        name,
        format!("https://{name}.internal"),
        format!("vault://{name}/diagnostics"),
    )
}
