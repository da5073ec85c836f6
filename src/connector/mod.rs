//! # Connector Framework
//!
//! Uniform capability surface over the heterogeneous managed backends.
//! Each backend kind ships its own adapter speaking that backend's
//! administrative API; callers depend only on the [`Connector`] capability
//! trait, never on a concrete adapter. [`BackendConnector`] bundles the
//! three adapters and dispatches on the target's kind with an exhaustive
//! enum match, no string or type sniffing.
//!
//! `apply_action` mutates remote backend state and must only be invoked
//! through the remediation engine's idempotency guard.

pub mod content_manager;
pub mod search_engine;
pub mod studio;
pub mod types;

pub use content_manager::ContentManagerConnector;
pub use search_engine::SearchEngineConnector;
pub use studio::StudioConnector;
pub use types::{
    ActionOutcome, ActionRequest, BackendKind, BackendTarget, Connection, ProbeCategory,
    ProbeResult, ProbeSpec, ProbeValue, RemediationAction,
};

use crate::config::BackendsConfig;
use crate::error::{Result, SentinelError};
use async_trait::async_trait;

/// Capability surface every backend adapter provides
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish an authenticated session against the target
    async fn connect(&self, target: &BackendTarget) -> Result<Connection>;

    /// Run one read-only diagnostic query over an established connection
    async fn probe(&self, connection: &Connection, spec: &ProbeSpec) -> Result<ProbeResult>;

    /// Dispatch a corrective action. Mutates remote state; the request's
    /// idempotency key lets the backend deduplicate repeat applications.
    async fn apply_action(
        &self,
        connection: &Connection,
        request: &ActionRequest,
    ) -> Result<ActionOutcome>;
}

/// All three concrete adapters behind one dispatching connector
pub struct BackendConnector {
    content_manager: ContentManagerConnector,
    search_engine: SearchEngineConnector,
    studio: StudioConnector,
}

impl BackendConnector {
    pub fn from_config(config: &BackendsConfig) -> Result<Self> {
        Ok(Self {
            content_manager: ContentManagerConnector::new(&config.content_manager)?,
            search_engine: SearchEngineConnector::new(&config.search_engine)?,
            studio: StudioConnector::new(&config.studio)?,
        })
    }
}

#[async_trait]
impl Connector for BackendConnector {
    async fn connect(&self, target: &BackendTarget) -> Result<Connection> {
        match target.kind {
            BackendKind::ContentManager => self.content_manager.connect(target).await,
            BackendKind::SearchEngine => self.search_engine.connect(target).await,
            BackendKind::Studio => self.studio.connect(target).await,
        }
    }

    async fn probe(&self, connection: &Connection, spec: &ProbeSpec) -> Result<ProbeResult> {
        match connection.kind {
            BackendKind::ContentManager => self.content_manager.probe(connection, spec).await,
            BackendKind::SearchEngine => self.search_engine.probe(connection, spec).await,
            BackendKind::Studio => self.studio.probe(connection, spec).await,
        }
    }

    async fn apply_action(
        &self,
        connection: &Connection,
        request: &ActionRequest,
    ) -> Result<ActionOutcome> {
        match connection.kind {
            BackendKind::ContentManager => {
                self.content_manager.apply_action(connection, request).await
            }
            BackendKind::SearchEngine => self.search_engine.apply_action(connection, request).await,
            BackendKind::Studio => self.studio.apply_action(connection, request).await,
        }
    }
}

/// Parse an admin-API `value` field into a typed probe value
pub(crate) fn probe_value_from_json(value: &serde_json::Value) -> Option<ProbeValue> {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(ProbeValue::Integer(i))
            } else {
                n.as_f64().map(ProbeValue::Float)
            }
        }
        serde_json::Value::String(s) => Some(ProbeValue::Text(s.clone())),
        serde_json::Value::Bool(b) => Some(ProbeValue::Bool(*b)),
        _ => None,
    }
}

/// Map a transport error from a connect attempt
pub(crate) fn classify_connect_error(target: &BackendTarget, err: reqwest::Error) -> SentinelError {
    SentinelError::connection(&target.name, err.to_string())
}

/// Map a transport error from a probe round-trip
pub(crate) fn classify_probe_error(
    probe: &str,
    target_name: &str,
    timeout: std::time::Duration,
    err: reqwest::Error,
) -> SentinelError {
    if err.is_timeout() {
        SentinelError::probe_timeout(probe, target_name, timeout)
    } else if err.is_connect() {
        SentinelError::connection(target_name, err.to_string())
    } else {
        SentinelError::probe(probe, target_name, err.to_string())
    }
}
