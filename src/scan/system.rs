//! # Diagnostic System
//!
//! Top-level wiring of the diagnostic core: connector, pool, remediation
//! engine, health monitor, orchestrator, and target registry assembled from
//! one configuration. This is the surface the calling layer (HTTP API,
//! dashboard backend, scheduler) talks to.

use super::orchestrator::ScanOrchestrator;
use crate::config::SentinelConfig;
use crate::connector::{BackendConnector, BackendKind, Connector};
use crate::error::{Result, SentinelError};
use crate::events::{DiagnosticEvent, EventPublisher};
use crate::health::{HealthMonitor, HealthSnapshot};
use crate::models::{Issue, ScanRun};
use crate::pool::{Clock, ConnectionPoolManager, SystemClock};
use crate::registry::TargetRegistry;
use crate::remediation::{IssueState, RemediationEngine};
use crate::rules::{builtin_catalog, RuleCatalog};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Which targets a scan covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSelector {
    All,
    ByKind(BackendKind),
    ByIds(Vec<Uuid>),
}

/// Assembled diagnostic core
pub struct DiagnosticSystem {
    config: Arc<SentinelConfig>,
    registry: Arc<TargetRegistry>,
    orchestrator: Arc<ScanOrchestrator>,
    remediation: Arc<RemediationEngine>,
    health: Arc<HealthMonitor>,
    publisher: EventPublisher,
    catalog: Arc<RuleCatalog>,
}

impl DiagnosticSystem {
    /// Build the system with the production connector stack and the
    /// built-in rule catalog.
    pub fn new(config: SentinelConfig) -> Result<Self> {
        let connector = Arc::new(BackendConnector::from_config(&config.backends)?);
        Self::with_connector(config, connector, Arc::new(SystemClock))
    }

    /// Build the system around an arbitrary connector and clock. Test
    /// harnesses inject mocks here; production callers use [`Self::new`].
    pub fn with_connector(
        config: SentinelConfig,
        connector: Arc<dyn Connector>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let publisher = EventPublisher::new(config.events.channel_capacity);
        let pool = Arc::new(ConnectionPoolManager::new(
            Arc::clone(&connector),
            Arc::clone(&config),
            clock,
        ));
        let remediation = Arc::new(RemediationEngine::new(
            Arc::clone(&connector),
            Arc::clone(&pool),
            Arc::clone(&config),
            publisher.clone(),
        ));
        let health = Arc::new(HealthMonitor::new(config.health.window_capacity));
        let orchestrator = Arc::new(ScanOrchestrator::new(
            connector,
            pool,
            Arc::clone(&remediation),
            Arc::clone(&health),
            publisher.clone(),
            Arc::clone(&config),
        ));

        Ok(Self {
            config,
            registry: Arc::new(TargetRegistry::new()),
            orchestrator,
            remediation,
            health,
            publisher,
            catalog: Arc::new(builtin_catalog()),
        })
    }

    /// Replace the rule catalog (catalogs are data, tuned per deployment)
    pub fn set_catalog(&mut self, catalog: RuleCatalog) {
        self.catalog = Arc::new(catalog);
    }

    /// Trigger a scan over the selected targets; returns the run id
    pub async fn trigger_scan(&self, selector: TargetSelector) -> Result<Uuid> {
        let targets = match selector {
            TargetSelector::All => self.registry.list().await,
            TargetSelector::ByKind(kind) => self.registry.by_kind(kind).await,
            TargetSelector::ByIds(ids) => {
                let mut targets = Vec::with_capacity(ids.len());
                for id in ids {
                    targets.push(self.registry.get(id).await?);
                }
                targets
            }
        };

        if targets.is_empty() {
            return Err(SentinelError::configuration(
                "scan requested over an empty target set",
            ));
        }

        Ok(self
            .orchestrator
            .start_scan(targets, Arc::clone(&self.catalog)))
    }

    /// Drive a scan to completion inline and return the sealed run
    pub async fn run_scan_to_completion(&self, selector: TargetSelector) -> Result<ScanRun> {
        let run_id = self.trigger_scan(selector).await?;
        loop {
            match self.orchestrator.scan_status(run_id) {
                Some(run) if run.status.is_finished() => return Ok(run),
                Some(_) => tokio::time::sleep(std::time::Duration::from_millis(25)).await,
                None => {
                    return Err(SentinelError::ScanNotFound {
                        scan_id: run_id.to_string(),
                    })
                }
            }
        }
    }

    /// Status and outcomes of a run
    pub fn scan_status(&self, run_id: Uuid) -> Result<ScanRun> {
        self.orchestrator
            .scan_status(run_id)
            .ok_or_else(|| SentinelError::ScanNotFound {
                scan_id: run_id.to_string(),
            })
    }

    /// Request cooperative cancellation of a running scan
    pub fn cancel_scan(&self, run_id: Uuid) -> bool {
        self.orchestrator.cancel_scan(run_id)
    }

    /// Current state of an issue
    pub fn issue(&self, issue_id: Uuid) -> Result<Issue> {
        self.remediation
            .issue(issue_id)
            .ok_or_else(|| SentinelError::IssueNotFound {
                issue_id: issue_id.to_string(),
            })
    }

    /// Operator acknowledgement of an issue
    pub fn acknowledge_issue(&self, issue_id: Uuid) -> Result<IssueState> {
        self.remediation.acknowledge(issue_id)
    }

    /// Current health window for one target
    pub fn health_snapshot(&self, target_id: Uuid) -> Option<HealthSnapshot> {
        self.health.snapshot(target_id)
    }

    /// Health windows for every tracked target
    pub fn health_snapshots(&self) -> Vec<HealthSnapshot> {
        self.health.snapshot_all()
    }

    /// Subscribe to the lifecycle event stream
    pub fn subscribe(&self) -> broadcast::Receiver<DiagnosticEvent> {
        self.publisher.subscribe()
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    pub fn config(&self) -> &SentinelConfig {
        &self.config
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }
}
