#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Sentinel Core
//!
//! High-performance Rust core for diagnostic scanning and auto-remediation
//! of managed content deployments.
//!
//! ## Overview
//!
//! Sentinel Core is the scan-and-remediation engine behind the deployment
//! diagnostics platform. It probes a family of managed backends (the
//! primary content manager, the retrieval/indexing engine, and the studio
//! service), evaluates the results against a diagnostic rule catalog, and
//! drives idempotent corrective actions through a bounded, degradation-aware
//! connection pool.
//!
//! ## Architecture
//!
//! The core follows a **capability-connector architecture**: every backend
//! kind implements the same connector surface (connect, probe, apply
//! action), and the orchestration layers depend only on that surface. The
//! connection pool's per-kind ceiling is the single point of backpressure
//! for every concurrent scan unit.
//!
//! ## Module Organization
//!
//! - [`connector`] - Capability trait and per-backend adapters
//! - [`pool`] - Bounded connection pool with degraded-target backoff
//! - [`rules`] - Rule catalog and deterministic evaluation engine
//! - [`remediation`] - Issue state machine and auto-fix engine
//! - [`scan`] - Scan orchestrator and assembled diagnostic system
//! - [`health`] - Rolling per-target metric windows
//! - [`models`] - Issues, scan runs, and their lifecycle data
//! - [`registry`] - Backend target registry
//! - [`events`] - Lifecycle event stream for external consumers
//! - [`config`] - Validated, layered configuration
//! - [`error`] - Structured error taxonomy
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sentinel_core::config::SentinelConfig;
//! use sentinel_core::connector::{BackendKind, BackendTarget};
//! use sentinel_core::scan::{DiagnosticSystem, TargetSelector};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let system = DiagnosticSystem::new(SentinelConfig::default())?;
//!
//! system.registry().register(BackendTarget::new(
//!     BackendKind::ContentManager,
//!     "cm-prod-01",
//!     "https://cm.internal:8080",
//!     "vault://cm-prod-01/diagnostics",
//! )).await;
//!
//! let run_id = system.trigger_scan(TargetSelector::All).await?;
//! let run = system.scan_status(run_id)?;
//! println!("scan {} is {}", run.id, run.status);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connector;
pub mod error;
pub mod events;
pub mod health;
pub mod logging;
pub mod models;
pub mod pool;
pub mod registry;
pub mod remediation;
pub mod rules;
pub mod scan;

pub use config::{ConfigManager, SentinelConfig};
pub use connector::{
    ActionOutcome, ActionRequest, BackendConnector, BackendKind, BackendTarget, Connection,
    Connector, ProbeResult, ProbeSpec, ProbeValue, RemediationAction,
};
pub use error::{Result, SentinelError};
pub use events::{DiagnosticEvent, EventPublisher};
pub use health::{HealthMonitor, HealthSnapshot, MetricReading};
pub use models::{FailureKind, Issue, ScanRun, ScanStatus, Severity, TargetOutcome};
pub use pool::{ConnectionPoolManager, PoolStats};
pub use registry::TargetRegistry;
pub use remediation::{IssueState, RemediationEngine};
pub use rules::{builtin_catalog, Rule, RuleCatalog, RuleEngine};
pub use scan::{DiagnosticSystem, ScanOrchestrator, TargetSelector};
