//! # Configuration System
//!
//! Explicit, validated configuration for the diagnostic core. The whole
//! engine reads from a single immutable [`SentinelConfig`] constructed once
//! at startup and passed by reference into the orchestrator, pool, and
//! remediation engine; business logic never reads ambient global state.
//!
//! ## Architecture
//!
//! - **Single Source of Truth**: defaults → optional config file →
//!   `SENTINEL_`-prefixed environment variables, merged in that order
//! - **Environment Awareness**: development/test/production file overrides
//! - **Explicit Validation**: invalid values fail loading, never fall back
//!   silently
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sentinel_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let config = manager.config();
//! let ceiling = config.backends.content_manager.max_connections;
//! let budget = config.remediation.max_retries;
//! # Ok(())
//! # }
//! ```

pub mod loader;

use crate::connector::BackendKind;
use crate::error::{Result, SentinelError};
use crate::models::Severity;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use loader::ConfigManager;

/// Root configuration for the diagnostic core
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SentinelConfig {
    /// Per-backend-kind connection and probe settings
    pub backends: BackendsConfig,

    /// Connection pool behavior
    pub pool: PoolConfig,

    /// Remediation retry and enablement policy
    pub remediation: RemediationConfig,

    /// Scan orchestration limits
    pub scan: ScanConfig,

    /// Health monitor window sizing
    pub health: HealthConfig,

    /// Lifecycle event channel sizing
    pub events: EventConfig,
}

/// Settings for one backend kind
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendKindConfig {
    pub connect_timeout_ms: u64,
    pub probe_timeout_ms: u64,
    /// Maximum concurrent live connections for this kind
    pub max_connections: usize,
}

impl Default for BackendKindConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 15_000,
            probe_timeout_ms: 5_000,
            max_connections: 10,
        }
    }
}

impl BackendKindConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Per-kind backend settings with kind-appropriate defaults.
///
/// The content manager runs heavyweight requests and gets the longest
/// timeouts; the retrieval engine answers fastest and gets the shortest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendsConfig {
    pub content_manager: BackendKindConfig,
    pub search_engine: BackendKindConfig,
    pub studio: BackendKindConfig,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            content_manager: BackendKindConfig {
                connect_timeout_ms: 30_000,
                probe_timeout_ms: 10_000,
                max_connections: 10,
            },
            search_engine: BackendKindConfig {
                connect_timeout_ms: 15_000,
                probe_timeout_ms: 5_000,
                max_connections: 10,
            },
            studio: BackendKindConfig {
                connect_timeout_ms: 20_000,
                probe_timeout_ms: 8_000,
                max_connections: 10,
            },
        }
    }
}

impl BackendsConfig {
    pub fn for_kind(&self, kind: BackendKind) -> &BackendKindConfig {
        match kind {
            BackendKind::ContentManager => &self.content_manager,
            BackendKind::SearchEngine => &self.search_engine,
            BackendKind::Studio => &self.studio,
        }
    }
}

/// Connection pool behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// How long an acquire waits for a free slot before PoolExhausted
    pub acquire_timeout_ms: u64,

    /// Consecutive connection errors before a target is marked degraded
    pub degraded_threshold: u32,

    /// Base interval for the degraded-target exponential backoff
    pub backoff_base_ms: u64,

    /// Backoff cap expressed as a multiple of the base interval
    pub backoff_ceiling_multiplier: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            acquire_timeout_ms: 5_000,
            degraded_threshold: 3,
            backoff_base_ms: 1_000,
            backoff_ceiling_multiplier: 5,
        }
    }
}

impl PoolConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_ceiling(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms * u64::from(self.backoff_ceiling_multiplier))
    }
}

/// Auto-remediation enablement per severity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoRemediation {
    pub info: bool,
    pub warning: bool,
    pub critical: bool,
}

impl Default for AutoRemediation {
    fn default() -> Self {
        // Info issues are report-only by default
        Self {
            info: false,
            warning: true,
            critical: true,
        }
    }
}

impl AutoRemediation {
    pub fn is_enabled(&self, severity: Severity) -> bool {
        match severity {
            Severity::Info => self.info,
            Severity::Warning => self.warning,
            Severity::Critical => self.critical,
        }
    }
}

/// Remediation retry and backoff policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemediationConfig {
    /// Total action attempts per issue before it is marked failed
    pub max_retries: u32,

    /// Base interval for the between-attempt exponential backoff
    pub backoff_base_ms: u64,

    /// Upper bound on a single between-attempt backoff interval
    pub backoff_max_ms: u64,

    pub auto_remediate: AutoRemediation,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 8_000,
            auto_remediate: AutoRemediation::default(),
        }
    }
}

impl RemediationConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

/// Scan orchestration limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Wall-clock bound on one scan run; exceeding it forces Partial
    pub global_timeout_ms: u64,

    /// How many extra passes pool-contended targets get within one run
    pub max_deferred_passes: u32,

    /// How many finished runs the in-memory ledger retains
    pub run_history_limit: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            global_timeout_ms: 300_000,
            max_deferred_passes: 2,
            run_history_limit: 64,
        }
    }
}

impl ScanConfig {
    pub fn global_timeout(&self) -> Duration {
        Duration::from_millis(self.global_timeout_ms)
    }
}

/// Health monitor window sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Readings retained per target before FIFO eviction
    pub window_capacity: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            window_capacity: 120,
        }
    }
}

/// Lifecycle event channel sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    pub channel_capacity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1_000,
        }
    }
}

impl SentinelConfig {
    /// Validate invariants the engine depends on
    pub fn validate(&self) -> Result<()> {
        for kind in BackendKind::ALL {
            let backend = self.backends.for_kind(kind);
            if backend.max_connections == 0 {
                return Err(SentinelError::configuration(format!(
                    "backends.{kind}.max_connections must be at least 1"
                )));
            }
            if backend.probe_timeout_ms == 0 || backend.connect_timeout_ms == 0 {
                return Err(SentinelError::configuration(format!(
                    "backends.{kind} timeouts must be non-zero"
                )));
            }
        }
        if self.pool.degraded_threshold == 0 {
            return Err(SentinelError::configuration(
                "pool.degraded_threshold must be at least 1",
            ));
        }
        if self.pool.backoff_ceiling_multiplier == 0 {
            return Err(SentinelError::configuration(
                "pool.backoff_ceiling_multiplier must be at least 1",
            ));
        }
        if self.remediation.max_retries == 0 {
            return Err(SentinelError::configuration(
                "remediation.max_retries must be at least 1",
            ));
        }
        if self.remediation.backoff_max_ms < self.remediation.backoff_base_ms {
            return Err(SentinelError::configuration(
                "remediation.backoff_max_ms must be >= backoff_base_ms",
            ));
        }
        if self.health.window_capacity == 0 {
            return Err(SentinelError::configuration(
                "health.window_capacity must be at least 1",
            ));
        }
        if self.scan.run_history_limit == 0 {
            return Err(SentinelError::configuration(
                "scan.run_history_limit must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SentinelConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_per_kind_defaults_differ() {
        let config = SentinelConfig::default();
        assert_eq!(config.backends.content_manager.connect_timeout_ms, 30_000);
        assert_eq!(config.backends.search_engine.connect_timeout_ms, 15_000);
        assert_eq!(config.backends.studio.connect_timeout_ms, 20_000);
        for kind in BackendKind::ALL {
            assert_eq!(config.backends.for_kind(kind).max_connections, 10);
        }
    }

    #[test]
    fn test_auto_remediation_defaults() {
        let auto = AutoRemediation::default();
        assert!(!auto.is_enabled(Severity::Info));
        assert!(auto.is_enabled(Severity::Warning));
        assert!(auto.is_enabled(Severity::Critical));
    }

    #[test]
    fn test_backoff_ceiling_derivation() {
        let pool = PoolConfig::default();
        assert_eq!(pool.backoff_ceiling(), Duration::from_millis(5_000));
    }

    #[test]
    fn test_zero_ceiling_rejected() {
        let mut config = SentinelConfig::default();
        config.backends.search_engine.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_remediation_backoff_rejected() {
        let mut config = SentinelConfig::default();
        config.remediation.backoff_base_ms = 10_000;
        config.remediation.backoff_max_ms = 1_000;
        assert!(config.validate().is_err());
    }
}
