//! # Connection Pool Manager
//!
//! Bounds concurrent live connections per backend kind and amortizes
//! connection setup through an idle cache. The per-kind semaphore is the
//! single point of backpressure for the whole scan pipeline.
//!
//! Targets accumulate consecutive connection failures; at the configured
//! threshold a target is marked degraded and further acquire attempts are
//! refused until an exponentially backed-off deadline, measured against the
//! injected clock.

use super::backoff::BackoffPolicy;
use super::clock::Clock;
use crate::config::SentinelConfig;
use crate::connector::{BackendKind, BackendTarget, Connection, Connector};
use crate::error::{Result, SentinelError};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A checked-out connection holding its concurrency slot.
///
/// The slot is freed when the guard is released back to the pool (or
/// dropped); the connection itself is only re-pooled through
/// [`ConnectionPoolManager::release`].
pub struct PooledConnection {
    connection: Connection,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Flag the session as rejected by the backend; the pool will discard
    /// it instead of reusing it.
    pub fn mark_auth_failed(&mut self) {
        self.connection.mark_auth_failed();
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct TargetHealth {
    consecutive_failures: u32,
    degraded_until: Option<Instant>,
}

/// Point-in-time pool counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub acquires: usize,
    pub releases: usize,
    pub timeouts: usize,
    pub discarded: usize,
    pub degraded_targets: usize,
}

/// Bounded, degradation-aware connection pool
pub struct ConnectionPoolManager {
    connector: Arc<dyn Connector>,
    config: Arc<SentinelConfig>,
    clock: Arc<dyn Clock>,
    backoff: BackoffPolicy,
    semaphores: HashMap<BackendKind, Arc<Semaphore>>,
    idle: DashMap<Uuid, Vec<Connection>>,
    target_health: DashMap<Uuid, TargetHealth>,
    acquire_count: AtomicUsize,
    release_count: AtomicUsize,
    timeout_count: AtomicUsize,
    discard_count: AtomicUsize,
}

impl ConnectionPoolManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        config: Arc<SentinelConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let semaphores = BackendKind::ALL
            .into_iter()
            .map(|kind| {
                let ceiling = config.backends.for_kind(kind).max_connections;
                (kind, Arc::new(Semaphore::new(ceiling)))
            })
            .collect();

        let backoff = BackoffPolicy::new(config.pool.backoff_base(), config.pool.backoff_ceiling());

        info!(
            acquire_timeout_ms = config.pool.acquire_timeout_ms,
            degraded_threshold = config.pool.degraded_threshold,
            "🛡️ Connection pool initialized"
        );

        Self {
            connector,
            config,
            clock,
            backoff,
            semaphores,
            idle: DashMap::new(),
            target_health: DashMap::new(),
            acquire_count: AtomicUsize::new(0),
            release_count: AtomicUsize::new(0),
            timeout_count: AtomicUsize::new(0),
            discard_count: AtomicUsize::new(0),
        }
    }

    /// Check out a connection to the target, establishing one if no idle
    /// session exists. Fails with `PoolExhausted` when no slot frees up
    /// within the acquire timeout, and with a connection error while the
    /// target is inside its degraded-backoff window.
    pub async fn acquire(&self, target: &BackendTarget) -> Result<PooledConnection> {
        self.check_degraded_gate(target)?;

        let semaphore = self
            .semaphores
            .get(&target.kind)
            .expect("semaphore exists for every backend kind")
            .clone();

        let acquire_timeout = self.config.pool.acquire_timeout();
        let permit = match tokio::time::timeout(acquire_timeout, semaphore.acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_closed)) => {
                return Err(SentinelError::connection(
                    &target.name,
                    "connection pool is shut down",
                ))
            }
            Err(_elapsed) => {
                self.timeout_count.fetch_add(1, Ordering::SeqCst);
                warn!(
                    target = %target.name,
                    kind = %target.kind,
                    waited_ms = acquire_timeout.as_millis() as u64,
                    "🔴 Pool exhausted"
                );
                return Err(SentinelError::PoolExhausted {
                    kind: target.kind.to_string(),
                    waited_ms: acquire_timeout.as_millis() as u64,
                });
            }
        };

        self.acquire_count.fetch_add(1, Ordering::SeqCst);

        // Reuse an idle session for this target when one exists
        if let Some(connection) = self.pop_idle(target.id) {
            debug!(target = %target.name, connection_id = %connection.id, "Reusing idle connection");
            return Ok(PooledConnection {
                connection,
                _permit: permit,
            });
        }

        match self.connector.connect(target).await {
            Ok(connection) => {
                self.clear_degradation(target.id);
                debug!(
                    target = %target.name,
                    connection_id = %connection.id,
                    "🟢 Connection established"
                );
                Ok(PooledConnection {
                    connection,
                    _permit: permit,
                })
            }
            Err(err) => {
                self.record_connection_failure(target);
                Err(err)
            }
        }
    }

    /// Return a checked-out connection. Auth-failed sessions are discarded
    /// and re-established on the next acquire; healthy ones go back to the
    /// idle cache. The concurrency slot is freed either way.
    pub fn release(&self, pooled: PooledConnection) {
        self.release_count.fetch_add(1, Ordering::SeqCst);

        let PooledConnection { connection, _permit } = pooled;
        if connection.is_auth_failed() {
            self.discard_count.fetch_add(1, Ordering::SeqCst);
            warn!(
                target_id = %connection.target_id,
                connection_id = %connection.id,
                "Discarding auth-failed connection"
            );
            return;
        }

        self.idle.entry(connection.target_id).or_default().push(connection);
    }

    /// Drop all idle sessions for a target (e.g. after it was deregistered)
    pub fn evict_target(&self, target_id: Uuid) {
        self.idle.remove(&target_id);
        self.target_health.remove(&target_id);
    }

    pub fn stats(&self) -> PoolStats {
        let now = self.clock.now();
        let degraded_targets = self
            .target_health
            .iter()
            .filter(|entry| entry.degraded_until.is_some_and(|until| until > now))
            .count();

        PoolStats {
            acquires: self.acquire_count.load(Ordering::SeqCst),
            releases: self.release_count.load(Ordering::SeqCst),
            timeouts: self.timeout_count.load(Ordering::SeqCst),
            discarded: self.discard_count.load(Ordering::SeqCst),
            degraded_targets,
        }
    }

    /// Live permits available for a backend kind
    pub fn available_slots(&self, kind: BackendKind) -> usize {
        self.semaphores
            .get(&kind)
            .map(|s| s.available_permits())
            .unwrap_or(0)
    }

    fn check_degraded_gate(&self, target: &BackendTarget) -> Result<()> {
        let Some(health) = self.target_health.get(&target.id) else {
            return Ok(());
        };
        let Some(until) = health.degraded_until else {
            return Ok(());
        };
        let now = self.clock.now();
        if until > now {
            let remaining = until - now;
            return Err(SentinelError::connection(
                &target.name,
                format!(
                    "target degraded after {} consecutive failures, retry in {}ms",
                    health.consecutive_failures,
                    remaining.as_millis()
                ),
            ));
        }
        Ok(())
    }

    fn record_connection_failure(&self, target: &BackendTarget) {
        let threshold = self.config.pool.degraded_threshold;
        let mut health = self.target_health.entry(target.id).or_default();
        health.consecutive_failures += 1;

        if health.consecutive_failures >= threshold {
            // First gated attempt waits the base interval, doubling after
            let attempt = health.consecutive_failures - threshold + 1;
            let delay = self.backoff.delay_for_attempt(attempt);
            health.degraded_until = Some(self.clock.now() + delay);
            warn!(
                target = %target.name,
                consecutive_failures = health.consecutive_failures,
                backoff_ms = delay.as_millis() as u64,
                "🔴 Target degraded"
            );
        }
    }

    fn clear_degradation(&self, target_id: Uuid) {
        if let Some(mut health) = self.target_health.get_mut(&target_id) {
            if health.consecutive_failures > 0 {
                debug!(target_id = %target_id, "🟢 Target recovered, failure streak reset");
            }
            health.consecutive_failures = 0;
            health.degraded_until = None;
        }
    }

    fn pop_idle(&self, target_id: Uuid) -> Option<Connection> {
        self.idle.get_mut(&target_id).and_then(|mut idle| idle.pop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SentinelConfig;
    use crate::connector::{
        ActionOutcome, ActionRequest, ProbeResult, ProbeSpec, ProbeValue,
    };
    use crate::pool::clock::ManualClock;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    /// Connector stub that fails the first `failures` connect attempts
    struct FlakyConnector {
        attempts: AtomicU32,
        failures: u32,
    }

    impl FlakyConnector {
        fn failing(failures: u32) -> Self {
            Self {
                attempts: AtomicU32::new(0),
                failures,
            }
        }

        fn connect_attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Connector for FlakyConnector {
        async fn connect(&self, target: &BackendTarget) -> Result<Connection> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= self.failures {
                Err(SentinelError::connection(&target.name, "refused"))
            } else {
                Ok(Connection::new(target, format!("session-{attempt}")))
            }
        }

        async fn probe(&self, connection: &Connection, spec: &ProbeSpec) -> Result<ProbeResult> {
            Ok(ProbeResult::new(
                &spec.name,
                connection.target_id,
                ProbeValue::Float(1.0),
                Duration::from_millis(1),
            ))
        }

        async fn apply_action(
            &self,
            _connection: &Connection,
            _request: &ActionRequest,
        ) -> Result<ActionOutcome> {
            Ok(ActionOutcome::Applied)
        }
    }

    fn test_config() -> Arc<SentinelConfig> {
        let mut config = SentinelConfig::default();
        config.pool.acquire_timeout_ms = 100;
        config.pool.degraded_threshold = 3;
        config.pool.backoff_base_ms = 1_000;
        config.pool.backoff_ceiling_multiplier = 5;
        Arc::new(config)
    }

    fn test_target() -> BackendTarget {
        BackendTarget::new(
            BackendKind::ContentManager,
            "cm-test",
            "https://cm.test:8080",
            "vault://cm-test",
        )
    }

    #[tokio::test]
    async fn test_idle_connection_reused_after_release() {
        let connector = Arc::new(FlakyConnector::failing(0));
        let clock = ManualClock::new();
        let pool = ConnectionPoolManager::new(connector.clone(), test_config(), clock);
        let target = test_target();

        let pooled = pool.acquire(&target).await.unwrap();
        pool.release(pooled);
        let _again = pool.acquire(&target).await.unwrap();

        assert_eq!(connector.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn test_auth_failed_connection_discarded() {
        let connector = Arc::new(FlakyConnector::failing(0));
        let clock = ManualClock::new();
        let pool = ConnectionPoolManager::new(connector.clone(), test_config(), clock);
        let target = test_target();

        let mut pooled = pool.acquire(&target).await.unwrap();
        pooled.mark_auth_failed();
        pool.release(pooled);

        let _fresh = pool.acquire(&target).await.unwrap();
        assert_eq!(connector.connect_attempts(), 2);
        assert_eq!(pool.stats().discarded, 1);
    }

    #[tokio::test]
    async fn test_degraded_gate_refuses_without_connecting() {
        let connector = Arc::new(FlakyConnector::failing(u32::MAX));
        let clock = ManualClock::new();
        let pool = ConnectionPoolManager::new(connector.clone(), test_config(), clock.clone());
        let target = test_target();

        for _ in 0..3 {
            assert!(pool.acquire(&target).await.is_err());
        }
        assert_eq!(connector.connect_attempts(), 3);
        assert_eq!(pool.stats().degraded_targets, 1);

        // Gated: the refusal must not consume a connect attempt
        assert!(pool.acquire(&target).await.is_err());
        assert_eq!(connector.connect_attempts(), 3);

        // Past the backoff deadline the pool tries again
        clock.advance(Duration::from_millis(1_100));
        assert!(pool.acquire(&target).await.is_err());
        assert_eq!(connector.connect_attempts(), 4);
    }

    #[tokio::test]
    async fn test_degraded_backoff_doubles_up_to_ceiling() {
        let connector = Arc::new(FlakyConnector::failing(u32::MAX));
        let clock = ManualClock::new();
        let pool = ConnectionPoolManager::new(connector.clone(), test_config(), clock.clone());
        let target = test_target();

        for _ in 0..3 {
            let _ = pool.acquire(&target).await;
        }
        // Second gated window: 2s
        clock.advance(Duration::from_millis(1_100));
        let _ = pool.acquire(&target).await;
        assert_eq!(connector.connect_attempts(), 4);

        clock.advance(Duration::from_millis(1_100));
        assert!(pool.acquire(&target).await.is_err());
        assert_eq!(connector.connect_attempts(), 4);

        clock.advance(Duration::from_millis(1_000));
        let _ = pool.acquire(&target).await;
        assert_eq!(connector.connect_attempts(), 5);
    }

    #[tokio::test]
    async fn test_successful_connect_clears_degradation() {
        let connector = Arc::new(FlakyConnector::failing(3));
        let clock = ManualClock::new();
        let pool = ConnectionPoolManager::new(connector.clone(), test_config(), clock.clone());
        let target = test_target();

        for _ in 0..3 {
            let _ = pool.acquire(&target).await;
        }
        clock.advance(Duration::from_millis(1_100));

        let pooled = pool.acquire(&target).await.unwrap();
        pool.release(pooled);
        assert_eq!(pool.stats().degraded_targets, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_exhausted_when_ceiling_held() {
        let mut config = SentinelConfig::default();
        config.backends.content_manager.max_connections = 1;
        config.pool.acquire_timeout_ms = 100;

        let connector = Arc::new(FlakyConnector::failing(0));
        let clock = ManualClock::new();
        let pool = ConnectionPoolManager::new(connector, Arc::new(config), clock);
        let target = test_target();

        let held = pool.acquire(&target).await.unwrap();
        let second = pool.acquire(&target).await;
        assert!(matches!(
            second,
            Err(SentinelError::PoolExhausted { .. })
        ));
        assert_eq!(pool.stats().timeouts, 1);

        pool.release(held);
        assert!(pool.acquire(&target).await.is_ok());
    }
}
