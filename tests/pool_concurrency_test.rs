//! Connection pool concurrency: the per-kind ceiling must hold under
//! contention, and every waiter must eventually get a slot.

mod common;

use common::{fast_config, target, MockConnector, TargetScript};
use sentinel_core::connector::BackendKind;
use sentinel_core::pool::{ConnectionPoolManager, SystemClock};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ceiling_never_exceeded_under_concurrent_load() {
    let mut config = fast_config();
    config.backends.content_manager.max_connections = 3;
    config.pool.acquire_timeout_ms = 5_000;

    let connector = MockConnector::new();
    let target = target(BackendKind::ContentManager, "cm-load");
    connector.script_target(
        &target,
        TargetScript::healthy(BackendKind::ContentManager)
            .with_connect_delay(Duration::from_millis(5)),
    );

    let pool = Arc::new(ConnectionPoolManager::new(
        connector,
        Arc::new(config),
        Arc::new(SystemClock),
    ));

    let live = Arc::new(AtomicUsize::new(0));
    let high_water = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let pool = Arc::clone(&pool);
        let target = target.clone();
        let live = Arc::clone(&live);
        let high_water = Arc::clone(&high_water);
        let completed = Arc::clone(&completed);

        handles.push(tokio::spawn(async move {
            let pooled = pool.acquire(&target).await.expect("slot within timeout");

            let now = live.fetch_add(1, Ordering::SeqCst) + 1;
            high_water.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            live.fetch_sub(1, Ordering::SeqCst);

            pool.release(pooled);
            completed.fetch_add(1, Ordering::SeqCst);
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(completed.load(Ordering::SeqCst), 10);
    let peak = high_water.load(Ordering::SeqCst);
    assert!(peak <= 3, "ceiling breached: {peak} concurrent connections");
    assert!(peak > 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ceilings_are_per_backend_kind() {
    let mut config = fast_config();
    config.backends.content_manager.max_connections = 1;
    config.backends.search_engine.max_connections = 1;
    config.pool.acquire_timeout_ms = 2_000;

    let connector = MockConnector::new();
    let cm = target(BackendKind::ContentManager, "cm-01");
    let se = target(BackendKind::SearchEngine, "se-01");
    connector.script_target(&cm, TargetScript::healthy(BackendKind::ContentManager));
    connector.script_target(&se, TargetScript::healthy(BackendKind::SearchEngine));

    let pool = Arc::new(ConnectionPoolManager::new(
        connector,
        Arc::new(config),
        Arc::new(SystemClock),
    ));

    // Holding the only content-manager slot must not starve the search
    // engine's independent ceiling.
    let held = pool.acquire(&cm).await.unwrap();
    let se_conn = pool.acquire(&se).await.unwrap();

    assert_eq!(pool.available_slots(BackendKind::ContentManager), 0);
    assert_eq!(pool.available_slots(BackendKind::SearchEngine), 0);

    pool.release(held);
    pool.release(se_conn);
    assert_eq!(pool.available_slots(BackendKind::ContentManager), 1);
}
