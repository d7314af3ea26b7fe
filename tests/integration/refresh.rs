//! Integration test: cache refresh and concurrency.
//!
//! Exercises the repair state cache under concurrent lookups and verifies
//! the background refresh worker: propagation of new snapshots, isolation
//! of per-table failures and deterministic shutdown.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use cadence_integration_tests::{ScriptedStateFactory, SharedFactory, snapshot_of, vnode};
use cadence_state::{RepairStateCache, StateError};
use cadence_types::{RepairConfig, TableRef};

fn cache_over(
    factory: &Arc<ScriptedStateFactory>,
    refresh_interval: Duration,
) -> RepairStateCache {
    RepairStateCache::with_refresh_interval(
        Box::new(SharedFactory(factory.clone())),
        refresh_interval,
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_lookups_construct_each_state_once() {
    let factory = Arc::new(ScriptedStateFactory::new());
    let cache = Arc::new(cache_over(&factory, Duration::from_secs(3_600)));
    let config = RepairConfig::default();

    let tables: Vec<TableRef> = (0..4)
        .map(|i| TableRef::new("ks", &format!("t{i}")))
        .collect();

    let mut handles = Vec::new();
    for round in 0..32 {
        let cache = cache.clone();
        let table = tables[round % tables.len()].clone();
        let config = config.clone();
        handles.push(tokio::spawn(async move {
            cache.snapshot(&table, &config).unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(
        factory.created().load(Ordering::SeqCst),
        tables.len(),
        "each (table, config) key must be constructed exactly once"
    );
    cache.close().await;
}

#[tokio::test]
async fn test_background_refresh_propagates_new_snapshots() {
    let factory = Arc::new(ScriptedStateFactory::new());
    let table = TableRef::new("ks", "tbl");
    factory.script(&table, snapshot_of(vec![vnode(0, 10, &[1], 42)]));

    let cache = cache_over(&factory, Duration::from_millis(25));
    let config = RepairConfig::default();

    // First lookup sees the empty placeholder snapshot.
    assert!(cache.snapshot(&table, &config).unwrap().vnodes().is_empty());

    tokio::time::sleep(Duration::from_millis(250)).await;

    let refreshed = cache.snapshot(&table, &config).unwrap();
    assert_eq!(refreshed.vnodes().len(), 1);
    assert_eq!(refreshed.last_completed_at_ms(), 42);
    cache.close().await;
}

#[tokio::test]
async fn test_failing_table_does_not_starve_the_rest() {
    let factory = Arc::new(ScriptedStateFactory::new());
    let broken = TableRef::new("ks", "broken");
    let healthy = TableRef::new("ks", "healthy");
    factory.fail_updates_for(&broken);
    factory.script(&healthy, snapshot_of(vec![vnode(0, 10, &[1], 7)]));

    let cache = cache_over(&factory, Duration::from_millis(25));
    let config = RepairConfig::default();
    cache.snapshot(&broken, &config).unwrap();
    cache.snapshot(&healthy, &config).unwrap();

    tokio::time::sleep(Duration::from_millis(250)).await;

    // The broken table keeps its placeholder; the healthy one refreshed.
    assert!(cache.snapshot(&broken, &config).unwrap().vnodes().is_empty());
    assert_eq!(cache.snapshot(&healthy, &config).unwrap().vnodes().len(), 1);
    cache.close().await;
}

#[tokio::test]
async fn test_update_is_on_demand_and_close_is_final() {
    let factory = Arc::new(ScriptedStateFactory::new());
    let table = TableRef::new("ks", "tbl");
    factory.script(&table, snapshot_of(vec![vnode(0, 10, &[1], 1)]));

    let cache = cache_over(&factory, Duration::from_secs(3_600));
    let config = RepairConfig::default();

    cache.update(&table, &config).await.unwrap();
    assert_eq!(cache.snapshot(&table, &config).unwrap().vnodes().len(), 1);

    cache.close().await;
    cache.close().await;
    assert!(matches!(
        cache.snapshot(&table, &config),
        Err(StateError::CacheClosed)
    ));
    assert!(matches!(
        cache.update(&table, &config).await,
        Err(StateError::CacheClosed)
    ));
}
