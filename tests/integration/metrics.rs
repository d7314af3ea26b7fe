//! Integration test: metrics supply and failure logging.
//!
//! Runs the gauge supplier against scripted repair states and exercises the
//! failure logger's diff semantics against the in-memory meter registry.

use std::sync::Arc;
use std::time::Duration;

use cadence_integration_tests::{
    RecordingMetrics, ScriptedStateFactory, SharedFactory, snapshot_of, vnode,
};
use cadence_metrics::{InMemoryMeterRegistry, MetricsLogger, RepairMetricSupplier, TABLE_TAG};
use cadence_state::RepairStateCache;
use cadence_types::{RepairConfig, TableRef, now_ms};

#[tokio::test]
async fn test_supplier_pushes_gauges_for_registered_tables() {
    let factory = Arc::new(ScriptedStateFactory::new());
    let table = TableRef::new("ks", "tbl");
    let repaired_at = now_ms();
    factory.script(&table, snapshot_of(vec![vnode(0, 10, &[1], repaired_at)]));

    let cache = RepairStateCache::with_refresh_interval(
        Box::new(SharedFactory(factory.clone())),
        Duration::from_secs(3_600),
    );
    let config = RepairConfig::default();

    let sink = Arc::new(RecordingMetrics::default());
    let supplier = RepairMetricSupplier::with_update_interval(sink.clone(), Duration::from_millis(25));
    supplier.register(table.clone(), cache.state(&table, &config).unwrap());

    tokio::time::sleep(Duration::from_millis(250)).await;
    supplier.close().await;
    cache.close().await;

    assert_eq!(sink.last_repaired_at_of(&table), Some(repaired_at));
    assert_eq!(sink.repaired_ratio_of(&table), Some(1.0));
    assert_eq!(sink.remaining_repair_time_of(&table), Some(0));
}

#[tokio::test]
async fn test_unregistered_table_gets_no_gauges() {
    let sink = Arc::new(RecordingMetrics::default());
    let supplier = RepairMetricSupplier::with_update_interval(sink.clone(), Duration::from_millis(25));

    tokio::time::sleep(Duration::from_millis(100)).await;
    supplier.close().await;

    assert!(sink.last_repaired_at_of(&TableRef::new("ks", "tbl")).is_none());
}

#[tokio::test]
async fn test_failure_logger_diffs_across_ticks() {
    let registry = Arc::new(InMemoryMeterRegistry::new());
    let logger = MetricsLogger::with_log_interval(registry.clone(), 2, Duration::from_secs(3_600));
    let table = TableRef::new("ks", "t1");

    // Two failed sessions: the tick reports a diff of 2, enough to log.
    registry.record_repair_session(&table, false, Duration::from_millis(100));
    registry.record_repair_session(&table, false, Duration::from_millis(100));
    logger.log_if_threshold_passed();

    // One more failure plus one success: only one new failure since the
    // watermark advanced, which stays below the threshold of 2.
    registry.record_repair_session(&table, false, Duration::from_millis(100));
    registry.record_repair_session(&table, true, Duration::from_millis(100));

    let diffs = logger.failed_session_diffs();
    assert_eq!(diffs.values().copied().sum::<u64>(), 1);
    logger.close().await;
}

#[tokio::test]
async fn test_failure_logger_reports_per_table() {
    let registry = Arc::new(InMemoryMeterRegistry::new());
    let logger = MetricsLogger::with_log_interval(registry.clone(), 1, Duration::from_secs(3_600));

    registry.record_repair_session(&TableRef::new("ks", "a"), false, Duration::ZERO);
    registry.record_repair_session(&TableRef::new("ks", "b"), false, Duration::ZERO);
    registry.record_repair_session(&TableRef::new("ks", "b"), false, Duration::ZERO);

    let diffs = logger.failed_session_diffs();
    assert_eq!(diffs.len(), 2);
    let b_diff = diffs
        .iter()
        .find(|(id, _)| id.tag(TABLE_TAG) == Some("b"))
        .map(|(_, diff)| *diff);
    assert_eq!(b_diff, Some(2));
    logger.close().await;
}

#[tokio::test]
async fn test_failure_logger_worker_consumes_on_its_own_cadence() {
    let registry = Arc::new(InMemoryMeterRegistry::new());
    let logger = MetricsLogger::with_log_interval(registry.clone(), 1, Duration::from_millis(40));
    let table = TableRef::new("ks", "t1");

    registry.record_repair_session(&table, false, Duration::ZERO);
    tokio::time::sleep(Duration::from_millis(200)).await;

    // The worker already consumed the failure; nothing is left to report.
    assert!(logger.failed_session_diffs().is_empty());
    logger.close().await;
}
