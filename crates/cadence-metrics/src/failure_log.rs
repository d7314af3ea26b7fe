//! Threshold-based logging of failed repair sessions.
//!
//! When the statistics backend is disabled or unwatched, repeated repair
//! failures can go unnoticed. [`MetricsLogger`] polls the meter registry for
//! failed-session timers and, once the failures since the previous tick pass
//! a threshold, writes one warning per affected table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, warn};

use crate::registry::{KEYSPACE_TAG, MeterId, MeterRegistry, REPAIR_SESSIONS, SUCCESSFUL_TAG, TABLE_TAG};

/// How often failures are checked unless configured otherwise: 10 minutes.
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Bound on how long `close` waits for the worker to stop.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

struct LoggerShared {
    registry: Arc<dyn MeterRegistry>,
    failed_sessions_threshold: u64,
    log_interval: Duration,
    last_counts: Mutex<HashMap<MeterId, u64>>,
}

/// Logs tables whose failed repair sessions passed a threshold.
pub struct MetricsLogger {
    shared: Arc<LoggerShared>,
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MetricsLogger {
    /// Create a logger checking at [`DEFAULT_LOG_INTERVAL`].
    pub fn new(registry: Arc<dyn MeterRegistry>, failed_sessions_threshold: u64) -> Self {
        Self::with_log_interval(registry, failed_sessions_threshold, DEFAULT_LOG_INTERVAL)
    }

    /// Create a logger with an explicit check cadence.
    ///
    /// Must be called from within a tokio runtime: the worker is spawned
    /// immediately. The first check runs one full interval after creation.
    pub fn with_log_interval(
        registry: Arc<dyn MeterRegistry>,
        failed_sessions_threshold: u64,
        log_interval: Duration,
    ) -> Self {
        let shared = Arc::new(LoggerShared {
            registry,
            failed_sessions_threshold,
            log_interval,
            last_counts: Mutex::new(HashMap::new()),
        });
        let (shutdown, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(log_loop(shared.clone(), shutdown_rx));

        Self {
            shared,
            shutdown,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Check the registry now and log if the threshold passed.
    pub fn log_if_threshold_passed(&self) {
        log_if_threshold_passed(&self.shared);
    }

    /// Failed sessions per meter since the previous check, advancing the
    /// per-meter watermarks. Only positive diffs are reported.
    pub fn failed_session_diffs(&self) -> HashMap<MeterId, u64> {
        failed_session_diffs(&self.shared)
    }

    /// Stop the check worker. Waits a bounded time; idempotent.
    pub async fn close(&self) {
        let _ = self.shutdown.send(true);
        let worker = self.worker.lock().expect("worker lock poisoned").take();
        if let Some(worker) = worker
            && tokio::time::timeout(CLOSE_TIMEOUT, worker).await.is_err()
        {
            warn!("metrics logger worker did not stop in time");
        }
    }
}

async fn log_loop(shared: Arc<LoggerShared>, mut shutdown: watch::Receiver<bool>) {
    debug!(
        interval_minutes = shared.log_interval.as_secs() / 60,
        threshold = shared.failed_sessions_threshold,
        "metrics logger started"
    );
    let mut tick = interval_at(Instant::now() + shared.log_interval, shared.log_interval);

    loop {
        tokio::select! {
            _ = tick.tick() => log_if_threshold_passed(&shared),
            _ = shutdown.changed() => {
                debug!("metrics logger stopping");
                break;
            }
        }
    }
}

fn failed_session_diffs(shared: &LoggerShared) -> HashMap<MeterId, u64> {
    let timers = shared
        .registry
        .timers(REPAIR_SESSIONS, &[(SUCCESSFUL_TAG, "false")]);

    let mut last_counts = shared.last_counts.lock().expect("count map lock poisoned");
    let mut diffs = HashMap::new();
    for timer in timers {
        let previous = last_counts.get(&timer.id).copied().unwrap_or(0);
        let diff = timer.count.saturating_sub(previous);
        if diff > 0 {
            diffs.insert(timer.id.clone(), diff);
            last_counts.insert(timer.id, timer.count);
        }
    }
    diffs
}

fn log_if_threshold_passed(shared: &LoggerShared) {
    let diffs = failed_session_diffs(shared);
    let sum: u64 = diffs.values().sum();
    if sum < shared.failed_sessions_threshold {
        return;
    }

    let interval_minutes = shared.log_interval.as_secs() / 60;
    for (id, diff) in &diffs {
        let (Some(keyspace), Some(table)) = (id.tag(KEYSPACE_TAG), id.tag(TABLE_TAG)) else {
            continue;
        };
        warn!(
            "Table {keyspace}.{table} had {diff} failed repair sessions \
             in the last {interval_minutes} minutes"
        );
    }
}
