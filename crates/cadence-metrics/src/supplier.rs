//! Periodic push of repair gauges into the metrics backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cadence_state::RepairState;
use cadence_types::TableRef;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

/// How often gauges are refreshed unless configured otherwise.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(5);

/// Bound on how long `close` waits for the worker to stop.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Sink for per-table repair gauges. Implemented by the metrics backend.
pub trait TableRepairMetrics: Send + Sync {
    /// When the table was last fully repaired, in ms since epoch.
    fn last_repaired_at(&self, table: &TableRef, timestamp_ms: i64);

    /// Fraction of the table's vnodes repaired within the interval.
    fn repaired_ratio(&self, table: &TableRef, ratio: f64);

    /// Estimated milliseconds of repair work outstanding.
    fn remaining_repair_time(&self, table: &TableRef, time_ms: i64);
}

struct SupplierShared {
    states: Mutex<HashMap<TableRef, Arc<dyn RepairState>>>,
    sink: Arc<dyn TableRepairMetrics>,
}

/// Periodically refreshes registered repair states and pushes their gauges
/// into the [`TableRepairMetrics`] sink.
pub struct RepairMetricSupplier {
    shared: Arc<SupplierShared>,
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RepairMetricSupplier {
    /// Create a supplier updating at [`DEFAULT_UPDATE_INTERVAL`].
    pub fn new(sink: Arc<dyn TableRepairMetrics>) -> Self {
        Self::with_update_interval(sink, DEFAULT_UPDATE_INTERVAL)
    }

    /// Create a supplier with an explicit update cadence.
    ///
    /// Must be called from within a tokio runtime: the worker is spawned
    /// immediately.
    pub fn with_update_interval(sink: Arc<dyn TableRepairMetrics>, update_interval: Duration) -> Self {
        let shared = Arc::new(SupplierShared {
            states: Mutex::new(HashMap::new()),
            sink,
        });
        let (shutdown, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(update_loop(shared.clone(), update_interval, shutdown_rx));

        Self {
            shared,
            shutdown,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Register a table to report gauges for. Re-registering a table
    /// replaces its state.
    pub fn register(&self, table: TableRef, state: Arc<dyn RepairState>) {
        info!(%table, "registered table for metrics");
        self.shared
            .states
            .lock()
            .expect("state map lock poisoned")
            .insert(table, state);
    }

    /// Stop reporting gauges for a table. Unregistering an unknown table
    /// does nothing.
    pub fn unregister(&self, table: &TableRef) {
        info!(%table, "unregistered table for metrics");
        self.shared
            .states
            .lock()
            .expect("state map lock poisoned")
            .remove(table);
    }

    /// Stop the update worker. Waits a bounded time; idempotent.
    pub async fn close(&self) {
        let _ = self.shutdown.send(true);
        let worker = self.worker.lock().expect("worker lock poisoned").take();
        if let Some(worker) = worker
            && tokio::time::timeout(CLOSE_TIMEOUT, worker).await.is_err()
        {
            warn!("metric supplier worker did not stop in time");
        }
    }
}

async fn update_loop(
    shared: Arc<SupplierShared>,
    update_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(
        interval_ms = update_interval.as_millis() as u64,
        "metric supplier started"
    );
    let mut tick = interval(update_interval);

    loop {
        tokio::select! {
            _ = tick.tick() => update_metrics(&shared).await,
            _ = shutdown.changed() => {
                debug!("metric supplier stopping");
                break;
            }
        }
    }
}

async fn update_metrics(shared: &SupplierShared) {
    let entries: Vec<(TableRef, Arc<dyn RepairState>)> = {
        let states = shared.states.lock().expect("state map lock poisoned");
        states
            .iter()
            .map(|(table, state)| (table.clone(), state.clone()))
            .collect()
    };

    for (table, state) in entries {
        debug!(%table, "updating metrics");
        if let Err(error) = state.update_now().await {
            // The previous snapshot stays authoritative; report it anyway.
            warn!(%table, %error, "could not refresh repair state for metrics");
        }
        shared
            .sink
            .last_repaired_at(&table, state.last_repaired_at_ms());
        shared.sink.repaired_ratio(&table, state.repaired_ratio());
        shared
            .sink
            .remaining_repair_time(&table, state.remaining_repair_time_ms());
    }
}
