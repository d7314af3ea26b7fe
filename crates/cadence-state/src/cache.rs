//! Concurrent `(table, repair config) -> RepairState` cache with a
//! background refresh worker.
//!
//! States are created lazily through the injected [`RepairStateFactory`] —
//! at most once per key, even under concurrent lookups — and are never
//! evicted while the cache lives. A single background task refreshes every
//! entry on a fixed cadence; per-entry failures are logged and never stop
//! the worker.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cadence_types::{RepairConfig, TableRef};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval};
use tracing::{debug, info, warn};

use crate::error::StateError;
use crate::snapshot::RepairStateSnapshot;
use crate::state::{RepairState, RepairStateFactory};

/// How often entries are refreshed unless configured otherwise.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(5_000);

/// Bound on how long `close` waits for the refresh worker to stop.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    table: TableRef,
    config: RepairConfig,
}

struct CacheShared {
    factory: Box<dyn RepairStateFactory>,
    states: Mutex<HashMap<CacheKey, Arc<dyn RepairState>>>,
    closed: AtomicBool,
}

/// Cache of repair states, one per `(table, repair config)` pair.
///
/// Owns a background refresh worker; [`close`](RepairStateCache::close) must
/// be called to stop it deterministically. After close the cache refuses all
/// requests with [`StateError::CacheClosed`].
pub struct RepairStateCache {
    shared: Arc<CacheShared>,
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RepairStateCache {
    /// Create a cache refreshing at [`DEFAULT_REFRESH_INTERVAL`].
    pub fn new(factory: Box<dyn RepairStateFactory>) -> Self {
        Self::with_refresh_interval(factory, DEFAULT_REFRESH_INTERVAL)
    }

    /// Create a cache with an explicit refresh cadence.
    ///
    /// Must be called from within a tokio runtime: the refresh worker is
    /// spawned immediately.
    pub fn with_refresh_interval(
        factory: Box<dyn RepairStateFactory>,
        refresh_interval: Duration,
    ) -> Self {
        let shared = Arc::new(CacheShared {
            factory,
            states: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        });
        let (shutdown, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(refresh_loop(shared.clone(), refresh_interval, shutdown_rx));

        Self {
            shared,
            shutdown,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// The current snapshot for the table, creating the underlying state on
    /// first use.
    pub fn snapshot(
        &self,
        table: &TableRef,
        config: &RepairConfig,
    ) -> Result<Arc<RepairStateSnapshot>, StateError> {
        Ok(self.state(table, config)?.snapshot())
    }

    /// Force an immediate recomputation of the table's state, creating it
    /// first if needed.
    pub async fn update(&self, table: &TableRef, config: &RepairConfig) -> Result<(), StateError> {
        let state = self.state(table, config)?;
        state.update().await
    }

    /// The underlying state handle, creating it on first use. Exposed so
    /// callers can register states with the metrics supplier.
    pub fn state(
        &self,
        table: &TableRef,
        config: &RepairConfig,
    ) -> Result<Arc<dyn RepairState>, StateError> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(StateError::CacheClosed);
        }

        let key = CacheKey {
            table: table.clone(),
            config: config.clone(),
        };
        let mut states = self.shared.states.lock().expect("state map lock poisoned");
        let state = states
            .entry(key)
            .or_insert_with(|| {
                debug!(%table, "creating repair state");
                self.shared.factory.create(table, config)
            })
            .clone();
        Ok(state)
    }

    /// Stop the refresh worker and mark the cache unusable.
    ///
    /// Waits a bounded time for the worker to exit; idempotent.
    pub async fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.shutdown.send(true);

        let worker = self.worker.lock().expect("worker lock poisoned").take();
        if let Some(worker) = worker
            && tokio::time::timeout(CLOSE_TIMEOUT, worker).await.is_err()
        {
            warn!("repair state refresh worker did not stop in time");
        }
        info!("repair state cache closed");
    }
}

async fn refresh_loop(
    shared: Arc<CacheShared>,
    refresh_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(interval_ms = refresh_interval.as_millis() as u64, "repair state refresh worker started");
    let mut tick = interval(refresh_interval);

    loop {
        tokio::select! {
            _ = tick.tick() => refresh_all(&shared).await,
            _ = shutdown.changed() => {
                debug!("repair state refresh worker stopping");
                break;
            }
        }
    }
}

/// Refresh every entry present at the start of the tick. Entries inserted
/// while the tick runs are picked up on the next one.
async fn refresh_all(shared: &CacheShared) {
    let entries: Vec<(TableRef, Arc<dyn RepairState>)> = {
        let states = shared.states.lock().expect("state map lock poisoned");
        states
            .iter()
            .map(|(key, state)| (key.table.clone(), state.clone()))
            .collect()
    };

    for (table, state) in entries {
        let started = Instant::now();
        match state.update().await {
            Ok(()) => debug!(
                %table,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "scheduled repair state refresh"
            ),
            Err(error) => warn!(%table, %error, "could not refresh repair state"),
        }
    }
}
