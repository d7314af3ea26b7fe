//! Shared test harness for Cadence integration tests.
//!
//! Provides mock implementations of the collaborator seams — a scripted
//! [`RepairState`] factory, a recording metrics sink and no-op pass-through
//! handles — plus a [`PlanningFixture`] wiring a cache and a repair job the
//! way the daemon does.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cadence_metrics::TableRepairMetrics;
use cadence_ring::TokenRange;
use cadence_sched::{
    Collaborators, NodeProxyFactory, RepairHistory, RepairLockType, TableRepairJob,
    TableRepairPolicy, TableStorageStates,
};
use cadence_state::{
    RepairState, RepairStateCache, RepairStateFactory, RepairStateSnapshot, SnapshotCell,
    StateError, VnodeRepairState,
};
use cadence_types::{NodeId, RepairConfig, TableRef};

// =========================================================================
// Snapshot helpers
// =========================================================================

/// A node id from a single byte, for readable test topologies.
pub fn node(n: u8) -> NodeId {
    NodeId::from([n; 16])
}

/// A vnode state over `[start, end)` with the given replicas.
pub fn vnode(start: i64, end: i64, replicas: &[u8], repaired_at_ms: i64) -> VnodeRepairState {
    VnodeRepairState::new(
        TokenRange::new(start, end),
        replicas.iter().map(|&n| node(n)),
        repaired_at_ms,
        0,
    )
}

/// A repairable snapshot over the given vnodes.
pub fn snapshot_of(vnodes: Vec<VnodeRepairState>) -> RepairStateSnapshot {
    RepairStateSnapshot::build(vnodes, true, 0)
}

// =========================================================================
// Scripted repair states
// =========================================================================

/// A repair state whose `update` swaps in a pre-scripted snapshot.
pub struct ScriptedState {
    config: RepairConfig,
    cell: SnapshotCell,
    on_update: Mutex<RepairStateSnapshot>,
    updates: Arc<AtomicUsize>,
    fail_updates: bool,
}

#[async_trait]
impl RepairState for ScriptedState {
    async fn update(&self) -> Result<(), StateError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates {
            return Err(StateError::update("scripted collaborator failure"));
        }
        self.cell.store(self.on_update.lock().unwrap().clone());
        Ok(())
    }

    fn snapshot(&self) -> Arc<RepairStateSnapshot> {
        self.cell.load()
    }

    fn repair_config(&self) -> &RepairConfig {
        &self.config
    }
}

/// Factory handing out [`ScriptedState`]s and counting constructions.
///
/// Tables without a scripted snapshot refresh to an empty snapshot; tables
/// listed in `failing` fail every update.
pub struct ScriptedStateFactory {
    snapshots: Mutex<HashMap<TableRef, RepairStateSnapshot>>,
    failing: Mutex<Vec<TableRef>>,
    created: Arc<AtomicUsize>,
    updates: Arc<AtomicUsize>,
}

impl ScriptedStateFactory {
    /// Create an empty factory.
    pub fn new() -> Self {
        Self {
            snapshots: Mutex::new(HashMap::new()),
            failing: Mutex::new(Vec::new()),
            created: Arc::new(AtomicUsize::new(0)),
            updates: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Script the snapshot that `table`'s updates will swap in.
    pub fn script(&self, table: &TableRef, snapshot: RepairStateSnapshot) {
        self.snapshots.lock().unwrap().insert(table.clone(), snapshot);
    }

    /// Make every update for `table` fail.
    pub fn fail_updates_for(&self, table: &TableRef) {
        self.failing.lock().unwrap().push(table.clone());
    }

    /// How many states this factory has constructed.
    pub fn created(&self) -> Arc<AtomicUsize> {
        self.created.clone()
    }

    /// Total updates across all states from this factory.
    pub fn updates(&self) -> Arc<AtomicUsize> {
        self.updates.clone()
    }
}

impl Default for ScriptedStateFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RepairStateFactory for ScriptedStateFactory {
    fn create(&self, table: &TableRef, config: &RepairConfig) -> Arc<dyn RepairState> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let on_update = self
            .snapshots
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_else(RepairStateSnapshot::empty);
        Arc::new(ScriptedState {
            config: config.clone(),
            cell: SnapshotCell::new(),
            on_update: Mutex::new(on_update),
            updates: self.updates.clone(),
            fail_updates: self.failing.lock().unwrap().contains(table),
        })
    }
}

// =========================================================================
// Collaborator mocks
// =========================================================================

/// Storage statistics returning one mutable size for every table.
pub struct FixedStorageStates {
    bytes: AtomicI64,
}

impl FixedStorageStates {
    /// Report `bytes` for every table.
    pub fn new(bytes: i64) -> Arc<Self> {
        Arc::new(Self {
            bytes: AtomicI64::new(bytes),
        })
    }

    /// Change the reported size.
    pub fn set(&self, bytes: i64) {
        self.bytes.store(bytes, Ordering::SeqCst);
    }
}

impl TableStorageStates for FixedStorageStates {
    fn data_size_bytes(&self, _table: &TableRef) -> i64 {
        self.bytes.load(Ordering::SeqCst)
    }
}

/// Pass-through history handle.
pub struct NoHistory;
impl RepairHistory for NoHistory {}

/// Pass-through proxy factory.
pub struct NoProxies;
impl NodeProxyFactory for NoProxies {}

/// Policy that always denies.
pub struct DenyAll;
impl TableRepairPolicy for DenyAll {
    fn should_run(&self, _table: &TableRef) -> bool {
        false
    }
}

/// Sink recording the latest gauge values per table.
#[derive(Default)]
pub struct RecordingMetrics {
    last_repaired_at: Mutex<HashMap<TableRef, i64>>,
    repaired_ratio: Mutex<HashMap<TableRef, f64>>,
    remaining_repair_time: Mutex<HashMap<TableRef, i64>>,
}

impl RecordingMetrics {
    /// Latest `last_repaired_at` gauge for a table.
    pub fn last_repaired_at_of(&self, table: &TableRef) -> Option<i64> {
        self.last_repaired_at.lock().unwrap().get(table).copied()
    }

    /// Latest `repaired_ratio` gauge for a table.
    pub fn repaired_ratio_of(&self, table: &TableRef) -> Option<f64> {
        self.repaired_ratio.lock().unwrap().get(table).copied()
    }

    /// Latest `remaining_repair_time` gauge for a table.
    pub fn remaining_repair_time_of(&self, table: &TableRef) -> Option<i64> {
        self.remaining_repair_time.lock().unwrap().get(table).copied()
    }
}

impl TableRepairMetrics for RecordingMetrics {
    fn last_repaired_at(&self, table: &TableRef, timestamp_ms: i64) {
        self.last_repaired_at
            .lock()
            .unwrap()
            .insert(table.clone(), timestamp_ms);
    }

    fn repaired_ratio(&self, table: &TableRef, ratio: f64) {
        self.repaired_ratio
            .lock()
            .unwrap()
            .insert(table.clone(), ratio);
    }

    fn remaining_repair_time(&self, table: &TableRef, time_ms: i64) {
        self.remaining_repair_time
            .lock()
            .unwrap()
            .insert(table.clone(), time_ms);
    }
}

// =========================================================================
// Planning fixture
// =========================================================================

/// A cache plus one repair job wired the way the daemon wires them.
pub struct PlanningFixture {
    /// The table under test.
    pub table: TableRef,
    /// The shared state cache.
    pub cache: Arc<RepairStateCache>,
    /// The job under test.
    pub job: TableRepairJob,
    /// The storage statistics mock.
    pub storage: Arc<FixedStorageStates>,
    /// The scripted factory behind the cache.
    pub factory: Arc<ScriptedStateFactory>,
}

/// Forwards factory calls to a shared [`ScriptedStateFactory`] so tests can
/// keep scripting it after the cache takes ownership.
pub struct SharedFactory(pub Arc<ScriptedStateFactory>);

impl RepairStateFactory for SharedFactory {
    fn create(&self, table: &TableRef, config: &RepairConfig) -> Arc<dyn RepairState> {
        self.0.create(table, config)
    }
}

impl PlanningFixture {
    /// Build a fixture for `ks.tbl` with the given snapshot and config. The
    /// snapshot is loaded into the cache before returning.
    pub async fn new(snapshot: RepairStateSnapshot, config: RepairConfig) -> Self {
        Self::with_policies(snapshot, config, Vec::new()).await
    }

    /// Like [`new`](PlanningFixture::new), with repair policies.
    pub async fn with_policies(
        snapshot: RepairStateSnapshot,
        config: RepairConfig,
        policies: Vec<Arc<dyn TableRepairPolicy>>,
    ) -> Self {
        let table = TableRef::new("ks", "tbl");
        let factory = Arc::new(ScriptedStateFactory::new());
        factory.script(&table, snapshot);

        let cache = Arc::new(RepairStateCache::with_refresh_interval(
            Box::new(SharedFactory(factory.clone())),
            Duration::from_secs(3_600),
        ));
        cache
            .update(&table, &config)
            .await
            .expect("initial snapshot load");

        let storage = FixedStorageStates::new(0);
        let job = TableRepairJob::new(
            table.clone(),
            config,
            cache.clone(),
            Collaborators {
                storage_states: storage.clone(),
                repair_history: Arc::new(NoHistory),
                proxy_factory: Arc::new(NoProxies),
                table_metrics: Arc::new(RecordingMetrics::default()),
                lock_type: RepairLockType::Vnode,
                policies,
            },
        );

        Self {
            table,
            cache,
            job,
            storage,
            factory,
        }
    }

    /// Close the fixture's cache.
    pub async fn close(&self) {
        self.cache.close().await;
    }
}
