//! The seam between the cache and whatever produces snapshots.
//!
//! How a snapshot is computed — repair history queries, ring topology,
//! transport — is deliberately hidden behind [`RepairState`]. The cache, the
//! metrics supplier and the scheduler only ever see this trait.

use std::sync::Arc;

use async_trait::async_trait;
use cadence_types::{RepairConfig, TableRef, now_ms};

use crate::error::StateError;
use crate::snapshot::RepairStateSnapshot;

/// Repair state of a single `(table, repair config)` pair.
///
/// Implementations own the current snapshot and replace it as a whole on
/// update; [`snapshot`](RepairState::snapshot) must never block on I/O.
#[async_trait]
pub trait RepairState: Send + Sync {
    /// Recompute the snapshot from the underlying history and topology and
    /// swap it in. On failure the previous snapshot stays authoritative.
    async fn update(&self) -> Result<(), StateError>;

    /// Recompute immediately. Implementations that debounce [`update`]
    /// must not debounce this.
    ///
    /// [`update`]: RepairState::update
    async fn update_now(&self) -> Result<(), StateError> {
        self.update().await
    }

    /// The most recently computed snapshot, without recomputation.
    fn snapshot(&self) -> Arc<RepairStateSnapshot>;

    /// The repair configuration this state was created for.
    fn repair_config(&self) -> &RepairConfig;

    /// Gauge: when the table was last fully repaired.
    fn last_repaired_at_ms(&self) -> i64 {
        self.snapshot().last_completed_at_ms()
    }

    /// Gauge: fraction of vnodes repaired within the configured interval.
    fn repaired_ratio(&self) -> f64 {
        let snapshot = self.snapshot();
        let vnodes = snapshot.vnodes();
        if vnodes.is_empty() {
            return 0.0;
        }
        let now = now_ms();
        let interval = self.repair_config().interval_ms();
        let repaired = vnodes
            .iter()
            .filter(|vnode| vnode.is_repaired_at(now, interval))
            .count();
        repaired as f64 / vnodes.len() as f64
    }

    /// Gauge: estimated milliseconds of repair work outstanding.
    fn remaining_repair_time_ms(&self) -> i64 {
        self.snapshot().estimated_repair_time_ms()
    }
}

/// Creates [`RepairState`]s for the cache.
///
/// `create` must be cheap and non-blocking: it is invoked while the cache
/// holds its map lock so that each key is constructed at most once. Any I/O
/// belongs in [`RepairState::update`].
pub trait RepairStateFactory: Send + Sync {
    /// Construct a fresh state for the given table and configuration.
    fn create(&self, table: &TableRef, config: &RepairConfig) -> Arc<dyn RepairState>;
}
