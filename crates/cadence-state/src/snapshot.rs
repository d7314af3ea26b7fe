//! Immutable planning snapshots of a table's repair state.

use std::collections::BTreeSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use cadence_ring::TokenRange;
use cadence_types::NodeId;

use crate::vnode::{UNREPAIRED_MS, VnodeRepairState};

/// All vnodes of a table that share an identical replica set.
///
/// Groups are the unit of lock acquisition downstream: one scheduled task is
/// emitted per group, and the replicas of the group are the nodes the task
/// coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaRepairGroup {
    /// The shared replica set.
    pub replicas: BTreeSet<NodeId>,
    /// Member vnodes, in ring order.
    pub vnodes: Vec<VnodeRepairState>,
    /// Minimum `last_repaired_at_ms` across the member vnodes.
    pub last_completed_at_ms: i64,
}

impl ReplicaRepairGroup {
    /// Token ranges of the member vnodes, in ring order.
    pub fn ranges(&self) -> Vec<TokenRange> {
        self.vnodes.iter().map(|vnode| vnode.range).collect()
    }
}

/// Immutable view of a table's repair state at a point in time.
///
/// Built from the ring-ordered vnode list; the replica groups and the
/// completion watermark are derived at construction. Snapshots are shared as
/// `Arc<RepairStateSnapshot>` and handed out by value; once built they never
/// change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairStateSnapshot {
    vnodes: Vec<VnodeRepairState>,
    groups: Vec<ReplicaRepairGroup>,
    last_completed_at_ms: i64,
    can_repair: bool,
    estimated_repair_time_ms: i64,
}

impl RepairStateSnapshot {
    /// Build a snapshot from ring-ordered vnode states.
    ///
    /// Vnodes sharing a replica set are collected into one group each;
    /// groups are ordered by the first appearance of their replica set on
    /// the ring, and vnodes keep ring order within their group.
    pub fn build(
        vnodes: Vec<VnodeRepairState>,
        can_repair: bool,
        estimated_repair_time_ms: i64,
    ) -> Self {
        let mut groups: Vec<ReplicaRepairGroup> = Vec::new();
        for vnode in &vnodes {
            match groups
                .iter_mut()
                .find(|group| group.replicas == vnode.replicas)
            {
                Some(group) => {
                    group.last_completed_at_ms =
                        group.last_completed_at_ms.min(vnode.last_repaired_at_ms);
                    group.vnodes.push(vnode.clone());
                }
                None => groups.push(ReplicaRepairGroup {
                    replicas: vnode.replicas.clone(),
                    vnodes: vec![vnode.clone()],
                    last_completed_at_ms: vnode.last_repaired_at_ms,
                }),
            }
        }

        let last_completed_at_ms = vnodes
            .iter()
            .map(|vnode| vnode.last_repaired_at_ms)
            .min()
            .unwrap_or(UNREPAIRED_MS);

        Self {
            vnodes,
            groups,
            last_completed_at_ms,
            can_repair,
            estimated_repair_time_ms,
        }
    }

    /// A snapshot with no vnodes that cannot be repaired. Used as the value
    /// of a state that has not completed its first recomputation.
    pub fn empty() -> Self {
        Self::build(Vec::new(), false, 0)
    }

    /// The vnode states, in ring order.
    pub fn vnodes(&self) -> &[VnodeRepairState] {
        &self.vnodes
    }

    /// The derived replica repair groups, in ring order of first appearance.
    pub fn groups(&self) -> &[ReplicaRepairGroup] {
        &self.groups
    }

    /// Token ranges of all vnodes, in ring order.
    pub fn ranges(&self) -> Vec<TokenRange> {
        self.vnodes.iter().map(|vnode| vnode.range).collect()
    }

    /// When the oldest vnode was last repaired; the table counts as fully
    /// repaired at this timestamp.
    pub fn last_completed_at_ms(&self) -> i64 {
        self.last_completed_at_ms
    }

    /// Whether the table can currently be repaired at all.
    pub fn can_repair(&self) -> bool {
        self.can_repair
    }

    /// Expected duration of repairing the table, in milliseconds.
    pub fn estimated_repair_time_ms(&self) -> i64 {
        self.estimated_repair_time_ms
    }
}

/// Holder for the current snapshot of one repair state.
///
/// Readers get the latest value with a lock-free load; writers replace the
/// snapshot as a whole, so a torn view is never observed.
pub struct SnapshotCell {
    inner: ArcSwap<RepairStateSnapshot>,
}

impl SnapshotCell {
    /// Create a cell holding [`RepairStateSnapshot::empty`].
    pub fn new() -> Self {
        Self {
            inner: ArcSwap::from_pointee(RepairStateSnapshot::empty()),
        }
    }

    /// The current snapshot.
    pub fn load(&self) -> Arc<RepairStateSnapshot> {
        self.inner.load_full()
    }

    /// Replace the current snapshot.
    pub fn store(&self, snapshot: RepairStateSnapshot) {
        self.inner.store(Arc::new(snapshot));
    }
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SnapshotCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCell")
            .field("snapshot", &self.inner.load())
            .finish()
    }
}
