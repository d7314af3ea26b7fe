//! Per-vnode repair freshness.

use std::collections::BTreeSet;

use cadence_ring::TokenRange;
use cadence_types::NodeId;

/// Sentinel timestamp for a vnode that has never been repaired.
pub const UNREPAIRED_MS: i64 = -1;

/// Repair freshness of a single vnode: the token range it covers, the nodes
/// holding replicas of it, when it was last repaired and how long repairing
/// it is expected to take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VnodeRepairState {
    /// Token range owned by the vnode.
    pub range: TokenRange,
    /// Replica set for the range.
    pub replicas: BTreeSet<NodeId>,
    /// When the vnode was last repaired (ms since epoch), or
    /// [`UNREPAIRED_MS`].
    pub last_repaired_at_ms: i64,
    /// Expected duration of one repair of this vnode, in milliseconds.
    pub estimated_repair_time_ms: i64,
}

impl VnodeRepairState {
    /// Create a vnode state.
    pub fn new(
        range: TokenRange,
        replicas: impl IntoIterator<Item = NodeId>,
        last_repaired_at_ms: i64,
        estimated_repair_time_ms: i64,
    ) -> Self {
        Self {
            range,
            replicas: replicas.into_iter().collect(),
            last_repaired_at_ms,
            estimated_repair_time_ms,
        }
    }

    /// Whether the vnode was repaired within `interval_ms` of `now_ms`.
    pub fn is_repaired_at(&self, now_ms: i64, interval_ms: i64) -> bool {
        now_ms - self.last_repaired_at_ms <= interval_ms
    }
}
