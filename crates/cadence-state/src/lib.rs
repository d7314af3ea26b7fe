//! Repair state model and cache for Cadence.
//!
//! This crate provides:
//!
//! - [`VnodeRepairState`] — repair freshness of a single vnode.
//! - [`ReplicaRepairGroup`] / [`RepairStateSnapshot`] — the immutable
//!   planning view of a table: ring-ordered vnodes grouped by replica set.
//! - [`RepairState`] / [`RepairStateFactory`] — the seam towards whatever
//!   produces snapshots (repair history, ring topology); the cache and the
//!   scheduler never see those collaborators directly.
//! - [`RepairStateCache`] — a concurrent `(table, config) -> RepairState`
//!   cache with at-most-once construction and a background refresh worker.

pub mod cache;
pub mod error;
pub mod snapshot;
pub mod state;
pub mod vnode;

pub use cache::RepairStateCache;
pub use error::StateError;
pub use snapshot::{ReplicaRepairGroup, RepairStateSnapshot, SnapshotCell};
pub use state::{RepairState, RepairStateFactory};
pub use vnode::{UNREPAIRED_MS, VnodeRepairState};
