//! Collaborator seams consumed by the scheduler.
//!
//! The job plans repairs; executing them needs cluster access that lives
//! outside this crate. These traits are the boundary: storage statistics
//! feed the unit-size calculation, policies gate scheduling, and the rest
//! are opaque handles carried through to the emitted tasks.

use cadence_types::TableRef;

/// Storage statistics for the cluster's tables.
pub trait TableStorageStates: Send + Sync {
    /// On-disk size of the table on this node, in bytes. `0` means unknown.
    fn data_size_bytes(&self, table: &TableRef) -> i64;
}

/// Opaque handle to the repair history backend. The task executor records
/// and queries sessions through it; the scheduler only passes it along.
pub trait RepairHistory: Send + Sync {}

/// Opaque factory for management connections to cluster nodes, passed
/// through to tasks.
pub trait NodeProxyFactory: Send + Sync {}

/// Policy gate consulted before a table is repaired.
pub trait TableRepairPolicy: Send + Sync {
    /// Whether the policy currently allows repairing the table.
    fn should_run(&self, table: &TableRef) -> bool;
}

/// Which resources a repair task locks while it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairLockType {
    /// Lock the vnode's replicas only.
    Vnode,
    /// Lock one resource per datacenter.
    Datacenter,
    /// Lock both the datacenters and the vnode's replicas.
    DatacenterAndVnode,
}

impl RepairLockType {
    /// The lock factory for this lock type, carried by emitted tasks.
    pub fn lock_factory(self) -> RepairLockFactory {
        RepairLockFactory { lock_type: self }
    }
}

/// Factory for the repair resources a task must lock, derived from a
/// [`RepairLockType`]. Consumed by the task executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairLockFactory {
    lock_type: RepairLockType,
}

impl RepairLockFactory {
    /// The lock type this factory produces resources for.
    pub fn lock_type(&self) -> RepairLockType {
        self.lock_type
    }
}
