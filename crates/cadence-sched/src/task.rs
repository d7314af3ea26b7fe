//! One schedulable unit of repair work.

use std::sync::Arc;

use cadence_metrics::TableRepairMetrics;
use cadence_ring::{TokenRange, partition};
use cadence_state::ReplicaRepairGroup;
use cadence_types::{JobId, RepairConfig, TableRef};
use num_bigint::BigInt;

use crate::error::SchedError;
use crate::traits::{NodeProxyFactory, RepairHistory, RepairLockFactory, TableRepairPolicy};

/// A planned repair of one replica repair group.
///
/// Carries everything the downstream runner needs: the group to lock and
/// repair, the wanted repair-unit size in tokens, and the collaborator
/// handles. Tasks are plain values; dropping one cancels nothing.
pub struct RepairTask {
    group: ReplicaRepairGroup,
    tokens_per_task: BigInt,
    table: TableRef,
    config: RepairConfig,
    history: Arc<dyn RepairHistory>,
    proxy_factory: Arc<dyn NodeProxyFactory>,
    metrics: Arc<dyn TableRepairMetrics>,
    lock_factory: RepairLockFactory,
    policies: Vec<Arc<dyn TableRepairPolicy>>,
    job_id: JobId,
    priority: i32,
}

impl RepairTask {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        group: ReplicaRepairGroup,
        tokens_per_task: BigInt,
        table: TableRef,
        config: RepairConfig,
        history: Arc<dyn RepairHistory>,
        proxy_factory: Arc<dyn NodeProxyFactory>,
        metrics: Arc<dyn TableRepairMetrics>,
        lock_factory: RepairLockFactory,
        policies: Vec<Arc<dyn TableRepairPolicy>>,
        job_id: JobId,
        priority: i32,
    ) -> Self {
        Self {
            group,
            tokens_per_task,
            table,
            config,
            history,
            proxy_factory,
            metrics,
            lock_factory,
            policies,
            job_id,
            priority,
        }
    }

    /// The replica repair group this task repairs.
    pub fn group(&self) -> &ReplicaRepairGroup {
        &self.group
    }

    /// Wanted repair-unit size in tokens.
    pub fn tokens_per_task(&self) -> &BigInt {
        &self.tokens_per_task
    }

    /// The group's token ranges partitioned into repair units of at most
    /// [`tokens_per_task`](RepairTask::tokens_per_task) tokens each.
    pub fn repair_units(&self) -> Result<Vec<Vec<TokenRange>>, SchedError> {
        Ok(partition(&self.group.ranges(), &self.tokens_per_task)?)
    }

    /// The table being repaired.
    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// The repair configuration in effect.
    pub fn repair_config(&self) -> &RepairConfig {
        &self.config
    }

    /// The repair history handle, for session bookkeeping.
    pub fn repair_history(&self) -> &Arc<dyn RepairHistory> {
        &self.history
    }

    /// The node proxy factory, for management connections.
    pub fn proxy_factory(&self) -> &Arc<dyn NodeProxyFactory> {
        &self.proxy_factory
    }

    /// The metrics sink for the table.
    pub fn metrics(&self) -> &Arc<dyn TableRepairMetrics> {
        &self.metrics
    }

    /// Factory for the resources to lock while repairing.
    pub fn lock_factory(&self) -> RepairLockFactory {
        self.lock_factory
    }

    /// The policies that must keep allowing the run.
    pub fn policies(&self) -> &[Arc<dyn TableRepairPolicy>] {
        &self.policies
    }

    /// Id of the job that planned this task.
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Scheduling priority; higher runs earlier, `-1` means not yet due.
    pub fn priority(&self) -> i32 {
        self.priority
    }
}

impl std::fmt::Debug for RepairTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepairTask")
            .field("table", &self.table)
            .field("ranges", &self.group.ranges().len())
            .field("tokens_per_task", &self.tokens_per_task)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}
