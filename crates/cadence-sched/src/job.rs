//! The scheduling facet of one table's repairs.

use std::sync::Arc;

use cadence_metrics::TableRepairMetrics;
use cadence_ring::full_range;
use cadence_state::{RepairStateCache, RepairStateSnapshot};
use cadence_types::{JobId, ONE_HOUR_MS, RepairConfig, TableRef, now_ms};
use num_bigint::BigInt;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::SchedError;
use crate::task::RepairTask;
use crate::traits::{NodeProxyFactory, RepairHistory, RepairLockType, TableRepairPolicy, TableStorageStates};
use crate::view::{RepairStatus, ScheduledRepairJobView};

/// External collaborators a [`TableRepairJob`] plans with.
///
/// The storage statistics feed the repair-unit size calculation and the
/// policies gate scheduling; everything else is carried through to the
/// emitted tasks untouched.
#[derive(Clone)]
pub struct Collaborators {
    /// Table storage statistics.
    pub storage_states: Arc<dyn TableStorageStates>,
    /// Repair history handle.
    pub repair_history: Arc<dyn RepairHistory>,
    /// Node management connection factory.
    pub proxy_factory: Arc<dyn NodeProxyFactory>,
    /// Metrics sink for the table.
    pub table_metrics: Arc<dyn TableRepairMetrics>,
    /// Which resources emitted tasks lock.
    pub lock_type: RepairLockType,
    /// Policies consulted before running.
    pub policies: Vec<Arc<dyn TableRepairPolicy>>,
}

/// Tracks the repair schedule of a single table.
///
/// The table counts as repaired when every vnode this node owns was
/// repaired within the configured interval. All derived values — status,
/// progress, priority, planned tasks — are computed from one snapshot read
/// per call, so a single call never observes a half-updated state.
pub struct TableRepairJob {
    id: JobId,
    table: TableRef,
    config: RepairConfig,
    cache: Arc<RepairStateCache>,
    collaborators: Collaborators,
}

impl TableRepairJob {
    /// Create the scheduling facet for `table` under `config`.
    pub fn new(
        table: TableRef,
        config: RepairConfig,
        cache: Arc<RepairStateCache>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            id: table.job_id(),
            table,
            config,
            cache,
            collaborators,
        }
    }

    /// Stable id of this job.
    pub fn id(&self) -> JobId {
        self.id
    }

    /// The table this job repairs.
    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// The repair configuration in effect.
    pub fn repair_config(&self) -> &RepairConfig {
        &self.config
    }

    /// A point-in-time view of the job for status reporting.
    pub fn view(&self) -> Result<ScheduledRepairJobView, SchedError> {
        let now = now_ms();
        let snapshot = self.snapshot()?;
        Ok(ScheduledRepairJobView {
            id: self.id,
            table: self.table.clone(),
            config: self.config.clone(),
            status: self.status_of(&snapshot, now),
            progress: self.progress_of(&snapshot, now),
            next_run_ms: self.next_run_of(&snapshot),
            snapshot,
        })
    }

    /// Scheduling status at `now_ms`.
    pub fn status(&self, now_ms: i64) -> Result<RepairStatus, SchedError> {
        let snapshot = self.snapshot()?;
        Ok(self.status_of(&snapshot, now_ms))
    }

    /// Fraction of vnodes repaired within the interval at `now_ms`.
    pub fn progress(&self, now_ms: i64) -> Result<f64, SchedError> {
        let snapshot = self.snapshot()?;
        Ok(self.progress_of(&snapshot, now_ms))
    }

    /// When the next repair is due. May lie in the past.
    pub fn next_run_ms(&self) -> Result<i64, SchedError> {
        let snapshot = self.snapshot()?;
        Ok(self.next_run_of(&snapshot))
    }

    /// Scheduling priority at `now_ms`: `-1` while the table cannot be
    /// repaired or is not yet due, otherwise hours overdue plus one.
    pub fn priority(&self, now_ms: i64) -> Result<i32, SchedError> {
        let snapshot = self.snapshot()?;
        Ok(self.priority_of(&snapshot, now_ms))
    }

    /// Whether the job could run right now: the table is repairable and
    /// every policy allows it.
    pub fn runnable(&self) -> Result<bool, SchedError> {
        Ok(self.snapshot()?.can_repair() && self.policies_allow())
    }

    /// When the table was last fully repaired.
    pub fn last_successful_run(&self) -> Result<i64, SchedError> {
        Ok(self.snapshot()?.last_completed_at_ms())
    }

    /// Expected duration of one full repair; the schedule starts repairs
    /// this much before the interval elapses.
    pub fn run_offset(&self) -> Result<i64, SchedError> {
        Ok(self.snapshot()?.estimated_repair_time_ms())
    }

    /// Plan the repair tasks for the current snapshot: one task per replica
    /// repair group, in snapshot order.
    pub fn tasks(&self, now_ms: i64) -> Result<Vec<RepairTask>, SchedError> {
        let snapshot = self.snapshot()?;
        let tokens_per_task = self.tokens_per_task(&snapshot);

        Ok(snapshot
            .groups()
            .iter()
            .map(|group| {
                RepairTask::new(
                    group.clone(),
                    tokens_per_task.clone(),
                    self.table.clone(),
                    self.config.clone(),
                    self.collaborators.repair_history.clone(),
                    self.collaborators.proxy_factory.clone(),
                    self.collaborators.table_metrics.clone(),
                    self.collaborators.lock_type.lock_factory(),
                    self.collaborators.policies.clone(),
                    self.id,
                    priority_for(
                        group.last_completed_at_ms,
                        now_ms,
                        &self.config,
                        snapshot.estimated_repair_time_ms(),
                    ),
                )
            })
            .collect())
    }

    /// Called by the runner after a task finished: refresh the repair state
    /// so the next planning pass sees the run. Update failures are logged
    /// and swallowed; the stale snapshot stays authoritative.
    pub async fn post_execute(&self, successful: bool, task: &RepairTask) {
        let started = Instant::now();
        if let Err(error) = self.cache.update(&self.table, &self.config).await {
            warn!(table = %self.table, %error, "failed to update repair state after task");
        }
        info!(
            table = %self.table,
            successful,
            task_priority = task.priority(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "repair state update after task run"
        );
    }

    /// Force a repair state refresh.
    pub async fn refresh_state(&self) -> Result<(), SchedError> {
        Ok(self.cache.update(&self.table, &self.config).await?)
    }

    fn snapshot(&self) -> Result<Arc<RepairStateSnapshot>, SchedError> {
        Ok(self.cache.snapshot(&self.table, &self.config)?)
    }

    fn policies_allow(&self) -> bool {
        self.collaborators
            .policies
            .iter()
            .all(|policy| policy.should_run(&self.table))
    }

    fn status_of(&self, snapshot: &RepairStateSnapshot, now_ms: i64) -> RepairStatus {
        if self.priority_of(snapshot, now_ms) != -1 && !self.policies_allow() {
            return RepairStatus::Blocked;
        }
        let since_repair = now_ms - snapshot.last_completed_at_ms();
        if since_repair >= self.config.error_ms() {
            RepairStatus::Overdue
        } else if since_repair >= self.config.warning_ms() {
            RepairStatus::Late
        } else if since_repair >= self.config.interval_ms() - snapshot.estimated_repair_time_ms() {
            RepairStatus::OnTime
        } else {
            RepairStatus::Completed
        }
    }

    fn progress_of(&self, snapshot: &RepairStateSnapshot, now_ms: i64) -> f64 {
        let vnodes = snapshot.vnodes();
        if vnodes.is_empty() {
            return 0.0;
        }
        let repaired = vnodes
            .iter()
            .filter(|vnode| vnode.is_repaired_at(now_ms, self.config.interval_ms()))
            .count();
        repaired as f64 / vnodes.len() as f64
    }

    fn next_run_of(&self, snapshot: &RepairStateSnapshot) -> i64 {
        snapshot.last_completed_at_ms() + self.config.interval_ms()
            - snapshot.estimated_repair_time_ms()
    }

    fn priority_of(&self, snapshot: &RepairStateSnapshot, now_ms: i64) -> i32 {
        if !snapshot.can_repair() {
            return -1;
        }
        let min_completed_at = snapshot
            .groups()
            .iter()
            .map(|group| group.last_completed_at_ms)
            .min()
            .unwrap_or(now_ms);
        priority_for(
            min_completed_at,
            now_ms,
            &self.config,
            snapshot.estimated_repair_time_ms(),
        )
    }

    /// Repair-unit size in tokens for the current snapshot.
    ///
    /// Full repair, an unknown table size and a table smaller than one
    /// target unit all repair the whole ring in a single unit.
    fn tokens_per_task(&self, snapshot: &RepairStateSnapshot) -> BigInt {
        let Some(target_bytes) = self.config.target_repair_size_bytes() else {
            return full_range();
        };
        let table_bytes = self.collaborators.storage_states.data_size_bytes(&self.table);
        if table_bytes <= 0 {
            return full_range();
        }
        let target_repairs = BigInt::from(table_bytes) / BigInt::from(target_bytes);
        if target_repairs == BigInt::from(0u8) {
            return full_range();
        }
        let total_tokens: BigInt = snapshot
            .vnodes()
            .iter()
            .map(|vnode| vnode.range.size())
            .sum();
        total_tokens / target_repairs
    }
}

impl std::fmt::Debug for TableRepairJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Repair job of {}", self.table)
    }
}

/// The base scheduler's timestamp-to-priority mapping: hours overdue plus
/// one, or `-1` when the run is not yet due.
fn priority_for(last_completed_at_ms: i64, now_ms: i64, config: &RepairConfig, run_offset_ms: i64) -> i32 {
    let due_at = last_completed_at_ms + config.interval_ms() - run_offset_ms;
    let overdue_ms = now_ms - due_at;
    if overdue_ms < 0 {
        return -1;
    }
    i32::try_from(overdue_ms / ONE_HOUR_MS)
        .unwrap_or(i32::MAX - 1)
        .saturating_add(1)
}
