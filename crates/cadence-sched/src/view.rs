//! User-facing view of a scheduled repair job.

use std::fmt;
use std::sync::Arc;

use cadence_state::RepairStateSnapshot;
use cadence_types::{JobId, RepairConfig, TableRef};

/// Scheduling status of a table repair job.
///
/// Statuses are ordered by urgency: a job moves through
/// `Completed -> OnTime -> Late -> Overdue` as time passes without a
/// repair. `Blocked` is orthogonal: the job is due but a policy denies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStatus {
    /// Repaired within the interval; nothing to do yet.
    Completed,
    /// Due for repair within the normal schedule.
    OnTime,
    /// Unrepaired past the warning time.
    Late,
    /// Unrepaired past the error time.
    Overdue,
    /// Due, but an external policy currently denies running.
    Blocked,
}

impl fmt::Display for RepairStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RepairStatus::Completed => "COMPLETED",
            RepairStatus::OnTime => "ON_TIME",
            RepairStatus::Late => "LATE",
            RepairStatus::Overdue => "OVERDUE",
            RepairStatus::Blocked => "BLOCKED",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of a repair job, for status endpoints and the CLI.
#[derive(Clone)]
pub struct ScheduledRepairJobView {
    /// Stable id of the job.
    pub id: JobId,
    /// The table the job repairs.
    pub table: TableRef,
    /// The repair configuration in effect.
    pub config: RepairConfig,
    /// The snapshot the view was derived from.
    pub snapshot: Arc<RepairStateSnapshot>,
    /// Current status.
    pub status: RepairStatus,
    /// Fraction of vnodes repaired within the interval, in `[0, 1]`.
    pub progress: f64,
    /// When the next repair is due (ms since epoch; may be in the past).
    pub next_run_ms: i64,
}

impl fmt::Debug for ScheduledRepairJobView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledRepairJobView")
            .field("table", &self.table)
            .field("status", &self.status)
            .field("progress", &self.progress)
            .field("next_run_ms", &self.next_run_ms)
            .finish_non_exhaustive()
    }
}
