//! Repair metrics plumbing for Cadence.
//!
//! This crate provides:
//!
//! - [`RepairMetricSupplier`] — periodically refreshes registered repair
//!   states and pushes their gauge values into a [`TableRepairMetrics`]
//!   sink.
//! - [`MetricsLogger`] — scans a [`MeterRegistry`] for failed repair
//!   sessions and logs tables whose failure count passed a threshold, so
//!   problems surface in the logs even when the statistics backend is
//!   disabled.
//! - [`InMemoryMeterRegistry`] — an atomic-counter registry used by the
//!   daemon and the test suites; production deployments plug in their own
//!   [`MeterRegistry`].

pub mod failure_log;
pub mod registry;
pub mod supplier;

pub use failure_log::MetricsLogger;
pub use registry::{
    InMemoryMeterRegistry, KEYSPACE_TAG, MeterId, MeterRegistry, REPAIR_SESSIONS, SUCCESSFUL_TAG,
    TABLE_TAG, TimerSnapshot,
};
pub use supplier::{RepairMetricSupplier, TableRepairMetrics};
