//! Meter registry abstraction for repair session metrics.
//!
//! The orchestrator does not own a metrics backend; it only needs to find
//! repair-session timers by name and tags. [`MeterRegistry`] is that seam,
//! and [`InMemoryMeterRegistry`] is a small atomic-counter implementation
//! for the daemon and for tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cadence_types::TableRef;

/// Meter name under which repair sessions are timed.
pub const REPAIR_SESSIONS: &str = "repair_sessions";
/// Tag carrying the keyspace name.
pub const KEYSPACE_TAG: &str = "keyspace";
/// Tag carrying the table name.
pub const TABLE_TAG: &str = "table";
/// Tag distinguishing successful from failed sessions (`"true"`/`"false"`).
pub const SUCCESSFUL_TAG: &str = "successful";

/// Identity of a meter: its name plus its tag set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MeterId {
    name: String,
    tags: BTreeMap<String, String>,
}

impl MeterId {
    /// Create a meter id with no tags.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: BTreeMap::new(),
        }
    }

    /// Add a tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// The meter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a tag value.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Whether this id has the given name and carries every given tag pair.
    pub fn matches(&self, name: &str, tags: &[(&str, &str)]) -> bool {
        self.name == name
            && tags
                .iter()
                .all(|&(key, value)| self.tag(key) == Some(value))
    }
}

/// Point-in-time view of one timer.
#[derive(Debug, Clone)]
pub struct TimerSnapshot {
    /// The timer's identity.
    pub id: MeterId,
    /// Number of recorded events.
    pub count: u64,
    /// Total recorded duration in milliseconds.
    pub total_time_ms: u64,
}

/// Tag-filtered timer search over an external metrics backend.
pub trait MeterRegistry: Send + Sync {
    /// All timers with the given meter name whose tags include every given
    /// pair. An empty result is fine; callers treat it as "nothing to
    /// report".
    fn timers(&self, name: &str, tags: &[(&str, &str)]) -> Vec<TimerSnapshot>;
}

#[derive(Default)]
struct SessionTimer {
    count: AtomicU64,
    total_time_ms: AtomicU64,
}

/// Meter registry backed by in-process atomic counters.
#[derive(Default)]
pub struct InMemoryMeterRegistry {
    timers: Mutex<HashMap<MeterId, Arc<SessionTimer>>>,
}

impl InMemoryMeterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one repair session for the table.
    pub fn record_repair_session(&self, table: &TableRef, successful: bool, elapsed: Duration) {
        let id = MeterId::new(REPAIR_SESSIONS)
            .with_tag(KEYSPACE_TAG, table.keyspace())
            .with_tag(TABLE_TAG, table.table())
            .with_tag(SUCCESSFUL_TAG, if successful { "true" } else { "false" });

        let timer = {
            let mut timers = self.timers.lock().expect("timer map lock poisoned");
            timers.entry(id).or_default().clone()
        };
        timer.count.fetch_add(1, Ordering::Relaxed);
        timer
            .total_time_ms
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
    }
}

impl MeterRegistry for InMemoryMeterRegistry {
    fn timers(&self, name: &str, tags: &[(&str, &str)]) -> Vec<TimerSnapshot> {
        let timers = self.timers.lock().expect("timer map lock poisoned");
        timers
            .iter()
            .filter(|(id, _)| id.matches(name, tags))
            .map(|(id, timer)| TimerSnapshot {
                id: id.clone(),
                count: timer.count.load(Ordering::Relaxed),
                total_time_ms: timer.total_time_ms.load(Ordering::Relaxed),
            })
            .collect()
    }
}
