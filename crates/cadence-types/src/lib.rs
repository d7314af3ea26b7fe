//! Shared types and identifiers for Cadence.
//!
//! This crate defines the value types used across the Cadence workspace:
//! identifiers ([`NodeId`], [`JobId`]), the table reference ([`TableRef`])
//! and the per-table repair configuration ([`RepairConfig`]).
//!
//! `(TableRef, RepairConfig)` pairs are used as cache keys throughout the
//! workspace, so both types have full value equality and hashing.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ID types
// ---------------------------------------------------------------------------

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        pub struct $name([u8; 16]);

        impl $name {
            /// Create an ID by hashing arbitrary data with BLAKE3 (truncated).
            pub fn from_data(data: &[u8]) -> Self {
                let hash = blake3::hash(data);
                let bytes: [u8; 16] = hash.as_bytes()[..16].try_into().expect("16 bytes");
                Self(bytes)
            }

            /// Return the raw 16-byte representation.
            pub fn as_bytes(&self) -> &[u8; 16] {
                &self.0
            }
        }

        impl From<[u8; 16]> for $name {
            fn from(bytes: [u8; 16]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for byte in &self.0 {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }
    };
}

define_id!(
    /// Identifier for a storage node, derived from the node's host id.
    NodeId
);

define_id!(
    /// Stable identifier for a scheduled repair job, derived from the table
    /// it repairs.
    JobId
);

// ---------------------------------------------------------------------------
// Table reference
// ---------------------------------------------------------------------------

/// Reference to a table in the cluster.
///
/// Value type: two `TableRef`s are equal iff keyspace and table name match.
/// Cloning is cheap (shared string storage).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableRef {
    keyspace: Arc<str>,
    table: Arc<str>,
}

impl TableRef {
    /// Create a reference to `keyspace.table`.
    pub fn new(keyspace: &str, table: &str) -> Self {
        Self {
            keyspace: Arc::from(keyspace),
            table: Arc::from(table),
        }
    }

    /// The keyspace name.
    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    /// The table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Stable job id for this table.
    pub fn job_id(&self) -> JobId {
        JobId::from_data(format!("{self}").as_bytes())
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.keyspace, self.table)
    }
}

impl fmt::Debug for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableRef({self})")
    }
}

// ---------------------------------------------------------------------------
// Repair configuration
// ---------------------------------------------------------------------------

/// One second in milliseconds.
pub const ONE_SECOND_MS: i64 = 1_000;
/// One hour in milliseconds.
pub const ONE_HOUR_MS: i64 = 3_600 * ONE_SECOND_MS;
/// One day in milliseconds.
pub const ONE_DAY_MS: i64 = 24 * ONE_HOUR_MS;

/// Errors raised when building invalid configuration values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A repair interval, warning or error time was zero or negative.
    #[error("repair time {name} must be positive, got {value}ms")]
    NonPositiveTime {
        /// Which field was invalid.
        name: &'static str,
        /// The rejected value.
        value: i64,
    },

    /// The warning/error thresholds do not bracket the interval.
    #[error(
        "repair thresholds must be ordered interval <= warning <= error, \
         got {interval_ms}/{warning_ms}/{error_ms}"
    )]
    UnorderedThresholds {
        /// Configured repair interval.
        interval_ms: i64,
        /// Configured warning time.
        warning_ms: i64,
        /// Configured error time.
        error_ms: i64,
    },

    /// A target repair size was zero or negative.
    #[error("target repair size must be positive, got {0} bytes")]
    NonPositiveTargetSize(i64),
}

/// Per-table repair configuration.
///
/// Forms a cache key together with [`TableRef`], so equality and hashing
/// cover every field. Built through [`RepairConfig::new`], which rejects
/// inconsistent values at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepairConfig {
    interval_ms: i64,
    warning_ms: i64,
    error_ms: i64,
    /// Target size of one repair unit in bytes; `None` repairs the whole
    /// token range in a single unit (full repair).
    target_repair_size_bytes: Option<i64>,
}

impl RepairConfig {
    /// Default repair interval: 7 days.
    pub const DEFAULT_INTERVAL_MS: i64 = 7 * ONE_DAY_MS;
    /// Default warning time: 8 days.
    pub const DEFAULT_WARNING_MS: i64 = 8 * ONE_DAY_MS;
    /// Default error time: 10 days.
    pub const DEFAULT_ERROR_MS: i64 = 10 * ONE_DAY_MS;

    /// Create a repair configuration.
    ///
    /// `target_repair_size_bytes` of `None` selects full repair (one unit
    /// spanning the whole ring).
    pub fn new(
        interval_ms: i64,
        warning_ms: i64,
        error_ms: i64,
        target_repair_size_bytes: Option<i64>,
    ) -> Result<Self, ConfigError> {
        for (name, value) in [
            ("interval", interval_ms),
            ("warning", warning_ms),
            ("error", error_ms),
        ] {
            if value <= 0 {
                return Err(ConfigError::NonPositiveTime { name, value });
            }
        }
        if interval_ms > warning_ms || warning_ms > error_ms {
            return Err(ConfigError::UnorderedThresholds {
                interval_ms,
                warning_ms,
                error_ms,
            });
        }
        if let Some(target) = target_repair_size_bytes
            && target <= 0
        {
            return Err(ConfigError::NonPositiveTargetSize(target));
        }

        Ok(Self {
            interval_ms,
            warning_ms,
            error_ms,
            target_repair_size_bytes,
        })
    }

    /// How often the table should be fully repaired.
    pub fn interval_ms(&self) -> i64 {
        self.interval_ms
    }

    /// Age after which the repair status degrades to late.
    pub fn warning_ms(&self) -> i64 {
        self.warning_ms
    }

    /// Age after which the repair status degrades to overdue.
    pub fn error_ms(&self) -> i64 {
        self.error_ms
    }

    /// Target size of one repair unit, or `None` for full repair.
    pub fn target_repair_size_bytes(&self) -> Option<i64> {
        self.target_repair_size_bytes
    }

    /// Whether this configuration repairs the whole ring in one unit.
    pub fn is_full_repair(&self) -> bool {
        self.target_repair_size_bytes.is_none()
    }
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            interval_ms: Self::DEFAULT_INTERVAL_MS,
            warning_ms: Self::DEFAULT_WARNING_MS,
            error_ms: Self::DEFAULT_ERROR_MS,
            target_repair_size_bytes: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Current wall-clock time in milliseconds since the UNIX epoch.
pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
