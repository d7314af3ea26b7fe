//! TOML configuration for the Cadence daemon.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a working configuration. Durations accept `"7d"`, `"12h"`,
//! `"30m"`, `"45s"` or raw milliseconds; sizes accept `"1GB"`, `"512MB"`,
//! `"100KB"`, raw bytes, or the sentinel `"FULL"` for full repair.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use cadence_types::{RepairConfig, TableRef};
use serde::Deserialize;

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CadenceConfig {
    /// Repair state cache tuning.
    pub state: StateSection,
    /// Metrics supplier and failure logger tuning.
    pub metrics: MetricsSection,
    /// Default repair configuration for all tables.
    pub repair: RepairSection,
    /// Logging configuration.
    pub log: LogSection,
    /// The tables to schedule repairs for.
    pub tables: Vec<TableSection>,
}

/// `[state]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StateSection {
    /// Cadence of the background repair state refresh, in milliseconds.
    pub refresh_interval_ms: u64,
}

impl Default for StateSection {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 5_000,
        }
    }
}

/// `[metrics]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MetricsSection {
    /// Cadence of the gauge supplier, in seconds.
    pub update_interval_secs: u64,
    /// Cadence of the failure logger, in minutes.
    pub logger_interval_minutes: u64,
    /// Minimum failed repair sessions per logger tick before logging.
    pub failed_repair_sessions_threshold: u64,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            update_interval_secs: 5,
            logger_interval_minutes: 10,
            failed_repair_sessions_threshold: 5,
        }
    }
}

/// `[repair]` section: cluster-wide repair defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RepairSection {
    /// How often each table should be repaired (e.g. `"7d"`).
    pub interval: Option<String>,
    /// Age at which a table counts as late (e.g. `"8d"`).
    pub warning: Option<String>,
    /// Age at which a table counts as overdue (e.g. `"10d"`).
    pub error: Option<String>,
    /// Target size of one repair unit (e.g. `"512MB"`), or `"FULL"`.
    pub target_repair_size: Option<String>,
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// `[[tables]]` entry: one table to schedule, with optional overrides of
/// the `[repair]` defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TableSection {
    /// Keyspace name.
    pub keyspace: String,
    /// Table name.
    pub table: String,
    /// Override of `repair.interval` for this table.
    pub interval: Option<String>,
    /// Override of `repair.warning` for this table.
    pub warning: Option<String>,
    /// Override of `repair.error` for this table.
    pub error: Option<String>,
    /// Override of `repair.target_repair_size` for this table.
    pub target_repair_size: Option<String>,
}

impl CadenceConfig {
    /// Load config from a TOML file, or use defaults if no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                let config: CadenceConfig = toml::from_str(&content)
                    .with_context(|| format!("parsing config file {}", path.display()))?;
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse config from a TOML string (used in tests).
    #[cfg(test)]
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Cadence of the repair state refresh worker.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.state.refresh_interval_ms)
    }

    /// Cadence of the gauge supplier.
    pub fn metrics_update_interval(&self) -> Duration {
        Duration::from_secs(self.metrics.update_interval_secs)
    }

    /// Cadence of the failure logger.
    pub fn metrics_logger_interval(&self) -> Duration {
        Duration::from_secs(self.metrics.logger_interval_minutes * 60)
    }

    /// Failure logger threshold.
    pub fn failed_repair_sessions_threshold(&self) -> u64 {
        self.metrics.failed_repair_sessions_threshold
    }

    /// Configured log level.
    pub fn log_level(&self) -> &str {
        &self.log.level
    }

    /// The tables to schedule, each with its effective repair config.
    pub fn scheduled_tables(&self) -> anyhow::Result<Vec<(TableRef, RepairConfig)>> {
        let mut scheduled = Vec::with_capacity(self.tables.len());
        for entry in &self.tables {
            if entry.keyspace.is_empty() || entry.table.is_empty() {
                bail!("every [[tables]] entry needs a keyspace and a table");
            }
            let table = TableRef::new(&entry.keyspace, &entry.table);
            let config = self
                .repair_config_for(entry)
                .with_context(|| format!("repair configuration for {table}"))?;
            scheduled.push((table, config));
        }
        Ok(scheduled)
    }

    /// Effective repair config for one table: per-table overrides on top of
    /// the `[repair]` defaults.
    fn repair_config_for(&self, entry: &TableSection) -> anyhow::Result<RepairConfig> {
        let interval_ms = match entry.interval.as_deref().or(self.repair.interval.as_deref()) {
            Some(raw) => parse_duration_ms(raw)?,
            None => RepairConfig::DEFAULT_INTERVAL_MS,
        };
        let warning_ms = match entry.warning.as_deref().or(self.repair.warning.as_deref()) {
            Some(raw) => parse_duration_ms(raw)?,
            None => RepairConfig::DEFAULT_WARNING_MS,
        };
        let error_ms = match entry.error.as_deref().or(self.repair.error.as_deref()) {
            Some(raw) => parse_duration_ms(raw)?,
            None => RepairConfig::DEFAULT_ERROR_MS,
        };
        let target = match entry
            .target_repair_size
            .as_deref()
            .or(self.repair.target_repair_size.as_deref())
        {
            Some(raw) => parse_repair_size_bytes(raw)?,
            None => None,
        };
        Ok(RepairConfig::new(interval_ms, warning_ms, error_ms, target)?)
    }
}

/// Parse a duration string into milliseconds.
///
/// Supports `"7d"`, `"12h"`, `"30m"`, `"45s"` and raw millisecond values.
fn parse_duration_ms(raw: &str) -> anyhow::Result<i64> {
    let raw = raw.trim();
    let (digits, multiplier) = match raw.chars().last() {
        Some('d') => (&raw[..raw.len() - 1], 24 * 3_600 * 1_000),
        Some('h') => (&raw[..raw.len() - 1], 3_600 * 1_000),
        Some('m') => (&raw[..raw.len() - 1], 60 * 1_000),
        Some('s') => (&raw[..raw.len() - 1], 1_000),
        _ => (raw, 1),
    };
    let value: i64 = digits
        .trim()
        .parse()
        .with_context(|| format!("invalid duration {raw:?}"))?;
    Ok(value * multiplier)
}

/// Parse a repair size string into bytes; `"FULL"` selects full repair.
fn parse_repair_size_bytes(raw: &str) -> anyhow::Result<Option<i64>> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("full") {
        return Ok(None);
    }
    let (digits, multiplier) = if let Some(number) = raw.strip_suffix("GB") {
        (number, 1_073_741_824)
    } else if let Some(number) = raw.strip_suffix("MB") {
        (number, 1_048_576)
    } else if let Some(number) = raw.strip_suffix("KB") {
        (number, 1_024)
    } else {
        (raw, 1)
    };
    let value: i64 = digits
        .trim()
        .parse()
        .with_context(|| format!("invalid repair size {raw:?}"))?;
    Ok(Some(value * multiplier))
}
