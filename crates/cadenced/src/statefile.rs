//! File-backed repair states.
//!
//! The daemon's concrete [`RepairStateFactory`]: instead of querying a live
//! cluster, it reads a TOML "cluster state" document describing each
//! table's vnodes, replica placement and repair history. Every
//! [`RepairState::update`] re-reads the file and swaps in a fresh snapshot,
//! so editing the file while `watch` runs behaves like cluster state
//! changing under a live orchestrator.
//!
//! ```toml
//! [[tables]]
//! keyspace = "shop"
//! table = "orders"
//! can_repair = true
//! estimated_repair_time_ms = 60000
//! data_size_bytes = 1073741824
//!
//! [[tables.vnodes]]
//! start = -9223372036854775808
//! end = 0
//! replicas = ["node-a", "node-b"]
//! last_repaired_at_ms = 1700000000000
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use cadence_ring::TokenRange;
use cadence_sched::TableStorageStates;
use cadence_state::{
    RepairState, RepairStateFactory, RepairStateSnapshot, SnapshotCell, StateError,
    UNREPAIRED_MS, VnodeRepairState,
};
use cadence_types::{NodeId, RepairConfig, TableRef};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct StateFile {
    #[serde(default)]
    tables: Vec<TableState>,
}

#[derive(Debug, Deserialize)]
struct TableState {
    keyspace: String,
    table: String,
    #[serde(default = "default_true")]
    can_repair: bool,
    #[serde(default)]
    estimated_repair_time_ms: i64,
    #[serde(default)]
    data_size_bytes: i64,
    #[serde(default)]
    vnodes: Vec<VnodeEntry>,
}

#[derive(Debug, Deserialize)]
struct VnodeEntry {
    start: i64,
    end: i64,
    #[serde(default)]
    replicas: Vec<String>,
    #[serde(default = "default_unrepaired")]
    last_repaired_at_ms: i64,
    #[serde(default)]
    estimated_repair_time_ms: i64,
}

fn default_true() -> bool {
    true
}

fn default_unrepaired() -> i64 {
    UNREPAIRED_MS
}

impl TableState {
    fn to_snapshot(&self) -> RepairStateSnapshot {
        let vnodes = self
            .vnodes
            .iter()
            .map(|entry| {
                VnodeRepairState::new(
                    TokenRange::new(entry.start, entry.end),
                    entry
                        .replicas
                        .iter()
                        .map(|name| NodeId::from_data(name.as_bytes())),
                    entry.last_repaired_at_ms,
                    entry.estimated_repair_time_ms,
                )
            })
            .collect();
        RepairStateSnapshot::build(vnodes, self.can_repair, self.estimated_repair_time_ms)
    }
}

async fn read_state_file(path: &Path) -> Result<StateFile, StateError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(StateError::update)?;
    toml::from_str(&raw).map_err(StateError::update)
}

/// Repair state of one table, recomputed from the state file on update.
struct FileRepairState {
    path: PathBuf,
    table: TableRef,
    config: RepairConfig,
    cell: SnapshotCell,
}

#[async_trait]
impl RepairState for FileRepairState {
    async fn update(&self) -> Result<(), StateError> {
        let file = read_state_file(&self.path).await?;
        let entry = file
            .tables
            .iter()
            .find(|entry| {
                entry.keyspace == self.table.keyspace() && entry.table == self.table.table()
            })
            .ok_or_else(|| {
                StateError::update(format!("table {} not present in state file", self.table))
            })?;
        self.cell.store(entry.to_snapshot());
        Ok(())
    }

    fn snapshot(&self) -> Arc<RepairStateSnapshot> {
        self.cell.load()
    }

    fn repair_config(&self) -> &RepairConfig {
        &self.config
    }
}

/// Factory producing [`FileRepairState`]s for one state file.
pub struct FileRepairStateFactory {
    path: PathBuf,
}

impl FileRepairStateFactory {
    /// Create a factory reading from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RepairStateFactory for FileRepairStateFactory {
    fn create(&self, table: &TableRef, config: &RepairConfig) -> Arc<dyn RepairState> {
        Arc::new(FileRepairState {
            path: self.path.clone(),
            table: table.clone(),
            config: config.clone(),
            cell: SnapshotCell::new(),
        })
    }
}

/// Table sizes read once from the state file at startup.
pub struct FileStorageStates {
    sizes: HashMap<TableRef, i64>,
}

impl TableStorageStates for FileStorageStates {
    fn data_size_bytes(&self, table: &TableRef) -> i64 {
        self.sizes.get(table).copied().unwrap_or(0)
    }
}

/// Load the per-table storage sizes from the state file.
pub async fn load_storage_states(path: &Path) -> anyhow::Result<FileStorageStates> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading state file {}", path.display()))?;
    let file: StateFile =
        toml::from_str(&raw).with_context(|| format!("parsing state file {}", path.display()))?;

    let sizes = file
        .tables
        .iter()
        .map(|entry| {
            (
                TableRef::new(&entry.keyspace, &entry.table),
                entry.data_size_bytes,
            )
        })
        .collect();
    Ok(FileStorageStates { sizes })
}
