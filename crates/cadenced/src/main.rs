//! `cadenced` — the Cadence repair orchestrator daemon.
//!
//! Binary entrypoint that wires the repair state cache, the metrics
//! supplier and the failure logger around a file-backed cluster state.
//!
//! # Usage
//!
//! ```text
//! cadenced plan -s cluster-state.toml              # one-shot planning pass
//! cadenced plan -c cadence.toml -s state.toml      # with a config file
//! cadenced watch -c cadence.toml -s state.toml     # run workers until ctrl-c
//! ```

mod config;
mod statefile;
mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use cadence_metrics::{InMemoryMeterRegistry, MetricsLogger, RepairMetricSupplier, TableRepairMetrics};
use cadence_sched::{
    Collaborators, NodeProxyFactory, RepairHistory, RepairLockType, TableRepairJob,
};
use cadence_state::RepairStateCache;
use cadence_types::{TableRef, now_ms};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};

use config::CadenceConfig;
use statefile::{FileRepairStateFactory, load_storage_states};

#[derive(Parser)]
#[command(name = "cadenced", about = "Autonomous repair orchestrator")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// One-shot planning pass: print status, progress and planned tasks.
    Plan {
        /// Path to the cluster state file.
        #[arg(short, long)]
        state: PathBuf,
    },
    /// Run the refresh, metrics and failure-log workers until interrupted.
    Watch {
        /// Path to the cluster state file.
        #[arg(short, long)]
        state: PathBuf,
    },
}

// -----------------------------------------------------------------------
// Stand-in collaborators
// -----------------------------------------------------------------------

/// The daemon has no repair executor, so the history handle carried by
/// planned tasks has nothing to record into.
struct NoOpRepairHistory;
impl RepairHistory for NoOpRepairHistory {}

/// No management connections are opened from the planning CLI.
struct NoOpProxyFactory;
impl NodeProxyFactory for NoOpProxyFactory {}

/// Gauge sink that writes into the log stream.
struct LoggedRepairMetrics;

impl TableRepairMetrics for LoggedRepairMetrics {
    fn last_repaired_at(&self, table: &TableRef, timestamp_ms: i64) {
        debug!(%table, timestamp_ms, "gauge: last repaired at");
    }

    fn repaired_ratio(&self, table: &TableRef, ratio: f64) {
        debug!(%table, ratio, "gauge: repaired ratio");
    }

    fn remaining_repair_time(&self, table: &TableRef, time_ms: i64) {
        debug!(%table, time_ms, "gauge: remaining repair time");
    }
}

// -----------------------------------------------------------------------
// Wiring
// -----------------------------------------------------------------------

struct Orchestrator {
    cache: Arc<RepairStateCache>,
    jobs: Vec<TableRepairJob>,
}

async fn build_orchestrator(
    config: &CadenceConfig,
    state_path: &PathBuf,
) -> anyhow::Result<Orchestrator> {
    let cache = Arc::new(RepairStateCache::with_refresh_interval(
        Box::new(FileRepairStateFactory::new(state_path)),
        config.refresh_interval(),
    ));
    let storage = Arc::new(load_storage_states(state_path).await?);
    let metrics: Arc<dyn TableRepairMetrics> = Arc::new(LoggedRepairMetrics);

    let scheduled = config.scheduled_tables()?;
    if scheduled.is_empty() {
        warn!("no [[tables]] configured, nothing to plan");
    }

    let mut jobs = Vec::with_capacity(scheduled.len());
    for (table, repair_config) in scheduled {
        // First load; a failure leaves the empty snapshot in place and the
        // refresh worker keeps retrying.
        if let Err(error) = cache.update(&table, &repair_config).await {
            warn!(%table, %error, "initial repair state load failed");
        }
        jobs.push(TableRepairJob::new(
            table,
            repair_config,
            cache.clone(),
            Collaborators {
                storage_states: storage.clone(),
                repair_history: Arc::new(NoOpRepairHistory),
                proxy_factory: Arc::new(NoOpProxyFactory),
                table_metrics: metrics.clone(),
                lock_type: RepairLockType::Vnode,
                policies: Vec::new(),
            },
        ));
    }

    Ok(Orchestrator { cache, jobs })
}

fn print_plan(jobs: &[TableRepairJob]) -> anyhow::Result<()> {
    let now = now_ms();
    for job in jobs {
        let view = job.view().context("deriving job view")?;
        println!(
            "{} [{}] progress {:.0}% next run at {} (repaired {} vnodes in {} groups)",
            view.table,
            view.status,
            view.progress * 100.0,
            view.next_run_ms,
            view.snapshot.vnodes().len(),
            view.snapshot.groups().len(),
        );

        for task in job.tasks(now).context("planning tasks")? {
            let units = task.repair_units().context("partitioning ranges")?;
            println!(
                "  task priority {:>3}: {} replicas, {} ranges in {} repair units",
                task.priority(),
                task.group().replicas.len(),
                task.group().vnodes.len(),
                units.len(),
            );
        }
    }
    Ok(())
}

async fn plan(config: &CadenceConfig, state_path: &PathBuf) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(config, state_path).await?;
    let result = print_plan(&orchestrator.jobs);
    orchestrator.cache.close().await;
    result
}

async fn watch(config: &CadenceConfig, state_path: &PathBuf) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(config, state_path).await?;

    let registry = Arc::new(InMemoryMeterRegistry::new());
    let supplier = RepairMetricSupplier::with_update_interval(
        Arc::new(LoggedRepairMetrics),
        config.metrics_update_interval(),
    );
    for job in &orchestrator.jobs {
        match orchestrator.cache.state(job.table(), job.repair_config()) {
            Ok(state) => supplier.register(job.table().clone(), state),
            Err(error) => warn!(table = %job.table(), %error, "could not register table for metrics"),
        }
    }
    let logger = MetricsLogger::with_log_interval(
        registry,
        config.failed_repair_sessions_threshold(),
        config.metrics_logger_interval(),
    );

    info!(tables = orchestrator.jobs.len(), "cadenced watching");
    let mut report = tokio::time::interval(Duration::from_secs(30));
    loop {
        tokio::select! {
            _ = report.tick() => {
                for job in &orchestrator.jobs {
                    match job.view() {
                        Ok(view) => info!(
                            table = %view.table,
                            status = %view.status,
                            progress = view.progress,
                            next_run_ms = view.next_run_ms,
                            "repair schedule"
                        ),
                        Err(error) => warn!(table = %job.table(), %error, "could not derive job view"),
                    }
                }
            }
            result = tokio::signal::ctrl_c() => {
                result.context("waiting for ctrl-c")?;
                break;
            }
        }
    }

    info!("shutting down");
    supplier.close().await;
    logger.close().await;
    orchestrator.cache.close().await;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = CadenceConfig::load(cli.config.as_deref())?;
    telemetry::init(config.log_level());

    match &cli.command {
        Command::Plan { state } => plan(&config, state).await,
        Command::Watch { state } => watch(&config, state).await,
    }
}
