mod config;
mod providers;
mod worker;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use nightshift_core::{ConfigLoader, EventBus, ShutdownHandle, StoragePaths};
use nightshift_observability::{init_logging, LoggingConfig};
use nightshift_scheduler::Scheduler;
use nightshift_state::State;
use nightshift_store::Store;
use nightshift_usage::UsageOracle;

use crate::config::{ScheduleTrigger, WorkerConfig};
use crate::worker::Worker;

#[derive(Parser, Debug)]
#[command(name = "nightshift")]
#[command(about = "Autonomous off-hours maintenance worker driving AI coding agent CLIs")]
struct Cli {
    /// Overrides the default global config file location.
    #[arg(long, env = "NIGHTSHIFT_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides the `NIGHTSHIFT_LOG` env filter (e.g. "debug", "nightshift_orchestrator=trace").
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Starts the long-lived worker: scheduler ticks drive the budget
    /// governor, selector, and orchestrator until interrupted.
    Run,
    /// Runs a single tick synchronously, then exits. For cron-driven
    /// invocation or manual testing.
    Once,
    /// Prints current budget/assignment/recent-run state from the store
    /// without starting the scheduler.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = StoragePaths::resolve()?;
    paths.ensure_data_dir()?;

    if let Some(level) = &cli.log_level {
        std::env::set_var("NIGHTSHIFT_LOG", level);
    }
    let logging_config = LoggingConfig {
        logs_dir: Some(paths.logs_dir.clone()),
        ..Default::default()
    };
    let _logging_guard = init_logging(&logging_config)?;

    let loader = ConfigLoader::default();
    let config_path = cli.config.clone().unwrap_or_else(ConfigLoader::default_global_config_path);
    let layers = loader.load_global(&config_path)?;
    let worker_config = WorkerConfig::from_effective(layers.effective())?;

    let store = Arc::new(Store::open(&paths.db_path).await?);
    let state = Arc::new(State::load(store.clone()).await?);
    let adapters = crate::providers::build_usage_adapters(&worker_config.providers);
    let oracle = Arc::new(UsageOracle::with_default_ttl(adapters));
    let events = Arc::new(EventBus::new());
    let shutdown = ShutdownHandle::new();

    let worker = Worker::new(&worker_config, store.clone(), state.clone(), oracle, events, shutdown.clone());

    match cli.command {
        Command::Run => run_scheduled(&worker_config, worker, shutdown).await,
        Command::Once => run_once(&worker).await,
        Command::Status => print_status(&state).await,
    }
}

async fn run_once(worker: &Worker) -> anyhow::Result<()> {
    let outcomes = worker.run_once().await?;
    if outcomes.is_empty() {
        println!("nothing eligible to run this tick");
    }
    for outcome in &outcomes {
        println!(
            "ran {} on {} ({}) -> {:?} after {} iteration(s)",
            outcome.task_id,
            outcome.project.display(),
            outcome.provider,
            outcome.status,
            outcome.iterations
        );
    }
    Ok(())
}

async fn run_scheduled(worker_config: &WorkerConfig, worker: Worker, shutdown: ShutdownHandle) -> anyhow::Result<()> {
    let window = worker_config.schedule.window.as_ref().map(|w| nightshift_scheduler::TimeWindow::new(w.start, w.end, w.timezone));

    let scheduler = match &worker_config.schedule.trigger {
        ScheduleTrigger::Cron(expr) => Scheduler::cron(expr, window)?,
        ScheduleTrigger::Interval(interval) => Scheduler::interval(*interval, window)?,
    };

    let worker = Arc::new(worker);
    let tick_worker = worker.clone();
    scheduler.start(move || {
        let worker = tick_worker.clone();
        async move {
            match worker.run_once().await {
                Ok(outcomes) if outcomes.is_empty() => tracing::debug!("tick found nothing eligible to run"),
                Ok(outcomes) => {
                    for outcome in &outcomes {
                        tracing::info!(
                            provider = outcome.provider,
                            project = %outcome.project.display(),
                            task_id = outcome.task_id,
                            status = ?outcome.status,
                            iterations = outcome.iterations,
                            "tick completed"
                        );
                    }
                }
                Err(err) => tracing::error!(%err, "tick failed"),
            }
        }
    })?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");

    // Cancels any in-flight agent call the current tick is waiting on, then
    // stops the scheduler from firing another one.
    shutdown.cancel();
    scheduler.stop().await?;
    Ok(())
}

async fn print_status(state: &State) -> anyhow::Result<()> {
    let projects = state.all_projects().await;
    println!("projects: {}", projects.len());
    for project in &projects {
        println!(
            "  {} runs={} last_run={}",
            project.path,
            project.run_count,
            project
                .last_run
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string())
        );
    }

    let runs = state.recent_runs().await;
    println!("recent runs: {}", runs.len());
    for run in runs.iter().rev().take(10) {
        println!(
            "  {} {} {:?} tasks={:?}",
            run.start.to_rfc3339(),
            run.project,
            run.status,
            run.tasks
        );
    }

    Ok(())
}
