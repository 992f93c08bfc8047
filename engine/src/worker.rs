use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use nightshift_core::{EventBus, ShutdownHandle};
use nightshift_governor::{BudgetGovernor, GovernorConfig, SnapshotCollector, TrendAnalyzer};
use nightshift_orchestrator::{Agent, Committer, GitCommitter, Orchestrator, OrchestratorTask};
use nightshift_projects::{allocate_budget, merge_project_config, resolve_projects, ProjectDescriptor};
use nightshift_registry::{Selector, SelectorConfig, TaskRegistry};
use nightshift_runtime::SubprocessRunner;
use nightshift_state::State;
use nightshift_store::Store;
use nightshift_types::{RunRecord, RunStatus, TaskResultStatus};
use nightshift_usage::UsageOracle;

use crate::config::WorkerConfig;

/// Every long-lived component the worker needs to drive a single tick,
/// assembled once at startup and shared across `run`/`once`. Holds
/// references down to the store, state, and orchestrator; nothing here
/// points back up to its own caller.
pub struct Worker {
    pub store: Arc<Store>,
    pub state: Arc<State>,
    pub oracle: Arc<UsageOracle>,
    pub governors: HashMap<String, BudgetGovernor>,
    pub trend: TrendAnalyzer,
    pub snapshot_collector: SnapshotCollector,
    pub selector: Selector,
    pub agents: HashMap<String, Arc<dyn Agent>>,
    pub committer: Arc<dyn Committer>,
    pub orchestrator: Orchestrator,
    pub projects: Vec<ProjectDescriptor>,
    pub selector_config: SelectorConfig,
    pub weekly_token_budget: u64,
    pub assignment_ttl: Duration,
    pub config_global: nightshift_core::ConfigLayers,
    pub shutdown: ShutdownHandle,
}

/// Summary of what a single tick did, for `once`'s stdout report and
/// `run`'s structured log.
#[derive(Debug)]
pub struct TickOutcome {
    pub provider: String,
    pub project: PathBuf,
    pub task_id: String,
    pub status: TaskResultStatus,
    pub iterations: u32,
}

impl Worker {
    pub fn new(
        config: &WorkerConfig,
        store: Arc<Store>,
        state: Arc<State>,
        oracle: Arc<UsageOracle>,
        events: Arc<EventBus>,
        shutdown: ShutdownHandle,
    ) -> Self {
        let mut governors = HashMap::new();
        for provider in config.providers.keys().chain(std::iter::once(&config.default_provider)) {
            governors.entry(provider.clone()).or_insert_with(|| {
                BudgetGovernor::new(GovernorConfig {
                    weekly_token_budget: config.budget.weekly_token_budget,
                    max_percent: config.budget.max_percent,
                    reserve_percent: config.budget.reserve_percent,
                    mode: config.budget.mode,
                    per_provider_overrides: config.budget.per_provider_overrides.clone(),
                })
            });
        }

        let registry = TaskRegistry::new();
        let selector = Selector::new(registry);

        let mut selector_config = SelectorConfig::default();
        selector_config.base_priority = config.selector.base_priority.clone();
        selector_config.enabled_types = config.selector.enabled_types.iter().cloned().collect();
        selector_config.disabled_types = config.selector.disabled_types.iter().cloned().collect();
        selector_config.cooldown_overrides = config
            .selector
            .cooldown_overrides_secs
            .iter()
            .map(|(k, v)| (k.clone(), Duration::from_secs(*v)))
            .collect();

        let agents = crate::providers::build_agents(&config.providers);
        let committer: Arc<dyn Committer> = Arc::new(GitCommitter::new(SubprocessRunner::new()));
        let orchestrator = Orchestrator::new(config.max_iterations)
            .with_phase_timeout(Duration::from_secs(config.phase_timeout_secs))
            .with_events(events);

        let snapshot_collector = SnapshotCollector::new(store.clone(), oracle.clone(), config.week_start_day);
        let trend = TrendAnalyzer::default();

        Self {
            store,
            state,
            oracle,
            governors,
            trend,
            snapshot_collector,
            selector,
            agents,
            committer,
            orchestrator,
            projects: config.projects.clone(),
            selector_config,
            weekly_token_budget: config.budget.weekly_token_budget,
            assignment_ttl: Duration::from_secs(config.assignment_ttl_secs),
            config_global: nightshift_core::ConfigLayers::default(),
            shutdown,
        }
    }

    /// Runs exactly one tick: reap stale assignments, collect a usage
    /// snapshot per provider, then for every allowed provider walk its
    /// resolved projects in priority-descending order, running one task per
    /// eligible project. Only cancellation short-circuits the walk; a single
    /// task failing is logged and the tick moves on to the next project.
    /// Returns the outcomes of every task actually run this tick, empty if
    /// nothing was eligible.
    pub async fn run_once(&self) -> anyhow::Result<Vec<TickOutcome>> {
        let now = Utc::now();
        let reaped = self.state.reap_stale_assignments(self.assignment_ttl, now).await?;
        if reaped > 0 {
            tracing::info!(reaped, "reaped stale assignments");
        }
        self.snapshot_collector.collect_all().await?;

        let resolved = resolve_projects(&self.projects)?;
        if resolved.is_empty() {
            tracing::warn!("no projects resolved from configured descriptors");
            return Ok(Vec::new());
        }

        let mut outcomes = Vec::new();

        for (provider, agent) in &self.agents {
            if self.shutdown.is_cancelled() {
                return Ok(outcomes);
            }

            let Some(governor) = self.governors.get(provider) else {
                continue;
            };
            let projected = self
                .trend
                .predict_daytime_usage(&self.store, provider, now, self.weekly_token_budget)
                .await?;
            let (allowed, cap, reason) = governor.evaluate(&self.oracle, provider, projected).await;
            if !allowed {
                tracing::debug!(provider, reason, "provider denied by budget governor this tick");
                continue;
            }

            let priorities: Vec<u32> = resolved.iter().map(|(_, p)| *p).collect();
            let Some(allocations) = allocate_budget(&priorities, cap) else {
                continue;
            };

            for ((path, _priority), project_cap) in resolved.iter().zip(allocations.iter()) {
                if self.shutdown.is_cancelled() {
                    return Ok(outcomes);
                }

                let project_str = path.to_string_lossy().to_string();
                let Some(scored) = self
                    .selector
                    .select_and_assign(&self.selector_config, &self.state, &project_str, *project_cap)
                    .await
                else {
                    continue;
                };

                let task_id = nightshift_types::Assignment::key(&scored.definition.type_id, &project_str);
                tracing::info!(provider, project = %project_str, task_id, "running task");

                let outcome = self
                    .run_task_to_completion(agent.as_ref(), provider, path, &task_id, &scored.definition.type_id)
                    .await;

                self.state.clear_assigned(&task_id).await?;

                match outcome {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(err) => {
                        tracing::error!(provider, project = %project_str, task_id, %err, "task failed, continuing tick");
                    }
                }
            }
        }

        Ok(outcomes)
    }

    async fn run_task_to_completion(
        &self,
        agent: &dyn Agent,
        provider: &str,
        project_path: &PathBuf,
        task_id: &str,
        type_id: &str,
    ) -> anyhow::Result<TickOutcome> {
        // Per-project .nightshift.yaml overrides apply to task selection upstream;
        // loading it here just surfaces a malformed override file as a task failure.
        let _merged = merge_project_config(&self.config_global, project_path)?;

        let task = OrchestratorTask {
            task_id: task_id.to_string(),
            description: format!("Execute the {type_id} maintenance task against {}", project_path.display()),
        };

        let started = Utc::now();
        let cancel = self.shutdown.child_token();
        let result = self
            .orchestrator
            .run_task(agent, self.committer.as_ref(), &task, project_path, cancel)
            .await;
        let ended = Utc::now();

        let status = match result.status {
            TaskResultStatus::Completed => RunStatus::Success,
            TaskResultStatus::Failed => RunStatus::Failed,
            TaskResultStatus::Abandoned => RunStatus::Partial,
        };

        let project_str = project_path.to_string_lossy().to_string();
        let record = RunRecord {
            id: uuid::Uuid::new_v4().to_string(),
            start: started,
            end: ended,
            provider: provider.to_string(),
            project: project_str.clone(),
            tasks: vec![type_id.to_string()],
            tokens_used: 0,
            status,
            error: if result.status == TaskResultStatus::Failed {
                result.logs.last().cloned()
            } else {
                None
            },
            branch: "main".to_string(),
            output_type: result.output_type.clone(),
            output_ref: result.output_ref.clone(),
        };
        self.state.add_run_record(record).await?;

        if result.status == TaskResultStatus::Completed {
            self.state.record_project_run(&project_str, ended).await?;
            self.state.record_task_run(&project_str, type_id, ended).await?;
        }

        Ok(TickOutcome {
            provider: provider.to_string(),
            project: project_path.clone(),
            task_id: task_id.to_string(),
            status: result.status,
            iterations: result.iterations,
        })
    }
}
