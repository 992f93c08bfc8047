use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::Utc;
use nightshift_state::State;
use nightshift_types::{Assignment, TaskDefinition};
use rand::seq::SliceRandom;

use crate::registry::TaskRegistry;

/// Per-tick knobs the selector reads from configuration rather than the
/// registry or store.
#[derive(Debug, Clone, Default)]
pub struct SelectorConfig {
    pub base_priority: HashMap<String, f64>,
    pub enabled_types: HashSet<String>,
    pub disabled_types: HashSet<String>,
    pub cooldown_overrides: HashMap<String, Duration>,
    pub context_referenced: HashSet<String>,
    pub externally_queued: HashSet<String>,
    /// Preview-mode simulated cooldowns: types to exclude without touching State.
    pub preview_excluded: HashSet<String>,
}

impl SelectorConfig {
    fn base_priority_for(&self, type_id: &str) -> f64 {
        self.base_priority.get(type_id).copied().unwrap_or(0.0)
    }

    fn is_enabled(&self, def: &TaskDefinition) -> bool {
        if self.disabled_types.contains(&def.type_id) {
            return false;
        }
        if def.disabled_by_default && !self.enabled_types.contains(&def.type_id) {
            return false;
        }
        true
    }

    fn cooldown_for(&self, def: &TaskDefinition) -> Duration {
        self.cooldown_overrides.get(&def.type_id).copied().unwrap_or(def.default_cooldown)
    }
}

#[derive(Debug, Clone)]
pub struct ScoredTask {
    pub definition: TaskDefinition,
    pub score: f64,
}

fn staleness_bonus(days_since_last_run: i64) -> f64 {
    if days_since_last_run < 0 {
        3.0
    } else {
        0.1 * (days_since_last_run as f64).min(30.0)
    }
}

/// Scores and picks the next eligible (task, project) from the registry
/// given state, config, and budget.
pub struct Selector {
    registry: TaskRegistry,
}

impl Selector {
    pub fn new(registry: TaskRegistry) -> Self {
        Self { registry }
    }

    /// Runs the four-stage filter pipeline and scores the survivors,
    /// sorted descending by score.
    pub async fn scored_candidates(
        &self,
        config: &SelectorConfig,
        state: &State,
        project: &str,
        budget_cap: u64,
    ) -> Vec<ScoredTask> {
        let assigned: HashSet<String> = state
            .with_assignments_locked(|assignments| assignments.values().map(|a: &Assignment| a.task_id.clone()).collect())
            .await;

        let mut scored = Vec::new();
        for def in self.registry.all_definitions_sorted() {
            if !config.is_enabled(&def) {
                continue;
            }
            if def.max_cost() > budget_cap {
                continue;
            }
            let key = Assignment::key(&def.type_id, project);
            if assigned.contains(&key) {
                continue;
            }
            if config.preview_excluded.contains(&def.type_id) {
                continue;
            }

            let days_since = state.days_since_last_run(project, &def.type_id).await;
            let interval = config.cooldown_for(&def);
            if days_since >= 0 && !interval.is_zero() {
                if let Some(last_run) = state.last_task_run(project, &def.type_id).await {
                    let age = (Utc::now() - last_run).to_std().unwrap_or(Duration::ZERO);
                    if age < interval {
                        continue;
                    }
                }
            }

            let mut score = config.base_priority_for(&def.type_id) + staleness_bonus(days_since);
            if config.context_referenced.contains(&def.type_id) {
                score += 2.0;
            }
            if config.externally_queued.contains(&def.type_id) {
                score += 3.0;
            }
            scored.push(ScoredTask { definition: def, score });
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored
    }

    pub async fn select_next(&self, config: &SelectorConfig, state: &State, project: &str, budget_cap: u64) -> Option<ScoredTask> {
        self.scored_candidates(config, state, project, budget_cap).await.into_iter().next()
    }

    pub async fn select_top_n(&self, config: &SelectorConfig, state: &State, project: &str, budget_cap: u64, n: usize) -> Vec<ScoredTask> {
        let mut candidates = self.scored_candidates(config, state, project, budget_cap).await;
        candidates.truncate(n);
        candidates
    }

    pub async fn select_random(&self, config: &SelectorConfig, state: &State, project: &str, budget_cap: u64) -> Option<ScoredTask> {
        let candidates = self.scored_candidates(config, state, project, budget_cap).await;
        candidates.choose(&mut rand::thread_rng()).cloned()
    }

    /// Filters and scores, then walks survivors best-first, attempting
    /// `MarkAssigned` on each until one succeeds. `MarkAssigned` itself is
    /// the atomic test-and-set; the walk exists so a race that claims the
    /// top candidate falls through to the next rather than returning none.
    pub async fn select_and_assign(
        &self,
        config: &SelectorConfig,
        state: &State,
        project: &str,
        budget_cap: u64,
    ) -> Option<ScoredTask> {
        let candidates = self.scored_candidates(config, state, project, budget_cap).await;
        let now = Utc::now();
        for candidate in candidates {
            let key = Assignment::key(&candidate.definition.type_id, project);
            if state.mark_assigned(&key, now).await.ok()? {
                return Some(candidate);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nightshift_store::Store;
    use std::sync::Arc;

    async fn fresh_state() -> (tempfile::TempDir, State) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(&dir.path().join("nightshift.db")).await.unwrap());
        let state = State::load(store).await.unwrap();
        (dir, state)
    }

    #[tokio::test]
    async fn never_run_task_gets_strongest_staleness_bonus() {
        let (_dir, state) = fresh_state().await;
        let registry = TaskRegistry::new();
        let selector = Selector::new(registry);
        let config = SelectorConfig::default();

        let candidates = selector.scored_candidates(&config, &state, "/a/b", 1_000_000).await;
        let typo = candidates.iter().find(|c| c.definition.type_id == "typo-sweep").unwrap();
        assert!((typo.score - 3.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn disabled_by_default_task_excluded_unless_enabled() {
        let (_dir, state) = fresh_state().await;
        let registry = TaskRegistry::new();
        let selector = Selector::new(registry);
        let config = SelectorConfig::default();

        let candidates = selector.scored_candidates(&config, &state, "/a/b", 1_000_000).await;
        assert!(!candidates.iter().any(|c| c.definition.type_id == "deps-minor-bump"));

        let mut enabled_config = SelectorConfig::default();
        enabled_config.enabled_types.insert("deps-minor-bump".to_string());
        let candidates = selector.scored_candidates(&enabled_config, &state, "/a/b", 1_000_000).await;
        assert!(candidates.iter().any(|c| c.definition.type_id == "deps-minor-bump"));
    }

    #[tokio::test]
    async fn budget_filter_drops_tasks_over_cap() {
        let (_dir, state) = fresh_state().await;
        let registry = TaskRegistry::new();
        let selector = Selector::new(registry);
        let config = SelectorConfig::default();

        let candidates = selector.scored_candidates(&config, &state, "/a/b", 5_000).await;
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn select_and_assign_is_mutually_exclusive() {
        let (_dir, state) = fresh_state().await;
        let registry = TaskRegistry::new();
        let selector = Selector::new(registry);
        let config = SelectorConfig::default();

        let first = selector.select_and_assign(&config, &state, "/a/b", 1_000_000).await.unwrap();
        let second = selector.select_and_assign(&config, &state, "/a/b", 1_000_000).await.unwrap();
        assert_ne!(first.definition.type_id, second.definition.type_id);
    }

    #[tokio::test]
    async fn cooldown_filter_drops_recently_run_task() {
        let (_dir, state) = fresh_state().await;
        state.record_task_run("/a/b", "typo-sweep", Utc::now()).await.unwrap();
        let registry = TaskRegistry::new();
        let selector = Selector::new(registry);
        let config = SelectorConfig::default();

        let candidates = selector.scored_candidates(&config, &state, "/a/b", 1_000_000).await;
        assert!(!candidates.iter().any(|c| c.definition.type_id == "typo-sweep"));
    }

    #[tokio::test]
    async fn preview_excluded_task_is_dropped_without_touching_state() {
        let (_dir, state) = fresh_state().await;
        let registry = TaskRegistry::new();
        let selector = Selector::new(registry);
        let mut config = SelectorConfig::default();
        config.preview_excluded.insert("typo-sweep".to_string());

        let candidates = selector.scored_candidates(&config, &state, "/a/b", 1_000_000).await;
        assert!(!candidates.iter().any(|c| c.definition.type_id == "typo-sweep"));
        assert_eq!(state.days_since_last_run("/a/b", "typo-sweep").await, -1);
    }
}
