use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use nightshift_store::{Store, StoreResult};
use nightshift_types::{normalize_project_path, Assignment, ProjectRecord, RunRecord};
use tokio::sync::RwLock;

const RECENT_RUN_CAP: usize = 100;

struct StateInner {
    projects: HashMap<String, ProjectRecord>,
    assignments: HashMap<String, Assignment>,
    recent_runs: VecDeque<RunRecord>,
}

/// In-memory cache of ProjectRecords, Assignments, and the last-100
/// RunRecords, backed by Store. One write lock guards all three maps so
/// that filter-then-assign sequences (the Selector's atomicity requirement)
/// can run under a single critical section.
pub struct State {
    store: Arc<Store>,
    inner: RwLock<StateInner>,
}

impl State {
    pub async fn load(store: Arc<Store>) -> StoreResult<Self> {
        let projects = store
            .all_projects()
            .await?
            .into_iter()
            .map(|p| (p.path.clone(), p))
            .collect();
        let assignments = store
            .all_assignments()
            .await?
            .into_iter()
            .map(|a| (a.task_id.clone(), a))
            .collect();
        let recent_runs = store.recent_run_records(RECENT_RUN_CAP).await?.into();

        Ok(Self {
            store,
            inner: RwLock::new(StateInner {
                projects,
                assignments,
                recent_runs,
            }),
        })
    }

    pub async fn project(&self, path: &str) -> Option<ProjectRecord> {
        let key = normalize_project_path(path);
        self.inner.read().await.projects.get(&key).cloned()
    }

    pub async fn all_projects(&self) -> Vec<ProjectRecord> {
        self.inner.read().await.projects.values().cloned().collect()
    }

    pub async fn assignment(&self, task_id: &str) -> Option<Assignment> {
        self.inner.read().await.assignments.get(task_id).cloned()
    }

    pub async fn recent_runs(&self) -> Vec<RunRecord> {
        self.inner.read().await.recent_runs.iter().cloned().collect()
    }

    pub async fn was_processed_today(&self, path: &str, now_local: DateTime<Local>) -> bool {
        let key = normalize_project_path(path);
        self.inner
            .read()
            .await
            .projects
            .get(&key)
            .map(|p| p.was_processed_today(now_local))
            .unwrap_or(false)
    }

    pub async fn last_task_run(&self, path: &str, task_type: &str) -> Option<DateTime<Utc>> {
        let key = normalize_project_path(path);
        self.inner
            .read()
            .await
            .projects
            .get(&key)
            .and_then(|p| p.task_last_run.get(task_type).copied())
    }

    pub async fn days_since_last_run(&self, path: &str, task_type: &str) -> i64 {
        let key = normalize_project_path(path);
        self.inner
            .read()
            .await
            .projects
            .get(&key)
            .map(|p| p.days_since_last_run(task_type))
            .unwrap_or(-1)
    }

    pub async fn record_project_run(&self, path: &str, at: DateTime<Utc>) -> StoreResult<()> {
        let key = normalize_project_path(path);
        let mut guard = self.inner.write().await;
        let record = guard
            .projects
            .entry(key.clone())
            .or_insert_with(|| ProjectRecord::new(key.clone()));
        record.last_run = Some(at);
        record.run_count += 1;
        let snapshot = record.clone();
        drop(guard);
        self.store.upsert_project(&snapshot).await
    }

    pub async fn record_task_run(&self, path: &str, task_type: &str, at: DateTime<Utc>) -> StoreResult<()> {
        let key = normalize_project_path(path);
        let mut guard = self.inner.write().await;
        let record = guard
            .projects
            .entry(key.clone())
            .or_insert_with(|| ProjectRecord::new(key.clone()));
        record.task_last_run.insert(task_type.to_string(), at);
        let snapshot = record.clone();
        drop(guard);
        self.store.upsert_project(&snapshot).await
    }

    pub async fn mark_assigned(&self, task_id: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        let assignment = Assignment {
            task_id: task_id.to_string(),
            assigned_at: at,
        };
        let mut guard = self.inner.write().await;
        if guard.assignments.contains_key(task_id) {
            return Ok(false);
        }
        let persisted = self.store.mark_assigned(&assignment).await?;
        if persisted {
            guard.assignments.insert(task_id.to_string(), assignment);
        }
        Ok(persisted)
    }

    pub async fn clear_assigned(&self, task_id: &str) -> StoreResult<()> {
        let mut guard = self.inner.write().await;
        guard.assignments.remove(task_id);
        drop(guard);
        self.store.clear_assigned(task_id).await
    }

    /// Sweeps assignments older than `ttl`, clearing both the in-memory map
    /// and the store entry. Recovers state from a crash where `mark_assigned`
    /// committed but `clear_assigned` never ran.
    pub async fn reap_stale_assignments(&self, ttl: std::time::Duration, now: DateTime<Utc>) -> StoreResult<usize> {
        let mut guard = self.inner.write().await;
        let stale: Vec<String> = guard
            .assignments
            .values()
            .filter(|a| a.is_stale(ttl, now))
            .map(|a| a.task_id.clone())
            .collect();
        for task_id in &stale {
            guard.assignments.remove(task_id);
        }
        drop(guard);
        for task_id in &stale {
            self.store.clear_assigned(task_id).await?;
        }
        Ok(stale.len())
    }

    pub async fn add_run_record(&self, record: RunRecord) -> StoreResult<()> {
        self.store.add_run_record(&record).await?;
        let mut guard = self.inner.write().await;
        guard.recent_runs.push_back(record);
        while guard.recent_runs.len() > RECENT_RUN_CAP {
            guard.recent_runs.pop_front();
        }
        Ok(())
    }

    /// Runs `f` with exclusive access to the assignment map, for callers (the
    /// Selector) that need filter-then-assign to be atomic across more state
    /// than a single `mark_assigned` call covers.
    pub async fn with_assignments_locked<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&HashMap<String, Assignment>) -> R,
    {
        let guard = self.inner.read().await;
        f(&guard.assignments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn state_with_empty_store() -> (tempfile::TempDir, State) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(&dir.path().join("nightshift.db")).await.unwrap());
        let state = State::load(store).await.unwrap();
        (dir, state)
    }

    #[tokio::test]
    async fn record_project_run_normalizes_path() {
        let (_dir, state) = state_with_empty_store().await;
        state.record_project_run("/a/b/", Utc::now()).await.unwrap();
        assert!(state.project("/a/b").await.is_some());
    }

    #[tokio::test]
    async fn mark_assigned_is_exclusive() {
        let (_dir, state) = state_with_empty_store().await;
        let now = Utc::now();
        assert!(state.mark_assigned("docs-backfill:/a/b", now).await.unwrap());
        assert!(!state.mark_assigned("docs-backfill:/a/b", now).await.unwrap());
        state.clear_assigned("docs-backfill:/a/b").await.unwrap();
        assert!(state.mark_assigned("docs-backfill:/a/b", now).await.unwrap());
    }

    #[tokio::test]
    async fn reap_stale_assignments_clears_expired_only() {
        let (_dir, state) = state_with_empty_store().await;
        let old = Utc::now() - chrono::Duration::hours(2);
        let fresh = Utc::now();
        state.mark_assigned("stale:/a", old).await.unwrap();
        state.mark_assigned("fresh:/b", fresh).await.unwrap();

        let reaped = state
            .reap_stale_assignments(std::time::Duration::from_secs(3600), Utc::now())
            .await
            .unwrap();
        assert_eq!(reaped, 1);
        assert!(state.assignment("stale:/a").await.is_none());
        assert!(state.assignment("fresh:/b").await.is_some());
    }

    #[tokio::test]
    async fn recent_runs_cap_at_100() {
        let (_dir, state) = state_with_empty_store().await;
        for i in 0..105 {
            let record = RunRecord {
                id: format!("run-{i}"),
                start: Utc::now(),
                end: Utc::now(),
                provider: "claude".into(),
                project: "/a/b".into(),
                tasks: vec![],
                tokens_used: 0,
                status: nightshift_types::RunStatus::Success,
                error: None,
                branch: "main".into(),
                output_type: None,
                output_ref: None,
            };
            state.add_run_record(record).await.unwrap();
        }
        assert_eq!(state.recent_runs().await.len(), 100);
    }
}
