use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A transient claim that a (task, project) is in flight. At most one
/// Assignment exists per key at any instant; keys older than a configured
/// TTL are stale and reaped at the start of each tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub task_id: String,
    pub assigned_at: DateTime<Utc>,
}

impl Assignment {
    pub fn key(task_type: &str, project_path: &str) -> String {
        format!("{task_type}:{project_path}")
    }

    pub fn is_stale(&self, ttl: std::time::Duration, now: DateTime<Utc>) -> bool {
        let age = now - self.assigned_at;
        age.to_std().map(|age| age > ttl).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failed,
    Partial,
}

/// Immutable history entry. Retained indefinitely in the store; the in-memory
/// cache held by State is capped at the 100 most recent per process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub provider: String,
    pub project: String,
    pub tasks: Vec<String>,
    pub tokens_used: u64,
    pub status: RunStatus,
    pub error: Option<String>,
    pub branch: String,
    pub output_type: Option<String>,
    pub output_ref: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskResultStatus {
    Completed,
    Failed,
    Abandoned,
}

/// Produced by the Orchestrator per task; summarized into a RunRecord rather
/// than persisted structurally on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub status: TaskResultStatus,
    pub iterations: u32,
    pub plan: String,
    pub output: String,
    pub logs: Vec<String>,
    pub output_type: Option<String>,
    pub output_ref: Option<String>,
}
