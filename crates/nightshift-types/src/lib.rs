//! Shared data model for Nightshift: entities and value types used across every component.

mod error;
mod project;
mod run;
mod snapshot;
mod task;
mod usage;

pub use error::{NightshiftError, NightshiftResult};
pub use project::{normalize_project_path, ProjectRecord};
pub use run::{Assignment, RunRecord, RunStatus, TaskResult, TaskResultStatus};
pub use snapshot::Snapshot;
pub use task::{CostTier, TaskCategory, TaskDefinition, TaskRisk};
pub use usage::{BudgetMode, UsageReading};

use chrono::{DateTime, Utc};

/// Current wall-clock time. Isolated behind a function so orchestration code
/// and tests can agree on a single notion of "now".
pub fn now() -> DateTime<Utc> {
    Utc::now()
}
