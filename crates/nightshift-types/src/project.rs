use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalizes a project path so that `p`, `p/`, `p/./`, and `p/x/..` all collapse
/// to the same key. Expands a leading `~` and lexically collapses
/// `.`/`..` components without touching the filesystem — the project directory
/// need not exist yet when this is called.
pub fn normalize_project_path(input: &str) -> String {
    let expanded = if let Some(rest) = input.strip_prefix("~/") {
        dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(input))
    } else if input == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(input))
    } else {
        PathBuf::from(input)
    };

    let mut out = PathBuf::new();
    for component in expanded.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(out.components().last(), Some(Component::RootDir) | None) {
                    out.pop();
                } else {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }

    let normalized = out.to_string_lossy().to_string();
    if normalized.len() > 1 && normalized.ends_with(std::path::MAIN_SEPARATOR) {
        normalized.trim_end_matches(std::path::MAIN_SEPARATOR).to_string()
    } else {
        normalized
    }
}

/// Durable record of a project's run history. Identified by its normalized
/// absolute path. Created on first successful task execution; never destroyed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub path: String,
    pub last_run: Option<DateTime<Utc>>,
    pub run_count: u64,
    pub task_last_run: HashMap<String, DateTime<Utc>>,
}

impl ProjectRecord {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: normalize_project_path(&path.into()),
            last_run: None,
            run_count: 0,
            task_last_run: HashMap::new(),
        }
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.path)
    }

    pub fn days_since_last_run(&self, task_type: &str) -> i64 {
        match self.task_last_run.get(task_type) {
            Some(ts) => (Utc::now() - *ts).num_days(),
            None => -1,
        }
    }

    pub fn was_processed_today(&self, now_local: DateTime<chrono::Local>) -> bool {
        match self.last_run {
            Some(ts) => {
                let ts_local: DateTime<chrono::Local> = DateTime::from(ts);
                ts_local.date_naive() == now_local.date_naive()
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_normalizes_equal() {
        assert_eq!(normalize_project_path("/a/b"), normalize_project_path("/a/b/"));
    }

    #[test]
    fn dot_and_dotdot_collapse() {
        assert_eq!(normalize_project_path("/a/b"), normalize_project_path("/a/b/./"));
        assert_eq!(normalize_project_path("/a/b"), normalize_project_path("/a/b/x/.."));
    }

    #[test]
    fn days_since_last_run_never_run_is_negative_one() {
        let record = ProjectRecord::new("/tmp/repo");
        assert_eq!(record.days_since_last_run("docs-backfill"), -1);
    }
}
