use std::path::Path;

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Shape of the pre-SQLite JSON state file. Mirrors the tables this store now
/// maintains; a legacy install that predates the SQLite store serialized its
/// entire state this way.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LegacyState {
    #[serde(default)]
    pub projects: Vec<LegacyProject>,
    #[serde(default)]
    pub assignments: Vec<LegacyAssignment>,
    #[serde(default)]
    pub run_records: Vec<LegacyRunRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LegacyProject {
    pub path: String,
    pub last_run: Option<String>,
    pub run_count: i64,
    #[serde(default)]
    pub task_last_run: std::collections::HashMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LegacyAssignment {
    pub task_id: String,
    pub assigned_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LegacyRunRecord {
    pub id: String,
    pub start: String,
    pub end: String,
    pub provider: String,
    pub project: String,
    pub tasks: Vec<String>,
    pub tokens_used: i64,
    pub status: String,
    pub error: Option<String>,
    pub branch: String,
    pub output_type: Option<String>,
    pub output_ref: Option<String>,
}

/// Imports `legacy_path` into `conn` inside a single transaction iff the core
/// tables are currently empty. On success, renames the source file with a
/// `.migrated` suffix. Any failure rolls the transaction back and leaves the
/// source file untouched.
pub fn import_if_present(conn: &mut Connection, legacy_path: &Path) -> StoreResult<bool> {
    if !legacy_path.exists() {
        return Ok(false);
    }

    let project_count: i64 = conn.query_row("SELECT COUNT(*) FROM projects", [], |r| r.get(0))?;
    if project_count > 0 {
        return Ok(false);
    }

    let raw = std::fs::read_to_string(legacy_path)?;
    let legacy: LegacyState =
        serde_json::from_str(&raw).map_err(|e| StoreError::Import(format!("parse failed: {e}")))?;

    let tx = conn.transaction().map_err(StoreError::Connect)?;
    let result: StoreResult<()> = (|| {
        for project in &legacy.projects {
            tx.execute(
                "INSERT INTO projects (path, last_run, run_count) VALUES (?1, ?2, ?3)",
                params![project.path, project.last_run, project.run_count],
            )?;
            for (task_type, last_run) in &project.task_last_run {
                tx.execute(
                    "INSERT INTO project_task_runs (project_path, task_type, last_run) VALUES (?1, ?2, ?3)",
                    params![project.path, task_type, last_run],
                )?;
            }
        }
        for assignment in &legacy.assignments {
            tx.execute(
                "INSERT INTO assignments (task_id, assigned_at) VALUES (?1, ?2)",
                params![assignment.task_id, assignment.assigned_at],
            )?;
        }
        for run in &legacy.run_records {
            let tasks_json = serde_json::to_string(&run.tasks)?;
            tx.execute(
                "INSERT INTO run_records (id, start, end, provider, project, tasks, tokens_used, status, error, branch, output_type, output_ref)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    run.id, run.start, run.end, run.provider, run.project, tasks_json,
                    run.tokens_used, run.status, run.error, run.branch, run.output_type, run.output_ref
                ],
            )?;
        }
        Ok(())
    })();

    match result {
        Ok(()) => {
            tx.commit().map_err(StoreError::Connect)?;
            let migrated_path = legacy_path.with_extension("json.migrated");
            std::fs::rename(legacy_path, migrated_path)?;
            Ok(true)
        }
        Err(err) => {
            // tx dropped here rolls back implicitly.
            Err(StoreError::Import(err.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::apply_pending;

    #[test]
    fn import_rolls_back_on_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let legacy_path = dir.path().join("state.json");
        std::fs::write(&legacy_path, "{not valid json").unwrap();

        let mut conn = Connection::open_in_memory().unwrap();
        apply_pending(&conn).unwrap();

        let result = import_if_present(&mut conn, &legacy_path);
        assert!(result.is_err());
        assert!(legacy_path.exists(), "source file must be untouched on failure");
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM projects", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn import_renames_source_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let legacy_path = dir.path().join("state.json");
        let legacy = LegacyState {
            projects: vec![LegacyProject {
                path: "/a/b".into(),
                last_run: None,
                run_count: 0,
                task_last_run: Default::default(),
            }],
            assignments: vec![],
            run_records: vec![],
        };
        std::fs::write(&legacy_path, serde_json::to_string(&legacy).unwrap()).unwrap();

        let mut conn = Connection::open_in_memory().unwrap();
        apply_pending(&conn).unwrap();

        let imported = import_if_present(&mut conn, &legacy_path).unwrap();
        assert!(imported);
        assert!(!legacy_path.exists());
        assert!(dir.path().join("state.json.migrated").exists());
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM projects", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
    }
}
