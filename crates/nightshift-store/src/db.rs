use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use nightshift_types::{
    Assignment, ProjectRecord, RunRecord, RunStatus, Snapshot,
};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::legacy_import;
use crate::migrations;

/// Owns the single SQLite connection. All write operations go through
/// prepared statements; multi-row imports always run in one transaction.
/// WAL + busy_timeout + enforced foreign keys are set on open.
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    #[allow(dead_code)]
    db_path: PathBuf,
}

impl Store {
    pub async fn open(db_path: &Path) -> StoreResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(StoreError::DirCreate)?;
        }

        let mut conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        migrations::apply_pending(&conn)?;

        let legacy_path = db_path.with_file_name("state.json");
        match legacy_import::import_if_present(&mut conn, &legacy_path) {
            Ok(true) => tracing::info!("imported legacy state from {}", legacy_path.display()),
            Ok(false) => {}
            Err(err) => tracing::error!("legacy import failed: {err}"),
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: db_path.to_path_buf(),
        })
    }

    pub async fn schema_version(&self) -> StoreResult<i64> {
        let conn = self.conn.lock().await;
        migrations::schema_version(&conn)
    }

    pub async fn close(&self) {
        // Connection drops with the Arc; nothing else to flush. Idempotent by
        // construction since repeated calls are harmless no-ops.
    }

    // -- projects -----------------------------------------------------------

    pub async fn upsert_project(&self, record: &ProjectRecord) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO projects (path, last_run, run_count) VALUES (?1, ?2, ?3)
             ON CONFLICT(path) DO UPDATE SET last_run = excluded.last_run, run_count = excluded.run_count",
            params![record.path, record.last_run.map(|t| t.to_rfc3339()), record.run_count as i64],
        )?;
        for (task_type, last_run) in &record.task_last_run {
            conn.execute(
                "INSERT INTO project_task_runs (project_path, task_type, last_run) VALUES (?1, ?2, ?3)
                 ON CONFLICT(project_path, task_type) DO UPDATE SET last_run = excluded.last_run",
                params![record.path, task_type, last_run.to_rfc3339()],
            )?;
        }
        Ok(())
    }

    pub async fn load_project(&self, path: &str) -> StoreResult<Option<ProjectRecord>> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT path, last_run, run_count FROM projects WHERE path = ?1",
                params![path],
                |row| {
                    let last_run: Option<String> = row.get(1)?;
                    Ok((
                        row.get::<_, String>(0)?,
                        last_run,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((path, last_run, run_count)) = row else {
            return Ok(None);
        };

        let mut stmt =
            conn.prepare("SELECT task_type, last_run FROM project_task_runs WHERE project_path = ?1")?;
        let task_rows = stmt.query_map(params![path], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut task_last_run = HashMap::new();
        for row in task_rows {
            let (task_type, ts) = row?;
            if let Ok(parsed) = DateTime::parse_from_rfc3339(&ts) {
                task_last_run.insert(task_type, parsed.with_timezone(&Utc));
            }
        }

        Ok(Some(ProjectRecord {
            path,
            last_run: last_run
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|d| d.with_timezone(&Utc)),
            run_count: run_count as u64,
            task_last_run,
        }))
    }

    pub async fn all_projects(&self) -> StoreResult<Vec<ProjectRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT path FROM projects")?;
        let paths: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<_, _>>()?;
        drop(stmt);
        drop(conn);
        let mut out = Vec::with_capacity(paths.len());
        for path in paths {
            if let Some(record) = self.load_project(&path).await? {
                out.push(record);
            }
        }
        Ok(out)
    }

    // -- assignments ----------------------------------------------------

    pub async fn mark_assigned(&self, assignment: &Assignment) -> StoreResult<bool> {
        let conn = self.conn.lock().await;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO assignments (task_id, assigned_at) VALUES (?1, ?2)",
            params![assignment.task_id, assignment.assigned_at.to_rfc3339()],
        )?;
        Ok(inserted == 1)
    }

    pub async fn clear_assigned(&self, task_id: &str) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM assignments WHERE task_id = ?1", params![task_id])?;
        Ok(())
    }

    pub async fn all_assignments(&self) -> StoreResult<Vec<Assignment>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT task_id, assigned_at FROM assignments")?;
        let rows = stmt.query_map([], |row| {
            let ts: String = row.get(1)?;
            Ok((row.get::<_, String>(0)?, ts))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (task_id, ts) = row?;
            if let Ok(parsed) = DateTime::parse_from_rfc3339(&ts) {
                out.push(Assignment {
                    task_id,
                    assigned_at: parsed.with_timezone(&Utc),
                });
            }
        }
        Ok(out)
    }

    // -- run records ------------------------------------------------------

    pub async fn add_run_record(&self, record: &RunRecord) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        let tasks_json = serde_json::to_string(&record.tasks)?;
        let status = match record.status {
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
            RunStatus::Partial => "partial",
        };
        conn.execute(
            "INSERT INTO run_records (id, start, end, provider, project, tasks, tokens_used, status, error, branch, output_type, output_ref)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                record.id,
                record.start.to_rfc3339(),
                record.end.to_rfc3339(),
                record.provider,
                record.project,
                tasks_json,
                record.tokens_used as i64,
                status,
                record.error,
                record.branch,
                record.output_type,
                record.output_ref,
            ],
        )?;
        Ok(())
    }

    pub async fn recent_run_records(&self, limit: usize) -> StoreResult<Vec<RunRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, start, end, provider, project, tasks, tokens_used, status, error, branch, output_type, output_ref
             FROM run_records ORDER BY start DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            let tasks_json: String = row.get(5)?;
            let status: String = row.get(7)?;
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                tasks_json,
                row.get::<_, i64>(6)?,
                status,
                row.get::<_, Option<String>>(8)?,
                row.get::<_, String>(9)?,
                row.get::<_, Option<String>>(10)?,
                row.get::<_, Option<String>>(11)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, start, end, provider, project, tasks_json, tokens_used, status, error, branch, output_type, output_ref) = row?;
            let tasks: Vec<String> = serde_json::from_str(&tasks_json).unwrap_or_default();
            let status = match status.as_str() {
                "success" => RunStatus::Success,
                "failed" => RunStatus::Failed,
                _ => RunStatus::Partial,
            };
            out.push(RunRecord {
                id,
                start: DateTime::parse_from_rfc3339(&start)
                    .map(|d| d.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
                end: DateTime::parse_from_rfc3339(&end)
                    .map(|d| d.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
                provider,
                project,
                tasks,
                tokens_used: tokens_used as u64,
                status,
                error,
                branch,
                output_type,
                output_ref,
            });
        }
        Ok(out)
    }

    // -- snapshots --------------------------------------------------------

    pub async fn insert_snapshot(&self, snapshot: &Snapshot) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO snapshots (id, provider, timestamp, week_start, local_tokens, local_daily, scraped_pct, inferred_budget, session_reset_time, weekly_reset_time, day_of_week, hour_of_day, iso_week_number, iso_year)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                snapshot.id,
                snapshot.provider,
                snapshot.timestamp.to_rfc3339(),
                snapshot.week_start.to_rfc3339(),
                snapshot.local_tokens as i64,
                snapshot.local_daily as i64,
                snapshot.scraped_pct,
                snapshot.inferred_budget.map(|v| v as i64),
                snapshot.session_reset_time.map(|t| t.to_rfc3339()),
                snapshot.weekly_reset_time.map(|t| t.to_rfc3339()),
                snapshot.day_of_week,
                snapshot.hour_of_day,
                snapshot.iso_week_number,
                snapshot.iso_year,
            ],
        )?;
        Ok(())
    }

    pub async fn snapshots_since(&self, provider: &str, since: DateTime<Utc>) -> StoreResult<Vec<Snapshot>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, provider, timestamp, week_start, local_tokens, local_daily, scraped_pct, inferred_budget, session_reset_time, weekly_reset_time, day_of_week, hour_of_day, iso_week_number, iso_year
             FROM snapshots WHERE provider = ?1 AND timestamp >= ?2 ORDER BY timestamp ASC",
        )?;
        let rows = stmt.query_map(params![provider, since.to_rfc3339()], row_to_snapshot)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    pub async fn prune_snapshots(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        let conn = self.conn.lock().await;
        let affected = conn.execute(
            "DELETE FROM snapshots WHERE timestamp < ?1",
            params![cutoff.to_rfc3339()],
        )?;
        Ok(affected)
    }
}

fn row_to_snapshot(row: &rusqlite::Row) -> rusqlite::Result<Snapshot> {
    let timestamp: String = row.get(2)?;
    let week_start: String = row.get(3)?;
    let session_reset: Option<String> = row.get(8)?;
    let weekly_reset: Option<String> = row.get(9)?;
    Ok(Snapshot {
        id: row.get(0)?,
        provider: row.get(1)?,
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        week_start: DateTime::parse_from_rfc3339(&week_start)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        local_tokens: row.get::<_, i64>(4)? as u64,
        local_daily: row.get::<_, i64>(5)? as u64,
        scraped_pct: row.get(6)?,
        inferred_budget: row.get::<_, Option<i64>>(7)?.map(|v| v as u64),
        session_reset_time: session_reset
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|d| d.with_timezone(&Utc)),
        weekly_reset_time: weekly_reset
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|d| d.with_timezone(&Utc)),
        day_of_week: row.get(10)?,
        hour_of_day: row.get(11)?,
        iso_week_number: row.get(12)?,
        iso_year: row.get(13)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_close_open_is_idempotent_on_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nightshift.db");

        let store = Store::open(&db_path).await.unwrap();
        let v1 = store.schema_version().await.unwrap();
        store.close().await;

        let store2 = Store::open(&db_path).await.unwrap();
        let v2 = store2.schema_version().await.unwrap();
        assert_eq!(v1, v2);
        assert_eq!(v2, migrations::MIGRATIONS.last().unwrap().version);
    }

    #[tokio::test]
    async fn upsert_and_load_project_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("nightshift.db")).await.unwrap();

        let mut record = ProjectRecord::new("/a/b");
        record.run_count = 3;
        record.task_last_run.insert("docs-backfill".into(), Utc::now());
        store.upsert_project(&record).await.unwrap();

        let loaded = store.load_project(&record.path).await.unwrap().unwrap();
        assert_eq!(loaded.run_count, 3);
        assert!(loaded.task_last_run.contains_key("docs-backfill"));
    }

    #[tokio::test]
    async fn mark_assigned_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("nightshift.db")).await.unwrap();

        let assignment = Assignment {
            task_id: "docs-backfill:/a/b".into(),
            assigned_at: Utc::now(),
        };
        assert!(store.mark_assigned(&assignment).await.unwrap());
        assert!(!store.mark_assigned(&assignment).await.unwrap());
        store.clear_assigned(&assignment.task_id).await.unwrap();
        assert!(store.mark_assigned(&assignment).await.unwrap());
    }

    #[tokio::test]
    async fn recent_run_records_orders_by_start_desc() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("nightshift.db")).await.unwrap();

        for i in 0..3 {
            let record = RunRecord {
                id: format!("run-{i}"),
                start: Utc::now() + chrono::Duration::seconds(i),
                end: Utc::now() + chrono::Duration::seconds(i + 1),
                provider: "claude".into(),
                project: "/a/b".into(),
                tasks: vec!["docs-backfill".into()],
                tokens_used: 1000,
                status: RunStatus::Success,
                error: None,
                branch: "main".into(),
                output_type: None,
                output_ref: None,
            };
            store.add_run_record(&record).await.unwrap();
        }

        let recent = store.recent_run_records(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, "run-2");
    }
}
