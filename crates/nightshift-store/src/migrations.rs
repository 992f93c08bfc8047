use rusqlite::Connection;

use crate::error::{StoreError, StoreResult};

/// One numbered migration. Applied in its own transaction; recorded in
/// `schema_version` on success. Re-opening a database already at the current
/// version applies zero migrations.
pub struct Migration {
    pub version: i64,
    pub ddl: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        ddl: r#"
            CREATE TABLE projects (
                path TEXT PRIMARY KEY,
                last_run TEXT,
                run_count INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE project_task_runs (
                project_path TEXT NOT NULL REFERENCES projects(path) ON DELETE CASCADE,
                task_type TEXT NOT NULL,
                last_run TEXT NOT NULL,
                PRIMARY KEY (project_path, task_type)
            );
            CREATE TABLE assignments (
                task_id TEXT PRIMARY KEY,
                assigned_at TEXT NOT NULL
            );
            CREATE TABLE run_records (
                id TEXT PRIMARY KEY,
                start TEXT NOT NULL,
                end TEXT NOT NULL,
                provider TEXT NOT NULL,
                project TEXT NOT NULL,
                tasks TEXT NOT NULL,
                tokens_used INTEGER NOT NULL,
                status TEXT NOT NULL,
                error TEXT,
                branch TEXT NOT NULL,
                output_type TEXT,
                output_ref TEXT
            );
            CREATE INDEX idx_run_records_start ON run_records(start DESC);
            CREATE TABLE snapshots (
                id TEXT PRIMARY KEY,
                provider TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                week_start TEXT NOT NULL,
                local_tokens INTEGER NOT NULL,
                local_daily INTEGER NOT NULL,
                scraped_pct REAL,
                inferred_budget INTEGER,
                session_reset_time TEXT,
                weekly_reset_time TEXT,
                day_of_week INTEGER NOT NULL,
                hour_of_day INTEGER NOT NULL,
                iso_week_number INTEGER NOT NULL,
                iso_year INTEGER NOT NULL
            );
            CREATE INDEX idx_snapshots_provider_ts ON snapshots(provider, timestamp DESC);
        "#,
    },
];

pub fn apply_pending(conn: &Connection) -> StoreResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY, applied_at DATETIME NOT NULL)",
        [],
    )?;

    let current: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }
        conn.execute_batch("BEGIN;")
            .map_err(|e| StoreError::Migrate(e.to_string()))?;
        let result = (|| -> StoreResult<()> {
            conn.execute_batch(migration.ddl)?;
            conn.execute(
                "INSERT INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
                rusqlite::params![migration.version],
            )?;
            Ok(())
        })();
        match result {
            Ok(()) => {
                conn.execute_batch("COMMIT;")
                    .map_err(|e| StoreError::Migrate(e.to_string()))?;
            }
            Err(err) => {
                conn.execute_batch("ROLLBACK;").ok();
                return Err(StoreError::Migrate(format!(
                    "migration {} failed: {err}",
                    migration.version
                )));
            }
        }
    }

    Ok(())
}

pub fn schema_version(conn: &Connection) -> StoreResult<i64> {
    Ok(conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| {
        row.get(0)
    })?)
}
