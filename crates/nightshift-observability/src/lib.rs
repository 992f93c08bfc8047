use std::fs;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Holds the non-blocking file appender alive for the life of the process.
/// Dropping it flushes and stops the writer thread.
pub struct LoggingGuard(#[allow(dead_code)] WorkerGuard);

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for rolling JSON log files. `None` disables file logging.
    pub logs_dir: Option<PathBuf>,
    /// Emit JSON on stderr instead of the compact human format.
    pub json_console: bool,
    pub retention_days: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            logs_dir: None,
            json_console: false,
            retention_days: 14,
        }
    }
}

/// Installs the global tracing subscriber. Filter is driven by `NIGHTSHIFT_LOG`
/// (falls back to `info`). Safe to call once; subsequent calls are no-ops.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<Option<LoggingGuard>> {
    let filter = EnvFilter::try_from_env("NIGHTSHIFT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = if config.json_console {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_target(true)
            .with_ansi(true)
            .boxed()
    };

    let registry = tracing_subscriber::registry().with(filter).with(console_layer);

    let Some(dir) = &config.logs_dir else {
        registry.try_init().ok();
        return Ok(None);
    };

    fs::create_dir_all(dir)?;
    prune_old_logs(dir, config.retention_days)?;

    let file_appender = tracing_appender::rolling::Builder::new()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix("nightshift")
        .filename_suffix("jsonl")
        .build(dir)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_current_span(false)
        .with_span_list(false);

    registry.with(file_layer).try_init().ok();

    Ok(Some(LoggingGuard(guard)))
}

fn prune_old_logs(dir: &Path, retention_days: u64) -> anyhow::Result<()> {
    let cutoff = chrono::Utc::now() - chrono::Duration::days(retention_days as i64);
    for entry in fs::read_dir(dir)? {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.starts_with("nightshift.") || !name.ends_with(".jsonl") {
            continue;
        }
        let date_part = name
            .trim_start_matches("nightshift.")
            .trim_end_matches(".jsonl");
        let Ok(date) = chrono::NaiveDate::parse_from_str(date_part, "%Y-%m-%d") else {
            continue;
        };
        let Some(naive) = date.and_hms_opt(0, 0, 0) else {
            continue;
        };
        let dt = chrono::DateTime::<chrono::Utc>::from_naive_utc_and_offset(naive, chrono::Utc);
        if dt < cutoff {
            let _ = fs::remove_file(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_disables_file_logging() {
        let config = LoggingConfig::default();
        assert!(config.logs_dir.is_none());
        assert_eq!(config.retention_days, 14);
    }

    #[test]
    fn prune_old_logs_ignores_unrelated_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("other.log"), b"x").unwrap();
        prune_old_logs(dir.path(), 14).unwrap();
        assert!(dir.path().join("other.log").exists());
    }
}
