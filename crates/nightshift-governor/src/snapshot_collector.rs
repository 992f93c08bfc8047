use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use nightshift_store::{Store, StoreResult};
use nightshift_types::Snapshot;
use nightshift_usage::{UsageOracle, UsageReadError};

/// `week_start_day` configuration for deriving `Snapshot::week_start`.
/// Defaults to Monday; any day is valid.
pub struct SnapshotCollector {
    store: Arc<Store>,
    oracle: Arc<UsageOracle>,
    week_start_day: Weekday,
}

fn week_start_for(timestamp: DateTime<Utc>, week_start_day: Weekday) -> DateTime<Utc> {
    let days_since_start =
        (7 + timestamp.weekday().num_days_from_monday() as i64 - week_start_day.num_days_from_monday() as i64) % 7;
    (timestamp - Duration::days(days_since_start))
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        .and_utc()
}

impl SnapshotCollector {
    pub fn new(store: Arc<Store>, oracle: Arc<UsageOracle>, week_start_day: Weekday) -> Self {
        Self {
            store,
            oracle,
            week_start_day,
        }
    }

    pub fn with_monday_week(store: Arc<Store>, oracle: Arc<UsageOracle>) -> Self {
        Self::new(store, oracle, Weekday::Mon)
    }

    /// Takes one snapshot per provider known to the oracle. A provider whose
    /// read fails is skipped (logged) rather than aborting the whole sweep.
    pub async fn collect_all(&self) -> StoreResult<usize> {
        let providers: Vec<String> = self.oracle.providers().map(|p| p.to_string()).collect();
        let mut collected = 0;
        for provider in providers {
            match self.collect_one(&provider).await {
                Ok(()) => collected += 1,
                Err(err) => tracing::warn!(provider, %err, "snapshot collection skipped"),
            }
        }
        Ok(collected)
    }

    async fn collect_one(&self, provider: &str) -> Result<(), CollectError> {
        let reading = self.oracle.read(provider).await?;
        let now = Utc::now();
        let week_start = week_start_for(now, self.week_start_day);
        let snapshot = Snapshot::derive(
            uuid::Uuid::new_v4().to_string(),
            provider.to_string(),
            now,
            week_start,
            reading.local_weekly,
            reading.local_daily,
            Some(reading.weekly_pct),
            reading.session_reset,
            reading.weekly_reset,
        );
        self.store.insert_snapshot(&snapshot).await?;
        Ok(())
    }

    /// Deletes snapshots older than `now - days`. A non-positive `days` is a
    /// no-op.
    pub async fn prune(&self, days: i64) -> StoreResult<usize> {
        if days <= 0 {
            return Ok(0);
        }
        let cutoff = Utc::now() - Duration::days(days);
        self.store.prune_snapshots(cutoff).await
    }
}

#[derive(Debug, thiserror::Error)]
enum CollectError {
    #[error(transparent)]
    Usage(#[from] UsageReadError),
    #[error(transparent)]
    Store(#[from] nightshift_store::StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use nightshift_usage::CannedAdapter;
    use nightshift_types::UsageReading;

    fn sample_reading() -> UsageReading {
        UsageReading {
            provider: "claude".into(),
            session_pct: 10.0,
            weekly_pct: 40.0,
            local_weekly: 40_000,
            local_daily: 4_000,
            session_reset: None,
            weekly_reset: None,
        }
    }

    #[tokio::test]
    async fn collect_all_inserts_one_snapshot_per_provider() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(&dir.path().join("n.db")).await.unwrap());
        let adapter = Arc::new(CannedAdapter::ok("claude", sample_reading()));
        let oracle = Arc::new(UsageOracle::with_default_ttl(vec![adapter]));
        let collector = SnapshotCollector::with_monday_week(store.clone(), oracle);

        let collected = collector.collect_all().await.unwrap();
        assert_eq!(collected, 1);

        let snapshots = store.snapshots_since("claude", Utc::now() - Duration::days(1)).await.unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].inferred_budget, Some(100_000));
    }

    #[test]
    fn week_start_monday_lands_on_monday() {
        let wednesday = DateTime::parse_from_rfc3339("2026-07-29T15:00:00Z").unwrap().with_timezone(&Utc);
        let start = week_start_for(wednesday, Weekday::Mon);
        assert_eq!(start.weekday(), Weekday::Mon);
        assert!(start <= wednesday);
    }

    #[test]
    fn week_start_sunday_config_lands_on_sunday() {
        let wednesday = DateTime::parse_from_rfc3339("2026-07-29T15:00:00Z").unwrap().with_timezone(&Utc);
        let start = week_start_for(wednesday, Weekday::Sun);
        assert_eq!(start.weekday(), Weekday::Sun);
        assert!(start <= wednesday);
    }

    #[tokio::test]
    async fn prune_with_nonpositive_days_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(&dir.path().join("n.db")).await.unwrap());
        let oracle = Arc::new(UsageOracle::with_default_ttl(vec![]));
        let collector = SnapshotCollector::with_monday_week(store, oracle);
        assert_eq!(collector.prune(0).await.unwrap(), 0);
        assert_eq!(collector.prune(-5).await.unwrap(), 0);
    }
}
