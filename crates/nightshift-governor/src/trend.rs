use std::collections::HashMap;

use chrono::{DateTime, Duration, Timelike, Utc};
use nightshift_store::{Store, StoreResult};
use nightshift_types::Snapshot;

const DEFAULT_LOOKBACK_DAYS: u32 = 14;
const MAX_LOOKBACK_DAYS: u32 = 30;

/// Forecasts remaining same-day usage from historical per-hour Snapshot
/// averages, bounded to a lookback window.
pub struct TrendAnalyzer {
    lookback_days: u32,
}

impl TrendAnalyzer {
    pub fn new(lookback_days: u32) -> Self {
        Self {
            lookback_days: lookback_days.clamp(1, MAX_LOOKBACK_DAYS),
        }
    }

    pub async fn predict_daytime_usage(
        &self,
        store: &Store,
        provider: &str,
        now: DateTime<Utc>,
        weekly_budget: u64,
    ) -> StoreResult<u64> {
        let since = now - Duration::days(self.lookback_days as i64);
        let snapshots = store.snapshots_since(provider, since).await?;
        if snapshots.is_empty() {
            return Ok(0);
        }

        let hourly = hourly_averages(&snapshots);
        let daily_total = hourly.values().cloned().fold(0.0, f64::max);
        let avg_now = lookup_with_earlier_hour_fallback(&hourly, now.hour());

        let remaining = (daily_total - avg_now).max(0.0);
        let cap = weekly_budget as f64 / 7.0;
        Ok(remaining.min(cap).round() as u64)
    }
}

impl Default for TrendAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKBACK_DAYS)
    }
}

fn hourly_averages(snapshots: &[Snapshot]) -> HashMap<u32, f64> {
    let mut sums: HashMap<u32, (u64, u64)> = HashMap::new();
    for snapshot in snapshots {
        let entry = sums.entry(snapshot.hour_of_day).or_insert((0, 0));
        entry.0 += snapshot.local_daily;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(hour, (sum, count))| (hour, sum as f64 / count as f64))
        .collect()
}

fn lookup_with_earlier_hour_fallback(hourly: &HashMap<u32, f64>, hour: u32) -> f64 {
    if let Some(value) = hourly.get(&hour) {
        return *value;
    }
    for earlier in (0..hour).rev() {
        if let Some(value) = hourly.get(&earlier) {
            return *value;
        }
    }
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn snapshot(hour: u32, local_daily: u64, timestamp: DateTime<Utc>) -> Snapshot {
        Snapshot {
            id: uuid::Uuid::new_v4().to_string(),
            provider: "claude".into(),
            timestamp,
            week_start: timestamp,
            local_tokens: local_daily,
            local_daily,
            scraped_pct: None,
            inferred_budget: None,
            session_reset_time: None,
            weekly_reset_time: None,
            day_of_week: timestamp.weekday().num_days_from_monday(),
            hour_of_day: hour,
            iso_week_number: timestamp.iso_week().week(),
            iso_year: timestamp.iso_week().year(),
        }
    }

    #[tokio::test]
    async fn no_history_predicts_zero() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(&dir.path().join("n.db")).await.unwrap());
        let analyzer = TrendAnalyzer::default();
        let predicted = analyzer
            .predict_daytime_usage(&store, "claude", Utc::now(), 700_000)
            .await
            .unwrap();
        assert_eq!(predicted, 0);
    }

    #[tokio::test]
    async fn falls_back_to_nearest_earlier_hour() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("n.db")).await.unwrap();
        let now = Utc::now();
        store.insert_snapshot(&snapshot(9, 10_000, now - Duration::days(1))).await.unwrap();
        store.insert_snapshot(&snapshot(23, 40_000, now - Duration::days(1))).await.unwrap();

        let analyzer = TrendAnalyzer::new(14);
        // hour 15 has no data; should fall back to hour 9's average (10_000)
        let fake_now = now.with_hour(15).unwrap();
        let predicted = analyzer
            .predict_daytime_usage(&store, "claude", fake_now, 700_000)
            .await
            .unwrap();
        // daily_total = max(10_000, 40_000) = 40_000; avg_now via fallback = 10_000
        assert_eq!(predicted, 30_000);
    }
}
