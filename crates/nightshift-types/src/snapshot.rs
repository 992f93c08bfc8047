use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// A single point-in-time usage reading for one provider, used by the Trend
/// Analyzer for forecasting and retained for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub provider: String,
    pub timestamp: DateTime<Utc>,
    pub week_start: DateTime<Utc>,
    pub local_tokens: u64,
    pub local_daily: u64,
    pub scraped_pct: Option<f64>,
    pub inferred_budget: Option<u64>,
    pub session_reset_time: Option<DateTime<Utc>>,
    pub weekly_reset_time: Option<DateTime<Utc>>,
    pub day_of_week: u32,
    pub hour_of_day: u32,
    pub iso_week_number: u32,
    pub iso_year: i32,
}

impl Snapshot {
    /// `scraped_pct` must already be clamped to `[0,100]` by the caller (the
    /// oracle read fails upstream on out-of-range input).
    pub fn infer_budget(local_tokens: u64, scraped_pct: Option<f64>) -> Option<u64> {
        let pct = scraped_pct?;
        if pct <= 0.0 || local_tokens == 0 {
            return None;
        }
        Some((local_tokens as f64 / (pct / 100.0)).round() as u64)
    }

    pub fn derive(
        id: String,
        provider: String,
        timestamp: DateTime<Utc>,
        week_start: DateTime<Utc>,
        local_tokens: u64,
        local_daily: u64,
        scraped_pct: Option<f64>,
        session_reset_time: Option<DateTime<Utc>>,
        weekly_reset_time: Option<DateTime<Utc>>,
    ) -> Self {
        let iso = timestamp.iso_week();
        Self {
            id,
            provider,
            timestamp,
            week_start,
            local_tokens,
            local_daily,
            scraped_pct,
            inferred_budget: Self::infer_budget(local_tokens, scraped_pct),
            session_reset_time,
            weekly_reset_time,
            day_of_week: timestamp.weekday().num_days_from_monday(),
            hour_of_day: timestamp.hour(),
            iso_week_number: iso.week(),
            iso_year: iso.year(),
        }
    }
}
