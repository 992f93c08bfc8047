use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Selects which percentage/reset pair a Budget Governor reads off a
/// `UsageReading`. Distinct from the governor's own `daily`/`weekly`
/// accounting mode, though the two are conventionally aligned one-to-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetMode {
    Daily,
    Weekly,
}

/// A single successful UsageOracle read for one provider. Percentages are
/// always in `[0,100]`; adapters that observe an out-of-range value fail the
/// read rather than constructing one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageReading {
    pub provider: String,
    pub session_pct: f64,
    pub weekly_pct: f64,
    pub local_weekly: u64,
    pub local_daily: u64,
    pub session_reset: Option<DateTime<Utc>>,
    pub weekly_reset: Option<DateTime<Utc>>,
}

impl UsageReading {
    pub fn pct_for(&self, mode: BudgetMode) -> f64 {
        match mode {
            BudgetMode::Weekly => self.weekly_pct,
            BudgetMode::Daily => self.session_pct,
        }
    }

    pub fn reset_for(&self, mode: BudgetMode) -> Option<DateTime<Utc>> {
        match mode {
            BudgetMode::Weekly => self.weekly_reset,
            BudgetMode::Daily => self.session_reset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pct_for_selects_by_mode() {
        let reading = UsageReading {
            provider: "claude".into(),
            session_pct: 12.5,
            weekly_pct: 40.0,
            local_weekly: 1000,
            local_daily: 100,
            session_reset: None,
            weekly_reset: None,
        };
        assert_eq!(reading.pct_for(BudgetMode::Daily), 12.5);
        assert_eq!(reading.pct_for(BudgetMode::Weekly), 40.0);
    }
}
