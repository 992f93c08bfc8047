use std::collections::HashMap;

use nightshift_types::{BudgetMode, UsageReading};
use nightshift_usage::{UsageOracle, UsageReadError};

/// Smallest task's minimum cost (`CostTier::Low`'s lower bound). A cap that
/// can't clear this can't fund any task, so the governor denies outright.
const MIN_TASK_COST: f64 = 10_000.0;

#[derive(Debug, Clone)]
pub struct GovernorConfig {
    pub weekly_token_budget: u64,
    pub max_percent: f64,
    pub reserve_percent: f64,
    pub mode: BudgetMode,
    pub per_provider_overrides: HashMap<String, u64>,
}

/// Enforces `weekly_token_budget`/`max_percent`/`reserve_percent` against a
/// UsageOracle reading plus a Trend Analyzer projection. Stateless beyond its
/// config: every decision is a pure function of the inputs passed in.
pub struct BudgetGovernor {
    config: GovernorConfig,
}

impl BudgetGovernor {
    pub fn new(config: GovernorConfig) -> Self {
        Self { config }
    }

    /// Implements the 7-step `MayRun` decision exactly.
    pub fn may_run(&self, provider: &str, reading: &UsageReading, projected_daytime: u64) -> (bool, u64, String) {
        let pct = reading.pct_for(self.config.mode);

        if pct >= (100.0 - self.config.reserve_percent) {
            return (false, 0, "reserve".to_string());
        }
        if pct >= self.config.max_percent {
            return (false, 0, "cap".to_string());
        }

        let effective_budget = self
            .config
            .per_provider_overrides
            .get(provider)
            .copied()
            .unwrap_or(self.config.weekly_token_budget) as f64;

        let cap = match self.config.mode {
            BudgetMode::Daily => {
                let daily_budget = effective_budget / 7.0;
                (daily_budget - reading.local_daily as f64 - projected_daytime as f64).max(0.0)
            }
            BudgetMode::Weekly => {
                (effective_budget * (self.config.max_percent / 100.0) - reading.local_weekly as f64).max(0.0)
            }
        };

        if cap > MIN_TASK_COST {
            (true, cap.round() as u64, "ok".to_string())
        } else {
            (false, 0, "budget".to_string())
        }
    }

    /// Reads `provider` from the oracle and applies `may_run`. An errored
    /// read is treated as "unknown" and denies.
    pub async fn evaluate(&self, oracle: &UsageOracle, provider: &str, projected_daytime: u64) -> (bool, u64, String) {
        match oracle.read(provider).await {
            Ok(reading) => self.may_run(provider, &reading, projected_daytime),
            Err(UsageReadError::UnknownProvider(_)) => (false, 0, "unknown".to_string()),
            Err(_) => (false, 0, "unknown".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(session_pct: f64, weekly_pct: f64, local_daily: u64, local_weekly: u64) -> UsageReading {
        UsageReading {
            provider: "claude".into(),
            session_pct,
            weekly_pct,
            local_weekly,
            local_daily,
            session_reset: None,
            weekly_reset: None,
        }
    }

    fn config(mode: BudgetMode) -> GovernorConfig {
        GovernorConfig {
            weekly_token_budget: 700_000,
            max_percent: 90.0,
            reserve_percent: 5.0,
            mode,
            per_provider_overrides: HashMap::new(),
        }
    }

    #[test]
    fn reserve_denial_takes_priority() {
        let governor = BudgetGovernor::new(config(BudgetMode::Weekly));
        let (allowed, cap, reason) = governor.may_run("claude", &reading(0.0, 96.0, 0, 0), 0);
        assert!(!allowed);
        assert_eq!(cap, 0);
        assert_eq!(reason, "reserve");
    }

    #[test]
    fn cap_denial_when_below_reserve_but_above_max() {
        let governor = BudgetGovernor::new(config(BudgetMode::Weekly));
        let (allowed, _, reason) = governor.may_run("claude", &reading(0.0, 92.0, 0, 0), 0);
        assert!(!allowed);
        assert_eq!(reason, "cap");
    }

    #[test]
    fn daily_mode_subtracts_local_and_projected() {
        let governor = BudgetGovernor::new(config(BudgetMode::Daily));
        // daily_budget = 700_000/7 = 100_000
        let (allowed, cap, reason) = governor.may_run("claude", &reading(10.0, 10.0, 20_000, 0), 30_000);
        assert!(allowed);
        assert_eq!(cap, 50_000);
        assert_eq!(reason, "ok");
    }

    #[test]
    fn denies_when_cap_does_not_clear_minimum_task_cost() {
        let governor = BudgetGovernor::new(config(BudgetMode::Daily));
        let (allowed, _, reason) = governor.may_run("claude", &reading(10.0, 10.0, 95_000, 0), 0);
        assert!(!allowed);
        assert_eq!(reason, "budget");
    }

    #[test]
    fn per_provider_override_replaces_weekly_budget() {
        let mut config = config(BudgetMode::Weekly);
        config.per_provider_overrides.insert("claude".into(), 1_400_000);
        let governor = BudgetGovernor::new(config);
        let (allowed, cap, _) = governor.may_run("claude", &reading(10.0, 10.0, 0, 0), 0);
        // cap = 1_400_000 * 0.9 - 0 = 1_260_000
        assert!(allowed);
        assert_eq!(cap, 1_260_000);
    }
}
