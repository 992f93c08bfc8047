use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    PR,
    Analysis,
    Options,
    Safe,
    Map,
    Emergency,
}

/// Cost tier maps to a fixed token range; `max_cost()` is the upper bound used
/// by the Selector's budget filter and the Budget Governor's minimum-cost check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostTier {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl CostTier {
    pub fn range(self) -> (u64, u64) {
        match self {
            CostTier::Low => (10_000, 50_000),
            CostTier::Medium => (50_000, 150_000),
            CostTier::High => (150_000, 500_000),
            CostTier::VeryHigh => (500_000, 1_000_000),
        }
    }

    pub fn min_cost(self) -> u64 {
        self.range().0
    }

    pub fn max_cost(self) -> u64 {
        self.range().1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskRisk {
    Low,
    Medium,
    High,
}

/// Static descriptor for a task type, registered once at process init (or in
/// tests, snapshot-and-restore). `type_id` is unique across built-ins and
/// custom registrations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub type_id: String,
    pub category: TaskCategory,
    pub cost_tier: CostTier,
    pub risk: TaskRisk,
    pub default_cooldown: Duration,
    pub disabled_by_default: bool,
}

impl TaskDefinition {
    pub fn max_cost(&self) -> u64 {
        self.cost_tier.max_cost()
    }
}
