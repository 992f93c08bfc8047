use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveTime;
use nightshift_core::ConfigError;
use nightshift_projects::ProjectDescriptor;
use nightshift_types::BudgetMode;
use serde::Deserialize;

/// Typed, validated view of the effective merged config. Every fallible
/// conversion (cron syntax, timezone name, percent range, duration parse)
/// happens here, once, before any component is constructed.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub schedule: ScheduleConfig,
    pub budget: BudgetConfig,
    pub providers: HashMap<String, ProviderConfig>,
    pub default_provider: String,
    pub projects: Vec<ProjectDescriptor>,
    pub selector: SelectorConfigRaw,
    pub max_iterations: u32,
    pub phase_timeout_secs: u64,
    pub assignment_ttl_secs: u64,
    pub week_start_day: chrono::Weekday,
}

#[derive(Debug, Clone)]
pub enum ScheduleTrigger {
    Cron(String),
    Interval(Duration),
}

#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub trigger: ScheduleTrigger,
    pub window: Option<WindowConfig>,
}

#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub timezone: chrono_tz::Tz,
}

#[derive(Debug, Clone)]
pub struct BudgetConfig {
    pub weekly_token_budget: u64,
    pub max_percent: f64,
    pub reserve_percent: f64,
    pub mode: BudgetMode,
    pub per_provider_overrides: HashMap<String, u64>,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub program: String,
    pub base_args: Vec<String>,
    pub transcripts_dir: Option<std::path::PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct SelectorConfigRaw {
    pub base_priority: HashMap<String, f64>,
    pub enabled_types: Vec<String>,
    pub disabled_types: Vec<String>,
    pub cooldown_overrides_secs: HashMap<String, u64>,
}

// -- raw deserialization shape, mirroring the YAML on disk -------------------

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    schedule: Option<RawSchedule>,
    #[serde(default)]
    budget: Option<RawBudget>,
    #[serde(default)]
    providers: HashMap<String, RawProvider>,
    #[serde(default)]
    default_provider: Option<String>,
    #[serde(default)]
    projects: Vec<RawProject>,
    #[serde(default)]
    selector: Option<RawSelector>,
    #[serde(default)]
    max_iterations: Option<u32>,
    #[serde(default)]
    phase_timeout_secs: Option<u64>,
    #[serde(default)]
    assignment_ttl_secs: Option<u64>,
    #[serde(default)]
    week_start_day: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSchedule {
    #[serde(default)]
    cron: Option<String>,
    #[serde(default)]
    interval_secs: Option<u64>,
    #[serde(default)]
    window: Option<RawWindow>,
}

#[derive(Debug, Deserialize)]
struct RawWindow {
    start: String,
    end: String,
    timezone: String,
}

#[derive(Debug, Deserialize)]
struct RawBudget {
    #[serde(default = "default_weekly_budget")]
    weekly_token_budget: u64,
    #[serde(default = "default_max_percent")]
    max_percent: f64,
    #[serde(default = "default_reserve_percent")]
    reserve_percent: f64,
    #[serde(default = "default_mode")]
    mode: String,
    #[serde(default)]
    per_provider_overrides: HashMap<String, u64>,
}

fn default_weekly_budget() -> u64 {
    700_000
}
fn default_max_percent() -> f64 {
    90.0
}
fn default_reserve_percent() -> f64 {
    5.0
}
fn default_mode() -> String {
    "weekly".to_string()
}

#[derive(Debug, Deserialize)]
struct RawProvider {
    program: String,
    #[serde(default)]
    base_args: Vec<String>,
    #[serde(default)]
    transcripts_dir: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawProject {
    pattern: String,
    #[serde(default)]
    excludes: Vec<String>,
    #[serde(default)]
    priority: u32,
}

#[derive(Debug, Deserialize, Default)]
struct RawSelector {
    #[serde(default)]
    base_priority: HashMap<String, f64>,
    #[serde(default)]
    enabled_types: Vec<String>,
    #[serde(default)]
    disabled_types: Vec<String>,
    #[serde(default)]
    cooldown_overrides_secs: HashMap<String, u64>,
}

impl WorkerConfig {
    pub fn from_effective(value: serde_json::Value) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_value(value).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let trigger = match raw.schedule.as_ref().and_then(|s| s.cron.clone()) {
            Some(expr) => {
                let normalized = nightshift_scheduler::normalize_cron_expression(&expr);
                cron::Schedule::from_str(&normalized).map_err(|e| ConfigError::InvalidSchedule(e.to_string()))?;
                ScheduleTrigger::Cron(expr)
            }
            None => {
                let secs = raw.schedule.as_ref().and_then(|s| s.interval_secs).unwrap_or(3600);
                if secs == 0 {
                    return Err(ConfigError::InvalidSchedule("interval_secs must be positive".to_string()));
                }
                ScheduleTrigger::Interval(Duration::from_secs(secs))
            }
        };

        let window = raw
            .schedule
            .as_ref()
            .and_then(|s| s.window.as_ref())
            .map(|w| -> Result<WindowConfig, ConfigError> {
                let start = NaiveTime::parse_from_str(&w.start, "%H:%M")
                    .map_err(|_| ConfigError::InvalidTimeOfDay(w.start.clone()))?;
                let end = NaiveTime::parse_from_str(&w.end, "%H:%M")
                    .map_err(|_| ConfigError::InvalidTimeOfDay(w.end.clone()))?;
                let timezone: chrono_tz::Tz = w
                    .timezone
                    .parse()
                    .map_err(|_| ConfigError::InvalidTimezone(w.timezone.clone()))?;
                Ok(WindowConfig { start, end, timezone })
            })
            .transpose()?;

        let raw_budget = raw.budget.unwrap_or(RawBudget {
            weekly_token_budget: default_weekly_budget(),
            max_percent: default_max_percent(),
            reserve_percent: default_reserve_percent(),
            mode: default_mode(),
            per_provider_overrides: HashMap::new(),
        });
        if !(0.0..=100.0).contains(&raw_budget.max_percent) {
            return Err(ConfigError::PercentOutOfRange(raw_budget.max_percent));
        }
        if !(0.0..=100.0).contains(&raw_budget.reserve_percent) {
            return Err(ConfigError::PercentOutOfRange(raw_budget.reserve_percent));
        }
        let mode = match raw_budget.mode.as_str() {
            "daily" => BudgetMode::Daily,
            "weekly" => BudgetMode::Weekly,
            other => return Err(ConfigError::InvalidBudgetMode(other.to_string())),
        };

        let providers = raw
            .providers
            .into_iter()
            .map(|(name, p)| {
                (
                    name,
                    ProviderConfig {
                        program: p.program,
                        base_args: p.base_args,
                        transcripts_dir: p.transcripts_dir.map(std::path::PathBuf::from),
                    },
                )
            })
            .collect();

        let projects = raw
            .projects
            .into_iter()
            .map(|p| ProjectDescriptor {
                pattern: p.pattern,
                excludes: p.excludes,
                priority: p.priority,
            })
            .collect();

        let selector = raw
            .selector
            .map(|s| SelectorConfigRaw {
                base_priority: s.base_priority,
                enabled_types: s.enabled_types,
                disabled_types: s.disabled_types,
                cooldown_overrides_secs: s.cooldown_overrides_secs,
            })
            .unwrap_or_default();

        let week_start_day = match raw.week_start_day.as_deref() {
            None => chrono::Weekday::Mon,
            Some(s) => s
                .parse()
                .map_err(|_| ConfigError::Parse(format!("invalid week_start_day: {s}")))?,
        };

        Ok(WorkerConfig {
            schedule: ScheduleConfig { trigger, window },
            budget: BudgetConfig {
                weekly_token_budget: raw_budget.weekly_token_budget,
                max_percent: raw_budget.max_percent,
                reserve_percent: raw_budget.reserve_percent,
                mode,
                per_provider_overrides: raw_budget.per_provider_overrides,
            },
            providers,
            default_provider: raw.default_provider.unwrap_or_else(|| "claude".to_string()),
            projects,
            selector,
            max_iterations: raw.max_iterations.unwrap_or(3),
            phase_timeout_secs: raw.phase_timeout_secs.unwrap_or(30 * 60),
            assignment_ttl_secs: raw.assignment_ttl_secs.unwrap_or(3600),
            week_start_day,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_apply_when_sections_are_absent() {
        let config = WorkerConfig::from_effective(json!({})).unwrap();
        assert_eq!(config.budget.weekly_token_budget, 700_000);
        assert_eq!(config.max_iterations, 3);
        assert!(matches!(config.schedule.trigger, ScheduleTrigger::Interval(_)));
    }

    #[test]
    fn invalid_cron_is_rejected_at_load_time() {
        let value = json!({"schedule": {"cron": "not a cron"}});
        assert!(WorkerConfig::from_effective(value).is_err());
    }

    #[test]
    fn five_field_cron_is_accepted_at_load_time() {
        let value = json!({"schedule": {"cron": "30 2 * * *"}});
        let config = WorkerConfig::from_effective(value).unwrap();
        assert!(matches!(config.schedule.trigger, ScheduleTrigger::Cron(expr) if expr == "30 2 * * *"));
    }

    #[test]
    fn out_of_range_percent_is_rejected() {
        let value = json!({"budget": {"max_percent": 150.0}});
        assert!(WorkerConfig::from_effective(value).is_err());
    }

    #[test]
    fn unknown_budget_mode_is_rejected() {
        let value = json!({"budget": {"mode": "hourly"}});
        assert!(WorkerConfig::from_effective(value).is_err());
    }

    #[test]
    fn window_requires_valid_timezone() {
        let value = json!({"schedule": {"window": {"start": "22:00", "end": "06:00", "timezone": "Not/AZone"}}});
        assert!(WorkerConfig::from_effective(value).is_err());
    }
}
