use std::time::Duration;

use nightshift_types::{CostTier, TaskCategory, TaskDefinition, TaskRisk};

const HOUR: u64 = 3600;
const DAY: u64 = 24 * HOUR;

/// `(type_id, category, cost_tier, risk, default_cooldown_secs, disabled_by_default)`.
/// Registered once at `TaskRegistry::new()`. Every entry has a non-zero cooldown.
const TABLE: &[(&str, TaskCategory, CostTier, TaskRisk, u64, bool)] = &[
    ("docs-backfill", TaskCategory::PR, CostTier::Medium, TaskRisk::Low, 7 * DAY, false),
    ("docs-readme-refresh", TaskCategory::PR, CostTier::Low, TaskRisk::Low, 14 * DAY, false),
    ("docs-api-comments", TaskCategory::PR, CostTier::Low, TaskRisk::Low, 7 * DAY, false),
    ("docs-changelog-draft", TaskCategory::PR, CostTier::Low, TaskRisk::Low, DAY, false),
    ("test-coverage-gaps", TaskCategory::PR, CostTier::Medium, TaskRisk::Low, 3 * DAY, false),
    ("test-flaky-repro", TaskCategory::PR, CostTier::High, TaskRisk::Medium, 7 * DAY, false),
    ("test-snapshot-refresh", TaskCategory::PR, CostTier::Low, TaskRisk::Low, DAY, false),
    ("lint-fix-warnings", TaskCategory::PR, CostTier::Low, TaskRisk::Low, HOUR, false),
    ("lint-clippy-pedantic", TaskCategory::PR, CostTier::Medium, TaskRisk::Low, 3 * DAY, true),
    ("format-unformatted-files", TaskCategory::PR, CostTier::Low, TaskRisk::Low, HOUR, false),
    ("deps-patch-bump", TaskCategory::PR, CostTier::Medium, TaskRisk::Medium, 7 * DAY, false),
    ("deps-minor-bump", TaskCategory::PR, CostTier::Medium, TaskRisk::Medium, 14 * DAY, true),
    ("deps-remove-unused", TaskCategory::PR, CostTier::Medium, TaskRisk::Medium, 14 * DAY, false),
    ("deps-vendor-audit", TaskCategory::PR, CostTier::High, TaskRisk::Medium, 14 * DAY, true),
    ("refactor-dead-code-removal", TaskCategory::PR, CostTier::Medium, TaskRisk::Medium, 7 * DAY, false),
    ("refactor-duplicate-logic", TaskCategory::PR, CostTier::High, TaskRisk::Medium, 14 * DAY, true),
    ("refactor-module-split", TaskCategory::PR, CostTier::VeryHigh, TaskRisk::High, 30 * DAY, true),
    ("perf-hot-path-profile", TaskCategory::PR, CostTier::High, TaskRisk::Medium, 14 * DAY, true),
    ("perf-allocation-reduction", TaskCategory::PR, CostTier::High, TaskRisk::Medium, 14 * DAY, true),
    ("security-dependency-cves", TaskCategory::PR, CostTier::Medium, TaskRisk::Medium, DAY, false),
    ("security-secret-scan-fix", TaskCategory::Emergency, CostTier::Medium, TaskRisk::High, HOUR, false),
    ("bug-reproduce-from-issue", TaskCategory::PR, CostTier::High, TaskRisk::Medium, HOUR, false),
    ("bug-fix-known-issue", TaskCategory::PR, CostTier::High, TaskRisk::High, HOUR, false),
    ("ci-pipeline-fix", TaskCategory::Emergency, CostTier::Medium, TaskRisk::Medium, HOUR, false),
    ("ci-flaky-job-quarantine", TaskCategory::Emergency, CostTier::Low, TaskRisk::Low, HOUR, false),
    ("build-warning-cleanup", TaskCategory::PR, CostTier::Low, TaskRisk::Low, 3 * DAY, false),
    ("api-deprecation-sweep", TaskCategory::PR, CostTier::Medium, TaskRisk::Medium, 14 * DAY, true),
    ("migration-script-draft", TaskCategory::PR, CostTier::High, TaskRisk::High, 30 * DAY, true),
    ("error-message-improvements", TaskCategory::PR, CostTier::Low, TaskRisk::Low, 7 * DAY, false),
    ("logging-gap-backfill", TaskCategory::PR, CostTier::Medium, TaskRisk::Low, 7 * DAY, false),
    ("config-schema-validation", TaskCategory::PR, CostTier::Medium, TaskRisk::Medium, 14 * DAY, true),
    ("accessibility-audit-fix", TaskCategory::PR, CostTier::Medium, TaskRisk::Low, 14 * DAY, true),
    ("i18n-missing-strings", TaskCategory::PR, CostTier::Low, TaskRisk::Low, 7 * DAY, true),
    ("typo-sweep", TaskCategory::PR, CostTier::Low, TaskRisk::Low, 3 * DAY, false),
    ("license-header-sweep", TaskCategory::PR, CostTier::Low, TaskRisk::Low, 30 * DAY, true),
    ("readme-badges-refresh", TaskCategory::PR, CostTier::Low, TaskRisk::Low, 30 * DAY, true),
    ("repo-architecture-summary", TaskCategory::Analysis, CostTier::Medium, TaskRisk::Low, 14 * DAY, false),
    ("repo-health-report", TaskCategory::Analysis, CostTier::Medium, TaskRisk::Low, 7 * DAY, false),
    ("dependency-graph-report", TaskCategory::Analysis, CostTier::Medium, TaskRisk::Low, 14 * DAY, false),
    ("complexity-hotspot-report", TaskCategory::Analysis, CostTier::Medium, TaskRisk::Low, 14 * DAY, false),
    ("test-coverage-report", TaskCategory::Analysis, CostTier::Low, TaskRisk::Low, 3 * DAY, false),
    ("security-posture-report", TaskCategory::Analysis, CostTier::Medium, TaskRisk::Low, 7 * DAY, false),
    ("ownership-map-report", TaskCategory::Analysis, CostTier::Low, TaskRisk::Low, 30 * DAY, true),
    ("todo-fixme-inventory", TaskCategory::Analysis, CostTier::Low, TaskRisk::Low, 7 * DAY, false),
    ("churn-hotspot-report", TaskCategory::Analysis, CostTier::Low, TaskRisk::Low, 14 * DAY, true),
    ("api-surface-diff-report", TaskCategory::Analysis, CostTier::Medium, TaskRisk::Low, 7 * DAY, true),
    ("upgrade-options-node", TaskCategory::Options, CostTier::Medium, TaskRisk::Low, 30 * DAY, true),
    ("upgrade-options-rust-edition", TaskCategory::Options, CostTier::High, TaskRisk::Medium, 30 * DAY, true),
    ("migration-options-framework", TaskCategory::Options, CostTier::High, TaskRisk::Medium, 30 * DAY, true),
    ("architecture-options-brief", TaskCategory::Options, CostTier::Medium, TaskRisk::Low, 30 * DAY, true),
    ("cost-reduction-options", TaskCategory::Options, CostTier::Medium, TaskRisk::Low, 30 * DAY, true),
    ("format-entire-repo", TaskCategory::Safe, CostTier::Low, TaskRisk::Low, 7 * DAY, false),
    ("sort-imports", TaskCategory::Safe, CostTier::Low, TaskRisk::Low, 3 * DAY, false),
    ("normalize-line-endings", TaskCategory::Safe, CostTier::Low, TaskRisk::Low, 30 * DAY, true),
    ("trim-trailing-whitespace", TaskCategory::Safe, CostTier::Low, TaskRisk::Low, 3 * DAY, false),
    ("gitignore-hygiene", TaskCategory::Safe, CostTier::Low, TaskRisk::Low, 14 * DAY, false),
    ("map-repo-modules", TaskCategory::Map, CostTier::Low, TaskRisk::Low, 14 * DAY, false),
    ("map-external-dependencies", TaskCategory::Map, CostTier::Low, TaskRisk::Low, 14 * DAY, false),
    ("map-test-suite-layout", TaskCategory::Map, CostTier::Low, TaskRisk::Low, 14 * DAY, false),
    ("map-public-api-surface", TaskCategory::Map, CostTier::Low, TaskRisk::Low, 14 * DAY, false),
    ("emergency-build-broken", TaskCategory::Emergency, CostTier::Medium, TaskRisk::High, 60, false),
    ("emergency-incident-triage", TaskCategory::Emergency, CostTier::High, TaskRisk::High, HOUR, false),
];

pub fn builtin_definitions() -> Vec<TaskDefinition> {
    TABLE
        .iter()
        .map(|&(type_id, category, cost_tier, risk, cooldown_secs, disabled_by_default)| TaskDefinition {
            type_id: type_id.to_string(),
            category,
            cost_tier,
            risk,
            default_cooldown: Duration::from_secs(cooldown_secs),
            disabled_by_default,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn at_least_sixty_builtins() {
        assert!(TABLE.len() >= 60, "expected at least 60 built-ins, got {}", TABLE.len());
    }

    #[test]
    fn type_ids_are_unique() {
        let ids: HashSet<&str> = TABLE.iter().map(|t| t.0).collect();
        assert_eq!(ids.len(), TABLE.len());
    }

    #[test]
    fn every_builtin_has_nonzero_cooldown() {
        for def in builtin_definitions() {
            assert!(!def.default_cooldown.is_zero(), "{} has zero cooldown", def.type_id);
        }
    }
}
