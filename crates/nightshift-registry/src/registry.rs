use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use nightshift_types::{CostTier, TaskDefinition, TaskRisk};

use crate::builtins::builtin_definitions;
use crate::error::{RegistryError, RegistryResult};

struct Inner {
    definitions: HashMap<String, TaskDefinition>,
    custom: HashSet<String>,
}

/// Process-global keyed map `type_id -> TaskDefinition`. Built-ins are
/// loaded at construction; only mutated at process init or in tests, so a
/// plain `RwLock` (not `tokio::sync`) is enough — no caller holds it across
/// an await point.
#[derive(Clone)]
pub struct TaskRegistry {
    inner: std::sync::Arc<RwLock<Inner>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        let definitions = builtin_definitions()
            .into_iter()
            .map(|def| (def.type_id.clone(), def))
            .collect();
        Self {
            inner: std::sync::Arc::new(RwLock::new(Inner {
                definitions,
                custom: HashSet::new(),
            })),
        }
    }

    pub fn register_custom(&self, def: TaskDefinition) -> RegistryResult<()> {
        let mut guard = self.inner.write().unwrap();
        if guard.definitions.contains_key(&def.type_id) {
            return Err(RegistryError::AlreadyRegistered(def.type_id));
        }
        guard.custom.insert(def.type_id.clone());
        guard.definitions.insert(def.type_id.clone(), def);
        Ok(())
    }

    pub fn unregister_custom(&self, type_id: &str) -> RegistryResult<()> {
        let mut guard = self.inner.write().unwrap();
        if !guard.custom.remove(type_id) {
            return Err(RegistryError::NotCustom(type_id.to_string()));
        }
        guard.definitions.remove(type_id);
        Ok(())
    }

    pub fn get(&self, type_id: &str) -> Option<TaskDefinition> {
        self.inner.read().unwrap().definitions.get(type_id).cloned()
    }

    /// Deterministic ordering by `(category, type_id)`.
    pub fn all_definitions_sorted(&self) -> Vec<TaskDefinition> {
        let mut defs: Vec<TaskDefinition> = self.inner.read().unwrap().definitions.values().cloned().collect();
        defs.sort_by(|a, b| (a.category, &a.type_id).cmp(&(b.category, &b.type_id)));
        defs
    }

    pub fn by_max_cost(&self, budget_cap: u64) -> Vec<TaskDefinition> {
        self.all_definitions_sorted().into_iter().filter(|d| d.max_cost() <= budget_cap).collect()
    }

    pub fn by_risk(&self, risk: TaskRisk) -> Vec<TaskDefinition> {
        self.all_definitions_sorted().into_iter().filter(|d| d.risk == risk).collect()
    }

    pub fn by_cost_tier(&self, tier: CostTier) -> Vec<TaskDefinition> {
        self.all_definitions_sorted().into_iter().filter(|d| d.cost_tier == tier).collect()
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use nightshift_types::TaskCategory;

    fn custom_def(type_id: &str) -> TaskDefinition {
        TaskDefinition {
            type_id: type_id.to_string(),
            category: TaskCategory::PR,
            cost_tier: CostTier::Low,
            risk: TaskRisk::Low,
            default_cooldown: Duration::from_secs(3600),
            disabled_by_default: false,
        }
    }

    #[test]
    fn builtins_are_preloaded() {
        let registry = TaskRegistry::new();
        assert!(registry.get("docs-backfill").is_some());
    }

    #[test]
    fn register_custom_rejects_duplicate_type() {
        let registry = TaskRegistry::new();
        assert!(registry.register_custom(custom_def("docs-backfill")).is_err());
        assert!(registry.register_custom(custom_def("my-custom-task")).is_ok());
        assert!(registry.register_custom(custom_def("my-custom-task")).is_err());
    }

    #[test]
    fn unregister_custom_cannot_remove_builtin() {
        let registry = TaskRegistry::new();
        assert!(registry.unregister_custom("docs-backfill").is_err());
        assert!(registry.get("docs-backfill").is_some());
    }

    #[test]
    fn unregister_custom_removes_custom_entry() {
        let registry = TaskRegistry::new();
        registry.register_custom(custom_def("my-custom-task")).unwrap();
        registry.unregister_custom("my-custom-task").unwrap();
        assert!(registry.get("my-custom-task").is_none());
    }

    #[test]
    fn all_definitions_sorted_is_deterministic() {
        let registry = TaskRegistry::new();
        let first = registry.all_definitions_sorted();
        let second = registry.all_definitions_sorted();
        let first_ids: Vec<_> = first.iter().map(|d| &d.type_id).collect();
        let second_ids: Vec<_> = second.iter().map(|d| &d.type_id).collect();
        assert_eq!(first_ids, second_ids);
        for pair in first.windows(2) {
            assert!((pair[0].category, &pair[0].type_id) <= (pair[1].category, &pair[1].type_id));
        }
    }
}
