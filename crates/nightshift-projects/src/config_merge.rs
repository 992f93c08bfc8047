use std::path::Path;

use nightshift_core::ConfigLayers;

use crate::error::{ProjectsError, ProjectsResult};

/// Reads `<project_path>/.nightshift.yaml` if present and overlays it on
/// `global`, project values winning at the leaf. A missing file returns
/// `global` unchanged.
pub fn merge_project_config(global: &ConfigLayers, project_path: &Path) -> ProjectsResult<ConfigLayers> {
    let config_path = project_path.join(".nightshift.yaml");
    if !config_path.exists() {
        return Ok(global.clone());
    }

    let raw = std::fs::read_to_string(&config_path)?;
    let value: serde_yaml::Value = serde_yaml::from_str(&raw).map_err(|source| ProjectsError::ConfigParse {
        path: config_path.display().to_string(),
        source,
    })?;
    let overlay = serde_json::to_value(value).unwrap_or_default();
    Ok(global.with_project_overlay(overlay))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_project_config_returns_global_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let global = ConfigLayers {
            global: serde_json::json!({"budget": {"weekly_token_budget": 100}}),
            ..Default::default()
        };
        let merged = merge_project_config(&global, dir.path()).unwrap();
        assert_eq!(merged.effective(), global.effective());
    }

    #[test]
    fn project_config_overlays_global() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".nightshift.yaml"), "budget:\n  weekly_token_budget: 5000\n").unwrap();
        let global = ConfigLayers {
            global: serde_json::json!({"budget": {"weekly_token_budget": 100, "mode": "weekly"}}),
            ..Default::default()
        };
        let merged = merge_project_config(&global, dir.path()).unwrap();
        assert_eq!(merged.effective()["budget"]["weekly_token_budget"], 5000);
        assert_eq!(merged.effective()["budget"]["mode"], "weekly");
    }
}
