use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("invalid time of day: {0}")]
    InvalidTimeOfDay(String),

    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("invalid budget mode: {0}")]
    InvalidBudgetMode(String),

    #[error("percent out of range: {0}")]
    PercentOutOfRange(f64),

    #[error("malformed duration: {0}")]
    MalformedDuration(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

fn read_yaml_file(path: &Path) -> ConfigResult<Value> {
    if !path.exists() {
        return Ok(empty_object());
    }
    let raw = std::fs::read_to_string(path)?;
    let value: serde_yaml::Value = serde_yaml::from_str(&raw)
        .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
    serde_json::to_value(value).map_err(|e| ConfigError::Parse(e.to_string()))
}

fn env_layer(prefix: &str) -> Value {
    let mut map = serde_json::Map::new();
    for (key, value) in std::env::vars() {
        let Some(rest) = key.strip_prefix(prefix) else {
            continue;
        };
        let path: Vec<&str> = rest.split("__").filter(|s| !s.is_empty()).collect();
        if path.is_empty() {
            continue;
        }
        insert_path(&mut map, &path, value);
    }
    Value::Object(map)
}

fn insert_path(map: &mut serde_json::Map<String, Value>, path: &[&str], value: String) {
    let key = path[0].to_ascii_lowercase();
    if path.len() == 1 {
        map.insert(key, Value::String(value));
        return;
    }
    let entry = map
        .entry(key)
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    if let Value::Object(nested) = entry {
        insert_path(nested, &path[1..], value);
    }
}

/// Deep-merges `overlay` into `base`, overlay winning at the leaf. `null`
/// values in the overlay never erase an existing base value.
fn deep_merge(base: &mut Value, overlay: &Value) {
    if overlay.is_null() {
        return;
    }
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                if value.is_null() {
                    continue;
                }
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base_value, overlay_value) => {
            *base_value = overlay_value.clone();
        }
    }
}

/// Layered configuration: global file < per-project file < environment < CLI
/// flags, merged ascending into one effective value. Each layer is an
/// optional `serde_json::Value`; `None` layers are skipped.
#[derive(Debug, Default, Clone)]
pub struct ConfigLayers {
    pub global: Value,
    pub project: Value,
    pub env: Value,
    pub cli: Value,
}

pub struct ConfigLoader {
    pub env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            env_prefix: "NIGHTSHIFT_".to_string(),
        }
    }
}

impl ConfigLoader {
    /// Loads the global config file, builds the env layer, and returns a
    /// `ConfigLayers` with an empty project layer (overlaid later per project
    /// by `ProjectResolver::merge_project_config`).
    pub fn load_global(&self, global_config_path: &Path) -> ConfigResult<ConfigLayers> {
        let global = read_yaml_file(global_config_path)?;
        let env = env_layer(&self.env_prefix);
        Ok(ConfigLayers {
            global,
            project: empty_object(),
            env,
            cli: empty_object(),
        })
    }

    pub fn default_global_config_path() -> PathBuf {
        if let Ok(path) = std::env::var("NIGHTSHIFT_CONFIG") {
            return PathBuf::from(path);
        }
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("nightshift").join("config.yaml")
    }
}

impl ConfigLayers {
    pub fn effective(&self) -> Value {
        let mut merged = self.global.clone();
        deep_merge(&mut merged, &self.project);
        deep_merge(&mut merged, &self.env);
        deep_merge(&mut merged, &self.cli);
        merged
    }

    pub fn with_project_overlay(&self, overlay: Value) -> ConfigLayers {
        ConfigLayers {
            global: self.global.clone(),
            project: overlay,
            env: self.env.clone(),
            cli: self.cli.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merge_overlay_wins_at_leaf() {
        let mut base = json!({"budget": {"weekly_token_budget": 100, "mode": "weekly"}});
        let overlay = json!({"budget": {"mode": "daily"}});
        deep_merge(&mut base, &overlay);
        assert_eq!(base["budget"]["mode"], "daily");
        assert_eq!(base["budget"]["weekly_token_budget"], 100);
    }

    #[test]
    fn deep_merge_null_overlay_leaf_does_not_erase() {
        let mut base = json!({"a": 1});
        let overlay = json!({"a": null});
        deep_merge(&mut base, &overlay);
        assert_eq!(base["a"], 1);
    }

    #[test]
    fn missing_global_file_yields_empty_object() {
        let path = Path::new("/nonexistent/nightshift/config.yaml");
        let value = read_yaml_file(path).unwrap();
        assert_eq!(value, empty_object());
    }
}
