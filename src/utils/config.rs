//! Configuration loading: defaults, then a JSON file, then environment
//! variables, then programmatic overrides.

use crate::{DogeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration manager for handling multiple configuration sources
pub struct ConfigManager {
    config_dir: PathBuf,
    environment_prefix: String,
    loaded_configs: HashMap<String, serde_json::Value>,
}

impl ConfigManager {
    pub fn new(config_dir: PathBuf, environment_prefix: &str) -> Self {
        Self {
            config_dir,
            environment_prefix: environment_prefix.to_string(),
            loaded_configs: HashMap::new(),
        }
    }

    /// Load `<config_dir>/<name>.json` over `T::default()`, then apply
    /// `<PREFIX>_<NAME>_<FIELD>` environment variables.
    pub fn load_config<T>(&mut self, config_name: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de> + Serialize + Default,
    {
        let mut config_value = serde_json::to_value(T::default())?;

        let config_file_path = self.config_path(config_name);
        if config_file_path.exists() {
            let file_config = self.load_from_file(&config_file_path)?;
            merge_config_values(&mut config_value, file_config);
        }

        let env_config = self.load_from_environment(config_name);
        merge_config_values(&mut config_value, env_config);

        let final_config: T = serde_json::from_value(config_value)
            .map_err(|e| DogeError::InvalidInput(format!("Failed to deserialize config '{}': {}", config_name, e)))?;

        self.loaded_configs
            .insert(config_name.to_string(), serde_json::to_value(&final_config)?);
        log::debug!("Loaded configuration '{}'", config_name);
        Ok(final_config)
    }

    /// The last value loaded under `config_name`, as JSON.
    pub fn loaded(&self, config_name: &str) -> Option<&serde_json::Value> {
        self.loaded_configs.get(config_name)
    }

    /// Save configuration to file
    pub fn save_config<T: Serialize>(&self, config_name: &str, config: &T) -> Result<()> {
        if !self.config_dir.exists() {
            fs::create_dir_all(&self.config_dir)?;
        }

        let config_file_path = self.config_path(config_name);
        fs::write(&config_file_path, serde_json::to_string_pretty(config)?)?;

        log::info!("Configuration '{}' saved to {:?}", config_name, config_file_path);
        Ok(())
    }

    pub fn config_exists(&self, config_name: &str) -> bool {
        self.config_path(config_name).exists()
    }

    pub fn delete_config(&self, config_name: &str) -> Result<()> {
        let config_file_path = self.config_path(config_name);
        if config_file_path.exists() {
            fs::remove_file(&config_file_path)?;
            log::info!("Configuration '{}' deleted", config_name);
        }
        Ok(())
    }

    fn config_path(&self, config_name: &str) -> PathBuf {
        self.config_dir.join(format!("{}.json", config_name))
    }

    fn load_from_file(&self, file_path: &Path) -> Result<serde_json::Value> {
        let content = fs::read_to_string(file_path)?;
        serde_json::from_str(&content)
            .map_err(|e| DogeError::InvalidInput(format!("Failed to parse config file {:?}: {}", file_path, e)))
    }

    fn load_from_environment(&self, config_name: &str) -> serde_json::Value {
        let prefix = format!("{}_{}_", self.environment_prefix, config_name.to_uppercase());
        let mut env_config = serde_json::Map::new();

        for (key, value) in env::vars() {
            if let Some(field) = key.strip_prefix(&prefix) {
                // Try to parse as JSON first, then fall back to string
                let parsed_value = serde_json::from_str(&value)
                    .unwrap_or_else(|_| serde_json::Value::String(value));
                env_config.insert(field.to_lowercase(), parsed_value);
            }
        }

        serde_json::Value::Object(env_config)
    }
}

fn merge_config_values(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                let nested = value.is_object() && base_map.get(&key).map_or(false, |v| v.is_object());
                match base_map.get_mut(&key) {
                    Some(existing) if nested => merge_config_values(existing, value),
                    _ => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Configuration builder for fluent configuration creation
pub struct ConfigBuilder<T> {
    config: T,
    overrides: HashMap<String, serde_json::Value>,
}

impl<T: Default> ConfigBuilder<T> {
    pub fn new() -> Self {
        Self::from_config(T::default())
    }

    pub fn from_config(config: T) -> Self {
        Self {
            config,
            overrides: HashMap::new(),
        }
    }

    /// Override a top-level field.
    pub fn with_override<V: Serialize>(mut self, key: &str, value: V) -> Result<Self> {
        self.overrides.insert(key.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }

    pub fn build(self) -> Result<T>
    where
        T: Serialize + for<'de> Deserialize<'de>,
    {
        let mut config_value = serde_json::to_value(&self.config)?;
        let overrides = serde_json::Value::Object(self.overrides.into_iter().collect());
        merge_config_values(&mut config_value, overrides);

        serde_json::from_value(config_value)
            .map_err(|e| DogeError::InvalidInput(format!("Failed to deserialize final config: {}", e)))
    }
}

impl<T: Default> Default for ConfigBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
