//! Config loading, layering, and validation.

use super::model::Config;
use crate::context::join_path;
use crate::error::{Result, RunkitError};
use serde_yaml::{Mapping, Value};
use std::path::Path;

impl Config {
    /// Load config from a YAML file.
    ///
    /// If the file names an `extra_config`, that file is loaded too and its
    /// keys override the base file. A relative `extra_config` is resolved
    /// against the directory holding the base file. Layering is one level
    /// deep: an `extra_config` key inside the extra file is ignored.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut base = read_mapping(path)?;

        let extra = base
            .get("extra_config")
            .and_then(Value::as_str)
            .map(str::to_string);

        if let Some(extra) = extra {
            let base_dir = path.parent().unwrap_or(Path::new("."));
            let extra_path = join_path(base_dir, &extra);
            let mut overlay = read_mapping(&extra_path)?;
            overlay.remove("extra_config");
            tracing::debug!(path = %extra_path.display(), "layering extra config");
            for (key, value) in overlay {
                base.insert(key, value);
            }
        }

        Self::from_value(Value::Mapping(base))
    }

    /// Parse config from a YAML string. No layering is applied.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value = parse_yaml(yaml)?;
        Self::from_value(value)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| RunkitError::ConfigError(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Validate config values.
    ///
    /// - `run_dir` and `log_dir` must be non-empty
    pub fn validate(&self) -> Result<()> {
        if self.run_dir.trim().is_empty() {
            return Err(RunkitError::ConfigError(
                "config validation failed: run_dir must not be empty".to_string(),
            ));
        }

        if self.log_dir.trim().is_empty() {
            return Err(RunkitError::ConfigError(
                "config validation failed: log_dir must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    fn from_value(value: Value) -> Result<Self> {
        let config: Config = serde_yaml::from_value(value)
            .map_err(|e| RunkitError::ConfigError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }
}

fn parse_yaml(yaml: &str) -> Result<Value> {
    let value: Value = serde_yaml::from_str(yaml)
        .map_err(|e| RunkitError::ConfigError(format!("failed to parse config YAML: {}", e)))?;

    // An empty document parses as null; treat it as an empty mapping.
    Ok(match value {
        Value::Null => Value::Mapping(Mapping::new()),
        other => other,
    })
}

fn read_mapping(path: &Path) -> Result<Mapping> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        RunkitError::ConfigError(format!(
            "failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    match parse_yaml(&content)? {
        Value::Mapping(mapping) => Ok(mapping),
        _ => Err(RunkitError::ConfigError(format!(
            "config file '{}' must contain a YAML mapping",
            path.display()
        ))),
    }
}
