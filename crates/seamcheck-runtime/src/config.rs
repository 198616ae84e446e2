//! Runtime configuration loaded from YAML.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use seamcheck_core::ReportFormat;

/// Environment variable overriding `workers`.
pub const WORKERS_ENV: &str = "SEAMCHECK_WORKERS";

/// Environment variable overriding `shards`.
pub const SHARDS_ENV: &str = "SEAMCHECK_SHARDS";

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid value for {name}: '{value}'")]
    InvalidEnv { name: &'static str, value: String },

    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Where and how a pass writes its results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OutputConfig {
    pub format: ReportFormat,

    /// Report destination; stdout when unset
    pub report_path: Option<PathBuf>,

    /// Evicted-id JSON destination; not written when unset
    pub evicted_path: Option<PathBuf>,
}

/// Configuration for batch runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Blocking check workers
    pub workers: usize,

    /// Store shards (lock granularity)
    pub shards: usize,

    /// Concurrent prediction fetches
    pub fetch_concurrency: usize,

    pub output: OutputConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            shards: 16,
            fetch_concurrency: 8,
            output: OutputConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Parse a config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Apply `SEAMCHECK_WORKERS` and `SEAMCHECK_SHARDS` from the process
    /// environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(workers) = parse_env(&lookup, WORKERS_ENV)? {
            self.workers = workers;
        }
        if let Some(shards) = parse_env(&lookup, SHARDS_ENV)? {
            self.shards = shards;
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject settings a run cannot use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ValidationError("workers must be at least 1".to_string()));
        }
        if self.shards == 0 {
            return Err(ConfigError::ValidationError("shards must be at least 1".to_string()));
        }
        if self.fetch_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "fetch_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<usize>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_yaml_with_defaults() {
        let config = RuntimeConfig::from_yaml(
            r#"
workers: 2
output:
  format: json
  evicted_path: out/evicted.json
"#,
        )
        .unwrap();

        assert_eq!(config.workers, 2);
        assert_eq!(config.shards, 16);
        assert_eq!(config.output.format, ReportFormat::Json);
        assert_eq!(config.output.evicted_path, Some(PathBuf::from("out/evicted.json")));
        assert!(config.output.report_path.is_none());
    }

    #[test]
    fn test_demo_config_parses() {
        let config = RuntimeConfig::from_yaml(include_str!("../../../demos/seamcheck.yaml")).unwrap();
        assert_eq!(config.output.format, ReportFormat::Text);
        assert_eq!(config.output.report_path, Some(PathBuf::from("out/report.txt")));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = RuntimeConfig::from_yaml("workers: 0");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [(WORKERS_ENV, "3"), (SHARDS_ENV, " 5 ")].into();
        let config = RuntimeConfig::default()
            .with_overrides_from(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.workers, 3);
        assert_eq!(config.shards, 5);
    }

    #[test]
    fn test_bad_env_value() {
        let result = RuntimeConfig::default().with_overrides_from(|name| {
            (name == SHARDS_ENV).then(|| "many".to_string())
        });
        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnv { name: SHARDS_ENV, .. })
        ));
    }
}
