//! Engine configuration, loaded from JSON.
//!
//! Every field has a default, so `{}` is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// When false, requests containing expressions are rejected.
    pub expressions_enabled: bool,
    /// Run independent branches of the graph concurrently.
    pub parallel_branches: bool,
    /// Upper bound on one whole pipeline execution.
    pub query_timeout_ms: Option<u64>,
    /// Used for data-source queries that do not set `maxDataPoints`.
    pub default_max_data_points: i64,
    /// Used for data-source queries that do not set `intervalMs`.
    pub default_interval_ms: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            expressions_enabled: true,
            parallel_branches: false,
            query_timeout_ms: None,
            default_max_data_points: 100,
            default_interval_ms: 1000,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_max_data_points <= 0 {
            return Err(ConfigError::Invalid("default_max_data_points must be positive".into()));
        }
        if self.default_interval_ms <= 0 {
            return Err(ConfigError::Invalid("default_interval_ms must be positive".into()));
        }
        if self.query_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid("query_timeout_ms must be positive when set".into()));
        }
        Ok(())
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.expressions_enabled);
        assert_eq!(config.query_timeout(), None);
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_json_str(r#"{ "parallel_branches": true, "query_timeout_ms": 1500 }"#).unwrap();
        assert!(config.parallel_branches);
        assert_eq!(config.query_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.default_max_data_points, 100);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "default_interval_ms": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = EngineConfig::from_json_str(r#"{ "query_timeout_ms": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(matches!(EngineConfig::from_json_str("not json"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "expressions_enabled": false }}"#).unwrap();
        let config = EngineConfig::from_json_file(file.path()).unwrap();
        assert!(!config.expressions_enabled);
    }
}
