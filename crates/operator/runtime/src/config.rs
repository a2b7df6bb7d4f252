//! Runtime configuration
//!
//! Loaded from TOML; every section has defaults so a missing file or a
//! partial file is fine. Two environment variables override the file:
//! `OPERATORS_REMOTE_URL` and `OPERATORS_LOG_LEVEL`.

use crate::error::{Result, RuntimeError};
use operator_types::DEFAULT_NAMESPACE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const REMOTE_URL_ENV: &str = "OPERATORS_REMOTE_URL";
pub const LOG_LEVEL_ENV: &str = "OPERATORS_LOG_LEVEL";

/// Complete runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub remote: RemoteConfig,
    pub dispatch: DispatchConfig,
    pub execution_options: ExecutionOptionsConfig,
    pub logging: LoggingConfig,
}

/// Remote operator peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the peer; remote operators are disabled when unset
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 30,
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Dispatch behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Namespace for bare operator names
    pub default_namespace: String,
    /// Deepest allowed trigger chain; `None` disables the bound
    pub max_trigger_depth: Option<u32>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_namespace: DEFAULT_NAMESPACE.to_string(),
            max_trigger_depth: Some(32),
        }
    }
}

/// Execution-option resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionOptionsConfig {
    /// Coalescing window for re-resolution while params change
    pub debounce_ms: u64,
}

impl Default for ExecutionOptionsConfig {
    fn default() -> Self {
        Self { debounce_ms: 500 }
    }
}

impl ExecutionOptionsConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Logging output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl RuntimeConfig {
    /// Load from a TOML file, falling back to defaults when it does not exist
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(path)?;
                Self::from_toml_str(&contents)?
            }
            _ => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| RuntimeError::Config(e.to_string()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(REMOTE_URL_ENV) {
            if !url.trim().is_empty() {
                self.remote.base_url = Some(url);
            }
        }
        if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
            if !level.trim().is_empty() {
                self.logging.level = level;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert!(config.remote.base_url.is_none());
        assert_eq!(config.dispatch.default_namespace, DEFAULT_NAMESPACE);
        assert_eq!(config.dispatch.max_trigger_depth, Some(32));
        assert_eq!(config.execution_options.debounce(), Duration::from_millis(500));
    }

    #[test]
    fn test_partial_toml() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            [remote]
            base_url = "http://localhost:5151"

            [dispatch]
            default_namespace = "@local/ops"
            "#,
        )
        .unwrap();
        assert_eq!(config.remote.base_url.as_deref(), Some("http://localhost:5151"));
        assert_eq!(config.remote.timeout_secs, 30);
        assert_eq!(config.dispatch.default_namespace, "@local/ops");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_toml() {
        let err = RuntimeConfig::from_toml_str("[remote\nbase_url = 1").unwrap_err();
        assert!(matches!(err, RuntimeError::Config(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let config = RuntimeConfig::load(Some(Path::new("/nonexistent/operators.toml"))).unwrap();
        assert_eq!(config.execution_options.debounce_ms, 500);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("operators-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[execution_options]\ndebounce_ms = 50\n").unwrap();
        let config = RuntimeConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.execution_options.debounce_ms, 50);
    }
}
