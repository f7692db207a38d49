//! Adapter and session configuration, loaded from TOML.

use printlink_shared::reconciler::DEFAULT_RESYNC_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AdapterConfig {
    /// Used when a request does not carry its own timeout.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Consecutive out-of-sequence pushes before a full status resync.
    #[serde(default = "default_resync_threshold")]
    pub resync_threshold: u32,
    /// How many one-way request ids to remember so their replies are recognised.
    #[serde(default = "default_oneway_history")]
    pub oneway_history: usize,
    /// Capacity of each session's event broadcast channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            resync_threshold: default_resync_threshold(),
            oneway_history: default_oneway_history(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl AdapterConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_timeout_ms == 0 {
            return Err(ConfigError::Invalid("default_timeout_ms must be > 0".to_string()));
        }
        if self.resync_threshold == 0 {
            return Err(ConfigError::Invalid("resync_threshold must be >= 1".to_string()));
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::Invalid("event_buffer must be >= 1".to_string()));
        }
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AdapterConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

pub fn load_config(path: &str) -> Result<AdapterConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = AdapterConfig::from_toml_str(&content)?;
    tracing::info!("Loaded adapter configuration from {}", path);
    Ok(config)
}

fn default_timeout_ms() -> u64 { 10_000 }
fn default_resync_threshold() -> u32 { DEFAULT_RESYNC_THRESHOLD }
fn default_oneway_history() -> usize { 16 }
fn default_event_buffer() -> usize { 64 }

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = AdapterConfig::from_toml_str("resync_threshold = 3").unwrap();
        assert_eq!(config.resync_threshold, 3);
        assert_eq!(config.default_timeout(), Duration::from_secs(10));
        assert_eq!(config.event_buffer, 64);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            AdapterConfig::from_toml_str("resync_threshold = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            AdapterConfig::from_toml_str("default_timeout_ms = \"soon\""),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_timeout_ms = 2500\nevent_buffer = 8").unwrap();
        let config = load_config(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.default_timeout_ms, 2500);
        assert_eq!(config.event_buffer, 8);
        assert!(matches!(load_config("/nonexistent/printlink.toml"), Err(ConfigError::Io(_))));
    }
}
