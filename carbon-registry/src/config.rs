//! Configuration for the farmer registry.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Error types for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// YAML did not parse
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Values parsed but are unusable
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Configuration for a registry instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry instance name, used in log fields
    pub registry_id: String,
    /// Input limits
    pub limits: LimitsConfig,
    /// Event emission settings
    pub events: EventsConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            registry_id: "carbon-footprint".to_string(),
            limits: LimitsConfig::default(),
            events: EventsConfig::default(),
        }
    }
}

impl RegistryConfig {
    /// Create a config with the given registry ID.
    pub fn new(registry_id: impl Into<String>) -> Self {
        Self {
            registry_id: registry_id.into(),
            ..Default::default()
        }
    }

    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Reject values the registry cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registry_id.trim().is_empty() {
            return Err(ConfigError::Invalid("registry_id must not be empty".to_string()));
        }
        if self.limits.max_name_len == 0 || self.limits.max_location_len == 0 {
            return Err(ConfigError::Invalid(
                "text limits must be at least 1 character".to_string(),
            ));
        }
        if self.events.broadcast_capacity == 0 {
            return Err(ConfigError::Invalid(
                "broadcast_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Limits applied to registration text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum farmer name length (characters)
    pub max_name_len: usize,
    /// Maximum location length (characters)
    pub max_location_len: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_name_len: 256,
            max_location_len: 256,
        }
    }
}

/// Event emission configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Log every event through `tracing`
    pub log_events: bool,
    /// Buffer size for broadcast subscribers
    pub broadcast_capacity: usize,
    /// Append events as JSON lines to this file
    pub audit_log_path: Option<PathBuf>,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            log_events: true,
            broadcast_capacity: 1024,
            audit_log_path: None,
        }
    }
}
