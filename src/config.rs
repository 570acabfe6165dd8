//! Configuration for the concept graph

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading or checking configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Settings for a `ConceptGraph` and the CLI around it
///
/// Every field has a default, so a YAML file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// SQLite database file
    pub database_path: PathBuf,
    /// Strength given to relationships asserted without one
    pub default_strength: f32,
    /// Confidence given to relationships asserted without one
    pub default_confidence: f32,
    /// Confidence given to tag assignments without one
    pub default_tag_confidence: f32,
    /// Depth used by traversals when the caller gives none
    pub default_max_depth: usize,
    /// tracing level filter: error, warn, info, debug or trace
    pub log_level: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            default_strength: 0.5,
            default_confidence: 0.5,
            default_tag_confidence: 1.0,
            default_max_depth: 3,
            log_level: "warn".to_string(),
        }
    }
}

/// `<data dir>/marie/marie.db`, or `./marie.db` when no data dir is known
pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("marie").join("marie.db"))
        .unwrap_or_else(|| PathBuf::from("marie.db"))
}

impl GraphConfig {
    /// Parse and validate YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("default_strength", self.default_strength),
            ("default_confidence", self.default_confidence),
            ("default_tag_confidence", self.default_tag_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.log_level.parse::<tracing::Level>().is_err() {
            return Err(ConfigError::Invalid(format!("unknown log_level: {}", self.log_level)));
        }

        Ok(())
    }

    /// The configured level, falling back to WARN
    pub fn tracing_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::WARN)
    }
}
