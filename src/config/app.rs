//! Application configuration structures.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde_yaml::Mapping;
use tokio_util::sync::CancellationToken;

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::core::{DEFAULT_CHANNEL_CAPACITY, Declarations, RunOptions};

use super::declaration::{credential_declarations, source_declarations};
use super::validation::{ConfigError, expand_env_vars};

/// Config file read when none is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/cloudsurvey/cloudsurvey.yaml";

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

// =============================================================================
// Runtime Configuration
// =============================================================================

/// Settings for a single run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RuntimeConfig {
    /// Output queue depth (default: 100).
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Entries per run cache (default: 1024).
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Whole-run deadline. Sources are cancelled once it elapses.
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            timeout: None,
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Credential entries grouped by plugin name, in file order.
    #[serde(default)]
    pub credentials: Mapping,

    /// Source entries grouped by plugin name, in file order.
    #[serde(default)]
    pub sources: Mapping,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text, expanding environment variables.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(&expand_env_vars(content))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.channel_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "runtime channel_capacity must be positive".to_string(),
            ));
        }

        if self.runtime.cache_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "runtime cache_capacity must be positive".to_string(),
            ));
        }

        if self.runtime.timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::ValidationError(
                "runtime timeout must be non-zero".to_string(),
            ));
        }

        self.declarations()?;
        Ok(())
    }

    /// Credential and source declarations in file order.
    pub fn declarations(&self) -> Result<Declarations, ConfigError> {
        Ok(Declarations {
            credentials: credential_declarations(&self.credentials)?,
            sources: source_declarations(&self.sources)?,
        })
    }

    /// Run options derived from the runtime section.
    pub fn run_options(&self, cancel: CancellationToken) -> RunOptions {
        RunOptions {
            cancel,
            channel_capacity: self.runtime.channel_capacity,
            cache_capacity: self.runtime.cache_capacity,
        }
    }
}
