//! Configuration module for cloudsurvey.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Runtime settings (output queue depth, run cache size, run timeout)
//! - Credential declarations, grouped by plugin name
//! - Source declarations, grouped by plugin name
//!
//! `${VAR}` and `${VAR:-default}` references are expanded from the
//! environment before the YAML is parsed.

mod app;
mod declaration;
mod validation;

pub use app::{AppConfig, DEFAULT_CONFIG_PATH, RuntimeConfig};
pub use validation::{ConfigError, expand_env_vars, parse_timeout};
