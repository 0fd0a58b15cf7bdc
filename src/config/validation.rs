//! Configuration validation utilities.

use std::time::Duration;

use thiserror::Error;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Parse a run timeout such as `90s` or `5m`.
///
/// The same rules apply as for `runtime.timeout` in the config file: the
/// value must be a humantime duration and must not be zero. Used as the
/// `--timeout` value parser.
///
/// ```
/// use cloudsurvey::config::parse_timeout;
///
/// assert_eq!(parse_timeout("1h30m").unwrap().as_secs(), 5400);
/// assert!(parse_timeout("0s").is_err());
/// ```
pub fn parse_timeout(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("timeout is empty".to_string());
    }
    match humantime::parse_duration(s) {
        Ok(d) if d.is_zero() => Err("timeout must be non-zero".to_string()),
        Ok(d) => Ok(d),
        Err(e) => Err(format!("invalid timeout '{s}': {e}")),
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `${VAR:-default}`. Unset variables without a
/// default expand to the empty string.
pub fn expand_env_vars(input: &str) -> String {
    static ENV_VAR_REGEX: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();

    let regex = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var pattern is valid")
    });

    regex
        .replace_all(input, |caps: &regex::Captures| {
            let default_value = caps.get(2).map_or("", |m| m.as_str());
            std::env::var(&caps[1]).unwrap_or_else(|_| default_value.to_string())
        })
        .into_owned()
}
