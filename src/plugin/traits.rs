//! Core plugin traits and types.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::session::{Session, SessionKind};
use crate::cache::RunCaches;
use crate::metric::Collector;

/// Errors that can occur inside a plugin.
#[derive(Debug, Error)]
pub enum PluginError {
    /// Plugin configuration could not be deserialized.
    #[error("config error: {0}")]
    Config(#[from] serde_yaml::Error),

    /// Plugin configuration is well-formed but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The plugin received a session variant it cannot use.
    #[error("session mismatch: expected {expected}, found {found}")]
    SessionMismatch {
        /// Variant(s) the plugin accepts.
        expected: &'static str,
        /// Variant it was given.
        found: SessionKind,
    },

    /// Local I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote HTTP call failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The run was cancelled before the plugin finished.
    #[error("cancelled")]
    Cancelled,

    /// Plugin-specific failure.
    #[error("{0}")]
    Source(String),
}

/// Opaque, plugin-specific configuration taken from a declaration.
///
/// Holds the whole declaration entry; plugins pick the keys they understand.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginConfig(serde_yaml::Value);

impl PluginConfig {
    /// Wrap a YAML value.
    pub fn new(value: serde_yaml::Value) -> Self {
        Self(value)
    }

    /// Deserialize the plugin-specific view of this config.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, PluginError> {
        Ok(serde_yaml::from_value(self.0.clone())?)
    }

    /// Raw YAML value.
    pub fn value(&self) -> &serde_yaml::Value {
        &self.0
    }
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()))
    }
}

impl From<serde_yaml::Value> for PluginConfig {
    fn from(value: serde_yaml::Value) -> Self {
        Self(value)
    }
}

/// Per-run context shared by every source task.
#[derive(Debug, Clone)]
pub struct SourceContext {
    cancel: CancellationToken,
    now: DateTime<Utc>,
    caches: RunCaches,
}

impl SourceContext {
    /// Create a context.
    pub fn new(cancel: CancellationToken, now: DateTime<Utc>, caches: RunCaches) -> Self {
        Self { cancel, now, caches }
    }

    /// Token cancelled when the run should stop early.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether the run has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Timestamp shared by every datum of this run.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Caches scoped to this run.
    pub fn caches(&self) -> &RunCaches {
        &self.caches
    }
}

/// A plugin that turns configuration into a [`Session`].
#[async_trait::async_trait]
pub trait CredentialPlugin: Send + Sync {
    /// One-line human readable description.
    fn description(&self) -> &'static str;

    /// Apply the declaration's plugin-specific configuration.
    fn configure(&mut self, config: &PluginConfig) -> Result<(), PluginError>;

    /// One-shot hook run after configuration.
    fn init(&mut self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Produce the session handle. May perform I/O.
    async fn credentials(&self, cancel: &CancellationToken) -> Result<Session, PluginError>;
}

/// A plugin that collects metrics using a [`Session`].
///
/// A source records into the collector it is given and returns once all of
/// its metrics have been recorded. Long-running sources should stop early
/// when [`SourceContext::is_cancelled`] turns true.
#[async_trait::async_trait]
pub trait SourcePlugin: Send + Sync {
    /// One-line human readable description.
    fn description(&self) -> &'static str;

    /// Apply the declaration's plugin-specific configuration.
    fn configure(&mut self, config: &PluginConfig) -> Result<(), PluginError>;

    /// One-shot hook run after configuration.
    fn init(&mut self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Collect metrics into `collector`.
    async fn source(
        &self,
        ctx: &SourceContext,
        collector: &dyn Collector,
    ) -> Result<(), PluginError>;
}

/// Builds an unconfigured credential plugin, given the parent session if the
/// declaration derives from one.
pub type CredentialFactory =
    Arc<dyn Fn(Option<&Session>) -> Box<dyn CredentialPlugin> + Send + Sync>;

/// Builds an unconfigured source plugin bound to a session.
pub type SourceFactory =
    Arc<dyn Fn(&Session) -> Result<Box<dyn SourcePlugin>, PluginError> + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default)]
        flag: bool,
        #[serde(default)]
        count: u32,
    }

    #[test]
    fn test_plugin_config_ignores_unknown_keys() {
        let value: serde_yaml::Value =
            serde_yaml::from_str("name: x\nscopes: [a]\nflag: true\ncount: 3").unwrap();
        let sample: Sample = PluginConfig::new(value).parse().unwrap();
        assert!(sample.flag);
        assert_eq!(sample.count, 3);
    }

    #[test]
    fn test_plugin_config_default_is_empty_mapping() {
        let sample: Sample = PluginConfig::default().parse().unwrap();
        assert!(!sample.flag);
        assert_eq!(sample.count, 0);
    }

    #[test]
    fn test_plugin_config_type_error() {
        let value: serde_yaml::Value = serde_yaml::from_str("count: many").unwrap();
        let result = PluginConfig::new(value).parse::<Sample>();
        assert!(matches!(result, Err(PluginError::Config(_))));
    }

    #[test]
    fn test_session_mismatch_message() {
        let err = PluginError::SessionMismatch {
            expected: "token",
            found: SessionKind::Anonymous,
        };
        assert_eq!(
            err.to_string(),
            "session mismatch: expected token, found anonymous"
        );
    }
}
