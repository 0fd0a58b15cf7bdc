//! Plugin registry.
//!
//! Maps plugin names to factories. Built once at startup and read-only
//! afterwards; the resolver and wiring only ever look factories up.

use std::collections::HashMap;
use std::sync::Arc;

use strum_macros::{AsRefStr, Display};
use thiserror::Error;

use crate::plugin::credentials::{
    ANONYMOUS_PLUGIN_NAME, Anonymous, TOKEN_PLUGIN_NAME, TokenCredentials,
};
use crate::plugin::source::{
    CONSTANT_PLUGIN_NAME, Constant, HTTP_PROBE_PLUGIN_NAME, HttpProbe, TCP_PROBE_PLUGIN_NAME,
    TcpProbe,
};
use crate::plugin::{
    CredentialFactory, CredentialPlugin, PluginError, Session, SourceFactory, SourcePlugin,
};

/// Which of the two plugin namespaces a name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum PluginKind {
    Credentials,
    Source,
}

/// Registry lookup errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{kind} plugin '{name}' is not registered")]
    PluginNotFound { name: String, kind: PluginKind },
}

/// Name to factory lookup for credential and source plugins.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    credentials: HashMap<&'static str, CredentialFactory>,
    sources: HashMap<&'static str, SourceFactory>,
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every compiled-in plugin.
    pub fn builtin() -> Self {
        Self::new()
            .with_credentials(ANONYMOUS_PLUGIN_NAME, Anonymous::factory)
            .with_credentials(TOKEN_PLUGIN_NAME, TokenCredentials::factory)
            .with_source(TCP_PROBE_PLUGIN_NAME, TcpProbe::factory)
            .with_source(HTTP_PROBE_PLUGIN_NAME, HttpProbe::factory)
            .with_source(CONSTANT_PLUGIN_NAME, Constant::factory)
    }

    /// Register a credential plugin factory. A later registration replaces an
    /// earlier one with the same name.
    pub fn with_credentials<F>(mut self, name: &'static str, factory: F) -> Self
    where
        F: Fn(Option<&Session>) -> Box<dyn CredentialPlugin> + Send + Sync + 'static,
    {
        self.credentials.insert(name, Arc::new(factory));
        self
    }

    /// Register a source plugin factory.
    pub fn with_source<F>(mut self, name: &'static str, factory: F) -> Self
    where
        F: Fn(&Session) -> Result<Box<dyn SourcePlugin>, PluginError> + Send + Sync + 'static,
    {
        self.sources.insert(name, Arc::new(factory));
        self
    }

    /// Look up a credential plugin factory.
    pub fn credentials(&self, name: &str) -> Result<&CredentialFactory, RegistryError> {
        self.credentials
            .get(name)
            .ok_or_else(|| RegistryError::PluginNotFound {
                name: name.to_string(),
                kind: PluginKind::Credentials,
            })
    }

    /// Look up a source plugin factory.
    pub fn source(&self, name: &str) -> Result<&SourceFactory, RegistryError> {
        self.sources
            .get(name)
            .ok_or_else(|| RegistryError::PluginNotFound {
                name: name.to_string(),
                kind: PluginKind::Source,
            })
    }

    /// Registered names of one kind, sorted.
    pub fn names(&self, kind: PluginKind) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = match kind {
            PluginKind::Credentials => self.credentials.keys().copied().collect(),
            PluginKind::Source => self.sources.keys().copied().collect(),
        };
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("credentials", &self.names(PluginKind::Credentials))
            .field("sources", &self.names(PluginKind::Source))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        let registry = PluginRegistry::builtin();
        assert_eq!(
            registry.names(PluginKind::Credentials),
            vec!["anonymous", "token"]
        );
        assert_eq!(
            registry.names(PluginKind::Source),
            vec!["constant", "http_probe", "tcp_probe"]
        );
    }

    #[test]
    fn test_lookup_missing_names_kind() {
        let registry = PluginRegistry::builtin();

        let err = registry.source("nope").err().unwrap();
        assert!(matches!(
            &err,
            RegistryError::PluginNotFound { name, kind: PluginKind::Source } if name == "nope"
        ));
        assert_eq!(err.to_string(), "source plugin 'nope' is not registered");

        let err = registry.credentials("tcp_probe").err().unwrap();
        assert_eq!(
            err.to_string(),
            "credentials plugin 'tcp_probe' is not registered"
        );
    }

    #[tokio::test]
    async fn test_registered_factory_is_used() {
        let registry = PluginRegistry::new().with_credentials("anon2", Anonymous::factory);

        let factory = registry.credentials("anon2").unwrap();
        let plugin = factory(None);
        let session = plugin
            .credentials(&tokio_util::sync::CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(session, Session::Anonymous);
        assert!(registry.source("anon2").is_err());
    }

    #[test]
    fn test_empty_registry() {
        let registry = PluginRegistry::new();
        assert!(registry.names(PluginKind::Credentials).is_empty());
        assert!(registry.names(PluginKind::Source).is_empty());
    }
}
