use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::plugin::{
    CredentialPlugin, PluginConfig, PluginError, Session, SessionKind, TokenSession,
};

/// Registry name of the token credential plugin.
pub const TOKEN_PLUGIN_NAME: &str = "token";

/// Configuration for bearer token credentials.
///
/// Exactly one of `token`, `token_env` or `token_file` must be set, unless
/// the declaration derives from another token session, in which case unset
/// values are taken from the parent.
#[derive(Clone, Default, Deserialize)]
pub struct TokenConfig {
    /// Literal token value.
    #[serde(default)]
    pub token: Option<String>,
    /// Name of an environment variable holding the token.
    #[serde(default)]
    pub token_env: Option<String>,
    /// Path to a file holding the token. Surrounding whitespace is trimmed.
    #[serde(default)]
    pub token_file: Option<PathBuf>,
    /// Account label attached to the session.
    #[serde(default)]
    pub account: Option<String>,
}

impl TokenConfig {
    fn source_count(&self) -> usize {
        [
            self.token.is_some(),
            self.token_env.is_some(),
            self.token_file.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("token_env", &self.token_env)
            .field("token_file", &self.token_file)
            .field("account", &self.account)
            .finish()
    }
}

/// Credential plugin producing [`Session::Token`].
#[derive(Debug)]
pub struct TokenCredentials {
    config: TokenConfig,
    parent: Option<Session>,
}

impl TokenCredentials {
    /// Create an unconfigured plugin, optionally deriving from `parent`.
    pub fn new(parent: Option<Session>) -> Self {
        Self {
            config: TokenConfig::default(),
            parent,
        }
    }

    /// Registry factory.
    pub fn factory(parent: Option<&Session>) -> Box<dyn CredentialPlugin> {
        Box::new(Self::new(parent.cloned()))
    }

    fn parent_token(&self) -> Option<&TokenSession> {
        match &self.parent {
            Some(Session::Token(t)) => Some(t),
            _ => None,
        }
    }

    async fn read_token(&self, cancel: &CancellationToken) -> Result<String, PluginError> {
        if let Some(token) = &self.config.token {
            return Ok(token.clone());
        }

        if let Some(var) = &self.config.token_env {
            return std::env::var(var).map_err(|_| {
                PluginError::Invalid(format!("environment variable '{var}' is not set"))
            });
        }

        if let Some(path) = &self.config.token_file {
            let content = tokio::select! {
                _ = cancel.cancelled() => return Err(PluginError::Cancelled),
                content = tokio::fs::read_to_string(path) => content?,
            };
            return Ok(content.trim().to_string());
        }

        self.parent_token()
            .map(|t| t.token.clone())
            .ok_or_else(|| PluginError::Invalid("no token source configured".to_string()))
    }
}

#[async_trait::async_trait]
impl CredentialPlugin for TokenCredentials {
    fn description(&self) -> &'static str {
        "provides bearer token sessions"
    }

    fn configure(&mut self, config: &PluginConfig) -> Result<(), PluginError> {
        self.config = config.parse()?;
        Ok(())
    }

    fn init(&mut self) -> Result<(), PluginError> {
        if let Some(parent) = &self.parent
            && parent.kind() != SessionKind::Token
        {
            return Err(PluginError::SessionMismatch {
                expected: "token",
                found: parent.kind(),
            });
        }

        match (self.config.source_count(), self.parent.is_some()) {
            (0, false) => Err(PluginError::Invalid(
                "one of token, token_env or token_file is required".to_string(),
            )),
            (0 | 1, _) => Ok(()),
            _ => Err(PluginError::Invalid(
                "token, token_env and token_file are mutually exclusive".to_string(),
            )),
        }
    }

    async fn credentials(&self, cancel: &CancellationToken) -> Result<Session, PluginError> {
        let token = self.read_token(cancel).await?;
        if token.is_empty() {
            return Err(PluginError::Invalid("resolved token is empty".to_string()));
        }

        let account = self
            .config
            .account
            .clone()
            .or_else(|| self.parent_token().and_then(|t| t.account.clone()));

        tracing::debug!(account = ?account, derived = self.parent.is_some(), "Token session resolved");
        Ok(Session::Token(Arc::new(TokenSession::new(token, account))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn configured(parent: Option<Session>, yaml: &str) -> TokenCredentials {
        let mut plugin = TokenCredentials::new(parent);
        let value: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        plugin.configure(&PluginConfig::new(value)).unwrap();
        plugin
    }

    fn token_of(session: &Session) -> &TokenSession {
        match session {
            Session::Token(t) => t,
            other => panic!("expected token session, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_literal_token() {
        let mut plugin = configured(None, "token: abc\naccount: acme");
        plugin.init().unwrap();

        let session = plugin.credentials(&CancellationToken::new()).await.unwrap();
        let token = token_of(&session);
        assert_eq!(token.token, "abc");
        assert_eq!(token.account.as_deref(), Some("acme"));
    }

    #[tokio::test]
    async fn test_token_from_env() {
        // SAFETY: This test only touches a variable unique to it.
        unsafe {
            std::env::set_var("CLOUDSURVEY_TEST_TOKEN_ENV", "from-env");
        }
        let mut plugin = configured(None, "token_env: CLOUDSURVEY_TEST_TOKEN_ENV");
        plugin.init().unwrap();

        let session = plugin.credentials(&CancellationToken::new()).await.unwrap();
        assert_eq!(token_of(&session).token, "from-env");
        // SAFETY: Cleanup test variable.
        unsafe {
            std::env::remove_var("CLOUDSURVEY_TEST_TOKEN_ENV");
        }
    }

    #[tokio::test]
    async fn test_token_from_missing_env() {
        let mut plugin = configured(None, "token_env: CLOUDSURVEY_TEST_TOKEN_UNSET_12345");
        plugin.init().unwrap();

        let result = plugin.credentials(&CancellationToken::new()).await;
        assert!(matches!(result, Err(PluginError::Invalid(msg)) if msg.contains("not set")));
    }

    #[tokio::test]
    async fn test_token_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  file-token  ").unwrap();

        let yaml = format!("token_file: {}", file.path().display());
        let mut plugin = configured(None, &yaml);
        plugin.init().unwrap();

        let session = plugin.credentials(&CancellationToken::new()).await.unwrap();
        assert_eq!(token_of(&session).token, "file-token");
    }

    #[tokio::test]
    async fn test_empty_token_rejected() {
        let mut plugin = configured(None, "token: ''");
        plugin.init().unwrap();

        let result = plugin.credentials(&CancellationToken::new()).await;
        assert!(matches!(result, Err(PluginError::Invalid(_))));
    }

    #[test]
    fn test_init_requires_a_source() {
        let mut plugin = configured(None, "account: acme");
        assert!(matches!(plugin.init(), Err(PluginError::Invalid(_))));
    }

    #[test]
    fn test_init_rejects_multiple_sources() {
        let mut plugin = configured(None, "token: a\ntoken_env: B");
        let err = plugin.init().unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[tokio::test]
    async fn test_derived_inherits_from_parent() {
        let parent = Session::Token(Arc::new(TokenSession::new(
            "parent-token",
            Some("root-account".to_string()),
        )));
        let mut plugin = configured(Some(parent), "{}");
        plugin.init().unwrap();

        let session = plugin.credentials(&CancellationToken::new()).await.unwrap();
        let token = token_of(&session);
        assert_eq!(token.token, "parent-token");
        assert_eq!(token.account.as_deref(), Some("root-account"));
    }

    #[tokio::test]
    async fn test_derived_overrides_parent() {
        let parent = Session::Token(Arc::new(TokenSession::new("parent-token", None)));
        let mut plugin = configured(Some(parent), "token: child\naccount: sub");
        plugin.init().unwrap();

        let session = plugin.credentials(&CancellationToken::new()).await.unwrap();
        let token = token_of(&session);
        assert_eq!(token.token, "child");
        assert_eq!(token.account.as_deref(), Some("sub"));
    }

    #[test]
    fn test_anonymous_parent_rejected() {
        let mut plugin = configured(Some(Session::Anonymous), "token: x");
        assert!(matches!(
            plugin.init(),
            Err(PluginError::SessionMismatch {
                expected: "token",
                ..
            })
        ));
    }

    #[test]
    fn test_config_debug_redacts_token() {
        let plugin = configured(None, "token: hunter2");
        assert!(!format!("{plugin:?}").contains("hunter2"));
    }
}
