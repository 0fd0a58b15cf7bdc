use tokio_util::sync::CancellationToken;

use crate::plugin::{CredentialPlugin, PluginConfig, PluginError, Session};

/// Registry name of the anonymous credential plugin.
pub const ANONYMOUS_PLUGIN_NAME: &str = "anonymous";

/// Credential plugin that yields [`Session::Anonymous`].
#[derive(Debug, Default)]
pub struct Anonymous;

impl Anonymous {
    /// Registry factory. The parent session, if any, is irrelevant.
    pub fn factory(_parent: Option<&Session>) -> Box<dyn CredentialPlugin> {
        Box::new(Self)
    }
}

#[async_trait::async_trait]
impl CredentialPlugin for Anonymous {
    fn description(&self) -> &'static str {
        "provides unauthenticated sessions"
    }

    fn configure(&mut self, _config: &PluginConfig) -> Result<(), PluginError> {
        Ok(())
    }

    async fn credentials(&self, _cancel: &CancellationToken) -> Result<Session, PluginError> {
        Ok(Session::Anonymous)
    }
}
