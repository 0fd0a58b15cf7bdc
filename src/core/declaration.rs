use crate::metric::Tags;
use crate::plugin::PluginConfig;

/// One credential entry from the configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CredentialDeclaration {
    /// Registered credential plugin name.
    pub plugin: String,
    /// Instance name. Only needed when another declaration derives from it.
    pub name: Option<String>,
    /// Name of an earlier session this one derives from.
    pub from: Option<String>,
    pub scopes: Vec<String>,
    /// Tags stamped onto every datum of sources bound to this session.
    pub tags: Tags,
    pub config: PluginConfig,
}

impl CredentialDeclaration {
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_scopes(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_config(mut self, config: PluginConfig) -> Self {
        self.config = config;
        self
    }
}

/// One source entry from the configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceDeclaration {
    /// Registered source plugin name.
    pub plugin: String,
    /// Scopes selecting the sessions this source runs against.
    pub scopes: Vec<String>,
    /// Tags overriding session tags on collision.
    pub tags: Tags,
    pub config: PluginConfig,
}

impl SourceDeclaration {
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            ..Self::default()
        }
    }

    pub fn with_scopes(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_config(mut self, config: PluginConfig) -> Self {
        self.config = config;
        self
    }
}

/// Every declaration of a configuration, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Declarations {
    pub credentials: Vec<CredentialDeclaration>,
    pub sources: Vec<SourceDeclaration>,
}
