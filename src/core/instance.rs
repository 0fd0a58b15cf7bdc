use crate::metric::Tags;
use crate::plugin::{Session, SourcePlugin};

/// A resolved credential declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInstance {
    name: Option<String>,
    label: String,
    scopes: Vec<String>,
    tags: Tags,
    session: Session,
}

impl SessionInstance {
    /// Create an instance. A blank name counts as no name.
    pub fn new(
        name: Option<String>,
        label: String,
        scopes: Vec<String>,
        tags: Tags,
        session: Session,
    ) -> Self {
        Self {
            name: name.filter(|n| !n.is_empty()),
            label,
            scopes,
            tags,
            session,
        }
    }

    /// Instance name, if the declaration had one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name used in logs and source names: the instance name, or
    /// `<plugin>#<index>` for unnamed instances.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.label)
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Whether this session serves `scope` (exact match).
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// The declaration's own metric tags.
    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

/// A configured source plugin bound to one session.
pub struct SourceInstance {
    /// `<plugin>#<declaration index>@<session label>`.
    pub name: String,
    /// Session tags overridden by declaration tags.
    pub tags: Tags,
    pub plugin: Box<dyn SourcePlugin>,
}

impl std::fmt::Debug for SourceInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceInstance")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("plugin", &self.plugin.description())
            .finish()
    }
}
