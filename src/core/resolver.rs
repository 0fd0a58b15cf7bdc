//! Credential resolution.
//!
//! Declarations are processed strictly in order, so a `from` reference can
//! only name a session declared earlier. The first failure aborts everything.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::declaration::CredentialDeclaration;
use super::error::{ResolveError, Stage};
use super::instance::SessionInstance;
use crate::registry::PluginRegistry;

/// Find a constructed session by exact name. Unnamed sessions never match.
fn session_by_name<'a>(
    sessions: &'a [Arc<SessionInstance>],
    name: &str,
) -> Option<&'a Arc<SessionInstance>> {
    if name.is_empty() {
        return None;
    }
    sessions.iter().find(|s| s.name() == Some(name))
}

/// Resolve every credential declaration into a session instance.
pub async fn resolve_sessions(
    registry: &PluginRegistry,
    declarations: &[CredentialDeclaration],
    cancel: &CancellationToken,
) -> Result<Vec<Arc<SessionInstance>>, ResolveError> {
    let mut sessions: Vec<Arc<SessionInstance>> = Vec::with_capacity(declarations.len());

    for (index, decl) in declarations.iter().enumerate() {
        let factory = registry.credentials(&decl.plugin)?;

        let parent = match decl.from.as_deref() {
            Some(from) => Some(
                session_by_name(&sessions, from)
                    .ok_or_else(|| ResolveError::SessionNotFound(from.to_string()))?,
            ),
            None => None,
        };

        let mut plugin = factory(parent.map(|p| p.session()));
        plugin
            .configure(&decl.config)
            .map_err(ResolveError::plugin(&decl.plugin, Stage::Configure))?;
        plugin
            .init()
            .map_err(ResolveError::plugin(&decl.plugin, Stage::Init))?;
        let session = plugin
            .credentials(cancel)
            .await
            .map_err(ResolveError::plugin(&decl.plugin, Stage::Credentials))?;

        let instance = SessionInstance::new(
            decl.name.clone(),
            format!("{}#{index}", decl.plugin),
            decl.scopes.clone(),
            decl.tags.clone(),
            session,
        );
        tracing::debug!(
            session = instance.label(),
            plugin = %decl.plugin,
            kind = %instance.session().kind(),
            parent = parent.map(|p| p.label()),
            scopes = ?instance.scopes(),
            "Session resolved"
        );
        sessions.push(Arc::new(instance));
    }

    Ok(sessions)
}
