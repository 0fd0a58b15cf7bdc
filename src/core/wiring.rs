//! Source wiring: fan each source declaration out over the sessions whose
//! scopes it names.

use std::sync::Arc;

use super::declaration::SourceDeclaration;
use super::error::{ResolveError, Stage};
use super::instance::{SessionInstance, SourceInstance};
use crate::metric::Tags;
use crate::registry::PluginRegistry;

/// Sessions matching any of `scopes`, in construction order, each at most once.
fn sessions_by_scope<'a>(
    sessions: &'a [Arc<SessionInstance>],
    scopes: &[String],
) -> Vec<&'a Arc<SessionInstance>> {
    let mut matched: Vec<&Arc<SessionInstance>> = Vec::new();
    for scope in scopes {
        for session in sessions.iter().filter(|s| s.has_scope(scope)) {
            if !matched.iter().any(|m| Arc::ptr_eq(m, session)) {
                matched.push(session);
            }
        }
    }
    matched
}

/// Session tags overridden by declaration tags.
fn merge_tags(session: &Tags, declaration: &Tags) -> Tags {
    let mut tags = session.clone();
    tags.extend(declaration.iter().map(|(k, v)| (k.clone(), v.clone())));
    tags
}

/// Build one source instance per (declaration, matching session) pair.
pub fn wire_sources(
    registry: &PluginRegistry,
    sessions: &[Arc<SessionInstance>],
    declarations: &[SourceDeclaration],
) -> Result<Vec<SourceInstance>, ResolveError> {
    let mut instances = Vec::new();

    for (index, decl) in declarations.iter().enumerate() {
        let factory = registry.source(&decl.plugin)?;
        let matched = sessions_by_scope(sessions, &decl.scopes);
        if matched.is_empty() {
            tracing::warn!(
                plugin = %decl.plugin,
                declaration = index,
                scopes = ?decl.scopes,
                "Source matches no session"
            );
            continue;
        }

        for session in matched {
            let mut plugin = factory(session.session())
                .map_err(ResolveError::plugin(&decl.plugin, Stage::Instantiate))?;
            plugin
                .configure(&decl.config)
                .map_err(ResolveError::plugin(&decl.plugin, Stage::Configure))?;
            plugin
                .init()
                .map_err(ResolveError::plugin(&decl.plugin, Stage::Init))?;

            let name = format!("{}#{index}@{}", decl.plugin, session.label());
            tracing::debug!(source = %name, "Source wired");
            instances.push(SourceInstance {
                name,
                tags: merge_tags(session.tags(), &decl.tags),
                plugin,
            });
        }
    }

    Ok(instances)
}
