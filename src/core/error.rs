//! Core error types.

use strum_macros::{AsRefStr, Display};
use thiserror::Error;

use crate::plugin::PluginError;
use crate::registry::RegistryError;

/// Plugin lifecycle step that failed during startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Stage {
    /// The source factory rejected the session.
    Instantiate,
    Configure,
    Init,
    Credentials,
}

/// Startup failures. Any of these aborts the run before a source starts.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A `from` reference names no earlier session.
    #[error("session '{0}' not found")]
    SessionNotFound(String),

    #[error("{plugin} plugin failed at {stage}: {source}")]
    Plugin {
        plugin: String,
        stage: Stage,
        source: PluginError,
    },
}

impl ResolveError {
    pub(crate) fn plugin(plugin: &str, stage: Stage) -> impl FnOnce(PluginError) -> Self + '_ {
        move |source| Self::Plugin {
            plugin: plugin.to_string(),
            stage,
            source,
        }
    }
}

/// Run-level failures.
#[derive(Debug, Error)]
pub enum RunError {
    /// Writing to the output sink failed.
    #[error("output error: {0}")]
    Output(#[source] std::io::Error),
}
