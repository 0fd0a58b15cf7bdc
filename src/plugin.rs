//! Plugin Layer
//!
//! Contracts between the core and the compiled-in plugins.
//!
//! # Architecture
//!
//! - [`CredentialPlugin`]: turns configuration into a [`Session`]
//! - [`SourcePlugin`]: collects metrics using a [`Session`]
//! - [`Session`]: closed set of capability handles
//! - [`credentials`] / [`source`]: built-in implementations

pub mod credentials;
mod session;
pub mod source;
mod traits;

pub use session::{Session, SessionKind, TokenSession};
pub use traits::{
    CredentialFactory, CredentialPlugin, PluginConfig, PluginError, SourceContext, SourceFactory,
    SourcePlugin,
};
