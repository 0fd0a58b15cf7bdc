//! Built-in credential plugins.
//!
//! - [`Anonymous`]: no credentials at all
//! - [`TokenCredentials`]: bearer token from config, environment or file

mod anonymous;
mod token;

pub use anonymous::{ANONYMOUS_PLUGIN_NAME, Anonymous};
pub use token::{TOKEN_PLUGIN_NAME, TokenConfig, TokenCredentials};
