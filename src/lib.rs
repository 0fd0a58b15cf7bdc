//! cloudsurvey - pluggable cloud metrics survey
//!
//! This crate resolves credential declarations into sessions, fans source
//! declarations out over the sessions whose scopes they name, runs every
//! source concurrently and writes the metrics they record as line protocol.
//! It can be used as a library or run as the `cloudsurvey` binary.
//!
//! # Architecture
//!
//! - **Metric**: [`Datum`] value model, [`LineEncoder`] and the [`Collector`] sinks
//! - **Plugin**: credential and source plugin contracts, plus built-in plugins
//! - **Registry**: name to factory lookup, built once at startup
//! - **Core**: session resolution, source wiring and the concurrent [`Runner`]
//! - **Config**: YAML loading with environment variable expansion
//!
//! # Example
//!
//! ```rust,no_run
//! use cloudsurvey::{AppConfig, PluginRegistry, Runner};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load("cloudsurvey.yaml")?;
//! let cancel = CancellationToken::new();
//! let runner = Runner::build(&PluginRegistry::builtin(), &config.declarations()?, &cancel).await?;
//!
//! let mut stdout = tokio::io::stdout();
//! let report = runner.run(config.run_options(cancel), &mut stdout).await?;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod core;
pub mod metric;
pub mod plugin;
pub mod registry;

pub use cache::{RunCache, RunCaches};
pub use config::{AppConfig, ConfigError};
pub use crate::core::{
    CredentialDeclaration, Declarations, ResolveError, RunError, RunOptions, RunReport, Runner,
    SourceDeclaration, SourceFailure, SourceOutcome,
};
pub use metric::{Collector, Datum, EncodeError, FieldValue, LineEncoder};
pub use plugin::{PluginConfig, PluginError, Session};
pub use registry::{PluginKind, PluginRegistry, RegistryError};
