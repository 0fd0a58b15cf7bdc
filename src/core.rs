//! Orchestration core.
//!
//! Turns declarations into running sources:
//!
//! 1. [`resolve_sessions`] builds the session graph from credential declarations
//! 2. [`wire_sources`] fans source declarations out over scope-matched sessions
//! 3. [`Runner::run`] executes every source concurrently and writes their
//!    metrics as line protocol

mod declaration;
mod error;
mod instance;
mod resolver;
mod runner;
mod wiring;

pub use declaration::{CredentialDeclaration, Declarations, SourceDeclaration};
pub use error::{ResolveError, RunError, Stage};
pub use instance::{SessionInstance, SourceInstance};
pub use resolver::resolve_sessions;
pub use runner::{
    DEFAULT_CHANNEL_CAPACITY, RunOptions, RunReport, Runner, SourceFailure, SourceOutcome,
};
pub use wiring::wire_sources;

#[cfg(test)]
pub(crate) mod testing;
