//! Built-in source plugins.
//!
//! - [`TcpProbe`]: TCP connect latency for a list of targets
//! - [`HttpProbe`]: HTTP endpoint status and latency
//! - [`Constant`]: fixed measurement, handy for smoke tests

mod constant;
mod http;
mod tcp;

pub use constant::{CONSTANT_PLUGIN_NAME, Constant, ConstantConfig};
pub use http::{HTTP_PROBE_PLUGIN_NAME, HttpMethod, HttpProbe, HttpProbeConfig};
pub use tcp::{TCP_PROBE_PLUGIN_NAME, TcpProbe, TcpProbeConfig};
