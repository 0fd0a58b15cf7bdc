//! Metric Layer
//!
//! Value model, line protocol encoding and the collector sinks plugins write
//! into.
//!
//! - [`Datum`]: one immutable metric record
//! - [`LineEncoder`]: deterministic line protocol serializer
//! - [`Collector`]: sink trait, with [`ChannelCollector`] and
//!   [`TagOverrideCollector`] as the standard implementations

mod collector;
mod datum;
mod encoder;

pub use collector::{ChannelCollector, Collector, Envelope, TagOverrideCollector, VecCollector};
pub use datum::{Datum, FieldValue, Fields, Tags};
pub use encoder::{EncodeError, LineEncoder};
