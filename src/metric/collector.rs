//! Collector sinks that source plugins record metrics into.

use std::sync::Mutex;

use tokio::sync::mpsc;

use super::datum::{Datum, Tags};

/// Sink a source plugin invokes to emit metrics.
///
/// `record` may suspend: the channel-backed collector waits for queue space,
/// which is how slow output applies backpressure to every producer.
#[async_trait::async_trait]
pub trait Collector: Send + Sync {
    /// Hand one datum to the sink.
    async fn record(&self, datum: Datum);
}

/// A datum tagged with the index of the source instance that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Index of the producing source instance.
    pub origin: usize,
    /// The recorded datum.
    pub datum: Datum,
}

/// Collector that forwards into a bounded channel.
///
/// Blocks (asynchronously) while the channel is full.
#[derive(Debug, Clone)]
pub struct ChannelCollector {
    tx: mpsc::Sender<Envelope>,
    origin: usize,
}

impl ChannelCollector {
    /// Create a collector sending into `tx`.
    pub fn new(tx: mpsc::Sender<Envelope>) -> Self {
        Self { tx, origin: 0 }
    }

    /// Mark every datum sent through this collector with `origin`.
    pub fn with_origin(mut self, origin: usize) -> Self {
        self.origin = origin;
        self
    }
}

#[async_trait::async_trait]
impl Collector for ChannelCollector {
    async fn record(&self, datum: Datum) {
        let envelope = Envelope {
            origin: self.origin,
            datum,
        };
        if self.tx.send(envelope).await.is_err() {
            tracing::debug!(origin = self.origin, "Output channel closed, dropping datum");
        }
    }
}

/// Decorator that merges a fixed tag set into every datum.
///
/// The fixed tags win over tags already present on the datum.
#[derive(Debug, Clone)]
pub struct TagOverrideCollector<C> {
    inner: C,
    tags: Tags,
}

impl<C: Collector> TagOverrideCollector<C> {
    /// Wrap `inner`, applying `tags` to everything recorded.
    pub fn new(inner: C, tags: Tags) -> Self {
        Self { inner, tags }
    }

    /// Tags applied by this collector.
    pub fn tags(&self) -> &Tags {
        &self.tags
    }
}

#[async_trait::async_trait]
impl<C: Collector> Collector for TagOverrideCollector<C> {
    async fn record(&self, mut datum: Datum) {
        datum
            .tags
            .extend(self.tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.inner.record(datum).await;
    }
}

/// In-memory collector, mostly useful for tests and dry runs.
#[derive(Debug, Default)]
pub struct VecCollector {
    data: Mutex<Vec<Datum>>,
}

impl VecCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn data(&self) -> Vec<Datum> {
        self.data.lock().map(|d| d.clone()).unwrap_or_default()
    }

    /// Consume the collector and return the recorded data.
    pub fn into_inner(self) -> Vec<Datum> {
        self.data.into_inner().unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Collector for VecCollector {
    async fn record(&self, datum: Datum) {
        if let Ok(mut data) = self.data.lock() {
            data.push(datum);
        }
    }
}
