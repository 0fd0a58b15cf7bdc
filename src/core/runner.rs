//! Concurrent source runner.
//!
//! Every source instance runs in its own tokio task and records into a shared
//! bounded channel. The calling task drains the channel, encodes each datum as
//! line protocol and writes it to the sink. A failing or panicking source only
//! affects its own outcome.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use super::declaration::Declarations;
use super::error::{ResolveError, RunError};
use super::instance::{SessionInstance, SourceInstance};
use super::resolver::resolve_sessions;
use super::wiring::wire_sources;
use crate::cache::{DEFAULT_CACHE_CAPACITY, RunCaches};
use crate::metric::{ChannelCollector, Envelope, LineEncoder, TagOverrideCollector};
use crate::plugin::{PluginError, SourceContext};
use crate::registry::PluginRegistry;

/// Default depth of the output queue.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Per-run settings.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Cancelled on shutdown; sources are expected to stop early.
    pub cancel: CancellationToken,
    /// Depth of the output queue. Producers wait when it is full.
    pub channel_capacity: usize,
    /// Entries per run cache.
    pub cache_capacity: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            cancel: CancellationToken::new(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Why a source did not finish cleanly.
#[derive(Debug, Error)]
pub enum SourceFailure {
    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error("panicked: {0}")]
    Panicked(String),
}

/// Result of one source instance.
#[derive(Debug)]
pub struct SourceOutcome {
    pub name: String,
    /// Lines written to the sink.
    pub written: u64,
    /// Data dropped because they could not be encoded.
    pub rejected: u64,
    pub error: Option<SourceFailure>,
}

impl SourceOutcome {
    fn new(name: String) -> Self {
        Self {
            name,
            written: 0,
            rejected: 0,
            error: None,
        }
    }

    /// Finished without error and without rejected data.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.rejected == 0
    }
}

/// Outcome of every source of a run, in instance order.
#[derive(Debug, Default)]
pub struct RunReport {
    outcomes: Vec<SourceOutcome>,
}

impl RunReport {
    pub fn outcomes(&self) -> &[SourceOutcome] {
        &self.outcomes
    }

    /// True when every source succeeded.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(SourceOutcome::is_success)
    }

    /// Sources that failed or had data rejected.
    pub fn failures(&self) -> impl Iterator<Item = &SourceOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Total lines written.
    pub fn written(&self) -> u64 {
        self.outcomes.iter().map(|o| o.written).sum()
    }
}

/// Wired sessions and sources, ready to run once.
#[derive(Debug)]
pub struct Runner {
    sessions: Vec<Arc<SessionInstance>>,
    sources: Vec<SourceInstance>,
}

impl Runner {
    pub fn new(sessions: Vec<Arc<SessionInstance>>, sources: Vec<SourceInstance>) -> Self {
        Self { sessions, sources }
    }

    /// Resolve sessions and wire sources from declarations.
    pub async fn build(
        registry: &PluginRegistry,
        declarations: &Declarations,
        cancel: &CancellationToken,
    ) -> Result<Self, ResolveError> {
        let sessions = resolve_sessions(registry, &declarations.credentials, cancel).await?;
        let sources = wire_sources(registry, &sessions, &declarations.sources)?;
        tracing::info!(
            sessions = sessions.len(),
            sources = sources.len(),
            "Runner built"
        );
        Ok(Self::new(sessions, sources))
    }

    pub fn sessions(&self) -> &[Arc<SessionInstance>] {
        &self.sessions
    }

    pub fn sources(&self) -> &[SourceInstance] {
        &self.sources
    }

    /// Run every source to completion, writing their metrics to `sink`.
    ///
    /// Returns once all source tasks have been joined. The sink is flushed
    /// but not shut down.
    ///
    /// # Errors
    /// Returns [`RunError::Output`] if writing to the sink fails. The run is
    /// cancelled first and every task is still joined.
    pub async fn run<W>(self, options: RunOptions, sink: &mut W) -> Result<RunReport, RunError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let RunOptions {
            cancel,
            channel_capacity,
            cache_capacity,
        } = options;
        let ctx = SourceContext::new(cancel.clone(), Utc::now(), RunCaches::new(cache_capacity));
        let (tx, mut rx) = mpsc::channel::<Envelope>(channel_capacity.max(1));

        let mut outcomes = Vec::with_capacity(self.sources.len());
        let mut tasks = Vec::with_capacity(self.sources.len());
        for (index, instance) in self.sources.into_iter().enumerate() {
            let SourceInstance { name, tags, plugin } = instance;
            let collector =
                TagOverrideCollector::new(ChannelCollector::new(tx.clone()).with_origin(index), tags);
            let ctx = ctx.clone();
            let task_name = name.clone();
            tasks.push(tokio::spawn(async move {
                tracing::debug!(source = %task_name, "Source started");
                plugin.source(&ctx, &collector).await
            }));
            outcomes.push(SourceOutcome::new(name));
        }
        drop(tx);
        tracing::info!(sources = outcomes.len(), "Run started");

        let mut encoder = LineEncoder::new();
        let mut output_error = None;
        while let Some(Envelope { origin, datum }) = rx.recv().await {
            let Some(outcome) = outcomes.get_mut(origin) else {
                continue;
            };
            let line = match encoder.encode(&datum) {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(
                        source = %outcome.name,
                        measurement = %datum.name,
                        error = %e,
                        "Dropping datum that cannot be encoded"
                    );
                    outcome.rejected += 1;
                    continue;
                }
            };
            if let Err(e) = write_line(sink, line).await {
                tracing::error!(error = %e, "Output write failed, cancelling run");
                cancel.cancel();
                output_error = Some(e);
                break;
            }
            outcome.written += 1;
        }
        // Producers blocked on a full queue see the closed channel and move on.
        drop(rx);

        for (outcome, task) in outcomes.iter_mut().zip(tasks) {
            match task.await {
                Ok(Ok(())) => {
                    tracing::debug!(source = %outcome.name, written = outcome.written, "Source finished");
                }
                Ok(Err(e)) => {
                    tracing::error!(source = %outcome.name, error = %e, "Source failed");
                    outcome.error = Some(SourceFailure::Plugin(e));
                }
                Err(e) => {
                    let message = panic_message(e);
                    tracing::error!(source = %outcome.name, panic = %message, "Source panicked");
                    outcome.error = Some(SourceFailure::Panicked(message));
                }
            }
        }

        if let Some(e) = output_error {
            return Err(RunError::Output(e));
        }
        sink.flush().await.map_err(RunError::Output)?;

        let report = RunReport { outcomes };
        tracing::info!(
            written = report.written(),
            failed = report.failures().count(),
            "Run completed"
        );
        Ok(report)
    }
}

async fn write_line<W>(sink: &mut W, line: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    sink.write_all(line.as_bytes()).await?;
    sink.write_all(b"\n").await
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
