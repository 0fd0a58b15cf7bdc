//! TCP port probe source.
//!
//! Measures TCP connection latency to each configured target. Targets are fed
//! through a bounded queue to a small pool of workers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::time::timeout;

use crate::metric::{Collector, Datum};
use crate::plugin::{PluginConfig, PluginError, Session, SourceContext, SourcePlugin};

/// Registry name of the TCP probe source.
pub const TCP_PROBE_PLUGIN_NAME: &str = "tcp_probe";

/// Measurement name of emitted data.
const TCP_PROBE_MEASUREMENT: &str = "tcp_probe";

/// Default connection timeout (3 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Default number of concurrent workers.
const DEFAULT_CONCURRENCY: usize = 4;

/// Depth of the queue between the target enumerator and the workers.
const TARGET_QUEUE_DEPTH: usize = 10;

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

/// Configuration for the TCP probe.
#[derive(Debug, Clone, Deserialize)]
pub struct TcpProbeConfig {
    /// Targets as `host:port`.
    pub targets: Vec<String>,
    /// Probe timeout (default: 3s).
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    /// Concurrent workers (default: 4).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl TcpProbeConfig {
    /// Create a configuration probing `targets`.
    pub fn new(targets: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            timeout: DEFAULT_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Set the probe timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), PluginError> {
        if self.targets.is_empty() {
            return Err(PluginError::Invalid("targets cannot be empty".to_string()));
        }
        if self.concurrency == 0 {
            return Err(PluginError::Invalid(
                "concurrency must be at least 1".to_string(),
            ));
        }
        for target in &self.targets {
            let valid = target
                .rsplit_once(':')
                .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
            if !valid {
                return Err(PluginError::Invalid(format!(
                    "target '{target}' is not of the form host:port"
                )));
            }
        }
        Ok(())
    }
}

/// TCP port probe source.
///
/// Unreachable targets are valid observations: they are recorded with
/// `success=f` and do not fail the source.
#[derive(Debug)]
pub struct TcpProbe {
    config: TcpProbeConfig,
}

impl TcpProbe {
    /// Create a probe with the given configuration.
    pub fn new(config: TcpProbeConfig) -> Self {
        Self { config }
    }

    /// Registry factory. Works with any session.
    pub fn factory(_session: &Session) -> Result<Box<dyn SourcePlugin>, PluginError> {
        Ok(Box::new(Self::new(TcpProbeConfig::new(Vec::<String>::new()))))
    }

    async fn worker(
        &self,
        ctx: &SourceContext,
        queue: &Mutex<mpsc::Receiver<String>>,
        collector: &dyn Collector,
    ) -> Result<(), PluginError> {
        loop {
            let next = tokio::select! {
                biased;
                _ = ctx.cancellation().cancelled() => return Err(PluginError::Cancelled),
                next = async { queue.lock().await.recv().await } => next,
            };
            let Some(target) = next else {
                return Ok(());
            };
            let datum = self.probe(ctx, &target).await;
            collector.record(datum).await;
        }
    }

    async fn probe(&self, ctx: &SourceContext, target: &str) -> Datum {
        let start = Instant::now();
        let result = timeout(self.config.timeout, async {
            let addrs = resolve(ctx, target).await?;
            TcpStream::connect(&addrs[..]).await
        })
        .await;
        let elapsed = start.elapsed();

        let datum = Datum::new(TCP_PROBE_MEASUREMENT, ctx.now()).with_tag("target", target);
        match result {
            Ok(Ok(_stream)) => {
                tracing::debug!(target = %target, latency_ms = elapsed.as_secs_f64() * 1000.0, "TCP probe successful");
                datum.with_field("success", true).with_field("latency", elapsed)
            }
            Ok(Err(e)) => {
                tracing::warn!(target = %target, error = %e, "TCP probe failed");
                datum.with_field("success", false)
            }
            Err(_) => {
                tracing::warn!(target = %target, timeout_ms = self.config.timeout.as_millis(), "TCP probe timed out");
                datum.with_field("success", false)
            }
        }
    }
}

/// Resolve `target`, going through the run's address cache.
async fn resolve(ctx: &SourceContext, target: &str) -> std::io::Result<Arc<[SocketAddr]>> {
    let cache = &ctx.caches().addresses;
    if let Some(addrs) = cache.get(&target.to_string()) {
        return Ok(addrs);
    }

    let addrs: Vec<SocketAddr> = tokio::net::lookup_host(target).await?.collect();
    if addrs.is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no addresses for {target}"),
        ));
    }
    Ok(cache.insert_if_absent(target.to_string(), addrs.into()))
}

#[async_trait::async_trait]
impl SourcePlugin for TcpProbe {
    fn description(&self) -> &'static str {
        "measures tcp connect latency"
    }

    fn configure(&mut self, config: &PluginConfig) -> Result<(), PluginError> {
        self.config = config.parse()?;
        Ok(())
    }

    fn init(&mut self) -> Result<(), PluginError> {
        self.config.validate()
    }

    async fn source(
        &self,
        ctx: &SourceContext,
        collector: &dyn Collector,
    ) -> Result<(), PluginError> {
        let (tx, rx) = mpsc::channel(TARGET_QUEUE_DEPTH);
        let queue = Mutex::new(rx);

        let enumerate = async move {
            for target in &self.config.targets {
                tokio::select! {
                    biased;
                    _ = ctx.cancellation().cancelled() => return Err(PluginError::Cancelled),
                    sent = tx.send(target.clone()) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
            Ok(())
        };

        let workers = self.config.concurrency.min(self.config.targets.len()).max(1);
        let pool =
            futures::future::try_join_all((0..workers).map(|_| self.worker(ctx, &queue, collector)));

        tokio::try_join!(enumerate, pool)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RunCaches;
    use crate::metric::{FieldValue, VecCollector};
    use std::io::ErrorKind;
    use tokio::net::TcpListener;
    use tokio_util::sync::CancellationToken;

    fn context() -> SourceContext {
        SourceContext::new(CancellationToken::new(), chrono::Utc::now(), RunCaches::new(16))
    }

    #[test]
    fn test_tcp_config_defaults() {
        let value: serde_yaml::Value = serde_yaml::from_str("targets: ['127.0.0.1:80']").unwrap();
        let config: TcpProbeConfig = PluginConfig::new(value).parse().unwrap();

        assert_eq!(config.targets, vec!["127.0.0.1:80".to_string()]);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
    }

    #[test]
    fn test_tcp_config_humantime_timeout() {
        let value: serde_yaml::Value =
            serde_yaml::from_str("targets: ['db:5432']\ntimeout: 250ms\nconcurrency: 2").unwrap();
        let config: TcpProbeConfig = PluginConfig::new(value).parse().unwrap();

        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.concurrency, 2);
    }

    #[test]
    fn test_tcp_config_validation() {
        assert!(TcpProbeConfig::new(Vec::<String>::new()).validate().is_err());
        assert!(TcpProbeConfig::new(["no-port"]).validate().is_err());
        assert!(TcpProbeConfig::new([":80"]).validate().is_err());
        assert!(TcpProbeConfig::new(["host:99999"]).validate().is_err());
        assert!(TcpProbeConfig::new(["host:80", "[::1]:443"]).validate().is_ok());
    }

    #[tokio::test]
    async fn test_tcp_probe_success_and_refused() {
        let listener = match TcpListener::bind("127.0.0.1:0").await {
            Ok(l) => l,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                // Some sandboxed environments disallow binding; skip the test.
                return;
            }
            Err(e) => panic!("Failed to bind test listener: {e}"),
        };
        let open = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            loop {
                let _ = listener.accept().await;
            }
        });

        // Bind and immediately drop to get a port that is very likely closed.
        let closed = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().to_string()
        };

        let probe = TcpProbe::new(
            TcpProbeConfig::new([open.clone(), closed.clone()])
                .with_timeout(Duration::from_secs(1)),
        );
        let ctx = context();
        let collector = VecCollector::new();
        probe.source(&ctx, &collector).await.unwrap();

        let data = collector.into_inner();
        assert_eq!(data.len(), 2);

        let by_target = |t: &str| data.iter().find(|d| d.tags["target"] == t).unwrap();
        let ok = by_target(open.as_str());
        assert_eq!(ok.fields.get("success"), Some(&FieldValue::Boolean(true)));
        assert!(ok.fields.contains_key("latency"));
        assert_eq!(ok.time, ctx.now());

        let refused = by_target(closed.as_str());
        assert_eq!(refused.fields.get("success"), Some(&FieldValue::Boolean(false)));
        assert!(!refused.fields.contains_key("latency"));

        // Both targets resolved once and were cached for the run.
        assert_eq!(ctx.caches().addresses.len(), 2);
    }

    #[tokio::test]
    async fn test_tcp_probe_cancelled() {
        let probe = TcpProbe::new(TcpProbeConfig::new(["127.0.0.1:9"]));
        let ctx = context();
        ctx.cancellation().cancel();

        let result = probe.source(&ctx, &VecCollector::new()).await;
        assert!(matches!(result, Err(PluginError::Cancelled)));
    }
}
