//! HTTP endpoint probe source.
//!
//! Measures HTTP/HTTPS endpoint latency and validates the response status.
//! When backed by a token session the request carries a bearer token.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::metric::{Collector, Datum};
use crate::plugin::{PluginConfig, PluginError, Session, SourceContext, SourcePlugin};

/// Registry name of the HTTP probe source.
pub const HTTP_PROBE_PLUGIN_NAME: &str = "http_probe";

const HTTP_PROBE_MEASUREMENT: &str = "http_probe";

/// Default request timeout (10 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default expected HTTP status code.
const DEFAULT_EXPECTED_STATUS: u16 = 200;

fn default_expected_status() -> u16 {
    DEFAULT_EXPECTED_STATUS
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

/// HTTP method for requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Head,
    Put,
    Delete,
    Options,
    Patch,
}

impl HttpMethod {
    /// Method name as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Head => "HEAD",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
            Self::Patch => "PATCH",
        }
    }

    fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Head => reqwest::Method::HEAD,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
            Self::Options => reqwest::Method::OPTIONS,
            Self::Patch => reqwest::Method::PATCH,
        }
    }
}

/// Configuration for the HTTP probe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpProbeConfig {
    /// Target URL (HTTP or HTTPS).
    pub url: String,
    /// HTTP method to use (default: GET).
    #[serde(default)]
    pub method: HttpMethod,
    /// Expected HTTP status code (default: 200).
    #[serde(default = "default_expected_status")]
    pub expected_status: u16,
    /// Request timeout (default: 10s).
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl HttpProbeConfig {
    /// Create a configuration probing `url` with GET.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::default(),
            expected_status: DEFAULT_EXPECTED_STATUS,
            timeout: DEFAULT_TIMEOUT,
            headers: BTreeMap::new(),
        }
    }

    /// Set the HTTP method.
    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Set the expected HTTP status code.
    pub fn with_expected_status(mut self, status: u16) -> Self {
        self.expected_status = status;
        self
    }

    /// Add a single request header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// HTTP endpoint probe source.
pub struct HttpProbe {
    config: HttpProbeConfig,
    url: Option<Url>,
    headers: HeaderMap,
    bearer: Option<String>,
    account: Option<String>,
    client: Option<Client>,
}

impl HttpProbe {
    /// Create an unconfigured probe bound to `session`.
    pub fn new(session: &Session) -> Self {
        let (bearer, account) = match session {
            Session::Anonymous => (None, None),
            Session::Token(t) => (Some(t.token.clone()), t.account.clone()),
        };
        Self {
            config: HttpProbeConfig::default(),
            url: None,
            headers: HeaderMap::new(),
            bearer,
            account,
            client: None,
        }
    }

    /// Registry factory. Accepts anonymous and token sessions.
    pub fn factory(session: &Session) -> Result<Box<dyn SourcePlugin>, PluginError> {
        Ok(Box::new(Self::new(session)))
    }

    fn ready(&self) -> Result<(&Client, &Url), PluginError> {
        match (&self.client, &self.url) {
            (Some(client), Some(url)) => Ok((client, url)),
            _ => Err(PluginError::Invalid("http_probe used before init".to_string())),
        }
    }
}

impl std::fmt::Debug for HttpProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProbe")
            .field("config", &self.config)
            .field("authenticated", &self.bearer.is_some())
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl SourcePlugin for HttpProbe {
    fn description(&self) -> &'static str {
        "probes an http endpoint"
    }

    fn configure(&mut self, config: &PluginConfig) -> Result<(), PluginError> {
        self.config = config.parse()?;
        Ok(())
    }

    fn init(&mut self) -> Result<(), PluginError> {
        let url = Url::parse(&self.config.url)
            .map_err(|e| PluginError::Invalid(format!("invalid url '{}': {e}", self.config.url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PluginError::Invalid(format!(
                "unsupported url scheme '{}'",
                url.scheme()
            )));
        }

        let mut headers = HeaderMap::with_capacity(self.config.headers.len());
        for (key, value) in &self.config.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| PluginError::Invalid(format!("invalid header name '{key}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| PluginError::Invalid(format!("invalid value for header '{key}': {e}")))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(self.config.timeout)
            .build()
            .map_err(|e| PluginError::Invalid(format!("failed to build HTTP client: {e}")))?;

        self.url = Some(url);
        self.headers = headers;
        self.client = Some(client);
        Ok(())
    }

    async fn source(
        &self,
        ctx: &SourceContext,
        collector: &dyn Collector,
    ) -> Result<(), PluginError> {
        let (client, url) = self.ready()?;

        let mut request = client
            .request(self.config.method.to_reqwest(), url.clone())
            .headers(self.headers.clone());
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }

        let start = Instant::now();
        let result = tokio::select! {
            biased;
            _ = ctx.cancellation().cancelled() => return Err(PluginError::Cancelled),
            result = request.send() => result,
        };
        let elapsed = start.elapsed();

        let mut datum = Datum::new(HTTP_PROBE_MEASUREMENT, ctx.now())
            .with_tag("url", self.config.url.as_str())
            .with_tag("method", self.config.method.as_str());
        if let Some(account) = &self.account {
            datum = datum.with_tag("account", account.as_str());
        }

        let datum = match result {
            Ok(response) => {
                let status = response.status().as_u16();
                let success = status == self.config.expected_status;
                tracing::debug!(
                    url = %self.config.url,
                    status,
                    latency_ms = elapsed.as_secs_f64() * 1000.0,
                    "HTTP probe completed"
                );
                datum
                    .with_field("success", success)
                    .with_field("status_code", u64::from(status))
                    .with_field("latency", elapsed)
            }
            Err(e) => {
                tracing::warn!(url = %self.config.url, error = %e, "HTTP probe failed");
                datum.with_field("success", false)
            }
        };

        collector.record(datum).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RunCaches;
    use crate::metric::{FieldValue, VecCollector};
    use crate::plugin::TokenSession;
    use std::io::ErrorKind;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio_util::sync::CancellationToken;

    fn context() -> SourceContext {
        SourceContext::new(CancellationToken::new(), chrono::Utc::now(), RunCaches::new(16))
    }

    fn configured(session: &Session, config: HttpProbeConfig) -> HttpProbe {
        let mut probe = HttpProbe::new(session);
        let value = serde_yaml::to_value(&config).unwrap();
        probe.configure(&PluginConfig::new(value)).unwrap();
        probe.init().unwrap();
        probe
    }

    /// Serve a single canned response and hand back the raw request head.
    async fn serve_once(status_line: &'static str) -> Option<(String, oneshot::Receiver<String>)> {
        let listener = match TcpListener::bind("127.0.0.1:0").await {
            Ok(l) => l,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => return None,
            Err(e) => panic!("Failed to bind test listener: {e}"),
        };
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            let response =
                format!("HTTP/1.1 {status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            stream.write_all(response.as_bytes()).await.unwrap();
            let _ = tx.send(String::from_utf8_lossy(&head).to_string());
        });

        Some((format!("http://{addr}/health"), rx))
    }

    #[test]
    fn test_http_config_defaults() {
        let value: serde_yaml::Value = serde_yaml::from_str("url: https://example.com").unwrap();
        let config: HttpProbeConfig = PluginConfig::new(value).parse().unwrap();

        assert_eq!(config.method, HttpMethod::Get);
        assert_eq!(config.expected_status, DEFAULT_EXPECTED_STATUS);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(config.headers.is_empty());
    }

    #[test]
    fn test_http_config_method_uppercase() {
        let value: serde_yaml::Value =
            serde_yaml::from_str("url: https://example.com\nmethod: HEAD\ntimeout: 2s").unwrap();
        let config: HttpProbeConfig = PluginConfig::new(value).parse().unwrap();

        assert_eq!(config.method, HttpMethod::Head);
        assert_eq!(config.timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_http_init_rejects_bad_urls() {
        for url in ["not a url", "ftp://example.com/file"] {
            let mut probe = HttpProbe::new(&Session::Anonymous);
            let value = serde_yaml::to_value(HttpProbeConfig::new(url)).unwrap();
            probe.configure(&PluginConfig::new(value)).unwrap();
            assert!(matches!(probe.init(), Err(PluginError::Invalid(_))), "{url}");
        }
    }

    #[test]
    fn test_http_init_rejects_bad_headers() {
        for (key, value) in [("bad header", "v"), ("x-ok", "line\nbreak")] {
            let mut probe = HttpProbe::new(&Session::Anonymous);
            let config = HttpProbeConfig::new("https://example.com").with_header(key, value);
            let value = serde_yaml::to_value(config).unwrap();
            probe.configure(&PluginConfig::new(value)).unwrap();

            let err = probe.init().unwrap_err();
            assert!(matches!(err, PluginError::Invalid(ref msg) if msg.contains(key)), "{err}");
        }
    }

    #[tokio::test]
    async fn test_http_source_before_init() {
        let probe = HttpProbe::new(&Session::Anonymous);
        let result = probe.source(&context(), &VecCollector::new()).await;
        assert!(matches!(result, Err(PluginError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_http_probe_anonymous_success() {
        let Some((url, request)) = serve_once("200 OK").await else {
            return;
        };
        let probe = configured(
            &Session::Anonymous,
            HttpProbeConfig::new(url.clone()).with_header("x-probe", "1"),
        );
        let collector = VecCollector::new();
        probe.source(&context(), &collector).await.unwrap();

        let head = request.await.unwrap().to_lowercase();
        assert!(head.starts_with("get /health"));
        assert!(head.contains("x-probe: 1"));
        assert!(!head.contains("authorization"));

        let data = collector.into_inner();
        assert_eq!(data.len(), 1);
        let datum = &data[0];
        assert_eq!(datum.name, "http_probe");
        assert_eq!(datum.tags.get("url"), Some(&url));
        assert_eq!(datum.tags.get("method").map(String::as_str), Some("GET"));
        assert!(!datum.tags.contains_key("account"));
        assert_eq!(datum.fields.get("success"), Some(&FieldValue::Boolean(true)));
        assert_eq!(datum.fields.get("status_code"), Some(&FieldValue::Unsigned(200)));
        assert!(datum.fields.contains_key("latency"));
    }

    #[tokio::test]
    async fn test_http_probe_token_session_sends_bearer() {
        let Some((url, request)) = serve_once("503 Service Unavailable").await else {
            return;
        };
        let session = Session::Token(Arc::new(TokenSession::new(
            "sekret",
            Some("acme".to_string()),
        )));
        let probe = configured(
            &session,
            HttpProbeConfig::new(url).with_header("X-Survey-Run", "nightly"),
        );
        let collector = VecCollector::new();
        probe.source(&context(), &collector).await.unwrap();

        let head = request.await.unwrap().to_lowercase();
        assert!(head.contains("authorization: bearer sekret"));
        assert!(head.contains("x-survey-run: nightly"));

        let data = collector.into_inner();
        let datum = &data[0];
        assert_eq!(datum.tags.get("account").map(String::as_str), Some("acme"));
        assert_eq!(datum.fields.get("success"), Some(&FieldValue::Boolean(false)));
        assert_eq!(datum.fields.get("status_code"), Some(&FieldValue::Unsigned(503)));
    }

    #[tokio::test]
    async fn test_http_probe_cancelled() {
        let probe = configured(
            &Session::Anonymous,
            HttpProbeConfig::new("http://127.0.0.1:9/never"),
        );
        let ctx = context();
        ctx.cancellation().cancel();

        let result = probe.source(&ctx, &VecCollector::new()).await;
        assert!(matches!(result, Err(PluginError::Cancelled)));
    }
}
