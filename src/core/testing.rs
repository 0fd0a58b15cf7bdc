//! Fake plugins for exercising the core.

use std::sync::{Arc, Mutex};

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::metric::{Collector, Datum, FieldValue};
use crate::plugin::{
    CredentialPlugin, PluginConfig, PluginError, Session, SourceContext, SourcePlugin,
    TokenSession,
};
use crate::registry::PluginRegistry;

/// Parent session seen by each fake credential instantiation, in order.
pub(crate) type ParentLog = Arc<Mutex<Vec<Option<Session>>>>;

pub(crate) fn fake_config(yaml: &str) -> PluginConfig {
    PluginConfig::new(serde_yaml::from_str(yaml).unwrap())
}

/// Registry with `fake` credentials, `fake` and `anonymous_only` sources.
pub(crate) fn fake_registry() -> (PluginRegistry, ParentLog) {
    let parents = ParentLog::default();
    let log = Arc::clone(&parents);
    let registry = PluginRegistry::new()
        .with_credentials("fake", move |parent: Option<&Session>| {
            log.lock().unwrap().push(parent.cloned());
            Box::new(FakeCredentials::default()) as Box<dyn CredentialPlugin>
        })
        .with_source("fake", |_: &Session| {
            Ok(Box::new(FakeSource::default()) as Box<dyn SourcePlugin>)
        })
        .with_source("anonymous_only", |session: &Session| match session {
            Session::Anonymous => Ok(Box::new(FakeSource::default()) as Box<dyn SourcePlugin>),
            other => Err(PluginError::SessionMismatch {
                expected: "anonymous",
                found: other.kind(),
            }),
        });
    (registry, parents)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FakeCredentialConfig {
    fail: Option<String>,
}

/// Yields a fresh token handle per instance.
#[derive(Debug, Default)]
struct FakeCredentials {
    config: FakeCredentialConfig,
}

impl FakeCredentials {
    fn check(&self, stage: &str) -> Result<(), PluginError> {
        match self.config.fail.as_deref() {
            Some(s) if s == stage => Err(PluginError::Source(format!("{stage} failed"))),
            _ => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl CredentialPlugin for FakeCredentials {
    fn description(&self) -> &'static str {
        "fake credentials"
    }

    fn configure(&mut self, config: &PluginConfig) -> Result<(), PluginError> {
        self.config = config.parse()?;
        self.check("configure")
    }

    fn init(&mut self) -> Result<(), PluginError> {
        self.check("init")
    }

    async fn credentials(&self, _cancel: &CancellationToken) -> Result<Session, PluginError> {
        self.check("credentials")?;
        Ok(Session::Token(Arc::new(TokenSession::new("fake", None))))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FakeSourceConfig {
    /// Number of valid data points to record.
    emit: usize,
    /// Record one datum with a null field after the valid ones.
    null_field: bool,
    /// Return an error after recording.
    fail: bool,
    /// Panic after recording.
    panic: bool,
    /// Block until the run is cancelled.
    wait_cancel: bool,
    init_error: bool,
}

#[derive(Debug, Default)]
struct FakeSource {
    config: FakeSourceConfig,
}

#[async_trait::async_trait]
impl SourcePlugin for FakeSource {
    fn description(&self) -> &'static str {
        "fake source"
    }

    fn configure(&mut self, config: &PluginConfig) -> Result<(), PluginError> {
        self.config = config.parse()?;
        Ok(())
    }

    fn init(&mut self) -> Result<(), PluginError> {
        if self.config.init_error {
            return Err(PluginError::Invalid("init_error set".to_string()));
        }
        Ok(())
    }

    async fn source(
        &self,
        ctx: &SourceContext,
        collector: &dyn Collector,
    ) -> Result<(), PluginError> {
        for i in 0..self.config.emit {
            let datum = Datum::new("fake", ctx.now())
                .with_tag("origin", "plugin")
                .with_field("value", i as i64);
            collector.record(datum).await;
        }
        if self.config.null_field {
            let datum = Datum::new("fake", ctx.now()).with_field("value", FieldValue::Null);
            collector.record(datum).await;
        }
        if self.config.panic {
            panic!("fake source panicked");
        }
        if self.config.wait_cancel {
            ctx.cancellation().cancelled().await;
            return Err(PluginError::Cancelled);
        }
        if self.config.fail {
            return Err(PluginError::Source("fake failure".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::SessionKind;

    #[test]
    fn test_fake_registry_session_kinds() {
        let (registry, _) = fake_registry();
        let factory = registry.source("anonymous_only").unwrap();
        assert!(factory(&Session::Anonymous).is_ok());
        let token = Session::Token(Arc::new(TokenSession::new("t", None)));
        assert!(matches!(
            factory(&token).err(),
            Some(PluginError::SessionMismatch {
                found: SessionKind::Token,
                ..
            })
        ));
    }
}
