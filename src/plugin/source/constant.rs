use std::collections::BTreeMap;

use serde::Deserialize;

use crate::metric::{Collector, Datum, FieldValue, Fields, Tags};
use crate::plugin::{PluginConfig, PluginError, Session, SourceContext, SourcePlugin};

/// Registry name of the constant source.
pub const CONSTANT_PLUGIN_NAME: &str = "constant";

/// Configuration for the constant source.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConstantConfig {
    /// Measurement name of the emitted datum.
    pub measurement: String,
    #[serde(default)]
    pub tags: Tags,
    /// Field values as plain YAML scalars or sequences.
    #[serde(default)]
    pub fields: BTreeMap<String, serde_yaml::Value>,
}

/// Source emitting one fixed datum per run.
#[derive(Debug, Default)]
pub struct Constant {
    measurement: String,
    tags: Tags,
    fields: Fields,
    raw: ConstantConfig,
}

impl Constant {
    /// Registry factory. Works with any session.
    pub fn factory(_session: &Session) -> Result<Box<dyn SourcePlugin>, PluginError> {
        Ok(Box::<Self>::default())
    }
}

/// Convert a YAML value into a field value.
fn field_value(key: &str, value: &serde_yaml::Value) -> Result<FieldValue, PluginError> {
    use serde_yaml::Value;

    Ok(match value {
        Value::Null => FieldValue::Null,
        Value::Bool(b) => FieldValue::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                FieldValue::Integer(i)
            } else if let Some(u) = n.as_u64() {
                FieldValue::Unsigned(u)
            } else if let Some(f) = n.as_f64() {
                FieldValue::Float(f)
            } else {
                return Err(PluginError::Invalid(format!("field '{key}': unrepresentable number")));
            }
        }
        Value::String(s) => FieldValue::String(s.clone()),
        Value::Sequence(items) => FieldValue::Array(
            items
                .iter()
                .map(|item| field_value(key, item))
                .collect::<Result<_, _>>()?,
        ),
        Value::Tagged(tagged) => field_value(key, &tagged.value)?,
        Value::Mapping(_) => {
            return Err(PluginError::Invalid(format!(
                "field '{key}': nested mappings are not supported"
            )));
        }
    })
}

#[async_trait::async_trait]
impl SourcePlugin for Constant {
    fn description(&self) -> &'static str {
        "emits a fixed measurement"
    }

    fn configure(&mut self, config: &PluginConfig) -> Result<(), PluginError> {
        self.raw = config.parse()?;
        Ok(())
    }

    fn init(&mut self) -> Result<(), PluginError> {
        if self.raw.measurement.is_empty() {
            return Err(PluginError::Invalid("measurement cannot be empty".to_string()));
        }
        self.measurement = self.raw.measurement.clone();
        self.tags = self.raw.tags.clone();
        self.fields = self
            .raw
            .fields
            .iter()
            .map(|(k, v)| Ok((k.clone(), field_value(k, v)?)))
            .collect::<Result<_, PluginError>>()?;
        Ok(())
    }

    async fn source(
        &self,
        ctx: &SourceContext,
        collector: &dyn Collector,
    ) -> Result<(), PluginError> {
        let mut datum = Datum::new(self.measurement.as_str(), ctx.now());
        datum.tags = self.tags.clone();
        datum.fields = self.fields.clone();
        collector.record(datum).await;
        Ok(())
    }
}
