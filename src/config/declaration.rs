//! Conversion of plugin-grouped YAML into ordered declarations.
//!
//! Both sections map a plugin name to a list of entries. Each entry is a
//! mapping; the shared keys (`name`, `from`, `scopes`, `metric_tags`) are
//! lifted out and the entry as a whole becomes the plugin's own config.

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::core::{CredentialDeclaration, SourceDeclaration};
use crate::metric::Tags;
use crate::plugin::PluginConfig;

use super::validation::ConfigError;

#[derive(Debug, Default, Deserialize)]
struct CommonFields {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(default)]
    metric_tags: Tags,
}

/// Walk `section.<plugin>[i]` entries in file order.
fn entries<'a>(
    section: &'static str,
    groups: &'a Mapping,
) -> Result<Vec<(String, String, &'a Value, CommonFields)>, ConfigError> {
    let mut out = Vec::new();
    for (key, group) in groups {
        let plugin = key.as_str().ok_or_else(|| {
            ConfigError::ValidationError(format!("{section}: plugin names must be strings"))
        })?;
        let list = match group {
            Value::Sequence(list) => list.as_slice(),
            Value::Null => &[],
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "{section}.{plugin} must be a list of entries"
                )));
            }
        };
        for (i, entry) in list.iter().enumerate() {
            let path = format!("{section}.{plugin}[{i}]");
            if !entry.is_mapping() {
                return Err(ConfigError::ValidationError(format!(
                    "{path} must be a mapping"
                )));
            }
            let common: CommonFields = serde_yaml::from_value(entry.clone())
                .map_err(|e| ConfigError::ValidationError(format!("{path}: {e}")))?;
            out.push((plugin.to_string(), path, entry, common));
        }
    }
    Ok(out)
}

pub(super) fn credential_declarations(
    groups: &Mapping,
) -> Result<Vec<CredentialDeclaration>, ConfigError> {
    entries("credentials", groups)?
        .into_iter()
        .map(|(plugin, _, entry, common)| {
            Ok(CredentialDeclaration {
                plugin,
                name: common.name,
                from: common.from,
                scopes: common.scopes,
                tags: common.metric_tags,
                config: PluginConfig::new(entry.clone()),
            })
        })
        .collect()
}

pub(super) fn source_declarations(
    groups: &Mapping,
) -> Result<Vec<SourceDeclaration>, ConfigError> {
    entries("sources", groups)?
        .into_iter()
        .map(|(plugin, path, entry, common)| {
            if common.from.is_some() {
                return Err(ConfigError::ValidationError(format!(
                    "{path}: 'from' is only valid for credentials"
                )));
            }
            Ok(SourceDeclaration {
                plugin,
                scopes: common.scopes,
                tags: common.metric_tags,
                config: PluginConfig::new(entry.clone()),
            })
        })
        .collect()
}
