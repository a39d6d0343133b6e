//! Configuration sources: explicitly supplied values and the environment

use super::options::{is_truthy, OptionKey, CI_ENV_VAR};
use crate::error::{Result, TelemetryError};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Name of the table the plugin reads from a shared config file
pub const CONFIG_TABLE: &str = "testbed";

/// A value exactly as the host runner handed it over
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Typed value from a TOML config file
    Toml(toml::Value),
    /// Text from a `key=value` command-line override
    Text(String),
}

/// Values supplied through the host runner's configuration channel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuppliedConfig {
    values: BTreeMap<OptionKey, RawValue>,
}

impl SuppliedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document.
    ///
    /// Options are read from a `[testbed]` table when one exists, otherwise
    /// from the top level. Nested tables map onto dotted keys, so
    /// `[testbed.reporting] csv_export_path = "..."` sets
    /// `reporting.csv_export_path`.
    pub fn from_toml(content: &str) -> Result<Self> {
        let document: toml::Table =
            toml::from_str(content).map_err(|e| TelemetryError::ConfigParse(e.to_string()))?;

        let table = match document.get(CONFIG_TABLE) {
            Some(toml::Value::Table(table)) => table.clone(),
            Some(other) => {
                return Err(TelemetryError::ConfigParse(format!(
                    "'{}' must be a table, found {}",
                    CONFIG_TABLE,
                    other.type_str()
                )))
            }
            None => document,
        };

        let mut config = Self::new();
        config.absorb_table("", &table)?;
        Ok(config)
    }

    /// Load from a TOML file; a missing file yields an empty configuration
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            TelemetryError::ConfigParse(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    fn absorb_table(&mut self, prefix: &str, table: &toml::Table) -> Result<()> {
        for (name, value) in table {
            let key = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}.{}", prefix, name)
            };
            match value {
                toml::Value::Table(nested) => self.absorb_table(&key, nested)?,
                leaf => {
                    let option = lookup_key(&key)?;
                    self.values.insert(option, RawValue::Toml(leaf.clone()));
                }
            }
        }
        Ok(())
    }

    /// Apply a `key=value` override from the command line.
    ///
    /// Overrides replace anything read from a file.
    pub fn apply_override(&mut self, assignment: &str) -> Result<()> {
        let (key, value) = assignment.split_once('=').ok_or_else(|| {
            TelemetryError::ConfigParse(format!("expected key=value, got '{}'", assignment))
        })?;
        let option = lookup_key(key.trim())?;
        self.values
            .insert(option, RawValue::Text(value.trim().to_string()));
        Ok(())
    }

    /// Set a typed value directly
    pub fn set(&mut self, key: OptionKey, value: impl Into<toml::Value>) -> &mut Self {
        self.values.insert(key, RawValue::Toml(value.into()));
        self
    }

    pub fn get(&self, key: OptionKey) -> Option<&RawValue> {
        self.values.get(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn lookup_key(key: &str) -> Result<OptionKey> {
    OptionKey::from_key(key)
        .ok_or_else(|| TelemetryError::ConfigParse(format!("unknown option '{}'", key)))
}

/// Point-in-time copy of the environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Capture the current process environment
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Value of `name`; empty values count as absent
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Whether the CI indicator is set to a truthy value
    pub fn ci_detected(&self) -> bool {
        self.get(CI_ENV_VAR).map(is_truthy).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml_reads_named_table() {
        let config = SuppliedConfig::from_toml(
            r#"
            [testbed]
            auto_debug = true

            [testbed.reporting]
            csv_export_path = "out/report.csv"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.get(OptionKey::AutoDebug),
            Some(&RawValue::Toml(toml::Value::Boolean(true)))
        );
        assert!(config.get(OptionKey::ReportingCsvExportPath).is_some());
    }

    #[test]
    fn test_from_toml_top_level() {
        let config = SuppliedConfig::from_toml("debugger = { port = 6000 }").unwrap();
        assert_eq!(
            config.get(OptionKey::DebuggerPort),
            Some(&RawValue::Toml(toml::Value::Integer(6000)))
        );
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = SuppliedConfig::from_toml("[testbed]\nauto_debugg = true").unwrap_err();
        assert!(matches!(err, TelemetryError::ConfigParse(msg) if msg.contains("auto_debugg")));
    }

    #[test]
    fn test_override_replaces_file_value() {
        let mut config = SuppliedConfig::from_toml("[testbed]\nauto_debug = true").unwrap();
        config.apply_override("auto_debug = false").unwrap();
        assert_eq!(
            config.get(OptionKey::AutoDebug),
            Some(&RawValue::Text("false".to_string()))
        );
    }

    #[test]
    fn test_override_requires_assignment() {
        let mut config = SuppliedConfig::new();
        assert!(config.apply_override("auto_debug").is_err());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let config = SuppliedConfig::load("/nonexistent/testbed.toml").unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn test_env_snapshot_ignores_empty_values() {
        let env = EnvSnapshot::from_pairs([("TESTBED_AUTO_DEBUG", "  ")]);
        assert_eq!(env.get("TESTBED_AUTO_DEBUG"), None);
    }

    #[test]
    fn test_ci_detection() {
        assert!(EnvSnapshot::empty().with_var("CI", "True").ci_detected());
        assert!(!EnvSnapshot::empty().with_var("CI", "false").ci_detected());
        assert!(!EnvSnapshot::empty().ci_detected());
    }
}
