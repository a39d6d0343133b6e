//! Plugin configuration
//!
//! Options are declared in [`options`], gathered from the host runner and the
//! environment by [`sources`], and resolved by [`resolver`]. The rest of the
//! crate only ever sees the immutable [`PluginConfig`] snapshot.

pub mod options;
pub mod resolver;
pub mod sources;

pub use options::{OptionKey, OptionKind, OptionValue};
pub use resolver::{ConfigResolver, ResolvedOption, ValueSource};
pub use sources::{EnvSnapshot, RawValue, SuppliedConfig};

use crate::error::{Result, TelemetryError};
use serde::Serialize;
use std::path::PathBuf;

/// Resolved configuration, fixed for the lifetime of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginConfig {
    pub debugger: DebuggerConfig,
    pub requirements: RequirementPolicy,
    /// `None` when no export path is configured
    pub reporting: Option<ReportingConfig>,
}

/// Remote debugger settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebuggerConfig {
    pub auto_debug: bool,
    pub wait_for_connect: bool,
    pub host: String,
    pub port: u16,
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self {
            auto_debug: false,
            wait_for_connect: false,
            host: "0.0.0.0".to_string(),
            port: 5679,
        }
    }
}

impl DebuggerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Requirement tagging policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RequirementPolicy {
    /// Every collected test must carry at least one requirement
    pub mandated: bool,
    /// Tags must match REQ-###-### (or NA) and be sorted
    pub strict_format: bool,
}

/// Report export settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportingConfig {
    pub csv_export_path: PathBuf,
    pub omit_unexecuted_tests: bool,
}

impl PluginConfig {
    /// Resolve every option once
    pub fn resolve(resolver: &ConfigResolver) -> Result<Self> {
        let flag = |key: OptionKey| -> Result<bool> {
            let resolved = resolver.resolve(key)?;
            Ok(resolved.value.as_bool().unwrap_or(false))
        };

        let host = resolver
            .resolve(OptionKey::DebuggerHost)?
            .value
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| DebuggerConfig::default().host);

        let port_value = resolver.resolve(OptionKey::DebuggerPort)?.value;
        let port = match port_value.as_integer() {
            Some(raw) => u16::try_from(raw).map_err(|_| TelemetryError::ConfigType {
                key: OptionKey::DebuggerPort.to_string(),
                expected: "port (0-65535)".to_string(),
                value: raw.to_string(),
            })?,
            None => DebuggerConfig::default().port,
        };

        let reporting = match resolver.resolve(OptionKey::ReportingCsvExportPath)?.value {
            OptionValue::String(path) if !path.trim().is_empty() => Some(ReportingConfig {
                csv_export_path: PathBuf::from(path),
                omit_unexecuted_tests: flag(OptionKey::ReportingOmitUnexecutedTests)?,
            }),
            _ => None,
        };

        Ok(Self {
            debugger: DebuggerConfig {
                auto_debug: flag(OptionKey::AutoDebug)?,
                wait_for_connect: flag(OptionKey::AutoDebugWaitForConnect)?,
                host,
                port,
            },
            requirements: RequirementPolicy {
                mandated: flag(OptionKey::MandateRequirementMarkers)?,
                strict_format: flag(OptionKey::RequirementsStrictFormat)?,
            },
            reporting,
        })
    }

    /// Resolve from supplied values and an environment snapshot
    pub fn from_sources(supplied: SuppliedConfig, env: EnvSnapshot) -> Result<Self> {
        Self::resolve(&ConfigResolver::new(supplied, env))
    }
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            debugger: DebuggerConfig::default(),
            requirements: RequirementPolicy::default(),
            reporting: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sources_match_default_snapshot() {
        let config = PluginConfig::from_sources(SuppliedConfig::new(), EnvSnapshot::empty()).unwrap();
        assert_eq!(config, PluginConfig::default());
        assert!(config.reporting.is_none());
    }

    #[test]
    fn test_snapshot_from_file_and_env() {
        let supplied = SuppliedConfig::from_toml(
            r#"
            [testbed]
            mandate_requirement_markers = true

            [testbed.reporting]
            csv_export_path = "artifacts/tests.csv"
            "#,
        )
        .unwrap();
        let env = EnvSnapshot::empty()
            .with_var("TESTBED_OMIT_UNEXECUTED_TESTS", "1")
            .with_var("TESTBED_DEBUG_PORT", "6001");

        let config = PluginConfig::from_sources(supplied, env).unwrap();
        assert!(config.requirements.mandated);
        assert!(!config.requirements.strict_format);
        assert_eq!(config.debugger.port, 6001);

        let reporting = config.reporting.unwrap();
        assert_eq!(reporting.csv_export_path, PathBuf::from("artifacts/tests.csv"));
        assert!(reporting.omit_unexecuted_tests);
    }

    #[test]
    fn test_port_out_of_range() {
        let mut supplied = SuppliedConfig::new();
        supplied.set(OptionKey::DebuggerPort, 70000_i64);
        let err = PluginConfig::from_sources(supplied, EnvSnapshot::empty()).unwrap_err();
        assert!(matches!(err, TelemetryError::ConfigType { .. }));
    }

    #[test]
    fn test_debugger_address() {
        assert_eq!(DebuggerConfig::default().address(), "0.0.0.0:5679");
    }
}
