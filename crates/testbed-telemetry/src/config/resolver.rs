//! Option resolution
//!
//! Precedence, highest first: explicitly supplied value, environment
//! override (unless suppressed), declared default.

use super::options::{is_falsy, is_truthy, OptionKey, OptionKind, OptionValue};
use super::sources::{EnvSnapshot, RawValue, SuppliedConfig};
use crate::error::{Result, TelemetryError};
use serde::Serialize;

/// Where an effective value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    Supplied,
    Environment,
    Default,
}

/// Effective value of one option
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedOption {
    pub key: OptionKey,
    pub value: OptionValue,
    pub kind: OptionKind,
    pub source: ValueSource,
}

/// Resolves options against a fixed set of sources
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    supplied: SuppliedConfig,
    env: EnvSnapshot,
}

impl ConfigResolver {
    pub fn new(supplied: SuppliedConfig, env: EnvSnapshot) -> Self {
        Self { supplied, env }
    }

    pub fn env(&self) -> &EnvSnapshot {
        &self.env
    }

    pub fn resolve(&self, key: OptionKey) -> Result<ResolvedOption> {
        let spec = key.spec();

        if let Some(raw) = self.supplied.get(key) {
            return Ok(ResolvedOption {
                key,
                value: coerce_supplied(key, spec.kind, raw)?,
                kind: spec.kind,
                source: ValueSource::Supplied,
            });
        }

        if let Some(var) = spec.env_var {
            if spec.suppressed_under_ci && self.env.ci_detected() {
                if self.env.get(var).is_some() {
                    tracing::debug!(option = %key, env_var = var, "ignoring override in CI");
                }
            } else if let Some(raw) = self.env.get(var) {
                return Ok(ResolvedOption {
                    key,
                    value: coerce_env(key, spec.kind, raw)?,
                    kind: spec.kind,
                    source: ValueSource::Environment,
                });
            }
        }

        Ok(ResolvedOption {
            key,
            value: spec.default.to_value(),
            kind: spec.kind,
            source: ValueSource::Default,
        })
    }

    /// Resolve every declared option, failing on the first bad value
    pub fn resolve_all(&self) -> Result<Vec<ResolvedOption>> {
        OptionKey::ALL.iter().map(|k| self.resolve(*k)).collect()
    }
}

fn type_error(key: OptionKey, kind: OptionKind, value: impl ToString) -> TelemetryError {
    TelemetryError::ConfigType {
        key: key.to_string(),
        expected: kind.to_string(),
        value: value.to_string(),
    }
}

fn coerce_supplied(key: OptionKey, kind: OptionKind, raw: &RawValue) -> Result<OptionValue> {
    match raw {
        RawValue::Text(text) => coerce_text(key, kind, text),
        RawValue::Toml(value) => match (kind, value) {
            (OptionKind::Bool, toml::Value::Boolean(b)) => Ok(OptionValue::Bool(*b)),
            (OptionKind::Integer, toml::Value::Integer(i)) => Ok(OptionValue::Integer(*i)),
            (OptionKind::String, toml::Value::String(s)) => Ok(OptionValue::String(s.clone())),
            (_, toml::Value::String(s)) => coerce_text(key, kind, s),
            (_, other) => Err(type_error(key, kind, other)),
        },
    }
}

/// Explicit text must name a boolean unambiguously
fn coerce_text(key: OptionKey, kind: OptionKind, text: &str) -> Result<OptionValue> {
    match kind {
        OptionKind::Bool if is_truthy(text) => Ok(OptionValue::Bool(true)),
        OptionKind::Bool if is_falsy(text) => Ok(OptionValue::Bool(false)),
        OptionKind::Bool => Err(type_error(key, kind, text)),
        OptionKind::Integer => text
            .trim()
            .parse::<i64>()
            .map(OptionValue::Integer)
            .map_err(|_| type_error(key, kind, text)),
        OptionKind::String => Ok(OptionValue::String(text.to_string())),
    }
}

/// Environment booleans use the truthy-set rule: anything else is false
fn coerce_env(key: OptionKey, kind: OptionKind, raw: &str) -> Result<OptionValue> {
    match kind {
        OptionKind::Bool => Ok(OptionValue::Bool(is_truthy(raw))),
        _ => coerce_text(key, kind, raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn resolver(supplied: SuppliedConfig, env: EnvSnapshot) -> ConfigResolver {
        ConfigResolver::new(supplied, env)
    }

    #[test]
    fn test_env_override_applies() {
        let r = resolver(
            SuppliedConfig::new(),
            EnvSnapshot::empty().with_var("TESTBED_AUTO_DEBUG", "yes"),
        );
        let resolved = r.resolve(OptionKey::AutoDebug).unwrap();
        assert_eq!(resolved.value, OptionValue::Bool(true));
        assert_eq!(resolved.source, ValueSource::Environment);
    }

    #[test]
    fn test_env_non_truthy_string_is_false() {
        let r = resolver(
            SuppliedConfig::new(),
            EnvSnapshot::empty().with_var("TESTBED_MANDATE_REQUIREMENT_MARKERS", "please"),
        );
        let resolved = r.resolve(OptionKey::MandateRequirementMarkers).unwrap();
        assert_eq!(resolved.value, OptionValue::Bool(false));
    }

    #[test]
    fn test_ci_suppresses_debug_override() {
        let r = resolver(
            SuppliedConfig::new(),
            EnvSnapshot::empty()
                .with_var("CI", "true")
                .with_var("TESTBED_AUTO_DEBUG", "true")
                .with_var("TESTBED_AUTO_DEBUG_WAIT_FOR_CONNECT", "1"),
        );
        for key in [OptionKey::AutoDebug, OptionKey::AutoDebugWaitForConnect] {
            let resolved = r.resolve(key).unwrap();
            assert_eq!(resolved.value, OptionValue::Bool(false));
            assert_eq!(resolved.source, ValueSource::Default);
        }
    }

    #[test]
    fn test_ci_does_not_suppress_other_overrides() {
        let r = resolver(
            SuppliedConfig::new(),
            EnvSnapshot::empty()
                .with_var("CI", "true")
                .with_var("TESTBED_CSV_EXPORT_PATH", "reports/out.csv"),
        );
        let resolved = r.resolve(OptionKey::ReportingCsvExportPath).unwrap();
        assert_eq!(resolved.value, OptionValue::String("reports/out.csv".into()));
    }

    #[test]
    fn test_supplied_value_wins_over_env() {
        let mut supplied = SuppliedConfig::new();
        supplied.set(OptionKey::DebuggerPort, 7000_i64);
        let r = resolver(
            supplied,
            EnvSnapshot::empty().with_var("TESTBED_DEBUG_PORT", "8000"),
        );
        let resolved = r.resolve(OptionKey::DebuggerPort).unwrap();
        assert_eq!(resolved.value, OptionValue::Integer(7000));
        assert_eq!(resolved.source, ValueSource::Supplied);
    }

    #[test]
    fn test_supplied_non_boolean_string_is_type_error() {
        let mut supplied = SuppliedConfig::new();
        supplied.apply_override("auto_debug=sometimes").unwrap();
        let err = resolver(supplied, EnvSnapshot::empty())
            .resolve(OptionKey::AutoDebug)
            .unwrap_err();
        assert!(matches!(err, TelemetryError::ConfigType { key, .. } if key == "auto_debug"));
    }

    #[test]
    fn test_supplied_wrong_toml_type_is_type_error() {
        let supplied =
            SuppliedConfig::from_toml("[testbed.reporting]\ncsv_export_path = 12").unwrap();
        let err = resolver(supplied, EnvSnapshot::empty())
            .resolve(OptionKey::ReportingCsvExportPath)
            .unwrap_err();
        assert!(matches!(err, TelemetryError::ConfigType { .. }));
    }

    #[test]
    fn test_env_integer_must_parse() {
        let r = resolver(
            SuppliedConfig::new(),
            EnvSnapshot::empty().with_var("TESTBED_DEBUG_PORT", "fifty"),
        );
        assert!(r.resolve(OptionKey::DebuggerPort).is_err());
    }

    #[test]
    fn test_boolean_text_in_toml_string() {
        let supplied = SuppliedConfig::from_toml("[testbed]\nauto_debug = \"On\"").unwrap();
        let resolved = resolver(supplied, EnvSnapshot::empty())
            .resolve(OptionKey::AutoDebug)
            .unwrap();
        assert_eq!(resolved.value, OptionValue::Bool(true));
    }

    proptest! {
        #[test]
        fn prop_empty_sources_resolve_to_defaults(index in 0usize..OptionKey::ALL.len()) {
            let key = OptionKey::ALL[index];
            let resolved = resolver(SuppliedConfig::new(), EnvSnapshot::empty())
                .resolve(key)
                .unwrap();
            prop_assert_eq!(resolved.value, key.spec().default.to_value());
            prop_assert_eq!(resolved.source, ValueSource::Default);
        }

        #[test]
        fn prop_ci_ignores_any_debug_override(
            value in prop::sample::select(vec!["1", "true", "TRUE", "t", "Yes", "y", "On"])
        ) {
            let env = EnvSnapshot::empty()
                .with_var("CI", "1")
                .with_var("TESTBED_AUTO_DEBUG", value);
            let resolved = resolver(SuppliedConfig::new(), env)
                .resolve(OptionKey::AutoDebug)
                .unwrap();
            prop_assert_eq!(resolved.value, OptionValue::Bool(false));
        }
    }
}
