//! Typed option registry
//!
//! Every option the plugin understands is declared here once, with its type,
//! default and environment override. Nothing outside this module looks up
//! options by string.

use serde::Serialize;
use std::fmt;

/// Prefix shared by every environment override
pub const ENV_PREFIX: &str = "TESTBED_";

/// Environment variable that marks a continuous-integration run
pub const CI_ENV_VAR: &str = "CI";

/// Case-insensitive strings that coerce to `true`
pub const TRUTHY_VALUES: [&str; 6] = ["1", "true", "t", "yes", "y", "on"];

/// Case-insensitive strings accepted as `false` from explicit configuration
pub const FALSY_VALUES: [&str; 6] = ["0", "false", "f", "no", "n", "off"];

/// Returns true when `raw` is in the canonical true set
pub fn is_truthy(raw: &str) -> bool {
    let lowered = raw.trim().to_ascii_lowercase();
    TRUTHY_VALUES.contains(&lowered.as_str())
}

/// Returns true when `raw` is in the canonical false set
pub fn is_falsy(raw: &str) -> bool {
    let lowered = raw.trim().to_ascii_lowercase();
    FALSY_VALUES.contains(&lowered.as_str())
}

/// Declared type of an option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Bool,
    String,
    Integer,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionKind::Bool => write!(f, "bool"),
            OptionKind::String => write!(f, "string"),
            OptionKind::Integer => write!(f, "integer"),
        }
    }
}

/// Well-typed effective value of an option
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    String(String),
    Integer(i64),
    /// No value from any source and no default
    Unset,
}

impl OptionValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            OptionValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, OptionValue::Unset)
    }
}

/// Compile-time default of an option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    Bool(bool),
    Str(&'static str),
    Integer(i64),
    Unset,
}

impl DefaultValue {
    pub fn to_value(self) -> OptionValue {
        match self {
            DefaultValue::Bool(b) => OptionValue::Bool(b),
            DefaultValue::Str(s) => OptionValue::String(s.to_string()),
            DefaultValue::Integer(i) => OptionValue::Integer(i),
            DefaultValue::Unset => OptionValue::Unset,
        }
    }
}

/// Declaration of a single option
#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    pub key: OptionKey,
    pub kind: OptionKind,
    pub default: DefaultValue,
    pub env_var: Option<&'static str>,
    /// Skip the environment override whenever a CI run is detected
    pub suppressed_under_ci: bool,
    pub help: &'static str,
}

/// Every option the plugin declares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum OptionKey {
    AutoDebug,
    AutoDebugWaitForConnect,
    DebuggerHost,
    DebuggerPort,
    MandateRequirementMarkers,
    RequirementsStrictFormat,
    ReportingCsvExportPath,
    ReportingOmitUnexecutedTests,
}

impl OptionKey {
    pub const ALL: [OptionKey; 8] = [
        OptionKey::AutoDebug,
        OptionKey::AutoDebugWaitForConnect,
        OptionKey::DebuggerHost,
        OptionKey::DebuggerPort,
        OptionKey::MandateRequirementMarkers,
        OptionKey::RequirementsStrictFormat,
        OptionKey::ReportingCsvExportPath,
        OptionKey::ReportingOmitUnexecutedTests,
    ];

    /// Dotted configuration key
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionKey::AutoDebug => "auto_debug",
            OptionKey::AutoDebugWaitForConnect => "auto_debug_wait_for_connect",
            OptionKey::DebuggerHost => "debugger.host",
            OptionKey::DebuggerPort => "debugger.port",
            OptionKey::MandateRequirementMarkers => "mandate_requirement_markers",
            OptionKey::RequirementsStrictFormat => "requirements.strict_format",
            OptionKey::ReportingCsvExportPath => "reporting.csv_export_path",
            OptionKey::ReportingOmitUnexecutedTests => "reporting.omit_unexecuted_tests",
        }
    }

    pub fn from_key(key: &str) -> Option<OptionKey> {
        OptionKey::ALL.into_iter().find(|k| k.as_str() == key)
    }

    pub fn spec(&self) -> OptionSpec {
        match self {
            OptionKey::AutoDebug => OptionSpec {
                key: *self,
                kind: OptionKind::Bool,
                default: DefaultValue::Bool(false),
                env_var: Some("TESTBED_AUTO_DEBUG"),
                suppressed_under_ci: true,
                help: "If true, the debug listener is started on the controller before collection",
            },
            OptionKey::AutoDebugWaitForConnect => OptionSpec {
                key: *self,
                kind: OptionKind::Bool,
                default: DefaultValue::Bool(false),
                env_var: Some("TESTBED_AUTO_DEBUG_WAIT_FOR_CONNECT"),
                suppressed_under_ci: true,
                help: "If true, the controller waits for a debugger client before running tests",
            },
            OptionKey::DebuggerHost => OptionSpec {
                key: *self,
                kind: OptionKind::String,
                default: DefaultValue::Str("0.0.0.0"),
                env_var: Some("TESTBED_DEBUG_HOST"),
                suppressed_under_ci: false,
                help: "Interface the debug listener binds to",
            },
            OptionKey::DebuggerPort => OptionSpec {
                key: *self,
                kind: OptionKind::Integer,
                default: DefaultValue::Integer(5679),
                env_var: Some("TESTBED_DEBUG_PORT"),
                suppressed_under_ci: false,
                help: "Port the debug listener binds to",
            },
            OptionKey::MandateRequirementMarkers => OptionSpec {
                key: *self,
                kind: OptionKind::Bool,
                default: DefaultValue::Bool(false),
                env_var: Some("TESTBED_MANDATE_REQUIREMENT_MARKERS"),
                suppressed_under_ci: false,
                help: "If true, every collected test must declare at least one requirement",
            },
            OptionKey::RequirementsStrictFormat => OptionSpec {
                key: *self,
                kind: OptionKind::Bool,
                default: DefaultValue::Bool(false),
                env_var: Some("TESTBED_REQUIREMENTS_STRICT_FORMAT"),
                suppressed_under_ci: false,
                help: "If true, requirement tags must match REQ-###-### (or NA) and be sorted",
            },
            OptionKey::ReportingCsvExportPath => OptionSpec {
                key: *self,
                kind: OptionKind::String,
                default: DefaultValue::Unset,
                env_var: Some("TESTBED_CSV_EXPORT_PATH"),
                suppressed_under_ci: false,
                help: "If set, test results are saved to this CSV file after the session",
            },
            OptionKey::ReportingOmitUnexecutedTests => OptionSpec {
                key: *self,
                kind: OptionKind::Bool,
                default: DefaultValue::Bool(false),
                env_var: Some("TESTBED_OMIT_UNEXECUTED_TESTS"),
                suppressed_under_ci: false,
                help: "If true, collected but unexecuted tests are left out of the CSV report",
            },
        }
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthy_is_case_insensitive() {
        assert!(is_truthy("TRUE"));
        assert!(is_truthy(" Yes "));
        assert!(is_truthy("1"));
        assert!(!is_truthy("enabled"));
        assert!(!is_truthy(""));
    }

    #[test]
    fn test_keys_round_trip_through_registry() {
        for key in OptionKey::ALL {
            assert_eq!(OptionKey::from_key(key.as_str()), Some(key));
            assert_eq!(key.spec().key, key);
        }
        assert_eq!(OptionKey::from_key("reporting"), None);
    }

    #[test]
    fn test_env_overrides_are_prefixed_and_unique() {
        let mut seen = std::collections::HashSet::new();
        for key in OptionKey::ALL {
            if let Some(var) = key.spec().env_var {
                assert!(var.starts_with(ENV_PREFIX), "{} is not namespaced", var);
                assert!(seen.insert(var), "{} declared twice", var);
            }
        }
    }

    #[test]
    fn test_only_debugger_switches_are_suppressed_under_ci() {
        let suppressed: Vec<_> = OptionKey::ALL
            .into_iter()
            .filter(|k| k.spec().suppressed_under_ci)
            .collect();
        assert_eq!(
            suppressed,
            vec![OptionKey::AutoDebug, OptionKey::AutoDebugWaitForConnect]
        );
    }

    #[test]
    fn test_defaults_match_declared_kind() {
        for key in OptionKey::ALL {
            let spec = key.spec();
            match (spec.kind, spec.default) {
                (OptionKind::Bool, DefaultValue::Bool(_))
                | (OptionKind::String, DefaultValue::Str(_))
                | (OptionKind::Integer, DefaultValue::Integer(_))
                | (_, DefaultValue::Unset) => {}
                (kind, default) => panic!("{} declares {} but defaults to {:?}", key, kind, default),
            }
        }
    }
}
