//! Error types for testbed-telemetry

use std::path::PathBuf;
use testbed_types::NodeId;
use thiserror::Error;

/// Errors that can occur while running the telemetry plugin
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A configuration value could not be coerced to its declared type
    #[error("Invalid value for option '{key}': expected {expected}, got '{value}'")]
    ConfigType {
        key: String,
        expected: String,
        value: String,
    },

    /// The supplied configuration could not be read or parsed
    #[error("Configuration parse error: {0}")]
    ConfigParse(String),

    /// One or more collected tests lack mandated requirement annotations
    #[error(transparent)]
    MissingRequirements(#[from] MissingRequirementError),

    /// The report artifact could not be written
    #[error(transparent)]
    Export(#[from] ExportIoError),

    /// The debug listener could not be started or accepted a connection
    #[error("Debugger error: {0}")]
    Debugger(String),

    /// A worker message could not be decoded or delivered
    #[error("Transport error: {0}")]
    Transport(String),

    /// A lifecycle hook was invoked out of order
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),
}

/// A single rejected test item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementViolation {
    pub node_id: NodeId,
    pub reason: String,
}

impl std::fmt::Display for RequirementViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.node_id, self.reason)
    }
}

/// Batch of every item that failed requirement validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} test(s) failed requirement validation:\n{}", offending_count(.violations), render_violations(.violations))]
pub struct MissingRequirementError {
    pub violations: Vec<RequirementViolation>,
}

impl MissingRequirementError {
    /// Distinct offending node ids, in collection order
    pub fn offenders(&self) -> Vec<&NodeId> {
        let mut seen = Vec::new();
        for violation in &self.violations {
            if !seen.contains(&&violation.node_id) {
                seen.push(&violation.node_id);
            }
        }
        seen
    }
}

fn offending_count(violations: &[RequirementViolation]) -> usize {
    violations
        .iter()
        .map(|v| &v.node_id)
        .collect::<std::collections::HashSet<_>>()
        .len()
}

fn render_violations(violations: &[RequirementViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("  - {}", v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The report file could not be written
#[derive(Debug, Error)]
#[error("Failed to export report to {}: {source}", .path.display())]
pub struct ExportIoError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl ExportIoError {
    pub fn new(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for telemetry operations
pub type Result<T> = std::result::Result<T, TelemetryError>;
