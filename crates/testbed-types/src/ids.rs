//! Strongly-typed identifiers for collected tests and reporting processes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a collected test node.
///
/// Follows the host runner's `file_path::test_name` format and is unique
/// within a session. It is the only key used to correlate results across
/// processes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File path portion of the node id, if it has one
    pub fn file_path(&self) -> Option<&str> {
        self.0.split_once("::").map(|(path, _)| path)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifier of the process that produced a result
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    /// Reserved id for results produced in the controller process itself
    pub const CONTROLLER: &'static str = "controller";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn controller() -> Self {
        Self(Self::CONTROLLER.to_string())
    }

    pub fn is_controller(&self) -> bool {
        self.0 == Self::CONTROLLER
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for WorkerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}
