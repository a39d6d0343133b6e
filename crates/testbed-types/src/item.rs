//! Collected test items
//!
//! A TestItem is produced by the host runner's collection phase. Requirement
//! tags are parsed from source by the collector and handed over as plain
//! strings, so nothing here needs to introspect the test function itself.

use crate::NodeId;
use serde::{Deserialize, Serialize};

/// A discovered, not-yet-executed test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestItem {
    /// Stable node identifier
    pub node_id: NodeId,

    /// Requirement tags declared by the test author, in declaration order
    #[serde(default)]
    pub requirements: Vec<String>,

    /// Doc string attached to the test function, trimmed
    #[serde(default)]
    pub doc_string: Option<String>,

    /// Cleared by the requirement validator when the item is rejected
    #[serde(default = "default_valid")]
    pub valid: bool,
}

impl TestItem {
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        Self {
            node_id: node_id.into(),
            requirements: Vec::new(),
            doc_string: None,
            valid: true,
        }
    }

    pub fn with_requirements<I, S>(mut self, requirements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requirements = requirements.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_doc_string(mut self, doc: impl AsRef<str>) -> Self {
        let trimmed = doc.as_ref().trim();
        self.doc_string = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn has_requirements(&self) -> bool {
        !self.requirements.is_empty()
    }
}

fn default_valid() -> bool {
    true
}
