//! Test outcomes and result records

use crate::{NodeId, TestItem, WorkerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Outcome of a single test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Passed,
    Failed,
    Error,
    Skipped,
    /// Collected but never reported by any process
    NotExecuted,
}

impl Outcome {
    pub const ALL: [Outcome; 5] = [
        Outcome::Passed,
        Outcome::Failed,
        Outcome::Error,
        Outcome::Skipped,
        Outcome::NotExecuted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Passed => "passed",
            Outcome::Failed => "failed",
            Outcome::Error => "error",
            Outcome::Skipped => "skipped",
            Outcome::NotExecuted => "not-executed",
        }
    }

    pub fn was_executed(&self) -> bool {
        !matches!(self, Outcome::NotExecuted)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Error returned when an outcome label is not recognised
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown test outcome '{0}'")]
pub struct ParseOutcomeError(pub String);

impl FromStr for Outcome {
    type Err = ParseOutcomeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Outcome::ALL
            .into_iter()
            .find(|outcome| outcome.as_str() == s)
            .ok_or_else(|| ParseOutcomeError(s.to_string()))
    }
}

/// Outcome of one executed (or explicitly not executed) test item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub node_id: NodeId,
    pub outcome: Outcome,

    /// Process that produced the record
    pub worker: WorkerId,

    /// Requirement tags, copied from the collected item
    #[serde(default)]
    pub requirements: Vec<String>,

    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ResultRecord {
    pub fn new(node_id: impl Into<NodeId>, outcome: Outcome, worker: WorkerId) -> Self {
        Self {
            node_id: node_id.into(),
            outcome,
            worker,
            requirements: Vec::new(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Placeholder for an item nobody reported on
    pub fn not_executed(item: &TestItem, worker: WorkerId) -> Self {
        Self {
            node_id: item.node_id.clone(),
            outcome: Outcome::NotExecuted,
            worker,
            requirements: item.requirements.clone(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn with_requirements(mut self, requirements: Vec<String>) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn with_timing(mut self, started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self.finished_at = Some(finished_at);
        self
    }
}
