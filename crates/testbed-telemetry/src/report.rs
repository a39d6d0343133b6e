//! Finalized session results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use testbed_types::{NodeId, Outcome, ResultRecord};

/// Outcome counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub skipped: usize,
    pub not_executed: usize,
}

impl ResultSummary {
    fn from_records(records: &[ResultRecord]) -> Self {
        let mut summary = ResultSummary {
            total: records.len(),
            ..Default::default()
        };
        for record in records {
            match record.outcome {
                Outcome::Passed => summary.passed += 1,
                Outcome::Failed => summary.failed += 1,
                Outcome::Error => summary.errors += 1,
                Outcome::Skipped => summary.skipped += 1,
                Outcome::NotExecuted => summary.not_executed += 1,
            }
        }
        summary
    }

    /// No failures or errors among the executed tests
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }
}

/// Session-wide results in collection order, one record per collected item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet {
    pub generated_at: DateTime<Utc>,
    records: Vec<ResultRecord>,
    summary: ResultSummary,
}

impl ResultSet {
    pub fn new(records: Vec<ResultRecord>) -> Self {
        let summary = ResultSummary::from_records(&records);
        Self {
            generated_at: Utc::now(),
            records,
            summary,
        }
    }

    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ResultRecord> {
        self.records
    }

    pub fn summary(&self) -> &ResultSummary {
        &self.summary
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, node_id: &NodeId) -> Option<&ResultRecord> {
        self.records.iter().find(|r| &r.node_id == node_id)
    }

    /// Generate a text report
    pub fn to_text(&self) -> String {
        let mut output = String::new();

        output.push_str("╔════════════════════════════════════════════════════════════╗\n");
        push_row(&mut output, "Test Session Report");
        output.push_str("╠════════════════════════════════════════════════════════════╣\n");
        push_row(
            &mut output,
            &format!("Generated: {}", self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")),
        );
        output.push_str("╟────────────────────────────────────────────────────────────╢\n");

        for record in &self.records {
            let icon = match record.outcome {
                Outcome::Passed => "✓",
                Outcome::Failed => "✗",
                Outcome::Error => "!",
                Outcome::Skipped => "○",
                Outcome::NotExecuted => "-",
            };
            push_row(
                &mut output,
                &format!("{} {:<44} {:>10}", icon, record.node_id, record.worker),
            );
            if !record.requirements.is_empty() {
                push_row(
                    &mut output,
                    &format!("    Requirements: {}", record.requirements.join(", ")),
                );
            }
        }

        output.push_str("╠════════════════════════════════════════════════════════════╣\n");
        push_row(
            &mut output,
            &format!(
                "Total: {:<4} Passed: {:<4} Failed: {:<4} Errors: {:<4}",
                self.summary.total, self.summary.passed, self.summary.failed, self.summary.errors
            ),
        );
        push_row(
            &mut output,
            &format!(
                "Skipped: {:<4} Not executed: {:<4}",
                self.summary.skipped, self.summary.not_executed
            ),
        );
        output.push_str("╚════════════════════════════════════════════════════════════╝\n");

        output
    }

    /// Generate JSON report
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Inner width of the text report box
const BOX_WIDTH: usize = 60;

/// One boxed line; content wider than the box pushes the border out
fn push_row(output: &mut String, content: &str) {
    output.push_str(&format!("║  {:<width$}║\n", content, width = BOX_WIDTH - 2));
}
