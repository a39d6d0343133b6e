//! CSV report export
//!
//! Each session writes one fresh report: the file is truncated, never
//! appended to. Column and row order are fixed so that two runs with the same
//! outcomes produce the same file apart from timestamps.

use crate::error::ExportIoError;
use crate::report::ResultSet;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use testbed_types::{NodeId, Outcome, ResultRecord, WorkerId};

/// Header row, in column order
pub const REPORT_COLUMNS: [&str; 6] = [
    "node_id",
    "outcome",
    "requirements",
    "worker",
    "started_at",
    "finished_at",
];

/// Joins requirement tags within a single cell
pub const REQUIREMENT_SEPARATOR: char = ';';

const ESCAPE: char = '\\';

/// What an export wrote
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub rows_written: usize,
    pub rows_omitted: usize,
}

/// One data row, as read back from a report
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReportRow {
    pub node_id: NodeId,
    pub outcome: Outcome,
    #[serde(deserialize_with = "split_requirements")]
    pub requirements: Vec<String>,
    pub worker: WorkerId,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

fn split_requirements<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let joined = String::deserialize(deserializer)?;
    Ok(split_requirement_cell(&joined))
}

/// Join tags with `;`, escaping `;` and `\` inside a tag with `\`
pub fn join_requirement_cell(tags: &[String]) -> String {
    let mut cell = String::new();
    for (i, tag) in tags.iter().enumerate() {
        if i > 0 {
            cell.push(REQUIREMENT_SEPARATOR);
        }
        for c in tag.chars() {
            if c == REQUIREMENT_SEPARATOR || c == ESCAPE {
                cell.push(ESCAPE);
            }
            cell.push(c);
        }
    }
    cell
}

/// Inverse of [`join_requirement_cell`]; empty tags are dropped
pub fn split_requirement_cell(cell: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let mut current = String::new();
    let mut chars = cell.chars();
    while let Some(c) = chars.next() {
        match c {
            ESCAPE => current.extend(chars.next()),
            REQUIREMENT_SEPARATOR => {
                if !current.is_empty() {
                    tags.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        tags.push(current);
    }
    tags
}

fn timestamp_cell(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

fn record_cells(record: &ResultRecord) -> [String; 6] {
    [
        record.node_id.to_string(),
        record.outcome.to_string(),
        join_requirement_cell(&record.requirements),
        record.worker.to_string(),
        timestamp_cell(record.started_at),
        timestamp_cell(record.finished_at),
    ]
}

/// Write `results` to a CSV file at `path`, replacing any existing file.
///
/// Rows are staged in a temporary file next to `path` and renamed into place
/// once complete, so a failed export leaves any earlier report untouched.
/// Parent directories are created as needed. With `omit_unexecuted`, rows
/// for tests that never ran are left out.
pub fn export(
    results: &ResultSet,
    path: impl AsRef<Path>,
    omit_unexecuted: bool,
) -> Result<ExportSummary, ExportIoError> {
    let path = path.as_ref();
    let io_err = |e: std::io::Error| ExportIoError::new(path, e);

    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent).map_err(io_err)?;
            parent
        }
        None => Path::new("."),
    };

    let staging = NamedTempFile::new_in(dir).map_err(io_err)?;
    let mut writer = csv::Writer::from_writer(staging);
    writer
        .write_record(REPORT_COLUMNS)
        .map_err(|e| io_err(e.into()))?;

    let mut rows_written = 0;
    let mut rows_omitted = 0;
    for record in results.records() {
        if omit_unexecuted && !record.outcome.was_executed() {
            tracing::warn!(
                "Omitting {} from report; no status attached (test skipped?).",
                record.node_id
            );
            rows_omitted += 1;
            continue;
        }
        writer
            .write_record(record_cells(record))
            .map_err(|e| io_err(e.into()))?;
        rows_written += 1;
    }
    let staging = writer.into_inner().map_err(|e| io_err(e.into_error()))?;
    staging.persist(path).map_err(|e| io_err(e.error))?;

    tracing::info!(
        path = %path.display(),
        rows = rows_written,
        omitted = rows_omitted,
        "test report exported"
    );

    Ok(ExportSummary {
        path: path.to_path_buf(),
        rows_written,
        rows_omitted,
    })
}

/// Read a report written by [`export`]
pub fn read_report(path: impl AsRef<Path>) -> Result<Vec<ReportRow>, ExportIoError> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path).map_err(|e| ExportIoError::new(path, e.into()))?;
    reader
        .deserialize()
        .collect::<Result<Vec<ReportRow>, csv::Error>>()
        .map_err(|e| ExportIoError::new(path, e.into()))
}
