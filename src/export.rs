//! Reading email exports and writing run outputs.
//!
//! Input is either a bare JSON array of records or the storage document
//! `{"metadata": {...}, "emails": [...]}`. Output is three pretty-printed
//! JSON files plus the per-email applications table as CSV, all in one
//! directory.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tokio::fs;
use tracing::{info, warn};

use crate::analytics::{AnalyticsReport, ApplicationRow};
use crate::error::{ExportError, Result};
use crate::funnel::FlowGraph;
use crate::pipeline::types::{ClassifiedEmail, EmailRecord};

pub const ANALYTICS_FILE: &str = "analytics.json";
pub const FLOW_GRAPH_FILE: &str = "flow_graph.json";
pub const CLASSIFIED_FILE: &str = "classified_emails.json";
pub const APPLICATIONS_CSV_FILE: &str = "applications.csv";

/// Header of `applications.csv`, in `ApplicationRow` field order.
const APPLICATION_COLUMNS: [&str; 5] = ["company", "status", "date", "subject", "confidence"];

/// Load email records from an export file.
///
/// Elements that are not valid records are skipped with a warning.
pub async fn load_records(path: &Path) -> Result<Vec<EmailRecord>> {
    let content = fs::read_to_string(path).await.map_err(ExportError::from)?;
    let records = parse_records(&content)?;
    info!(path = %path.display(), count = records.len(), "Loaded email records");
    Ok(records)
}

/// Parse an export document already in memory.
pub fn parse_records(content: &str) -> Result<Vec<EmailRecord>> {
    let elements = record_elements(content)?;

    let mut records = Vec::with_capacity(elements.len());
    for (index, element) in elements.into_iter().enumerate() {
        match serde_json::from_value::<EmailRecord>(element) {
            Ok(record) => records.push(record),
            Err(e) => warn!(index, error = %e, "Skipping malformed email record"),
        }
    }
    Ok(records)
}

fn record_elements(content: &str) -> std::result::Result<Vec<Value>, ExportError> {
    match serde_json::from_str::<Value>(content)? {
        Value::Array(items) => Ok(items),
        Value::Object(mut doc) => match doc.remove("emails") {
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(ExportError::Format("'emails' is not an array".into())),
            None => Err(ExportError::Format("object without an 'emails' array".into())),
        },
        _ => Err(ExportError::Format("expected an array or an object".into())),
    }
}

/// Write `analytics.json`, `flow_graph.json`, `classified_emails.json` and
/// `applications.csv` into `dir`.
///
/// Returns the paths written.
pub async fn write_outputs(
    dir: &Path,
    report: &AnalyticsReport,
    graph: &FlowGraph,
    classified: &[ClassifiedEmail],
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).await.map_err(ExportError::from)?;

    let written = vec![
        write_json(&dir.join(ANALYTICS_FILE), report).await?,
        write_json(&dir.join(FLOW_GRAPH_FILE), graph).await?,
        write_json(&dir.join(CLASSIFIED_FILE), classified).await?,
        write_applications_csv(&dir.join(APPLICATIONS_CSV_FILE), &report.applications).await?,
    ];

    info!(dir = %dir.display(), files = written.len(), "Wrote outputs");
    Ok(written)
}

/// Write one CSV row per application. An empty table still gets its header.
pub async fn write_applications_csv(path: &Path, rows: &[ApplicationRow]) -> Result<PathBuf> {
    let bytes = applications_csv(rows)?;
    fs::write(path, bytes).await.map_err(ExportError::from)?;
    Ok(path.to_path_buf())
}

fn applications_csv(rows: &[ApplicationRow]) -> std::result::Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if rows.is_empty() {
        writer.write_record(APPLICATION_COLUMNS)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(value).map_err(ExportError::from)?;
    fs::write(path, json).await.map_err(ExportError::from)?;
    Ok(path.to_path_buf())
}
