//! Delimited export of normalized run records

use crate::config::ExportConfig;
use crate::error::{AppError, Result};
use crate::models::RunRecord;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};

const DELIMITER: char = ',';
const LINE_ENDING: &str = "\r\n";

/// Outcome of writing the CSV file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub path: PathBuf,
    pub rows_written: usize,
}

/// Writes run records to `<output_dir>/<file_name>`
#[derive(Debug, Clone)]
pub struct CsvExporter {
    output_path: PathBuf,
}

impl CsvExporter {
    pub fn new(config: &ExportConfig) -> Self {
        Self {
            output_path: config.output_path(),
        }
    }

    pub fn with_path(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }

    /// Render the records to CSV text.
    ///
    /// The header is the key order of the first record. A key missing from a
    /// later record renders as an empty cell; a key absent from the header is
    /// an error. Zero records render to an empty string.
    pub fn render(records: &[RunRecord]) -> Result<String> {
        let Some(first) = records.first() else {
            return Ok(String::new());
        };

        let columns: Vec<&str> = first.keys().collect();
        let mut content = String::new();
        push_row(&mut content, columns.iter().copied());

        for record in records {
            let extra: BTreeSet<&str> = record
                .keys()
                .filter(|key| !columns.contains(key))
                .collect();
            if !extra.is_empty() {
                return Err(AppError::Export(format!(
                    "Run {} has fields not in the header: {}",
                    record.id(),
                    extra.into_iter().collect::<Vec<_>>().join(", ")
                )));
            }

            let cells: Vec<String> = columns.iter().map(|c| record.render(c)).collect();
            push_row(&mut content, cells.iter().map(String::as_str));
        }

        Ok(content)
    }

    /// Render every record, then replace the output file in one write
    pub async fn export(&self, records: &[RunRecord]) -> Result<ExportReport> {
        let content = Self::render(records)?;

        if records.is_empty() {
            warn!(path = %self.output_path.display(), "No runs to export, writing an empty file");
        }

        if let Some(parent) = self.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    AppError::Export(format!(
                        "Failed to create output directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        fs::write(&self.output_path, content.as_bytes())
            .await
            .map_err(|e| {
                AppError::Export(format!(
                    "Failed to write {}: {}",
                    self.output_path.display(),
                    e
                ))
            })?;

        info!(
            path = %self.output_path.display(),
            rows = records.len(),
            "CSV export written"
        );

        Ok(ExportReport {
            path: self.output_path.clone(),
            rows_written: records.len(),
        })
    }
}

fn push_row<'a>(content: &mut String, cells: impl Iterator<Item = &'a str>) {
    for (idx, cell) in cells.enumerate() {
        if idx > 0 {
            content.push(DELIMITER);
        }
        content.push_str(&escape_csv(cell));
    }
    content.push_str(LINE_ENDING);
}

/// Quote a cell when it holds a delimiter, quote or line break
fn escape_csv(s: &str) -> String {
    if s.contains([DELIMITER, '"', '\r', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Field;
    use serde_json::json;

    fn record(pairs: &[(&str, serde_json::Value)]) -> RunRecord {
        let mut record = RunRecord::new();
        for (key, value) in pairs {
            record.insert(*key, Field::Json(value.clone()));
        }
        record
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("test\"quote"), "\"test\"\"quote\"");
        assert_eq!(escape_csv("line\nbreak"), "\"line\nbreak\"");
        assert_eq!(escape_csv(""), "");
    }

    #[test]
    fn test_render_uses_first_record_keys() {
        let records = vec![
            record(&[("id", json!("r-1")), ("duration", json!(5)), ("started_by", json!({"type": "user"}))]),
            record(&[("id", json!("r-2")), ("duration", json!(9)), ("started_by", json!(null))]),
        ];

        let content = CsvExporter::render(&records).unwrap();
        assert_eq!(
            content,
            "id,duration,started_by\r\nr-1,5,\"{\"\"type\"\":\"\"user\"\"}\"\r\nr-2,9,\r\n"
        );
    }

    #[test]
    fn test_render_missing_keys_are_empty_cells() {
        let records = vec![
            record(&[("id", json!("r-1")), ("ended_at", json!("x"))]),
            record(&[("id", json!("r-2"))]),
        ];

        let content = CsvExporter::render(&records).unwrap();
        assert_eq!(content, "id,ended_at\r\nr-1,x\r\nr-2,\r\n");
    }

    #[test]
    fn test_render_empty() {
        assert!(CsvExporter::render(&[]).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fields_outside_header_fail_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("combined.csv");
        let records = vec![
            record(&[("id", json!("r-1"))]),
            record(&[("id", json!("r-2")), ("started_by", json!({"type": "user"}))]),
        ];

        let err = CsvExporter::with_path(&path).export(&records).await.unwrap_err();

        assert!(matches!(err, AppError::Export(_)));
        assert!(err.to_string().contains("r-2"));
        assert!(err.to_string().contains("started_by"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_export_creates_directory_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("combined.csv");
        let exporter = CsvExporter::with_path(&path);

        let report = exporter
            .export(&[record(&[("id", json!("r-1"))]), record(&[("id", json!("r-2"))])])
            .await
            .unwrap();
        assert_eq!(report.rows_written, 2);

        exporter.export(&[record(&[("id", json!("r-3"))])]).await.unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "id\r\nr-3\r\n");
    }

    #[tokio::test]
    async fn test_export_empty_writes_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("combined.csv");

        let report = CsvExporter::with_path(&path).export(&[]).await.unwrap();
        assert_eq!(report.rows_written, 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
