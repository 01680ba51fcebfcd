//! SQLite sink for normalized run records

use crate::config::DatabaseConfig;
use crate::error::{AppError, Result};
use crate::models::{Field, RunRecord};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info, warn};

/// Columns persisted per run, in statement order
pub const COLUMNS: [&str; 9] = [
    "id",
    "state",
    "process_id",
    "process_name",
    "duration",
    "started_at",
    "created_at",
    "ended_at",
    "started_by",
];

/// Outcome of one persist call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistReport {
    pub inserted: usize,
    pub ignored: usize,
    pub failed: usize,
}

/// Insert-or-ignore writer keyed on the run id
#[derive(Debug)]
pub struct DatabaseSink {
    conn: Connection,
    table: String,
    continue_on_error: bool,
}

impl DatabaseSink {
    /// Open (or create) the database file and make sure the table exists
    pub fn open(path: &Path, config: &DatabaseConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(|e| {
            AppError::Database(format!("Failed to open {}: {}", path.display(), e))
        })?;
        Self::with_connection(conn, config)
    }

    pub fn open_in_memory(config: &DatabaseConfig) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, config)
    }

    fn with_connection(conn: Connection, config: &DatabaseConfig) -> Result<Self> {
        validate_table_name(&config.table)?;
        let sink = Self {
            conn,
            table: config.table.clone(),
            continue_on_error: config.continue_on_error,
        };
        sink.ensure_table()?;
        Ok(sink)
    }

    fn ensure_table(&self) -> Result<()> {
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                state TEXT,
                process_id TEXT,
                process_name TEXT,
                duration NUMERIC,
                started_at TEXT,
                created_at TEXT,
                ended_at TEXT,
                started_by TEXT
            )",
            self.table
        ))?;
        Ok(())
    }

    /// Insert every record, skipping ids that already exist.
    ///
    /// A failing row aborts the batch unless `continue_on_error` is set, in
    /// which case it is counted and skipped.
    pub fn persist(&self, records: &[RunRecord]) -> Result<PersistReport> {
        let sql = format!(
            "INSERT OR IGNORE INTO {} ({}) VALUES ({})",
            self.table,
            COLUMNS.join(", "),
            (1..=COLUMNS.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut report = PersistReport::default();

        for record in records {
            let values = COLUMNS.iter().map(|column| sql_value(record.get(column)));
            match stmt.execute(params_from_iter(values)) {
                Ok(0) => {
                    debug!(run_id = %record.id(), "Run already persisted");
                    report.ignored += 1;
                }
                Ok(_) => report.inserted += 1,
                Err(e) if self.continue_on_error => {
                    warn!(run_id = %record.id(), error = %e, "Failed to persist run, continuing");
                    report.failed += 1;
                }
                Err(e) => {
                    return Err(AppError::Database(format!(
                        "Failed to persist run {}: {}",
                        record.id(),
                        e
                    )))
                }
            }
        }

        info!(
            table = %self.table,
            inserted = report.inserted,
            ignored = report.ignored,
            failed = report.failed,
            "Runs persisted"
        );
        Ok(report)
    }

    /// Number of rows currently in the table
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.table),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn sql_value(field: Option<&Field>) -> SqlValue {
    match field {
        None | Some(Field::Json(Value::Null)) => SqlValue::Null,
        Some(Field::Json(Value::Bool(b))) => SqlValue::Integer(i64::from(*b)),
        Some(Field::Json(Value::Number(n))) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => SqlValue::Integer(i),
            (None, Some(f)) => SqlValue::Real(f),
            (None, None) => SqlValue::Text(n.to_string()),
        },
        Some(other) => SqlValue::Text(other.render()),
    }
}

/// Table names are interpolated into SQL, so only plain identifiers are accepted
fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(AppError::Configuration(format!(
            "database.table '{}' is not a valid identifier",
            table
        )))
    }
}
