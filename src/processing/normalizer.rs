//! Record normalization: flatten the nested process object and parse timestamps.

use crate::error::{AppError, Result};
use crate::models::{Field, ProcessRun, RunRecord};
use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::warn;

/// Timestamp layout used by the API: `YYYY-MM-DDTHH:MM:SS.ffffffZ`
pub const API_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// State whose `ended_at` is left as supplied
pub const UNRESOLVED_STATE: &str = "unresolved";

/// Parse an API timestamp. The fractional part is mandatory and holds 1 to 6 digits.
pub fn parse_api_timestamp(value: &str) -> Result<NaiveDateTime> {
    let invalid = || {
        AppError::Parse(format!(
            "Timestamp '{}' does not match YYYY-MM-DDTHH:MM:SS.ffffffZ",
            value
        ))
    };

    let (_, fraction) = value.rsplit_once('.').ok_or_else(invalid)?;
    let digits = fraction.strip_suffix('Z').ok_or_else(invalid)?;
    if digits.is_empty() || digits.len() > 6 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    NaiveDateTime::parse_from_str(value, API_TIMESTAMP_FORMAT).map_err(|_| invalid())
}

/// Normalize one run.
///
/// The `process` object is replaced by trailing `process_id`/`process_name`
/// fields; `started_at` and `created_at` are always parsed, `ended_at` only
/// when the run is not unresolved. All other fields pass through untouched.
pub fn normalize_run(run: ProcessRun) -> Result<RunRecord> {
    let run_id = run.id()?;
    let mut record = RunRecord::new();
    for (key, value) in run.into_fields() {
        record.insert(key, Field::Json(value));
    }

    let (process_id, process_name) = match record.remove("process") {
        Some(Field::Json(Value::Object(mut process))) => {
            let id = process.remove("id");
            let name = process.remove("name");
            match (id, name) {
                (Some(id), Some(name)) => (id, name),
                _ => {
                    return Err(AppError::Parse(format!(
                        "Run {} has a process object without id or name",
                        run_id
                    )))
                }
            }
        }
        _ => {
            return Err(AppError::Parse(format!(
                "Run {} has no process object",
                run_id
            )))
        }
    };
    record.insert("process_id", Field::Json(process_id));
    record.insert("process_name", Field::Json(process_name));

    let unresolved = match record.state() {
        Some(state) => state == UNRESOLVED_STATE,
        None => return Err(AppError::Parse(format!("Run {} has no state", run_id))),
    };

    parse_timestamp_field(&mut record, "started_at", &run_id)?;
    parse_timestamp_field(&mut record, "created_at", &run_id)?;
    if !unresolved {
        parse_timestamp_field(&mut record, "ended_at", &run_id)?;
    }

    if !matches!(record.get("duration"), Some(Field::Json(Value::Number(_)))) {
        warn!(run_id = %run_id, "Run has no numeric duration");
    }

    Ok(record)
}

/// Normalize every run, preserving order. The first malformed run aborts the batch.
pub fn normalize_runs(runs: Vec<ProcessRun>) -> Result<Vec<RunRecord>> {
    runs.into_iter().map(normalize_run).collect()
}

fn parse_timestamp_field(record: &mut RunRecord, key: &str, run_id: &str) -> Result<()> {
    let parsed = match record.get(key) {
        Some(Field::Json(Value::String(raw))) => parse_api_timestamp(raw)
            .map_err(|e| AppError::Parse(format!("Run {} field '{}': {}", run_id, key, e)))?,
        Some(Field::Timestamp(_)) => return Ok(()),
        _ => {
            return Err(AppError::Parse(format!(
                "Run {} field '{}' is missing or not a string",
                run_id, key
            )))
        }
    };
    record.insert(key, Field::Timestamp(parsed));
    Ok(())
}
