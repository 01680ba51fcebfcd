//! Shared fixtures for integration tests
//!
//! `FakeSource` serves processes, runs and steps from memory so the job can
//! be driven end to end without a network.

#![allow(dead_code)]

use async_trait::async_trait;
use run_history_export::config::Config;
use run_history_export::error::{AppError, Result};
use run_history_export::integrations::RunSource;
use run_history_export::models::{Process, ProcessRun, RunState, StepRun};
use run_history_export::vault::MemoryVault;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct FakeSource {
    processes: Vec<Process>,
    runs: HashMap<(String, RunState), Vec<Value>>,
    steps: HashMap<String, Vec<Value>>,
    delays: HashMap<String, Duration>,
    failing_runs: HashMap<String, fn() -> AppError>,
    pub step_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_process(mut self, id: &str, name: &str) -> Self {
        self.processes.push(Process::new(id, name));
        self
    }

    pub fn with_runs(mut self, process_id: &str, state: RunState, runs: Vec<Value>) -> Self {
        self.runs.insert((process_id.to_string(), state), runs);
        self
    }

    pub fn with_steps(mut self, run_id: &str, durations: Vec<Value>) -> Self {
        let steps = durations
            .into_iter()
            .map(|duration| json!({"duration": duration}))
            .collect();
        self.steps.insert(run_id.to_string(), steps);
        self
    }

    pub fn with_raw_steps(mut self, run_id: &str, steps: Vec<Value>) -> Self {
        self.steps.insert(run_id.to_string(), steps);
        self
    }

    /// Delay the run listing of one process
    pub fn with_delay(mut self, process_id: &str, delay: Duration) -> Self {
        self.delays.insert(process_id.to_string(), delay);
        self
    }

    /// Fail the run listing of one process
    pub fn failing_runs(mut self, process_id: &str, error: fn() -> AppError) -> Self {
        self.failing_runs.insert(process_id.to_string(), error);
        self
    }
}

#[async_trait]
impl RunSource for FakeSource {
    async fn list_processes(&self) -> Result<Vec<Process>> {
        Ok(self.processes.clone())
    }

    async fn list_process_runs(&self, process_id: &str, state: RunState) -> Result<Vec<ProcessRun>> {
        if let Some(delay) = self.delays.get(process_id) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(error) = self.failing_runs.get(process_id) {
            return Err(error());
        }
        self.runs
            .get(&(process_id.to_string(), state))
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(AppError::from))
            .collect()
    }

    async fn list_step_runs(&self, process_run_id: &str) -> Result<Vec<StepRun>> {
        self.step_calls.fetch_add(1, Ordering::SeqCst);
        self.steps
            .get(process_run_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(AppError::from))
            .collect()
    }
}

pub fn process_object(process_id: &str, name: &str) -> Value {
    json!({"id": process_id, "name": name})
}

/// A completed run as the API lists it
pub fn completed_run(id: &str, process_id: &str, name: &str, duration: i64) -> Value {
    json!({
        "id": id,
        "state": "completed",
        "process": process_object(process_id, name),
        "duration": duration,
        "started_at": "2024-05-01T10:00:00.000000Z",
        "created_at": "2024-05-01T09:59:58.250000Z",
        "ended_at": "2024-05-01T10:00:05.123456Z",
        "started_by": {"type": "schedule", "name": "nightly"}
    })
}

/// An unresolved run: no duration, no end time
pub fn unresolved_run(id: &str, process_id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "state": "unresolved",
        "process": process_object(process_id, name),
        "started_at": "2024-05-01T11:00:00.000000Z",
        "created_at": "2024-05-01T10:59:59.000000Z",
        "ended_at": null,
        "started_by": {"type": "user", "name": "Ada, L."}
    })
}

pub fn vault() -> MemoryVault {
    MemoryVault::new().with_secret("get_processes", [("api", "test-api-key")])
}

/// Vault that also carries database connection parameters rooted at `location`
pub fn vault_with_database(location: &Path) -> MemoryVault {
    let location = location.to_string_lossy().into_owned();
    vault().with_secret(
        "db_connect",
        [
            ("database", "runs.sqlite".to_string()),
            ("username", "robot".to_string()),
            ("password", "hunter2".to_string()),
            ("location", location),
        ],
    )
}

pub fn config_for(output_dir: &Path) -> Config {
    let mut config = Config::default();
    config.workspace.id = "ws-1".to_string();
    config.export.output_dir = output_dir.to_path_buf();
    config
}

/// Minimal RFC 4180 reader for assertions on exported files
pub fn read_csv(path: &Path) -> Vec<Vec<String>> {
    let content = std::fs::read_to_string(path).unwrap();
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                chars.next();
                cell.push('"');
            }
            ('"', true) => in_quotes = false,
            ('"', false) => in_quotes = true,
            (',', false) => row.push(std::mem::take(&mut cell)),
            ('\r', false) => {}
            ('\n', false) => {
                row.push(std::mem::take(&mut cell));
                rows.push(std::mem::take(&mut row));
            }
            (c, _) => cell.push(c),
        }
    }
    if !cell.is_empty() || !row.is_empty() {
        row.push(cell);
        rows.push(row);
    }
    rows
}

/// Rows keyed by header name
pub fn read_csv_records(path: &Path) -> Vec<HashMap<String, String>> {
    let mut rows = read_csv(path).into_iter();
    let Some(header) = rows.next() else {
        return Vec::new();
    };
    rows.map(|row| header.iter().cloned().zip(row).collect())
        .collect()
}
