//! End-to-end export job: credentials, fetch, normalize, write, persist.

use super::deduplication::DeduplicationEngine;
use super::fetcher::fetch_all_runs;
use super::normalizer::normalize_runs;
use crate::config::Config;
use crate::error::AppError;
use crate::export::{CsvExporter, DatabaseSink, PersistReport};
use crate::integrations::{AutomationApiClient, RunSource};
use crate::models::RunRecord;
use crate::vault::{Credentials, DatabaseSecret, SecretStore};
use serde::Serialize;
use std::path::PathBuf;
use strum::Display;
use tracing::{info, warn};

/// Job stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ResolveCredentials,
    EnumerateProcesses,
    FetchRuns,
    BackfillDurations,
    Normalize,
    Export,
    Persist,
}

/// A failure tagged with the stage it happened in
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    pub source: AppError,
}

impl PipelineError {
    pub fn new(stage: Stage, source: AppError) -> Self {
        Self { stage, source }
    }

    pub fn error_code(&self) -> &str {
        self.source.error_code()
    }
}

/// Attach a stage to a fallible result
pub trait StageExt<T> {
    fn stage(self, stage: Stage) -> Result<T, PipelineError>;
}

impl<T> StageExt<T> for crate::error::Result<T> {
    fn stage(self, stage: Stage) -> Result<T, PipelineError> {
        self.map_err(|source| PipelineError::new(stage, source))
    }
}

/// What one job invocation did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub processes: usize,
    pub completed_runs: usize,
    pub unresolved_runs: usize,
    pub duplicates_dropped: usize,
    pub steps_fetched: usize,
    pub rows_written: usize,
    pub rows_persisted: Option<usize>,
    pub output_path: PathBuf,
}

/// The export job
pub struct ExportPipeline {
    config: Config,
}

impl ExportPipeline {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Resolve credentials, build the API client and run the whole job
    pub async fn run(&self, store: &dyn SecretStore) -> Result<ExportSummary, PipelineError> {
        let credentials = Credentials::resolve(&self.config.workspace, &self.config.vault, store)
            .stage(Stage::ResolveCredentials)?;
        let client = AutomationApiClient::new(&self.config.api, &credentials)
            .stage(Stage::ResolveCredentials)?;

        self.run_with_source(&client, store).await
    }

    /// Run the job against an already authenticated source
    pub async fn run_with_source(
        &self,
        source: &dyn RunSource,
        store: &dyn SecretStore,
    ) -> Result<ExportSummary, PipelineError> {
        let processes = source
            .list_processes()
            .await
            .stage(Stage::EnumerateProcesses)?;
        info!(processes = processes.len(), "Processes enumerated");

        let fetched = fetch_all_runs(source, &processes, self.config.api.max_concurrency).await?;

        let mut runs = fetched.runs;
        let mut duplicates_dropped = 0;
        if self.config.pipeline.dedupe_runs {
            let mut engine = DeduplicationEngine::new();
            runs = engine.dedupe(runs).stage(Stage::FetchRuns)?;
            duplicates_dropped = engine.dropped();
            if duplicates_dropped > 0 {
                warn!(duplicates = duplicates_dropped, "Duplicate runs dropped");
            }
        }

        let records = normalize_runs(runs).stage(Stage::Normalize)?;
        info!(records = records.len(), "Runs normalized");

        let report = CsvExporter::new(&self.config.export)
            .export(&records)
            .await
            .stage(Stage::Export)?;

        let rows_persisted = if self.config.database.enabled {
            let persisted = self.persist(records, store).await.stage(Stage::Persist)?;
            Some(persisted.inserted)
        } else {
            None
        };

        let summary = ExportSummary {
            processes: processes.len(),
            completed_runs: fetched.completed,
            unresolved_runs: fetched.unresolved,
            duplicates_dropped,
            steps_fetched: fetched.steps_fetched,
            rows_written: report.rows_written,
            rows_persisted,
            output_path: report.path,
        };

        info!(
            processes = summary.processes,
            completed_runs = summary.completed_runs,
            unresolved_runs = summary.unresolved_runs,
            rows_written = summary.rows_written,
            rows_persisted = ?summary.rows_persisted,
            output_path = %summary.output_path.display(),
            "Export finished"
        );

        Ok(summary)
    }

    async fn persist(
        &self,
        records: Vec<RunRecord>,
        store: &dyn SecretStore,
    ) -> crate::error::Result<PersistReport> {
        let secret = DatabaseSecret::resolve(&self.config.vault, store)?;
        let path = secret.database_path();
        let config = self.config.database.clone();
        info!(path = %path.display(), table = %config.table, "Persisting runs");

        // The connection lives and drops inside the blocking task
        tokio::task::spawn_blocking(move || {
            let sink = DatabaseSink::open(&path, &config)?;
            sink.persist(&records)
        })
        .await
        .map_err(|e| AppError::Database(format!("Persist task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::ResolveCredentials.to_string(), "resolve_credentials");
        assert_eq!(Stage::BackfillDurations.to_string(), "backfill_durations");
    }

    #[test]
    fn test_stage_tagging() {
        let result: crate::error::Result<()> = Err(AppError::Parse("bad timestamp".to_string()));
        let err = result.stage(Stage::Normalize).unwrap_err();

        assert_eq!(err.stage, Stage::Normalize);
        assert_eq!(err.error_code(), "PARSE_ERROR");
        assert_eq!(err.to_string(), "normalize failed: Parse error: bad timestamp");
    }
}
