//! Per-process run retrieval.

use super::backfill::backfill_durations;
use super::pipeline::{PipelineError, Stage, StageExt};
use crate::integrations::RunSource;
use crate::models::{Process, ProcessRun, RunState};
use futures::{StreamExt, TryStreamExt};
use tracing::{debug, info};

/// Every run of the workspace, in process enumeration order
#[derive(Debug, Default)]
pub struct FetchedRuns {
    pub runs: Vec<ProcessRun>,
    pub completed: usize,
    pub unresolved: usize,
    pub steps_fetched: usize,
}

impl FetchedRuns {
    fn append(&mut self, batch: ProcessBatch) {
        self.completed += batch.completed;
        self.unresolved += batch.unresolved;
        self.steps_fetched += batch.steps_fetched;
        self.runs.extend(batch.runs);
    }
}

#[derive(Debug)]
struct ProcessBatch {
    runs: Vec<ProcessRun>,
    completed: usize,
    unresolved: usize,
    steps_fetched: usize,
}

/// Fetch completed and unresolved runs of every process.
///
/// Processes are fetched up to `concurrency` at a time but the result is
/// collated in enumeration order; within a process completed runs come first.
pub async fn fetch_all_runs(
    source: &dyn RunSource,
    processes: &[Process],
    concurrency: usize,
) -> Result<FetchedRuns, PipelineError> {
    let batches: Vec<ProcessBatch> = futures::stream::iter(processes)
        .map(move |process| fetch_process_runs(source, process, concurrency))
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    let mut fetched = FetchedRuns::default();
    for batch in batches {
        fetched.append(batch);
    }

    info!(
        processes = processes.len(),
        completed = fetched.completed,
        unresolved = fetched.unresolved,
        steps_fetched = fetched.steps_fetched,
        "Runs fetched"
    );
    Ok(fetched)
}

async fn fetch_process_runs(
    source: &dyn RunSource,
    process: &Process,
    concurrency: usize,
) -> Result<ProcessBatch, PipelineError> {
    let mut runs = Vec::new();
    let mut counts = [0_usize; 2];
    let mut steps_fetched = 0;

    for (slot, state) in RunState::FETCH_ORDER.into_iter().enumerate() {
        let batch = source
            .list_process_runs(&process.id, state)
            .await
            .stage(Stage::FetchRuns)?;

        let batch = match state {
            RunState::Completed => batch,
            RunState::Unresolved => {
                let backfilled = backfill_durations(source, batch, concurrency)
                    .await
                    .stage(Stage::BackfillDurations)?;
                steps_fetched += backfilled.steps_fetched;
                backfilled.runs
            }
        };

        debug!(
            process_id = %process.id,
            process_name = %process.name,
            state = %state,
            count = batch.len(),
            "Process runs fetched"
        );
        counts[slot] = batch.len();
        runs.extend(batch);
    }

    Ok(ProcessBatch {
        runs,
        completed: counts[0],
        unresolved: counts[1],
        steps_fetched,
    })
}
