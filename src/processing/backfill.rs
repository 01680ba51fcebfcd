//! Duration backfill for unresolved runs.
//!
//! Unresolved runs arrive without a `duration`; it is synthesized as the sum
//! of the run's step durations.

use crate::error::{AppError, Result};
use crate::integrations::RunSource;
use crate::models::{ProcessRun, StepRun};
use futures::{StreamExt, TryStreamExt};
use serde_json::Number;
use tracing::debug;

/// Sum step durations. Integer inputs give an integer total, any fractional
/// input promotes the total to a float. No steps means zero.
pub fn sum_durations(steps: &[StepRun]) -> Result<Number> {
    let mut int_total: Option<i64> = Some(0);
    let mut float_total = 0.0_f64;

    for step in steps {
        let value = step.duration.as_f64().ok_or_else(|| {
            AppError::Parse(format!("Step duration {} is not representable", step.duration))
        })?;
        float_total += value;
        int_total = match (int_total, step.duration.as_i64()) {
            (Some(total), Some(n)) => total.checked_add(n),
            _ => None,
        };
    }

    match int_total {
        Some(total) => Ok(Number::from(total)),
        None => Number::from_f64(float_total).ok_or_else(|| {
            AppError::Parse(format!("Step duration total {} is not finite", float_total))
        }),
    }
}

/// Result of backfilling one batch of unresolved runs
#[derive(Debug, Default)]
pub struct Backfilled {
    pub runs: Vec<ProcessRun>,
    pub steps_fetched: usize,
}

/// Fetch the steps of every run and set its duration to their sum.
///
/// Step lookups run up to `concurrency` at a time; the output keeps input order.
pub async fn backfill_durations(
    source: &dyn RunSource,
    runs: Vec<ProcessRun>,
    concurrency: usize,
) -> Result<Backfilled> {
    let filled: Vec<(ProcessRun, usize)> = futures::stream::iter(runs)
        .map(move |mut run| async move {
            let run_id = run.id()?;
            let steps = source.list_step_runs(&run_id).await?;
            let duration = sum_durations(&steps)?;
            debug!(run_id = %run_id, steps = steps.len(), duration = %duration, "Duration backfilled");
            run.set_duration(duration);
            Ok::<_, AppError>((run, steps.len()))
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    let steps_fetched: usize = filled.iter().map(|(_, n)| n).sum();
    Ok(Backfilled {
        runs: filled.into_iter().map(|(run, _)| run).collect(),
        steps_fetched,
    })
}
