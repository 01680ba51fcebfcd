pub mod backfill;
pub mod deduplication;
pub mod fetcher;
pub mod normalizer;
pub mod pipeline;

pub use backfill::{backfill_durations, sum_durations, Backfilled};
pub use deduplication::DeduplicationEngine;
pub use fetcher::{fetch_all_runs, FetchedRuns};
pub use normalizer::{normalize_run, normalize_runs, parse_api_timestamp};
pub use pipeline::{ExportPipeline, ExportSummary, PipelineError, Stage, StageExt};
