//! Process-run history export.
//!
//! Pulls every process run of an automation workspace, backfills the
//! duration of runs that are still unresolved, flattens the records and
//! writes them to a CSV file, optionally persisting them to SQLite too.

pub mod config;
pub mod error;
pub mod export;
pub mod integrations;
pub mod models;
pub mod processing;
pub mod vault;

pub use config::Config;
pub use error::{AppError, Result};
pub use processing::{ExportPipeline, ExportSummary, PipelineError, Stage};
