pub mod automation_api;
pub mod common;

pub use automation_api::AutomationApiClient;
pub use common::{Envelope, RetryPolicy};

use crate::error::Result;
use crate::models::{Process, ProcessRun, RunState, StepRun};
use async_trait::async_trait;

/// Read-only view of a workspace's processes, runs and steps
#[async_trait]
pub trait RunSource: Send + Sync {
    /// List every process in the workspace
    async fn list_processes(&self) -> Result<Vec<Process>>;

    /// List the runs of one process in the given state
    async fn list_process_runs(&self, process_id: &str, state: RunState) -> Result<Vec<ProcessRun>>;

    /// List the steps executed by one run
    async fn list_step_runs(&self, process_run_id: &str) -> Result<Vec<StepRun>>;
}
