use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use strum::{Display, EnumString};

/// Run states the listing endpoint is queried with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Completed,
    Unresolved,
}

impl RunState {
    /// Query order per process: completed first, then unresolved
    pub const FETCH_ORDER: [RunState; 2] = [RunState::Completed, RunState::Unresolved];
}

/// A process run exactly as the API returned it.
///
/// Key order is preserved so the export header follows the API's field order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessRun(Map<String, Value>);

impl ProcessRun {
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }

    /// Run id as a string; numeric ids are stringified
    pub fn id(&self) -> Result<String> {
        match self.0.get("id") {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            _ => Err(AppError::Parse("Process run has no 'id'".to_string())),
        }
    }

    pub fn state(&self) -> Option<&str> {
        self.0.get("state").and_then(Value::as_str)
    }

    pub fn duration(&self) -> Option<&Number> {
        match self.0.get("duration") {
            Some(Value::Number(n)) => Some(n),
            _ => None,
        }
    }

    /// Set (or replace) the run's duration, keeping the key's position if it exists
    pub fn set_duration(&mut self, duration: Number) {
        self.0.insert("duration".to_string(), Value::Number(duration));
    }
}

impl From<Map<String, Value>> for ProcessRun {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// One step execution inside a run; only its duration is used
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StepRun {
    pub duration: Number,
}
