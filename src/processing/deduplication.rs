use crate::error::Result;
use crate::models::ProcessRun;
use std::collections::HashSet;

/// Drops repeated runs when listings overlap
#[derive(Debug, Default)]
pub struct DeduplicationEngine {
    seen: HashSet<String>,
    dropped: usize,
}

impl DeduplicationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a run id was already accepted; records it when it was not
    pub fn is_duplicate(&mut self, run: &ProcessRun) -> Result<bool> {
        let id = run.id()?;
        if self.seen.insert(id) {
            Ok(false)
        } else {
            self.dropped += 1;
            Ok(true)
        }
    }

    /// Keep the first occurrence of each run id, in input order
    pub fn dedupe(&mut self, runs: Vec<ProcessRun>) -> Result<Vec<ProcessRun>> {
        let mut kept = Vec::with_capacity(runs.len());
        for run in runs {
            if self.is_duplicate(&run)? {
                tracing::debug!(run_id = %run.id()?, "Dropping duplicate run");
                continue;
            }
            kept.push(run);
        }
        Ok(kept)
    }

    /// Number of runs dropped so far
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(id: &str, state: &str) -> ProcessRun {
        serde_json::from_value(json!({"id": id, "state": state})).unwrap()
    }

    #[test]
    fn test_first_occurrence_wins() {
        let mut engine = DeduplicationEngine::new();
        let kept = engine
            .dedupe(vec![
                run("r-1", "completed"),
                run("r-2", "completed"),
                run("r-1", "unresolved"),
            ])
            .unwrap();

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].state(), Some("completed"));
        assert_eq!(kept[1].id().unwrap(), "r-2");
        assert_eq!(engine.dropped(), 1);
    }

    #[test]
    fn test_run_without_id_is_rejected() {
        let mut engine = DeduplicationEngine::new();
        let runs = vec![serde_json::from_value(json!({"state": "completed"})).unwrap()];
        assert!(engine.dedupe(runs).is_err());
    }
}
