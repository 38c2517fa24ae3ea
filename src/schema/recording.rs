//! Ground-truth recordings of (state features, chosen action) pairs.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::GoalId;

/// Errors from reading or writing JSON artifacts.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Loaded genotype is invalid: {0}")]
    InvalidGenotype(String),
}

/// One recording session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    /// Goals covered while this session was recorded.
    #[serde(default)]
    pub coverage: Vec<GoalId>,
    /// Feature vectors observed per action label.
    #[serde(default)]
    pub actions: BTreeMap<String, Vec<Vec<f64>>>,
}

impl Recording {
    pub fn covers(&self, goal: &GoalId) -> bool {
        self.coverage.contains(goal)
    }

    pub fn sample_count(&self) -> usize {
        self.actions.values().map(Vec::len).sum()
    }
}

/// All recording sessions, keyed by session id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroundTruth {
    pub sessions: BTreeMap<String, Recording>,
}

impl GroundTruth {
    pub fn from_json(json: &str) -> Result<Self, PersistenceError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Sessions whose coverage tags include `goal`, in key order.
    pub fn sessions_for<'a>(
        &'a self,
        goal: &'a GoalId,
    ) -> impl Iterator<Item = (&'a String, &'a Recording)> + 'a {
        self.sessions.iter().filter(move |(_, r)| r.covers(goal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "s1": {"coverage": ["a", "b"], "actions": {"left": [[0.1, 0.2]], "right": [[0.3, 0.4], [0.5, 0.6]]}},
        "s2": {"coverage": ["c"], "actions": {"left": [[1.0, 1.0]]}}
    }"#;

    #[test]
    fn test_parse_ground_truth() {
        let truth = GroundTruth::from_json(SAMPLE).unwrap();
        assert_eq!(truth.sessions.len(), 2);
        assert_eq!(truth.sessions["s1"].sample_count(), 3);
        let goal = GoalId::from("a");
        let matching: Vec<_> = truth.sessions_for(&goal).map(|(k, _)| k.as_str()).collect();
        assert_eq!(matching, vec!["s1"]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("truth.json");
        let truth = GroundTruth::from_json(SAMPLE).unwrap();
        truth.save(&path).unwrap();
        let loaded = GroundTruth::load(&path).unwrap();
        assert_eq!(loaded, truth);
    }

    #[test]
    fn test_malformed_json_is_error() {
        assert!(matches!(
            GroundTruth::from_json("{not json"),
            Err(PersistenceError::Json(_))
        ));
    }
}
