//! Collects (state features, chosen action) samples from running network policies.

use std::collections::BTreeSet;
use std::sync::mpsc::{self, Receiver, Sender};

use serde::{Deserialize, Serialize};

use crate::schema::{GoalId, GroundTruth, Recording};

/// One decision made by a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub features: Vec<f64>,
    pub label: String,
}

/// Receiving end of the sample channel plus the sessions recorded so far.
///
/// Policies get a cloned [`Sender`]; after each evaluation the engine drains the
/// channel into one session tagged with the goals that evaluation covered.
#[derive(Debug)]
pub struct Recorder {
    sender: Sender<Sample>,
    receiver: Receiver<Sample>,
    ground_truth: GroundTruth,
    sessions: usize,
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            ground_truth: GroundTruth::default(),
            sessions: 0,
        }
    }

    pub fn sender(&self) -> Sender<Sample> {
        self.sender.clone()
    }

    /// Move pending samples into a new session. Returns the number of samples moved.
    pub fn drain(&mut self, covered: &BTreeSet<GoalId>) -> usize {
        let samples: Vec<Sample> = self.receiver.try_iter().collect();
        if samples.is_empty() {
            return 0;
        }
        let count = samples.len();
        let mut recording = Recording {
            coverage: covered.iter().cloned().collect(),
            ..Recording::default()
        };
        for sample in samples {
            recording
                .actions
                .entry(sample.label)
                .or_default()
                .push(sample.features);
        }
        let id = format!("session-{:06}", self.sessions);
        self.sessions += 1;
        self.ground_truth.sessions.insert(id, recording);
        log::trace!("Recorded {count} samples");
        count
    }

    pub fn ground_truth(&self) -> &GroundTruth {
        &self.ground_truth
    }

    pub fn into_ground_truth(self) -> GroundTruth {
        self.ground_truth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_groups_by_label() {
        let mut recorder = Recorder::new();
        let tx = recorder.sender();
        for (features, label) in [(vec![1.0], "left"), (vec![2.0], "right"), (vec![3.0], "left")] {
            tx.send(Sample {
                features,
                label: label.to_string(),
            })
            .unwrap();
        }
        let covered: BTreeSet<GoalId> = [GoalId::from("g1")].into();
        assert_eq!(recorder.drain(&covered), 3);

        let session = &recorder.ground_truth().sessions["session-000000"];
        assert_eq!(session.coverage, vec![GoalId::from("g1")]);
        assert_eq!(session.actions["left"], vec![vec![1.0], vec![3.0]]);
        assert_eq!(session.sample_count(), 3);
    }

    #[test]
    fn test_empty_drain_adds_no_session() {
        let mut recorder = Recorder::new();
        assert_eq!(recorder.drain(&BTreeSet::new()), 0);
        assert!(recorder.into_ground_truth().sessions.is_empty());
    }
}
