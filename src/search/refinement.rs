//! Pre-evolution weight refinement against recorded ground truth.
//!
//! A genotype's weights are nudged so that its policy agrees more often with the
//! actions recorded in sessions that covered a target goal.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::schema::{GoalId, GroundTruth, NeatConfig, NetworkGenotype};

use super::neat::NetworkPolicy;
use super::random::Randomness;

/// One labelled state.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub features: Vec<f64>,
    pub label: String,
}

/// Shuffled examples drawn from the sessions that covered one goal.
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    examples: Vec<TrainingExample>,
}

impl TrainingSet {
    /// Collect every sample of every session tagged with `goal`, in session and
    /// label key order, then shuffle with the run's randomness.
    pub fn for_goal(ground_truth: &GroundTruth, goal: &GoalId, rng: &mut Randomness) -> Self {
        let mut examples: Vec<TrainingExample> = ground_truth
            .sessions_for(goal)
            .flat_map(|(_, recording)| {
                recording.actions.iter().flat_map(|(label, rows)| {
                    rows.iter().map(move |features| TrainingExample {
                        features: features.clone(),
                        label: label.clone(),
                    })
                })
            })
            .collect();
        rng.shuffle(&mut examples);
        Self { examples }
    }

    pub fn examples(&self) -> &[TrainingExample] {
        &self.examples
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Fraction of examples on which the genotype's policy picks the recorded label.
    pub fn accuracy(&self, genotype: &NetworkGenotype, config: &NeatConfig) -> f64 {
        if self.examples.is_empty() {
            return 0.0;
        }
        let mut policy = NetworkPolicy::new(genotype, config);
        let hits = self
            .examples
            .iter()
            .filter(|example| {
                policy.reset();
                policy
                    .choose_index(&example.features)
                    .and_then(|idx| config.outputs.get(idx))
                    .is_some_and(|binding| binding.label == example.label)
            })
            .count();
        hits as f64 / self.examples.len() as f64
    }
}

/// Result of one refinement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefinementOutcome {
    pub initial_accuracy: f64,
    pub final_accuracy: f64,
    pub steps: usize,
}

/// Local search over connection weights.
pub trait WeightOptimizer: Debug + Send {
    fn refine(
        &mut self,
        genotype: &mut NetworkGenotype,
        config: &NeatConfig,
        data: &TrainingSet,
        rng: &mut Randomness,
    ) -> RefinementOutcome;
}

/// Bounded hill climbing: perturb all weights, keep the perturbation only if
/// accuracy strictly improves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HillClimbRefiner {
    #[serde(default = "default_steps")]
    pub steps: usize,
    #[serde(default = "default_step_size")]
    pub step_size: f64,
}

fn default_steps() -> usize {
    50
}

fn default_step_size() -> f64 {
    0.2
}

impl Default for HillClimbRefiner {
    fn default() -> Self {
        Self {
            steps: default_steps(),
            step_size: default_step_size(),
        }
    }
}

impl WeightOptimizer for HillClimbRefiner {
    fn refine(
        &mut self,
        genotype: &mut NetworkGenotype,
        config: &NeatConfig,
        data: &TrainingSet,
        rng: &mut Randomness,
    ) -> RefinementOutcome {
        let initial_accuracy = data.accuracy(genotype, config);
        let mut best = initial_accuracy;
        let mut steps = 0;
        while steps < self.steps && best < 1.0 {
            steps += 1;
            let mut candidate = genotype.clone();
            for conn in &mut candidate.connections {
                conn.weight += rng.gaussian() * self.step_size;
            }
            let accuracy = data.accuracy(&candidate, config);
            if accuracy > best {
                best = accuracy;
                *genotype = candidate;
            }
        }
        RefinementOutcome {
            initial_accuracy,
            final_accuracy: best,
            steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Activation, ConnectionGene, NodeGene, NodeKind, Recording};
    use crate::search::neat::test_support::config;
    use std::collections::BTreeMap;

    fn ground_truth() -> GroundTruth {
        let mut sessions = BTreeMap::new();
        let mut actions = BTreeMap::new();
        actions.insert("out0".to_string(), (0..10).map(|i| vec![1.0, i as f64]).collect());
        actions.insert("out1".to_string(), (0..10).map(|i| vec![-1.0, i as f64]).collect());
        sessions.insert(
            "a".to_string(),
            Recording {
                coverage: vec![GoalId::from("g")],
                actions,
            },
        );
        sessions.insert(
            "b".to_string(),
            Recording {
                coverage: vec![GoalId::from("other")],
                actions: BTreeMap::from([("out0".to_string(), vec![vec![9.0, 9.0]])]),
            },
        );
        GroundTruth { sessions }
    }

    /// Two inputs, bias, two linear outputs, no connections yet.
    fn blank() -> NetworkGenotype {
        let node = |id, kind| NodeGene {
            id,
            kind,
            activation: Activation::Linear,
        };
        NetworkGenotype {
            nodes: vec![
                node(0, NodeKind::Input),
                node(1, NodeKind::Input),
                node(2, NodeKind::Bias),
                node(3, NodeKind::Output),
                node(4, NodeKind::Output),
            ],
            connections: vec![],
        }
    }

    #[test]
    fn test_for_goal_filters_sessions() {
        let mut rng = Randomness::new(1);
        let set = TrainingSet::for_goal(&ground_truth(), &GoalId::from("g"), &mut rng);
        assert_eq!(set.len(), 20);
        assert!(set.examples().iter().all(|e| e.features[0].abs() == 1.0));
        let none = TrainingSet::for_goal(&ground_truth(), &GoalId::from("missing"), &mut rng);
        assert!(none.is_empty());
    }

    #[test]
    fn test_shuffle_follows_seed() {
        let gt = ground_truth();
        let goal = GoalId::from("g");
        let a = TrainingSet::for_goal(&gt, &goal, &mut Randomness::new(7));
        let b = TrainingSet::for_goal(&gt, &goal, &mut Randomness::new(7));
        let c = TrainingSet::for_goal(&gt, &goal, &mut Randomness::new(8));
        assert_eq!(a.examples(), b.examples());
        assert_ne!(a.examples(), c.examples());
    }

    #[test]
    fn test_accuracy() {
        let cfg = config(2, 2);
        let mut rng = Randomness::new(2);
        let set = TrainingSet::for_goal(&ground_truth(), &GoalId::from("g"), &mut rng);
        let mut g = blank();
        // No connections: every output is 0, the first output wins every tie.
        assert!((set.accuracy(&g, &cfg) - 0.5).abs() < 1e-12);
        g.connections.push(ConnectionGene {
            innovation: 0,
            source: 0,
            target: 3,
            weight: 1.0,
            enabled: true,
            recurrent: false,
        });
        g.connections.push(ConnectionGene {
            innovation: 1,
            source: 0,
            target: 4,
            weight: -1.0,
            enabled: true,
            recurrent: false,
        });
        assert_eq!(set.accuracy(&g, &cfg), 1.0);
    }

    #[test]
    fn test_hill_climb_never_gets_worse() {
        let cfg = config(2, 2);
        let mut rng = Randomness::new(3);
        let set = TrainingSet::for_goal(&ground_truth(), &GoalId::from("g"), &mut rng);
        let mut g = blank();
        g.connections.push(ConnectionGene {
            innovation: 0,
            source: 0,
            target: 4,
            weight: 0.5,
            enabled: true,
            recurrent: false,
        });
        let mut refiner = HillClimbRefiner::default();
        let outcome = refiner.refine(&mut g, &cfg, &set, &mut rng);
        assert!(outcome.final_accuracy >= outcome.initial_accuracy);
        assert_eq!(set.accuracy(&g, &cfg), outcome.final_accuracy);
        assert!(outcome.steps <= refiner.steps);
    }
}
