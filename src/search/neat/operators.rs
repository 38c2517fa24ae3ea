//! NEAT operator bundle implementing [`Variation`] over network genotypes.

use crate::schema::{ConfigError, GoalId, GroundTruth, NeatConfig, NetworkGenotype};
use crate::search::chromosome::{Executable, Fitter, GenotypeError, Variation};
use crate::search::fitness::CoverageReport;
use crate::search::recorder::Recorder;
use crate::search::refinement::{TrainingSet, WeightOptimizer};
use crate::search::random::Randomness;

use super::crossover::crossover;
use super::genotype::{self, compatibility_distance, first_hidden_id};
use super::innovation::InnovationTracker;
use super::mutation::mutate;
use super::phenotype::NetworkPolicy;

#[derive(Debug)]
struct Refinement {
    ground_truth: GroundTruth,
    goal: GoalId,
    optimizer: Box<dyn WeightOptimizer>,
}

/// Network shape, the run's innovation registry, and the optional recorder and
/// weight refinement hooks.
#[derive(Debug)]
pub struct NeatOperators {
    config: NeatConfig,
    tracker: InnovationTracker,
    recorder: Option<Recorder>,
    refinement: Option<Refinement>,
}

impl NeatOperators {
    pub fn new(config: NeatConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let tracker = InnovationTracker::new(first_hidden_id(&config));
        Ok(Self {
            config,
            tracker,
            recorder: None,
            refinement: None,
        })
    }

    /// Record the decisions of every policy this bundle creates.
    pub fn with_recorder(mut self, recorder: Recorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Refine initial weights toward the sessions that covered `goal`.
    pub fn with_refinement(
        mut self,
        ground_truth: GroundTruth,
        goal: GoalId,
        optimizer: impl WeightOptimizer + 'static,
    ) -> Self {
        self.refinement = Some(Refinement {
            ground_truth,
            goal,
            optimizer: Box::new(optimizer),
        });
        self
    }

    pub fn config(&self) -> &NeatConfig {
        &self.config
    }

    pub fn tracker(&self) -> &InnovationTracker {
        &self.tracker
    }

    pub fn recorder(&self) -> Option<&Recorder> {
        self.recorder.as_ref()
    }

    pub fn take_recorder(&mut self) -> Option<Recorder> {
        self.recorder.take()
    }

    /// Register an externally loaded genotype with the innovation registry.
    pub fn adopt(&mut self, genes: &NetworkGenotype) -> Result<(), GenotypeError> {
        genotype::validate(genes, &self.config)?;
        self.tracker.observe(genes);
        Ok(())
    }
}

impl Variation for NeatOperators {
    type Genes = NetworkGenotype;

    fn generate(&mut self, rng: &mut Randomness) -> NetworkGenotype {
        genotype::initial(&self.config, &mut self.tracker, rng)
    }

    fn mutate(&mut self, genes: &NetworkGenotype, rng: &mut Randomness) -> NetworkGenotype {
        mutate(genes, &self.config, &mut self.tracker, rng)
    }

    fn crossover(
        &mut self,
        a: &NetworkGenotype,
        b: &NetworkGenotype,
        fitter: Fitter,
        rng: &mut Randomness,
    ) -> (NetworkGenotype, NetworkGenotype) {
        (
            crossover(a, b, fitter, &self.config, rng),
            crossover(a, b, fitter, &self.config, rng),
        )
    }

    fn to_executable(&self, genes: &NetworkGenotype) -> Executable {
        let policy = NetworkPolicy::new(genes, &self.config);
        let policy = match &self.recorder {
            Some(recorder) => policy.with_recorder(recorder.sender()),
            None => policy,
        };
        Executable::Policy(policy)
    }

    fn validate(&self, genes: &NetworkGenotype) -> Result<(), GenotypeError> {
        genotype::validate(genes, &self.config)
    }

    fn length(&self, genes: &NetworkGenotype) -> usize {
        genes.connections.len()
    }

    fn distance(&self, a: &NetworkGenotype, b: &NetworkGenotype) -> f64 {
        compatibility_distance(a, b, &self.config.speciation)
    }

    fn warm_start(&mut self, genes: &mut NetworkGenotype, rng: &mut Randomness) {
        let Some(refinement) = &mut self.refinement else {
            return;
        };
        let data = TrainingSet::for_goal(&refinement.ground_truth, &refinement.goal, rng);
        if data.is_empty() {
            log::debug!("No recorded sessions cover {}, skipping refinement", refinement.goal);
            return;
        }
        let outcome = refinement.optimizer.refine(genes, &self.config, &data, rng);
        log::debug!(
            "Refined weights on {} examples: accuracy {:.3} -> {:.3} in {} steps",
            data.len(),
            outcome.initial_accuracy,
            outcome.final_accuracy,
            outcome.steps
        );
    }

    fn observe(&mut self, report: &CoverageReport) {
        if let Some(recorder) = &mut self.recorder {
            recorder.drain(&report.covered);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Recording;
    use crate::search::neat::test_support::config;
    use crate::search::refinement::HillClimbRefiner;
    use std::collections::{BTreeMap, BTreeSet};

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            NeatOperators::new(config(0, 2)),
            Err(ConfigError::InvalidNetworkShape(_))
        ));
    }

    #[test]
    fn test_policy_feeds_recorder() {
        let mut ops = NeatOperators::new(config(2, 3))
            .unwrap()
            .with_recorder(Recorder::new());
        let mut rng = Randomness::new(1);
        let genes = ops.generate(&mut rng);
        let Executable::Policy(mut policy) = ops.to_executable(&genes) else {
            panic!("expected a policy");
        };
        for tick in 0..4 {
            assert!(policy.act(&[tick as f64, 1.0]).is_some());
        }
        let report = CoverageReport {
            covered: BTreeSet::from([GoalId::from("g")]),
            ..CoverageReport::default()
        };
        ops.observe(&report);
        let recorder = ops.take_recorder().unwrap();
        let sessions = &recorder.ground_truth().sessions;
        assert_eq!(sessions.len(), 1);
        let session = sessions.values().next().unwrap();
        assert_eq!(session.sample_count(), 4);
        assert!(session.covers(&GoalId::from("g")));
    }

    #[test]
    fn test_warm_start_keeps_genotype_valid() {
        let mut actions = BTreeMap::new();
        actions.insert("out1".to_string(), vec![vec![1.0, 0.0]; 5]);
        let ground_truth = GroundTruth {
            sessions: BTreeMap::from([(
                "s".to_string(),
                Recording {
                    coverage: vec![GoalId::from("g")],
                    actions,
                },
            )]),
        };
        let mut ops = NeatOperators::new(config(2, 2)).unwrap().with_refinement(
            ground_truth,
            GoalId::from("g"),
            HillClimbRefiner::default(),
        );
        let mut rng = Randomness::new(2);
        let mut genes = ops.generate(&mut rng);
        let structure: Vec<u64> = genes.connections.iter().map(|c| c.innovation).collect();
        ops.warm_start(&mut genes, &mut rng);
        assert_eq!(ops.validate(&genes), Ok(()));
        let after: Vec<u64> = genes.connections.iter().map(|c| c.innovation).collect();
        assert_eq!(structure, after);
    }

    #[test]
    fn test_adopt_registers_innovations() {
        let mut ops = NeatOperators::new(config(2, 2)).unwrap();
        let mut other = NeatOperators::new(config(2, 2)).unwrap();
        let mut rng = Randomness::new(3);
        let mut genes = other.generate(&mut rng);
        for _ in 0..10 {
            genes = other.mutate(&genes, &mut rng);
        }
        ops.adopt(&genes).unwrap();
        assert!(ops.tracker().innovation_count() >= other.tracker().innovation_count());
    }
}
