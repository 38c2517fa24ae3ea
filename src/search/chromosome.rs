//! Chromosome container and the capability set the engine evolves through.

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::schema::PrimitiveAction;

use super::fitness::{CoverageReport, FitnessValue};
use super::neat::NetworkPolicy;
use super::random::Randomness;

pub type ChromosomeId = u64;

/// A candidate test: genes plus bookkeeping.
///
/// The fitness cache is cleared whenever the genes are borrowed mutably.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chromosome<G> {
    pub id: ChromosomeId,
    genes: G,
    fitness: Option<FitnessValue>,
    /// Generation this chromosome was created.
    pub generation: usize,
    /// Parent IDs (for genealogy).
    pub parents: Vec<ChromosomeId>,
}

impl<G> Chromosome<G> {
    pub fn new(id: ChromosomeId, genes: G, generation: usize, parents: Vec<ChromosomeId>) -> Self {
        Self {
            id,
            genes,
            fitness: None,
            generation,
            parents,
        }
    }

    pub fn genes(&self) -> &G {
        &self.genes
    }

    /// Mutable access to the genes. Invalidates the cached fitness.
    pub fn genes_mut(&mut self) -> &mut G {
        self.fitness = None;
        &mut self.genes
    }

    pub fn into_genes(self) -> G {
        self.genes
    }

    pub fn fitness(&self) -> Option<&FitnessValue> {
        self.fitness.as_ref()
    }

    pub fn set_fitness(&mut self, fitness: FitnessValue) {
        self.fitness = Some(fitness);
    }

    pub fn is_evaluated(&self) -> bool {
        self.fitness.is_some()
    }

    /// Scalar fitness, 0 when unevaluated.
    pub fn scalar_fitness(&self) -> f64 {
        self.fitness.as_ref().map_or(0.0, FitnessValue::scalar)
    }
}

/// What the oracle runs.
#[derive(Debug)]
pub enum Executable {
    /// Fixed list of primitive actions.
    Actions(Vec<PrimitiveAction>),
    /// Per-tick state to action controller.
    Policy(NetworkPolicy),
}

impl Executable {
    /// Number of primitive actions, 0 for policies.
    pub fn action_count(&self) -> usize {
        match self {
            Executable::Actions(actions) => actions.len(),
            Executable::Policy(_) => 0,
        }
    }
}

/// Which of two parents is fitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fitter {
    First,
    Second,
    Tie,
}

impl Fitter {
    pub fn from_scalars(a: f64, b: f64) -> Self {
        match a.total_cmp(&b) {
            std::cmp::Ordering::Greater => Fitter::First,
            std::cmp::Ordering::Less => Fitter::Second,
            std::cmp::Ordering::Equal => Fitter::Tie,
        }
    }
}

/// Genotype invariant violations. These indicate an operator bug and abort the run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenotypeError {
    #[error("Connection {innovation} references missing node {node}")]
    DanglingConnection { innovation: u64, node: u32 },
    #[error("Duplicate innovation number {0}")]
    DuplicateInnovation(u64),
    #[error("Duplicate connection between {from} and {to}")]
    DuplicateConnection { from: u32, to: u32 },
    #[error("Duplicate node id {0}")]
    DuplicateNode(u32),
    #[error("Connection {0} targets an input or bias node")]
    InvalidTarget(u64),
    #[error("Non-recurrent connections form a cycle")]
    Cycle,
    #[error("Genes are not sorted by id")]
    Unsorted,
    #[error("Expected {expected} {kind} nodes, found {found}")]
    NodeCount {
        kind: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Sequence length {len} outside [{min}, {max}]")]
    LengthOutOfBounds { len: usize, min: usize, max: usize },
    #[error("Gene {0} is not in the action space")]
    InvalidGene(usize),
}

/// Uniform capability set over a chromosome variant.
///
/// All operators are pure at the genotype level: inputs are borrowed and the
/// results are fresh genotypes. `&mut self` is for shared run state such as the
/// innovation registry.
pub trait Variation {
    type Genes: Clone + Debug + Send + Sync;

    /// Random genotype for the initial population.
    fn generate(&mut self, rng: &mut Randomness) -> Self::Genes;

    /// A mutated copy of `genes`.
    fn mutate(&mut self, genes: &Self::Genes, rng: &mut Randomness) -> Self::Genes;

    /// Two children recombined from `a` and `b`.
    fn crossover(
        &mut self,
        a: &Self::Genes,
        b: &Self::Genes,
        fitter: Fitter,
        rng: &mut Randomness,
    ) -> (Self::Genes, Self::Genes);

    /// What the oracle should run for these genes.
    fn to_executable(&self, genes: &Self::Genes) -> Executable;

    fn validate(&self, genes: &Self::Genes) -> Result<(), GenotypeError>;

    /// Size used for archive tie-breaking (shorter is better).
    fn length(&self, genes: &Self::Genes) -> usize;

    /// Genotype dissimilarity for diversity reporting.
    fn distance(&self, a: &Self::Genes, b: &Self::Genes) -> f64;

    /// Adjust an initial genotype before evolution starts.
    fn warm_start(&mut self, _genes: &mut Self::Genes, _rng: &mut Randomness) {}

    /// Called after every evaluation with the oracle's report.
    fn observe(&mut self, _report: &CoverageReport) {}
}

/// Shared chromosome id counter.
#[derive(Debug, Clone, Default)]
pub struct IdSource(Arc<AtomicU64>);

impl IdSource {
    pub fn next(&self) -> ChromosomeId {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutable_access_clears_fitness() {
        let mut c = Chromosome::new(0, vec![1, 2, 3], 0, vec![]);
        c.set_fitness(FitnessValue {
            distances: vec![0.0],
            network: None,
            timed_out: false,
        });
        assert!(c.is_evaluated());
        assert_eq!(c.genes().len(), 3);
        assert!(c.is_evaluated());
        c.genes_mut().push(4);
        assert!(!c.is_evaluated());
    }

    #[test]
    fn test_fitter() {
        assert_eq!(Fitter::from_scalars(2.0, 1.0), Fitter::First);
        assert_eq!(Fitter::from_scalars(1.0, 2.0), Fitter::Second);
        assert_eq!(Fitter::from_scalars(1.0, 1.0), Fitter::Tie);
    }

    #[test]
    fn test_id_source_shared() {
        let ids = IdSource::default();
        let clone = ids.clone();
        assert_eq!(ids.next(), 0);
        assert_eq!(clone.next(), 1);
    }
}
