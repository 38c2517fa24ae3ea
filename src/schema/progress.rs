//! Progress, history and summary types reported by a search run.

use serde::{Deserialize, Serialize};

use super::GoalId;

/// Progress update emitted once per generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchProgress {
    /// Generation just completed (0 = initial population).
    pub generation: usize,
    /// Generation budget.
    pub max_generations: usize,
    /// Evaluations performed so far.
    pub evaluations: u64,
    /// Goals covered by the archive.
    pub covered_goals: usize,
    /// Size of the goal set.
    pub total_goals: usize,
    /// Goals given up on after stalling.
    pub stalled_goals: usize,
    /// Best scalar fitness seen so far.
    pub best_fitness: f64,
    /// Mean scalar fitness of the current population.
    pub avg_fitness: f64,
    /// Number of species (0 for unspeciated runs).
    pub species: usize,
    /// Per-generation history for plotting.
    pub history: SearchHistory,
    pub phase: SearchPhase,
}

/// Per-generation history.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SearchHistory {
    pub covered_goals: Vec<usize>,
    pub best_fitness: Vec<f64>,
    pub avg_fitness: Vec<f64>,
    /// Mean pairwise genotype distance.
    pub diversity: Vec<f64>,
    pub species: Vec<usize>,
}

impl SearchHistory {
    pub fn push(
        &mut self,
        covered: usize,
        best: f64,
        avg: f64,
        diversity: f64,
        species: usize,
    ) {
        self.covered_goals.push(covered);
        self.best_fitness.push(best);
        self.avg_fitness.push(avg);
        self.diversity.push(diversity);
        self.species.push(species);
    }

    pub fn len(&self) -> usize {
        self.covered_goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.covered_goals.is_empty()
    }
}

/// Current phase of the run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SearchPhase {
    #[default]
    Initializing,
    Evaluating,
    Breeding,
    Complete,
    Stopped,
}

/// Summary statistics of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchStats {
    pub generations: usize,
    pub evaluations: u64,
    pub covered_goals: Vec<GoalId>,
    pub total_goals: usize,
    pub elapsed_seconds: f64,
    pub stop_reason: StopReason,
}

impl SearchStats {
    /// Fraction of goals covered (1.0 for an empty goal set).
    pub fn coverage(&self) -> f64 {
        if self.total_goals == 0 {
            1.0
        } else {
            self.covered_goals.len() as f64 / self.total_goals as f64
        }
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    AllGoalsCovered,
    MaxGenerations,
    TimeBudget,
    /// Every uncovered goal exceeded the per-goal stagnation limit.
    GoalsStalled,
    Cancelled,
    EmptyGoalSet,
}
