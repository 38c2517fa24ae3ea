//! Coverage oracle contract and objective values.
//!
//! The oracle is the only component that touches the program under test. It reports
//! which goals an executable reached; this module turns that report into one
//! normalized distance per goal (0 = covered, 1 = worst), plus an optional network
//! fitness objective that is maximised.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::schema::{FitnessMode, GoalId};

use super::chromosome::Executable;

/// The external execution and coverage oracle.
///
/// Evaluations are strictly sequential: the engine never has two executables in
/// flight against the same oracle.
pub trait CoverageOracle {
    /// The full goal set of the program under test.
    fn goals(&self) -> Vec<GoalId>;

    /// Run an executable against the program and report reached goals.
    ///
    /// Long-running oracles should poll `budget.should_stop()` and return early with
    /// `timed_out` set.
    fn evaluate(
        &mut self,
        executable: &mut Executable,
        budget: &EvaluationBudget,
    ) -> Result<CoverageReport, OracleError>;
}

/// Time allowance and cancellation signal for one evaluation.
#[derive(Debug, Clone)]
pub struct EvaluationBudget {
    pub timeout: Duration,
    pub deadline: Instant,
    cancelled: Arc<AtomicBool>,
}

impl EvaluationBudget {
    /// Start a budget now.
    pub fn start(timeout: Duration, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            timeout,
            deadline: Instant::now() + timeout,
            cancelled,
        }
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Whether a cooperative oracle should abandon the evaluation.
    pub fn should_stop(&self) -> bool {
        self.expired() || self.is_cancelled()
    }
}

/// Result of one oracle evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CoverageReport {
    /// Goals reached during the run.
    pub covered: BTreeSet<GoalId>,
    /// Goals known to the oracle.
    pub total: BTreeSet<GoalId>,
    pub timed_out: bool,
    /// Raw non-negative distance hints for uncovered goals (e.g. branch distance).
    #[serde(default)]
    pub distances: BTreeMap<GoalId, f64>,
    /// Ticks the program ran before a termination condition fired.
    #[serde(default)]
    pub survived_ticks: u64,
    /// Score read from program state at the end of the run.
    #[serde(default)]
    pub score: f64,
}

impl CoverageReport {
    /// A report that reached nothing.
    pub fn timed_out(total: BTreeSet<GoalId>) -> Self {
        Self {
            total,
            timed_out: true,
            ..Default::default()
        }
    }
}

/// Oracle failures. All are recovered by the engine as worst-case fitness.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("Evaluation timed out after {0:?}")]
    Timeout(Duration),
    #[error("Program under test crashed: {0}")]
    Crashed(String),
    #[error("Evaluation cancelled")]
    Cancelled,
}

/// Map a raw distance hint into [0, 1).
pub fn normalize_distance(raw: f64) -> f64 {
    if raw.is_nan() || raw < 0.0 {
        return 1.0;
    }
    if raw.is_infinite() {
        return 1.0;
    }
    raw / (raw + 1.0)
}

/// Objective vector of one chromosome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessValue {
    /// Normalized distance per goal, aligned with the engine's goal order.
    pub distances: Vec<f64>,
    /// Network fitness (maximised), present when a fitness mode is configured.
    pub network: Option<f64>,
    pub timed_out: bool,
}

impl FitnessValue {
    /// Worst value for every objective.
    pub fn worst(goal_count: usize, mode: Option<FitnessMode>) -> Self {
        Self {
            distances: vec![1.0; goal_count],
            network: mode.map(|_| 0.0),
            timed_out: true,
        }
    }

    /// Derive objective values from an oracle report.
    pub fn from_report(goals: &[GoalId], report: &CoverageReport, mode: Option<FitnessMode>) -> Self {
        if report.timed_out {
            return Self::worst(goals.len(), mode);
        }
        let distances = goals
            .iter()
            .map(|goal| {
                if report.covered.contains(goal) {
                    0.0
                } else {
                    report
                        .distances
                        .get(goal)
                        .map_or(1.0, |&raw| normalize_distance(raw))
                }
            })
            .collect();
        let network = mode.map(|mode| match mode {
            FitnessMode::Survive => report.survived_ticks as f64,
            FitnessMode::Score => report.score,
        });
        Self {
            distances,
            network,
            timed_out: false,
        }
    }

    pub fn distance(&self, goal: usize) -> f64 {
        self.distances.get(goal).copied().unwrap_or(1.0)
    }

    pub fn covers(&self, goal: usize) -> bool {
        self.distance(goal) == 0.0
    }

    pub fn covered_count(&self) -> usize {
        self.distances.iter().filter(|&&d| d == 0.0).count()
    }

    pub fn distance_sum(&self) -> f64 {
        self.distances.iter().sum()
    }

    /// Single number for roulette selection, fitness sharing and "best" reporting.
    ///
    /// Each goal contributes `1 - distance`; the network objective is added as is.
    pub fn scalar(&self) -> f64 {
        let coverage: f64 = self.distances.iter().map(|d| 1.0 - d).sum();
        coverage + self.network.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goals() -> Vec<GoalId> {
        vec!["a".into(), "b".into(), "c".into()]
    }

    #[test]
    fn test_normalization() {
        assert_eq!(normalize_distance(0.0), 0.0);
        assert_eq!(normalize_distance(1.0), 0.5);
        assert_eq!(normalize_distance(3.0), 0.75);
        assert_eq!(normalize_distance(f64::NAN), 1.0);
        assert_eq!(normalize_distance(f64::INFINITY), 1.0);
    }

    #[test]
    fn test_from_report() {
        let report = CoverageReport {
            covered: ["a".into()].into_iter().collect(),
            total: goals().into_iter().collect(),
            distances: [(GoalId::from("b"), 1.0)].into_iter().collect(),
            ..Default::default()
        };
        let fitness = FitnessValue::from_report(&goals(), &report, None);
        assert_eq!(fitness.distances, vec![0.0, 0.5, 1.0]);
        assert_eq!(fitness.covered_count(), 1);
        assert!(fitness.covers(0));
        assert_eq!(fitness.network, None);
        assert!((fitness.scalar() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_timeout_is_worst() {
        let report = CoverageReport {
            covered: ["a".into()].into_iter().collect(),
            timed_out: true,
            survived_ticks: 100,
            ..Default::default()
        };
        let fitness = FitnessValue::from_report(&goals(), &report, Some(FitnessMode::Survive));
        assert_eq!(fitness, FitnessValue::worst(3, Some(FitnessMode::Survive)));
        assert_eq!(fitness.scalar(), 0.0);
    }

    #[test]
    fn test_network_modes() {
        let report = CoverageReport {
            survived_ticks: 42,
            score: 7.5,
            ..Default::default()
        };
        let survive = FitnessValue::from_report(&[], &report, Some(FitnessMode::Survive));
        let score = FitnessValue::from_report(&[], &report, Some(FitnessMode::Score));
        assert_eq!(survive.network, Some(42.0));
        assert_eq!(score.network, Some(7.5));
    }

    #[test]
    fn test_budget_cancellation() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let budget = EvaluationBudget::start(Duration::from_secs(60), Arc::clone(&cancelled));
        assert!(!budget.should_stop());
        cancelled.store(true, Ordering::Relaxed);
        assert!(budget.should_stop());
    }
}
