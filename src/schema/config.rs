//! Run configuration for search-based test generation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration for a test generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Population size and run budget.
    #[serde(default)]
    pub population: PopulationConfig,
    /// Genetic algorithm settings.
    #[serde(default)]
    pub genetic: GeneticAlgorithmConfig,
    /// Per-chromosome evaluation settings.
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Optional network fitness objective, evolved alongside coverage goals.
    #[serde(default)]
    pub fitness_mode: Option<FitnessMode>,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

/// Population and budget settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Number of chromosomes per generation.
    #[serde(default = "default_population_size")]
    pub size: usize,
    /// Maximum number of generations.
    #[serde(default = "default_max_generations")]
    pub max_generations: usize,
    /// Wall-clock budget for the whole run.
    #[serde(default)]
    pub time_budget_secs: Option<f64>,
    /// Generations without archive improvement after which an uncovered goal counts as stalled.
    #[serde(default)]
    pub goal_stagnation_limit: Option<usize>,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: default_population_size(),
            max_generations: default_max_generations(),
            time_budget_secs: None,
            goal_stagnation_limit: None,
        }
    }
}

fn default_population_size() -> usize {
    50
}
fn default_max_generations() -> usize {
    100
}

/// Genetic algorithm configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneticAlgorithmConfig {
    /// Parent selection method.
    #[serde(default)]
    pub selection: SelectionMethod,
    /// Probability that a parent pair is recombined (0.0-1.0).
    #[serde(default = "default_crossover_probability")]
    pub crossover_probability: f64,
    /// Probability that an offspring is mutated (0.0-1.0).
    #[serde(default = "default_mutation_probability")]
    pub mutation_probability: f64,
    /// Many-objective sorting strategy.
    #[serde(default)]
    pub sorting: SortingMethod,
}

impl Default for GeneticAlgorithmConfig {
    fn default() -> Self {
        Self {
            selection: SelectionMethod::default(),
            crossover_probability: default_crossover_probability(),
            mutation_probability: default_mutation_probability(),
            sorting: SortingMethod::default(),
        }
    }
}

fn default_crossover_probability() -> f64 {
    0.8
}
fn default_mutation_probability() -> f64 {
    1.0
}

/// Selection method over the ranked population.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "method")]
pub enum SelectionMethod {
    /// Tournament selection with configurable size.
    Tournament {
        #[serde(default = "default_tournament_size")]
        size: usize,
    },
    /// Linear ranking selection.
    RankBased,
    /// Fitness-proportionate selection on scalar fitness.
    RouletteWheel,
}

impl Default for SelectionMethod {
    fn default() -> Self {
        Self::RankBased
    }
}

fn default_tournament_size() -> usize {
    3
}

/// How fronts are built from the population.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SortingMethod {
    /// Repeated preference sorting until the population is exhausted.
    #[default]
    Preference,
    /// Preference front first, then fast non-dominated sorting on the rest.
    PreferenceThenDominance,
}

/// Per-chromosome evaluation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Timeout for a single evaluation in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl EvaluationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Network fitness signal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FitnessMode {
    /// Ticks survived before a termination condition fired.
    Survive,
    /// Score read from program state.
    Score,
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Population size must be at least 2")]
    PopulationTooSmall,
    #[error("Probability {name} must lie in [0, 1], got {value}")]
    InvalidProbability { name: &'static str, value: f64 },
    #[error("Evaluation timeout must be positive")]
    InvalidTimeout,
    #[error("Time budget must be positive")]
    InvalidTimeBudget,
    #[error("Tournament size must be at least 1")]
    InvalidTournamentSize,
    #[error("Goal set is empty but the run has a positive generation budget")]
    EmptyGoalSet,
    #[error("Invalid length bounds: {0}")]
    InvalidLengthBounds(String),
    #[error("Action space offers no actions")]
    EmptyActionSpace,
    #[error("Invalid network shape: {0}")]
    InvalidNetworkShape(String),
    #[error("Invalid speciation setting: {0}")]
    InvalidSpeciation(String),
}

/// Reject a probability outside [0, 1] (NaN included).
pub(crate) fn check_probability(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidProbability { name, value })
    }
}

impl SearchConfig {
    /// Validate run configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population.size < 2 {
            return Err(ConfigError::PopulationTooSmall);
        }
        if let Some(budget) = self.population.time_budget_secs
            && (budget.is_nan()
                || budget <= 0.0
                || Duration::try_from_secs_f64(budget).is_err())
        {
            return Err(ConfigError::InvalidTimeBudget);
        }
        check_probability("crossover_probability", self.genetic.crossover_probability)?;
        check_probability("mutation_probability", self.genetic.mutation_probability)?;
        if let SelectionMethod::Tournament { size: 0 } = self.genetic.selection {
            return Err(ConfigError::InvalidTournamentSize);
        }
        if self.evaluation.timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }

    /// Validate against the goal set reported by the oracle.
    ///
    /// An empty goal set is only meaningful when there is no generation budget or when a
    /// network fitness objective gives the search something else to optimise.
    pub fn validate_goals(&self, goal_count: usize) -> Result<(), ConfigError> {
        if goal_count == 0 && self.population.max_generations > 0 && self.fitness_mode.is_none() {
            return Err(ConfigError::EmptyGoalSet);
        }
        Ok(())
    }

    /// Wall-clock budget, if one is set and representable.
    pub fn time_budget(&self) -> Option<Duration> {
        self.population
            .time_budget_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(SearchConfig::default().validate().is_ok());
    }

    #[test]
    fn test_probability_out_of_range_rejected() {
        let mut config = SearchConfig::default();
        config.genetic.mutation_probability = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidProbability {
                name: "mutation_probability",
                ..
            })
        ));
        config.genetic.mutation_probability = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_small_population_rejected() {
        let mut config = SearchConfig::default();
        config.population.size = 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PopulationTooSmall)
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = SearchConfig::default();
        config.evaluation.timeout_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout)));
    }

    #[test]
    fn test_unrepresentable_time_budget_rejected() {
        let mut config = SearchConfig::default();
        config.population.time_budget_secs = Some(1e300);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeBudget)));
        assert_eq!(config.time_budget(), None);

        config.population.time_budget_secs = Some(f64::INFINITY);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeBudget)));

        config.population.time_budget_secs = Some(2.5);
        assert!(config.validate().is_ok());
        assert_eq!(config.time_budget(), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_empty_goal_set() {
        let mut config = SearchConfig::default();
        assert!(matches!(
            config.validate_goals(0),
            Err(ConfigError::EmptyGoalSet)
        ));
        config.fitness_mode = Some(FitnessMode::Score);
        assert!(config.validate_goals(0).is_ok());
        config.fitness_mode = None;
        config.population.max_generations = 0;
        assert!(config.validate_goals(0).is_ok());
    }

    #[test]
    fn test_serialization() {
        let config = SearchConfig {
            random_seed: Some(7),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SearchConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.population.size, config.population.size);
        assert_eq!(parsed.random_seed, Some(7));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let parsed: SearchConfig =
            serde_json::from_str(r#"{"population": {"size": 20}, "fitness_mode": "Survive"}"#)
                .unwrap();
        assert_eq!(parsed.population.size, 20);
        assert_eq!(parsed.population.max_generations, 100);
        assert_eq!(parsed.fitness_mode, Some(FitnessMode::Survive));
        assert_eq!(parsed.genetic.selection, SelectionMethod::RankBased);
    }
}
