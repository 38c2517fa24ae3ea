//! Network genotype records and NEAT configuration.
//!
//! The gene records here are the persistence format for evolved controllers: nodes
//! by id, connections by innovation number. Operators live in `search::neat`.

use serde::{Deserialize, Serialize};

use super::config::check_probability;
use super::{ConfigError, PrimitiveAction};

/// Role of a node in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Input,
    Bias,
    Hidden,
    Output,
}

/// Activation function tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Activation {
    /// Logistic sigmoid with steepness 4.9.
    #[default]
    Sigmoid,
    Tanh,
    Relu,
    Linear,
}

impl Activation {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Sigmoid => 1.0 / (1.0 + (-4.9 * x).exp()),
            Activation::Tanh => x.tanh(),
            Activation::Relu => x.max(0.0),
            Activation::Linear => x,
        }
    }
}

/// A node gene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeGene {
    pub id: u32,
    pub kind: NodeKind,
    pub activation: Activation,
}

/// A connection gene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectionGene {
    /// Historical marker shared by all connections with the same (source, target).
    pub innovation: u64,
    pub source: u32,
    pub target: u32,
    pub weight: f64,
    pub enabled: bool,
    /// Whether this connection closes a cycle and reads the previous tick's activation.
    #[serde(default)]
    pub recurrent: bool,
}

/// Complete network genotype: nodes sorted by id, connections sorted by innovation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkGenotype {
    pub nodes: Vec<NodeGene>,
    pub connections: Vec<ConnectionGene>,
}

/// Maps one network output to the primitive action it triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputBinding {
    /// Label used in recordings.
    pub label: String,
    pub action: PrimitiveAction,
}

/// How initial genotypes are wired.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InitialConnectivity {
    /// Each input connects to each output with probability `input_rate`.
    Sparse {
        #[serde(default = "default_input_rate")]
        input_rate: f64,
    },
    FullyConnected,
}

impl Default for InitialConnectivity {
    fn default() -> Self {
        Self::Sparse {
            input_rate: default_input_rate(),
        }
    }
}

fn default_input_rate() -> f64 {
    0.3
}

/// NEAT configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeatConfig {
    /// Number of state features fed to the network each tick.
    pub inputs: usize,
    /// Output bindings; one output node per binding.
    pub outputs: Vec<OutputBinding>,
    #[serde(default)]
    pub hidden_activation: Activation,
    #[serde(default)]
    pub output_activation: Activation,
    /// Whether add-connection may close cycles.
    #[serde(default)]
    pub allow_recurrent: bool,
    #[serde(default)]
    pub connectivity: InitialConnectivity,
    /// Initial and replacement weights are drawn from [-range, range].
    #[serde(default = "default_weight_range")]
    pub weight_range: f64,
    #[serde(default)]
    pub mutation: NeatMutationConfig,
    /// Probability that a matching gene takes the mean of both parents' weights.
    #[serde(default = "default_weight_average_rate")]
    pub crossover_weight_average_rate: f64,
    #[serde(default)]
    pub speciation: SpeciationConfig,
}

fn default_weight_range() -> f64 {
    1.0
}
fn default_weight_average_rate() -> f64 {
    0.4
}

/// NEAT mutation probabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeatMutationConfig {
    #[serde(default = "default_add_node")]
    pub add_node: f64,
    #[serde(default = "default_add_connection")]
    pub add_connection: f64,
    #[serde(default = "default_add_connection_tries")]
    pub add_connection_tries: usize,
    /// Probability that add-connection looks for a recurrent edge (if allowed).
    #[serde(default = "default_recurrent_connection")]
    pub recurrent_connection: f64,
    #[serde(default = "default_mutate_weights")]
    pub mutate_weights: f64,
    /// Per-connection probability of a uniform re-roll instead of Gaussian jitter.
    #[serde(default = "default_weight_replace")]
    pub weight_replace: f64,
    /// Standard deviation of the Gaussian jitter.
    #[serde(default = "default_perturbation_power")]
    pub perturbation_power: f64,
    #[serde(default = "default_toggle_enable")]
    pub toggle_enable: f64,
    #[serde(default = "default_reenable")]
    pub reenable: f64,
}

impl Default for NeatMutationConfig {
    fn default() -> Self {
        Self {
            add_node: default_add_node(),
            add_connection: default_add_connection(),
            add_connection_tries: default_add_connection_tries(),
            recurrent_connection: default_recurrent_connection(),
            mutate_weights: default_mutate_weights(),
            weight_replace: default_weight_replace(),
            perturbation_power: default_perturbation_power(),
            toggle_enable: default_toggle_enable(),
            reenable: default_reenable(),
        }
    }
}

fn default_add_node() -> f64 {
    0.03
}
fn default_add_connection() -> f64 {
    0.05
}
fn default_add_connection_tries() -> usize {
    50
}
fn default_recurrent_connection() -> f64 {
    0.1
}
fn default_mutate_weights() -> f64 {
    0.6
}
fn default_weight_replace() -> f64 {
    0.1
}
fn default_perturbation_power() -> f64 {
    0.5
}
fn default_toggle_enable() -> f64 {
    0.1
}
fn default_reenable() -> f64 {
    0.03
}

/// Speciation and speciated reproduction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciationConfig {
    /// Initial compatibility threshold.
    #[serde(default = "default_threshold")]
    pub compatibility_threshold: f64,
    /// Number of species the threshold adjustment aims for.
    #[serde(default = "default_target_species")]
    pub target_species: usize,
    #[serde(default = "default_threshold_step")]
    pub threshold_step: f64,
    #[serde(default = "default_min_threshold")]
    pub min_threshold: f64,
    #[serde(default = "default_excess_coefficient")]
    pub excess_coefficient: f64,
    #[serde(default = "default_disjoint_coefficient")]
    pub disjoint_coefficient: f64,
    #[serde(default = "default_weight_coefficient")]
    pub weight_coefficient: f64,
    /// Generations without improvement before a species loses its quota.
    #[serde(default = "default_species_stagnation")]
    pub stagnation_limit: usize,
    /// Species at least this large clone their champion into the next generation.
    #[serde(default = "default_champion_min_size")]
    pub champion_min_species_size: usize,
    /// Fraction of each species (best first) allowed to reproduce.
    #[serde(default = "default_parents_per_species")]
    pub parents_per_species: f64,
    #[serde(default = "default_mutation_without_crossover")]
    pub mutation_without_crossover: f64,
    #[serde(default = "default_interspecies_mating")]
    pub interspecies_mating: f64,
    /// Species up to this age count as young.
    #[serde(default = "default_young_age")]
    pub young_age: usize,
    /// Fitness multiplier applied to young species before sharing.
    #[serde(default = "default_young_bonus")]
    pub young_bonus: f64,
}

impl Default for SpeciationConfig {
    fn default() -> Self {
        Self {
            compatibility_threshold: default_threshold(),
            target_species: default_target_species(),
            threshold_step: default_threshold_step(),
            min_threshold: default_min_threshold(),
            excess_coefficient: default_excess_coefficient(),
            disjoint_coefficient: default_disjoint_coefficient(),
            weight_coefficient: default_weight_coefficient(),
            stagnation_limit: default_species_stagnation(),
            champion_min_species_size: default_champion_min_size(),
            parents_per_species: default_parents_per_species(),
            mutation_without_crossover: default_mutation_without_crossover(),
            interspecies_mating: default_interspecies_mating(),
            young_age: default_young_age(),
            young_bonus: default_young_bonus(),
        }
    }
}

fn default_threshold() -> f64 {
    3.0
}
fn default_target_species() -> usize {
    5
}
fn default_threshold_step() -> f64 {
    0.3
}
fn default_min_threshold() -> f64 {
    0.3
}
fn default_excess_coefficient() -> f64 {
    1.0
}
fn default_disjoint_coefficient() -> f64 {
    1.0
}
fn default_weight_coefficient() -> f64 {
    0.5
}
fn default_species_stagnation() -> usize {
    15
}
fn default_champion_min_size() -> usize {
    5
}
fn default_parents_per_species() -> f64 {
    0.2
}
fn default_mutation_without_crossover() -> f64 {
    0.25
}
fn default_interspecies_mating() -> f64 {
    0.001
}
fn default_young_age() -> usize {
    10
}
fn default_young_bonus() -> f64 {
    1.0
}

impl NeatConfig {
    /// A config with default operator settings for the given network shape.
    pub fn new(inputs: usize, outputs: Vec<OutputBinding>) -> Self {
        Self {
            inputs,
            outputs,
            hidden_activation: Activation::default(),
            output_activation: Activation::default(),
            allow_recurrent: false,
            connectivity: InitialConnectivity::default(),
            weight_range: default_weight_range(),
            mutation: NeatMutationConfig::default(),
            crossover_weight_average_rate: default_weight_average_rate(),
            speciation: SpeciationConfig::default(),
        }
    }

    /// Validate network shape, probabilities and speciation settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inputs == 0 {
            return Err(ConfigError::InvalidNetworkShape(
                "at least one input is required".to_string(),
            ));
        }
        if self.outputs.is_empty() {
            return Err(ConfigError::InvalidNetworkShape(
                "at least one output binding is required".to_string(),
            ));
        }
        if self.weight_range.is_nan() || self.weight_range <= 0.0 {
            return Err(ConfigError::InvalidNetworkShape(format!(
                "weight_range ({}) must be positive",
                self.weight_range
            )));
        }
        if let InitialConnectivity::Sparse { input_rate } = self.connectivity {
            check_probability("input_rate", input_rate)?;
        }

        let m = &self.mutation;
        check_probability("add_node", m.add_node)?;
        check_probability("add_connection", m.add_connection)?;
        check_probability("recurrent_connection", m.recurrent_connection)?;
        check_probability("mutate_weights", m.mutate_weights)?;
        check_probability("weight_replace", m.weight_replace)?;
        check_probability("toggle_enable", m.toggle_enable)?;
        check_probability("reenable", m.reenable)?;
        check_probability(
            "crossover_weight_average_rate",
            self.crossover_weight_average_rate,
        )?;
        if m.perturbation_power.is_nan() || m.perturbation_power < 0.0 {
            return Err(ConfigError::InvalidNetworkShape(format!(
                "perturbation_power ({}) must be non-negative",
                m.perturbation_power
            )));
        }

        let s = &self.speciation;
        let positive = |value: f64, name: &str| {
            if value.is_nan() || value <= 0.0 {
                Err(ConfigError::InvalidSpeciation(format!(
                    "{name} ({value}) must be positive"
                )))
            } else {
                Ok(())
            }
        };
        positive(s.compatibility_threshold, "compatibility_threshold")?;
        positive(s.min_threshold, "min_threshold")?;
        positive(s.young_bonus, "young_bonus")?;
        if s.target_species == 0 {
            return Err(ConfigError::InvalidSpeciation(
                "target_species must be at least 1".to_string(),
            ));
        }
        if s.parents_per_species <= 0.0 || s.parents_per_species > 1.0 {
            return Err(ConfigError::InvalidSpeciation(format!(
                "parents_per_species ({}) must lie in (0, 1]",
                s.parents_per_species
            )));
        }
        check_probability("mutation_without_crossover", s.mutation_without_crossover)?;
        check_probability("interspecies_mating", s.interspecies_mating)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(label: &str) -> OutputBinding {
        OutputBinding {
            label: label.to_string(),
            action: PrimitiveAction::PressKey {
                key: label.to_string(),
            },
        }
    }

    #[test]
    fn test_default_neat_config_valid() {
        let config = NeatConfig::new(3, vec![binding("left"), binding("right")]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_inputs_rejected() {
        let config = NeatConfig::new(0, vec![binding("left")]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidNetworkShape(_))
        ));
    }

    #[test]
    fn test_non_positive_threshold_rejected() {
        let mut config = NeatConfig::new(2, vec![binding("left")]);
        config.speciation.compatibility_threshold = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSpeciation(_))
        ));
    }

    #[test]
    fn test_sigmoid_is_steepened() {
        assert!((Activation::Sigmoid.apply(0.0) - 0.5).abs() < 1e-12);
        assert!(Activation::Sigmoid.apply(1.0) > 0.99);
        assert_eq!(Activation::Relu.apply(-2.0), 0.0);
    }

    #[test]
    fn test_genotype_json_shape() {
        let genotype = NetworkGenotype {
            nodes: vec![NodeGene {
                id: 0,
                kind: NodeKind::Input,
                activation: Activation::Linear,
            }],
            connections: vec![],
        };
        let json = serde_json::to_string(&genotype).unwrap();
        assert!(json.contains("\"kind\":\"Input\""));
        let parsed: NetworkGenotype = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, genotype);
    }
}
