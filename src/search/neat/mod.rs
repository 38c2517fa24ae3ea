//! NEAT neuroevolution: network genotypes evolved with historical markings.
//!
//! Innovation numbers line up genes across lineages, species protect new
//! structure while it is optimised, and the phenotype maps program state to one
//! of the configured output actions per tick.

mod breeder;
mod crossover;
pub mod genotype;
mod innovation;
pub mod mutation;
mod operators;
mod phenotype;
mod species;

pub use breeder::SpeciesBreeder;
pub use crossover::crossover;
pub use genotype::compatibility_distance;
pub use innovation::InnovationTracker;
pub use operators::NeatOperators;
pub use phenotype::NetworkPolicy;
pub use species::{Speciation, Species};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::schema::{NeatConfig, OutputBinding, PrimitiveAction};

    /// Default-settings config with `outputs` key-press bindings labelled `out{i}`.
    pub fn config(inputs: usize, outputs: usize) -> NeatConfig {
        let bindings = (0..outputs)
            .map(|i| OutputBinding {
                label: format!("out{i}"),
                action: PrimitiveAction::PressKey {
                    key: format!("k{i}"),
                },
            })
            .collect();
        NeatConfig::new(inputs, bindings)
    }
}
