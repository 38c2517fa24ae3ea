//! Speciated reproduction.

use crate::schema::{NetworkGenotype, SpeciationConfig};
use crate::search::breeder::{BreedContext, Breeder};
use crate::search::chromosome::{Chromosome, Fitter, Variation};
use crate::search::random::Randomness;

use super::species::{Speciation, Species};

/// Breeds each species in proportion to its shared fitness.
///
/// Species large enough clone their champion unchanged. The remaining offspring
/// come from the best `parents_per_species` fraction of the species, either by
/// mutation alone or by crossover (occasionally with another species' champion)
/// followed by mutation with the run's mutation probability.
#[derive(Debug, Clone)]
pub struct SpeciesBreeder {
    config: SpeciationConfig,
    speciation: Speciation,
}

impl SpeciesBreeder {
    pub fn new(config: SpeciationConfig) -> Self {
        Self {
            speciation: Speciation::new(config.clone()),
            config,
        }
    }

    pub fn speciation(&self) -> &Speciation {
        &self.speciation
    }

    fn parent_pool(&self, species: &Species, fitness: &[f64]) -> Vec<usize> {
        let ranked = species.ranked_members(fitness);
        let keep = ((self.config.parents_per_species * ranked.len() as f64).floor() as usize).max(1);
        ranked.into_iter().take(keep).collect()
    }
}

impl<V> Breeder<V> for SpeciesBreeder
where
    V: Variation<Genes = NetworkGenotype>,
{
    fn breed(
        &mut self,
        ctx: &BreedContext<'_, NetworkGenotype>,
        count: usize,
        variation: &mut V,
        rng: &mut Randomness,
    ) -> Vec<Chromosome<NetworkGenotype>> {
        let mut offspring = Vec::with_capacity(count);
        if ctx.population.is_empty() || count == 0 {
            return offspring;
        }
        let fitness = ctx.scalars;
        let genotypes: Vec<&NetworkGenotype> = ctx.population.iter().map(Chromosome::genes).collect();
        self.speciation.speciate(&genotypes, fitness);
        let quotas = self.speciation.assign_quotas(fitness, count);
        let champions: Vec<usize> = self.speciation.species().iter().map(|s| s.champion).collect();

        for (s, (species, &quota)) in self.speciation.species().iter().zip(&quotas).enumerate() {
            if quota == 0 {
                continue;
            }
            let mut produced = 0;
            if species.len() >= self.config.champion_min_species_size {
                let champion = &ctx.population[species.champion];
                offspring.push(ctx.offspring(champion.genes().clone(), vec![champion.id]));
                produced += 1;
            }

            let pool = self.parent_pool(species, fitness);
            while produced < quota {
                produced += 1;
                let Some(&p1) = rng.pick(&pool) else {
                    break;
                };
                let first = &ctx.population[p1];

                if pool.len() == 1 || rng.chance(self.config.mutation_without_crossover) {
                    let genes = variation.mutate(first.genes(), rng);
                    offspring.push(ctx.offspring(genes, vec![first.id]));
                    continue;
                }

                let p2 = if champions.len() > 1 && rng.chance(self.config.interspecies_mating) {
                    let other = (s + 1 + rng.index(champions.len() - 1)) % champions.len();
                    champions[other]
                } else {
                    rng.pick(&pool).copied().unwrap_or(p1)
                };
                let second = &ctx.population[p2];
                let fitter = Fitter::from_scalars(fitness[p1], fitness[p2]);
                let (mut genes, _) = variation.crossover(first.genes(), second.genes(), fitter, rng);
                if rng.chance(ctx.genetic.mutation_probability) {
                    genes = variation.mutate(&genes, rng);
                }
                offspring.push(ctx.offspring(genes, vec![first.id, second.id]));
            }
        }

        // Rounding and empty pools can leave gaps; fill from the best ranked chromosomes.
        let mut k = 0;
        while offspring.len() < count {
            let Some(&idx) = ctx.ranking.order.get(k % ctx.ranking.order.len().max(1)) else {
                break;
            };
            let parent = &ctx.population[idx];
            let genes = variation.mutate(parent.genes(), rng);
            offspring.push(ctx.offspring(genes, vec![parent.id]));
            k += 1;
        }
        offspring.truncate(count);
        log::debug!(
            "Bred {} offspring from {} species",
            offspring.len(),
            self.speciation.len()
        );
        offspring
    }

    fn species_count(&self) -> usize {
        self.speciation.len()
    }
}
