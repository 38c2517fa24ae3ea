//! Offspring production strategies.

use crate::schema::GeneticAlgorithmConfig;

use super::chromosome::{Chromosome, Fitter, IdSource, Variation};
use super::random::Randomness;
use super::ranking::{Ranking, select_index};

/// Everything a breeder may look at when producing the next generation.
pub struct BreedContext<'a, G> {
    /// The evaluated current population.
    pub population: &'a [Chromosome<G>],
    pub ranking: &'a Ranking,
    /// Scalar fitness per population index.
    pub scalars: &'a [f64],
    pub genetic: &'a GeneticAlgorithmConfig,
    /// Generation number the offspring belong to.
    pub generation: usize,
    pub ids: &'a IdSource,
}

impl<G> BreedContext<'_, G> {
    /// Wrap offspring genes in a fresh chromosome.
    pub fn offspring(&self, genes: G, parents: Vec<u64>) -> Chromosome<G> {
        Chromosome::new(self.ids.next(), genes, self.generation, parents)
    }
}

/// Produces `count` offspring from a ranked population.
pub trait Breeder<V: Variation> {
    fn breed(
        &mut self,
        ctx: &BreedContext<'_, V::Genes>,
        count: usize,
        variation: &mut V,
        rng: &mut Randomness,
    ) -> Vec<Chromosome<V::Genes>>;

    /// Number of species maintained, 0 for unspeciated breeders.
    fn species_count(&self) -> usize {
        0
    }
}

/// Selection, then crossover with `crossover_probability`, then mutation with
/// `mutation_probability` on each child.
#[derive(Debug, Clone, Copy, Default)]
pub struct RankBreeder;

impl<V: Variation> Breeder<V> for RankBreeder {
    fn breed(
        &mut self,
        ctx: &BreedContext<'_, V::Genes>,
        count: usize,
        variation: &mut V,
        rng: &mut Randomness,
    ) -> Vec<Chromosome<V::Genes>> {
        let mut offspring = Vec::with_capacity(count);
        if ctx.population.is_empty() {
            return offspring;
        }
        while offspring.len() < count {
            let i = select_index(&ctx.genetic.selection, ctx.ranking, ctx.scalars, rng);
            let j = select_index(&ctx.genetic.selection, ctx.ranking, ctx.scalars, rng);
            let (a, b) = (&ctx.population[i], &ctx.population[j]);

            let (mut first, mut second) = if rng.chance(ctx.genetic.crossover_probability) {
                let fitter = Fitter::from_scalars(ctx.scalars[i], ctx.scalars[j]);
                variation.crossover(a.genes(), b.genes(), fitter, rng)
            } else {
                (a.genes().clone(), b.genes().clone())
            };
            if rng.chance(ctx.genetic.mutation_probability) {
                first = variation.mutate(&first, rng);
            }
            if rng.chance(ctx.genetic.mutation_probability) {
                second = variation.mutate(&second, rng);
            }

            offspring.push(ctx.offspring(first, vec![a.id, b.id]));
            if offspring.len() < count {
                offspring.push(ctx.offspring(second, vec![b.id, a.id]));
            }
        }
        offspring
    }
}

/// Random search baseline: every offspring is a fresh random genotype, so only the
/// archive and the surviving front carry information between generations.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomBreeder;

impl<V: Variation> Breeder<V> for RandomBreeder {
    fn breed(
        &mut self,
        ctx: &BreedContext<'_, V::Genes>,
        count: usize,
        variation: &mut V,
        rng: &mut Randomness,
    ) -> Vec<Chromosome<V::Genes>> {
        (0..count)
            .map(|_| {
                let mut genes = variation.generate(rng);
                variation.warm_start(&mut genes, rng);
                ctx.offspring(genes, Vec::new())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ActionSpace, EventGene, EventSequenceConfig, SortingMethod};
    use crate::search::event_sequence::EventSequenceOperators;
    use crate::search::fitness::FitnessValue;
    use crate::search::ranking::{RankInput, rank};

    fn operators() -> EventSequenceOperators {
        let config = EventSequenceConfig {
            action_space: ActionSpace {
                keys: vec!["space".into()],
                ..ActionSpace::default()
            },
            ..EventSequenceConfig::default()
        };
        EventSequenceOperators::new(config).unwrap()
    }

    /// Six evaluated chromosomes with distances 0.0, 0.1, .. on a single goal.
    fn population(
        ops: &mut EventSequenceOperators,
        ids: &IdSource,
        rng: &mut Randomness,
    ) -> Vec<Chromosome<Vec<EventGene>>> {
        (0..6)
            .map(|k| {
                let mut c = Chromosome::new(ids.next(), ops.generate(rng), 0, vec![]);
                c.set_fitness(FitnessValue {
                    distances: vec![k as f64 / 10.0],
                    network: None,
                    timed_out: false,
                });
                c
            })
            .collect()
    }

    fn ranking(ops: &EventSequenceOperators, population: &[Chromosome<Vec<EventGene>>]) -> Ranking {
        let inputs: Vec<RankInput<'_>> = population
            .iter()
            .map(|c| RankInput {
                distances: &c.fitness().unwrap().distances,
                network: None,
                length: ops.length(c.genes()),
            })
            .collect();
        rank(&inputs, &[0], false, SortingMethod::Preference)
    }

    #[test]
    fn test_rank_breeder_fills_count() {
        let mut ops = operators();
        let mut rng = Randomness::new(11);
        let ids = IdSource::default();
        let population = population(&mut ops, &ids, &mut rng);
        let ranking = ranking(&ops, &population);
        let scalars: Vec<f64> = population.iter().map(Chromosome::scalar_fitness).collect();
        let genetic = GeneticAlgorithmConfig::default();
        let ctx = BreedContext {
            population: &population,
            ranking: &ranking,
            scalars: &scalars,
            genetic: &genetic,
            generation: 1,
            ids: &ids,
        };

        let children = RankBreeder.breed(&ctx, 5, &mut ops, &mut rng);
        assert_eq!(children.len(), 5);
        for child in &children {
            assert_eq!(child.generation, 1);
            assert_eq!(child.parents.len(), 2);
            assert!(!child.is_evaluated());
            assert!(child.id >= 6);
            assert!(ops.validate(child.genes()).is_ok());
        }
        assert_eq!(<RankBreeder as Breeder<EventSequenceOperators>>::species_count(&RankBreeder), 0);
    }

    #[test]
    fn test_random_breeder_ignores_parents() {
        let mut ops = operators();
        let mut rng = Randomness::new(12);
        let ids = IdSource::default();
        let population = population(&mut ops, &ids, &mut rng);
        let ranking = ranking(&ops, &population);
        let scalars = vec![0.0; population.len()];
        let genetic = GeneticAlgorithmConfig::default();
        let ctx = BreedContext {
            population: &population,
            ranking: &ranking,
            scalars: &scalars,
            genetic: &genetic,
            generation: 3,
            ids: &ids,
        };

        let children = RandomBreeder.breed(&ctx, 4, &mut ops, &mut rng);
        assert_eq!(children.len(), 4);
        for child in &children {
            assert_eq!(child.generation, 3);
            assert!(child.parents.is_empty());
            assert!(!child.is_evaluated());
            assert!(ops.validate(child.genes()).is_ok());
        }
        let ids: Vec<u64> = children.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![6, 7, 8, 9]);
        assert!(RandomBreeder.breed(&ctx, 0, &mut ops, &mut rng).is_empty());
    }
}
