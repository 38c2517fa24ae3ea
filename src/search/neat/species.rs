//! Species bookkeeping: compatibility clustering, stagnation and offspring quotas.

use crate::schema::{NetworkGenotype, SpeciationConfig};

use super::genotype::compatibility_distance;

/// Shared fitness never drops below this, so every eligible species can get offspring.
const FITNESS_FLOOR: f64 = 1e-4;

/// A cluster of compatible genotypes.
#[derive(Debug, Clone)]
pub struct Species {
    pub id: usize,
    pub(super) representative: NetworkGenotype,
    /// Population indices of the current members.
    pub members: Vec<usize>,
    pub age: usize,
    /// Best raw fitness the species ever reached.
    pub best_fitness: f64,
    /// Generations since `best_fitness` improved.
    pub stagnation: usize,
    /// Population index of the current champion.
    pub champion: usize,
}

impl Species {
    /// Genotype new candidates are compared against.
    pub fn representative(&self) -> &NetworkGenotype {
        &self.representative
    }

    /// Get member count.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if species has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members ordered best first; equal fitness keeps population order.
    pub fn ranked_members(&self, fitness: &[f64]) -> Vec<usize> {
        let mut ranked = self.members.clone();
        ranked.sort_by(|&a, &b| fitness[b].total_cmp(&fitness[a]));
        ranked
    }
}

/// Species list that persists across generations.
#[derive(Debug, Clone)]
pub struct Speciation {
    config: SpeciationConfig,
    species: Vec<Species>,
    threshold: f64,
    next_id: usize,
}

impl Speciation {
    /// Create empty speciation state at the configured threshold.
    pub fn new(config: SpeciationConfig) -> Self {
        let threshold = config.compatibility_threshold;
        Self {
            config,
            species: Vec::new(),
            threshold,
            next_id: 0,
        }
    }

    /// Get current species.
    pub fn species(&self) -> &[Species] {
        &self.species
    }

    /// Get species count.
    pub fn len(&self) -> usize {
        self.species.len()
    }

    /// Check if there are no species.
    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    /// Current compatibility threshold, after adjustment towards the target species count.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Whether a species went `stagnation_limit` generations without improving.
    pub fn is_stagnant(&self, species: &Species) -> bool {
        species.stagnation >= self.config.stagnation_limit
    }

    /// Assign every genotype to the first species whose representative is within
    /// the compatibility threshold, founding a new species otherwise.
    ///
    /// Afterwards empty species are dropped, champions and stagnation are updated,
    /// each champion becomes its species' next representative, and the threshold
    /// moves one step toward the target species count.
    pub fn speciate(&mut self, genotypes: &[&NetworkGenotype], fitness: &[f64]) {
        for species in &mut self.species {
            species.members.clear();
        }

        for (i, genotype) in genotypes.iter().enumerate() {
            let home = self.species.iter().position(|s| {
                compatibility_distance(&s.representative, genotype, &self.config) < self.threshold
            });
            match home {
                Some(s) => self.species[s].members.push(i),
                None => {
                    self.species.push(Species {
                        id: self.next_id,
                        representative: (*genotype).clone(),
                        members: vec![i],
                        age: 0,
                        best_fitness: f64::NEG_INFINITY,
                        stagnation: 0,
                        champion: i,
                    });
                    self.next_id += 1;
                }
            }
        }

        self.species.retain(|s| !s.members.is_empty());
        for species in &mut self.species {
            let mut champion = species.members[0];
            for &m in &species.members[1..] {
                if fitness[m] > fitness[champion] {
                    champion = m;
                }
            }
            species.champion = champion;
            species.age += 1;
            if fitness[champion] > species.best_fitness {
                species.best_fitness = fitness[champion];
                species.stagnation = 0;
            } else {
                species.stagnation += 1;
            }
            species.representative = genotypes[champion].clone();
        }

        let count = self.species.len();
        let target = self.config.target_species;
        if count < target {
            self.threshold = (self.threshold - self.config.threshold_step).max(self.config.min_threshold);
        } else if count > target {
            self.threshold += self.config.threshold_step;
        }
        log::debug!(
            "Speciated {} genotypes into {} species (threshold {:.2})",
            genotypes.len(),
            count,
            self.threshold
        );
    }

    /// Offspring count per species, summing to `total`.
    ///
    /// Fitness is shifted to be positive, multiplied by the young-species bonus, and
    /// shared by species size. Stagnant species get nothing unless every species is
    /// stagnant, in which case only the best one keeps a quota. Fractions are
    /// resolved by largest remainder.
    pub fn assign_quotas(&self, fitness: &[f64], total: usize) -> Vec<usize> {
        if self.species.is_empty() {
            return Vec::new();
        }
        let min = fitness.iter().copied().fold(f64::INFINITY, f64::min);
        let shift = if min.is_finite() { min } else { 0.0 };

        let adjusted: Vec<f64> = self
            .species
            .iter()
            .map(|s| {
                let bonus = if s.age <= self.config.young_age {
                    self.config.young_bonus
                } else {
                    1.0
                };
                let shared: f64 = s
                    .members
                    .iter()
                    .map(|&m| ((fitness[m] - shift) * bonus).max(FITNESS_FLOOR))
                    .sum();
                shared / s.members.len() as f64
            })
            .collect();

        let mut eligible: Vec<bool> = self.species.iter().map(|s| !self.is_stagnant(s)).collect();
        if !eligible.iter().any(|&e| e) {
            let mut best = 0;
            for (i, &a) in adjusted.iter().enumerate() {
                if a > adjusted[best] {
                    best = i;
                }
            }
            eligible[best] = true;
        }

        let weights: Vec<f64> = adjusted
            .iter()
            .zip(&eligible)
            .map(|(&a, &e)| if e { a } else { 0.0 })
            .collect();
        largest_remainder(&weights, total)
    }
}

/// Split `total` proportionally to `weights` with integer parts and the leftover
/// handed out by descending fractional part (earlier index on ties).
fn largest_remainder(weights: &[f64], total: usize) -> Vec<usize> {
    let sum: f64 = weights.iter().sum();
    if weights.is_empty() || sum.is_nan() || sum <= 0.0 {
        let mut quotas = vec![0; weights.len()];
        if let Some(first) = quotas.first_mut() {
            *first = total;
        }
        return quotas;
    }
    let exact: Vec<f64> = weights.iter().map(|w| w / sum * total as f64).collect();
    let mut quotas: Vec<usize> = exact.iter().map(|e| e.floor() as usize).collect();
    let assigned: usize = quotas.iter().sum();
    let mut order: Vec<usize> = (0..weights.len()).filter(|&i| weights[i] > 0.0).collect();
    order.sort_by(|&a, &b| {
        let fa = exact[a] - exact[a].floor();
        let fb = exact[b] - exact[b].floor();
        fb.total_cmp(&fa).then(a.cmp(&b))
    });
    for &i in order.iter().cycle().take(total.saturating_sub(assigned)) {
        quotas[i] += 1;
    }
    quotas
}
