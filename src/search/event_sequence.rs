//! Variable-length event-sequence operators.

use crate::schema::{ConfigError, EventAction, EventGene, EventKind, EventSequenceConfig};

use super::chromosome::{Executable, Fitter, GenotypeError, Variation};
use super::random::Randomness;
use super::stats::levenshtein;

/// Genetic operators for chromosomes that are ordered lists of input events.
#[derive(Debug, Clone)]
pub struct EventSequenceOperators {
    config: EventSequenceConfig,
}

impl EventSequenceOperators {
    pub fn new(config: EventSequenceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EventSequenceConfig {
        &self.config
    }

    /// A random gene drawn from the action space.
    pub fn random_gene(&self, rng: &mut Randomness) -> EventGene {
        let space = &self.config.action_space;
        let kinds = space.kinds();
        let kind = rng.pick(&kinds).copied().unwrap_or(EventKind::Wait);
        let max = self.config.max_duration;
        match kind {
            EventKind::Wait => EventGene::new(EventAction::Wait, rng.range_u32(1u32.min(max), max)),
            EventKind::Key => {
                let key = rng.pick(&space.keys).cloned().unwrap_or_default();
                EventGene::new(EventAction::Key { key }, rng.range_u32(0, max))
            }
            EventKind::Click => {
                let target = rng.pick(&space.click_targets).cloned().unwrap_or_default();
                EventGene::new(EventAction::Click { target }, rng.range_u32(0, max))
            }
            EventKind::MoveTo => EventGene::new(
                EventAction::MoveTo {
                    x: rng.uniform(space.x_bounds),
                    y: rng.uniform(space.y_bounds),
                },
                rng.range_u32(0, max),
            ),
            EventKind::Type => {
                let text = rng.pick(&space.texts).cloned().unwrap_or_default();
                EventGene::new(EventAction::Type { text }, rng.range_u32(0, max))
            }
        }
    }

    /// Jitter a gene's parameters within the action space.
    fn perturb(&self, gene: &mut EventGene, rng: &mut Randomness) {
        let space = &self.config.action_space;
        let power = self.config.mutation_power;
        let max = self.config.max_duration as f64;
        let min_duration = if gene.action == EventAction::Wait { 1.0_f64.min(max) } else { 0.0 };
        let duration = rng.gaussian_mutate(gene.duration as f64, power, (0.0, max));
        gene.duration = duration.round().max(min_duration) as u32;

        match &mut gene.action {
            EventAction::Wait => {}
            EventAction::Key { key } => {
                if let Some(k) = rng.pick(&space.keys) {
                    *key = k.clone();
                }
            }
            EventAction::Click { target } => {
                if let Some(t) = rng.pick(&space.click_targets) {
                    *target = t.clone();
                }
            }
            EventAction::MoveTo { x, y } => {
                *x = rng.gaussian_mutate(*x, power, space.x_bounds);
                *y = rng.gaussian_mutate(*y, power, space.y_bounds);
            }
            EventAction::Type { text } => {
                if let Some(t) = rng.pick(&space.texts) {
                    *text = t.clone();
                }
            }
        }
    }

    fn within_bounds(&self, len: usize) -> bool {
        (self.config.min_length..=self.config.max_length).contains(&len)
    }
}

impl Variation for EventSequenceOperators {
    type Genes = Vec<EventGene>;

    fn generate(&mut self, rng: &mut Randomness) -> Vec<EventGene> {
        let (lo, hi) = self.config.initial_length;
        let len = rng.range_usize(lo, hi);
        (0..len).map(|_| self.random_gene(rng)).collect()
    }

    /// Each gene is touched with probability `1/len`: insert before it, perturb it, or
    /// delete it, keeping the length within bounds. At least one change is made.
    fn mutate(&mut self, genes: &Vec<EventGene>, rng: &mut Randomness) -> Vec<EventGene> {
        let mut out = genes.clone();
        let (min, max) = (self.config.min_length, self.config.max_length);
        let p = 1.0 / genes.len().max(1) as f64;
        let mut changed = false;

        let mut i = 0;
        while i < out.len() {
            if !rng.chance(p) {
                i += 1;
                continue;
            }
            changed = true;
            match rng.index(3) {
                0 if out.len() < max => {
                    let gene = self.random_gene(rng);
                    out.insert(i, gene);
                    i += 2;
                }
                2 if out.len() > min => {
                    out.remove(i);
                }
                _ => {
                    self.perturb(&mut out[i], rng);
                    i += 1;
                }
            }
        }

        if !changed {
            if out.is_empty() || out.len() < min {
                let gene = self.random_gene(rng);
                out.push(gene);
            } else {
                let idx = rng.index(out.len());
                self.perturb(&mut out[idx], rng);
            }
        }
        out
    }

    /// Single-point relative crossover: one split fraction, scaled to each parent.
    fn crossover(
        &mut self,
        a: &Vec<EventGene>,
        b: &Vec<EventGene>,
        _fitter: Fitter,
        rng: &mut Randomness,
    ) -> (Vec<EventGene>, Vec<EventGene>) {
        if a.len() < 2 || b.len() < 2 {
            return (a.clone(), b.clone());
        }
        let r = rng.next_f64();
        let cut_a = ((a.len() - 1) as f64 * r).floor() as usize + 1;
        let cut_b = ((b.len() - 1) as f64 * r).floor() as usize + 1;
        let max = self.config.max_length;

        let splice = |head: &[EventGene], tail: &[EventGene]| -> Vec<EventGene> {
            head.iter().chain(tail).take(max).cloned().collect()
        };
        let first = splice(&a[..cut_a], &b[cut_b..]);
        let second = splice(&b[..cut_b], &a[cut_a..]);

        let first = if self.within_bounds(first.len()) { first } else { a.clone() };
        let second = if self.within_bounds(second.len()) { second } else { b.clone() };
        (first, second)
    }

    fn to_executable(&self, genes: &Vec<EventGene>) -> Executable {
        Executable::Actions(genes.iter().flat_map(EventGene::to_primitives).collect())
    }

    fn validate(&self, genes: &Vec<EventGene>) -> Result<(), GenotypeError> {
        if !self.within_bounds(genes.len()) {
            return Err(GenotypeError::LengthOutOfBounds {
                len: genes.len(),
                min: self.config.min_length,
                max: self.config.max_length,
            });
        }
        let space = &self.config.action_space;
        for (i, gene) in genes.iter().enumerate() {
            if !space.admits(&gene.action) || gene.duration > self.config.max_duration {
                return Err(GenotypeError::InvalidGene(i));
            }
        }
        Ok(())
    }

    fn length(&self, genes: &Vec<EventGene>) -> usize {
        genes.len()
    }

    fn distance(&self, a: &Vec<EventGene>, b: &Vec<EventGene>) -> f64 {
        levenshtein(a, b) as f64
    }
}
