//! Generational many-objective search loop.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::schema::{
    ConfigError, GoalId, SearchConfig, SearchHistory, SearchPhase, SearchProgress, SearchStats,
    StopReason,
};

use super::archive::CoverageArchive;
use super::breeder::{BreedContext, Breeder};
use super::chromosome::{Chromosome, GenotypeError, IdSource, Variation};
use super::fitness::{CoverageOracle, CoverageReport, EvaluationBudget, FitnessValue, OracleError};
use super::random::Randomness;
use super::ranking::{RankInput, rank};
use super::stats;

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Operator produced an invalid genotype: {0}")]
    Genotype(#[from] GenotypeError),
}

/// Outcome of a run. The archive is the generated test suite.
#[derive(Debug, Clone)]
pub struct SearchResult<G> {
    pub archive: CoverageArchive<G>,
    /// Chromosome with the highest scalar fitness seen during the run.
    pub best: Option<Chromosome<G>>,
    pub stats: SearchStats,
    pub history: SearchHistory,
}

/// Mutable state of one run.
struct Run<G> {
    goals: Vec<GoalId>,
    archive: CoverageArchive<G>,
    population: Vec<Chromosome<G>>,
    history: SearchHistory,
    best: Option<Chromosome<G>>,
    generation: usize,
    evaluations: u64,
    start: Instant,
}

impl<G: Clone> Run<G> {
    fn new(goals: Vec<GoalId>) -> Self {
        Self {
            archive: CoverageArchive::new(goals.clone()),
            goals,
            population: Vec::new(),
            history: SearchHistory::default(),
            best: None,
            generation: 0,
            evaluations: 0,
            start: Instant::now(),
        }
    }
}

/// Search engine generic over the chromosome variant and the breeding strategy.
pub struct SearchEngine<V: Variation, B: Breeder<V>> {
    config: SearchConfig,
    variation: V,
    breeder: B,
    rng: Randomness,
    ids: IdSource,
    cancelled: Arc<AtomicBool>,
    seeds: Vec<V::Genes>,
}

impl<V: Variation, B: Breeder<V>> SearchEngine<V, B> {
    /// Create an engine. The configuration is validated eagerly.
    pub fn new(config: SearchConfig, variation: V, breeder: B) -> Result<Self, SearchError> {
        config.validate()?;
        let rng = Randomness::from_config(config.random_seed);
        Ok(Self {
            config,
            variation,
            breeder,
            rng,
            ids: IdSource::default(),
            cancelled: Arc::new(AtomicBool::new(false)),
            seeds: Vec::new(),
        })
    }

    /// Genotypes placed into the initial population before random ones.
    pub fn with_seeds(mut self, seeds: Vec<V::Genes>) -> Self {
        self.seeds = seeds;
        self
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Seed of the run's random number generator.
    pub fn seed(&self) -> u64 {
        self.rng.seed()
    }

    /// Get chromosome operators.
    pub fn variation(&self) -> &V {
        &self.variation
    }

    /// Get mutable chromosome operators.
    pub fn variation_mut(&mut self) -> &mut V {
        &mut self.variation
    }

    /// Consume the engine, returning its operators.
    pub fn into_variation(self) -> V {
        self.variation
    }

    /// Run the search (blocking).
    pub fn run<O: CoverageOracle>(
        &mut self,
        oracle: &mut O,
    ) -> Result<SearchResult<V::Genes>, SearchError> {
        self.run_with_callback(oracle, |_| {})
    }

    /// Run the search, reporting progress once per generation.
    pub fn run_with_callback<O, F>(
        &mut self,
        oracle: &mut O,
        mut callback: F,
    ) -> Result<SearchResult<V::Genes>, SearchError>
    where
        O: CoverageOracle,
        F: FnMut(&SearchProgress),
    {
        let goals = oracle.goals();
        self.config.validate_goals(goals.len())?;
        let mut run = Run::new(goals);

        if run.goals.is_empty() && self.config.fitness_mode.is_none() {
            log::info!("Goal set is empty, nothing to search");
            return Ok(self.finish(run, StopReason::EmptyGoalSet, &mut callback));
        }

        log::info!(
            "Starting search: {} goals, population {}, seed {}",
            run.goals.len(),
            self.config.population.size,
            self.rng.seed()
        );
        self.initialize(&mut run)?;
        callback(&self.progress(&run, SearchPhase::Initializing));

        let mut interrupted = self.evaluate(&mut run, oracle);
        if interrupted.is_none() {
            self.record_generation(&mut run);
            callback(&self.progress(&run, SearchPhase::Evaluating));
        }

        let stop_reason = loop {
            if let Some(reason) = interrupted.take().or_else(|| self.should_stop(&run)) {
                break reason;
            }
            self.step(&mut run)?;
            if let Some(reason) = self.evaluate(&mut run, oracle) {
                break reason;
            }
            self.record_generation(&mut run);
            callback(&self.progress(&run, SearchPhase::Evaluating));
        };

        Ok(self.finish(run, stop_reason, &mut callback))
    }

    /// Seeds first, then random genotypes, each passed through the warm-start hook.
    fn initialize(&mut self, run: &mut Run<V::Genes>) -> Result<(), SearchError> {
        let size = self.config.population.size;
        let seeds = std::mem::take(&mut self.seeds);
        for genes in seeds.into_iter().take(size) {
            self.variation.validate(&genes)?;
            run.population.push(Chromosome::new(self.ids.next(), genes, 0, Vec::new()));
        }
        while run.population.len() < size {
            let mut genes = self.variation.generate(&mut self.rng);
            self.variation.warm_start(&mut genes, &mut self.rng);
            self.variation.validate(&genes)?;
            run.population.push(Chromosome::new(self.ids.next(), genes, 0, Vec::new()));
        }
        Ok(())
    }

    /// Evaluate every unevaluated chromosome in order, updating the archive after
    /// each one. Returns `Some(Cancelled)` if the run was cancelled in between.
    fn evaluate<O: CoverageOracle>(
        &mut self,
        run: &mut Run<V::Genes>,
        oracle: &mut O,
    ) -> Option<StopReason> {
        let timeout = self.config.evaluation.timeout();
        let mode = self.config.fitness_mode;

        for chromosome in run.population.iter_mut().filter(|c| !c.is_evaluated()) {
            if self.cancelled.load(Ordering::Relaxed) {
                return Some(StopReason::Cancelled);
            }
            let mut executable = self.variation.to_executable(chromosome.genes());
            let budget = EvaluationBudget::start(timeout, Arc::clone(&self.cancelled));
            let report = match oracle.evaluate(&mut executable, &budget) {
                Ok(report) if !report.timed_out && budget.expired() => {
                    log::warn!(
                        "Chromosome {} exceeded the {:?} evaluation timeout",
                        chromosome.id,
                        timeout
                    );
                    CoverageReport {
                        timed_out: true,
                        covered: BTreeSet::new(),
                        ..report
                    }
                }
                Ok(report) => report,
                Err(OracleError::Cancelled) => return Some(StopReason::Cancelled),
                Err(err) => {
                    log::warn!("Evaluation of chromosome {} failed: {err}", chromosome.id);
                    CoverageReport::timed_out(BTreeSet::new())
                }
            };
            self.variation.observe(&report);

            chromosome.set_fitness(FitnessValue::from_report(&run.goals, &report, mode));
            run.evaluations += 1;
            let length = self.variation.length(chromosome.genes());
            run.archive.update(chromosome, length, run.generation);
            let scalar = chromosome.scalar_fitness();
            if run.best.as_ref().is_none_or(|best| scalar > best.scalar_fitness()) {
                run.best = Some(chromosome.clone());
            }
        }
        None
    }

    /// Rank, keep the elites and breed the rest of the next generation.
    fn step(&mut self, run: &mut Run<V::Genes>) -> Result<(), SearchError> {
        let size = self.config.population.size;
        let open = run.archive.open_goals(self.config.population.goal_stagnation_limit);
        let include_network = self.config.fitness_mode.is_some();

        let lengths: Vec<usize> = run
            .population
            .iter()
            .map(|c| self.variation.length(c.genes()))
            .collect();
        let inputs: Vec<RankInput<'_>> = run
            .population
            .iter()
            .zip(&lengths)
            .map(|(c, &length)| RankInput {
                distances: c.fitness().map(|f| f.distances.as_slice()).unwrap_or_default(),
                network: c.fitness().and_then(|f| f.network),
                length,
            })
            .collect();
        let ranking = rank(&inputs, &open, include_network, self.config.genetic.sorting);
        let scalars: Vec<f64> = run.population.iter().map(Chromosome::scalar_fitness).collect();
        let next_generation = run.generation + 1;

        // Front 0 survives unchanged, per-objective bests first. One slot is always
        // left for offspring.
        let mut elite: Vec<usize> = ranking
            .elite_order()
            .into_iter()
            .take(size - 1)
            .collect();
        if elite.is_empty() {
            elite.extend(ranking.best());
        }

        let ctx = BreedContext {
            population: &run.population,
            ranking: &ranking,
            scalars: &scalars,
            genetic: &self.config.genetic,
            generation: next_generation,
            ids: &self.ids,
        };
        let count = size.saturating_sub(elite.len());
        let offspring = self
            .breeder
            .breed(&ctx, count, &mut self.variation, &mut self.rng);
        for child in &offspring {
            self.variation.validate(child.genes())?;
        }

        let mut next = Vec::with_capacity(size);
        for &i in &elite {
            let mut survivor = run.population[i].clone();
            survivor.generation = next_generation;
            next.push(survivor);
        }
        next.extend(offspring);
        log::debug!(
            "Generation {}: {} elites, {} offspring, {} open goals",
            next_generation,
            elite.len(),
            next.len() - elite.len(),
            open.len()
        );
        run.population = next;
        run.generation = next_generation;
        Ok(())
    }

    fn record_generation(&self, run: &mut Run<V::Genes>) {
        run.archive.end_generation();
        let scalars: Vec<f64> = run
            .population
            .iter()
            .filter(|c| c.is_evaluated())
            .map(Chromosome::scalar_fitness)
            .collect();
        let best = run.best.as_ref().map_or(0.0, Chromosome::scalar_fitness);
        let avg = stats::mean(&scalars).unwrap_or(0.0);
        let diversity = self.diversity(&run.population);
        run.history.push(
            run.archive.covered_count(),
            best,
            avg,
            diversity,
            self.breeder.species_count(),
        );
        log::debug!(
            "Generation {}: {}/{} goals covered, best {:.3}, mean {:.3}, diversity {:.3}",
            run.generation,
            run.archive.covered_count(),
            run.goals.len(),
            best,
            avg,
            diversity
        );
    }

    /// Mean pairwise genotype distance.
    fn diversity(&self, population: &[Chromosome<V::Genes>]) -> f64 {
        let mut distances = Vec::new();
        for (i, a) in population.iter().enumerate() {
            for b in &population[i + 1..] {
                distances.push(self.variation.distance(a.genes(), b.genes()));
            }
        }
        stats::mean(&distances).unwrap_or(0.0)
    }

    fn should_stop(&self, run: &Run<V::Genes>) -> Option<StopReason> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Some(StopReason::Cancelled);
        }

        let has_goals = !run.goals.is_empty();
        if has_goals && run.archive.all_covered() {
            return Some(StopReason::AllGoalsCovered);
        }

        if let Some(budget) = self.config.time_budget()
            && run.start.elapsed() >= budget
        {
            return Some(StopReason::TimeBudget);
        }

        let limit = self.config.population.goal_stagnation_limit;
        if limit.is_some()
            && has_goals
            && self.config.fitness_mode.is_none()
            && run.archive.open_goals(limit).is_empty()
        {
            return Some(StopReason::GoalsStalled);
        }

        if run.generation >= self.config.population.max_generations {
            return Some(StopReason::MaxGenerations);
        }

        None
    }

    fn progress(&self, run: &Run<V::Genes>, phase: SearchPhase) -> SearchProgress {
        let scalars: Vec<f64> = run
            .population
            .iter()
            .filter(|c| c.is_evaluated())
            .map(Chromosome::scalar_fitness)
            .collect();
        SearchProgress {
            generation: run.generation,
            max_generations: self.config.population.max_generations,
            evaluations: run.evaluations,
            covered_goals: run.archive.covered_count(),
            total_goals: run.goals.len(),
            stalled_goals: run
                .archive
                .stalled_count(self.config.population.goal_stagnation_limit),
            best_fitness: run.best.as_ref().map_or(0.0, Chromosome::scalar_fitness),
            avg_fitness: stats::mean(&scalars).unwrap_or(0.0),
            species: self.breeder.species_count(),
            history: run.history.clone(),
            phase,
        }
    }

    fn finish<F>(
        &self,
        run: Run<V::Genes>,
        stop_reason: StopReason,
        callback: &mut F,
    ) -> SearchResult<V::Genes>
    where
        F: FnMut(&SearchProgress),
    {
        let phase = match stop_reason {
            StopReason::Cancelled => SearchPhase::Stopped,
            _ => SearchPhase::Complete,
        };
        callback(&self.progress(&run, phase));

        let covered_goals = run.archive.covered_goals();
        log::info!(
            "Search finished after {} generations ({:?}): {}/{} goals covered, {} evaluations",
            run.generation,
            stop_reason,
            covered_goals.len(),
            run.goals.len(),
            run.evaluations
        );
        SearchResult {
            stats: SearchStats {
                generations: run.generation,
                evaluations: run.evaluations,
                covered_goals,
                total_goals: run.goals.len(),
                elapsed_seconds: run.start.elapsed().as_secs_f64(),
                stop_reason,
            },
            archive: run.archive,
            best: run.best,
            history: run.history,
        }
    }
}
