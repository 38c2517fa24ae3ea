//! Per-goal archive of the best chromosome found so far.
//!
//! An entry is only replaced by a strictly better one (smaller distance, or equal
//! distance and shorter), so quality per goal never regresses. The covering entries
//! are the generated test suite.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::schema::{GoalId, PersistenceError};

use super::chromosome::Chromosome;

/// Best known chromosome for one goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveEntry<G> {
    pub goal: GoalId,
    /// Normalized distance to covering the goal (0 = covered).
    pub distance: f64,
    /// Chromosome length used for tie-breaking.
    pub length: usize,
    /// Generation in which this entry was recorded.
    pub generation: usize,
    pub chromosome: Chromosome<G>,
}

impl<G> ArchiveEntry<G> {
    /// Whether this entry covers its goal (distance 0).
    pub fn covers(&self) -> bool {
        self.distance == 0.0
    }

    fn improved_by(&self, distance: f64, length: usize) -> bool {
        distance < self.distance || (distance == self.distance && length < self.length)
    }
}

/// Archive over a fixed goal list.
#[derive(Debug, Clone)]
pub struct CoverageArchive<G> {
    goals: Vec<GoalId>,
    entries: BTreeMap<usize, ArchiveEntry<G>>,
    /// Generations since each goal's best distance last decreased.
    stagnation: Vec<usize>,
    improved: Vec<bool>,
}

impl<G: Clone> CoverageArchive<G> {
    /// Create an empty archive over a fixed goal list.
    pub fn new(goals: Vec<GoalId>) -> Self {
        let n = goals.len();
        Self {
            goals,
            entries: BTreeMap::new(),
            stagnation: vec![0; n],
            improved: vec![false; n],
        }
    }

    /// Get goals in oracle order.
    pub fn goals(&self) -> &[GoalId] {
        &self.goals
    }

    /// Offer a chromosome for one goal. Returns whether the entry was replaced.
    pub fn consider(
        &mut self,
        goal: usize,
        chromosome: &Chromosome<G>,
        distance: f64,
        length: usize,
        generation: usize,
    ) -> bool {
        if goal >= self.goals.len() || distance.is_nan() {
            return false;
        }
        let current = self.entries.get(&goal);
        if !current.is_none_or(|entry| entry.improved_by(distance, length)) {
            return false;
        }
        // Only distance progress resets stagnation; shorter ties do not.
        let progressed = current.is_none_or(|entry| distance < entry.distance);
        self.entries.insert(
            goal,
            ArchiveEntry {
                goal: self.goals[goal].clone(),
                distance,
                length,
                generation,
                chromosome: chromosome.clone(),
            },
        );
        if progressed {
            self.improved[goal] = true;
        }
        true
    }

    /// Offer an evaluated chromosome for every goal. Returns the number of replacements.
    pub fn update(&mut self, chromosome: &Chromosome<G>, length: usize, generation: usize) -> usize {
        let Some(fitness) = chromosome.fitness() else {
            return 0;
        };
        let distances = &fitness.distances;
        (0..self.goals.len())
            .filter(|&g| {
                let distance = distances.get(g).copied().unwrap_or(1.0);
                self.consider(g, chromosome, distance, length, generation)
            })
            .count()
    }

    /// Close a generation: bump stagnation counters of uncovered goals that did not improve.
    pub fn end_generation(&mut self) {
        for g in 0..self.goals.len() {
            if self.improved[g] {
                self.stagnation[g] = 0;
            } else if !self.is_covered(g) {
                self.stagnation[g] += 1;
            }
            self.improved[g] = false;
        }
    }
}

impl<G> CoverageArchive<G> {
    /// Whether the goal at this index has a covering entry.
    pub fn is_covered(&self, goal: usize) -> bool {
        self.entries.get(&goal).is_some_and(ArchiveEntry::covers)
    }

    /// Get number of covered goals.
    pub fn covered_count(&self) -> usize {
        self.entries.values().filter(|e| e.covers()).count()
    }

    /// Whether every goal is covered.
    pub fn all_covered(&self) -> bool {
        self.covered_count() == self.goals.len()
    }

    /// Covered goal ids in goal order.
    pub fn covered_goals(&self) -> Vec<GoalId> {
        self.entries
            .values()
            .filter(|e| e.covers())
            .map(|e| e.goal.clone())
            .collect()
    }

    /// Best distance recorded for a goal (1.0 if nothing yet).
    pub fn best_distance(&self, goal: usize) -> f64 {
        self.entries.get(&goal).map_or(1.0, |e| e.distance)
    }

    /// Generations since the goal's best distance last improved.
    pub fn stagnation(&self, goal: usize) -> usize {
        self.stagnation.get(goal).copied().unwrap_or(0)
    }

    /// Whether an uncovered goal exceeded the stagnation limit.
    pub fn is_stalled(&self, goal: usize, limit: Option<usize>) -> bool {
        limit.is_some_and(|limit| !self.is_covered(goal) && self.stagnation(goal) >= limit)
    }

    /// Goals still worth optimising: uncovered and not stalled.
    pub fn open_goals(&self, limit: Option<usize>) -> Vec<usize> {
        (0..self.goals.len())
            .filter(|&g| !self.is_covered(g) && !self.is_stalled(g, limit))
            .collect()
    }

    /// Get number of stalled goals.
    pub fn stalled_count(&self, limit: Option<usize>) -> usize {
        (0..self.goals.len())
            .filter(|&g| self.is_stalled(g, limit))
            .count()
    }

    /// Look up the entry for a goal id.
    pub fn get(&self, goal: &GoalId) -> Option<&ArchiveEntry<G>> {
        let idx = self.goals.iter().position(|g| g == goal)?;
        self.entries.get(&idx)
    }

    /// Entries in goal order.
    pub fn entries(&self) -> impl Iterator<Item = &ArchiveEntry<G>> {
        self.entries.values()
    }

    /// Entries that cover their goal: the generated test suite.
    pub fn suite(&self) -> impl Iterator<Item = &ArchiveEntry<G>> {
        self.entries.values().filter(|e| e.covers())
    }

    /// Get archive size.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if archive is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn file_name(index: usize, goal: &GoalId) -> String {
    let safe: String = goal
        .as_str()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("{index:04}_{safe}.json")
}

impl<G: Serialize> CoverageArchive<G> {
    /// Write every entry as a JSON file into `dir`.
    pub fn save_all(&self, dir: &Path) -> Result<Vec<PathBuf>, PersistenceError> {
        fs::create_dir_all(dir)?;
        let mut paths = Vec::with_capacity(self.entries.len());
        for (&idx, entry) in &self.entries {
            let path = dir.join(file_name(idx, &entry.goal));
            let json = serde_json::to_string_pretty(entry)?;
            fs::write(&path, json)?;
            paths.push(path);
        }
        log::debug!("Saved {} archive entries to {}", paths.len(), dir.display());
        Ok(paths)
    }
}

impl<G: Clone + DeserializeOwned> CoverageArchive<G> {
    /// Load entries written by [`CoverageArchive::save_all`]. The goal list is the
    /// sorted set of goals found in the directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self, PersistenceError> {
        let mut loaded: Vec<ArchiveEntry<G>> = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "json") {
                let content = fs::read_to_string(&path)?;
                loaded.push(serde_json::from_str(&content)?);
            }
        }
        loaded.sort_by(|a, b| a.goal.cmp(&b.goal));
        let goals = loaded.iter().map(|e| e.goal.clone()).collect();
        let mut archive = Self::new(goals);
        for (idx, entry) in loaded.into_iter().enumerate() {
            archive.entries.insert(idx, entry);
        }
        Ok(archive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::fitness::FitnessValue;

    fn evaluated(id: u64, genes: Vec<u8>, distances: Vec<f64>) -> Chromosome<Vec<u8>> {
        let mut c = Chromosome::new(id, genes, 0, vec![]);
        c.set_fitness(FitnessValue {
            distances,
            network: None,
            timed_out: false,
        });
        c
    }

    fn goals() -> Vec<GoalId> {
        vec!["a".into(), "b".into()]
    }

    #[test]
    fn test_replacement_requires_strict_improvement() {
        let mut archive = CoverageArchive::new(goals());
        let first = evaluated(1, vec![1, 2, 3], vec![0.0, 0.5]);
        assert_eq!(archive.update(&first, 3, 0), 2);

        // Same distance, same length: keeps the earlier entry.
        let same = evaluated(2, vec![4, 5, 6], vec![0.0, 0.5]);
        assert_eq!(archive.update(&same, 3, 1), 0);
        assert_eq!(archive.get(&"a".into()).unwrap().chromosome.id, 1);

        // Shorter covering chromosome wins.
        let shorter = evaluated(3, vec![7], vec![0.0, 0.9]);
        assert_eq!(archive.update(&shorter, 1, 2), 1);
        assert_eq!(archive.get(&"a".into()).unwrap().chromosome.id, 3);
        assert_eq!(archive.best_distance(1), 0.5);
    }

    #[test]
    fn test_unevaluated_is_ignored() {
        let mut archive: CoverageArchive<Vec<u8>> = CoverageArchive::new(goals());
        let c = Chromosome::new(0, vec![1], 0, vec![]);
        assert_eq!(archive.update(&c, 1, 0), 0);
        assert!(archive.is_empty());
    }

    #[test]
    fn test_stagnation_and_open_goals() {
        let mut archive = CoverageArchive::new(goals());
        archive.update(&evaluated(1, vec![1], vec![0.0, 0.7]), 1, 0);
        archive.end_generation();
        assert_eq!(archive.stagnation(1), 0);
        archive.end_generation();
        archive.end_generation();
        assert_eq!(archive.stagnation(1), 2);
        assert_eq!(archive.stagnation(0), 0);
        assert_eq!(archive.open_goals(None), vec![1]);
        assert!(archive.is_stalled(1, Some(2)));
        assert!(archive.open_goals(Some(2)).is_empty());
        assert_eq!(archive.covered_goals(), vec![GoalId::from("a")]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut archive = CoverageArchive::new(goals());
        archive.update(&evaluated(1, vec![1, 2], vec![0.0, 0.25]), 2, 4);
        let paths = archive.save_all(dir.path()).unwrap();
        assert_eq!(paths.len(), 2);

        let loaded: CoverageArchive<Vec<u8>> = CoverageArchive::load_from_dir(dir.path()).unwrap();
        assert_eq!(loaded.goals(), goals().as_slice());
        assert!(loaded.is_covered(0));
        assert_eq!(loaded.best_distance(1), 0.25);
        assert_eq!(loaded.get(&"b".into()).unwrap().chromosome.genes(), &vec![1, 2]);
    }
}
