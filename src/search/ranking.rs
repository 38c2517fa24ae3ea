//! Many-objective ranking and parent selection.
//!
//! Every open coverage goal is one minimised objective; a configured network fitness
//! is one extra maximised objective. Fronts are built by preference sorting (the
//! per-objective best individuals form a front), optionally followed by fast
//! non-dominated sorting of the remainder. Inside a front individuals are ordered by
//! sub-vector dominance, then by the sum of their objectives, then by length.

use std::cmp::Ordering;

use rayon::prelude::*;

use crate::schema::{SelectionMethod, SortingMethod};

use super::random::Randomness;

/// What the ranking needs to know about one individual.
#[derive(Debug, Clone)]
pub struct RankInput<'a> {
    pub distances: &'a [f64],
    pub network: Option<f64>,
    pub length: usize,
}

/// Result of ranking a population.
#[derive(Debug, Clone, Default)]
pub struct Ranking {
    /// Population indices, best first.
    pub order: Vec<usize>,
    /// Fronts of population indices, each already sorted best first.
    pub fronts: Vec<Vec<usize>>,
    /// Front index per population index.
    pub rank: Vec<usize>,
    /// One representative of front 0 per objective: the shortest, then earliest,
    /// individual achieving that objective's minimum. Deduplicated, objective order.
    pub preferred: Vec<usize>,
}

impl Ranking {
    /// Index of the best individual.
    pub fn best(&self) -> Option<usize> {
        self.order.first().copied()
    }

    /// Get front 0, best first.
    pub fn first_front(&self) -> &[usize] {
        self.fronts.first().map_or(&[], Vec::as_slice)
    }

    /// Front 0 with the per-objective representatives first, then the rest in front order.
    pub fn elite_order(&self) -> Vec<usize> {
        let mut order = self.preferred.clone();
        order.extend(self.first_front().iter().copied().filter(|i| !self.preferred.contains(i)));
        order
    }
}

/// Minimised objective matrix: open goal distances, then the negated network fitness.
fn objective_matrix(inputs: &[RankInput<'_>], open_goals: &[usize], network: bool) -> Vec<Vec<f64>> {
    inputs
        .iter()
        .map(|input| {
            let mut row: Vec<f64> = open_goals
                .iter()
                .map(|&g| input.distances.get(g).copied().unwrap_or(1.0))
                .collect();
            if network {
                row.push(-input.network.unwrap_or(0.0));
            }
            row
        })
        .collect()
}

/// Rank a population.
pub fn rank(
    inputs: &[RankInput<'_>],
    open_goals: &[usize],
    include_network: bool,
    method: SortingMethod,
) -> Ranking {
    let n = inputs.len();
    if n == 0 {
        return Ranking::default();
    }
    let objectives = objective_matrix(inputs, open_goals, include_network);
    let mut remaining: Vec<usize> = (0..n).collect();
    let mut fronts: Vec<Vec<usize>> = Vec::new();

    let preferred = representatives(&objectives, inputs, &remaining);
    let first = preference_front(&objectives, inputs, &remaining);
    if !first.is_empty() {
        remaining.retain(|i| !first.contains(i));
        fronts.push(first);
    }

    match method {
        SortingMethod::Preference => {
            while !remaining.is_empty() {
                let front = preference_front(&objectives, inputs, &remaining);
                if front.is_empty() {
                    fronts.push(std::mem::take(&mut remaining));
                    break;
                }
                remaining.retain(|i| !front.contains(i));
                fronts.push(front);
            }
        }
        SortingMethod::PreferenceThenDominance => {
            fronts.extend(non_dominated_fronts(&objectives, &remaining));
        }
    }

    for front in &mut fronts {
        sort_front(front, &objectives, inputs);
    }

    let mut rank = vec![0; n];
    for (r, front) in fronts.iter().enumerate() {
        for &i in front {
            rank[i] = r;
        }
    }
    let order = fronts.iter().flatten().copied().collect();
    Ranking {
        order,
        fronts,
        rank,
        preferred,
    }
}

/// Per objective, every remaining individual achieving the minimum value. An
/// objective on which all remaining individuals tie carries no preference and
/// contributes only its single best. Returns the union in ascending index order.
fn preference_front(objectives: &[Vec<f64>], inputs: &[RankInput<'_>], remaining: &[usize]) -> Vec<usize> {
    let Some(&first) = remaining.first() else {
        return Vec::new();
    };
    let mut front = Vec::new();
    for k in 0..objectives[first].len() {
        let Some(best) = best_for(objectives, inputs, remaining, k) else {
            continue;
        };
        let min = objectives[best][k];
        let tied: Vec<usize> = remaining
            .iter()
            .copied()
            .filter(|&i| objectives[i][k].total_cmp(&min) == Ordering::Equal)
            .collect();
        if tied.len() == remaining.len() {
            front.push(best);
        } else {
            front.extend(tied);
        }
    }
    front.sort_unstable();
    front.dedup();
    front
}

/// Single best remaining individual for objective `k`: smallest value, then
/// shortest, then earliest.
fn best_for(objectives: &[Vec<f64>], inputs: &[RankInput<'_>], remaining: &[usize], k: usize) -> Option<usize> {
    remaining.iter().copied().min_by(|&a, &b| {
        objectives[a][k]
            .total_cmp(&objectives[b][k])
            .then(inputs[a].length.cmp(&inputs[b].length))
            .then(a.cmp(&b))
    })
}

/// The per-objective best individuals, deduplicated, in objective order.
fn representatives(objectives: &[Vec<f64>], inputs: &[RankInput<'_>], remaining: &[usize]) -> Vec<usize> {
    let Some(&first) = remaining.first() else {
        return Vec::new();
    };
    let mut picked: Vec<usize> = Vec::new();
    for k in 0..objectives[first].len() {
        if let Some(best) = best_for(objectives, inputs, remaining, k)
            && !picked.contains(&best)
        {
            picked.push(best);
        }
    }
    picked
}

/// `a` dominates `b`: no worse everywhere, strictly better somewhere.
fn dominates(a: &[f64], b: &[f64]) -> bool {
    let mut strictly = false;
    for (x, y) in a.iter().zip(b) {
        match x.total_cmp(y) {
            Ordering::Greater => return false,
            Ordering::Less => strictly = true,
            Ordering::Equal => {}
        }
    }
    strictly
}

/// Fast non-dominated sorting of the given subset.
fn non_dominated_fronts(objectives: &[Vec<f64>], subset: &[usize]) -> Vec<Vec<usize>> {
    if subset.is_empty() {
        return Vec::new();
    }
    let relations: Vec<(Vec<usize>, usize)> = subset
        .par_iter()
        .map(|&p| {
            let mut dominated = Vec::new();
            let mut dominators = 0;
            for (q_pos, &q) in subset.iter().enumerate() {
                if p == q {
                    continue;
                }
                if dominates(&objectives[p], &objectives[q]) {
                    dominated.push(q_pos);
                } else if dominates(&objectives[q], &objectives[p]) {
                    dominators += 1;
                }
            }
            (dominated, dominators)
        })
        .collect();

    let mut counts: Vec<usize> = relations.iter().map(|(_, c)| *c).collect();
    let mut current: Vec<usize> = (0..subset.len()).filter(|&i| counts[i] == 0).collect();
    let mut fronts = Vec::new();
    while !current.is_empty() {
        let mut next = Vec::new();
        for &p in &current {
            for &q in &relations[p].0 {
                counts[q] -= 1;
                if counts[q] == 0 {
                    next.push(q);
                }
            }
        }
        fronts.push(current.iter().map(|&pos| subset[pos]).collect());
        next.sort_unstable();
        current = next;
    }
    fronts
}

/// Sub-vector dominance: the largest number of objectives in which any other
/// member of the front beats this one.
fn subvector_dominance(front: &[usize], objectives: &[Vec<f64>]) -> Vec<usize> {
    front
        .par_iter()
        .map(|&i| {
            front
                .iter()
                .filter(|&&j| j != i)
                .map(|&j| {
                    objectives[j]
                        .iter()
                        .zip(&objectives[i])
                        .filter(|(oj, oi)| oj < oi)
                        .count()
                })
                .max()
                .unwrap_or(0)
        })
        .collect()
}

fn sort_front(front: &mut [usize], objectives: &[Vec<f64>], inputs: &[RankInput<'_>]) {
    let svd = subvector_dominance(front, objectives);
    let mut keyed: Vec<(usize, f64, usize, usize)> = front
        .iter()
        .zip(svd)
        .map(|(&i, score)| (score, objectives[i].iter().sum::<f64>(), inputs[i].length, i))
        .collect();
    keyed.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then(a.1.total_cmp(&b.1))
            .then(a.2.cmp(&b.2))
            .then(a.3.cmp(&b.3))
    });
    for (slot, (_, _, _, i)) in front.iter_mut().zip(keyed) {
        *slot = i;
    }
}

/// Select a parent. Returns a population index.
///
/// `scalars` holds the scalar fitness per population index and is only used by
/// roulette selection. The ranking must be non-empty.
pub fn select_index(
    method: &SelectionMethod,
    ranking: &Ranking,
    scalars: &[f64],
    rng: &mut Randomness,
) -> usize {
    let n = ranking.order.len();
    match method {
        SelectionMethod::Tournament { size } => {
            let mut best_pos = rng.index(n);
            for _ in 1..*size {
                best_pos = best_pos.min(rng.index(n));
            }
            ranking.order[best_pos]
        }
        SelectionMethod::RankBased => {
            // Linear ranking: position k (best first) has weight n - k.
            let total = (n * (n + 1) / 2) as f64;
            let target = rng.next_f64() * total;
            let mut cumulative = 0.0;
            for (k, &idx) in ranking.order.iter().enumerate() {
                cumulative += (n - k) as f64;
                if cumulative > target {
                    return idx;
                }
            }
            ranking.order[n - 1]
        }
        SelectionMethod::RouletteWheel => {
            let total: f64 = ranking.order.iter().map(|&i| scalars[i].max(0.0)).sum();
            if total <= 0.0 || !total.is_finite() {
                return ranking.order[rng.index(n)];
            }
            let target = rng.next_f64() * total;
            let mut cumulative = 0.0;
            for &idx in &ranking.order {
                cumulative += scalars[idx].max(0.0);
                if cumulative > target {
                    return idx;
                }
            }
            ranking.order[n - 1]
        }
    }
}
