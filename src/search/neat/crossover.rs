//! NEAT crossover aligned on innovation numbers.

use crate::schema::{NeatConfig, NetworkGenotype};
use crate::search::chromosome::Fitter;
use crate::search::random::Randomness;

/// Probability that a matching gene disabled in either parent stays disabled.
const KEEP_DISABLED: f64 = 0.75;

/// One child from two parents.
///
/// The child takes the fitter parent's structure: its nodes and its disjoint and
/// excess connections. Matching connections draw their weight from a random parent,
/// or the parents' mean with `crossover_weight_average_rate`. Ties pick the
/// structural parent by coin flip.
pub fn crossover(
    a: &NetworkGenotype,
    b: &NetworkGenotype,
    fitter: Fitter,
    config: &NeatConfig,
    rng: &mut Randomness,
) -> NetworkGenotype {
    let first_leads = match fitter {
        Fitter::First => true,
        Fitter::Second => false,
        Fitter::Tie => rng.coin_flip(),
    };
    let (lead, other) = if first_leads { (a, b) } else { (b, a) };

    let mut child = lead.clone();
    let mut j = 0;
    for conn in &mut child.connections {
        while j < other.connections.len() && other.connections[j].innovation < conn.innovation {
            j += 1;
        }
        let Some(mate) = other
            .connections
            .get(j)
            .filter(|c| c.innovation == conn.innovation)
        else {
            continue;
        };

        if rng.chance(config.crossover_weight_average_rate) {
            conn.weight = (conn.weight + mate.weight) / 2.0;
        } else if rng.coin_flip() {
            conn.weight = mate.weight;
        }

        if !conn.enabled || !mate.enabled {
            conn.enabled = !rng.chance(KEEP_DISABLED);
        }
    }
    child
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::InitialConnectivity;
    use crate::search::neat::genotype::{first_hidden_id, initial, validate};
    use crate::search::neat::innovation::InnovationTracker;
    use crate::search::neat::mutation::add_node;
    use crate::search::neat::test_support::config;
    use proptest::prelude::*;

    fn parents(seed: u64) -> (NeatConfig, NetworkGenotype, NetworkGenotype) {
        let mut cfg = config(2, 2);
        cfg.connectivity = InitialConnectivity::FullyConnected;
        let mut tracker = InnovationTracker::new(first_hidden_id(&cfg));
        let mut rng = Randomness::new(seed);
        let a = initial(&cfg, &mut tracker, &mut rng);
        let mut b = initial(&cfg, &mut tracker, &mut rng);
        add_node(&mut b, &cfg, &mut tracker, &mut rng);
        (cfg, a, b)
    }

    #[test]
    fn test_child_takes_fitter_structure() {
        let (cfg, a, b) = parents(1);
        let mut rng = Randomness::new(2);
        let from_b = crossover(&a, &b, Fitter::Second, &cfg, &mut rng);
        assert_eq!(from_b.nodes, b.nodes);
        let innovations = |g: &NetworkGenotype| g.connections.iter().map(|c| c.innovation).collect::<Vec<_>>();
        assert_eq!(innovations(&from_b), innovations(&b));

        let from_a = crossover(&a, &b, Fitter::First, &cfg, &mut rng);
        assert_eq!(from_a.nodes, a.nodes);
        assert_eq!(innovations(&from_a), innovations(&a));
    }

    #[test]
    fn test_matching_weights_come_from_parents() {
        let (mut cfg, a, b) = parents(3);
        cfg.crossover_weight_average_rate = 0.0;
        let mut rng = Randomness::new(4);
        let child = crossover(&a, &b, Fitter::First, &cfg, &mut rng);
        for conn in &child.connections {
            let wa = a.connections.iter().find(|c| c.innovation == conn.innovation).map(|c| c.weight);
            let wb = b.connections.iter().find(|c| c.innovation == conn.innovation).map(|c| c.weight);
            assert!(Some(conn.weight) == wa || Some(conn.weight) == wb);
        }
    }

    #[test]
    fn test_disabled_gene_usually_stays_disabled() {
        let (cfg, a, mut b) = parents(5);
        for c in &mut b.connections {
            c.enabled = false;
        }
        let mut rng = Randomness::new(6);
        let matching = a.connections.len();
        let mut disabled = 0;
        let trials = 200;
        for _ in 0..trials {
            let child = crossover(&a, &b, Fitter::First, &cfg, &mut rng);
            disabled += child.connections.iter().filter(|c| !c.enabled).count();
        }
        let rate = disabled as f64 / (trials * matching) as f64;
        assert!((rate - KEEP_DISABLED).abs() < 0.1, "rate {rate}");
    }

    proptest! {
        #[test]
        fn prop_child_is_valid(seed in any::<u64>(), tie in any::<bool>()) {
            let (cfg, a, b) = parents(seed);
            let mut rng = Randomness::new(seed.wrapping_add(1));
            let fitter = if tie { Fitter::Tie } else { Fitter::Second };
            let child = crossover(&a, &b, fitter, &cfg, &mut rng);
            prop_assert_eq!(validate(&child, &cfg), Ok(()));
        }
    }
}
