//! NEAT mutation operators.
//!
//! A mutation is either structural (add a node, else add a connection) or
//! non-structural (weights, enable toggling, re-enabling). The parent genotype is
//! never touched; every operator works on a clone.

use crate::schema::{ConnectionGene, NeatConfig, NetworkGenotype, NodeGene, NodeKind};
use crate::search::random::Randomness;

use super::genotype::{creates_cycle, has_connection, has_node, insert_connection, insert_node};
use super::innovation::InnovationTracker;

/// Produce a mutated copy of `parent`.
pub fn mutate(
    parent: &NetworkGenotype,
    config: &NeatConfig,
    tracker: &mut InnovationTracker,
    rng: &mut Randomness,
) -> NetworkGenotype {
    let mut child = parent.clone();
    let m = &config.mutation;

    if rng.chance(m.add_node) {
        if add_node(&mut child, config, tracker, rng) {
            return child;
        }
    } else if rng.chance(m.add_connection) && add_connection(&mut child, config, tracker, rng) {
        return child;
    }

    let mut changed = false;
    if rng.chance(m.mutate_weights) {
        mutate_weights(&mut child, config, rng);
        changed = true;
    }
    if rng.chance(m.toggle_enable) {
        changed |= toggle_enable(&mut child, rng);
    }
    if rng.chance(m.reenable) {
        changed |= reenable(&mut child);
    }
    if !changed {
        mutate_weights(&mut child, config, rng);
    }
    child
}

/// Split a random enabled connection `a -> b` into `a -> new -> b`.
///
/// The incoming connection gets weight 1 and the outgoing one keeps the old weight,
/// so the network's function is roughly preserved.
pub fn add_node(
    genotype: &mut NetworkGenotype,
    config: &NeatConfig,
    tracker: &mut InnovationTracker,
    rng: &mut Randomness,
) -> bool {
    let enabled: Vec<usize> = genotype
        .connections
        .iter()
        .enumerate()
        .filter(|(_, c)| c.enabled)
        .map(|(i, _)| i)
        .collect();
    let Some(&idx) = rng.pick(&enabled) else {
        return false;
    };
    let old = genotype.connections[idx];
    genotype.connections[idx].enabled = false;

    let node = tracker.split_node(old.innovation, |id| has_node(genotype, id));
    insert_node(
        genotype,
        NodeGene {
            id: node,
            kind: NodeKind::Hidden,
            activation: config.hidden_activation,
        },
    );
    insert_connection(
        genotype,
        ConnectionGene {
            innovation: tracker.connection(old.source, node),
            source: old.source,
            target: node,
            weight: 1.0,
            enabled: true,
            recurrent: false,
        },
    );
    insert_connection(
        genotype,
        ConnectionGene {
            innovation: tracker.connection(node, old.target),
            source: node,
            target: old.target,
            weight: old.weight,
            enabled: true,
            recurrent: old.recurrent,
        },
    );
    true
}

/// Connect two previously unconnected nodes. Self loops are never added; other
/// cycle-closing edges are only accepted as recurrent connections, and only when the
/// configuration allows them.
pub fn add_connection(
    genotype: &mut NetworkGenotype,
    config: &NeatConfig,
    tracker: &mut InnovationTracker,
    rng: &mut Randomness,
) -> bool {
    let want_recurrent = config.allow_recurrent && rng.chance(config.mutation.recurrent_connection);
    let targets: Vec<u32> = genotype
        .nodes
        .iter()
        .filter(|n| matches!(n.kind, NodeKind::Hidden | NodeKind::Output))
        .map(|n| n.id)
        .collect();
    if targets.is_empty() {
        return false;
    }

    for _ in 0..config.mutation.add_connection_tries {
        let source = genotype.nodes[rng.index(genotype.nodes.len())].id;
        let Some(&target) = rng.pick(&targets) else {
            return false;
        };
        if source == target || has_connection(genotype, source, target) {
            continue;
        }
        let recurrent = creates_cycle(genotype, source, target);
        if recurrent != want_recurrent {
            continue;
        }
        insert_connection(
            genotype,
            ConnectionGene {
                innovation: tracker.connection(source, target),
                source,
                target,
                weight: rng.uniform((-config.weight_range, config.weight_range)),
                enabled: true,
                recurrent,
            },
        );
        return true;
    }
    false
}

/// Gaussian jitter on every weight, or a uniform re-roll with `weight_replace` probability.
pub fn mutate_weights(genotype: &mut NetworkGenotype, config: &NeatConfig, rng: &mut Randomness) {
    let m = &config.mutation;
    let range = (-config.weight_range, config.weight_range);
    for conn in &mut genotype.connections {
        if rng.chance(m.weight_replace) {
            conn.weight = rng.uniform(range);
        } else {
            conn.weight += rng.gaussian() * m.perturbation_power;
        }
    }
}

/// Flip one connection's enabled flag. A connection is only disabled if its source
/// keeps another enabled outgoing connection.
pub fn toggle_enable(genotype: &mut NetworkGenotype, rng: &mut Randomness) -> bool {
    if genotype.connections.is_empty() {
        return false;
    }
    let idx = rng.index(genotype.connections.len());
    let conn = genotype.connections[idx];
    if !conn.enabled {
        genotype.connections[idx].enabled = true;
        return true;
    }
    let other_outgoing = genotype
        .connections
        .iter()
        .enumerate()
        .any(|(i, c)| i != idx && c.enabled && c.source == conn.source);
    if other_outgoing {
        genotype.connections[idx].enabled = false;
        return true;
    }
    false
}

/// Enable the first disabled connection.
pub fn reenable(genotype: &mut NetworkGenotype) -> bool {
    match genotype.connections.iter_mut().find(|c| !c.enabled) {
        Some(conn) => {
            conn.enabled = true;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::InitialConnectivity;
    use crate::search::neat::genotype::{first_hidden_id, initial, validate};
    use crate::search::neat::test_support::config;
    use proptest::prelude::*;

    fn setup(seed: u64) -> (NeatConfig, InnovationTracker, Randomness, NetworkGenotype) {
        let mut cfg = config(3, 2);
        cfg.connectivity = InitialConnectivity::FullyConnected;
        let mut tracker = InnovationTracker::new(first_hidden_id(&cfg));
        let mut rng = Randomness::new(seed);
        let g = initial(&cfg, &mut tracker, &mut rng);
        (cfg, tracker, rng, g)
    }

    #[test]
    fn test_add_node_splits_connection() {
        let (cfg, mut tracker, mut rng, g) = setup(1);
        let mut child = g.clone();
        assert!(add_node(&mut child, &cfg, &mut tracker, &mut rng));
        assert_eq!(child.nodes.len(), g.nodes.len() + 1);
        assert_eq!(child.connections.len(), g.connections.len() + 2);
        assert_eq!(child.connections.iter().filter(|c| !c.enabled).count(), 1);
        assert!(validate(&child, &cfg).is_ok());
    }

    #[test]
    fn test_same_split_reuses_innovations() {
        let (cfg, mut tracker, _, g) = setup(2);
        let mut a = g.clone();
        let mut b = g.clone();
        // Same seed, same choice of connection.
        add_node(&mut a, &cfg, &mut tracker, &mut Randomness::new(9));
        add_node(&mut b, &cfg, &mut tracker, &mut Randomness::new(9));
        assert_eq!(a, b);
    }

    #[test]
    fn test_toggle_keeps_source_connected() {
        let (cfg, _, mut rng, _) = setup(3);
        let mut g = NetworkGenotype {
            nodes: initial(&cfg, &mut InnovationTracker::new(first_hidden_id(&cfg)), &mut rng).nodes,
            connections: vec![ConnectionGene {
                innovation: 0,
                source: 0,
                target: 4,
                weight: 0.5,
                enabled: true,
                recurrent: false,
            }],
        };
        for _ in 0..10 {
            assert!(!toggle_enable(&mut g, &mut rng));
            assert!(g.connections[0].enabled);
        }
    }

    #[test]
    fn test_reenable_first_disabled() {
        let (_, _, _, mut g) = setup(4);
        g.connections[1].enabled = false;
        g.connections[2].enabled = false;
        assert!(reenable(&mut g));
        assert!(g.connections[1].enabled);
        assert!(!g.connections[2].enabled);
    }

    #[test]
    fn test_parent_unchanged() {
        let (cfg, mut tracker, mut rng, g) = setup(5);
        let snapshot = g.clone();
        for _ in 0..20 {
            let _ = mutate(&g, &cfg, &mut tracker, &mut rng);
        }
        assert_eq!(g, snapshot);
    }

    proptest! {
        #[test]
        fn prop_mutation_preserves_validity(seed in any::<u64>(), recurrent in any::<bool>()) {
            let (mut cfg, mut tracker, mut rng, mut g) = setup(seed);
            cfg.allow_recurrent = recurrent;
            cfg.mutation.add_node = 0.3;
            cfg.mutation.add_connection = 0.5;
            cfg.mutation.recurrent_connection = 0.5;
            for _ in 0..30 {
                g = mutate(&g, &cfg, &mut tracker, &mut rng);
                prop_assert_eq!(validate(&g, &cfg), Ok(()));
            }
        }
    }
}
