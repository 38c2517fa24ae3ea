//! Construction, validation, comparison and persistence of network genotypes.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use crate::schema::{
    Activation, ConnectionGene, InitialConnectivity, NeatConfig, NetworkGenotype, NodeGene,
    NodeKind, PersistenceError, SpeciationConfig,
};
use crate::search::chromosome::GenotypeError;
use crate::search::random::Randomness;

use super::innovation::InnovationTracker;

/// Id of the first hidden node for a network shape: inputs, then bias, then outputs.
pub fn first_hidden_id(config: &NeatConfig) -> u32 {
    (config.inputs + 1 + config.outputs.len()) as u32
}

/// Initial genotype: inputs, one bias and the outputs, wired per the configured connectivity.
pub fn initial(
    config: &NeatConfig,
    tracker: &mut InnovationTracker,
    rng: &mut Randomness,
) -> NetworkGenotype {
    let inputs = config.inputs as u32;
    let bias = inputs;
    let outputs: Vec<u32> = (0..config.outputs.len() as u32).map(|i| bias + 1 + i).collect();

    let mut nodes: Vec<NodeGene> = (0..inputs)
        .map(|id| NodeGene {
            id,
            kind: NodeKind::Input,
            activation: Activation::Linear,
        })
        .collect();
    nodes.push(NodeGene {
        id: bias,
        kind: NodeKind::Bias,
        activation: Activation::Linear,
    });
    nodes.extend(outputs.iter().map(|&id| NodeGene {
        id,
        kind: NodeKind::Output,
        activation: config.output_activation,
    }));

    let range = (-config.weight_range, config.weight_range);
    let mut pairs: Vec<(u32, u32)> = Vec::new();
    for source in 0..=bias {
        for &target in &outputs {
            let keep = match config.connectivity {
                InitialConnectivity::FullyConnected => true,
                InitialConnectivity::Sparse { input_rate } => rng.chance(input_rate),
            };
            if keep {
                pairs.push((source, target));
            }
        }
    }
    if pairs.is_empty() && !outputs.is_empty() {
        let source = rng.index(config.inputs) as u32;
        let target = outputs[rng.index(outputs.len())];
        pairs.push((source, target));
    }

    let mut connections: Vec<ConnectionGene> = pairs
        .into_iter()
        .map(|(source, target)| ConnectionGene {
            innovation: tracker.connection(source, target),
            source,
            target,
            weight: rng.uniform(range),
            enabled: true,
            recurrent: false,
        })
        .collect();
    connections.sort_by_key(|c| c.innovation);

    NetworkGenotype { nodes, connections }
}

pub fn has_node(genotype: &NetworkGenotype, id: u32) -> bool {
    genotype.nodes.binary_search_by_key(&id, |n| n.id).is_ok()
}

pub fn node(genotype: &NetworkGenotype, id: u32) -> Option<&NodeGene> {
    genotype
        .nodes
        .binary_search_by_key(&id, |n| n.id)
        .ok()
        .map(|i| &genotype.nodes[i])
}

/// Insert a node keeping id order. Existing ids are left untouched.
pub fn insert_node(genotype: &mut NetworkGenotype, node: NodeGene) {
    if let Err(pos) = genotype.nodes.binary_search_by_key(&node.id, |n| n.id) {
        genotype.nodes.insert(pos, node);
    }
}

/// Insert a connection keeping innovation order.
pub fn insert_connection(genotype: &mut NetworkGenotype, conn: ConnectionGene) {
    let pos = genotype
        .connections
        .partition_point(|c| c.innovation < conn.innovation);
    genotype.connections.insert(pos, conn);
}

pub fn has_connection(genotype: &NetworkGenotype, source: u32, target: u32) -> bool {
    genotype
        .connections
        .iter()
        .any(|c| c.source == source && c.target == target)
}

/// Whether adding `source -> target` would close a cycle of non-recurrent connections.
pub fn creates_cycle(genotype: &NetworkGenotype, source: u32, target: u32) -> bool {
    if source == target {
        return true;
    }
    let mut adjacency: HashMap<u32, Vec<u32>> = HashMap::new();
    for c in genotype.connections.iter().filter(|c| !c.recurrent) {
        adjacency.entry(c.source).or_default().push(c.target);
    }
    let mut stack = vec![target];
    let mut seen = HashSet::new();
    while let Some(current) = stack.pop() {
        if current == source {
            return true;
        }
        if !seen.insert(current) {
            continue;
        }
        if let Some(next) = adjacency.get(&current) {
            stack.extend(next.iter().copied());
        }
    }
    false
}

/// Check every structural invariant of a genotype against its network shape.
pub fn validate(genotype: &NetworkGenotype, config: &NeatConfig) -> Result<(), GenotypeError> {
    for pair in genotype.nodes.windows(2) {
        if pair[0].id == pair[1].id {
            return Err(GenotypeError::DuplicateNode(pair[0].id));
        }
        if pair[0].id > pair[1].id {
            return Err(GenotypeError::Unsorted);
        }
    }
    let count = |kind: NodeKind| genotype.nodes.iter().filter(|n| n.kind == kind).count();
    for (kind, name, expected) in [
        (NodeKind::Input, "input", config.inputs),
        (NodeKind::Bias, "bias", 1),
        (NodeKind::Output, "output", config.outputs.len()),
    ] {
        let found = count(kind);
        if found != expected {
            return Err(GenotypeError::NodeCount {
                kind: name,
                expected,
                found,
            });
        }
    }

    for pair in genotype.connections.windows(2) {
        if pair[0].innovation == pair[1].innovation {
            return Err(GenotypeError::DuplicateInnovation(pair[0].innovation));
        }
        if pair[0].innovation > pair[1].innovation {
            return Err(GenotypeError::Unsorted);
        }
    }

    let mut pairs = HashSet::new();
    for conn in &genotype.connections {
        for id in [conn.source, conn.target] {
            if !has_node(genotype, id) {
                return Err(GenotypeError::DanglingConnection {
                    innovation: conn.innovation,
                    node: id,
                });
            }
        }
        if let Some(target) = node(genotype, conn.target)
            && matches!(target.kind, NodeKind::Input | NodeKind::Bias)
        {
            return Err(GenotypeError::InvalidTarget(conn.innovation));
        }
        if !pairs.insert((conn.source, conn.target)) {
            return Err(GenotypeError::DuplicateConnection {
                from: conn.source,
                to: conn.target,
            });
        }
        if conn.recurrent && !config.allow_recurrent {
            return Err(GenotypeError::Cycle);
        }
    }

    if has_feedforward_cycle(genotype) {
        return Err(GenotypeError::Cycle);
    }
    Ok(())
}

/// Kahn's algorithm over the non-recurrent connections.
fn has_feedforward_cycle(genotype: &NetworkGenotype) -> bool {
    let mut indegree: HashMap<u32, usize> = genotype.nodes.iter().map(|n| (n.id, 0)).collect();
    let mut adjacency: HashMap<u32, Vec<u32>> = HashMap::new();
    for c in genotype.connections.iter().filter(|c| !c.recurrent) {
        adjacency.entry(c.source).or_default().push(c.target);
        *indegree.entry(c.target).or_default() += 1;
    }
    let mut ready: Vec<u32> = indegree
        .iter()
        .filter(|&(_, &d)| d == 0)
        .map(|(&id, _)| id)
        .collect();
    let mut visited = 0;
    while let Some(id) = ready.pop() {
        visited += 1;
        if let Some(next) = adjacency.get(&id) {
            for t in next {
                if let Some(d) = indegree.get_mut(t) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push(*t);
                    }
                }
            }
        }
    }
    visited < indegree.len()
}

/// NEAT compatibility distance.
///
/// `c_e * E / N + c_d * D / N + c_w * W`, where E and D count excess and disjoint
/// connection genes, W is the mean absolute weight difference of matching genes and
/// N is the size of the larger genome (at least 1). Symmetric in its arguments.
pub fn compatibility_distance(
    a: &NetworkGenotype,
    b: &NetworkGenotype,
    config: &SpeciationConfig,
) -> f64 {
    let (xs, ys) = (&a.connections, &b.connections);
    let (mut i, mut j) = (0, 0);
    let (mut disjoint, mut matching, mut weight_diff) = (0usize, 0usize, 0.0);
    while i < xs.len() && j < ys.len() {
        let (x, y) = (&xs[i], &ys[j]);
        match x.innovation.cmp(&y.innovation) {
            std::cmp::Ordering::Equal => {
                matching += 1;
                weight_diff += (x.weight - y.weight).abs();
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => {
                disjoint += 1;
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                disjoint += 1;
                j += 1;
            }
        }
    }
    let excess = (xs.len() - i) + (ys.len() - j);
    let n = xs.len().max(ys.len()).max(1) as f64;
    let mean_weight = if matching > 0 {
        weight_diff / matching as f64
    } else {
        0.0
    };
    config.excess_coefficient * excess as f64 / n
        + config.disjoint_coefficient * disjoint as f64 / n
        + config.weight_coefficient * mean_weight
}

/// Write a genotype as pretty JSON.
pub fn save(genotype: &NetworkGenotype, path: &Path) -> Result<(), PersistenceError> {
    let json = serde_json::to_string_pretty(genotype)?;
    fs::write(path, json)?;
    Ok(())
}

/// Read a genotype and check it against the network shape.
pub fn load(path: &Path, config: &NeatConfig) -> Result<NetworkGenotype, PersistenceError> {
    let content = fs::read_to_string(path)?;
    let genotype: NetworkGenotype = serde_json::from_str(&content)?;
    validate(&genotype, config).map_err(|e| PersistenceError::InvalidGenotype(e.to_string()))?;
    Ok(genotype)
}
