//! Run-wide registry of structural innovations.

use std::collections::HashMap;

use crate::schema::NetworkGenotype;

/// Hands out innovation numbers and hidden node ids.
///
/// A (source, target) pair keeps its innovation number for the whole run, and
/// splitting the same connection twice yields the same hidden node id. That is what
/// lets crossover line up structures that arose independently in two lineages.
#[derive(Debug, Clone, Default)]
pub struct InnovationTracker {
    next_innovation: u64,
    next_node: u32,
    connections: HashMap<(u32, u32), u64>,
    splits: HashMap<u64, u32>,
}

impl InnovationTracker {
    /// Tracker whose fresh node ids start at `first_hidden`.
    pub fn new(first_hidden: u32) -> Self {
        Self {
            next_node: first_hidden,
            ..Default::default()
        }
    }

    /// Innovation number for a connection, assigned on first sight.
    pub fn connection(&mut self, source: u32, target: u32) -> u64 {
        if let Some(&innovation) = self.connections.get(&(source, target)) {
            return innovation;
        }
        let innovation = self.next_innovation;
        self.next_innovation += 1;
        self.connections.insert((source, target), innovation);
        innovation
    }

    /// Hidden node id for splitting connection `innovation`.
    ///
    /// Reuses the id registered for this split unless `present(id)` says the genotype
    /// already contains that node, in which case a fresh id is issued.
    pub fn split_node(&mut self, innovation: u64, present: impl Fn(u32) -> bool) -> u32 {
        if let Some(&node) = self.splits.get(&innovation)
            && !present(node)
        {
            return node;
        }
        let node = self.fresh_node();
        self.splits.entry(innovation).or_insert(node);
        node
    }

    pub fn fresh_node(&mut self) -> u32 {
        let node = self.next_node;
        self.next_node += 1;
        node
    }

    /// Register the structure of an externally loaded genotype so new innovations
    /// never collide with it.
    pub fn observe(&mut self, genotype: &NetworkGenotype) {
        for conn in &genotype.connections {
            self.connections
                .entry((conn.source, conn.target))
                .or_insert(conn.innovation);
            self.next_innovation = self.next_innovation.max(conn.innovation + 1);
        }
        if let Some(max_node) = genotype.nodes.iter().map(|n| n.id).max() {
            self.next_node = self.next_node.max(max_node + 1);
        }
    }

    pub fn innovation_count(&self) -> u64 {
        self.next_innovation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_pair_same_innovation() {
        let mut tracker = InnovationTracker::new(10);
        let a = tracker.connection(0, 5);
        let b = tracker.connection(1, 5);
        assert_ne!(a, b);
        assert_eq!(tracker.connection(0, 5), a);
        assert_eq!(tracker.innovation_count(), 2);
    }

    #[test]
    fn test_split_reuses_node_unless_present() {
        let mut tracker = InnovationTracker::new(10);
        let first = tracker.split_node(3, |_| false);
        assert_eq!(first, 10);
        assert_eq!(tracker.split_node(3, |_| false), 10);
        let fresh = tracker.split_node(3, |id| id == 10);
        assert_eq!(fresh, 11);
    }
}
