//! Executable network built from a genotype.

use std::collections::HashMap;
use std::sync::mpsc::Sender;

use crate::schema::{Activation, NeatConfig, NetworkGenotype, NodeKind, OutputBinding, PrimitiveAction};
use crate::search::recorder::Sample;

#[derive(Debug, Clone, Copy)]
struct Link {
    from: usize,
    weight: f64,
    recurrent: bool,
}

/// Per-tick state to action controller.
///
/// Non-recurrent connections are evaluated in topological order within a tick;
/// recurrent connections read the source's activation from the previous tick.
#[derive(Debug)]
pub struct NetworkPolicy {
    activations: Vec<Activation>,
    inputs: Vec<usize>,
    bias: Option<usize>,
    outputs: Vec<usize>,
    order: Vec<usize>,
    incoming: Vec<Vec<Link>>,
    values: Vec<f64>,
    previous: Vec<f64>,
    bindings: Vec<OutputBinding>,
    recorder: Option<Sender<Sample>>,
}

impl NetworkPolicy {
    pub fn new(genotype: &NetworkGenotype, config: &NeatConfig) -> Self {
        let index: HashMap<u32, usize> = genotype
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id, i))
            .collect();
        let n = genotype.nodes.len();

        let mut incoming: Vec<Vec<Link>> = vec![Vec::new(); n];
        let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut indegree = vec![0usize; n];
        for conn in genotype.connections.iter().filter(|c| c.enabled) {
            let (Some(&from), Some(&to)) = (index.get(&conn.source), index.get(&conn.target)) else {
                continue;
            };
            incoming[to].push(Link {
                from,
                weight: conn.weight,
                recurrent: conn.recurrent,
            });
            if !conn.recurrent {
                outgoing[from].push(to);
                indegree[to] += 1;
            }
        }

        let mut ready: Vec<usize> = (0..n).filter(|&i| indegree[i] == 0).rev().collect();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = ready.pop() {
            order.push(i);
            for &t in &outgoing[i] {
                indegree[t] -= 1;
                if indegree[t] == 0 {
                    ready.push(t);
                }
            }
        }
        // Only reachable for genotypes that failed validation.
        if order.len() < n {
            let mut placed = vec![false; n];
            for &i in &order {
                placed[i] = true;
            }
            order.extend((0..n).filter(|&i| !placed[i]));
        }
        order.retain(|&i| {
            matches!(
                genotype.nodes[i].kind,
                NodeKind::Hidden | NodeKind::Output
            )
        });

        let of_kind = |kind: NodeKind| -> Vec<usize> {
            genotype
                .nodes
                .iter()
                .enumerate()
                .filter(|(_, node)| node.kind == kind)
                .map(|(i, _)| i)
                .collect()
        };

        Self {
            activations: genotype.nodes.iter().map(|node| node.activation).collect(),
            inputs: of_kind(NodeKind::Input),
            bias: of_kind(NodeKind::Bias).first().copied(),
            outputs: of_kind(NodeKind::Output),
            order,
            incoming,
            values: vec![0.0; n],
            previous: vec![0.0; n],
            bindings: config.outputs.clone(),
            recorder: None,
        }
    }

    /// Attach a channel that receives one sample per chosen action.
    pub fn with_recorder(mut self, sender: Sender<Sample>) -> Self {
        self.recorder = Some(sender);
        self
    }

    /// Run one tick and return the output activations.
    ///
    /// Missing state features read as 0; extra features are ignored.
    pub fn activate(&mut self, state: &[f64]) -> Vec<f64> {
        std::mem::swap(&mut self.values, &mut self.previous);
        self.values.fill(0.0);
        for (k, &i) in self.inputs.iter().enumerate() {
            self.values[i] = state.get(k).copied().unwrap_or(0.0);
        }
        if let Some(bias) = self.bias {
            self.values[bias] = 1.0;
        }
        for &i in &self.order {
            let sum: f64 = self.incoming[i]
                .iter()
                .map(|link| {
                    let source = if link.recurrent {
                        self.previous[link.from]
                    } else {
                        self.values[link.from]
                    };
                    source * link.weight
                })
                .sum();
            self.values[i] = self.activations[i].apply(sum);
        }
        self.outputs.iter().map(|&i| self.values[i]).collect()
    }

    /// Index of the strongest output, first one on ties.
    pub fn choose_index(&mut self, state: &[f64]) -> Option<usize> {
        let outputs = self.activate(state);
        let mut best: Option<(usize, f64)> = None;
        for (i, value) in outputs.into_iter().enumerate() {
            if best.is_none_or(|(_, b)| value > b) {
                best = Some((i, value));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Choose the action for this tick, reporting it to the recorder if one is attached.
    pub fn act(&mut self, state: &[f64]) -> Option<&PrimitiveAction> {
        let idx = self.choose_index(state)?;
        let binding = self.bindings.get(idx)?;
        let disconnected = self.recorder.as_ref().is_some_and(|sender| {
            let sample = Sample {
                features: state.to_vec(),
                label: binding.label.clone(),
            };
            sender.send(sample).is_err()
        });
        if disconnected {
            log::trace!("Recorder dropped, detaching");
            self.recorder = None;
        }
        Some(&binding.action)
    }

    /// Clear recurrent state between episodes.
    pub fn reset(&mut self) {
        self.values.fill(0.0);
        self.previous.fill(0.0);
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }
}
