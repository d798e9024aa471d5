// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::{BTreeMap, BTreeSet};

/// Result of ordering the nodes of a [`DependencyGraph`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortResult<N> {
    // Every node, sources before their dependents.
    Order(Vec<N>),
    // Acyclic prefix of the order, followed by the nodes that sit on or behind a cycle.
    Cycle(Vec<N>, Vec<N>),
}

/// Directed graph of "target depends on source" edges.
///
/// Edges are stored source to target so that fan-out queries (which targets
/// does a change to this source affect) walk forward.
#[derive(Debug, Clone)]
pub struct DependencyGraph<N: Ord + Clone> {
    nodes: BTreeSet<N>,
    dependents: BTreeMap<N, BTreeSet<N>>,
}

impl<N: Ord + Clone> Default for DependencyGraph<N> {
    fn default() -> Self {
        Self {
            nodes: BTreeSet::new(),
            dependents: BTreeMap::new(),
        }
    }
}

impl<N: Ord + Clone> DependencyGraph<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: N) {
        self.nodes.insert(node);
    }

    /// Records that `target` depends on `source`. Adding the same edge twice
    /// has no effect.
    pub fn add_edge(&mut self, target: N, source: N) {
        self.nodes.insert(target.clone());
        self.nodes.insert(source.clone());
        self.dependents.entry(source).or_default().insert(target);
    }

    pub fn nodes(&self) -> impl Iterator<Item = &N> {
        self.nodes.iter()
    }

    /// Nodes with at least one dependent.
    pub fn sources(&self) -> impl Iterator<Item = &N> {
        self.dependents.keys()
    }

    pub fn dependents(&self, source: &N) -> impl DoubleEndedIterator<Item = &N> {
        self.dependents.get(source).into_iter().flatten()
    }

    pub fn edge_count(&self) -> usize {
        self.dependents.values().map(BTreeSet::len).sum()
    }

    pub fn contains_edge(&self, target: &N, source: &N) -> bool {
        self.dependents
            .get(source)
            .is_some_and(|targets| targets.contains(target))
    }

    /// Every node reachable from `changed`, in depth-first discovery order.
    ///
    /// Each node is visited once per query. `changed` itself is only part of
    /// the result when it can reach itself.
    pub fn affected(&self, changed: &N) -> Vec<N> {
        let mut visited = BTreeSet::new();
        let mut result = vec![];
        let mut worklist: Vec<&N> = self.dependents(changed).collect();
        worklist.reverse();

        while let Some(node) = worklist.pop() {
            if !visited.insert(node) {
                continue;
            }
            result.push(node.clone());

            let mut next: Vec<&N> = self.dependents(node).collect();
            next.reverse();
            worklist.extend(next);
        }

        result
    }

    /// Finds a cycle using a depth-first search with an explicit recursion stack.
    ///
    /// The returned path starts and ends with the repeated node, so a
    /// self-edge on `a` yields `[a, a]`.
    pub fn detect_cycle(&self) -> Option<Vec<N>> {
        // Nodes whose every descendant has been explored.
        let mut done = BTreeSet::new();

        for root in &self.nodes {
            if done.contains(root) {
                continue;
            }

            // Current path and, per entry, the dependents still to explore.
            let mut path: Vec<&N> = vec![root];
            let mut on_path: BTreeSet<&N> = BTreeSet::from([root]);
            let mut pending: Vec<Vec<&N>> = vec![self.dependents(root).rev().collect()];

            while let Some(frame) = pending.last_mut() {
                match frame.pop() {
                    Some(next) if on_path.contains(next) => {
                        let start = path.iter().position(|n| *n == next).unwrap_or(0);
                        let mut cycle: Vec<N> = path[start..].iter().map(|n| (*n).clone()).collect();
                        cycle.push(next.clone());
                        return Some(cycle);
                    }
                    Some(next) if done.contains(next) => (),
                    Some(next) => {
                        path.push(next);
                        on_path.insert(next);
                        pending.push(self.dependents(next).rev().collect());
                    }
                    None => {
                        pending.pop();
                        if let Some(node) = path.pop() {
                            on_path.remove(node);
                            done.insert(node);
                        }
                    }
                }
            }
        }

        None
    }

    /// Topologically sorts every node, sources first. Ties are broken by node
    /// order so the result is deterministic.
    pub fn sort(&self) -> SortResult<N> {
        let mut in_degree: BTreeMap<&N, usize> = self.nodes.iter().map(|n| (n, 0)).collect();
        for targets in self.dependents.values() {
            for t in targets {
                *in_degree.entry(t).or_default() += 1;
            }
        }

        let mut ready: BTreeSet<&N> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(n, _)| *n)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(node) = ready.pop_first() {
            order.push(node.clone());
            for t in self.dependents(node) {
                if let Some(d) = in_degree.get_mut(t) {
                    *d -= 1;
                    if *d == 0 {
                        ready.insert(t);
                    }
                }
            }
        }

        if order.len() == self.nodes.len() {
            return SortResult::Order(order);
        }

        let stuck = in_degree
            .into_iter()
            .filter(|(_, d)| *d > 0)
            .map(|(n, _)| n.clone())
            .collect();
        SortResult::Cycle(order, stuck)
    }

    /// Returns `targets` in dependency order. Nodes that could not be ordered
    /// because of a cycle come last, in node order.
    pub fn order(&self, targets: &BTreeSet<N>) -> Vec<N> {
        let all = match self.sort() {
            SortResult::Order(order) => order,
            SortResult::Cycle(mut order, stuck) => {
                order.extend(stuck);
                order
            }
        };

        let mut result: Vec<N> = all.into_iter().filter(|n| targets.contains(n)).collect();
        // Targets that never made it into the graph have no ordering constraints.
        for t in targets {
            if !self.nodes.contains(t) {
                result.push(t.clone());
            }
        }
        result
    }
}
