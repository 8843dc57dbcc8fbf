//! Traversals over a `ProcessGraph`.

use super::model::{FlowNode, ProcessGraph};
use ahash::{AHashMap, AHashSet};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::VecDeque;

/// Direction of a walk along sequence flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl ProcessGraph {
    fn neighbours(&self, node_id: &str, direction: Direction) -> Vec<&str> {
        match direction {
            Direction::Forward => self
                .outgoing(node_id)
                .into_iter()
                .map(|f| f.target.as_str())
                .collect(),
            Direction::Backward => self
                .incoming(node_id)
                .into_iter()
                .map(|f| f.source.as_str())
                .collect(),
        }
    }

    /// Breadth-first distances from `start` (which itself is at distance 0).
    pub fn distances(&self, start: &str, direction: Direction) -> AHashMap<String, usize> {
        let mut distances = AHashMap::new();
        let mut queue = VecDeque::from([(start.to_string(), 0usize)]);
        distances.insert(start.to_string(), 0);
        while let Some((current, depth)) = queue.pop_front() {
            for next in self.neighbours(&current, direction) {
                if !distances.contains_key(next) {
                    distances.insert(next.to_string(), depth + 1);
                    queue.push_back((next.to_string(), depth + 1));
                }
            }
        }
        distances
    }

    /// Nodes reachable from `start` over at least one flow.
    pub fn reachable(&self, start: &str, direction: Direction) -> AHashSet<String> {
        let mut seen = AHashSet::new();
        let mut stack: Vec<&str> = self.neighbours(start, direction);
        while let Some(current) = stack.pop() {
            if seen.insert(current.to_string()) {
                stack.extend(self.neighbours(current, direction));
            }
        }
        seen
    }

    /// Walks forward from `start` (inclusive) in breadth-first order without
    /// expanding past nodes for which `stop` holds. Stop nodes are not returned.
    pub fn walk_until<F>(&self, start: &str, stop: F) -> Vec<&FlowNode>
    where
        F: Fn(&FlowNode) -> bool,
    {
        let mut visited = AHashSet::new();
        let mut queue = VecDeque::from([start]);
        let mut result = Vec::new();
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            let Some(node) = self.node(current) else {
                continue;
            };
            if stop(node) {
                continue;
            }
            result.push(node);
            queue.extend(self.outgoing(current).into_iter().map(|f| f.target.as_str()));
        }
        result
    }

    /// Whether `to` can be reached forward from `from` without passing through
    /// a gateway. `to` itself may be a gateway.
    pub fn reaches_without_gateway(&self, from: &str, to: &str) -> bool {
        let mut visited = AHashSet::new();
        let mut stack: Vec<&str> = self.neighbours(from, Direction::Forward);
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !visited.insert(current) || self.is_gateway(current) {
                continue;
            }
            stack.extend(self.neighbours(current, Direction::Forward));
        }
        false
    }

    /// Finds the join that closes a split gateway: the nearest gateway of the
    /// same kind that merges branches and is reachable from every outgoing branch.
    pub fn find_corresponding_join(&self, split_id: &str) -> Option<&FlowNode> {
        self.find_counterpart(split_id, Direction::Forward)
    }

    /// Finds the split that a join gateway closes.
    pub fn find_corresponding_split(&self, join_id: &str) -> Option<&FlowNode> {
        self.find_counterpart(join_id, Direction::Backward)
    }

    fn find_counterpart(&self, gateway_id: &str, direction: Direction) -> Option<&FlowNode> {
        let gateway = self.node(gateway_id)?;
        let branches = self.neighbours(gateway_id, direction);
        if !gateway.is_gateway() || branches.is_empty() {
            return None;
        }

        let mut common: Option<AHashSet<String>> = None;
        for branch in branches {
            let mut reach = self.reachable(branch, direction);
            reach.insert(branch.to_string());
            common = Some(match common {
                Some(acc) => acc.intersection(&reach).cloned().collect(),
                None => reach,
            });
        }

        let wanted = |node: &FlowNode| match direction {
            Direction::Forward => node.is_join(),
            Direction::Backward => node.is_split(),
        };
        let distances = self.distances(gateway_id, direction);
        common?
            .iter()
            .filter(|id| id.as_str() != gateway_id)
            .filter_map(|id| self.node(id))
            .filter(|node| node.kind == gateway.kind && wanted(node))
            .min_by_key(|node| {
                let distance = distances.get(&node.id).copied().unwrap_or(usize::MAX);
                (distance, node.id.clone())
            })
    }

    /// Builds a `petgraph` view of the process for whole-graph algorithms.
    pub fn to_digraph(&self) -> (DiGraph<&str, &str>, AHashMap<&str, NodeIndex>) {
        let mut graph = DiGraph::new();
        let mut index = AHashMap::new();
        for node in self.nodes() {
            index.insert(node.id.as_str(), graph.add_node(node.id.as_str()));
        }
        for flow in self.flows.values() {
            let source = index.get(flow.source.as_str());
            let target = index.get(flow.target.as_str());
            if let (Some(s), Some(t)) = (source, target) {
                graph.add_edge(*s, *t, flow.id.as_str());
            }
        }
        (graph, index)
    }
}
