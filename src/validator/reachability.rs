use crate::graph::{Direction, NodeKind, ProcessGraph};
use ahash::AHashSet;

/// Backward depth-first search from `source` towards `target` along incoming flows.
///
/// Every path carries its own visited set. A parallel gateway is never walked
/// through: it counts when it is the target itself, and a parallel join is
/// hopped over as a whole region by resuming at its matching split.
pub(super) fn is_reachable(graph: &ProcessGraph, source: &str, target: &str, max_depth: usize) -> bool {
    search(graph, source, target, 0, max_depth, &AHashSet::new())
}

fn search(
    graph: &ProcessGraph,
    current: &str,
    target: &str,
    depth: usize,
    max_depth: usize,
    visited: &AHashSet<String>,
) -> bool {
    if current == target {
        return true;
    }
    if depth >= max_depth {
        tracing::warn!(node = %current, depth, "return path search hit the depth bound");
        return false;
    }

    let mut path = visited.clone();
    path.insert(current.to_string());

    for flow in graph.incoming(current) {
        let predecessor = flow.source.as_str();
        if path.contains(predecessor) {
            continue;
        }
        let Some(node) = graph.node(predecessor) else {
            continue;
        };

        if node.kind == NodeKind::ParallelGateway {
            if predecessor == target {
                return true;
            }
            if !node.is_join() {
                continue;
            }
            let Some(split) = graph.find_corresponding_split(predecessor) else {
                continue;
            };
            if path.contains(&split.id) {
                continue;
            }
            let mut region = path.clone();
            region.insert(predecessor.to_string());
            if search(graph, &split.id, target, depth + 1, max_depth, &region) {
                return true;
            }
            continue;
        }

        if search(graph, predecessor, target, depth + 1, max_depth, &path) {
            return true;
        }
    }
    false
}

/// Nodes lying on some path from `target` to `source`, both included, in
/// declaration order.
pub(super) fn return_path(graph: &ProcessGraph, source: &str, target: &str) -> Vec<String> {
    let mut upstream = graph.reachable(source, Direction::Backward);
    upstream.insert(source.to_string());
    let mut downstream = graph.reachable(target, Direction::Forward);
    downstream.insert(target.to_string());

    graph
        .nodes()
        .filter(|n| upstream.contains(&n.id) && downstream.contains(&n.id))
        .map(|n| n.id.clone())
        .collect()
}
