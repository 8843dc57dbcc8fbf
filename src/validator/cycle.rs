use crate::graph::{NodeKind, ProcessGraph};
use crate::runtime::ReturnRecord;
use ahash::{AHashMap, AHashSet};
use petgraph::algo::tarjan_scc;
use std::fmt;

/// Why a return was judged circular.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleKind {
    /// The target lies straight downstream of the source.
    Direct,
    /// Earlier returns already lead from the target back to the source.
    History,
    /// A parallel or inclusive gateway on the path loops back to the source
    /// without passing the target.
    Gateway(String),
    /// The analysis itself failed.
    Unverifiable(String),
}

impl fmt::Display for CycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleKind::Direct => write!(f, "target is downstream of the source"),
            CycleKind::History => write!(f, "earlier returns lead back to the source"),
            CycleKind::Gateway(id) => write!(f, "gateway '{}' loops back to the source", id),
            CycleKind::Unverifiable(msg) => write!(f, "cycle analysis failed: {}", msg),
        }
    }
}

pub(super) fn detect(
    graph: &ProcessGraph,
    source: &str,
    target: &str,
    path: &[String],
    history: &[ReturnRecord],
) -> Option<CycleKind> {
    if graph.reaches_without_gateway(source, target) {
        return Some(CycleKind::Direct);
    }
    if history_cycle(source, target, history) {
        return Some(CycleKind::History);
    }
    gateway_cycle(graph, source, target, path).map(CycleKind::Gateway)
}

/// Follows recorded returns from `target`; reaching `source` closes a loop.
fn history_cycle(source: &str, target: &str, history: &[ReturnRecord]) -> bool {
    let mut edges: AHashMap<&str, Vec<&str>> = AHashMap::new();
    for record in history {
        edges
            .entry(record.source_key.as_str())
            .or_default()
            .push(record.target_key.as_str());
    }

    let mut seen = AHashSet::new();
    let mut stack = vec![target];
    while let Some(current) = stack.pop() {
        if !seen.insert(current) {
            continue;
        }
        for next in edges.get(current).into_iter().flatten() {
            if *next == source {
                return true;
            }
            stack.push(*next);
        }
    }
    false
}

/// A parallel or inclusive gateway on the path that still loops back to the
/// source once every flow into the target is cut. Loops through the target
/// are the return itself.
fn gateway_cycle(graph: &ProcessGraph, source: &str, target: &str, path: &[String]) -> Option<String> {
    let (mut digraph, index) = graph.to_digraph();
    let source_index = *index.get(source)?;
    if let Some(&target_index) = index.get(target) {
        digraph.retain_edges(|g, edge| {
            g.edge_endpoints(edge)
                .is_none_or(|(_, to)| to != target_index)
        });
    }
    let component = tarjan_scc(&digraph)
        .into_iter()
        .find(|scc| scc.contains(&source_index))?;
    if component.len() < 2 {
        return None;
    }
    let members: AHashSet<&str> = component.iter().map(|i| digraph[*i]).collect();

    path.iter()
        .filter_map(|id| graph.node(id))
        .find(|node| {
            matches!(node.kind, NodeKind::ParallelGateway | NodeKind::InclusiveGateway)
                && members.contains(node.id.as_str())
        })
        .map(|node| node.id.clone())
}
