//! Static checks deciding whether a return from one node to another is allowed.

mod cycle;
mod pairing;
mod reachability;

pub use cycle::CycleKind;

use crate::config::ReturnConfig;
use crate::context::ReturnContext;
use crate::graph::{FlowNode, NodeKind, ProcessGraph};
use crate::runtime::{ReturnHistory, ReturnRecord};
use crate::strategy::ReturnStrategy;
use std::fmt;

/// Why a return was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    UnknownNode(String),
    SameNode,
    UnsupportedTarget(NodeKind),
    Unreachable,
    IncompatibleGateway(String),
    UnpairedGateway(String),
    CrossesSubProcess,
    MultiInstance(String),
    Circular(CycleKind),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::UnknownNode(id) => write!(f, "node '{}' does not exist", id),
            Rejection::SameNode => write!(f, "source and target are the same node"),
            Rejection::UnsupportedTarget(kind) => write!(f, "'{}' nodes cannot be return targets", kind),
            Rejection::Unreachable => write!(f, "no backward path leads to the target"),
            Rejection::IncompatibleGateway(id) => write!(f, "gateway '{}' has no outgoing flow", id),
            Rejection::UnpairedGateway(id) => write!(f, "gateway '{}' is not paired on the path", id),
            Rejection::CrossesSubProcess => write!(f, "source and target are in different sub-processes"),
            Rejection::MultiInstance(msg) => write!(f, "multi-instance state cannot be preserved: {}", msg),
            Rejection::Circular(kind) => write!(f, "circular return: {}", kind),
        }
    }
}

/// Validates return paths over one process graph.
pub struct ReturnValidator<'a> {
    graph: &'a ProcessGraph,
    config: &'a ReturnConfig,
}

impl<'a> ReturnValidator<'a> {
    pub fn new(graph: &'a ProcessGraph, config: &'a ReturnConfig) -> Self {
        Self { graph, config }
    }

    fn resolve(&self, id: &str) -> Result<&'a FlowNode, Rejection> {
        self.graph
            .node(id)
            .ok_or_else(|| Rejection::UnknownNode(id.to_string()))
    }

    /// Graph-only checks. On success returns the nodes on the return path.
    pub fn check_path(&self, source_id: &str, target_id: &str) -> Result<Vec<String>, Rejection> {
        let source = self.resolve(source_id)?;
        let target = self.resolve(target_id)?;
        if source.id == target.id {
            return Err(Rejection::SameNode);
        }
        if ReturnStrategy::for_kind(&target.kind).is_none() {
            return Err(Rejection::UnsupportedTarget(target.kind.clone()));
        }
        if source.scope != target.scope {
            return Err(Rejection::CrossesSubProcess);
        }
        if self.graph.reaches_without_gateway(source_id, target_id) {
            return Err(Rejection::Circular(CycleKind::Direct));
        }
        if !reachability::is_reachable(self.graph, source_id, target_id, self.config.max_search_depth) {
            return Err(Rejection::Unreachable);
        }

        let path = reachability::return_path(self.graph, source_id, target_id);
        pairing::check_gateways(self.graph, &path, target_id, self.config.pairing_rule)?;

        if let Some(mi) = &target.multi_instance {
            if !mi.sequential && mi.cardinality.is_none() && mi.collection.is_none() {
                return Err(Rejection::MultiInstance(format!(
                    "'{}' declares neither a cardinality nor a collection",
                    target.id
                )));
            }
        }
        Ok(path)
    }

    /// Whether a backward path leads from the source to the target. A target
    /// lying straight downstream of the source never counts as reachable.
    pub fn is_reachable(&self, source_id: &str, target_id: &str) -> bool {
        !self.graph.reaches_without_gateway(source_id, target_id)
            && reachability::is_reachable(self.graph, source_id, target_id, self.config.max_search_depth)
    }

    /// Full validation of a built context, including the live multi-instance state.
    pub fn check(&self, ctx: &ReturnContext) -> Result<Vec<String>, Rejection> {
        let path = self.check_path(&ctx.source.id, &ctx.target.id)?;

        if let Some(cardinality) = ctx.source.multi_instance.as_ref().and_then(|mi| mi.cardinality) {
            let running = ctx
                .active_tasks
                .iter()
                .filter(|t| t.definition_key == ctx.source.id && t.is_active())
                .count();
            if running > cardinality as usize {
                return Err(Rejection::MultiInstance(format!(
                    "'{}' has {} active instances but a cardinality of {}",
                    ctx.source.id, running, cardinality
                )));
            }
        }
        Ok(path)
    }

    pub fn validate(&self, ctx: &ReturnContext) -> bool {
        match self.check(ctx) {
            Ok(_) => true,
            Err(rejection) => {
                tracing::warn!(
                    source = %ctx.source.id,
                    target = %ctx.target.id,
                    %rejection,
                    "return rejected by validation"
                );
                false
            }
        }
    }

    /// Cycle analysis against a known return history.
    pub fn detect_cycle(
        &self,
        source_id: &str,
        target_id: &str,
        history: &[ReturnRecord],
    ) -> Option<CycleKind> {
        let path = reachability::return_path(self.graph, source_id, target_id);
        cycle::detect(self.graph, source_id, target_id, &path, history)
    }

    /// Whether the return would close a loop. Fails closed: if the history
    /// cannot be read the return is treated as circular.
    pub fn has_circular_return(&self, ctx: &ReturnContext, history: &dyn ReturnHistory) -> bool {
        let records = match history.returns(&ctx.process_instance_id) {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(instance = %ctx.process_instance_id, error = %e, "return history unavailable");
                return true;
            }
        };
        match self.detect_cycle(&ctx.source.id, &ctx.target.id, &records) {
            Some(kind) => {
                tracing::warn!(source = %ctx.source.id, target = %ctx.target.id, %kind, "circular return detected");
                true
            }
            None => false,
        }
    }
}
