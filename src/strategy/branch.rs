//! Branch walks shared by the gateway strategies.

use crate::context::ReturnContext;
use crate::graph::{FlowNode, ProcessGraph, SequenceFlow};

/// Node ids of the branch that starts with `flow`, ending before the first
/// join of the same kind as `gateway`.
pub(super) fn branch_keys(graph: &ProcessGraph, gateway: &FlowNode, flow: &SequenceFlow) -> Vec<String> {
    graph
        .walk_until(&flow.target, |n| n.kind == gateway.kind && n.is_join())
        .into_iter()
        .map(|n| n.id.clone())
        .collect()
}

/// Adds the active tasks sitting on `keys`; returns how many matched.
pub(super) fn return_tasks_at(ctx: &mut ReturnContext, keys: &[String]) -> usize {
    let tasks: Vec<_> = ctx.active_tasks_at(keys).cloned().collect();
    for task in &tasks {
        tracing::debug!(task = %task.id, key = %task.definition_key, "task in return scope");
        ctx.add_task_to_return(task);
    }
    tasks.len()
}

/// Picks the flow a gateway falls back to: its default flow, else the first one.
pub(super) fn fallback_flow<'g>(graph: &'g ProcessGraph, gateway: &FlowNode) -> Option<&'g SequenceFlow> {
    gateway
        .default_flow
        .as_deref()
        .and_then(|id| graph.flow(id))
        .or_else(|| graph.outgoing(&gateway.id).into_iter().next())
}
