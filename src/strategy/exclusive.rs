use super::branch;
use crate::config::ReturnConfig;
use crate::context::ReturnContext;
use crate::graph::{NodeKind, ProcessGraph, SequenceFlow};
use std::sync::Arc;

pub(super) fn validate(ctx: &ReturnContext) -> bool {
    ctx.target.kind == NodeKind::ExclusiveGateway && !ctx.target.outgoing.is_empty()
}

/// The flow an exclusive gateway takes for the given variables: the first
/// non-default flow whose condition holds (no condition counts as holding),
/// else the default flow, else the first flow.
pub fn select_flow<'g>(
    graph: &'g ProcessGraph,
    gateway_id: &str,
    variables: &crate::condition::Variables,
) -> Option<&'g SequenceFlow> {
    let gateway = graph.node(gateway_id)?;
    graph
        .outgoing(gateway_id)
        .into_iter()
        .filter(|f| !f.is_default)
        .find(|f| f.condition.as_ref().is_none_or(|c| c.is_satisfied(variables)))
        .or_else(|| branch::fallback_flow(graph, gateway))
}

pub(super) fn calculate_scope(ctx: &mut ReturnContext, config: &ReturnConfig) {
    let graph = Arc::clone(&ctx.graph);
    let gateway = ctx.target.clone();
    ctx.mark_special_handling();
    ctx.add_affected_gateway(&gateway.id);

    for flow in graph.outgoing(&gateway.id) {
        let keys = branch::branch_keys(&graph, &gateway, flow);
        if branch::return_tasks_at(ctx, &keys) > 0 {
            tracing::debug!(gateway = %gateway.id, flow = %flow.id, "current exclusive branch");
            ctx.add_branch_to_cleanup(&flow.id);
            break;
        }
    }

    if config.reevaluate_conditions {
        if let Some(selected) = select_flow(&graph, &gateway.id, &ctx.variables) {
            ctx.add_selected_branch(&selected.id);
        }
    } else if let Some(current) = ctx.branches_to_cleanup().first().cloned() {
        ctx.add_selected_branch(&current);
    }
}
