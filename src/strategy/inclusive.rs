use super::branch;
use crate::config::ReturnConfig;
use crate::context::ReturnContext;
use crate::graph::NodeKind;
use std::sync::Arc;

pub(super) fn validate(ctx: &ReturnContext) -> bool {
    ctx.target.kind == NodeKind::InclusiveGateway && !ctx.target.outgoing.is_empty()
}

/// Only branches that currently carry work are rolled back.
pub(super) fn calculate_scope(ctx: &mut ReturnContext, config: &ReturnConfig) {
    let graph = Arc::clone(&ctx.graph);
    let gateway = ctx.target.clone();
    ctx.mark_inclusive_gateway();
    ctx.mark_special_handling();
    ctx.add_affected_gateway(&gateway.id);
    if let Some(join) = graph.find_corresponding_join(&gateway.id) {
        ctx.set_join_gateway(&join.id);
    }

    let outgoing = graph.outgoing(&gateway.id);
    for flow in &outgoing {
        let keys = branch::branch_keys(&graph, &gateway, flow);
        if branch::return_tasks_at(ctx, &keys) > 0 {
            ctx.add_branch_to_cleanup(&flow.id);
        }
    }
    if ctx.branches_to_cleanup().is_empty() {
        if let Some(fallback) = branch::fallback_flow(&graph, &gateway) {
            tracing::debug!(gateway = %gateway.id, flow = %fallback.id, "no active branch, falling back");
            ctx.add_branch_to_cleanup(&fallback.id);
        }
    }

    if config.reevaluate_conditions {
        let activated: Vec<String> = outgoing
            .iter()
            .filter(|f| !f.is_default)
            .filter(|f| f.condition.as_ref().is_none_or(|c| c.is_satisfied(&ctx.variables)))
            .map(|f| f.id.clone())
            .collect();
        if activated.is_empty() {
            if let Some(fallback) = branch::fallback_flow(&graph, &gateway) {
                ctx.add_selected_branch(&fallback.id);
            }
        }
        for flow_id in &activated {
            ctx.add_selected_branch(flow_id);
        }
    } else {
        let current: Vec<String> = ctx.branches_to_cleanup().to_vec();
        for flow_id in &current {
            ctx.add_selected_branch(flow_id);
        }
    }
}
