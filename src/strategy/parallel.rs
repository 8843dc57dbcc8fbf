use super::branch;
use crate::context::ReturnContext;
use crate::graph::NodeKind;
use std::sync::Arc;

pub(super) fn validate(ctx: &ReturnContext) -> bool {
    ctx.target.kind == NodeKind::ParallelGateway && !ctx.target.outgoing.is_empty()
}

/// Every branch is rolled back: the gateway forks all of them again.
pub(super) fn calculate_scope(ctx: &mut ReturnContext) {
    let graph = Arc::clone(&ctx.graph);
    let gateway = ctx.target.clone();
    ctx.mark_parallel_gateway();
    ctx.mark_special_handling();
    ctx.add_affected_gateway(&gateway.id);

    let mut keys = Vec::new();
    for flow in graph.outgoing(&gateway.id) {
        ctx.add_branch_to_cleanup(&flow.id);
        ctx.add_selected_branch(&flow.id);
        keys.extend(branch::branch_keys(&graph, &gateway, flow));
    }

    if let Some(join) = graph.find_corresponding_join(&gateway.id) {
        ctx.set_join_gateway(&join.id);
        keys.extend(
            graph
                .outgoing(&join.id)
                .into_iter()
                .filter(|f| graph.is_user_task(&f.target))
                .map(|f| f.target.clone()),
        );
    }

    let returned = branch::return_tasks_at(ctx, &keys);
    tracing::debug!(gateway = %gateway.id, branches = gateway.outgoing.len(), returned, "parallel gateway scope");
}
