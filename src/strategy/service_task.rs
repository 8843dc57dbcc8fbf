use super::branch;
use crate::context::ReturnContext;
use crate::graph::{Direction, NodeKind};
use std::sync::Arc;

pub(super) fn validate(ctx: &ReturnContext) -> bool {
    ctx.target.kind == NodeKind::ServiceTask
}

pub(super) fn calculate_scope(ctx: &mut ReturnContext) {
    let graph = Arc::clone(&ctx.graph);
    let target = ctx.target.clone();

    let downstream = graph.reachable(&target.id, Direction::Forward);
    let keys: Vec<String> = graph
        .nodes()
        .filter(|n| n.is_user_task() && downstream.contains(&n.id))
        .map(|n| n.id.clone())
        .collect();
    branch::return_tasks_at(ctx, &keys);

    if let Some(service) = &target.service {
        if service.asynchronous || service.is_stateful() || service.is_external() {
            tracing::debug!(
                service_task = %target.id,
                asynchronous = service.asynchronous,
                stateful = service.is_stateful(),
                external = service.is_external(),
                "service task needs special handling"
            );
            ctx.mark_special_handling();
        }
    }
}
