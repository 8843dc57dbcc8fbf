use super::branch;
use crate::ast::Value;
use crate::condition::Variables;
use crate::context::{MultiInstanceReset, ReturnContext};
use crate::graph::{FlowNode, NodeKind};
use std::sync::Arc;

pub(super) fn validate(ctx: &ReturnContext) -> bool {
    ctx.target.is_user_task()
}

/// Instances a parallel multi-instance node should run with: its declared
/// cardinality, else the engine's `nrOfInstances_<key>` counter, else one.
pub fn expected_instances(node: &FlowNode, variables: &Variables) -> usize {
    if let Some(cardinality) = node.multi_instance.as_ref().and_then(|mi| mi.cardinality) {
        return cardinality.max(1) as usize;
    }
    match variables.get(&format!("nrOfInstances_{}", node.id)) {
        Some(Value::Number(n)) if *n >= 1.0 => *n as usize,
        _ => 1,
    }
}

pub(super) fn calculate_scope(ctx: &mut ReturnContext) {
    let graph = Arc::clone(&ctx.graph);
    let target_id = ctx.target.id.clone();

    let keys: Vec<String> = graph
        .walk_until(&target_id, |n| n.id != target_id && n.is_gateway() && n.is_join())
        .into_iter()
        .map(|n| n.id.clone())
        .collect();
    tracing::debug!(target = %target_id, keys = ?keys, "user task scope");
    branch::return_tasks_at(ctx, &keys);

    if let Some(mi) = ctx.target.multi_instance.clone() {
        ctx.mark_multi_instance_return();
        ctx.mark_special_handling();
        let reset = if mi.sequential {
            MultiInstanceReset::FirstInstance
        } else {
            MultiInstanceReset::RecreateAll {
                expected: expected_instances(&ctx.target, &ctx.variables),
            }
        };
        ctx.set_multi_instance_reset(reset);
    }

    let path_gateways: Vec<FlowNode> = ctx
        .return_path
        .iter()
        .filter_map(|id| graph.node(id))
        .filter(|n| n.is_gateway())
        .cloned()
        .collect();
    for gateway in path_gateways {
        ctx.add_affected_gateway(&gateway.id);
        ctx.mark_special_handling();
        match gateway.kind {
            NodeKind::ParallelGateway => ctx.mark_parallel_gateway(),
            NodeKind::InclusiveGateway => ctx.mark_inclusive_gateway(),
            _ => {}
        }
    }
}
