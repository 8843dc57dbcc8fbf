use super::Rejection;
use crate::config::PairingRule;
use crate::graph::{FlowNode, NodeKind, ProcessGraph};

fn is_pairable(node: &FlowNode) -> bool {
    matches!(node.kind, NodeKind::ParallelGateway | NodeKind::InclusiveGateway)
}

/// A gateway must have somewhere to route a returned token.
fn validate_gateway(graph: &ProcessGraph, gateway: &FlowNode) -> Result<(), Rejection> {
    let outgoing = graph.outgoing(&gateway.id);
    if outgoing.is_empty() {
        return Err(Rejection::IncompatibleGateway(gateway.id.clone()));
    }
    if matches!(gateway.kind, NodeKind::ExclusiveGateway | NodeKind::InclusiveGateway)
        && gateway.default_flow.is_none()
        && outgoing.iter().all(|f| f.condition.is_some())
    {
        tracing::debug!(gateway = %gateway.id, "gateway has neither a default nor an unconditional flow");
    }
    Ok(())
}

/// Checks every gateway on the return path and how splits pair with joins.
pub(super) fn check_gateways(
    graph: &ProcessGraph,
    path: &[String],
    target: &str,
    rule: PairingRule,
) -> Result<(), Rejection> {
    let gateways: Vec<&FlowNode> = path
        .iter()
        .filter_map(|id| graph.node(id))
        .filter(|n| n.is_gateway())
        .collect();

    for gateway in &gateways {
        validate_gateway(graph, gateway)?;
    }

    match rule {
        PairingRule::Parity => {
            for kind in [NodeKind::ParallelGateway, NodeKind::InclusiveGateway] {
                let count = gateways.iter().filter(|g| g.kind == kind).count();
                if count % 2 != 0 {
                    return Err(Rejection::UnpairedGateway(kind.to_string()));
                }
            }
            Ok(())
        }
        PairingRule::JoinDiscovery => {
            let on_path = |id: &str| path.iter().any(|p| p == id);
            for gateway in gateways.iter().filter(|g| is_pairable(g)) {
                if gateway.is_join() {
                    let paired = graph
                        .find_corresponding_split(&gateway.id)
                        .is_some_and(|split| on_path(&split.id));
                    if !paired {
                        return Err(Rejection::UnpairedGateway(gateway.id.clone()));
                    }
                } else if gateway.is_split() && gateway.id != target {
                    let paired = graph
                        .find_corresponding_join(&gateway.id)
                        .is_some_and(|join| on_path(&join.id));
                    if !paired {
                        return Err(Rejection::UnpairedGateway(gateway.id.clone()));
                    }
                }
            }
            Ok(())
        }
    }
}
