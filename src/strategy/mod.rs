//! Per-target-kind scope calculation.

mod branch;
mod exclusive;
mod inclusive;
mod parallel;
mod service_task;
mod user_task;

pub use exclusive::select_flow;
pub use user_task::expected_instances;

use crate::config::ReturnConfig;
use crate::context::ReturnContext;
use crate::graph::NodeKind;

/// The scope rules for one kind of return target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnStrategy {
    UserTask,
    ParallelGateway,
    InclusiveGateway,
    ExclusiveGateway,
    ServiceTask,
}

impl ReturnStrategy {
    /// The strategy for a target kind, `None` if the kind cannot be returned to.
    pub fn for_kind(kind: &NodeKind) -> Option<Self> {
        match kind {
            NodeKind::UserTask => Some(ReturnStrategy::UserTask),
            NodeKind::ParallelGateway => Some(ReturnStrategy::ParallelGateway),
            NodeKind::InclusiveGateway => Some(ReturnStrategy::InclusiveGateway),
            NodeKind::ExclusiveGateway => Some(ReturnStrategy::ExclusiveGateway),
            NodeKind::ServiceTask => Some(ReturnStrategy::ServiceTask),
            NodeKind::StartEvent | NodeKind::EndEvent | NodeKind::SubProcess | NodeKind::Other(_) => {
                None
            }
        }
    }

    pub fn supported_kind(&self) -> NodeKind {
        match self {
            ReturnStrategy::UserTask => NodeKind::UserTask,
            ReturnStrategy::ParallelGateway => NodeKind::ParallelGateway,
            ReturnStrategy::InclusiveGateway => NodeKind::InclusiveGateway,
            ReturnStrategy::ExclusiveGateway => NodeKind::ExclusiveGateway,
            ReturnStrategy::ServiceTask => NodeKind::ServiceTask,
        }
    }

    pub fn validate(&self, ctx: &ReturnContext) -> bool {
        match self {
            ReturnStrategy::UserTask => user_task::validate(ctx),
            ReturnStrategy::ParallelGateway => parallel::validate(ctx),
            ReturnStrategy::InclusiveGateway => inclusive::validate(ctx),
            ReturnStrategy::ExclusiveGateway => exclusive::validate(ctx),
            ReturnStrategy::ServiceTask => service_task::validate(ctx),
        }
    }

    /// Fills the context's scope. Only ever adds to what is already there.
    pub fn calculate_scope(&self, ctx: &mut ReturnContext, config: &ReturnConfig) {
        match self {
            ReturnStrategy::UserTask => user_task::calculate_scope(ctx),
            ReturnStrategy::ParallelGateway => parallel::calculate_scope(ctx),
            ReturnStrategy::InclusiveGateway => inclusive::calculate_scope(ctx, config),
            ReturnStrategy::ExclusiveGateway => exclusive::calculate_scope(ctx, config),
            ReturnStrategy::ServiceTask => service_task::calculate_scope(ctx),
        }
        tracing::debug!(strategy = ?self, summary = %ctx.summary(), "scope calculated");
    }
}
