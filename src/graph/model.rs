use crate::condition::Condition;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a flow node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    UserTask,
    ServiceTask,
    ParallelGateway,
    InclusiveGateway,
    ExclusiveGateway,
    StartEvent,
    EndEvent,
    SubProcess,
    Other(String),
}

impl NodeKind {
    /// Resolves one of the canonical kind names (`userTask`, `parallelGateway`, ...).
    pub fn from_name(name: &str) -> Option<NodeKind> {
        let kind = match name {
            "userTask" => NodeKind::UserTask,
            "serviceTask" => NodeKind::ServiceTask,
            "parallelGateway" => NodeKind::ParallelGateway,
            "inclusiveGateway" => NodeKind::InclusiveGateway,
            "exclusiveGateway" => NodeKind::ExclusiveGateway,
            "startEvent" => NodeKind::StartEvent,
            "endEvent" => NodeKind::EndEvent,
            "subProcess" => NodeKind::SubProcess,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_gateway(&self) -> bool {
        matches!(
            self,
            NodeKind::ParallelGateway | NodeKind::InclusiveGateway | NodeKind::ExclusiveGateway
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::UserTask => "userTask",
            NodeKind::ServiceTask => "serviceTask",
            NodeKind::ParallelGateway => "parallelGateway",
            NodeKind::InclusiveGateway => "inclusiveGateway",
            NodeKind::ExclusiveGateway => "exclusiveGateway",
            NodeKind::StartEvent => "startEvent",
            NodeKind::EndEvent => "endEvent",
            NodeKind::SubProcess => "subProcess",
            NodeKind::Other(name) => name.as_str(),
        };
        write!(f, "{}", name)
    }
}

/// Multi-instance loop characteristics of an activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiInstance {
    pub sequential: bool,
    pub cardinality: Option<u32>,
    pub collection: Option<String>,
}

/// How a service task is implemented.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceImplementation {
    pub implementation_type: Option<String>,
    pub implementation: Option<String>,
    pub asynchronous: bool,
    pub compensation_handler: Option<String>,
}

impl ServiceImplementation {
    /// Keeps state between invocations.
    pub fn is_stateful(&self) -> bool {
        self.implementation
            .as_deref()
            .is_some_and(|i| i.contains("stateful"))
    }

    /// Calls out to a system outside the process engine.
    pub fn is_external(&self) -> bool {
        let external_type = matches!(
            self.implementation_type.as_deref(),
            Some("webService") | Some("external")
        );
        external_type
            || self
                .implementation
                .as_deref()
                .is_some_and(|i| i.contains("external"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: String,
    pub name: Option<String>,
    pub kind: NodeKind,
    pub multi_instance: Option<MultiInstance>,
    pub default_flow: Option<String>,
    /// Id of the enclosing sub-process, `None` at process level.
    pub scope: Option<String>,
    pub service: Option<ServiceImplementation>,
    /// Incoming sequence-flow ids in declaration order.
    pub incoming: Vec<String>,
    /// Outgoing sequence-flow ids in declaration order.
    pub outgoing: Vec<String>,
}

impl FlowNode {
    pub fn is_gateway(&self) -> bool {
        self.kind.is_gateway()
    }

    pub fn is_user_task(&self) -> bool {
        self.kind == NodeKind::UserTask
    }

    /// Merges several branches into one.
    pub fn is_join(&self) -> bool {
        self.incoming.len() > 1 && self.outgoing.len() == 1
    }

    /// Forks into several branches.
    pub fn is_split(&self) -> bool {
        self.outgoing.len() > 1
    }

    pub fn is_multi_instance(&self) -> bool {
        self.multi_instance.is_some()
    }

    pub fn is_parallel_multi_instance(&self) -> bool {
        self.multi_instance.as_ref().is_some_and(|mi| !mi.sequential)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceFlow {
    pub id: String,
    pub source: String,
    pub target: String,
    pub condition: Option<Condition>,
    pub is_default: bool,
}

/// An immutable, validated view of one process definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessGraph {
    pub id: String,
    pub name: Option<String>,
    pub(crate) nodes: AHashMap<String, FlowNode>,
    pub(crate) flows: AHashMap<String, SequenceFlow>,
    /// Node ids in declaration order, for deterministic iteration.
    pub(crate) order: Vec<String>,
}

impl ProcessGraph {
    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.get(id)
    }

    pub fn flow(&self, id: &str) -> Option<&SequenceFlow> {
        self.flows.get(id)
    }

    /// All nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &FlowNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn flow_count(&self) -> usize {
        self.flows.len()
    }

    /// Incoming flows of a node; empty for an unknown node.
    pub fn incoming(&self, node_id: &str) -> Vec<&SequenceFlow> {
        self.node(node_id)
            .map(|n| n.incoming.iter().filter_map(|f| self.flows.get(f)).collect())
            .unwrap_or_default()
    }

    /// Outgoing flows of a node; empty for an unknown node.
    pub fn outgoing(&self, node_id: &str) -> Vec<&SequenceFlow> {
        self.node(node_id)
            .map(|n| n.outgoing.iter().filter_map(|f| self.flows.get(f)).collect())
            .unwrap_or_default()
    }

    pub fn is_gateway(&self, node_id: &str) -> bool {
        self.node(node_id).is_some_and(FlowNode::is_gateway)
    }

    pub fn is_user_task(&self, node_id: &str) -> bool {
        self.node(node_id).is_some_and(FlowNode::is_user_task)
    }
}
