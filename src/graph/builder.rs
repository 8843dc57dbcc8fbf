use super::definition::{NodeDefinition, ProcessDefinition};
use super::model::{FlowNode, MultiInstance, NodeKind, ProcessGraph, SequenceFlow, ServiceImplementation};
use crate::condition::Condition;
use crate::error::GraphError;
use ahash::AHashMap;

/// Turns a `ProcessDefinition` into a validated `ProcessGraph`.
pub struct GraphBuilder {
    definition: ProcessDefinition,
    aliases: AHashMap<String, NodeKind>,
}

impl GraphBuilder {
    pub fn new(definition: ProcessDefinition) -> Self {
        Self {
            definition,
            aliases: AHashMap::new(),
        }
    }

    /// Maps a custom kind name onto one of the built-in node kinds.
    pub fn with_kind_alias(mut self, user_kind_name: &str, kind: NodeKind) -> Self {
        self.aliases.insert(user_kind_name.to_string(), kind);
        self
    }

    fn resolve_kind(&self, node: &NodeDefinition) -> Result<NodeKind, GraphError> {
        if node.kind.trim().is_empty() {
            return Err(GraphError::InvalidNodeKind {
                node_id: node.id.clone(),
                kind_name: node.kind.clone(),
            });
        }
        Ok(self
            .aliases
            .get(&node.kind)
            .cloned()
            .or_else(|| NodeKind::from_name(&node.kind))
            .unwrap_or_else(|| NodeKind::Other(node.kind.clone())))
    }

    pub fn build(self) -> Result<ProcessGraph, GraphError> {
        let mut nodes: AHashMap<String, FlowNode> = AHashMap::new();
        let mut order = Vec::with_capacity(self.definition.nodes.len());

        for def in &self.definition.nodes {
            if nodes.contains_key(&def.id) {
                return Err(GraphError::DuplicateNode(def.id.clone()));
            }
            let kind = self.resolve_kind(def)?;
            let node = FlowNode {
                id: def.id.clone(),
                name: def.name.clone(),
                kind,
                multi_instance: def.multi_instance.as_ref().map(|mi| MultiInstance {
                    sequential: mi.sequential,
                    cardinality: mi.cardinality,
                    collection: mi.collection.clone(),
                }),
                default_flow: def.default_flow.clone(),
                scope: def.scope.clone(),
                service: def.service.as_ref().map(|s| ServiceImplementation {
                    implementation_type: s.implementation_type.clone(),
                    implementation: s.implementation.clone(),
                    asynchronous: s.asynchronous,
                    compensation_handler: s.compensation_handler.clone(),
                }),
                incoming: Vec::new(),
                outgoing: Vec::new(),
            };
            order.push(def.id.clone());
            nodes.insert(def.id.clone(), node);
        }

        let mut flows: AHashMap<String, SequenceFlow> = AHashMap::new();
        for def in &self.definition.flows {
            if flows.contains_key(&def.id) {
                return Err(GraphError::DuplicateFlow(def.id.clone()));
            }
            for endpoint in [&def.source, &def.target] {
                if !nodes.contains_key(endpoint) {
                    return Err(GraphError::NodeNotFound {
                        missing_node_id: endpoint.clone(),
                        flow_id: def.id.clone(),
                    });
                }
            }
            let condition = def
                .condition
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .map(Condition::parse)
                .transpose()
                .map_err(|source| GraphError::InvalidCondition {
                    flow_id: def.id.clone(),
                    source,
                })?;

            if let Some(source) = nodes.get_mut(&def.source) {
                source.outgoing.push(def.id.clone());
                if def.is_default && source.default_flow.is_none() {
                    source.default_flow = Some(def.id.clone());
                }
            }
            if let Some(target) = nodes.get_mut(&def.target) {
                target.incoming.push(def.id.clone());
            }
            flows.insert(
                def.id.clone(),
                SequenceFlow {
                    id: def.id.clone(),
                    source: def.source.clone(),
                    target: def.target.clone(),
                    condition,
                    is_default: def.is_default,
                },
            );
        }

        for node in nodes.values() {
            if let Some(default_flow) = &node.default_flow {
                if !node.outgoing.contains(default_flow) {
                    return Err(GraphError::InvalidDefaultFlow {
                        node_id: node.id.clone(),
                        flow_id: default_flow.clone(),
                    });
                }
                if let Some(flow) = flows.get_mut(default_flow) {
                    flow.is_default = true;
                }
            }
            if node.is_gateway() && !node.incoming.is_empty() && node.outgoing.is_empty() {
                return Err(GraphError::DeadEndGateway(node.id.clone()));
            }
        }

        tracing::debug!(
            definition = %self.definition.id,
            nodes = nodes.len(),
            flows = flows.len(),
            "process graph built"
        );

        Ok(ProcessGraph {
            id: self.definition.id,
            name: self.definition.name,
            nodes,
            flows,
            order,
        })
    }
}

impl ProcessGraph {
    pub fn builder(definition: ProcessDefinition) -> GraphBuilder {
        GraphBuilder::new(definition)
    }
}
