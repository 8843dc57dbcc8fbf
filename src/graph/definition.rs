use serde::{Deserialize, Serialize};

/// The canonical, format-neutral description of a process definition.
///
/// This is the target structure for any custom process format and can also be
/// read directly from JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessDefinition {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub nodes: Vec<NodeDefinition>,
    pub flows: Vec<FlowDefinition>,
}

/// A single flow node (task, gateway or event).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDefinition {
    pub id: String,
    /// Kind name such as `userTask` or `exclusiveGateway`; aliases can be
    /// registered on the `GraphBuilder`.
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Id of the default outgoing sequence flow, if any.
    #[serde(default, alias = "default")]
    pub default_flow: Option<String>,
    #[serde(default)]
    pub multi_instance: Option<MultiInstanceDefinition>,
    /// Id of the enclosing sub-process.
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub service: Option<ServiceDefinition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiInstanceDefinition {
    #[serde(default)]
    pub sequential: bool,
    #[serde(default)]
    pub cardinality: Option<u32>,
    #[serde(default)]
    pub collection: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDefinition {
    #[serde(default)]
    pub implementation_type: Option<String>,
    #[serde(default)]
    pub implementation: Option<String>,
    #[serde(default)]
    pub asynchronous: bool,
    #[serde(default)]
    pub compensation_handler: Option<String>,
}

/// A sequence flow between two nodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowDefinition {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl ProcessDefinition {
    pub fn from_json_str(json: &str) -> Result<Self, crate::error::GraphError> {
        serde_json::from_str(json).map_err(|e| crate::error::GraphError::JsonParseError(e.to_string()))
    }
}
