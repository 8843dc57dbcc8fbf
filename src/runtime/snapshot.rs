use super::{Execution, ProcessInstance, ReturnRecord, RuntimeTask};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fs;

/// Serializable runtime state: instances, executions, active tasks and variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSnapshot {
    #[serde(default)]
    pub instances: Vec<ProcessInstance>,
    #[serde(default)]
    pub executions: Vec<Execution>,
    #[serde(default)]
    pub tasks: Vec<RuntimeTask>,
    /// Process variables per instance id.
    #[serde(default)]
    pub variables: AHashMap<String, AHashMap<String, serde_json::Value>>,
    #[serde(default)]
    pub history: Vec<ReturnRecord>,
}

impl RuntimeSnapshot {
    /// Load a snapshot from a JSON file.
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let snapshot = serde_json::from_str(&content)?;
        Ok(snapshot)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
