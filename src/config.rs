use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;

/// How split and join gateways on a return path are matched up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingRule {
    /// Every join on the path must close a split that is also on the path,
    /// found by walking the graph.
    #[default]
    JoinDiscovery,
    /// Only checks that parallel and inclusive gateways appear in even numbers.
    Parity,
}

/// Tunables of the return engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReturnConfig {
    /// Depth bound of the backward path search.
    pub max_search_depth: usize,
    pub pairing_rule: PairingRule,
    /// Re-derive gateway branch selection from the current process variables.
    pub reevaluate_conditions: bool,
    /// Run the repair pass after the move.
    pub cleanup_enabled: bool,
}

impl Default for ReturnConfig {
    fn default() -> Self {
        Self {
            max_search_depth: 100,
            pairing_rule: PairingRule::default(),
            reevaluate_conditions: true,
            cleanup_enabled: true,
        }
    }
}

impl ReturnConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&content)
    }
}
