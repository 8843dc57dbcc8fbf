use crate::ast::Value;
use thiserror::Error;

/// Errors raised while turning a process definition into a `ProcessGraph`.
#[derive(Error, Debug, Clone)]
pub enum GraphError {
    #[error("Failed to parse process definition JSON: {0}")]
    JsonParseError(String),

    #[error("Duplicate node id '{0}' in process definition")]
    DuplicateNode(String),

    #[error("Duplicate sequence flow id '{0}' in process definition")]
    DuplicateFlow(String),

    #[error(
        "Node '{missing_node_id}' not found, which is required by sequence flow '{flow_id}'"
    )]
    NodeNotFound {
        missing_node_id: String,
        flow_id: String,
    },

    #[error("Node '{node_id}' has an unregistered or invalid kind: '{kind_name}'")]
    InvalidNodeKind { node_id: String, kind_name: String },

    #[error("Gateway '{0}' has incoming flows but no outgoing flow")]
    DeadEndGateway(String),

    #[error("Default flow '{flow_id}' of node '{node_id}' does not leave that node")]
    InvalidDefaultFlow { node_id: String, flow_id: String },

    #[error("Condition on sequence flow '{flow_id}' could not be parsed: {source}")]
    InvalidCondition {
        flow_id: String,
        source: ConditionParseError,
    },

    #[error("Process definition '{0}' is not available")]
    DefinitionNotFound(String),
}

/// A syntax error inside a gateway condition expression.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} at offset {position}")]
pub struct ConditionParseError {
    pub position: usize,
    pub message: String,
}

/// Errors that can occur while evaluating a condition expression.
#[derive(Error, Debug, Clone)]
pub enum EvaluationError {
    #[error(
        "Type mismatch during operation '{operation}': expected {expected}, but found value '{found}'"
    )]
    TypeMismatch {
        operation: String,
        expected: String,
        found: Value,
    },

    #[error("Variable '{0}' not found in the process variables")]
    VariableNotFound(String),
}

/// Failures reported by a runtime collaborator (task store, mover, variables).
#[derive(Error, Debug, Clone)]
pub enum RuntimeError {
    #[error("Task '{0}' not found")]
    TaskNotFound(String),

    #[error("Execution '{0}' not found")]
    ExecutionNotFound(String),

    #[error("Process instance '{0}' not found")]
    InstanceNotFound(String),

    #[error("Runtime operation '{operation}' failed: {message}")]
    OperationFailed { operation: String, message: String },
}

/// Errors surfaced by the return orchestrator and the jump service.
#[derive(Error, Debug, Clone)]
pub enum ReturnError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Node '{node_id}' cannot be a return target: {reason}")]
    InvalidTarget { node_id: String, reason: String },

    #[error("Node '{target}' is not reachable backwards from '{source_node}'")]
    UnreachableTarget { source_node: String, target: String },

    #[error("Returning from '{source_node}' to '{target}' would create a cycle")]
    CircularReturn { source_node: String, target: String },

    #[error("Return action failed: {0}")]
    ActionFailed(#[from] RuntimeError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl ReturnError {
    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        ReturnError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

/// Errors raised while saving or loading a compiled graph artifact.
#[derive(Error, Debug, Clone)]
pub enum ArtifactError {
    #[error("Artifact I/O failed: {0}")]
    Io(String),

    #[error("Artifact serialization failed: {0}")]
    Serialization(String),
}

/// Errors raised while loading a `ReturnConfig`.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Could not read config file '{path}': {message}")]
    Io { path: String, message: String },

    #[error("Invalid return configuration: {0}")]
    Parse(String),
}
