use super::definition::ProcessDefinition;
use crate::error::GraphError;

/// A trait for custom process formats that can be converted into a `ProcessDefinition`.
///
/// Implement it on the structs that parse your own format (a BPMN reader, an
/// internal designer export, ...) to feed them through the `GraphBuilder`.
///
/// # Example
///
/// ```rust,no_run
/// use modoshi::error::GraphError;
/// use modoshi::graph::{FlowDefinition, IntoProcessDefinition, NodeDefinition, ProcessDefinition};
///
/// struct Step { id: String, next: Option<String> }
/// struct Checklist { id: String, steps: Vec<Step> }
///
/// impl IntoProcessDefinition for Checklist {
///     fn into_definition(self) -> Result<ProcessDefinition, GraphError> {
///         let mut nodes = Vec::new();
///         let mut flows = Vec::new();
///         for step in self.steps {
///             if let Some(next) = &step.next {
///                 flows.push(FlowDefinition {
///                     id: format!("{}-{}", step.id, next),
///                     source: step.id.clone(),
///                     target: next.clone(),
///                     ..Default::default()
///                 });
///             }
///             nodes.push(NodeDefinition {
///                 id: step.id,
///                 kind: "userTask".to_string(),
///                 ..Default::default()
///             });
///         }
///         Ok(ProcessDefinition { id: self.id, name: None, nodes, flows })
///     }
/// }
/// ```
pub trait IntoProcessDefinition {
    /// Consumes the object and converts it into the canonical process definition.
    fn into_definition(self) -> Result<ProcessDefinition, GraphError>;
}

impl IntoProcessDefinition for ProcessDefinition {
    fn into_definition(self) -> Result<ProcessDefinition, GraphError> {
        Ok(self)
    }
}
