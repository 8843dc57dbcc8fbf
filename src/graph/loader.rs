use super::model::ProcessGraph;
use crate::error::GraphError;
use ahash::AHashMap;
use std::sync::{Arc, RwLock};

/// Supplies the process graph of a process definition.
pub trait ProcessGraphLoader: Send + Sync {
    fn load(&self, definition_id: &str) -> Result<Arc<ProcessGraph>, GraphError>;
}

/// A loader over graphs that were built or deserialized up front.
#[derive(Default)]
pub struct GraphRegistry {
    graphs: RwLock<AHashMap<String, Arc<ProcessGraph>>>,
}

impl GraphRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_graph(self, graph: ProcessGraph) -> Self {
        self.register(graph);
        self
    }

    /// Registers a graph under its definition id, replacing an older version.
    pub fn register(&self, graph: ProcessGraph) -> Arc<ProcessGraph> {
        let graph = Arc::new(graph);
        let mut graphs = self.graphs.write().unwrap_or_else(|e| e.into_inner());
        graphs.insert(graph.id.clone(), Arc::clone(&graph));
        graph
    }
}

impl ProcessGraphLoader for GraphRegistry {
    fn load(&self, definition_id: &str) -> Result<Arc<ProcessGraph>, GraphError> {
        let graphs = self.graphs.read().unwrap_or_else(|e| e.into_inner());
        graphs
            .get(definition_id)
            .cloned()
            .ok_or_else(|| GraphError::DefinitionNotFound(definition_id.to_string()))
    }
}
