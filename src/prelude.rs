//! Prelude module for convenient imports
//!
//! This module re-exports the types needed to build graphs, wire a runtime and
//! run returns or jumps, so `use modoshi::prelude::*;` is usually enough.

// Graph model
pub use crate::graph::{
    GraphBuilder, GraphRegistry, IntoProcessDefinition, NodeKind, ProcessDefinition, ProcessGraph,
    ProcessGraphLoader,
};

// Conditions
pub use crate::ast::{EvaluationTrace, Expression, Value};
pub use crate::condition::{Condition, Variables};
pub use crate::trace::TraceFormatter;

// Runtime collaborators
pub use crate::runtime::{InMemoryRuntime, RuntimeServices, RuntimeSnapshot, RuntimeTask, TaskStatus};

// Engine
pub use crate::config::{PairingRule, ReturnConfig};
pub use crate::context::ReturnContext;
pub use crate::jump::{JumpOutcome, JumpService};
pub use crate::processor::{ReturnProcessor, ReturnReport, ReturnStage};
pub use crate::validator::ReturnValidator;

// Error types
pub use crate::error::{GraphError, ReturnError};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
