//! # Modoshi - Return and Jump Engine for Branched Processes
//!
//! **Modoshi** moves the execution point of a running process instance back to
//! an earlier node, or jumps it to arbitrary nodes, while keeping parallel,
//! inclusive and exclusive branches, multi-instance activities and sub-process
//! scopes consistent.
//!
//! ## Core Workflow
//!
//! 1.  **Describe the process**: Load a `ProcessDefinition` from JSON, or implement
//!     `IntoProcessDefinition` for your own format.
//! 2.  **Build the graph**: `ProcessGraph::builder(definition).build()` resolves flows,
//!     parses gateway conditions and rejects malformed graphs. Graphs can be saved
//!     as binary artifacts and loaded back.
//! 3.  **Wire the runtime**: Implement the collaborator traits in [`runtime`] over
//!     your task store, or use the bundled `InMemoryRuntime`.
//! 4.  **Return or jump**: `ReturnProcessor::compute_and_execute_return` validates
//!     the return path, works out which tasks and executions are affected, moves
//!     them and repairs leftover state. `JumpService` performs unvalidated moves.
//!
//! ## Quick Start
//!
//! ```rust
//! use modoshi::prelude::*;
//! use std::sync::Arc;
//!
//! fn main() -> Result<()> {
//!     let definition = ProcessDefinition::from_json_str(r#"{
//!         "id": "expense",
//!         "nodes": [
//!             { "id": "start", "kind": "startEvent" },
//!             { "id": "submit", "kind": "userTask" },
//!             { "id": "check", "kind": "userTask" },
//!             { "id": "end", "kind": "endEvent" }
//!         ],
//!         "flows": [
//!             { "id": "f1", "source": "start", "target": "submit" },
//!             { "id": "f2", "source": "submit", "target": "check" },
//!             { "id": "f3", "source": "check", "target": "end" }
//!         ]
//!     }"#)?;
//!     let graph = ProcessGraph::builder(definition).build()?;
//!
//!     let runtime = Arc::new(InMemoryRuntime::new().with_graph(graph));
//!     runtime.start_instance("pi-1", "expense");
//!     let task = runtime.spawn_task("pi-1", "check", Some("bob"));
//!
//!     let processor = ReturnProcessor::builder(RuntimeServices::from_runtime(runtime.clone()))
//!         .with_config(ReturnConfig::default())
//!         .build();
//!     let report = processor.compute_and_execute_return("bob", &task.id, "submit", "receipt missing")?;
//!
//!     println!("returned {:?} to '{}'", report.returned_tasks, report.target_key);
//!     Ok(())
//! }
//! ```

pub mod ast;
pub mod condition;
pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod jump;
pub mod lock;
pub mod prelude;
pub mod processor;
pub mod runtime;
pub mod strategy;
pub mod trace;
pub mod validator;
