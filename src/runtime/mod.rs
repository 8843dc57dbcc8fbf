//! The runtime collaborators the engine drives, and the records they exchange.
//!
//! The engine never persists anything itself: task bookkeeping, variables and
//! the physical relocation of execution pointers all go through these traits.

use crate::ast::Value;
use crate::condition::Variables;
use crate::error::RuntimeError;
use crate::graph::ProcessGraphLoader;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub mod memory;
pub mod snapshot;

pub use memory::{CommentRecord, InMemoryRuntime, MoveRecord};
pub use snapshot::RuntimeSnapshot;

/// A work item as seen by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeTask {
    pub id: String,
    pub process_instance_id: String,
    pub process_definition_id: String,
    pub execution_id: String,
    /// Id of the flow node the task was created for.
    pub definition_key: String,
    #[serde(default)]
    pub assignee: Option<String>,
    pub create_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub suspended: bool,
}

impl RuntimeTask {
    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn is_owned_by(&self, actor_id: &str) -> bool {
        self.assignee.as_deref() == Some(actor_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInstance {
    pub id: String,
    pub process_definition_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: String,
    pub process_instance_id: String,
    /// Node the execution currently waits in, if known.
    #[serde(default)]
    pub activity_id: Option<String>,
}

/// Business status written onto a task by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Running,
    Return,
    Cancel,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskStatus::Running => "RUNNING",
            TaskStatus::Return => "RETURN",
            TaskStatus::Cancel => "CANCEL",
        };
        write!(f, "{}", name)
    }
}

/// Category of an audit comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommentType {
    Return,
    Cancel,
    TimeoutJump,
}

/// Which tasks an active-task query looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskScope<'a> {
    ProcessInstance(&'a str),
    Execution(&'a str),
}

/// One completed return, kept per process instance for cycle analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnRecord {
    pub process_instance_id: String,
    pub source_key: String,
    pub target_key: String,
    pub actor_id: String,
    pub time: DateTime<Utc>,
}

pub trait ProcessInstanceQuery: Send + Sync {
    fn instance(&self, instance_id: &str) -> Result<Option<ProcessInstance>, RuntimeError>;
    fn execution(&self, execution_id: &str) -> Result<Option<Execution>, RuntimeError>;
}

pub trait ActiveTaskQuery: Send + Sync {
    /// Looks up a task, active or not.
    fn task(&self, task_id: &str) -> Result<Option<RuntimeTask>, RuntimeError>;

    /// Active (not completed) tasks in a scope, suspended ones included.
    fn list_active(&self, scope: TaskScope<'_>) -> Result<Vec<RuntimeTask>, RuntimeError>;
}

pub trait TaskStatusWriter: Send + Sync {
    fn set_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        reason: Option<&str>,
    ) -> Result<(), RuntimeError>;

    fn add_comment(
        &self,
        task_id: &str,
        process_instance_id: &str,
        comment_type: CommentType,
        message: &str,
    ) -> Result<(), RuntimeError>;

    fn delete(&self, task_id: &str, reason: &str) -> Result<(), RuntimeError>;
}

/// Physically relocates execution pointers inside one process instance.
pub trait ActivityStateMover: Send + Sync {
    fn move_single_to_many(
        &self,
        process_instance_id: &str,
        source_key: &str,
        target_keys: &[String],
    ) -> Result<(), RuntimeError>;

    fn move_many_to_single(
        &self,
        process_instance_id: &str,
        source_keys: &[String],
        target_key: &str,
    ) -> Result<(), RuntimeError>;

    fn move_execution_to_activity(
        &self,
        execution_id: &str,
        target_key: &str,
    ) -> Result<(), RuntimeError>;

    fn move_execution_to_activities(
        &self,
        execution_id: &str,
        target_keys: &[String],
    ) -> Result<(), RuntimeError>;

    fn move_executions_to_activity(
        &self,
        execution_ids: &[String],
        target_key: &str,
    ) -> Result<(), RuntimeError>;
}

pub trait ProcessVariableStore: Send + Sync {
    fn variables(&self, process_instance_id: &str) -> Result<Variables, RuntimeError>;

    fn set(&self, process_instance_id: &str, name: &str, value: Value) -> Result<(), RuntimeError>;

    fn remove(&self, process_instance_id: &str, name: &str) -> Result<(), RuntimeError>;
}

pub trait ReturnHistory: Send + Sync {
    fn returns(&self, process_instance_id: &str) -> Result<Vec<ReturnRecord>, RuntimeError>;

    fn record(&self, record: ReturnRecord) -> Result<(), RuntimeError>;
}

/// The bundle of collaborators an engine operation runs against.
#[derive(Clone)]
pub struct RuntimeServices {
    pub graphs: Arc<dyn ProcessGraphLoader>,
    pub instances: Arc<dyn ProcessInstanceQuery>,
    pub tasks: Arc<dyn ActiveTaskQuery>,
    pub writer: Arc<dyn TaskStatusWriter>,
    pub mover: Arc<dyn ActivityStateMover>,
    pub variables: Arc<dyn ProcessVariableStore>,
    pub history: Arc<dyn ReturnHistory>,
}

impl RuntimeServices {
    /// Uses one object for every collaborator role.
    pub fn from_runtime<R>(runtime: Arc<R>) -> Self
    where
        R: ProcessGraphLoader
            + ProcessInstanceQuery
            + ActiveTaskQuery
            + TaskStatusWriter
            + ActivityStateMover
            + ProcessVariableStore
            + ReturnHistory
            + 'static,
    {
        Self {
            graphs: runtime.clone(),
            instances: runtime.clone(),
            tasks: runtime.clone(),
            writer: runtime.clone(),
            mover: runtime.clone(),
            variables: runtime.clone(),
            history: runtime,
        }
    }
}
