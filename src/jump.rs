//! Direct moves of execution points, without path validation.

use crate::error::{GraphError, ReturnError};
use crate::graph::ProcessGraph;
use crate::lock::InstanceLocks;
use crate::runtime::{CommentType, Execution, RuntimeServices, RuntimeTask, TaskScope, TaskStatus};
use std::sync::Arc;

/// What a jump did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JumpOutcome {
    /// The mover was called; these tasks were marked before it ran.
    Moved { tasks: Vec<String> },
    /// Nothing matched, so nothing changed.
    Skipped { reason: String },
}

impl JumpOutcome {
    pub fn is_moved(&self) -> bool {
        matches!(self, JumpOutcome::Moved { .. })
    }
}

/// Audit trail written for the tasks a jump moves away from.
#[derive(Debug, Clone, Copy)]
struct Marking {
    comment: CommentType,
    status: TaskStatus,
}

const CANCEL: Marking = Marking {
    comment: CommentType::TimeoutJump,
    status: TaskStatus::Cancel,
};

const RETURN: Marking = Marking {
    comment: CommentType::Return,
    status: TaskStatus::Return,
};

/// Jumps in five shapes, each scoped to a single process instance.
///
/// Target keys must exist in the instance's graph. A jump that finds no
/// active task, or whose execution is already gone, changes nothing.
pub struct JumpService {
    services: RuntimeServices,
    locks: Arc<InstanceLocks>,
}

impl JumpService {
    pub fn new(services: RuntimeServices) -> Self {
        Self {
            services,
            locks: Arc::new(InstanceLocks::new()),
        }
    }

    pub fn with_locks(mut self, locks: Arc<InstanceLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// Merges the active tasks at `source_keys` into one token at `target_key`.
    pub fn move_many_to_single(
        &self,
        instance_id: &str,
        source_keys: &[String],
        target_key: &str,
        reason: &str,
    ) -> Result<JumpOutcome, ReturnError> {
        self.locks.with_instance(instance_id, || {
            self.resolve_targets(instance_id, &[target_key])?;
            let tasks = self.active_at(instance_id, source_keys)?;
            if tasks.is_empty() {
                return Ok(skipped(format!("no active task at {:?}", source_keys)));
            }
            self.mark(&tasks, instance_id, CANCEL, reason)?;
            self.services
                .mover
                .move_many_to_single(instance_id, source_keys, target_key)?;
            Ok(moved(instance_id, target_key, tasks))
        })
    }

    /// Splits the token at `source_key` into one token per target.
    pub fn move_single_to_many(
        &self,
        instance_id: &str,
        source_key: &str,
        target_keys: &[String],
        reason: &str,
    ) -> Result<JumpOutcome, ReturnError> {
        self.locks.with_instance(instance_id, || {
            let targets: Vec<&str> = target_keys.iter().map(String::as_str).collect();
            self.resolve_targets(instance_id, &targets)?;
            let tasks = self.active_at(instance_id, &[source_key.to_string()])?;
            if tasks.is_empty() {
                return Ok(skipped(format!("no active task at '{}'", source_key)));
            }
            self.mark(&tasks, instance_id, CANCEL, reason)?;
            self.services
                .mover
                .move_single_to_many(instance_id, source_key, target_keys)?;
            Ok(moved(instance_id, &target_keys.join(","), tasks))
        })
    }

    pub fn move_execution_to_activity(
        &self,
        execution_id: &str,
        target_key: &str,
        reason: &str,
    ) -> Result<JumpOutcome, ReturnError> {
        let Some(execution) = self.find_execution(execution_id)? else {
            return Ok(skipped(format!("execution '{}' not found", execution_id)));
        };
        let instance_id = execution.process_instance_id.clone();
        self.locks.with_instance(&instance_id, || {
            self.resolve_targets(&instance_id, &[target_key])?;
            let tasks = self.active_on(&[execution_id.to_string()])?;
            if tasks.is_empty() {
                return Ok(skipped(format!("no active task on execution '{}'", execution_id)));
            }
            self.mark(&tasks, &instance_id, RETURN, reason)?;
            self.services
                .mover
                .move_execution_to_activity(execution_id, target_key)?;
            Ok(moved(&instance_id, target_key, tasks))
        })
    }

    pub fn move_execution_to_activities(
        &self,
        execution_id: &str,
        target_keys: &[String],
        reason: &str,
    ) -> Result<JumpOutcome, ReturnError> {
        let Some(execution) = self.find_execution(execution_id)? else {
            return Ok(skipped(format!("execution '{}' not found", execution_id)));
        };
        let instance_id = execution.process_instance_id.clone();
        self.locks.with_instance(&instance_id, || {
            let targets: Vec<&str> = target_keys.iter().map(String::as_str).collect();
            self.resolve_targets(&instance_id, &targets)?;
            let tasks = self.active_on(&[execution_id.to_string()])?;
            if tasks.is_empty() {
                return Ok(skipped(format!("no active task on execution '{}'", execution_id)));
            }
            self.mark(&tasks, &instance_id, CANCEL, reason)?;
            self.services
                .mover
                .move_execution_to_activities(execution_id, target_keys)?;
            Ok(moved(&instance_id, &target_keys.join(","), tasks))
        })
    }

    /// Merges several executions of one instance into a token at `target_key`.
    /// Executions that no longer exist are left out.
    pub fn move_executions_to_activity(
        &self,
        execution_ids: &[String],
        target_key: &str,
        reason: &str,
    ) -> Result<JumpOutcome, ReturnError> {
        let mut executions: Vec<Execution> = Vec::new();
        for id in execution_ids {
            match self.find_execution(id)? {
                Some(execution) => executions.push(execution),
                None => tracing::warn!(execution = %id, "execution not found, left out of jump"),
            }
        }
        let Some(instance_id) = executions.first().map(|e| e.process_instance_id.clone()) else {
            return Ok(skipped("none of the executions exist".to_string()));
        };
        if let Some(stray) = executions.iter().find(|e| e.process_instance_id != instance_id) {
            return Err(ReturnError::InvalidTarget {
                node_id: target_key.to_string(),
                reason: format!(
                    "execution '{}' belongs to instance '{}', not '{}'",
                    stray.id, stray.process_instance_id, instance_id
                ),
            });
        }
        let ids: Vec<String> = executions.into_iter().map(|e| e.id).collect();

        self.locks.with_instance(&instance_id, || {
            self.resolve_targets(&instance_id, &[target_key])?;
            let tasks = self.active_on(&ids)?;
            if tasks.is_empty() {
                return Ok(skipped(format!("no active task on executions {:?}", ids)));
            }
            self.mark(&tasks, &instance_id, RETURN, reason)?;
            self.services.mover.move_executions_to_activity(&ids, target_key)?;
            Ok(moved(&instance_id, target_key, tasks))
        })
    }

    fn graph_of(&self, instance_id: &str) -> Result<Arc<ProcessGraph>, ReturnError> {
        let instance = self
            .services
            .instances
            .instance(instance_id)?
            .ok_or_else(|| ReturnError::not_found("process instance", instance_id))?;
        self.services
            .graphs
            .load(&instance.process_definition_id)
            .map_err(|e| match e {
                GraphError::DefinitionNotFound(id) => ReturnError::not_found("process definition", id),
                other => ReturnError::Graph(other),
            })
    }

    fn resolve_targets(&self, instance_id: &str, target_keys: &[&str]) -> Result<(), ReturnError> {
        let graph = self.graph_of(instance_id)?;
        for key in target_keys {
            if graph.node(key).is_none() {
                tracing::error!(instance = %instance_id, target = %key, "jump target not in graph");
                return Err(ReturnError::not_found("node", *key));
            }
        }
        Ok(())
    }

    fn find_execution(&self, execution_id: &str) -> Result<Option<Execution>, ReturnError> {
        Ok(self.services.instances.execution(execution_id)?)
    }

    fn active_at(&self, instance_id: &str, keys: &[String]) -> Result<Vec<RuntimeTask>, ReturnError> {
        Ok(self
            .services
            .tasks
            .list_active(TaskScope::ProcessInstance(instance_id))?
            .into_iter()
            .filter(|t| keys.contains(&t.definition_key))
            .collect())
    }

    fn active_on(&self, execution_ids: &[String]) -> Result<Vec<RuntimeTask>, ReturnError> {
        let mut tasks = Vec::new();
        for id in execution_ids {
            tasks.extend(self.services.tasks.list_active(TaskScope::Execution(id))?);
        }
        Ok(tasks)
    }

    fn mark(
        &self,
        tasks: &[RuntimeTask],
        instance_id: &str,
        marking: Marking,
        reason: &str,
    ) -> Result<(), ReturnError> {
        for task in tasks {
            self.services
                .writer
                .add_comment(&task.id, instance_id, marking.comment, reason)?;
            self.services
                .writer
                .set_status(&task.id, marking.status, Some(reason))?;
            tracing::debug!(task = %task.id, status = %marking.status, "jump marked task");
        }
        Ok(())
    }
}

fn skipped(reason: String) -> JumpOutcome {
    tracing::warn!(%reason, "jump skipped");
    JumpOutcome::Skipped { reason }
}

fn moved(instance_id: &str, target: &str, tasks: Vec<RuntimeTask>) -> JumpOutcome {
    tracing::info!(instance = %instance_id, target = %target, tasks = tasks.len(), "jump executed");
    JumpOutcome::Moved {
        tasks: tasks.into_iter().map(|t| t.id).collect(),
    }
}
