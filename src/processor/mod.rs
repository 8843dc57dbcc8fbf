//! The return pipeline: build context, validate, scope, execute, clean up.

mod cleanup;
mod policy;

pub use cleanup::{
    gateway_state, return_flag, CleanupReport, StateCleaner, GATEWAY_STATE_PREFIX,
    RETURN_BRANCH_INFO, RETURN_EXECUTION_STATE, RETURN_FLAG_PREFIX, RETURN_TEMP_FLAG,
};
pub use policy::{NoCompensation, ServiceTaskPolicy};

use crate::ast::Value;
use crate::config::ReturnConfig;
use crate::context::ReturnContext;
use crate::error::{GraphError, ReturnError};
use crate::graph::NodeKind;
use crate::lock::InstanceLocks;
use crate::runtime::{CommentType, ReturnRecord, RuntimeServices, TaskScope, TaskStatus};
use crate::strategy::ReturnStrategy;
use crate::validator::{Rejection, ReturnValidator};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;

/// Where a return operation is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnStage {
    Requested,
    ContextBuilt,
    Validated,
    ScopeCalculated,
    Executed,
    CleanedUp,
    Done,
    Failed,
}

impl fmt::Display for ReturnStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReturnStage::Requested => "requested",
            ReturnStage::ContextBuilt => "context built",
            ReturnStage::Validated => "validated",
            ReturnStage::ScopeCalculated => "scope calculated",
            ReturnStage::Executed => "executed",
            ReturnStage::CleanedUp => "cleaned up",
            ReturnStage::Done => "done",
            ReturnStage::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of a completed return.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnReport {
    pub stage: ReturnStage,
    pub process_instance_id: String,
    pub source_key: String,
    pub target_key: String,
    /// Tasks marked `Return` (owned by the actor).
    pub returned_tasks: Vec<String>,
    /// Tasks marked `Cancel` (owned by someone else).
    pub cancelled_tasks: Vec<String>,
    pub moved_executions: Vec<String>,
    pub selected_branches: Vec<String>,
    /// Gateway flows whose tokens were reset; duplicate cleanup stays inside them.
    pub reset_branches: Vec<String>,
    /// `None` when cleanup is disabled.
    pub cleanup: Option<CleanupReport>,
}

/// Builder for [`ReturnProcessor`].
pub struct ReturnProcessorBuilder {
    services: RuntimeServices,
    config: ReturnConfig,
    locks: Option<Arc<InstanceLocks>>,
    service_policy: Arc<dyn ServiceTaskPolicy>,
}

impl ReturnProcessorBuilder {
    pub fn with_config(mut self, config: ReturnConfig) -> Self {
        self.config = config;
        self
    }

    /// Shares instance locks with other processors or a `JumpService`.
    pub fn with_locks(mut self, locks: Arc<InstanceLocks>) -> Self {
        self.locks = Some(locks);
        self
    }

    pub fn with_service_policy(mut self, policy: Arc<dyn ServiceTaskPolicy>) -> Self {
        self.service_policy = policy;
        self
    }

    pub fn build(self) -> ReturnProcessor {
        ReturnProcessor {
            services: self.services,
            config: self.config,
            locks: self.locks.unwrap_or_default(),
            service_policy: self.service_policy,
        }
    }
}

/// Computes and carries out returns to earlier nodes of a process instance.
///
/// # Example
///
/// ```
/// use modoshi::prelude::*;
/// use std::sync::Arc;
///
/// let json = r#"{
///     "id": "review",
///     "nodes": [
///         { "id": "start", "kind": "startEvent" },
///         { "id": "draft", "kind": "userTask" },
///         { "id": "approve", "kind": "userTask" },
///         { "id": "end", "kind": "endEvent" }
///     ],
///     "flows": [
///         { "id": "f1", "source": "start", "target": "draft" },
///         { "id": "f2", "source": "draft", "target": "approve" },
///         { "id": "f3", "source": "approve", "target": "end" }
///     ]
/// }"#;
/// let definition = ProcessDefinition::from_json_str(json).unwrap();
/// let graph = ProcessGraph::builder(definition).build().unwrap();
///
/// let runtime = Arc::new(InMemoryRuntime::new().with_graph(graph));
/// runtime.start_instance("pi-1", "review");
/// let task = runtime.spawn_task("pi-1", "approve", Some("alice"));
///
/// let processor = ReturnProcessor::builder(RuntimeServices::from_runtime(runtime.clone())).build();
/// let report = processor
///     .compute_and_execute_return("alice", &task.id, "draft", "needs rework")
///     .unwrap();
///
/// assert_eq!(report.stage, ReturnStage::Done);
/// assert_eq!(runtime.active_tasks("pi-1")[0].definition_key, "draft");
/// ```
pub struct ReturnProcessor {
    services: RuntimeServices,
    config: ReturnConfig,
    locks: Arc<InstanceLocks>,
    service_policy: Arc<dyn ServiceTaskPolicy>,
}

impl ReturnProcessor {
    pub fn builder(services: RuntimeServices) -> ReturnProcessorBuilder {
        ReturnProcessorBuilder {
            services,
            config: ReturnConfig::default(),
            locks: None,
            service_policy: Arc::new(NoCompensation),
        }
    }

    pub fn config(&self) -> &ReturnConfig {
        &self.config
    }

    pub fn locks(&self) -> Arc<InstanceLocks> {
        Arc::clone(&self.locks)
    }

    /// Returns the work at `current_task_id` to the node `target_key`.
    pub fn compute_and_execute_return(
        &self,
        actor_id: &str,
        current_task_id: &str,
        target_key: &str,
        reason: &str,
    ) -> Result<ReturnReport, ReturnError> {
        tracing::info!(task = %current_task_id, target = %target_key, actor = %actor_id, "return requested");
        let instance_id = self.instance_of_task(current_task_id)?;

        self.locks.with_instance(&instance_id, || {
            let mut ctx = self.build_context(actor_id, current_task_id, target_key, reason)?;
            let mut stage = ReturnStage::ContextBuilt;
            let result = self.run(&mut ctx, &mut stage);
            if let Err(e) = &result {
                tracing::error!(
                    instance = %ctx.process_instance_id,
                    source = %ctx.source.id,
                    target = %target_key,
                    %stage,
                    error = %e,
                    "return failed"
                );
            }
            result
        })
    }

    /// Validates the return and calculates its scope without changing anything.
    pub fn check_return(
        &self,
        actor_id: &str,
        current_task_id: &str,
        target_key: &str,
    ) -> Result<ReturnContext, ReturnError> {
        let instance_id = self.instance_of_task(current_task_id)?;
        self.locks.with_instance(&instance_id, || {
            let mut ctx = self.build_context(actor_id, current_task_id, target_key, "dry run")?;
            let strategy = self.validate(&mut ctx)?;
            self.calculate_scope(strategy, &mut ctx);
            Ok(ctx)
        })
    }

    fn run(&self, ctx: &mut ReturnContext, stage: &mut ReturnStage) -> Result<ReturnReport, ReturnError> {
        let strategy = self.validate(ctx)?;
        *stage = ReturnStage::Validated;

        self.calculate_scope(strategy, ctx);
        *stage = ReturnStage::ScopeCalculated;

        let (returned_tasks, cancelled_tasks) = self.execute(ctx)?;
        *stage = ReturnStage::Executed;
        tracing::info!(instance = %ctx.process_instance_id, target = %ctx.target_key, "return executed");

        let cleanup = if self.config.cleanup_enabled {
            let report = StateCleaner::new(&self.services).run(ctx);
            *stage = ReturnStage::CleanedUp;
            Some(report)
        } else {
            None
        };
        *stage = ReturnStage::Done;
        tracing::info!(
            instance = %ctx.process_instance_id,
            source = %ctx.source.id,
            target = %ctx.target_key,
            returned = returned_tasks.len(),
            cancelled = cancelled_tasks.len(),
            "return completed"
        );

        Ok(ReturnReport {
            stage: *stage,
            process_instance_id: ctx.process_instance_id.clone(),
            source_key: ctx.source.id.clone(),
            target_key: ctx.target_key.clone(),
            returned_tasks,
            cancelled_tasks,
            moved_executions: ctx.executions_to_move().to_vec(),
            selected_branches: ctx.selected_branches().to_vec(),
            reset_branches: ctx.branches_to_cleanup().to_vec(),
            cleanup,
        })
    }

    fn instance_of_task(&self, task_id: &str) -> Result<String, ReturnError> {
        self.services
            .tasks
            .task(task_id)?
            .map(|t| t.process_instance_id)
            .ok_or_else(|| ReturnError::not_found("task", task_id))
    }

    fn build_context(
        &self,
        actor_id: &str,
        current_task_id: &str,
        target_key: &str,
        reason: &str,
    ) -> Result<ReturnContext, ReturnError> {
        let task = self
            .services
            .tasks
            .task(current_task_id)?
            .filter(|t| t.is_active())
            .ok_or_else(|| ReturnError::not_found("task", current_task_id))?;
        if task.suspended {
            return Err(ReturnError::InvalidTarget {
                node_id: target_key.to_string(),
                reason: format!("current task '{}' is suspended", task.id),
            });
        }

        let graph = self
            .services
            .graphs
            .load(&task.process_definition_id)
            .map_err(|e| match e {
                GraphError::DefinitionNotFound(id) => ReturnError::not_found("process definition", id),
                other => ReturnError::Graph(other),
            })?;
        let source = graph
            .node(&task.definition_key)
            .cloned()
            .ok_or_else(|| ReturnError::not_found("node", task.definition_key.as_str()))?;
        let target = graph
            .node(target_key)
            .cloned()
            .ok_or_else(|| ReturnError::not_found("node", target_key))?;

        let active = self
            .services
            .tasks
            .list_active(TaskScope::ProcessInstance(&task.process_instance_id))?;
        let variables = self.services.variables.variables(&task.process_instance_id)?;

        let ctx = ReturnContext::new(actor_id, reason, graph, task, source, target, active, variables);
        tracing::debug!(summary = %ctx.summary(), "return context built");
        Ok(ctx)
    }

    fn validate(&self, ctx: &mut ReturnContext) -> Result<ReturnStrategy, ReturnError> {
        let strategy = ReturnStrategy::for_kind(&ctx.target.kind).ok_or_else(|| ReturnError::InvalidTarget {
            node_id: ctx.target.id.clone(),
            reason: format!("'{}' nodes cannot be return targets", ctx.target.kind),
        })?;

        let validator = ReturnValidator::new(&ctx.graph, &self.config);
        let path = validator.check(ctx).map_err(|rejection| {
            tracing::warn!(source = %ctx.source.id, target = %ctx.target.id, %rejection, "return rejected");
            self.rejection_error(ctx, rejection)
        })?;
        if validator.has_circular_return(ctx, self.services.history.as_ref()) {
            return Err(ReturnError::CircularReturn {
                source_node: ctx.source.id.clone(),
                target: ctx.target.id.clone(),
            });
        }
        if !strategy.validate(ctx) {
            return Err(ReturnError::InvalidTarget {
                node_id: ctx.target.id.clone(),
                reason: format!("rejected by the {:?} strategy", strategy),
            });
        }

        ctx.return_path = path;
        tracing::debug!(source = %ctx.source.id, target = %ctx.target.id, path = ?ctx.return_path, "return validated");
        Ok(strategy)
    }

    fn rejection_error(&self, ctx: &ReturnContext, rejection: Rejection) -> ReturnError {
        match rejection {
            Rejection::UnknownNode(id) => ReturnError::not_found("node", id),
            Rejection::UnsupportedTarget(_) | Rejection::MultiInstance(_) => ReturnError::InvalidTarget {
                node_id: ctx.target.id.clone(),
                reason: rejection.to_string(),
            },
            Rejection::Circular(_) => ReturnError::CircularReturn {
                source_node: ctx.source.id.clone(),
                target: ctx.target.id.clone(),
            },
            Rejection::SameNode
            | Rejection::Unreachable
            | Rejection::IncompatibleGateway(_)
            | Rejection::UnpairedGateway(_)
            | Rejection::CrossesSubProcess => ReturnError::UnreachableTarget {
                source_node: ctx.source.id.clone(),
                target: ctx.target.id.clone(),
            },
        }
    }

    fn calculate_scope(&self, strategy: ReturnStrategy, ctx: &mut ReturnContext) {
        strategy.calculate_scope(ctx, &self.config);
        // The task the return was issued from always leaves its node.
        let current = ctx.current_task.clone();
        if current.is_active() {
            ctx.add_task_to_return(&current);
        }
    }

    /// Writes statuses, flags the target and moves the executions.
    /// Returns the ids of the returned and of the cancelled tasks.
    fn execute(&self, ctx: &mut ReturnContext) -> Result<(Vec<String>, Vec<String>), ReturnError> {
        let writer = &self.services.writer;
        let message = format!("Returned to '{}': {}", ctx.target_key, ctx.reason);
        let mut returned = Vec::new();
        let mut cancelled = Vec::new();

        for task in ctx.tasks_to_return().to_vec() {
            if task.is_owned_by(&ctx.actor_id) {
                writer.add_comment(&task.id, &ctx.process_instance_id, CommentType::Return, &message)?;
                writer.set_status(&task.id, TaskStatus::Return, Some(&ctx.reason))?;
                returned.push(task.id.clone());
            } else {
                writer.add_comment(&task.id, &ctx.process_instance_id, CommentType::Cancel, &message)?;
                writer.set_status(&task.id, TaskStatus::Cancel, Some(&ctx.reason))?;
                cancelled.push(task.id.clone());
                ctx.add_task_to_cancel(&task);
            }
            tracing::debug!(task = %task.id, key = %task.definition_key, "task status written");
        }

        self.services
            .variables
            .set(&ctx.process_instance_id, &return_flag(&ctx.target_key), Value::Bool(true))?;

        if ctx.target.kind == NodeKind::ServiceTask && ctx.requires_special_handling() {
            self.service_policy.on_return(ctx)?;
        }

        if !ctx.executions_to_move().is_empty() {
            self.services
                .mover
                .move_executions_to_activity(ctx.executions_to_move(), &ctx.target_key)?;
        } else {
            tracing::warn!(instance = %ctx.process_instance_id, target = %ctx.target_key, "nothing to move");
        }

        self.services.history.record(ReturnRecord {
            process_instance_id: ctx.process_instance_id.clone(),
            source_key: ctx.source.id.clone(),
            target_key: ctx.target_key.clone(),
            actor_id: ctx.actor_id.clone(),
            time: Utc::now(),
        })?;

        Ok((returned, cancelled))
    }
}
