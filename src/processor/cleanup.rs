//! Best-effort repair of runtime state after a move.

use crate::context::ReturnContext;
use crate::graph::Direction;
use crate::runtime::{RuntimeServices, RuntimeTask, TaskScope, TaskStatus};
use ahash::AHashSet;
use itertools::Itertools;
use std::cmp::Reverse;

pub const RETURN_FLAG_PREFIX: &str = "RETURN_FLAG_";
pub const GATEWAY_STATE_PREFIX: &str = "GATEWAY_STATE_";
pub const RETURN_TEMP_FLAG: &str = "RETURN_TEMP_FLAG";
pub const RETURN_BRANCH_INFO: &str = "RETURN_BRANCH_INFO";
pub const RETURN_EXECUTION_STATE: &str = "RETURN_EXECUTION_STATE";

const MULTI_INSTANCE_COUNTERS: [&str; 4] = [
    "nrOfInstances_",
    "nrOfCompletedInstances_",
    "nrOfActiveInstances_",
    "loopCounter_",
];

pub fn return_flag(key: &str) -> String {
    format!("{}{}", RETURN_FLAG_PREFIX, key)
}

pub fn gateway_state(gateway_id: &str) -> String {
    format!("{}{}", GATEWAY_STATE_PREFIX, gateway_id)
}

/// What the repair pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanupReport {
    pub removed_tasks: Vec<String>,
    /// Duplicates that could not be deleted.
    pub failed_tasks: Vec<String>,
    pub restored_tasks: Vec<String>,
    pub cleared_variables: Vec<String>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.removed_tasks.is_empty() && self.failed_tasks.is_empty()
    }
}

/// Newest first; ties broken by id so the order is total.
fn newest_first(tasks: &mut [RuntimeTask]) {
    tasks.sort_by_key(|t| (Reverse(t.create_time), Reverse(t.id.clone())));
}

/// Nodes on the gateway branches the return reset, or everything below the
/// gateway when none of its branches were recorded.
fn branch_region(ctx: &ReturnContext, gateway: &str) -> AHashSet<String> {
    let graph = &ctx.graph;
    let entries: Vec<&str> = ctx
        .branches_to_cleanup()
        .iter()
        .filter_map(|id| graph.flow(id))
        .filter(|f| f.source == gateway)
        .map(|f| f.target.as_str())
        .collect();
    if entries.is_empty() {
        return graph.reachable(gateway, Direction::Forward);
    }
    entries
        .into_iter()
        .flat_map(|entry| {
            let mut region = graph.reachable(entry, Direction::Forward);
            region.insert(entry.to_string());
            region
        })
        .collect()
}

/// Removes duplicate work items and restores the target after a return.
///
/// Nothing here fails the operation: every collaborator error is logged and
/// the pass moves on. Running it twice is harmless.
pub struct StateCleaner<'a> {
    services: &'a RuntimeServices,
}

impl<'a> StateCleaner<'a> {
    pub fn new(services: &'a RuntimeServices) -> Self {
        Self { services }
    }

    pub fn run(&self, ctx: &ReturnContext) -> CleanupReport {
        let mut report = CleanupReport::default();
        let active = match self
            .services
            .tasks
            .list_active(TaskScope::ProcessInstance(&ctx.process_instance_id))
        {
            Ok(tasks) => tasks,
            Err(e) => {
                tracing::warn!(instance = %ctx.process_instance_id, error = %e, "cleanup could not list active tasks");
                Vec::new()
            }
        };

        let duplicates = self.find_duplicates(ctx, &active);
        self.remove_duplicates(&duplicates, &mut report);

        let removed: AHashSet<&str> = report.removed_tasks.iter().map(String::as_str).collect();
        let remaining: Vec<RuntimeTask> = active
            .into_iter()
            .filter(|t| !removed.contains(t.id.as_str()))
            .collect();
        self.restore(ctx, &remaining, &mut report);

        tracing::info!(
            instance = %ctx.process_instance_id,
            removed = report.removed_tasks.len(),
            failed = report.failed_tasks.len(),
            restored = report.restored_tasks.len(),
            branches = ?ctx.branches_to_cleanup(),
            "cleanup finished"
        );
        report
    }

    /// Tasks that should not survive the return, each listed once.
    pub fn find_duplicates(&self, ctx: &ReturnContext, active: &[RuntimeTask]) -> Vec<RuntimeTask> {
        let graph = &ctx.graph;
        let mut duplicates: Vec<RuntimeTask> = Vec::new();

        // Parallel multi-instance nodes legitimately run several tasks per key.
        let by_key = active
            .iter()
            .filter(|t| !graph.node(&t.definition_key).is_some_and(|n| n.is_parallel_multi_instance()))
            .cloned()
            .into_group_map_by(|t| t.definition_key.clone());
        for (key, mut tasks) in by_key.into_iter().sorted_by(|a, b| a.0.cmp(&b.0)) {
            if tasks.len() > 1 {
                newest_first(&mut tasks);
                tracing::debug!(key = %key, count = tasks.len(), "duplicate tasks for key");
                duplicates.extend(tasks.into_iter().skip(1));
            }
        }

        if ctx.involves_parallel_gateway() || ctx.involves_inclusive_gateway() {
            for gateway in ctx.affected_gateways() {
                let downstream = branch_region(ctx, gateway);
                let by_execution = active
                    .iter()
                    .filter(|t| downstream.contains(&t.definition_key))
                    .filter(|t| !graph.node(&t.definition_key).is_some_and(|n| n.is_parallel_multi_instance()))
                    .cloned()
                    .into_group_map_by(|t| t.execution_id.clone());
                for (_, mut tasks) in by_execution.into_iter().sorted_by(|a, b| a.0.cmp(&b.0)) {
                    if tasks.len() > 1 {
                        newest_first(&mut tasks);
                        duplicates.extend(tasks.into_iter().skip(1));
                    }
                }
            }
        }

        if let Some(reset) = ctx.multi_instance_reset() {
            let mut instances: Vec<RuntimeTask> = active
                .iter()
                .filter(|t| t.definition_key == ctx.target_key)
                .cloned()
                .collect();
            newest_first(&mut instances);
            duplicates.extend(instances.into_iter().skip(reset.expected_instances()));
        }

        duplicates.into_iter().unique_by(|t| t.id.clone()).collect()
    }

    fn remove_duplicates(&self, duplicates: &[RuntimeTask], report: &mut CleanupReport) {
        for task in duplicates {
            if let Err(e) = self.services.writer.delete(&task.id, "duplicate after return") {
                tracing::warn!(task = %task.id, error = %e, "could not delete duplicate task");
                report.failed_tasks.push(task.id.clone());
                continue;
            }
            if let Err(e) = self
                .services
                .writer
                .set_status(&task.id, TaskStatus::Cancel, Some("duplicate after return"))
            {
                tracing::warn!(task = %task.id, error = %e, "could not mark duplicate task cancelled");
            }
            report.removed_tasks.push(task.id.clone());
        }
    }

    fn clear_variable(&self, ctx: &ReturnContext, name: &str, report: &mut CleanupReport) {
        match self.services.variables.remove(&ctx.process_instance_id, name) {
            Ok(()) => report.cleared_variables.push(name.to_string()),
            Err(e) => tracing::warn!(variable = %name, error = %e, "could not clear variable"),
        }
    }

    fn restore(&self, ctx: &ReturnContext, remaining: &[RuntimeTask], report: &mut CleanupReport) {
        if ctx.target.is_user_task() {
            for task in remaining.iter().filter(|t| t.definition_key == ctx.target_key) {
                match self.services.writer.set_status(&task.id, TaskStatus::Running, None) {
                    Ok(()) => report.restored_tasks.push(task.id.clone()),
                    Err(e) => tracing::warn!(task = %task.id, error = %e, "could not restore target task"),
                }
            }
            self.clear_variable(ctx, &return_flag(&ctx.target_key), report);
        } else if ctx.target.is_gateway() {
            self.clear_variable(ctx, &gateway_state(&ctx.target_key), report);
        }

        for name in [RETURN_TEMP_FLAG, RETURN_BRANCH_INFO, RETURN_EXECUTION_STATE] {
            self.clear_variable(ctx, name, report);
        }

        if ctx.is_multi_instance_return() {
            for prefix in MULTI_INSTANCE_COUNTERS {
                self.clear_variable(ctx, &format!("{}{}", prefix, ctx.target_key), report);
            }
        }
    }
}

