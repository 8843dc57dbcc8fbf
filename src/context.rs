use crate::condition::Variables;
use crate::graph::{FlowNode, ProcessGraph};
use crate::runtime::RuntimeTask;
use std::sync::Arc;

/// How the instances of a multi-instance target are rebuilt after a return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiInstanceReset {
    /// Sequential loop: start over at the first instance.
    FirstInstance,
    /// Parallel loop: recreate every instance.
    RecreateAll { expected: usize },
}

impl MultiInstanceReset {
    /// Number of active instances that may remain after cleanup.
    pub fn expected_instances(&self) -> usize {
        match self {
            MultiInstanceReset::FirstInstance => 1,
            MultiInstanceReset::RecreateAll { expected } => *expected,
        }
    }
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) -> bool {
    if items.contains(&item) {
        return false;
    }
    items.push(item);
    true
}

/// Accumulated state of a single return operation.
///
/// Every container only ever grows and never holds duplicates, and flags once
/// raised stay raised; a later pipeline stage cannot undo an earlier one.
#[derive(Debug, Clone)]
pub struct ReturnContext {
    pub actor_id: String,
    pub reason: String,
    pub target_key: String,
    pub process_instance_id: String,
    pub graph: Arc<ProcessGraph>,
    pub current_task: RuntimeTask,
    pub source: FlowNode,
    pub target: FlowNode,
    /// Active tasks of the instance when the context was built.
    pub active_tasks: Vec<RuntimeTask>,
    pub variables: Variables,
    /// Nodes lying on some path from the target to the source.
    pub return_path: Vec<String>,

    tasks_to_return: Vec<RuntimeTask>,
    tasks_to_cancel: Vec<RuntimeTask>,
    executions_to_move: Vec<String>,
    branches_to_cleanup: Vec<String>,
    affected_gateways: Vec<String>,
    selected_branches: Vec<String>,
    join_gateway: Option<String>,
    multi_instance_reset: Option<MultiInstanceReset>,

    multi_instance_return: bool,
    involves_parallel_gateway: bool,
    involves_inclusive_gateway: bool,
    requires_special_handling: bool,
}

impl ReturnContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        actor_id: &str,
        reason: &str,
        graph: Arc<ProcessGraph>,
        current_task: RuntimeTask,
        source: FlowNode,
        target: FlowNode,
        active_tasks: Vec<RuntimeTask>,
        variables: Variables,
    ) -> Self {
        Self {
            actor_id: actor_id.to_string(),
            reason: reason.to_string(),
            target_key: target.id.clone(),
            process_instance_id: current_task.process_instance_id.clone(),
            graph,
            current_task,
            source,
            target,
            active_tasks,
            variables,
            return_path: Vec::new(),
            tasks_to_return: Vec::new(),
            tasks_to_cancel: Vec::new(),
            executions_to_move: Vec::new(),
            branches_to_cleanup: Vec::new(),
            affected_gateways: Vec::new(),
            selected_branches: Vec::new(),
            join_gateway: None,
            multi_instance_reset: None,
            multi_instance_return: false,
            involves_parallel_gateway: false,
            involves_inclusive_gateway: false,
            requires_special_handling: false,
        }
    }

    pub fn tasks_to_return(&self) -> &[RuntimeTask] {
        &self.tasks_to_return
    }

    pub fn tasks_to_cancel(&self) -> &[RuntimeTask] {
        &self.tasks_to_cancel
    }

    pub fn executions_to_move(&self) -> &[String] {
        &self.executions_to_move
    }

    pub fn branches_to_cleanup(&self) -> &[String] {
        &self.branches_to_cleanup
    }

    pub fn affected_gateways(&self) -> &[String] {
        &self.affected_gateways
    }

    /// Outgoing flows the target gateway will take once the return lands.
    pub fn selected_branches(&self) -> &[String] {
        &self.selected_branches
    }

    pub fn join_gateway(&self) -> Option<&str> {
        self.join_gateway.as_deref()
    }

    pub fn multi_instance_reset(&self) -> Option<MultiInstanceReset> {
        self.multi_instance_reset
    }

    pub fn is_multi_instance_return(&self) -> bool {
        self.multi_instance_return
    }

    pub fn involves_parallel_gateway(&self) -> bool {
        self.involves_parallel_gateway
    }

    pub fn involves_inclusive_gateway(&self) -> bool {
        self.involves_inclusive_gateway
    }

    pub fn requires_special_handling(&self) -> bool {
        self.requires_special_handling
    }

    /// Adds a task to the return set; the task's execution is scheduled to move.
    pub fn add_task_to_return(&mut self, task: &RuntimeTask) {
        if self.tasks_to_return.iter().any(|t| t.id == task.id) {
            return;
        }
        self.tasks_to_return.push(task.clone());
        self.add_execution_to_move(&task.execution_id);
    }

    pub fn add_task_to_cancel(&mut self, task: &RuntimeTask) {
        if self.tasks_to_cancel.iter().any(|t| t.id == task.id) {
            return;
        }
        self.tasks_to_cancel.push(task.clone());
    }

    pub fn add_execution_to_move(&mut self, execution_id: &str) {
        push_unique(&mut self.executions_to_move, execution_id.to_string());
    }

    pub fn add_branch_to_cleanup(&mut self, flow_id: &str) {
        push_unique(&mut self.branches_to_cleanup, flow_id.to_string());
    }

    pub fn add_affected_gateway(&mut self, gateway_id: &str) {
        push_unique(&mut self.affected_gateways, gateway_id.to_string());
    }

    pub fn add_selected_branch(&mut self, flow_id: &str) {
        push_unique(&mut self.selected_branches, flow_id.to_string());
    }

    /// Records the join closing the target split. The first join found wins.
    pub fn set_join_gateway(&mut self, gateway_id: &str) {
        if self.join_gateway.is_none() {
            self.join_gateway = Some(gateway_id.to_string());
        }
        self.add_affected_gateway(gateway_id);
    }

    pub fn set_multi_instance_reset(&mut self, reset: MultiInstanceReset) {
        if self.multi_instance_reset.is_none() {
            self.multi_instance_reset = Some(reset);
        }
    }

    pub fn mark_multi_instance_return(&mut self) {
        self.multi_instance_return = true;
    }

    pub fn mark_parallel_gateway(&mut self) {
        self.involves_parallel_gateway = true;
    }

    pub fn mark_inclusive_gateway(&mut self) {
        self.involves_inclusive_gateway = true;
    }

    pub fn mark_special_handling(&mut self) {
        self.requires_special_handling = true;
    }

    /// Active tasks whose node is in `keys`, excluding completed and suspended ones.
    pub fn active_tasks_at<'a>(&'a self, keys: &'a [String]) -> impl Iterator<Item = &'a RuntimeTask> + 'a {
        self.active_tasks
            .iter()
            .filter(move |t| t.is_active() && !t.suspended && keys.contains(&t.definition_key))
    }

    /// One-line description for logs.
    pub fn summary(&self) -> String {
        format!(
            "instance={} source={} target={} ({}) return={} cancel={} executions={} branches={} gateways={} mi={} parallel={} inclusive={} special={}",
            self.process_instance_id,
            self.source.id,
            self.target.id,
            self.target.kind,
            self.tasks_to_return.len(),
            self.tasks_to_cancel.len(),
            self.executions_to_move.len(),
            self.branches_to_cleanup.len(),
            self.affected_gateways.len(),
            self.multi_instance_return,
            self.involves_parallel_gateway,
            self.involves_inclusive_gateway,
            self.requires_special_handling,
        )
    }
}
