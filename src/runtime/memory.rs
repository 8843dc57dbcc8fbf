//! A deterministic, single-process implementation of every runtime collaborator.
//!
//! It keeps instances, executions, tasks and variables in memory and simulates
//! just enough of an engine for moves to be observable: moving an execution to
//! a user task creates the task(s) there, anything else only repositions the
//! execution. Time is a logical clock so creation order is always strict.

use super::{
    ActiveTaskQuery, ActivityStateMover, CommentType, Execution, ProcessInstance,
    ProcessInstanceQuery, ProcessVariableStore, ReturnHistory, ReturnRecord, RuntimeSnapshot,
    RuntimeTask, TaskScope, TaskStatus, TaskStatusWriter,
};
use crate::ast::Value;
use crate::condition::Variables;
use crate::error::{GraphError, RuntimeError};
use crate::graph::{GraphRegistry, ProcessGraph, ProcessGraphLoader};
use ahash::{AHashMap, AHashSet};
use chrono::{DateTime, Duration, Utc};
use itertools::Itertools;
use std::sync::{Arc, Mutex, MutexGuard};

const CLOCK_ORIGIN_SECS: i64 = 1_700_000_000;

/// An audit comment written through `TaskStatusWriter::add_comment`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentRecord {
    pub task_id: String,
    pub process_instance_id: String,
    pub comment_type: CommentType,
    pub message: String,
}

/// A call made on the `ActivityStateMover`.
#[derive(Debug, Clone, PartialEq)]
pub enum MoveRecord {
    SingleToMany { source: String, targets: Vec<String> },
    ManyToSingle { sources: Vec<String>, target: String },
    ExecutionToActivity { execution: String, target: String },
    ExecutionToActivities { execution: String, targets: Vec<String> },
    ExecutionsToActivity { executions: Vec<String>, target: String },
}

#[derive(Debug, Clone)]
struct StoredTask {
    task: RuntimeTask,
    status: Option<(TaskStatus, Option<String>)>,
    deleted: bool,
}

#[derive(Default)]
struct State {
    instances: AHashMap<String, ProcessInstance>,
    executions: AHashMap<String, Execution>,
    tasks: Vec<StoredTask>,
    variables: AHashMap<String, Variables>,
    comments: Vec<CommentRecord>,
    history: Vec<ReturnRecord>,
    moves: Vec<MoveRecord>,
    failing_deletes: AHashSet<String>,
    fail_moves: bool,
    last_time: Option<DateTime<Utc>>,
    next_id: u64,
}

impl State {
    fn tick(&mut self) -> DateTime<Utc> {
        let next = match self.last_time {
            Some(last) => last + Duration::seconds(1),
            None => DateTime::from_timestamp(CLOCK_ORIGIN_SECS, 0).unwrap_or_default(),
        };
        self.last_time = Some(next);
        next
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn task_mut(&mut self, task_id: &str) -> Result<&mut StoredTask, RuntimeError> {
        self.tasks
            .iter_mut()
            .find(|t| t.task.id == task_id)
            .ok_or_else(|| RuntimeError::TaskNotFound(task_id.to_string()))
    }

    fn active(&self) -> impl Iterator<Item = &RuntimeTask> {
        self.tasks
            .iter()
            .filter(|t| !t.deleted && t.task.is_active())
            .map(|t| &t.task)
    }

    /// Ends the active tasks of an execution and drops the execution.
    fn retire_execution(&mut self, execution_id: &str) {
        let now = self.tick();
        for stored in self.tasks.iter_mut() {
            if stored.task.execution_id == execution_id && stored.task.is_active() {
                stored.task.end_time = Some(now);
            }
        }
        self.executions.remove(execution_id);
    }

    fn create_task(&mut self, instance: &ProcessInstance, execution_id: &str, key: &str) -> RuntimeTask {
        let task = RuntimeTask {
            id: self.next_id("task"),
            process_instance_id: instance.id.clone(),
            process_definition_id: instance.process_definition_id.clone(),
            execution_id: execution_id.to_string(),
            definition_key: key.to_string(),
            assignee: None,
            create_time: self.tick(),
            end_time: None,
            suspended: false,
        };
        self.tasks.push(StoredTask {
            task: task.clone(),
            status: None,
            deleted: false,
        });
        task
    }

    fn create_execution(&mut self, instance_id: &str, activity: &str) -> String {
        let id = self.next_id("exec");
        self.executions.insert(
            id.clone(),
            Execution {
                id: id.clone(),
                process_instance_id: instance_id.to_string(),
                activity_id: Some(activity.to_string()),
            },
        );
        id
    }
}

pub struct InMemoryRuntime {
    graphs: GraphRegistry,
    state: Mutex<State>,
}

impl Default for InMemoryRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRuntime {
    pub fn new() -> Self {
        Self {
            graphs: GraphRegistry::new(),
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_graph(self, graph: ProcessGraph) -> Self {
        self.graphs.register(graph);
        self
    }

    /// Rebuilds runtime state from a snapshot.
    pub fn from_snapshot(snapshot: RuntimeSnapshot) -> Self {
        let runtime = Self::new();
        {
            let mut state = runtime.lock();
            for instance in snapshot.instances {
                state.instances.insert(instance.id.clone(), instance);
            }
            for execution in snapshot.executions {
                state.executions.insert(execution.id.clone(), execution);
            }
            state.last_time = snapshot.tasks.iter().map(|t| t.create_time).max();
            for task in snapshot.tasks {
                if !state.executions.contains_key(&task.execution_id) {
                    state.executions.insert(
                        task.execution_id.clone(),
                        Execution {
                            id: task.execution_id.clone(),
                            process_instance_id: task.process_instance_id.clone(),
                            activity_id: Some(task.definition_key.clone()),
                        },
                    );
                }
                state.tasks.push(StoredTask {
                    task,
                    status: None,
                    deleted: false,
                });
            }
            for (instance_id, vars) in snapshot.variables {
                let converted = vars
                    .iter()
                    .map(|(name, value)| (name.clone(), Value::from_json(value)))
                    .collect();
                state.variables.insert(instance_id, converted);
            }
            state.history = snapshot.history;
            // Generated ids must not collide with the snapshot's "task-N"/"exec-N".
            state.next_id = state
                .tasks
                .iter()
                .map(|t| t.task.id.as_str())
                .chain(state.executions.keys().map(String::as_str))
                .filter_map(|id| id.rsplit('-').next()?.parse::<u64>().ok())
                .max()
                .unwrap_or(0);
        }
        runtime
    }

    /// Captures the current runtime state, active tasks only.
    pub fn snapshot(&self) -> RuntimeSnapshot {
        let state = self.lock();
        let mut instances: Vec<_> = state.instances.values().cloned().collect();
        instances.sort_by(|a, b| a.id.cmp(&b.id));
        let mut executions: Vec<_> = state.executions.values().cloned().collect();
        executions.sort_by(|a, b| a.id.cmp(&b.id));
        RuntimeSnapshot {
            instances,
            executions,
            tasks: state.active().cloned().collect(),
            variables: state
                .variables
                .iter()
                .map(|(id, vars)| {
                    let json = vars.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
                    (id.clone(), json)
                })
                .collect(),
            history: state.history.clone(),
        }
    }

    pub fn register_graph(&self, graph: ProcessGraph) -> Arc<ProcessGraph> {
        self.graphs.register(graph)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Starts an instance of a registered definition. No tasks are created.
    pub fn start_instance(&self, instance_id: &str, definition_id: &str) -> ProcessInstance {
        let instance = ProcessInstance {
            id: instance_id.to_string(),
            process_definition_id: definition_id.to_string(),
        };
        let mut state = self.lock();
        state
            .instances
            .insert(instance_id.to_string(), instance.clone());
        state.variables.entry(instance_id.to_string()).or_default();
        instance
    }

    /// Creates an active task at `key` on a fresh execution.
    pub fn spawn_task(&self, instance_id: &str, key: &str, assignee: Option<&str>) -> RuntimeTask {
        let mut state = self.lock();
        let execution_id = state.create_execution(instance_id, key);
        Self::spawn_on(&mut state, instance_id, &execution_id, key, assignee)
    }

    /// Creates an active task at `key` on an existing (or new) execution id.
    pub fn spawn_task_on(
        &self,
        instance_id: &str,
        execution_id: &str,
        key: &str,
        assignee: Option<&str>,
    ) -> RuntimeTask {
        let mut state = self.lock();
        if !state.executions.contains_key(execution_id) {
            state.executions.insert(
                execution_id.to_string(),
                Execution {
                    id: execution_id.to_string(),
                    process_instance_id: instance_id.to_string(),
                    activity_id: Some(key.to_string()),
                },
            );
        }
        Self::spawn_on(&mut state, instance_id, execution_id, key, assignee)
    }

    fn spawn_on(
        state: &mut State,
        instance_id: &str,
        execution_id: &str,
        key: &str,
        assignee: Option<&str>,
    ) -> RuntimeTask {
        let instance = state
            .instances
            .get(instance_id)
            .cloned()
            .unwrap_or_else(|| ProcessInstance {
                id: instance_id.to_string(),
                process_definition_id: String::new(),
            });
        let mut task = state.create_task(&instance, execution_id, key);
        if let Some(assignee) = assignee {
            task.assignee = Some(assignee.to_string());
            if let Some(stored) = state.tasks.last_mut() {
                stored.task.assignee = task.assignee.clone();
            }
        }
        task
    }

    pub fn complete_task(&self, task_id: &str) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        let now = state.tick();
        state.task_mut(task_id)?.task.end_time = Some(now);
        Ok(())
    }

    pub fn suspend_task(&self, task_id: &str) -> Result<(), RuntimeError> {
        self.lock().task_mut(task_id)?.task.suspended = true;
        Ok(())
    }

    /// Makes every later `delete` of this task fail.
    pub fn fail_delete_of(&self, task_id: &str) {
        self.lock().failing_deletes.insert(task_id.to_string());
    }

    /// Makes every later mover call fail.
    pub fn fail_moves(&self, fail: bool) {
        self.lock().fail_moves = fail;
    }

    pub fn active_tasks(&self, instance_id: &str) -> Vec<RuntimeTask> {
        self.lock()
            .active()
            .filter(|t| t.process_instance_id == instance_id)
            .cloned()
            .collect()
    }

    pub fn status_of(&self, task_id: &str) -> Option<(TaskStatus, Option<String>)> {
        self.lock()
            .tasks
            .iter()
            .find(|t| t.task.id == task_id)
            .and_then(|t| t.status.clone())
    }

    pub fn is_deleted(&self, task_id: &str) -> bool {
        self.lock()
            .tasks
            .iter()
            .any(|t| t.task.id == task_id && t.deleted)
    }

    pub fn comments(&self) -> Vec<CommentRecord> {
        self.lock().comments.clone()
    }

    pub fn moves(&self) -> Vec<MoveRecord> {
        self.lock().moves.clone()
    }

    pub fn variable(&self, instance_id: &str, name: &str) -> Option<Value> {
        self.lock()
            .variables
            .get(instance_id)
            .and_then(|vars| vars.get(name))
            .cloned()
    }

    fn check_moves(state: &State, operation: &str) -> Result<(), RuntimeError> {
        if state.fail_moves {
            return Err(RuntimeError::OperationFailed {
                operation: operation.to_string(),
                message: "mover unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn instance_of_execution(state: &State, execution_id: &str) -> Result<ProcessInstance, RuntimeError> {
        let execution = state
            .executions
            .get(execution_id)
            .ok_or_else(|| RuntimeError::ExecutionNotFound(execution_id.to_string()))?;
        state
            .instances
            .get(&execution.process_instance_id)
            .cloned()
            .ok_or_else(|| RuntimeError::InstanceNotFound(execution.process_instance_id.clone()))
    }

    /// Places a token at `target`, creating user tasks where the graph has one.
    fn arrive(&self, state: &mut State, instance: &ProcessInstance, execution_id: &str, target: &str) {
        let node = self
            .graphs
            .load(&instance.process_definition_id)
            .ok()
            .and_then(|graph| graph.node(target).cloned());
        if let Some(execution) = state.executions.get_mut(execution_id) {
            execution.activity_id = Some(target.to_string());
        }
        let Some(node) = node else {
            return;
        };
        if !node.is_user_task() {
            return;
        }
        match node.multi_instance.as_ref() {
            Some(mi) if !mi.sequential => {
                let count = mi.cardinality.unwrap_or(1).max(1);
                for _ in 0..count {
                    let child = state.create_execution(&instance.id, target);
                    state.create_task(instance, &child, target);
                }
            }
            _ => {
                state.create_task(instance, execution_id, target);
            }
        }
    }

    /// Merges several executions into one that continues at `target`.
    fn merge_into(&self, state: &mut State, instance: &ProcessInstance, executions: &[String], target: &str) {
        for execution_id in executions {
            state.retire_execution(execution_id);
        }
        let survivor = state.create_execution(&instance.id, target);
        self.arrive(state, instance, &survivor, target);
    }

    /// Replaces the given executions by one new execution per target.
    fn fan_out(&self, state: &mut State, instance: &ProcessInstance, executions: &[String], targets: &[String]) {
        for execution_id in executions {
            state.retire_execution(execution_id);
        }
        for target in targets {
            let execution = state.create_execution(&instance.id, target);
            self.arrive(state, instance, &execution, target);
        }
    }

    fn executions_at(state: &State, instance_id: &str, keys: &[String]) -> Vec<String> {
        state
            .active()
            .filter(|t| t.process_instance_id == instance_id && keys.contains(&t.definition_key))
            .map(|t| t.execution_id.clone())
            .unique()
            .collect()
    }
}

impl ProcessGraphLoader for InMemoryRuntime {
    fn load(&self, definition_id: &str) -> Result<Arc<ProcessGraph>, GraphError> {
        self.graphs.load(definition_id)
    }
}

impl ProcessInstanceQuery for InMemoryRuntime {
    fn instance(&self, instance_id: &str) -> Result<Option<ProcessInstance>, RuntimeError> {
        Ok(self.lock().instances.get(instance_id).cloned())
    }

    fn execution(&self, execution_id: &str) -> Result<Option<Execution>, RuntimeError> {
        Ok(self.lock().executions.get(execution_id).cloned())
    }
}

impl ActiveTaskQuery for InMemoryRuntime {
    fn task(&self, task_id: &str) -> Result<Option<RuntimeTask>, RuntimeError> {
        Ok(self
            .lock()
            .tasks
            .iter()
            .find(|t| t.task.id == task_id && !t.deleted)
            .map(|t| t.task.clone()))
    }

    fn list_active(&self, scope: TaskScope<'_>) -> Result<Vec<RuntimeTask>, RuntimeError> {
        let state = self.lock();
        Ok(state
            .active()
            .filter(|t| match scope {
                TaskScope::ProcessInstance(id) => t.process_instance_id == id,
                TaskScope::Execution(id) => t.execution_id == id,
            })
            .cloned()
            .collect())
    }
}

impl TaskStatusWriter for InMemoryRuntime {
    fn set_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        reason: Option<&str>,
    ) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        state.task_mut(task_id)?.status = Some((status, reason.map(str::to_string)));
        Ok(())
    }

    fn add_comment(
        &self,
        task_id: &str,
        process_instance_id: &str,
        comment_type: CommentType,
        message: &str,
    ) -> Result<(), RuntimeError> {
        self.lock().comments.push(CommentRecord {
            task_id: task_id.to_string(),
            process_instance_id: process_instance_id.to_string(),
            comment_type,
            message: message.to_string(),
        });
        Ok(())
    }

    fn delete(&self, task_id: &str, reason: &str) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        if state.failing_deletes.contains(task_id) {
            return Err(RuntimeError::OperationFailed {
                operation: "delete".to_string(),
                message: format!("task '{}' is locked ({})", task_id, reason),
            });
        }
        let now = state.tick();
        let stored = state.task_mut(task_id)?;
        stored.deleted = true;
        stored.task.end_time.get_or_insert(now);
        Ok(())
    }
}

impl ActivityStateMover for InMemoryRuntime {
    fn move_single_to_many(
        &self,
        process_instance_id: &str,
        source_key: &str,
        target_keys: &[String],
    ) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        Self::check_moves(&state, "move_single_to_many")?;
        let instance = state
            .instances
            .get(process_instance_id)
            .cloned()
            .ok_or_else(|| RuntimeError::InstanceNotFound(process_instance_id.to_string()))?;
        let executions = Self::executions_at(&state, process_instance_id, &[source_key.to_string()]);
        self.fan_out(&mut state, &instance, &executions, target_keys);
        state.moves.push(MoveRecord::SingleToMany {
            source: source_key.to_string(),
            targets: target_keys.to_vec(),
        });
        Ok(())
    }

    fn move_many_to_single(
        &self,
        process_instance_id: &str,
        source_keys: &[String],
        target_key: &str,
    ) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        Self::check_moves(&state, "move_many_to_single")?;
        let instance = state
            .instances
            .get(process_instance_id)
            .cloned()
            .ok_or_else(|| RuntimeError::InstanceNotFound(process_instance_id.to_string()))?;
        let executions = Self::executions_at(&state, process_instance_id, source_keys);
        self.merge_into(&mut state, &instance, &executions, target_key);
        state.moves.push(MoveRecord::ManyToSingle {
            sources: source_keys.to_vec(),
            target: target_key.to_string(),
        });
        Ok(())
    }

    fn move_execution_to_activity(
        &self,
        execution_id: &str,
        target_key: &str,
    ) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        Self::check_moves(&state, "move_execution_to_activity")?;
        let instance = Self::instance_of_execution(&state, execution_id)?;
        self.merge_into(&mut state, &instance, &[execution_id.to_string()], target_key);
        state.moves.push(MoveRecord::ExecutionToActivity {
            execution: execution_id.to_string(),
            target: target_key.to_string(),
        });
        Ok(())
    }

    fn move_execution_to_activities(
        &self,
        execution_id: &str,
        target_keys: &[String],
    ) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        Self::check_moves(&state, "move_execution_to_activities")?;
        let instance = Self::instance_of_execution(&state, execution_id)?;
        self.fan_out(&mut state, &instance, &[execution_id.to_string()], target_keys);
        state.moves.push(MoveRecord::ExecutionToActivities {
            execution: execution_id.to_string(),
            targets: target_keys.to_vec(),
        });
        Ok(())
    }

    fn move_executions_to_activity(
        &self,
        execution_ids: &[String],
        target_key: &str,
    ) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        Self::check_moves(&state, "move_executions_to_activity")?;
        let first = execution_ids.first().ok_or_else(|| RuntimeError::OperationFailed {
            operation: "move_executions_to_activity".to_string(),
            message: "no executions given".to_string(),
        })?;
        let instance = Self::instance_of_execution(&state, first)?;
        self.merge_into(&mut state, &instance, execution_ids, target_key);
        state.moves.push(MoveRecord::ExecutionsToActivity {
            executions: execution_ids.to_vec(),
            target: target_key.to_string(),
        });
        Ok(())
    }
}

impl ProcessVariableStore for InMemoryRuntime {
    fn variables(&self, process_instance_id: &str) -> Result<Variables, RuntimeError> {
        Ok(self
            .lock()
            .variables
            .get(process_instance_id)
            .cloned()
            .unwrap_or_default())
    }

    fn set(&self, process_instance_id: &str, name: &str, value: Value) -> Result<(), RuntimeError> {
        self.lock()
            .variables
            .entry(process_instance_id.to_string())
            .or_default()
            .insert(name.to_string(), value);
        Ok(())
    }

    fn remove(&self, process_instance_id: &str, name: &str) -> Result<(), RuntimeError> {
        if let Some(vars) = self.lock().variables.get_mut(process_instance_id) {
            vars.remove(name);
        }
        Ok(())
    }
}

impl ReturnHistory for InMemoryRuntime {
    fn returns(&self, process_instance_id: &str) -> Result<Vec<ReturnRecord>, RuntimeError> {
        Ok(self
            .lock()
            .history
            .iter()
            .filter(|r| r.process_instance_id == process_instance_id)
            .cloned()
            .collect())
    }

    fn record(&self, record: ReturnRecord) -> Result<(), RuntimeError> {
        self.lock().history.push(record);
        Ok(())
    }
}
