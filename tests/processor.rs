//! End-to-end tests of the return pipeline against the in-memory runtime.
mod common;
use chrono::Utc;
use common::*;
use modoshi::context::ReturnContext;
use modoshi::error::RuntimeError;
use modoshi::graph::ServiceDefinition;
use modoshi::prelude::*;
use modoshi::processor::{return_flag, ServiceTaskPolicy};
use modoshi::runtime::{CommentType, MoveRecord, ProcessVariableStore, ReturnHistory, ReturnRecord};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn test_linear_return() {
    let runtime = runtime_with(linear_graph());
    let at_c = runtime.spawn_task(INSTANCE, "C", Some(ACTOR));
    let report = processor_for(&runtime)
        .compute_and_execute_return(ACTOR, &at_c.id, "A", "missing attachment")
        .unwrap();

    assert_eq!(report.stage, ReturnStage::Done);
    assert_eq!(report.source_key, "C");
    assert_eq!(report.target_key, "A");
    assert_eq!(report.returned_tasks, vec![at_c.id.clone()]);
    assert!(report.cancelled_tasks.is_empty());
    assert_eq!(report.moved_executions, vec![at_c.execution_id.clone()]);

    assert_eq!(active_keys(&runtime), vec!["A"]);
    assert_eq!(
        runtime.status_of(&at_c.id),
        Some((TaskStatus::Return, Some("missing attachment".to_string())))
    );
    let new_task = &runtime.active_tasks(INSTANCE)[0];
    assert_eq!(runtime.status_of(&new_task.id).map(|s| s.0), Some(TaskStatus::Running));

    let comments = runtime.comments();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].comment_type, CommentType::Return);
    assert!(comments[0].message.contains("missing attachment"));

    // The return flag only lives until cleanup.
    assert_eq!(runtime.variable(INSTANCE, &return_flag("A")), None);
    let history = runtime.returns(INSTANCE).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!((history[0].source_key.as_str(), history[0].target_key.as_str()), ("C", "A"));
}

#[test]
fn test_return_flag_kept_without_cleanup() {
    let runtime = runtime_with(linear_graph());
    let at_c = runtime.spawn_task(INSTANCE, "C", Some(ACTOR));
    let processor = ReturnProcessor::builder(RuntimeServices::from_runtime(runtime.clone()))
        .with_config(ReturnConfig {
            cleanup_enabled: false,
            ..ReturnConfig::default()
        })
        .build();
    let report = processor
        .compute_and_execute_return(ACTOR, &at_c.id, "B", "again")
        .unwrap();

    assert!(report.cleanup.is_none());
    assert_eq!(runtime.variable(INSTANCE, &return_flag("B")), Some(Value::Bool(true)));
}

#[test]
fn test_tasks_of_other_assignees_are_cancelled() {
    let runtime = runtime_with(parallel_graph());
    let at_b = runtime.spawn_task(INSTANCE, "B", Some(ACTOR));
    let at_c = runtime.spawn_task(INSTANCE, "C", Some("bob"));
    let report = processor_for(&runtime)
        .compute_and_execute_return(ACTOR, &at_b.id, "ps", "redo both")
        .unwrap();

    assert_eq!(report.returned_tasks, vec![at_b.id.clone()]);
    assert_eq!(report.cancelled_tasks, vec![at_c.id.clone()]);
    assert_eq!(report.selected_branches, vec!["f3".to_string(), "f4".to_string()]);
    assert_eq!(report.reset_branches, vec!["f3".to_string(), "f4".to_string()]);
    assert_eq!(runtime.status_of(&at_b.id).map(|s| s.0), Some(TaskStatus::Return));
    assert_eq!(runtime.status_of(&at_c.id).map(|s| s.0), Some(TaskStatus::Cancel));

    let moves = runtime.moves();
    assert_eq!(moves.len(), 1);
    match &moves[0] {
        MoveRecord::ExecutionsToActivity { executions, target } => {
            assert_eq!(target, "ps");
            assert_eq!(executions.len(), 2);
        }
        other => panic!("unexpected move {:?}", other),
    }
    assert!(runtime.active_tasks(INSTANCE).is_empty());
}

#[test]
fn test_return_across_parallel_region() {
    let runtime = runtime_with(parallel_graph());
    let at_d = runtime.spawn_task(INSTANCE, "D", Some(ACTOR));
    let report = processor_for(&runtime)
        .compute_and_execute_return(ACTOR, &at_d.id, "A", "start over")
        .unwrap();

    assert_eq!(report.returned_tasks, vec![at_d.id]);
    assert_eq!(active_keys(&runtime), vec!["A"]);
    assert!(report.cleanup.unwrap().is_clean());
}

#[test]
fn test_multi_instance_return_recreates_instances() {
    let runtime = runtime_with(multi_instance_graph(Some(3), None));
    runtime.set(INSTANCE, "nrOfInstances_M", Value::Number(3.0)).unwrap();
    runtime.set(INSTANCE, "loopCounter_M", Value::Number(2.0)).unwrap();
    let at_b = runtime.spawn_task(INSTANCE, "B", Some(ACTOR));
    let report = processor_for(&runtime)
        .compute_and_execute_return(ACTOR, &at_b.id, "M", "review again")
        .unwrap();

    assert_eq!(active_keys(&runtime), vec!["M", "M", "M"]);
    let cleanup = report.cleanup.unwrap();
    assert!(cleanup.removed_tasks.is_empty());
    assert_eq!(cleanup.restored_tasks.len(), 3);
    assert_eq!(runtime.variable(INSTANCE, "nrOfInstances_M"), None);
    assert_eq!(runtime.variable(INSTANCE, "loopCounter_M"), None);
}

#[test]
fn test_gateway_return_clears_gateway_state() {
    let runtime = runtime_with(exclusive_graph());
    runtime.set(INSTANCE, "GATEWAY_STATE_xs", Value::from("visited")).unwrap();
    runtime.set(INSTANCE, "RETURN_TEMP_FLAG", Value::Bool(true)).unwrap();
    runtime.set(INSTANCE, "amount", Value::Number(10.0)).unwrap();
    let at_b = runtime.spawn_task(INSTANCE, "B", Some(ACTOR));
    processor_for(&runtime)
        .compute_and_execute_return(ACTOR, &at_b.id, "xs", "wrong path")
        .unwrap();

    assert_eq!(runtime.variable(INSTANCE, "GATEWAY_STATE_xs"), None);
    assert_eq!(runtime.variable(INSTANCE, "RETURN_TEMP_FLAG"), None);
    assert_eq!(runtime.variable(INSTANCE, "amount"), Some(Value::Number(10.0)));
    // Only user-task targets have their return flag cleared.
    assert_eq!(runtime.variable(INSTANCE, &return_flag("xs")), Some(Value::Bool(true)));
}

#[test]
fn test_unknown_task_and_target() {
    let runtime = runtime_with(linear_graph());
    let processor = processor_for(&runtime);
    assert!(matches!(
        processor.compute_and_execute_return(ACTOR, "task-404", "A", "r"),
        Err(ReturnError::NotFound { kind: "task", .. })
    ));

    let at_c = runtime.spawn_task(INSTANCE, "C", Some(ACTOR));
    assert!(matches!(
        processor.compute_and_execute_return(ACTOR, &at_c.id, "Z", "r"),
        Err(ReturnError::NotFound { kind: "node", ref id }) if id == "Z"
    ));
    assert!(runtime.moves().is_empty());
}

#[test]
fn test_rejections_map_to_errors() {
    let runtime = runtime_with(linear_graph());
    let at_a = runtime.spawn_task(INSTANCE, "A", Some(ACTOR));
    let at_c = runtime.spawn_task(INSTANCE, "C", Some(ACTOR));
    let processor = processor_for(&runtime);

    assert!(matches!(
        processor.compute_and_execute_return(ACTOR, &at_a.id, "C", "r"),
        Err(ReturnError::CircularReturn { .. })
    ));
    assert!(matches!(
        processor.compute_and_execute_return(ACTOR, &at_c.id, "C", "r"),
        Err(ReturnError::UnreachableTarget { .. })
    ));
    assert!(matches!(
        processor.compute_and_execute_return(ACTOR, &at_c.id, "end", "r"),
        Err(ReturnError::InvalidTarget { .. })
    ));
    assert!(runtime.comments().is_empty());
    assert_eq!(active_keys(&runtime), vec!["A", "C"]);
}

#[test]
fn test_suspended_task_cannot_return() {
    let runtime = runtime_with(linear_graph());
    let at_c = runtime.spawn_task(INSTANCE, "C", Some(ACTOR));
    runtime.suspend_task(&at_c.id).unwrap();
    assert!(matches!(
        processor_for(&runtime).compute_and_execute_return(ACTOR, &at_c.id, "A", "r"),
        Err(ReturnError::InvalidTarget { .. })
    ));
}

#[test]
fn test_completed_task_cannot_return() {
    let runtime = runtime_with(linear_graph());
    let at_c = runtime.spawn_task(INSTANCE, "C", Some(ACTOR));
    runtime.complete_task(&at_c.id).unwrap();
    assert!(matches!(
        processor_for(&runtime).compute_and_execute_return(ACTOR, &at_c.id, "A", "r"),
        Err(ReturnError::NotFound { kind: "task", .. })
    ));
}

#[test]
fn test_recorded_history_blocks_cycle() {
    let runtime = runtime_with(linear_graph());
    runtime
        .record(ReturnRecord {
            process_instance_id: INSTANCE.to_string(),
            source_key: "A".to_string(),
            target_key: "C".to_string(),
            actor_id: "bob".to_string(),
            time: Utc::now(),
        })
        .unwrap();
    let at_c = runtime.spawn_task(INSTANCE, "C", Some(ACTOR));
    assert!(matches!(
        processor_for(&runtime).compute_and_execute_return(ACTOR, &at_c.id, "A", "r"),
        Err(ReturnError::CircularReturn { .. })
    ));
}

#[test]
fn test_repeated_returns_are_allowed() {
    let runtime = runtime_with(linear_graph());
    let processor = processor_for(&runtime);
    let at_c = runtime.spawn_task(INSTANCE, "C", Some(ACTOR));
    processor.compute_and_execute_return(ACTOR, &at_c.id, "B", "first").unwrap();

    let at_b = runtime.active_tasks(INSTANCE).remove(0);
    runtime.complete_task(&at_b.id).unwrap();
    let again = runtime.spawn_task(INSTANCE, "C", Some(ACTOR));
    processor.compute_and_execute_return(ACTOR, &again.id, "B", "second").unwrap();

    assert_eq!(runtime.returns(INSTANCE).unwrap().len(), 2);
    assert_eq!(active_keys(&runtime), vec!["B"]);
}

#[test]
fn test_mover_failure_is_action_failed() {
    let runtime = runtime_with(linear_graph());
    let at_c = runtime.spawn_task(INSTANCE, "C", Some(ACTOR));
    runtime.fail_moves(true);
    let result = processor_for(&runtime).compute_and_execute_return(ACTOR, &at_c.id, "A", "r");

    assert!(matches!(result, Err(ReturnError::ActionFailed(RuntimeError::OperationFailed { .. }))));
    assert!(runtime.returns(INSTANCE).unwrap().is_empty());
}

#[test]
fn test_check_return_changes_nothing() {
    let runtime = runtime_with(linear_graph());
    let at_c = runtime.spawn_task(INSTANCE, "C", Some(ACTOR));
    let ctx = processor_for(&runtime).check_return(ACTOR, &at_c.id, "A").unwrap();

    assert_eq!(ctx.return_path, vec!["A", "B", "C"]);
    assert_eq!(ctx.tasks_to_return().len(), 1);
    assert!(runtime.moves().is_empty());
    assert!(runtime.comments().is_empty());
    assert_eq!(runtime.status_of(&at_c.id), None);
}

struct CountingPolicy(AtomicUsize);

impl ServiceTaskPolicy for CountingPolicy {
    fn on_return(&self, _ctx: &ReturnContext) -> std::result::Result<(), RuntimeError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_service_policy_runs_for_special_service_tasks() {
    let policy = Arc::new(CountingPolicy(AtomicUsize::new(0)));
    let runtime = runtime_with(service_graph(ServiceDefinition {
        asynchronous: true,
        ..Default::default()
    }));
    let processor = ReturnProcessor::builder(RuntimeServices::from_runtime(runtime.clone()))
        .with_service_policy(policy.clone())
        .build();

    let at_b = runtime.spawn_task(INSTANCE, "B", Some(ACTOR));
    processor.compute_and_execute_return(ACTOR, &at_b.id, "S", "retry").unwrap();
    assert_eq!(policy.0.load(Ordering::SeqCst), 1);

    let runtime = runtime_with(service_graph(ServiceDefinition::default()));
    let processor = ReturnProcessor::builder(RuntimeServices::from_runtime(runtime.clone()))
        .with_service_policy(policy.clone())
        .build();
    let at_b = runtime.spawn_task(INSTANCE, "B", Some(ACTOR));
    processor.compute_and_execute_return(ACTOR, &at_b.id, "S", "retry").unwrap();
    assert_eq!(policy.0.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_returns_on_one_instance_serialize() {
    let runtime = runtime_with(linear_graph());
    let at_c = runtime.spawn_task(INSTANCE, "C", Some(ACTOR));
    let processor = Arc::new(processor_for(&runtime));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let processor = Arc::clone(&processor);
            let task_id = at_c.id.clone();
            std::thread::spawn(move || {
                processor
                    .compute_and_execute_return(ACTOR, &task_id, "A", "race")
                    .is_ok()
            })
        })
        .collect();
    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(successes, 1);
    assert_eq!(active_keys(&runtime), vec!["A"]);
    assert_eq!(processor.locks().len(), 1);
}

#[test]
fn test_return_within_rework_loop() {
    let runtime = runtime_with(rework_graph("A"));
    let at_d = runtime.spawn_task(INSTANCE, "D", Some(ACTOR));
    let report = processor_for(&runtime)
        .compute_and_execute_return(ACTOR, &at_d.id, "A", "start over")
        .unwrap();

    assert_eq!(report.stage, ReturnStage::Done);
    assert_eq!(report.returned_tasks, vec![at_d.id.clone()]);
    assert_eq!(active_keys(&runtime), vec!["A"]);
}
