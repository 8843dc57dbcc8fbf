//! Tests for the direct jump primitives.
mod common;
use common::*;
use modoshi::jump::JumpOutcome;
use modoshi::prelude::*;
use modoshi::runtime::{CommentType, MoveRecord};

fn keys(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|k| k.to_string()).collect()
}

fn jump_service(runtime: &std::sync::Arc<InMemoryRuntime>) -> JumpService {
    JumpService::new(RuntimeServices::from_runtime(runtime.clone()))
}

#[test]
fn test_many_to_single_without_active_tasks_is_a_no_op() {
    let runtime = runtime_with(linear_graph());
    let outcome = jump_service(&runtime)
        .move_many_to_single(INSTANCE, &keys(&["A", "B"]), "C", "timeout")
        .unwrap();

    assert!(matches!(outcome, JumpOutcome::Skipped { .. }));
    assert!(runtime.moves().is_empty());
    assert!(runtime.comments().is_empty());
    assert!(runtime.active_tasks(INSTANCE).is_empty());
}

#[test]
fn test_many_to_single_merges_branches() {
    let runtime = runtime_with(parallel_graph());
    let at_b = runtime.spawn_task(INSTANCE, "B", Some(ACTOR));
    let at_c = runtime.spawn_task(INSTANCE, "C", Some("bob"));
    let outcome = jump_service(&runtime)
        .move_many_to_single(INSTANCE, &keys(&["B", "C"]), "D", "escalated")
        .unwrap();

    assert_eq!(
        outcome,
        JumpOutcome::Moved {
            tasks: vec![at_b.id.clone(), at_c.id.clone()]
        }
    );
    assert_eq!(active_keys(&runtime), vec!["D"]);
    for task in [&at_b, &at_c] {
        assert_eq!(
            runtime.status_of(&task.id),
            Some((TaskStatus::Cancel, Some("escalated".to_string())))
        );
    }
    assert!(runtime
        .comments()
        .iter()
        .all(|c| c.comment_type == CommentType::TimeoutJump));
}

#[test]
fn test_single_to_many_forks() {
    let runtime = runtime_with(parallel_graph());
    let at_a = runtime.spawn_task(INSTANCE, "A", Some(ACTOR));
    let outcome = jump_service(&runtime)
        .move_single_to_many(INSTANCE, "A", &keys(&["B", "C"]), "skip ahead")
        .unwrap();

    assert!(outcome.is_moved());
    assert_eq!(active_keys(&runtime), vec!["B", "C"]);
    assert_eq!(runtime.status_of(&at_a.id).map(|s| s.0), Some(TaskStatus::Cancel));
    assert_eq!(
        runtime.moves(),
        vec![MoveRecord::SingleToMany {
            source: "A".to_string(),
            targets: keys(&["B", "C"]),
        }]
    );
}

#[test]
fn test_missing_target_is_fatal() {
    let runtime = runtime_with(linear_graph());
    runtime.spawn_task(INSTANCE, "A", Some(ACTOR));
    let service = jump_service(&runtime);

    assert!(matches!(
        service.move_many_to_single(INSTANCE, &keys(&["A"]), "Z", "r"),
        Err(ReturnError::NotFound { kind: "node", ref id }) if id == "Z"
    ));
    assert!(matches!(
        service.move_single_to_many(INSTANCE, "A", &keys(&["B", "Z"]), "r"),
        Err(ReturnError::NotFound { kind: "node", .. })
    ));
    assert!(runtime.moves().is_empty());
}

#[test]
fn test_unknown_instance_is_fatal() {
    let runtime = runtime_with(linear_graph());
    assert!(matches!(
        jump_service(&runtime).move_many_to_single("pi-404", &keys(&["A"]), "B", "r"),
        Err(ReturnError::NotFound { kind: "process instance", .. })
    ));
}

#[test]
fn test_execution_to_activity_marks_return() {
    let runtime = runtime_with(linear_graph());
    let at_c = runtime.spawn_task(INSTANCE, "C", Some(ACTOR));
    let outcome = jump_service(&runtime)
        .move_execution_to_activity(&at_c.execution_id, "A", "back to start")
        .unwrap();

    assert_eq!(outcome, JumpOutcome::Moved { tasks: vec![at_c.id.clone()] });
    assert_eq!(active_keys(&runtime), vec!["A"]);
    assert_eq!(runtime.status_of(&at_c.id).map(|s| s.0), Some(TaskStatus::Return));
    assert_eq!(runtime.comments()[0].comment_type, CommentType::Return);
}

#[test]
fn test_missing_execution_is_benign() {
    let runtime = runtime_with(linear_graph());
    let service = jump_service(&runtime);

    let outcome = service.move_execution_to_activity("exec-404", "A", "r").unwrap();
    assert!(!outcome.is_moved());
    let outcome = service
        .move_execution_to_activities("exec-404", &keys(&["A", "B"]), "r")
        .unwrap();
    assert!(!outcome.is_moved());
    let outcome = service
        .move_executions_to_activity(&keys(&["exec-404"]), "A", "r")
        .unwrap();
    assert!(!outcome.is_moved());
    assert!(runtime.moves().is_empty());
}

#[test]
fn test_execution_to_activities_marks_cancel() {
    let runtime = runtime_with(parallel_graph());
    let at_a = runtime.spawn_task(INSTANCE, "A", Some(ACTOR));
    let outcome = jump_service(&runtime)
        .move_execution_to_activities(&at_a.execution_id, &keys(&["B", "C"]), "fan out")
        .unwrap();

    assert!(outcome.is_moved());
    assert_eq!(active_keys(&runtime), vec!["B", "C"]);
    assert_eq!(runtime.status_of(&at_a.id).map(|s| s.0), Some(TaskStatus::Cancel));
    assert_eq!(runtime.comments()[0].comment_type, CommentType::TimeoutJump);
}

#[test]
fn test_executions_to_activity_skips_missing_executions() {
    let runtime = runtime_with(parallel_graph());
    let at_b = runtime.spawn_task(INSTANCE, "B", Some(ACTOR));
    let at_c = runtime.spawn_task(INSTANCE, "C", Some("bob"));
    let executions = vec![
        at_b.execution_id.clone(),
        "exec-404".to_string(),
        at_c.execution_id.clone(),
    ];
    let outcome = jump_service(&runtime)
        .move_executions_to_activity(&executions, "A", "reset")
        .unwrap();

    assert!(outcome.is_moved());
    assert_eq!(active_keys(&runtime), vec!["A"]);
    assert_eq!(
        runtime.moves(),
        vec![MoveRecord::ExecutionsToActivity {
            executions: vec![at_b.execution_id.clone(), at_c.execution_id.clone()],
            target: "A".to_string(),
        }]
    );
    assert_eq!(runtime.status_of(&at_c.id).map(|s| s.0), Some(TaskStatus::Return));
}

#[test]
fn test_executions_from_different_instances_are_rejected() {
    let runtime = runtime_with(linear_graph());
    runtime.start_instance("pi-2", "linear");
    let first = runtime.spawn_task(INSTANCE, "B", Some(ACTOR));
    let second = runtime.spawn_task("pi-2", "B", Some(ACTOR));

    let result = jump_service(&runtime).move_executions_to_activity(
        &[first.execution_id, second.execution_id],
        "A",
        "r",
    );
    assert!(matches!(result, Err(ReturnError::InvalidTarget { .. })));
    assert!(runtime.moves().is_empty());
}
