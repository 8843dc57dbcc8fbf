//! Unit tests for the small building blocks of Modoshi.
mod common;
use common::*;
use modoshi::context::{MultiInstanceReset, ReturnContext};
use modoshi::error::{ConfigError, EvaluationError};
use modoshi::lock::InstanceLocks;
use modoshi::prelude::*;
use modoshi::runtime::ProcessVariableStore;
use std::sync::Arc;

#[test]
fn test_value_display() {
    assert_eq!(format!("{}", Value::Number(42.0)), "42");
    assert_eq!(format!("{}", Value::Number(2.5)), "2.5");
    assert_eq!(format!("{}", Value::Bool(true)), "true");
    assert_eq!(format!("{}", Value::Text("ok".into())), "'ok'");
    assert_eq!(format!("{}", Value::Null), "null");
}

#[test]
fn test_value_from_json() {
    assert_eq!(Value::from_json(&serde_json::json!(7)), Value::Number(7.0));
    assert_eq!(Value::from_json(&serde_json::json!("x")), Value::Text("x".into()));
    assert_eq!(Value::from_json(&serde_json::json!([1, 2])), Value::Null);
    assert_eq!(Value::Bool(false).to_json(), serde_json::json!(false));
}

#[test]
fn test_trace_formatter_short_circuit() {
    let trace = EvaluationTrace::BinaryOp {
        op_symbol: "OR",
        left: Box::new(EvaluationTrace::Leaf {
            source: "true".to_string(),
            value: Value::Bool(true),
        }),
        right: Box::new(EvaluationTrace::NotEvaluated),
        outcome: Value::Bool(true),
    };

    let formatted = TraceFormatter::format_trace(&trace);
    assert_eq!(formatted, "true");
}

#[test]
fn test_error_display() {
    let err = ReturnError::UnreachableTarget {
        source_node: "B".to_string(),
        target: "Z".to_string(),
    };
    assert!(err.to_string().contains("'Z'"));
    assert!(err.to_string().contains("'B'"));

    let eval_err = EvaluationError::TypeMismatch {
        operation: "+".to_string(),
        expected: "Number".to_string(),
        found: Value::Bool(false),
    };
    assert!(eval_err.to_string().contains('+'));
    assert!(eval_err.to_string().contains("Number"));
    assert!(eval_err.to_string().contains("false"));

    assert_eq!(TaskStatus::Cancel.to_string(), "CANCEL");
}

#[test]
fn test_node_kind_names() {
    assert_eq!(NodeKind::from_name("inclusiveGateway"), Some(NodeKind::InclusiveGateway));
    assert_eq!(NodeKind::from_name("scriptTask"), None);
    assert_eq!(NodeKind::ParallelGateway.to_string(), "parallelGateway");
    assert!(NodeKind::ExclusiveGateway.is_gateway());
    assert!(!NodeKind::UserTask.is_gateway());
}

#[test]
fn test_config_defaults_and_overrides() {
    let config = ReturnConfig::from_json_str("{}").unwrap();
    assert_eq!(config, ReturnConfig::default());
    assert_eq!(config.max_search_depth, 100);
    assert_eq!(config.pairing_rule, PairingRule::JoinDiscovery);
    assert!(config.reevaluate_conditions);
    assert!(config.cleanup_enabled);

    let config =
        ReturnConfig::from_json_str(r#"{"pairing_rule": "parity", "max_search_depth": 5}"#).unwrap();
    assert_eq!(config.pairing_rule, PairingRule::Parity);
    assert_eq!(config.max_search_depth, 5);
    assert!(config.cleanup_enabled);
}

#[test]
fn test_config_errors() {
    assert!(matches!(
        ReturnConfig::from_json_str(r#"{"pairing_rule": "strict"}"#),
        Err(ConfigError::Parse(_))
    ));
    assert!(matches!(
        ReturnConfig::from_file("/nonexistent/modoshi.json"),
        Err(ConfigError::Io { .. })
    ));
}

#[test]
fn test_instance_locks_are_released() {
    let locks = InstanceLocks::new();
    assert!(locks.is_empty());
    let value = locks.with_instance("pi-1", || {
        assert_eq!(locks.len(), 1);
        41 + 1
    });
    assert_eq!(value, 42);
    assert!(locks.is_empty());

    locks.with_instance("pi-1", || locks.with_instance("pi-2", || assert_eq!(locks.len(), 2)));
    assert!(locks.is_empty());
}

#[test]
fn test_instance_locks_serialize_same_instance() {
    let locks = Arc::new(InstanceLocks::new());
    let inside = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let locks = Arc::clone(&locks);
            let inside = Arc::clone(&inside);
            std::thread::spawn(move || {
                locks.with_instance("pi-1", || {
                    let before = inside.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    std::thread::sleep(std::time::Duration::from_millis(2));
                    inside.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
                    before
                })
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 0);
    }
    assert!(locks.is_empty());
}

#[test]
fn test_context_containers_never_duplicate() {
    let graph = Arc::new(parallel_graph());
    let runtime = runtime_with(parallel_graph());
    let at_b = runtime.spawn_task(INSTANCE, "B", Some(ACTOR));

    let mut ctx = ReturnContext::new(
        ACTOR,
        "rework",
        Arc::clone(&graph),
        at_b.clone(),
        graph.node("B").cloned().unwrap(),
        graph.node("ps").cloned().unwrap(),
        vec![at_b.clone()],
        Variables::default(),
    );
    ctx.add_task_to_return(&at_b);
    ctx.add_task_to_return(&at_b);
    ctx.add_affected_gateway("ps");
    ctx.add_affected_gateway("ps");
    ctx.add_branch_to_cleanup("f3");
    ctx.add_branch_to_cleanup("f3");

    assert_eq!(ctx.tasks_to_return().len(), 1);
    assert_eq!(ctx.executions_to_move(), &[at_b.execution_id.clone()]);
    assert_eq!(ctx.affected_gateways(), &["ps".to_string()]);
    assert_eq!(ctx.branches_to_cleanup(), &["f3".to_string()]);
}

#[test]
fn test_context_first_write_wins() {
    let graph = Arc::new(parallel_graph());
    let runtime = runtime_with(parallel_graph());
    let at_d = runtime.spawn_task(INSTANCE, "D", Some(ACTOR));

    let mut ctx = ReturnContext::new(
        ACTOR,
        "rework",
        Arc::clone(&graph),
        at_d.clone(),
        graph.node("D").cloned().unwrap(),
        graph.node("ps").cloned().unwrap(),
        vec![at_d],
        Variables::default(),
    );
    ctx.set_join_gateway("pj");
    ctx.set_join_gateway("other");
    ctx.set_multi_instance_reset(MultiInstanceReset::RecreateAll { expected: 3 });
    ctx.set_multi_instance_reset(MultiInstanceReset::FirstInstance);
    ctx.mark_parallel_gateway();

    assert_eq!(ctx.join_gateway(), Some("pj"));
    assert_eq!(ctx.affected_gateways(), &["pj".to_string(), "other".to_string()]);
    assert_eq!(ctx.multi_instance_reset().map(|r| r.expected_instances()), Some(3));
    assert!(ctx.involves_parallel_gateway());
    assert!(!ctx.involves_inclusive_gateway());
    assert!(ctx.summary().contains("target=ps (parallelGateway)"));
}

#[test]
fn test_snapshot_restores_runtime() {
    let runtime = runtime_with(linear_graph());
    let at_b = runtime.spawn_task(INSTANCE, "B", Some(ACTOR));
    runtime.set(INSTANCE, "amount", Value::Number(150.0)).unwrap();

    let json = runtime.snapshot().to_json_pretty().unwrap();
    let snapshot: RuntimeSnapshot = serde_json::from_str(&json).unwrap();
    let restored = InMemoryRuntime::from_snapshot(snapshot);
    restored.register_graph(linear_graph());

    let tasks = restored.active_tasks(INSTANCE);
    assert_eq!(tasks, vec![at_b.clone()]);
    assert_eq!(restored.variable(INSTANCE, "amount"), Some(Value::Number(150.0)));

    let fresh = restored.spawn_task(INSTANCE, "C", None);
    assert_ne!(fresh.id, at_b.id);
    assert_ne!(fresh.execution_id, at_b.execution_id);
    assert!(fresh.create_time > at_b.create_time);
}

#[test]
fn test_tracing_can_be_initialised_repeatedly() {
    init_tracing();
    init_tracing();
    tracing::debug!(target: "modoshi", "test subscriber installed");
    let runtime = runtime_with(linear_graph());
    assert!(runtime.active_tasks(INSTANCE).is_empty());
}
