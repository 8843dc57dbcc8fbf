//! Common test utilities for building process graphs and runtimes.
use modoshi::graph::{FlowDefinition, MultiInstanceDefinition, NodeDefinition, ServiceDefinition};
use modoshi::prelude::*;
use std::sync::Arc;

pub const INSTANCE: &str = "pi-1";
pub const ACTOR: &str = "alice";

#[allow(dead_code)]
pub fn node(id: &str, kind: &str) -> NodeDefinition {
    NodeDefinition {
        id: id.to_string(),
        kind: kind.to_string(),
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn flow(id: &str, source: &str, target: &str) -> FlowDefinition {
    FlowDefinition {
        id: id.to_string(),
        source: source.to_string(),
        target: target.to_string(),
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn conditional(id: &str, source: &str, target: &str, condition: &str) -> FlowDefinition {
    FlowDefinition {
        condition: Some(condition.to_string()),
        ..flow(id, source, target)
    }
}

#[allow(dead_code)]
pub fn build(id: &str, nodes: Vec<NodeDefinition>, flows: Vec<FlowDefinition>) -> ProcessGraph {
    let definition = ProcessDefinition {
        id: id.to_string(),
        name: None,
        nodes,
        flows,
    };
    ProcessGraph::builder(definition)
        .build()
        .expect("test graph should build")
}

/// `start -> A -> B -> C -> end`
#[allow(dead_code)]
pub fn linear_graph() -> ProcessGraph {
    build(
        "linear",
        vec![
            node("start", "startEvent"),
            node("A", "userTask"),
            node("B", "userTask"),
            node("C", "userTask"),
            node("end", "endEvent"),
        ],
        vec![
            flow("f1", "start", "A"),
            flow("f2", "A", "B"),
            flow("f3", "B", "C"),
            flow("f4", "C", "end"),
        ],
    )
}

/// `start -> A -> ps -> {B, C} -> pj -> D -> end` with parallel gateways.
#[allow(dead_code)]
pub fn parallel_graph() -> ProcessGraph {
    build(
        "parallel",
        vec![
            node("start", "startEvent"),
            node("A", "userTask"),
            node("ps", "parallelGateway"),
            node("B", "userTask"),
            node("C", "userTask"),
            node("pj", "parallelGateway"),
            node("D", "userTask"),
            node("end", "endEvent"),
        ],
        vec![
            flow("f1", "start", "A"),
            flow("f2", "A", "ps"),
            flow("f3", "ps", "B"),
            flow("f4", "ps", "C"),
            flow("f5", "B", "pj"),
            flow("f6", "C", "pj"),
            flow("f7", "pj", "D"),
            flow("f8", "D", "end"),
        ],
    )
}

/// `start -> A -> ps -> {B, C} -> pj -> D -> x -> {loop_to if again, end}`
#[allow(dead_code)]
pub fn rework_graph(loop_to: &str) -> ProcessGraph {
    build(
        "rework",
        vec![
            node("start", "startEvent"),
            node("A", "userTask"),
            node("ps", "parallelGateway"),
            node("B", "userTask"),
            node("C", "userTask"),
            node("pj", "parallelGateway"),
            node("D", "userTask"),
            node("x", "exclusiveGateway"),
            node("end", "endEvent"),
        ],
        vec![
            flow("f1", "start", "A"),
            flow("f2", "A", "ps"),
            flow("f3", "ps", "B"),
            flow("f4", "ps", "C"),
            flow("f5", "B", "pj"),
            flow("f6", "C", "pj"),
            flow("f7", "pj", "D"),
            flow("f8", "D", "x"),
            conditional("f9", "x", loop_to, "${again}"),
            flow("f10", "x", "end"),
        ],
    )
}

/// `start -> A -> xs -> {B if amount > 100, C by default} -> xj -> D -> end`
#[allow(dead_code)]
pub fn exclusive_graph() -> ProcessGraph {
    let mut xs = node("xs", "exclusiveGateway");
    xs.default_flow = Some("f4".to_string());
    build(
        "exclusive",
        vec![
            node("start", "startEvent"),
            node("A", "userTask"),
            xs,
            node("B", "userTask"),
            node("C", "userTask"),
            node("xj", "exclusiveGateway"),
            node("D", "userTask"),
            node("end", "endEvent"),
        ],
        vec![
            flow("f1", "start", "A"),
            flow("f2", "A", "xs"),
            conditional("f3", "xs", "B", "${amount > 100}"),
            flow("f4", "xs", "C"),
            flow("f5", "B", "xj"),
            flow("f6", "C", "xj"),
            flow("f7", "xj", "D"),
            flow("f8", "D", "end"),
        ],
    )
}

/// `start -> A -> is -> {B if x, C if y, E} -> ij -> D -> end` with inclusive
/// gateways. `E`'s flow is the default flow when `with_default` is set.
#[allow(dead_code)]
pub fn inclusive_graph(with_default: bool) -> ProcessGraph {
    let mut gateway = node("is", "inclusiveGateway");
    if with_default {
        gateway.default_flow = Some("f5".to_string());
    }
    build(
        "inclusive",
        vec![
            node("start", "startEvent"),
            node("A", "userTask"),
            gateway,
            node("B", "userTask"),
            node("C", "userTask"),
            node("E", "userTask"),
            node("ij", "inclusiveGateway"),
            node("D", "userTask"),
            node("end", "endEvent"),
        ],
        vec![
            flow("f1", "start", "A"),
            flow("f2", "A", "is"),
            conditional("f3", "is", "B", "${x}"),
            conditional("f4", "is", "C", "${y}"),
            flow("f5", "is", "E"),
            flow("f6", "B", "ij"),
            flow("f7", "C", "ij"),
            flow("f8", "E", "ij"),
            flow("f9", "ij", "D"),
            flow("f10", "D", "end"),
        ],
    )
}

/// `start -> A -> M -> B -> end` where `M` is a parallel multi-instance user task.
#[allow(dead_code)]
pub fn multi_instance_graph(cardinality: Option<u32>, collection: Option<&str>) -> ProcessGraph {
    let mut m = node("M", "userTask");
    m.multi_instance = Some(MultiInstanceDefinition {
        sequential: false,
        cardinality,
        collection: collection.map(str::to_string),
    });
    build(
        "multi",
        vec![
            node("start", "startEvent"),
            node("A", "userTask"),
            m,
            node("B", "userTask"),
            node("end", "endEvent"),
        ],
        vec![
            flow("f1", "start", "A"),
            flow("f2", "A", "M"),
            flow("f3", "M", "B"),
            flow("f4", "B", "end"),
        ],
    )
}

/// `start -> A -> S -> B -> end` where `S` is a service task.
#[allow(dead_code)]
pub fn service_graph(service: ServiceDefinition) -> ProcessGraph {
    let mut s = node("S", "serviceTask");
    s.service = Some(service);
    build(
        "service",
        vec![
            node("start", "startEvent"),
            node("A", "userTask"),
            s,
            node("B", "userTask"),
            node("end", "endEvent"),
        ],
        vec![
            flow("f1", "start", "A"),
            flow("f2", "A", "S"),
            flow("f3", "S", "B"),
            flow("f4", "B", "end"),
        ],
    )
}

/// Routes engine logs through the test harness; `RUST_LOG=modoshi=debug` shows them.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A runtime holding `graph` with one started instance, `INSTANCE`.
#[allow(dead_code)]
pub fn runtime_with(graph: ProcessGraph) -> Arc<InMemoryRuntime> {
    init_tracing();
    let definition_id = graph.id.clone();
    let runtime = Arc::new(InMemoryRuntime::new().with_graph(graph));
    runtime.start_instance(INSTANCE, &definition_id);
    runtime
}

#[allow(dead_code)]
pub fn processor_for(runtime: &Arc<InMemoryRuntime>) -> ReturnProcessor {
    ReturnProcessor::builder(RuntimeServices::from_runtime(runtime.clone())).build()
}

#[allow(dead_code)]
pub fn active_keys(runtime: &InMemoryRuntime) -> Vec<String> {
    let mut keys: Vec<String> = runtime
        .active_tasks(INSTANCE)
        .into_iter()
        .map(|t| t.definition_key)
        .collect();
    keys.sort();
    keys
}
