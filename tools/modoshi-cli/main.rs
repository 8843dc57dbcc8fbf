use clap::{Parser, Subcommand};
use modoshi::jump::JumpOutcome;
use modoshi::prelude::*;
use std::fs;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Return and jump engine for branched process instances
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Optional path to a return configuration JSON file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a return and print its scope without changing anything
    Check {
        /// Process definition JSON or compiled graph artifact (.bin)
        #[arg(short, long)]
        graph: String,
        /// Runtime snapshot JSON
        #[arg(short, long)]
        snapshot: String,
        #[arg(short, long)]
        task: String,
        #[arg(long)]
        target: String,
        #[arg(short, long, default_value = "cli")]
        actor: String,
    },
    /// Execute a return and print the resulting snapshot
    Return {
        #[arg(short, long)]
        graph: String,
        #[arg(short, long)]
        snapshot: String,
        #[arg(short, long)]
        task: String,
        #[arg(long)]
        target: String,
        #[arg(short, long, default_value = "cli")]
        actor: String,
        #[arg(short, long, default_value = "returned from command line")]
        reason: String,
        /// Write the resulting snapshot here instead of stdout
        #[arg(short, long)]
        out: Option<String>,
    },
    /// Jump the tasks at the source nodes to the target nodes
    Jump {
        #[arg(short, long)]
        graph: String,
        #[arg(short, long)]
        snapshot: String,
        #[arg(short, long)]
        instance: String,
        /// Comma-separated source node ids
        #[arg(long, value_delimiter = ',', required = true)]
        from: Vec<String>,
        /// Comma-separated target node ids
        #[arg(long, value_delimiter = ',', required = true)]
        to: Vec<String>,
        #[arg(short, long, default_value = "jumped from command line")]
        reason: String,
        #[arg(short, long)]
        out: Option<String>,
    },
    /// Build a process definition and save it as a binary graph artifact
    Compile {
        /// Process definition JSON
        definition: String,
        /// Output artifact path
        out: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ReturnConfig::from_file(path)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to load config: {}", e))),
        None => ReturnConfig::default(),
    };

    match cli.command {
        Command::Check {
            graph,
            snapshot,
            task,
            target,
            actor,
        } => {
            let runtime = load_runtime(&graph, &snapshot);
            let processor = processor(&runtime, config);
            match processor.check_return(&actor, &task, &target) {
                Ok(ctx) => {
                    println!("Return to '{}' is allowed.", target);
                    println!("  Path:      {}", ctx.return_path.join(" -> "));
                    println!(
                        "  Tasks:     {}",
                        ctx.tasks_to_return()
                            .iter()
                            .map(|t| format!("{} ({})", t.id, t.definition_key))
                            .collect::<Vec<_>>()
                            .join(", ")
                    );
                    println!("  Executions: {}", ctx.executions_to_move().join(", "));
                    if !ctx.selected_branches().is_empty() {
                        println!("  Branches:  {}", ctx.selected_branches().join(", "));
                    }
                }
                Err(e) => exit_with_error(&format!("Return rejected: {}", e)),
            }
        }
        Command::Return {
            graph,
            snapshot,
            task,
            target,
            actor,
            reason,
            out,
        } => {
            let runtime = load_runtime(&graph, &snapshot);
            let processor = processor(&runtime, config);
            let start = Instant::now();
            let report = processor
                .compute_and_execute_return(&actor, &task, &target, &reason)
                .unwrap_or_else(|e| exit_with_error(&format!("Return failed: {}", e)));
            eprintln!(
                "Return {} -> {} finished in {:?}: {} returned, {} cancelled",
                report.source_key,
                report.target_key,
                start.elapsed(),
                report.returned_tasks.len(),
                report.cancelled_tasks.len()
            );
            write_snapshot(&runtime, out.as_deref());
        }
        Command::Jump {
            graph,
            snapshot,
            instance,
            from,
            to,
            reason,
            out,
        } => {
            let runtime = load_runtime(&graph, &snapshot);
            let service = JumpService::new(RuntimeServices::from_runtime(runtime.clone()));
            let outcome = match (from.as_slice(), to.as_slice()) {
                ([source], targets) if targets.len() > 1 => {
                    service.move_single_to_many(&instance, source, targets, &reason)
                }
                (sources, [target]) => service.move_many_to_single(&instance, sources, target, &reason),
                _ => exit_with_error("A jump needs either one source or one target"),
            }
            .unwrap_or_else(|e| exit_with_error(&format!("Jump failed: {}", e)));
            match outcome {
                JumpOutcome::Moved { tasks } => eprintln!("Jumped {} task(s).", tasks.len()),
                JumpOutcome::Skipped { reason } => eprintln!("Nothing to jump: {}", reason),
            }
            write_snapshot(&runtime, out.as_deref());
        }
        Command::Compile { definition, out } => {
            let start = Instant::now();
            let graph = build_graph(&definition);
            graph
                .save(&out)
                .unwrap_or_else(|e| exit_with_error(&format!("Failed to save artifact: {}", e)));
            println!(
                "Compiled '{}' ({} nodes, {} flows) to '{}' in {:?}",
                graph.id,
                graph.node_count(),
                graph.flow_count(),
                out,
                start.elapsed()
            );
        }
    }
}

fn processor(runtime: &Arc<InMemoryRuntime>, config: ReturnConfig) -> ReturnProcessor {
    ReturnProcessor::builder(RuntimeServices::from_runtime(runtime.clone()))
        .with_config(config)
        .build()
}

fn build_graph(path: &str) -> ProcessGraph {
    let json = fs::read_to_string(path)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to read definition '{}': {}", path, e)));
    let definition = ProcessDefinition::from_json_str(&json)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to parse definition: {}", e)));
    ProcessGraph::builder(definition)
        .build()
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to build graph: {}", e)))
}

fn load_graph(path: &str) -> ProcessGraph {
    if path.ends_with(".bin") {
        ProcessGraph::from_file(path)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to load artifact '{}': {}", path, e)))
    } else {
        build_graph(path)
    }
}

fn load_runtime(graph_path: &str, snapshot_path: &str) -> Arc<InMemoryRuntime> {
    let graph = load_graph(graph_path);
    let snapshot = RuntimeSnapshot::from_file(snapshot_path)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to load snapshot '{}': {}", snapshot_path, e)));
    let runtime = InMemoryRuntime::from_snapshot(snapshot);
    runtime.register_graph(graph);
    Arc::new(runtime)
}

fn write_snapshot(runtime: &InMemoryRuntime, out: Option<&str>) {
    let json = runtime
        .snapshot()
        .to_json_pretty()
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to serialize snapshot: {}", e)));
    match out {
        Some(path) => fs::write(path, json)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to write '{}': {}", path, e))),
        None => println!("{}", json),
    }
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
