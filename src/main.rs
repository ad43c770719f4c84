use std::fs::File;
use std::io::BufWriter;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quasar::algorithms::{AlgorithmConfig, AlgorithmRegistry, AlgorithmResult, ExecutionContext};
use quasar::concurrency::RUNNING_TRUE;
use quasar::config::EngineConfig;
use quasar::loading::Orientation;
use quasar::types::{CompressedGraph, GraphFileConfig};
use quasar::{Error, Result};

#[derive(Parser, Debug, Serialize)]
#[command(author, version, about)]
struct Args {
    /// Name of the graph, read from `data/<dataset>.graph`.
    #[arg(short, long, default_value_t = String::from("example"))]
    dataset: String,

    /// Explicit graph file path, overriding `dataset`.
    #[arg(short, long)]
    graph_file: Option<String>,

    /// The algorithm to run (louvain or wcc).
    #[arg(short, long, default_value_t = String::from("louvain"))]
    task: String,

    /// Worker thread count; overrides the engine configuration.
    #[arg(short, long)]
    num_threads: Option<usize>,

    /// YAML file with engine settings.
    #[arg(short, long)]
    config: Option<String>,

    /// YAML file with the algorithm configuration, tagged by `algorithm`.
    #[arg(short, long)]
    algorithm_config: Option<String>,

    /// Relationship orientation: natural, reverse or undirected.
    #[arg(short, long, default_value_t = String::from("undirected"))]
    orientation: String,

    /// Draw progress bars.
    #[arg(short, long, default_value_t = false)]
    progress: bool,

    /// Write the original id and label of every node here (bincode).
    #[arg(short = 'w', long)]
    output: Option<String>,
}

fn parse_orientation(orientation: &str) -> Result<Orientation> {
    match orientation.to_ascii_lowercase().as_str() {
        "natural" => Ok(Orientation::Natural),
        "reverse" => Ok(Orientation::Reverse),
        "undirected" => Ok(Orientation::Undirected),
        other => Err(Error::invalid_config(
            "orientation",
            format!("expected natural, reverse or undirected, got '{other}'"),
        )),
    }
}

fn report(task: &str, result: &AlgorithmResult) {
    match result {
        AlgorithmResult::Louvain(louvain) => println!(
            "{} Communities: {}, Modularity: {:.6}, Levels: {}, Converged: {}",
            task,
            louvain.community_count(),
            louvain.modularity,
            louvain.ran_levels,
            louvain.did_converge
        ),
        AlgorithmResult::Wcc(wcc) => println!("{} Components: {}", task, wcc.component_count),
    }
}

fn run(args: Args) -> Result<()> {
    // Step 1. Settings.
    let mut engine_config = match &args.config {
        Some(path) => EngineConfig::from_yaml_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(thread_num) = args.num_threads {
        engine_config.concurrency = thread_num;
    }
    engine_config.show_progress |= args.progress;
    let engine_config = engine_config.validate()?;
    let algorithm_config = match &args.algorithm_config {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            Some(serde_yaml::from_str::<AlgorithmConfig>(&content)?)
        }
        None => None,
    };

    // Step 2. Load the graph.
    let graph_file = args
        .graph_file
        .clone()
        .unwrap_or_else(|| format!("data/{}.graph", args.dataset));
    let file_config = GraphFileConfig {
        orientation: parse_orientation(&args.orientation)?,
        concurrency: engine_config.concurrency,
        buffer_size: engine_config.local_buffer_size,
        show_progress: engine_config.show_progress,
        ..GraphFileConfig::default()
    };
    let start = Instant::now();
    let graph = Arc::new(CompressedGraph::from_graph_file(&graph_file, &file_config, &RUNNING_TRUE)?);
    println!("Graph Loading Elapsed Time: {:?} us", start.elapsed().as_micros());

    // Step 3. Perform the task, and report the time.
    let registry = AlgorithmRegistry::with_defaults();
    let context = ExecutionContext::from_engine_config(&engine_config);
    let start = Instant::now();
    let result = registry.run(&args.task, graph.clone(), algorithm_config.as_ref(), &context)?;
    let duration = start.elapsed();
    report(&args.task.to_uppercase(), &result);
    println!("{} Elapsed Time: {:?} us", args.task.to_uppercase(), duration.as_micros());

    // Step 4. Optionally dump the labels.
    if let Some(output) = &args.output {
        let labels = result
            .node_labels()
            .iter()
            .enumerate()
            .map(|(node, &label)| (graph.original_node_id(node as u64), label))
            .collect::<Vec<_>>();
        let writer = BufWriter::new(File::create(output)?);
        bincode::serialize_into(writer, &labels)?;
        info!(output = output.as_str(), nodes = labels.len(), "labels written");
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "quasar failed");
            ExitCode::FAILURE
        }
    }
}
