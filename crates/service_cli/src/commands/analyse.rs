//! Analyse command: critical path, sensitivity paths and search over a
//! snapshot from the API or a JSON file.

use std::path::Path;
use std::sync::Arc;

use graph_core::{critical_path, search_nodes, sensitivity_paths, ComputationGraph};
use graph_engine::{EngineConfig, GraphManager, HttpGraphSource};
use tracing::warn;

use super::{format_path, read_graph_file};
use crate::Result;

const PATH_DISPLAY_LIMIT: usize = 12;

/// What to analyse.
#[derive(Debug, Clone)]
pub struct AnalyseArgs<'a> {
    /// Subject to fetch when no file is given
    pub subject_id: Option<&'a str>,
    /// Snapshot file instead of the API
    pub file: Option<&'a Path>,
    /// Sensitivity paths to print
    pub limit: usize,
    /// Optional fuzzy search
    pub search: Option<&'a str>,
}

async fn obtain(config: &EngineConfig, args: &AnalyseArgs<'_>) -> Result<ComputationGraph> {
    if let Some(path) = args.file {
        return read_graph_file(path);
    }
    let source = HttpGraphSource::from_config(&config.api)?;
    let mut manager = GraphManager::new(Arc::new(source));
    Ok(manager.fetch(args.subject_id).await?.clone())
}

/// Run the analysis and print the results.
pub async fn run(config: &EngineConfig, args: AnalyseArgs<'_>) -> Result<()> {
    let graph = obtain(config, &args).await?;
    println!(
        "Graph: {} nodes, {} edges, depth {}",
        graph.nodes.len(),
        graph.edges.len(),
        graph.metadata.depth
    );
    println!();

    match critical_path(&graph) {
        Ok(path) => {
            println!("Critical path ({} nodes):", path.len());
            println!("  {}", format_path(&path, PATH_DISPLAY_LIMIT));
        }
        Err(err) => {
            warn!(error = %err, "Graph is not a DAG");
            println!("Critical path: unavailable ({})", err);
        }
    }
    println!();

    let paths = sensitivity_paths(&graph);
    println!("Sensitivity paths ({} found):", paths.len());
    for entry in paths.iter().take(args.limit) {
        println!(
            "  {:<24} -> {:<24} {} hops",
            entry.target,
            entry.output,
            entry.hops()
        );
    }
    if paths.len() > args.limit {
        println!("  ... {} more", paths.len() - args.limit);
    }

    if let Some(query) = args.search {
        println!();
        println!("Search \"{}\":", query);
        for hit in search_nodes(&graph, query, args.limit) {
            println!("  {:<24} {:<24} score {}", hit.id, hit.label, hit.score);
        }
    }
    Ok(())
}
