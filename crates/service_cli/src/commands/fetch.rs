//! Fetch command: retrieve one snapshot from the graph API.

use std::sync::Arc;

use graph_engine::{EngineConfig, GraphManager, HttpGraphSource};
use tracing::info;

use crate::Result;

/// Fetch the graph for `subject_id` (or the aggregate) and print a summary,
/// or the snapshot itself as JSON.
pub async fn run(config: &EngineConfig, subject_id: Option<&str>, json: bool) -> Result<()> {
    let source = HttpGraphSource::from_config(&config.api)?;
    info!(endpoint = %source.endpoint(), "Fetching graph");
    let mut manager = GraphManager::new(Arc::new(source));
    let graph = manager.fetch(subject_id).await?;

    if json {
        let text = serde_json::to_string_pretty(graph).map_err(|e| crate::CliError::InvalidInput {
            path: "<snapshot>".to_string(),
            message: e.to_string(),
        })?;
        println!("{}", text);
        return Ok(());
    }

    println!("Subject:      {}", subject_id.unwrap_or("all"));
    println!("Nodes:        {}", graph.metadata.node_count);
    println!("Edges:        {}", graph.metadata.edge_count);
    println!("Depth:        {}", graph.metadata.depth);
    println!("Generated at: {}", graph.metadata.generated_at);
    println!("Targets:      {}", graph.sensitivity_targets().count());
    println!("Outputs:      {}", graph.outputs().count());
    Ok(())
}
