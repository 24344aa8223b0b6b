//! CLI command implementations
//!
//! Each submodule implements a specific CLI command.

use std::path::Path;

use graph_core::{ComputationGraph, GraphBuilder};

use crate::{CliError, Result};

pub mod analyse;
pub mod demo;
pub mod fetch;
pub mod replay;

/// Read and sanitise a graph snapshot stored as JSON.
pub fn read_graph_file(path: &Path) -> Result<ComputationGraph> {
    let content = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let raw: ComputationGraph =
        serde_json::from_str(&content).map_err(|e| CliError::InvalidInput {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
    Ok(GraphBuilder::sanitise(raw).0)
}

/// Abbreviate a path of node ids for display.
pub fn format_path(path: &[String], limit: usize) -> String {
    if path.len() <= limit {
        return path.join(" -> ");
    }
    let head = &path[..limit / 2];
    let tail = &path[path.len() - (limit - limit / 2)..];
    format!(
        "{} -> ... ({} more) ... -> {}",
        head.join(" -> "),
        path.len() - limit,
        tail.join(" -> ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("n{}", i)).collect()
    }

    #[test]
    fn test_format_path_short_and_long() {
        assert_eq!(format_path(&ids(3), 6), "n0 -> n1 -> n2");
        assert_eq!(
            format_path(&ids(10), 4),
            "n0 -> n1 -> ... (6 more) ... -> n8 -> n9"
        );
    }

    #[test]
    fn test_read_graph_file_sanitises() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"nodes":[
                {{"id":"a","type":"input","label":"a","value":1.0,
                  "is_sensitivity_target":true,"group":"sensitivity"}},
                {{"id":"b","type":"output","label":"b","value":null,
                  "is_sensitivity_target":false,"group":"output"}}
            ],
            "links":[{{"source":"a","target":"b"}},{{"source":"a","target":"zz"}}],
            "metadata":{{"trade_id":"T1","node_count":2,"edge_count":2,"depth":2,
                         "generated_at":"2026-01-01T00:00:00Z"}}}}"#
        )
        .unwrap();

        let graph = read_graph_file(file.path()).unwrap();

        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.metadata.edge_count, 1);
        assert_eq!(graph.metadata.subject_id.as_deref(), Some("T1"));
    }

    #[test]
    fn test_read_graph_file_errors() {
        assert!(matches!(
            read_graph_file(Path::new("/definitely/not/here.json")),
            Err(CliError::Io { .. })
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"nodes\": 3}}").unwrap();
        assert!(matches!(
            read_graph_file(file.path()),
            Err(CliError::InvalidInput { .. })
        ));
    }
}
