//! # Graph Builder
//!
//! Pre-allocated builder used both to construct graphs and to sanitise
//! snapshots received from the wire: duplicate node ids keep their first
//! occurrence, edges with a missing endpoint are dropped, and metadata is
//! recomputed from what survives.

use std::collections::{HashMap, VecDeque};

use tracing::warn;

use crate::types::{ComputationGraph, GraphEdge, GraphMetadata, GraphNode};

/// Pre-allocated buffer builder for graph construction.
#[derive(Debug)]
pub struct GraphBuilder {
    /// Pre-allocated node buffer
    nodes: Vec<GraphNode>,
    /// Pre-allocated edge buffer
    edges: Vec<GraphEdge>,
    /// Node ID to index mapping for fast lookup
    node_index: HashMap<String, usize>,
}

/// What [`GraphBuilder::sanitise`] removed from a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SanitiseReport {
    /// Nodes dropped because their id was already present
    pub duplicate_nodes: usize,
    /// Edges dropped because an endpoint does not exist
    pub dangling_edges: usize,
}

impl SanitiseReport {
    /// Whether anything was removed.
    pub fn is_clean(&self) -> bool {
        self.duplicate_nodes == 0 && self.dangling_edges == 0
    }
}

impl GraphBuilder {
    /// Create a new GraphBuilder with default capacity.
    ///
    /// Default capacity is 1,000 nodes and 2,000 edges.
    pub fn new() -> Self {
        Self::with_capacity(1_000, 2_000)
    }

    /// Create a new GraphBuilder with specified capacity.
    pub fn with_capacity(node_capacity: usize, edge_capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(node_capacity),
            edges: Vec::with_capacity(edge_capacity),
            node_index: HashMap::with_capacity(node_capacity),
        }
    }

    /// Add a node to the graph.
    ///
    /// Returns `false` (and keeps the existing node) when the id is taken.
    pub fn add_node(&mut self, node: GraphNode) -> bool {
        if self.node_index.contains_key(&node.id) {
            return false;
        }
        self.node_index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        true
    }

    /// Add an edge to the graph.
    ///
    /// Returns `false` (and drops the edge) when either endpoint is unknown.
    pub fn add_edge(&mut self, edge: GraphEdge) -> bool {
        if !self.has_node(&edge.source) || !self.has_node(&edge.target) {
            return false;
        }
        self.edges.push(edge);
        true
    }

    /// Check if a node exists by ID.
    pub fn has_node(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    /// Get a node by ID.
    pub fn get_node(&self, id: &str) -> Option<&GraphNode> {
        self.node_index.get(id).map(|&idx| &self.nodes[idx])
    }

    /// Get a mutable reference to a node by ID.
    pub fn get_node_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        self.node_index
            .get(id)
            .copied()
            .map(|idx| &mut self.nodes[idx])
    }

    /// Get the number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get the number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Clear the builder for reuse, retaining capacity.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.node_index.clear();
    }

    /// Longest path through the graph counted in nodes, or `None` if the
    /// graph has a cycle.
    pub fn calculate_depth(&self) -> Option<usize> {
        if self.nodes.is_empty() {
            return Some(0);
        }

        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        let mut in_degree: Vec<usize> = vec![0; self.nodes.len()];

        for edge in &self.edges {
            let (Some(&s), Some(&t)) = (
                self.node_index.get(&edge.source),
                self.node_index.get(&edge.target),
            ) else {
                continue;
            };
            adjacency[s].push(t);
            in_degree[t] += 1;
        }

        let mut queue: VecDeque<usize> = (0..self.nodes.len())
            .filter(|&idx| in_degree[idx] == 0)
            .collect();
        let mut distance: Vec<usize> = vec![0; self.nodes.len()];
        let mut processed = 0;
        let mut max_depth = 0;

        while let Some(current) = queue.pop_front() {
            processed += 1;
            max_depth = max_depth.max(distance[current]);

            for &neighbour in &adjacency[current] {
                distance[neighbour] = distance[neighbour].max(distance[current] + 1);
                in_degree[neighbour] -= 1;
                if in_degree[neighbour] == 0 {
                    queue.push_back(neighbour);
                }
            }
        }

        (processed == self.nodes.len()).then_some(max_depth + 1)
    }

    /// Validate that the graph is a DAG (no cycles).
    pub fn is_dag(&self) -> bool {
        self.calculate_depth().is_some()
    }

    /// Build the final ComputationGraph with freshly computed metadata.
    ///
    /// A cyclic graph gets depth 0.
    pub fn build(self, subject_id: Option<String>) -> ComputationGraph {
        let depth = self.calculate_depth().unwrap_or(0);
        self.build_with_depth(subject_id, depth)
    }

    /// Build the final ComputationGraph with a pre-calculated depth.
    pub fn build_with_depth(self, subject_id: Option<String>, depth: usize) -> ComputationGraph {
        let metadata = GraphMetadata {
            subject_id,
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
            depth,
            generated_at: chrono::Utc::now().to_rfc3339(),
        };

        ComputationGraph {
            nodes: self.nodes,
            edges: self.edges,
            metadata,
        }
    }

    /// Rebuild a snapshot received from a remote source.
    ///
    /// Keeps `generated_at` from the source. Depth is recomputed for DAGs and
    /// left as reported for cyclic input, which the path analysis rejects
    /// on its own.
    pub fn sanitise(graph: ComputationGraph) -> (ComputationGraph, SanitiseReport) {
        let ComputationGraph {
            nodes,
            edges,
            metadata,
        } = graph;
        let mut builder = Self::with_capacity(nodes.len(), edges.len());
        let mut report = SanitiseReport::default();

        for node in nodes {
            if !builder.add_node(node) {
                report.duplicate_nodes += 1;
            }
        }
        for edge in edges {
            if !builder.add_edge(edge) {
                report.dangling_edges += 1;
            }
        }

        if !report.is_clean() {
            warn!(
                duplicate_nodes = report.duplicate_nodes,
                dangling_edges = report.dangling_edges,
                "Dropped inconsistent elements from graph snapshot"
            );
        }

        let depth = builder.calculate_depth().unwrap_or(metadata.depth);
        let mut cleaned = builder.build_with_depth(metadata.subject_id, depth);
        cleaned.metadata.generated_at = metadata.generated_at;
        (cleaned, report)
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}
