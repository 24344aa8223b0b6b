//! # Path Analysis
//!
//! DAG algorithms over the full (uncompressed) computation graph:
//!
//! - **Critical path**: longest dependency chain, via Kahn's topological sort
//!   and longest-distance dynamic programming. Cyclic input is rejected with
//!   [`CycleError`].
//! - **Sensitivity paths**: minimum-hop path from every sensitivity target to
//!   every output it reaches, via breadth-first search.
//!
//! Edges with a missing endpoint are ignored. Mapping results into cluster
//! space is left to the caller.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use crate::error::CycleError;
use crate::types::ComputationGraph;

/// Index-based view of a graph's forward adjacency.
///
/// Neighbour lists keep the snapshot's edge order, which is what BFS
/// tie-breaking relies on.
struct Adjacency<'a> {
    ids: Vec<&'a str>,
    forward: Vec<Vec<usize>>,
    in_degree: Vec<usize>,
}

impl<'a> Adjacency<'a> {
    fn new(graph: &'a ComputationGraph) -> Self {
        let index = graph.node_index();
        let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        let mut forward = vec![Vec::new(); ids.len()];
        let mut in_degree = vec![0; ids.len()];

        for edge in &graph.edges {
            let (Some(&s), Some(&t)) = (
                index.get(edge.source.as_str()),
                index.get(edge.target.as_str()),
            ) else {
                continue;
            };
            forward[s].push(t);
            in_degree[t] += 1;
        }

        Self {
            ids,
            forward,
            in_degree,
        }
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    /// Kahn's algorithm. Sources are seeded in snapshot order.
    fn topological_order(&self) -> Result<Vec<usize>, CycleError> {
        let mut in_degree = self.in_degree.clone();
        let mut queue: VecDeque<usize> = (0..self.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(self.len());

        while let Some(current) = queue.pop_front() {
            order.push(current);
            for &next in &self.forward[current] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        if order.len() < self.len() {
            return Err(CycleError {
                ordered: order.len(),
                total: self.len(),
            });
        }
        Ok(order)
    }

    /// Longest distance (in edges) to every node, with the maximising
    /// predecessor.
    fn longest_distances(&self, order: &[usize]) -> (Vec<usize>, Vec<Option<usize>>) {
        let mut distance = vec![0usize; self.len()];
        let mut predecessor: Vec<Option<usize>> = vec![None; self.len()];

        for &current in order {
            for &next in &self.forward[current] {
                if distance[current] + 1 > distance[next] {
                    distance[next] = distance[current] + 1;
                    predecessor[next] = Some(current);
                }
            }
        }

        (distance, predecessor)
    }

    /// BFS parents from `start`; `parent[start] == Some(start)`.
    fn bfs_parents(&self, start: usize) -> Vec<Option<usize>> {
        let mut parent: Vec<Option<usize>> = vec![None; self.len()];
        let mut queue = VecDeque::new();
        parent[start] = Some(start);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            for &next in &self.forward[current] {
                if parent[next].is_none() {
                    parent[next] = Some(current);
                    queue.push_back(next);
                }
            }
        }

        parent
    }

    fn unwind(&self, parent: &[Option<usize>], start: usize, end: usize) -> Vec<String> {
        let mut path = vec![self.ids[end].to_string()];
        let mut current = end;
        while current != start {
            match parent[current] {
                Some(p) => {
                    path.push(self.ids[p].to_string());
                    current = p;
                }
                None => break,
            }
        }
        path.reverse();
        path
    }
}

/// Topological order of the node ids.
///
/// # Errors
///
/// [`CycleError`] when the graph is not a DAG.
pub fn topological_order(graph: &ComputationGraph) -> Result<Vec<String>, CycleError> {
    let adjacency = Adjacency::new(graph);
    let order = adjacency.topological_order()?;
    Ok(order
        .into_iter()
        .map(|idx| adjacency.ids[idx].to_string())
        .collect())
}

/// Longest distance (in edges) from any source to each node.
///
/// # Errors
///
/// [`CycleError`] when the graph is not a DAG.
pub fn longest_distances(graph: &ComputationGraph) -> Result<HashMap<String, usize>, CycleError> {
    let adjacency = Adjacency::new(graph);
    let order = adjacency.topological_order()?;
    let (distance, _) = adjacency.longest_distances(&order);
    Ok(adjacency
        .ids
        .iter()
        .zip(distance)
        .map(|(id, d)| (id.to_string(), d))
        .collect())
}

/// Critical path (longest dependency chain) through the graph.
///
/// The path ends at the first node, in topological order, whose distance is
/// the global maximum, and is rebuilt by following maximising predecessors
/// back to a node at distance 0. An empty graph yields an empty path.
///
/// # Errors
///
/// [`CycleError`] when the graph is not a DAG. A cyclic graph has no
/// meaningful critical path; callers should display an empty one and surface
/// the error rather than treat it as "no path".
///
/// # Example
///
/// ```rust
/// use graph_core::{
///     critical_path, ComputationGraph, GraphBuilder, GraphEdge, GraphNode, NodeGroup, NodeType,
/// };
///
/// let mut builder = GraphBuilder::new();
/// builder.add_node(GraphNode::new("A", NodeType::Input, "spot", NodeGroup::Input));
/// builder.add_node(GraphNode::new("B", NodeType::Mul, "a * b", NodeGroup::Intermediate));
/// builder.add_node(GraphNode::new("C", NodeType::Output, "price", NodeGroup::Output));
/// builder.add_edge(GraphEdge::new("A", "B"));
/// builder.add_edge(GraphEdge::new("B", "C"));
/// let graph = builder.build(None);
///
/// assert_eq!(critical_path(&graph).unwrap(), vec!["A", "B", "C"]);
/// ```
pub fn critical_path(graph: &ComputationGraph) -> Result<Vec<String>, CycleError> {
    let adjacency = Adjacency::new(graph);
    if adjacency.len() == 0 {
        return Ok(Vec::new());
    }

    let order = adjacency.topological_order()?;
    let (distance, predecessor) = adjacency.longest_distances(&order);

    let mut end = order[0];
    for &idx in &order {
        if distance[idx] > distance[end] {
            end = idx;
        }
    }

    let mut path = Vec::with_capacity(distance[end] + 1);
    let mut current = Some(end);
    while let Some(idx) = current {
        path.push(adjacency.ids[idx].to_string());
        current = predecessor[idx];
    }
    path.reverse();
    Ok(path)
}

/// A minimum-hop path from a sensitivity target to an output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensitivityPath {
    /// Sensitivity target node ID (path start)
    pub target: String,
    /// Output node ID (path end)
    pub output: String,
    /// Node IDs from target to output inclusive
    pub path: Vec<String>,
}

impl SensitivityPath {
    /// Number of edges on the path.
    pub fn hops(&self) -> usize {
        self.path.len().saturating_sub(1)
    }
}

/// Sensitivity paths for every (target, output) pair with a directed
/// connection.
///
/// Targets are nodes flagged `is_sensitivity_target`; outputs are nodes in
/// the output group. Pairs without a connection are omitted, as is the
/// degenerate pair of a node with itself. Among equally short paths, the one
/// discovered first in edge order wins.
pub fn sensitivity_paths(graph: &ComputationGraph) -> Vec<SensitivityPath> {
    let adjacency = Adjacency::new(graph);
    let index = graph.node_index();
    let outputs: Vec<usize> = graph
        .outputs()
        .filter_map(|n| index.get(n.id.as_str()).copied())
        .collect();

    let mut result = Vec::new();
    for target in graph.sensitivity_targets() {
        let Some(&start) = index.get(target.id.as_str()) else {
            continue;
        };
        let parent = adjacency.bfs_parents(start);

        for &output in &outputs {
            if output == start || parent[output].is_none() {
                continue;
            }
            result.push(SensitivityPath {
                target: adjacency.ids[start].to_string(),
                output: adjacency.ids[output].to_string(),
                path: adjacency.unwind(&parent, start, output),
            });
        }
    }
    result
}

/// Minimum-hop path between two nodes.
pub fn find_path(graph: &ComputationGraph, from: &str, to: &str) -> Option<Vec<String>> {
    let adjacency = Adjacency::new(graph);
    let index = graph.node_index();
    let (&start, &end) = (index.get(from)?, index.get(to)?);
    let parent = adjacency.bfs_parents(start);
    parent[end]?;
    Some(adjacency.unwind(&parent, start, end))
}
