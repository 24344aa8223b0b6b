//! # Scene Graph
//!
//! Backend-neutral description of what is on screen: the nodes and edges of
//! the visible graph, with level-of-detail clusters already substituted for
//! their members. Renderers consume scenes and never see snapshots directly.

use std::collections::{HashMap, HashSet};

use graph_core::{ComputationGraph, GraphNode, NodeGroup, NodeType, Position};
use serde::Serialize;

/// Radius of a cluster glyph is capped at this value.
const MAX_CLUSTER_RADIUS: f64 = 40.0;

/// What a scene node stands for.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SceneNodeKind {
    /// A single graph node.
    Node {
        /// Operation type of the node
        node_type: NodeType,
        /// Current value
        value: Option<f64>,
        /// Whether the node is a sensitivity target
        is_sensitivity_target: bool,
    },
    /// A collapsed level-of-detail cluster.
    Cluster {
        /// Number of graph nodes folded into the cluster
        member_count: usize,
    },
}

/// A drawable node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneNode {
    /// Node or cluster ID
    pub id: String,
    /// Display label
    pub label: String,
    /// Colour group
    pub group: NodeGroup,
    /// World position
    pub position: Position,
    /// Glyph radius in world units
    pub radius: f64,
    /// Node or cluster payload
    #[serde(flatten)]
    pub kind: SceneNodeKind,
    /// Part of the highlighted path
    pub highlighted: bool,
}

impl SceneNode {
    /// Scene node for a single graph node.
    pub fn from_node(node: &GraphNode) -> Self {
        let radius = match node.group {
            NodeGroup::Output => 10.0,
            NodeGroup::Sensitivity => 8.0,
            NodeGroup::Input | NodeGroup::Intermediate => 6.0,
        };
        Self {
            id: node.id.clone(),
            label: node.label.clone(),
            group: node.group,
            position: node.position.unwrap_or_default(),
            radius,
            kind: SceneNodeKind::Node {
                node_type: node.node_type,
                value: node.value,
                is_sensitivity_target: node.is_sensitivity_target,
            },
            highlighted: false,
        }
    }

    /// Scene node for a collapsed cluster.
    pub fn cluster(
        id: impl Into<String>,
        group: NodeGroup,
        centroid: Position,
        member_count: usize,
    ) -> Self {
        Self {
            id: id.into(),
            label: format!("{} ({})", group, member_count),
            group,
            position: centroid,
            radius: (8.0 + (member_count as f64).sqrt() * 2.0).min(MAX_CLUSTER_RADIUS),
            kind: SceneNodeKind::Cluster { member_count },
            highlighted: false,
        }
    }

    /// Whether this node is a collapsed cluster.
    pub fn is_cluster(&self) -> bool {
        matches!(self.kind, SceneNodeKind::Cluster { .. })
    }

    /// Current value, for single nodes.
    pub fn value(&self) -> Option<f64> {
        match self.kind {
            SceneNodeKind::Node { value, .. } => value,
            SceneNodeKind::Cluster { .. } => None,
        }
    }

    /// Overwrite the value of a single node. Clusters are left untouched.
    pub fn set_value(&mut self, new_value: f64) {
        if let SceneNodeKind::Node { value, .. } = &mut self.kind {
            *value = Some(new_value);
        }
    }
}

/// A drawable edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneEdge {
    /// Source scene node ID
    pub source: String,
    /// Target scene node ID
    pub target: String,
    /// Edge weight; for aggregated cluster edges, the number of folded edges
    pub weight: f64,
    /// Part of the highlighted path
    pub highlighted: bool,
}

/// The visible graph handed to a renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SceneGraph {
    /// Drawable nodes, in draw order
    pub nodes: Vec<SceneNode>,
    /// Drawable edges
    pub edges: Vec<SceneEdge>,
}

impl SceneGraph {
    /// Full-detail scene for a snapshot. Edges with a missing endpoint are
    /// left out.
    pub fn from_graph(graph: &ComputationGraph) -> Self {
        Self {
            nodes: graph.nodes.iter().map(SceneNode::from_node).collect(),
            edges: graph
                .valid_edges()
                .map(|e| SceneEdge {
                    source: e.source.clone(),
                    target: e.target.clone(),
                    weight: e.weight,
                    highlighted: false,
                })
                .collect(),
        }
    }

    /// Number of drawable nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of drawable edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Look up a scene node.
    pub fn find(&self, id: &str) -> Option<&SceneNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Set of node IDs, for comparing scenes.
    pub fn node_ids(&self) -> HashSet<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    /// Set of `(source, target)` pairs, for comparing scenes.
    pub fn edge_pairs(&self) -> HashSet<(&str, &str)> {
        self.edges
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str()))
            .collect()
    }

    /// Mark the nodes of `path` and the edges between consecutive entries.
    ///
    /// Previous highlighting is cleared first. IDs not in the scene are
    /// ignored.
    pub fn highlight_path(&mut self, path: &[String]) {
        self.clear_highlight();
        let on_path: HashSet<&str> = path.iter().map(String::as_str).collect();
        let steps: HashSet<(&str, &str)> = path
            .windows(2)
            .map(|w| (w[0].as_str(), w[1].as_str()))
            .collect();

        for node in &mut self.nodes {
            node.highlighted = on_path.contains(node.id.as_str());
        }
        for edge in &mut self.edges {
            edge.highlighted = steps.contains(&(edge.source.as_str(), edge.target.as_str()));
        }
    }

    /// Remove all highlighting.
    pub fn clear_highlight(&mut self) {
        self.nodes.iter_mut().for_each(|n| n.highlighted = false);
        self.edges.iter_mut().for_each(|e| e.highlighted = false);
    }

    /// Copy positions from `positions` onto matching nodes.
    pub fn apply_positions(&mut self, positions: &HashMap<String, Position>) {
        for node in &mut self.nodes {
            if let Some(&position) = positions.get(&node.id) {
                node.position = position;
            }
        }
    }
}
