//! # Computation Graph Data Types
//!
//! Core data structures for the sensitivity graphs of pricing calculations.
//! The wire format is D3.js compatible so the same payload feeds the
//! force-directed views and the engine.
//!
//! ## D3.js Compatibility
//!
//! - `ComputationGraph.edges` is serialised as `links`
//! - `GraphNode.node_type` is serialised as `type`
//! - All enum variants use lowercase serialisation

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// NodeType Enumeration
// =============================================================================

/// Operation type for a computation graph node.
///
/// Serialised as a lowercase string (`"add"`, `"mul"`, ...). Custom operations
/// use `"custom_<n>"`; any other string read from the wire maps to
/// [`NodeType::Unknown`] instead of failing the whole snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
    /// Input variable (market data, model parameters)
    Input,
    /// Addition operation
    Add,
    /// Multiplication operation
    Mul,
    /// Exponential function (e^x)
    Exp,
    /// Natural logarithm (ln(x))
    Log,
    /// Square root
    Sqrt,
    /// Division operation
    Div,
    /// Final output value
    Output,
    /// User-defined custom operation type
    Custom(u8),
    /// Operation type not recognised by this build
    Unknown,
}

impl NodeType {
    /// Wire name of the operation type.
    pub fn as_str(&self) -> String {
        match self {
            NodeType::Input => "input".to_string(),
            NodeType::Add => "add".to_string(),
            NodeType::Mul => "mul".to_string(),
            NodeType::Exp => "exp".to_string(),
            NodeType::Log => "log".to_string(),
            NodeType::Sqrt => "sqrt".to_string(),
            NodeType::Div => "div".to_string(),
            NodeType::Output => "output".to_string(),
            NodeType::Custom(value) => format!("custom_{}", value),
            NodeType::Unknown => "unknown".to_string(),
        }
    }
}

impl From<String> for NodeType {
    fn from(value: String) -> Self {
        match value.to_lowercase().as_str() {
            "input" => NodeType::Input,
            "add" => NodeType::Add,
            "mul" => NodeType::Mul,
            "exp" => NodeType::Exp,
            "log" => NodeType::Log,
            "sqrt" => NodeType::Sqrt,
            "div" => NodeType::Div,
            "output" => NodeType::Output,
            other => other
                .strip_prefix("custom_")
                .and_then(|n| n.parse::<u8>().ok())
                .map(NodeType::Custom)
                .unwrap_or(NodeType::Unknown),
        }
    }
}

impl From<NodeType> for String {
    fn from(value: NodeType) -> Self {
        value.as_str()
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// NodeGroup Enumeration
// =============================================================================

/// Semantic grouping for a computation graph node.
///
/// Drives colour coding in the views and is the first partition key of the
/// level-of-detail clustering.
///
/// # Colour Mapping
///
/// - `Input`: Blue (#3b82f6)
/// - `Intermediate`: Grey (#6b7280)
/// - `Output`: Green (#22c55e)
/// - `Sensitivity`: Orange (#f97316)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeGroup {
    /// Input nodes (market data, parameters)
    Input,
    /// Intermediate computation nodes
    Intermediate,
    /// Output nodes (pricing results)
    Output,
    /// Sensitivity target nodes (AD differentiation points)
    Sensitivity,
}

impl NodeGroup {
    /// All groups in their canonical order.
    pub const ALL: [NodeGroup; 4] = [
        NodeGroup::Input,
        NodeGroup::Intermediate,
        NodeGroup::Output,
        NodeGroup::Sensitivity,
    ];

    /// Lowercase name, as used on the wire and in cluster ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeGroup::Input => "input",
            NodeGroup::Intermediate => "intermediate",
            NodeGroup::Output => "output",
            NodeGroup::Sensitivity => "sensitivity",
        }
    }

    /// Display colour for this group.
    pub fn colour(&self) -> &'static str {
        match self {
            NodeGroup::Input => "#3b82f6",
            NodeGroup::Intermediate => "#6b7280",
            NodeGroup::Output => "#22c55e",
            NodeGroup::Sensitivity => "#f97316",
        }
    }
}

impl fmt::Display for NodeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Position
// =============================================================================

/// Two-dimensional layout position in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

impl Position {
    /// Create a new position.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another position.
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

// =============================================================================
// GraphNode Structure
// =============================================================================

/// A node in the computation graph.
///
/// # Example
///
/// ```rust
/// use graph_core::{GraphNode, NodeType, NodeGroup};
///
/// let node = GraphNode::new("N1", NodeType::Input, "spot", NodeGroup::Input)
///     .with_value(100.0)
///     .as_sensitivity_target();
/// assert!(node.is_sensitivity_target);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Unique identifier for the node
    pub id: String,

    /// Operation type performed by this node
    #[serde(rename = "type")]
    pub node_type: NodeType,

    /// Human-readable label (variable name or operation description)
    #[serde(default)]
    pub label: String,

    /// Current computed value (None if not yet computed)
    #[serde(default)]
    pub value: Option<f64>,

    /// Whether this node is a sensitivity calculation target (AD seed point)
    #[serde(default)]
    pub is_sensitivity_target: bool,

    /// Visual grouping for colour coding
    pub group: NodeGroup,

    /// Layout position, assigned by the layout engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl GraphNode {
    /// Create a node with no value and no position.
    pub fn new(
        id: impl Into<String>,
        node_type: NodeType,
        label: impl Into<String>,
        group: NodeGroup,
    ) -> Self {
        Self {
            id: id.into(),
            node_type,
            label: label.into(),
            value: None,
            is_sensitivity_target: false,
            group,
            position: None,
        }
    }

    /// Set the computed value.
    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    /// Flag the node as a sensitivity target.
    pub fn as_sensitivity_target(mut self) -> Self {
        self.is_sensitivity_target = true;
        self
    }

    /// Set the layout position.
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Position::new(x, y));
        self
    }
}

// =============================================================================
// GraphEdge Structure
// =============================================================================

fn default_weight() -> f64 {
    1.0
}

/// Servers that model the weight as optional send `"weight": null`.
fn nullable_weight<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or_else(default_weight))
}

/// A directed edge (data dependency) between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Source node ID (input to the operation)
    pub source: String,

    /// Target node ID (output of the operation)
    pub target: String,

    /// Edge weight (defaults to 1)
    #[serde(default = "default_weight", deserialize_with = "nullable_weight")]
    pub weight: f64,
}

impl GraphEdge {
    /// Create an edge with unit weight.
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            weight: default_weight(),
        }
    }

    /// Create an edge with an explicit weight.
    pub fn weighted(source: impl Into<String>, target: impl Into<String>, weight: f64) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            weight,
        }
    }
}

// =============================================================================
// GraphMetadata Structure
// =============================================================================

/// Summary statistics for a computation graph snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphMetadata {
    /// Subject this graph belongs to (None for the aggregate graph)
    #[serde(default, alias = "trade_id")]
    pub subject_id: Option<String>,

    /// Total number of nodes in the graph
    #[serde(default)]
    pub node_count: usize,

    /// Total number of edges in the graph
    #[serde(default)]
    pub edge_count: usize,

    /// Maximum depth of the graph (longest path, counted in nodes)
    #[serde(default)]
    pub depth: usize,

    /// ISO 8601 timestamp of graph generation
    #[serde(default)]
    pub generated_at: String,
}

// =============================================================================
// ComputationGraph Structure
// =============================================================================

/// Complete computation graph snapshot.
///
/// # Example JSON
///
/// ```json
/// {
///   "nodes": [...],
///   "links": [...],
///   "metadata": {...}
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputationGraph {
    /// All nodes in the computation graph
    pub nodes: Vec<GraphNode>,

    /// All edges in the computation graph (serialised as "links" for D3.js)
    #[serde(rename = "links", default)]
    pub edges: Vec<GraphEdge>,

    /// Graph metadata (statistics, timestamps, identification)
    pub metadata: GraphMetadata,
}

impl ComputationGraph {
    /// Find a node by its ID.
    pub fn find_node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Find a node by its ID for mutation.
    pub fn find_node_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Map from node ID to its index in `nodes`.
    pub fn node_index(&self) -> HashMap<&str, usize> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (node.id.as_str(), idx))
            .collect()
    }

    /// Edges whose endpoints both exist in the node set, in snapshot order.
    pub fn valid_edges(&self) -> impl Iterator<Item = &GraphEdge> {
        let index = self.node_index();
        self.edges
            .iter()
            .filter(move |e| {
                index.contains_key(e.source.as_str()) && index.contains_key(e.target.as_str())
            })
    }

    /// Nodes flagged as sensitivity targets.
    pub fn sensitivity_targets(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(|n| n.is_sensitivity_target)
    }

    /// Nodes in the output group.
    pub fn outputs(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(|n| n.group == NodeGroup::Output)
    }
}

// =============================================================================
// Node value updates (streaming deltas)
// =============================================================================

/// A single node value pushed by the live feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeValueUpdate {
    /// Node ID being updated
    pub id: String,

    /// New computed value
    pub value: f64,
}

impl NodeValueUpdate {
    /// Create a node value update.
    pub fn new(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }
}

/// A batch of node value updates for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphUpdate {
    /// Subject whose graph changed
    pub subject_id: String,

    /// Changed node values, in arrival order
    pub node_updates: Vec<NodeValueUpdate>,
}

/// An applied update, carrying the value it replaced.
///
/// Sent to renderers so they can animate the change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeDelta {
    /// Node ID that changed
    pub id: String,

    /// Value before the change
    pub old_value: Option<f64>,

    /// Value after the change
    pub new_value: f64,

    /// `new_value - old_value`, when an old value existed
    pub delta: Option<f64>,
}

impl NodeDelta {
    /// Build a delta from the previous and new values.
    pub fn new(id: impl Into<String>, old_value: Option<f64>, new_value: f64) -> Self {
        Self {
            id: id.into(),
            old_value,
            new_value,
            delta: old_value.map(|old| new_value - old),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod node_type_tests {
        use super::*;

        #[test]
        fn test_node_type_roundtrip_names() {
            for node_type in [
                NodeType::Input,
                NodeType::Add,
                NodeType::Mul,
                NodeType::Exp,
                NodeType::Log,
                NodeType::Sqrt,
                NodeType::Div,
                NodeType::Output,
                NodeType::Custom(7),
            ] {
                assert_eq!(NodeType::from(node_type.as_str()), node_type);
            }
        }

        #[test]
        fn test_unknown_node_type_string() {
            assert_eq!(NodeType::from("blackscholes".to_string()), NodeType::Unknown);
            assert_eq!(NodeType::from("custom_x".to_string()), NodeType::Unknown);
        }

        #[test]
        fn test_node_type_case_insensitive() {
            assert_eq!(NodeType::from("MUL".to_string()), NodeType::Mul);
        }
    }

    mod serialisation_tests {
        use super::*;

        #[test]
        fn test_graph_node_serialisation() {
            let node = GraphNode::new("N1", NodeType::Input, "spot", NodeGroup::Input)
                .with_value(100.0)
                .as_sensitivity_target();

            let json = serde_json::to_string(&node).unwrap();

            assert!(json.contains("\"type\":\"input\""));
            assert!(json.contains("\"id\":\"N1\""));
            assert!(json.contains("\"is_sensitivity_target\":true"));
            assert!(json.contains("\"group\":\"input\""));
            assert!(!json.contains("position"));
        }

        #[test]
        fn test_custom_node_type_serialisation() {
            let node =
                GraphNode::new("N1", NodeType::Custom(42), "custom", NodeGroup::Intermediate);
            let json = serde_json::to_string(&node).unwrap();
            assert!(json.contains("\"type\":\"custom_42\""));
        }

        #[test]
        fn test_graph_deserialises_links_and_default_weight() {
            let json = r#"{
                "nodes": [
                    {"id": "A", "type": "input", "label": "spot", "value": 100.0,
                     "is_sensitivity_target": true, "group": "sensitivity"},
                    {"id": "B", "type": "output", "label": "price", "value": null,
                     "is_sensitivity_target": false, "group": "output"}
                ],
                "links": [{"source": "A", "target": "B"}],
                "metadata": {"trade_id": "T001", "node_count": 2, "edge_count": 1,
                             "depth": 2, "generated_at": "2026-01-13T12:00:00Z"}
            }"#;

            let graph: ComputationGraph = serde_json::from_str(json).unwrap();

            assert_eq!(graph.nodes.len(), 2);
            assert_eq!(graph.edges[0].weight, 1.0);
            assert_eq!(graph.metadata.subject_id.as_deref(), Some("T001"));
            assert!(graph.nodes[1].value.is_none());
        }

        #[test]
        fn test_null_edge_weight_defaults_to_unit() {
            let json = r#"{
                "nodes": [
                    {"id": "T1_spot", "type": "input", "label": "spot", "value": 100.0,
                     "is_sensitivity_target": true, "group": "sensitivity"},
                    {"id": "T1_price", "type": "output", "label": "price", "value": null,
                     "is_sensitivity_target": false, "group": "output"}
                ],
                "links": [
                    {"source": "T1_spot", "target": "T1_price", "weight": null},
                    {"source": "T1_spot", "target": "T1_price", "weight": 2.5}
                ],
                "metadata": {"trade_id": "T1", "node_count": 2, "edge_count": 2,
                             "depth": 2, "generated_at": "2026-01-13T12:00:00Z"}
            }"#;

            let graph: ComputationGraph = serde_json::from_str(json).unwrap();

            assert_eq!(graph.edges[0].weight, 1.0);
            assert_eq!(graph.edges[1].weight, 2.5);
        }

        #[test]
        fn test_graph_serialises_edges_as_links() {
            let graph = ComputationGraph {
                nodes: vec![],
                edges: vec![GraphEdge::new("A", "B")],
                metadata: GraphMetadata {
                    subject_id: None,
                    node_count: 0,
                    edge_count: 1,
                    depth: 0,
                    generated_at: String::new(),
                },
            };
            let json = serde_json::to_string(&graph).unwrap();
            assert!(json.contains("\"links\":"));
            assert!(!json.contains("\"edges\":"));
        }
    }

    mod graph_tests {
        use super::*;

        fn sample() -> ComputationGraph {
            ComputationGraph {
                nodes: vec![
                    GraphNode::new("A", NodeType::Input, "spot", NodeGroup::Input)
                        .as_sensitivity_target(),
                    GraphNode::new("B", NodeType::Output, "price", NodeGroup::Output),
                ],
                edges: vec![GraphEdge::new("A", "B"), GraphEdge::new("A", "GHOST")],
                metadata: GraphMetadata {
                    subject_id: None,
                    node_count: 2,
                    edge_count: 2,
                    depth: 2,
                    generated_at: String::new(),
                },
            }
        }

        #[test]
        fn test_find_node() {
            let graph = sample();
            assert_eq!(graph.find_node("A").map(|n| n.label.as_str()), Some("spot"));
            assert!(graph.find_node("Z").is_none());
        }

        #[test]
        fn test_valid_edges_skip_dangling() {
            let graph = sample();
            assert_eq!(graph.valid_edges().count(), 1);
        }

        #[test]
        fn test_targets_and_outputs() {
            let graph = sample();
            assert_eq!(graph.sensitivity_targets().count(), 1);
            assert_eq!(graph.outputs().count(), 1);
        }

        #[test]
        fn test_node_delta() {
            let delta = NodeDelta::new("A", Some(100.0), 101.5);
            assert_eq!(delta.delta, Some(1.5));
            let fresh = NodeDelta::new("A", None, 3.0);
            assert!(fresh.delta.is_none());
        }
    }
}
