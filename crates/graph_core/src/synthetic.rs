//! # Synthetic Graph Generation
//!
//! Builds pricing-shaped computation graphs without a pricing backend:
//!
//! - [`TradeGraphGenerator`]: per-trade graphs (sensitivity inputs, pairwise
//!   operations, combine level, price output), individually or aggregated.
//! - [`layered_graph`]: seeded random layered DAGs for exercising level of
//!   detail and raster rendering at scale.

use std::collections::{BTreeMap, HashMap};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::builder::GraphBuilder;
use crate::error::GraphError;
use crate::types::{ComputationGraph, GraphEdge, GraphNode, NodeGroup, NodeType};

/// Information about a trade's graph structure.
#[derive(Debug, Clone, Default)]
struct TradeGraphInfo {
    /// Sensitivity parameters (AD seed points)
    sensitivity_params: Vec<String>,
    /// Current parameter values
    param_values: HashMap<String, f64>,
    /// Computed intermediate and output values keyed by node id
    computed_values: HashMap<String, f64>,
}

/// Generator of per-trade pricing graphs.
///
/// # Example
///
/// ```rust
/// use graph_core::TradeGraphGenerator;
///
/// let mut generator = TradeGraphGenerator::new();
/// generator.register_trade("T001", vec!["spot", "vol", "rate"]);
///
/// let graph = generator.generate(Some("T001")).unwrap();
/// assert!(graph.nodes.len() > 0);
/// ```
#[derive(Debug, Default)]
pub struct TradeGraphGenerator {
    /// Registered trades, ordered by id so aggregate graphs are stable
    trades: BTreeMap<String, TradeGraphInfo>,
}

impl TradeGraphGenerator {
    /// Create an empty generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a trade with its sensitivity parameters.
    pub fn register_trade<S: Into<String>>(&mut self, trade_id: &str, sensitivity_params: Vec<S>) {
        let info = TradeGraphInfo {
            sensitivity_params: sensitivity_params.into_iter().map(Into::into).collect(),
            ..Default::default()
        };
        self.trades.insert(trade_id.to_string(), info);
    }

    /// Set an input parameter value for a trade.
    pub fn set_param_value(
        &mut self,
        trade_id: &str,
        param_name: &str,
        value: f64,
    ) -> Result<(), GraphError> {
        let trade = self
            .trades
            .get_mut(trade_id)
            .ok_or_else(|| GraphError::SubjectNotFound(trade_id.to_string()))?;
        trade.param_values.insert(param_name.to_string(), value);
        Ok(())
    }

    /// Set a computed (intermediate or output) node value for a trade.
    pub fn set_computed_value(
        &mut self,
        trade_id: &str,
        node_id: &str,
        value: f64,
    ) -> Result<(), GraphError> {
        let trade = self
            .trades
            .get_mut(trade_id)
            .ok_or_else(|| GraphError::SubjectNotFound(trade_id.to_string()))?;
        trade.computed_values.insert(node_id.to_string(), value);
        Ok(())
    }

    /// Check if a trade is registered.
    pub fn has_trade(&self, trade_id: &str) -> bool {
        self.trades.contains_key(trade_id)
    }

    /// Registered trade ids in order.
    pub fn trade_ids(&self) -> impl Iterator<Item = &str> {
        self.trades.keys().map(String::as_str)
    }

    /// Generate the graph for one trade, or the aggregate of all trades.
    ///
    /// # Errors
    ///
    /// - `SubjectNotFound` for an unregistered trade
    /// - `InvalidParameters` for an aggregate request with no trades
    pub fn generate(&self, trade_id: Option<&str>) -> Result<ComputationGraph, GraphError> {
        let mut builder = GraphBuilder::with_capacity(64, 128);

        match trade_id {
            Some(id) => {
                let info = self
                    .trades
                    .get(id)
                    .ok_or_else(|| GraphError::SubjectNotFound(id.to_string()))?;
                Self::build_trade_graph(id, info, &mut builder);
            }
            None => {
                if self.trades.is_empty() {
                    return Err(GraphError::invalid("No trades registered"));
                }
                for (id, info) in &self.trades {
                    Self::build_trade_graph(id, info, &mut builder);
                }
            }
        }

        Ok(builder.build(trade_id.map(str::to_string)))
    }

    fn add_level(
        builder: &mut GraphBuilder,
        info: &TradeGraphInfo,
        sources: &[String],
        id_prefix: &str,
        pair: (NodeType, &str),
        single: (NodeType, &str),
    ) -> Vec<String> {
        let mut level = Vec::new();
        for (i, chunk) in sources.chunks(2).enumerate() {
            let node_id = format!("{}_{}", id_prefix, i);
            let (node_type, label) = if chunk.len() == 2 {
                (pair.0, format!("{} {} {}", chunk[0], pair.1, chunk[1]))
            } else {
                (single.0, format!("{}({})", single.1, chunk[0]))
            };

            let mut node = GraphNode::new(&node_id, node_type, label, NodeGroup::Intermediate);
            node.value = info.computed_values.get(&node_id).copied();
            if builder.add_node(node) {
                for source in chunk {
                    builder.add_edge(GraphEdge::new(source.clone(), node_id.clone()));
                }
            }
            level.push(node_id);
        }
        level
    }

    fn build_trade_graph(trade_id: &str, info: &TradeGraphInfo, builder: &mut GraphBuilder) {
        let mut inputs = Vec::with_capacity(info.sensitivity_params.len());
        for param in &info.sensitivity_params {
            let node_id = format!("{}_{}", trade_id, param);
            let mut node = GraphNode::new(&node_id, NodeType::Input, param, NodeGroup::Sensitivity)
                .as_sensitivity_target();
            node.value = info.param_values.get(param).copied();
            builder.add_node(node);
            inputs.push(node_id);
        }

        let first = Self::add_level(
            builder,
            info,
            &inputs,
            &format!("{}_op", trade_id),
            (NodeType::Mul, "*"),
            (NodeType::Exp, "exp"),
        );
        let second = Self::add_level(
            builder,
            info,
            &first,
            &format!("{}_combine", trade_id),
            (NodeType::Add, "+"),
            (NodeType::Sqrt, "sqrt"),
        );

        let output_id = format!("{}_price", trade_id);
        let mut output = GraphNode::new(&output_id, NodeType::Output, "price", NodeGroup::Output);
        output.value = info.computed_values.get(&output_id).copied();
        if builder.add_node(output) {
            let sources = if second.is_empty() { &first } else { &second };
            for source in sources {
                builder.add_edge(GraphEdge::new(source.clone(), output_id.clone()));
            }
        }
    }
}

/// Seeded random layered DAG.
///
/// Layer 0 holds sensitivity inputs, the last layer outputs, the rest
/// intermediates. Every non-input node draws one to three parents from the
/// previous layer, so the result is always acyclic and fully connected
/// layer to layer. Nodes carry random values.
///
/// # Errors
///
/// `InvalidParameters` when `layers < 2` or `node_count < layers`.
pub fn layered_graph(
    node_count: usize,
    layers: usize,
    seed: u64,
) -> Result<ComputationGraph, GraphError> {
    if layers < 2 {
        return Err(GraphError::invalid("layered graph needs at least 2 layers"));
    }
    if node_count < layers {
        return Err(GraphError::invalid(format!(
            "{} nodes cannot fill {} layers",
            node_count, layers
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut builder = GraphBuilder::with_capacity(node_count, node_count * 2);
    let per_layer = node_count / layers;
    let mut previous: Vec<String> = Vec::new();
    let mut created = 0;

    for layer in 0..layers {
        let size = if layer == layers - 1 {
            node_count - created
        } else {
            per_layer
        };
        let (group, node_type) = match layer {
            0 => (NodeGroup::Sensitivity, NodeType::Input),
            l if l == layers - 1 => (NodeGroup::Output, NodeType::Output),
            _ => (NodeGroup::Intermediate, NodeType::Custom((layer % 4) as u8)),
        };

        let mut current = Vec::with_capacity(size);
        for i in 0..size {
            let id = format!("L{}_{}", layer, i);
            let mut node = GraphNode::new(&id, node_type, format!("{} {}", group, i), group)
                .with_value(rng.gen_range(-100.0..100.0));
            node.is_sensitivity_target = layer == 0;
            builder.add_node(node);

            if !previous.is_empty() {
                let parents = rng.gen_range(1..=3usize.min(previous.len()));
                for _ in 0..parents {
                    let parent = &previous[rng.gen_range(0..previous.len())];
                    builder.add_edge(GraphEdge::new(parent.clone(), id.clone()));
                }
            }
            current.push(id);
        }

        created += size;
        previous = current;
    }

    Ok(builder.build(None))
}
