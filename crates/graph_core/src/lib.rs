//! # graph_core: Computation Graph Model and DAG Analysis
//!
//! ## Core Layer Role
//!
//! graph_core is the bottom layer of the graph engine, providing:
//! - The D3.js-compatible graph data model (`types`)
//! - Snapshot construction and sanitising (`builder`)
//! - Critical-path and sensitivity-path analysis (`analysis`)
//! - Fuzzy node search (`search`)
//! - Synthetic pricing graphs for demos and tests (`synthetic`)
//! - Error types: `GraphError`, `CycleError` (`error`)
//!
//! Nothing here knows about layout, rendering, or the network; those live in
//! `graph_view` and `graph_engine`.
//!
//! ## Usage Example
//!
//! ```rust
//! use graph_core::{critical_path, sensitivity_paths, TradeGraphGenerator};
//!
//! let mut generator = TradeGraphGenerator::new();
//! generator.register_trade("T001", vec!["spot", "vol", "rate"]);
//! let graph = generator.generate(Some("T001")).unwrap();
//!
//! let path = critical_path(&graph).unwrap();
//! assert_eq!(path.last().map(String::as_str), Some("T001_price"));
//! assert_eq!(sensitivity_paths(&graph).len(), 3);
//! ```

#![warn(missing_docs)]

pub mod analysis;
pub mod builder;
pub mod error;
pub mod search;
pub mod synthetic;
pub mod types;

pub use analysis::{
    critical_path, find_path, longest_distances, sensitivity_paths, topological_order,
    SensitivityPath,
};
pub use builder::{GraphBuilder, SanitiseReport};
pub use error::{CycleError, GraphError};
pub use search::{search_nodes, SearchHit};
pub use synthetic::{layered_graph, TradeGraphGenerator};
pub use types::{
    ComputationGraph, GraphEdge, GraphMetadata, GraphNode, GraphUpdate, NodeDelta, NodeGroup,
    NodeType, NodeValueUpdate, Position,
};
