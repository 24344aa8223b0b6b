//! # graph_view: Layout, Rendering and Level of Detail
//!
//! ## View Layer Role
//!
//! graph_view turns `graph_core` snapshots into something drawable:
//! - Force-directed layout shared by both backends (`simulation`)
//! - Backend-neutral display list (`scene`) and view transform (`geometry`)
//! - The `GraphRenderer` trait with vector and raster backends (`renderer`)
//! - Backend selection by visible node count (`render_mode`)
//! - Level-of-detail clustering for very large graphs (`lod`)
//!
//! The engine layer (`graph_engine`) decides when to lay out, cluster and
//! draw; nothing here performs I/O.
//!
//! ## Usage Example
//!
//! ```rust
//! use graph_core::layered_graph;
//! use graph_view::{ForceSimulation, LayoutConfig, LodConfig, LodEngine, RenderMode, RendererHost};
//!
//! let mut graph = layered_graph(600, 4, 1).unwrap();
//!
//! let mut layout = ForceSimulation::new(LayoutConfig::default());
//! layout.set_graph(&graph);
//! layout.run(5);
//! for node in &mut graph.nodes {
//!     node.position = layout.position(&node.id);
//! }
//!
//! let mut lod = LodEngine::new(LodConfig::default());
//! let mut host = RendererHost::default();
//! host.render(&lod.scene(&graph));
//! assert_eq!(host.mode(), RenderMode::Raster);
//!
//! lod.enable(&graph);
//! host.render(&lod.scene(&graph));
//! assert_eq!(host.mode(), RenderMode::Vector);
//! ```

#![warn(missing_docs)]

pub mod geometry;
pub mod lod;
mod quadtree;
pub mod render_mode;
pub mod renderer;
pub mod scene;
pub mod simulation;

pub use geometry::ViewTransform;
pub use lod::{build_clusters, Cluster, LodConfig, LodEngine};
pub use render_mode::{RenderMode, RendererHost, DEFAULT_RASTER_THRESHOLD};
pub use renderer::{GraphRenderer, RasterRenderer, RenderStats, SpatialGrid, VectorRenderer};
pub use scene::{SceneEdge, SceneGraph, SceneNode, SceneNodeKind};
pub use simulation::{ForceSimulation, LayoutConfig};
