//! # Rendering Backends
//!
//! [`GraphRenderer`] is the only surface the engine draws through. Two
//! implementations exist:
//!
//! - [`VectorRenderer`]: one retained element per node with its own
//!   interaction handlers; styling is per element, hit testing is a scan
//! - [`RasterRenderer`]: a single bitmap redrawn as a whole, with a spatial
//!   grid for hit testing
//!
//! The [`RendererHost`](crate::RendererHost) picks between them.

mod raster;
mod spatial;
mod vector;

pub use raster::RasterRenderer;
pub use spatial::SpatialGrid;
pub use vector::VectorRenderer;

use graph_core::{NodeDelta, Position};
use serde::Serialize;

use crate::geometry::ViewTransform;
use crate::render_mode::RenderMode;
use crate::scene::SceneGraph;

/// Counters describing what a renderer currently holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RenderStats {
    /// Full or partial redraws performed
    pub frames: u64,
    /// Nodes currently drawn
    pub nodes: usize,
    /// Edges currently drawn
    pub edges: usize,
    /// Nodes drawn as part of a highlighted path
    pub highlighted: usize,
    /// Interaction handlers currently bound
    pub handlers: usize,
    /// Nodes with an update effect still showing
    pub pending_effects: usize,
}

/// Drawing backend.
///
/// `hit_test` takes screen coordinates; the renderer applies its own view
/// transform. A detached renderer ignores draw calls.
pub trait GraphRenderer: Send {
    /// Which backend this is.
    fn mode(&self) -> RenderMode;

    /// Bind interaction handlers and start accepting draw calls.
    fn attach(&mut self);

    /// Unbind interaction handlers and drop retained drawing state.
    fn detach(&mut self);

    /// Whether the renderer is attached.
    fn is_attached(&self) -> bool;

    /// Draw a full scene.
    fn render(&mut self, scene: &SceneGraph);

    /// Apply value changes to already-drawn nodes and start their update
    /// effect. Unknown ids are ignored.
    fn update_nodes(&mut self, deltas: &[NodeDelta]);

    /// End update effects.
    fn clear_highlights(&mut self);

    /// Topmost node under a screen point.
    fn hit_test(&self, point: Position) -> Option<String>;

    /// Set pan (screen pixels) and zoom.
    fn set_transform(&mut self, pan: Position, zoom: f64);

    /// Current view transform.
    fn transform(&self) -> ViewTransform;

    /// Counters for reporting.
    fn stats(&self) -> RenderStats;
}

/// Create a fresh, detached renderer for a mode.
pub fn renderer_for(mode: RenderMode) -> Box<dyn GraphRenderer> {
    match mode {
        RenderMode::Vector => Box::new(VectorRenderer::new()),
        RenderMode::Raster => Box::new(RasterRenderer::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneNode;
    use graph_core::{GraphNode, NodeGroup, NodeType};

    fn scene() -> SceneGraph {
        let mut scene = SceneGraph::default();
        scene.nodes.push(SceneNode::from_node(
            &GraphNode::new("A", NodeType::Input, "a", NodeGroup::Input).at(0.0, 0.0),
        ));
        scene.nodes.push(SceneNode::from_node(
            &GraphNode::new("B", NodeType::Output, "b", NodeGroup::Output)
                .with_value(1.0)
                .at(100.0, 0.0),
        ));
        scene
    }

    /// Both backends must agree on everything observable.
    fn check_backend(mut renderer: Box<dyn GraphRenderer>) {
        renderer.attach();
        renderer.render(&scene());

        assert_eq!(renderer.hit_test(Position::new(1.0, 1.0)).as_deref(), Some("A"));
        assert_eq!(renderer.hit_test(Position::new(104.0, 0.0)).as_deref(), Some("B"));
        assert_eq!(renderer.hit_test(Position::new(50.0, 0.0)), None);

        renderer.set_transform(Position::new(10.0, 0.0), 2.0);
        assert_eq!(renderer.hit_test(Position::new(210.0, 0.0)).as_deref(), Some("B"));
        assert_eq!(renderer.hit_test(Position::new(10.0, 0.0)).as_deref(), Some("A"));
        assert_eq!(renderer.hit_test(Position::new(104.0, 0.0)), None);

        renderer.update_nodes(&[
            NodeDelta::new("B", Some(1.0), 2.0),
            NodeDelta::new("Z", None, 1.0),
        ]);
        assert_eq!(renderer.stats().pending_effects, 1);
        renderer.clear_highlights();
        assert_eq!(renderer.stats().pending_effects, 0);

        renderer.detach();
        assert!(!renderer.is_attached());
        assert_eq!(renderer.stats().handlers, 0);
        assert_eq!(renderer.hit_test(Position::new(210.0, 0.0)), None);
    }

    #[test]
    fn test_vector_backend() {
        check_backend(renderer_for(RenderMode::Vector));
    }

    #[test]
    fn test_raster_backend() {
        check_backend(renderer_for(RenderMode::Raster));
    }
}
