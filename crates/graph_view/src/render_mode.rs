//! # Rendering Mode Selection
//!
//! The backend is a pure function of how many nodes are visible: above the
//! threshold (500 by default) the raster backend is used. [`RendererHost`]
//! owns the active backend and swaps it when the visible count crosses the
//! threshold, detaching the old backend before the new one attaches.

use std::fmt;

use graph_core::{NodeDelta, Position};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::ViewTransform;
use crate::renderer::{renderer_for, GraphRenderer, RenderStats};
use crate::scene::SceneGraph;

/// Node count above which the raster backend is selected.
pub const DEFAULT_RASTER_THRESHOLD: usize = 500;

/// Drawing backend kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// One element per node
    Vector,
    /// Single bitmap
    Raster,
}

impl RenderMode {
    /// Select the backend for `node_count` visible nodes.
    ///
    /// # Example
    ///
    /// ```rust
    /// use graph_view::RenderMode;
    ///
    /// assert_eq!(RenderMode::select(500, 500), RenderMode::Vector);
    /// assert_eq!(RenderMode::select(501, 500), RenderMode::Raster);
    /// ```
    pub fn select(node_count: usize, threshold: usize) -> Self {
        if node_count > threshold {
            RenderMode::Raster
        } else {
            RenderMode::Vector
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderMode::Vector => f.write_str("vector"),
            RenderMode::Raster => f.write_str("raster"),
        }
    }
}

/// Owner of the active rendering backend.
pub struct RendererHost {
    threshold: usize,
    renderer: Box<dyn GraphRenderer>,
    switches: usize,
}

impl RendererHost {
    /// Host starting with an attached vector backend.
    pub fn new(threshold: usize) -> Self {
        let mut renderer = renderer_for(RenderMode::Vector);
        renderer.attach();
        Self {
            threshold,
            renderer,
            switches: 0,
        }
    }

    /// Active backend kind.
    pub fn mode(&self) -> RenderMode {
        self.renderer.mode()
    }

    /// Threshold used for selection.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Number of backend swaps so far.
    pub fn switches(&self) -> usize {
        self.switches
    }

    /// Active backend.
    pub fn renderer(&self) -> &dyn GraphRenderer {
        self.renderer.as_ref()
    }

    /// Swap backends if `node_count` calls for the other one. Returns
    /// whether a swap happened. The view transform carries over.
    pub fn ensure_mode(&mut self, node_count: usize) -> bool {
        let wanted = RenderMode::select(node_count, self.threshold);
        if wanted == self.renderer.mode() {
            return false;
        }

        let transform = self.renderer.transform();
        self.renderer.detach();

        let mut next = renderer_for(wanted);
        next.set_transform(Position::new(transform.pan_x, transform.pan_y), transform.zoom);
        next.attach();

        debug!(
            from = %self.renderer.mode(),
            to = %wanted,
            nodes = node_count,
            "Switching rendering backend"
        );
        self.renderer = next;
        self.switches += 1;
        true
    }

    /// Select the backend for the scene and draw it. Returns whether the
    /// backend was swapped.
    pub fn render(&mut self, scene: &SceneGraph) -> bool {
        let switched = self.ensure_mode(scene.node_count());
        self.renderer.render(scene);
        switched
    }

    /// Forward value changes to the active backend.
    pub fn update_nodes(&mut self, deltas: &[NodeDelta]) {
        self.renderer.update_nodes(deltas);
    }

    /// End update effects on the active backend.
    pub fn clear_highlights(&mut self) {
        self.renderer.clear_highlights();
    }

    /// Hit test on the active backend.
    pub fn hit_test(&self, point: Position) -> Option<String> {
        self.renderer.hit_test(point)
    }

    /// Set the view transform on the active backend.
    pub fn set_transform(&mut self, pan: Position, zoom: f64) {
        self.renderer.set_transform(pan, zoom);
    }

    /// Current view transform.
    pub fn transform(&self) -> ViewTransform {
        self.renderer.transform()
    }

    /// Counters of the active backend.
    pub fn stats(&self) -> RenderStats {
        self.renderer.stats()
    }
}

impl Default for RendererHost {
    fn default() -> Self {
        Self::new(DEFAULT_RASTER_THRESHOLD)
    }
}

impl fmt::Debug for RendererHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RendererHost")
            .field("threshold", &self.threshold)
            .field("mode", &self.mode())
            .field("switches", &self.switches)
            .finish()
    }
}
