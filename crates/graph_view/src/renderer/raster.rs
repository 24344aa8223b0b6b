//! Bitmap backend: the whole frame is redrawn from a flat draw list, and
//! hit testing goes through a spatial grid.

use std::collections::HashMap;

use graph_core::{NodeDelta, Position};
use tracing::debug;

use super::{GraphRenderer, RenderStats, SpatialGrid};
use crate::geometry::ViewTransform;
use crate::render_mode::RenderMode;
use crate::scene::{SceneGraph, SceneNode};

/// Handlers bound to the canvas surface: zoom and pointer.
const SURFACE_HANDLERS: usize = 2;

/// Immediate-mode renderer for large graphs.
#[derive(Debug, Default)]
pub struct RasterRenderer {
    attached: bool,
    transform: ViewTransform,
    nodes: Vec<SceneNode>,
    lookup: HashMap<String, usize>,
    edge_count: usize,
    grid: SpatialGrid,
    pulses: Vec<String>,
    frames: u64,
}

impl RasterRenderer {
    /// Detached renderer with an identity transform.
    pub fn new() -> Self {
        Self::default()
    }

    /// Occupied cells in the hit-test index.
    pub fn indexed_cells(&self) -> usize {
        self.grid.occupied_cells()
    }
}

impl GraphRenderer for RasterRenderer {
    fn mode(&self) -> RenderMode {
        RenderMode::Raster
    }

    fn attach(&mut self) {
        self.attached = true;
    }

    fn detach(&mut self) {
        self.attached = false;
        self.nodes.clear();
        self.lookup.clear();
        self.edge_count = 0;
        self.grid = SpatialGrid::default();
        self.pulses.clear();
    }

    fn is_attached(&self) -> bool {
        self.attached
    }

    fn render(&mut self, scene: &SceneGraph) {
        if !self.attached {
            debug!("Raster renderer detached, skipping render");
            return;
        }
        self.nodes = scene.nodes.clone();
        self.lookup = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
        self.edge_count = scene.edges.len();
        self.grid = SpatialGrid::build(&self.nodes);
        self.pulses.retain(|id| self.lookup.contains_key(id));
        self.frames += 1;
    }

    fn update_nodes(&mut self, deltas: &[NodeDelta]) {
        let before = self.pulses.len();
        for delta in deltas {
            if let Some(&i) = self.lookup.get(&delta.id) {
                self.nodes[i].set_value(delta.new_value);
                if !self.pulses.contains(&delta.id) {
                    self.pulses.push(delta.id.clone());
                }
            }
        }
        if self.pulses.len() != before {
            self.frames += 1;
        }
    }

    fn clear_highlights(&mut self) {
        if !self.pulses.is_empty() {
            self.pulses.clear();
            self.frames += 1;
        }
    }

    fn hit_test(&self, point: Position) -> Option<String> {
        let world = self.transform.screen_to_world(point);
        self.grid
            .query(&self.nodes, world)
            .map(|i| self.nodes[i].id.clone())
    }

    fn set_transform(&mut self, pan: Position, zoom: f64) {
        self.transform = ViewTransform::new(pan, zoom);
        if self.attached {
            self.frames += 1;
        }
    }

    fn transform(&self) -> ViewTransform {
        self.transform
    }

    fn stats(&self) -> RenderStats {
        RenderStats {
            frames: self.frames,
            nodes: self.nodes.len(),
            edges: self.edge_count,
            highlighted: self.nodes.iter().filter(|n| n.highlighted).count(),
            handlers: if self.attached { SURFACE_HANDLERS } else { 0 },
            pending_effects: self.pulses.len(),
        }
    }
}
