//! Per-element backend: every node is a retained element with its own
//! handlers, updated in place by a keyed join.

use std::collections::HashMap;

use graph_core::{NodeDelta, Position};
use tracing::debug;

use super::{GraphRenderer, RenderStats};
use crate::geometry::ViewTransform;
use crate::render_mode::RenderMode;
use crate::scene::{SceneEdge, SceneGraph, SceneNode};

/// Handlers bound to each node element: drag, hover, click.
const HANDLERS_PER_ELEMENT: usize = 3;

#[derive(Debug, Clone)]
struct NodeElement {
    node: SceneNode,
    flashing: bool,
}

/// Retained-mode renderer for small graphs.
#[derive(Debug, Default)]
pub struct VectorRenderer {
    attached: bool,
    transform: ViewTransform,
    elements: Vec<NodeElement>,
    lookup: HashMap<String, usize>,
    edges: Vec<SceneEdge>,
    frames: u64,
    last_entered: usize,
    last_exited: usize,
}

impl VectorRenderer {
    /// Detached renderer with an identity transform.
    pub fn new() -> Self {
        Self::default()
    }

    /// Elements created and removed by the most recent render.
    pub fn last_join(&self) -> (usize, usize) {
        (self.last_entered, self.last_exited)
    }
}

impl GraphRenderer for VectorRenderer {
    fn mode(&self) -> RenderMode {
        RenderMode::Vector
    }

    fn attach(&mut self) {
        self.attached = true;
    }

    fn detach(&mut self) {
        self.attached = false;
        self.elements.clear();
        self.lookup.clear();
        self.edges.clear();
    }

    fn is_attached(&self) -> bool {
        self.attached
    }

    fn render(&mut self, scene: &SceneGraph) {
        if !self.attached {
            debug!("Vector renderer detached, skipping render");
            return;
        }

        let mut previous: HashMap<String, NodeElement> = self
            .elements
            .drain(..)
            .map(|e| (e.node.id.clone(), e))
            .collect();
        let mut entered = 0;

        self.lookup.clear();
        for node in &scene.nodes {
            let element = match previous.remove(&node.id) {
                Some(mut existing) => {
                    existing.node = node.clone();
                    existing
                }
                None => {
                    entered += 1;
                    NodeElement {
                        node: node.clone(),
                        flashing: false,
                    }
                }
            };
            self.lookup.insert(node.id.clone(), self.elements.len());
            self.elements.push(element);
        }
        self.edges = scene.edges.clone();

        self.last_entered = entered;
        self.last_exited = previous.len();
        self.frames += 1;
    }

    fn update_nodes(&mut self, deltas: &[NodeDelta]) {
        let mut touched = 0;
        for delta in deltas {
            if let Some(&i) = self.lookup.get(&delta.id) {
                let element = &mut self.elements[i];
                element.node.set_value(delta.new_value);
                element.flashing = true;
                touched += 1;
            }
        }
        if touched > 0 {
            self.frames += 1;
        }
    }

    fn clear_highlights(&mut self) {
        self.elements.iter_mut().for_each(|e| e.flashing = false);
    }

    fn hit_test(&self, point: Position) -> Option<String> {
        let world = self.transform.screen_to_world(point);
        self.elements
            .iter()
            .rev()
            .find(|e| e.node.position.distance_to(&world) <= e.node.radius)
            .map(|e| e.node.id.clone())
    }

    fn set_transform(&mut self, pan: Position, zoom: f64) {
        self.transform = ViewTransform::new(pan, zoom);
    }

    fn transform(&self) -> ViewTransform {
        self.transform
    }

    fn stats(&self) -> RenderStats {
        RenderStats {
            frames: self.frames,
            nodes: self.elements.len(),
            edges: self.edges.len(),
            highlighted: self.elements.iter().filter(|e| e.node.highlighted).count(),
            handlers: if self.attached {
                // one zoom handler on the surface plus per-element handlers
                1 + self.elements.len() * HANDLERS_PER_ELEMENT
            } else {
                0
            },
            pending_effects: self.elements.iter().filter(|e| e.flashing).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_core::{GraphNode, NodeGroup, NodeType};

    fn scene(ids: &[&str]) -> SceneGraph {
        SceneGraph {
            nodes: ids
                .iter()
                .map(|id| {
                    SceneNode::from_node(&GraphNode::new(
                        *id,
                        NodeType::Add,
                        *id,
                        NodeGroup::Intermediate,
                    ))
                })
                .collect(),
            edges: Vec::new(),
        }
    }

    #[test]
    fn test_keyed_join() {
        let mut renderer = VectorRenderer::new();
        renderer.attach();

        renderer.render(&scene(&["A", "B"]));
        assert_eq!(renderer.last_join(), (2, 0));

        renderer.render(&scene(&["B", "C", "D"]));
        assert_eq!(renderer.last_join(), (2, 1));
        assert_eq!(renderer.stats().nodes, 3);
        assert_eq!(renderer.stats().handlers, 1 + 3 * HANDLERS_PER_ELEMENT);
    }

    #[test]
    fn test_flash_survives_rerender() {
        let mut renderer = VectorRenderer::new();
        renderer.attach();
        renderer.render(&scene(&["A"]));
        renderer.update_nodes(&[NodeDelta::new("A", None, 5.0)]);
        renderer.render(&scene(&["A"]));
        assert_eq!(renderer.stats().pending_effects, 1);
    }

    #[test]
    fn test_detached_ignores_render() {
        let mut renderer = VectorRenderer::new();
        renderer.render(&scene(&["A"]));
        assert_eq!(renderer.stats(), RenderStats::default());
    }
}
