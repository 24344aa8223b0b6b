//! Uniform grid over scene nodes for point queries.

use std::collections::HashMap;

use graph_core::Position;

use crate::scene::SceneNode;

/// Bucket grid keyed by integer cell coordinates.
///
/// Cell size is twice the largest node radius, so a point query only has to
/// look at the 3x3 block of cells around it.
#[derive(Debug, Clone, Default)]
pub struct SpatialGrid {
    cell_size: f64,
    cells: HashMap<(i64, i64), Vec<usize>>,
}

impl SpatialGrid {
    /// Index `nodes` by position. Stored values are indices into `nodes`.
    pub fn build(nodes: &[SceneNode]) -> Self {
        let max_radius = nodes.iter().map(|n| n.radius).fold(0.0, f64::max);
        let cell_size = (max_radius * 2.0).max(1.0);
        let mut cells: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
        for (i, node) in nodes.iter().enumerate() {
            cells
                .entry(Self::key(cell_size, node.position))
                .or_default()
                .push(i);
        }
        Self { cell_size, cells }
    }

    fn key(cell_size: f64, p: Position) -> (i64, i64) {
        ((p.x / cell_size).floor() as i64, (p.y / cell_size).floor() as i64)
    }

    /// Index of the topmost (last drawn) node whose circle contains `point`.
    pub fn query(&self, nodes: &[SceneNode], point: Position) -> Option<usize> {
        if self.cells.is_empty() {
            return None;
        }
        let (cx, cy) = Self::key(self.cell_size, point);
        let mut best: Option<usize> = None;
        for dx in -1..=1 {
            for dy in -1..=1 {
                let Some(bucket) = self.cells.get(&(cx + dx, cy + dy)) else {
                    continue;
                };
                for &i in bucket {
                    let node = &nodes[i];
                    if node.position.distance_to(&point) <= node.radius
                        && best.map_or(true, |b| i > b)
                    {
                        best = Some(i);
                    }
                }
            }
        }
        best
    }

    /// Number of occupied cells.
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_core::{GraphNode, NodeGroup, NodeType};

    fn node(id: &str, x: f64, y: f64) -> SceneNode {
        SceneNode::from_node(
            &GraphNode::new(id, NodeType::Add, id, NodeGroup::Intermediate).at(x, y),
        )
    }

    #[test]
    fn test_query_matches_linear_scan() {
        let nodes: Vec<SceneNode> = (0..200)
            .map(|i| node(&format!("N{}", i), (i % 20) as f64 * 7.0, (i / 20) as f64 * 9.0))
            .collect();
        let grid = SpatialGrid::build(&nodes);

        for x in (-10..150).step_by(3) {
            for y in (-10..100).step_by(4) {
                let p = Position::new(x as f64, y as f64);
                let linear = nodes
                    .iter()
                    .enumerate()
                    .rev()
                    .find(|(_, n)| n.position.distance_to(&p) <= n.radius)
                    .map(|(i, _)| i);
                assert_eq!(grid.query(&nodes, p), linear, "at {:?}", p);
            }
        }
    }

    #[test]
    fn test_empty_grid() {
        let grid = SpatialGrid::build(&[]);
        assert_eq!(grid.query(&[], Position::default()), None);
        assert_eq!(grid.occupied_cells(), 0);
    }
}
