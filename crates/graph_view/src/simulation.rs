//! # Force-Directed Layout
//!
//! A velocity-Verlet style simulation in the manner of d3-force. Each tick
//! applies four forces and then integrates:
//!
//! - **link**: springs toward `link_distance`, strength `1 / min(degree)`,
//!   split between the endpoints by degree
//! - **charge**: pairwise repulsion over all node pairs, approximated with a
//!   Barnes-Hut quadtree once the graph is large
//! - **collision**: pushes apart nodes closer than twice the collision radius
//! - **centering**: translates the centre of mass onto the viewport centre
//!
//! The temperature (`alpha`) decays geometrically from 1 toward
//! `alpha_target`; the simulation is converged once `alpha < alpha_min`.
//! Dragging raises `alpha_target` so the layout keeps reacting while a node
//! is held.

use std::collections::HashMap;
use std::f64::consts::PI;

use graph_core::{ComputationGraph, Position};
use serde::{Deserialize, Serialize};

use crate::quadtree::QuadNode;
use crate::render_mode::RenderMode;
use crate::scene::SceneGraph;

/// Node count from which charge is approximated instead of summed exactly.
const BARNES_HUT_MIN_NODES: usize = 1_000;

/// Barnes-Hut opening criterion.
const THETA: f64 = 0.9;

/// Fraction of overlap resolved per tick by the collision force.
const COLLISION_STRENGTH: f64 = 0.7;

/// `alpha_target` while a node is being dragged.
const DRAG_ALPHA_TARGET: f64 = 0.3;

/// Layout tuning parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Rest length of link springs
    pub link_distance: f64,
    /// Charge per node; negative values repel
    pub charge_strength: f64,
    /// Collision radius used with the vector backend
    pub vector_collision_radius: f64,
    /// Collision radius used with the raster backend
    pub raster_collision_radius: f64,
    /// Viewport width, for the centering force
    pub width: f64,
    /// Viewport height, for the centering force
    pub height: f64,
    /// Ticks for alpha to decay from 1 to `alpha_min`
    pub max_ticks: usize,
    /// Convergence threshold for alpha
    pub alpha_min: f64,
    /// Fraction of velocity lost per tick
    pub velocity_decay: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            link_distance: 80.0,
            charge_strength: -300.0,
            vector_collision_radius: 30.0,
            raster_collision_radius: 15.0,
            width: 960.0,
            height: 600.0,
            max_ticks: 300,
            alpha_min: 0.001,
            velocity_decay: 0.4,
        }
    }
}

impl LayoutConfig {
    /// Per-tick decay so that alpha reaches `alpha_min` after `max_ticks`.
    pub fn alpha_decay(&self) -> f64 {
        1.0 - self.alpha_min.powf(1.0 / self.max_ticks.max(1) as f64)
    }

    /// Viewport centre.
    pub fn center(&self) -> Position {
        Position::new(self.width / 2.0, self.height / 2.0)
    }

    /// Collision radius for a rendering mode.
    pub fn collision_radius(&self, mode: RenderMode) -> f64 {
        match mode {
            RenderMode::Vector => self.vector_collision_radius,
            RenderMode::Raster => self.raster_collision_radius,
        }
    }
}

#[derive(Debug, Clone)]
struct Body {
    id: String,
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
    fixed: Option<Position>,
}

#[derive(Debug, Clone, Copy)]
struct Link {
    source: usize,
    target: usize,
    strength: f64,
    bias: f64,
}

/// Tiny deterministic displacement used when two nodes coincide.
fn jiggle(seed: usize) -> f64 {
    ((seed.wrapping_mul(7919) % 1000) as f64 + 1.0) * 1e-6
}

/// Force-directed layout shared by both rendering backends.
#[derive(Debug, Clone)]
pub struct ForceSimulation {
    config: LayoutConfig,
    bodies: Vec<Body>,
    index: HashMap<String, usize>,
    links: Vec<Link>,
    collision_radius: f64,
    alpha: f64,
    alpha_target: f64,
    ticks: usize,
}

impl ForceSimulation {
    /// Empty simulation using the vector-mode collision radius.
    pub fn new(config: LayoutConfig) -> Self {
        let collision_radius = config.collision_radius(RenderMode::Vector);
        Self {
            config,
            bodies: Vec::new(),
            index: HashMap::new(),
            links: Vec::new(),
            collision_radius,
            alpha: 1.0,
            alpha_target: 0.0,
            ticks: 0,
        }
    }

    /// Layout parameters.
    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Replace the simulated nodes and links.
    ///
    /// Nodes already simulated keep their position, velocity and pin. New
    /// nodes start at their given position, or on a phyllotaxis spiral
    /// around the viewport centre. Links with an unknown endpoint are
    /// ignored. The simulation is reheated.
    pub fn set_nodes<N, L>(&mut self, nodes: N, links: L)
    where
        N: IntoIterator<Item = (String, Option<Position>)>,
        L: IntoIterator<Item = (String, String)>,
    {
        let center = self.config.center();
        let mut previous: HashMap<String, Body> = self
            .bodies
            .drain(..)
            .map(|b| (b.id.clone(), b))
            .collect();

        self.index.clear();
        for (i, (id, position)) in nodes.into_iter().enumerate() {
            if self.index.contains_key(&id) {
                continue;
            }
            let body = previous.remove(&id).unwrap_or_else(|| {
                let (x, y) = match position {
                    Some(p) => (p.x, p.y),
                    None => {
                        let radius = 10.0 * (0.5 + i as f64).sqrt();
                        let angle = i as f64 * PI * (3.0 - 5f64.sqrt());
                        (center.x + radius * angle.cos(), center.y + radius * angle.sin())
                    }
                };
                Body {
                    id: id.clone(),
                    x,
                    y,
                    vx: 0.0,
                    vy: 0.0,
                    fixed: None,
                }
            });
            self.index.insert(id, self.bodies.len());
            self.bodies.push(body);
        }

        let mut endpoints = Vec::new();
        let mut degree = vec![0usize; self.bodies.len()];
        for (source, target) in links {
            if let (Some(&s), Some(&t)) = (self.index.get(&source), self.index.get(&target)) {
                degree[s] += 1;
                degree[t] += 1;
                endpoints.push((s, t));
            }
        }
        self.links = endpoints
            .into_iter()
            .map(|(source, target)| {
                let (ds, dt) = (degree[source] as f64, degree[target] as f64);
                Link {
                    source,
                    target,
                    strength: 1.0 / ds.min(dt),
                    bias: ds / (ds + dt),
                }
            })
            .collect();

        self.restart();
    }

    /// Simulate a full-detail snapshot.
    pub fn set_graph(&mut self, graph: &ComputationGraph) {
        self.set_nodes(
            graph.nodes.iter().map(|n| (n.id.clone(), n.position)),
            graph
                .valid_edges()
                .map(|e| (e.source.clone(), e.target.clone())),
        );
    }

    /// Simulate whatever a scene shows (clusters included).
    pub fn set_scene(&mut self, scene: &SceneGraph) {
        self.set_nodes(
            scene.nodes.iter().map(|n| (n.id.clone(), Some(n.position))),
            scene
                .edges
                .iter()
                .map(|e| (e.source.clone(), e.target.clone())),
        );
    }

    /// Switch the collision radius to the one configured for `mode`.
    pub fn set_mode(&mut self, mode: RenderMode) {
        self.collision_radius = self.config.collision_radius(mode);
    }

    /// Current collision radius.
    pub fn collision_radius(&self) -> f64 {
        self.collision_radius
    }

    /// Reset the temperature to 1.
    pub fn restart(&mut self) {
        self.alpha = 1.0;
    }

    /// Current temperature.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Ticks run since creation.
    pub fn ticks(&self) -> usize {
        self.ticks
    }

    /// Number of simulated nodes.
    pub fn node_count(&self) -> usize {
        self.bodies.len()
    }

    /// Whether another tick would move anything.
    pub fn is_running(&self) -> bool {
        self.alpha >= self.config.alpha_min
    }

    /// Advance one step. Returns `false` once converged.
    pub fn tick(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.alpha += (self.alpha_target - self.alpha) * self.config.alpha_decay();

        self.apply_links();
        self.apply_charge();
        self.apply_collision();
        self.apply_centering();
        self.integrate();

        self.ticks += 1;
        true
    }

    /// Tick until converged or `max_ticks` steps have run. Returns the
    /// number of ticks performed.
    pub fn run(&mut self, max_ticks: usize) -> usize {
        let mut performed = 0;
        while performed < max_ticks && self.tick() {
            performed += 1;
        }
        performed
    }

    /// Position of one node.
    pub fn position(&self, id: &str) -> Option<Position> {
        self.index
            .get(id)
            .map(|&i| Position::new(self.bodies[i].x, self.bodies[i].y))
    }

    /// Positions of all nodes.
    pub fn positions(&self) -> HashMap<String, Position> {
        self.bodies
            .iter()
            .map(|b| (b.id.clone(), Position::new(b.x, b.y)))
            .collect()
    }

    /// Fix a node at `position` until [`unpin`](Self::unpin).
    pub fn pin(&mut self, id: &str, position: Position) -> bool {
        match self.index.get(id) {
            Some(&i) => {
                let body = &mut self.bodies[i];
                body.fixed = Some(position);
                body.x = position.x;
                body.y = position.y;
                true
            }
            None => false,
        }
    }

    /// Release a pinned node.
    pub fn unpin(&mut self, id: &str) -> bool {
        match self.index.get(id) {
            Some(&i) => self.bodies[i].fixed.take().is_some(),
            None => false,
        }
    }

    /// Whether a node is currently pinned.
    pub fn is_pinned(&self, id: &str) -> bool {
        self.index
            .get(id)
            .is_some_and(|&i| self.bodies[i].fixed.is_some())
    }

    /// Begin dragging: pin the node where it is and keep the layout warm.
    pub fn drag_start(&mut self, id: &str) -> bool {
        let Some(current) = self.position(id) else {
            return false;
        };
        self.alpha_target = DRAG_ALPHA_TARGET;
        self.alpha = self.alpha.max(self.config.alpha_min);
        self.pin(id, current)
    }

    /// Move a dragged node.
    pub fn drag_to(&mut self, id: &str, position: Position) -> bool {
        self.pin(id, position)
    }

    /// Release a dragged node and let the layout cool.
    pub fn drag_end(&mut self, id: &str) -> bool {
        self.alpha_target = 0.0;
        self.unpin(id)
    }

    fn apply_links(&mut self) {
        let alpha = self.alpha;
        let distance = self.config.link_distance;
        for (k, link) in self.links.iter().enumerate() {
            let (s, t) = (&self.bodies[link.source], &self.bodies[link.target]);
            let mut x = t.x + t.vx - s.x - s.vx;
            let mut y = t.y + t.vy - s.y - s.vy;
            if x == 0.0 && y == 0.0 {
                x = jiggle(k);
                y = jiggle(k + 1);
            }
            let length = (x * x + y * y).sqrt();
            let scale = (length - distance) / length * alpha * link.strength;
            x *= scale;
            y *= scale;

            let target = &mut self.bodies[link.target];
            target.vx -= x * link.bias;
            target.vy -= y * link.bias;
            let source = &mut self.bodies[link.source];
            source.vx += x * (1.0 - link.bias);
            source.vy += y * (1.0 - link.bias);
        }
    }

    fn apply_charge(&mut self) {
        let strength = self.config.charge_strength * self.alpha;
        let n = self.bodies.len();
        if n >= BARNES_HUT_MIN_NODES {
            let points: Vec<(f64, f64)> = self.bodies.iter().map(|b| (b.x, b.y)).collect();
            if let Some(tree) = QuadNode::build(&points) {
                for (i, body) in self.bodies.iter_mut().enumerate() {
                    let (dvx, dvy) = tree.force_on(i, &points, THETA, strength);
                    body.vx += dvx;
                    body.vy += dvy;
                }
                return;
            }
        }

        for i in 0..n {
            for j in (i + 1)..n {
                let mut dx = self.bodies[j].x - self.bodies[i].x;
                let mut dy = self.bodies[j].y - self.bodies[i].y;
                if dx == 0.0 && dy == 0.0 {
                    dx = jiggle(i + j);
                    dy = jiggle(i * n + j);
                }
                let mut l = dx * dx + dy * dy;
                if l < 1.0 {
                    l = l.sqrt();
                }
                let w = strength / l;
                self.bodies[i].vx += dx * w;
                self.bodies[i].vy += dy * w;
                self.bodies[j].vx -= dx * w;
                self.bodies[j].vy -= dy * w;
            }
        }
    }

    fn apply_collision(&mut self) {
        let reach = self.collision_radius * 2.0;
        if reach <= 0.0 {
            return;
        }

        // bucket predicted positions into cells one reach wide; only
        // neighbouring cells can overlap
        let cell = |x: f64, y: f64| ((x / reach).floor() as i64, (y / reach).floor() as i64);
        let mut grid: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
        for (i, b) in self.bodies.iter().enumerate() {
            grid.entry(cell(b.x + b.vx, b.y + b.vy)).or_default().push(i);
        }

        for i in 0..self.bodies.len() {
            let (cx, cy) = {
                let b = &self.bodies[i];
                cell(b.x + b.vx, b.y + b.vy)
            };
            for gx in (cx - 1)..=(cx + 1) {
                for gy in (cy - 1)..=(cy + 1) {
                    let Some(bucket) = grid.get(&(gx, gy)) else {
                        continue;
                    };
                    for &j in bucket {
                        if j <= i {
                            continue;
                        }
                        self.collide_pair(i, j, reach);
                    }
                }
            }
        }
    }

    fn collide_pair(&mut self, i: usize, j: usize, reach: f64) {
        let (a, b) = (&self.bodies[i], &self.bodies[j]);
        let mut x = a.x + a.vx - b.x - b.vx;
        let mut y = a.y + a.vy - b.y - b.vy;
        let mut l = x * x + y * y;
        if l >= reach * reach {
            return;
        }
        if x == 0.0 && y == 0.0 {
            x = jiggle(i + j);
            y = jiggle(j);
            l = x * x + y * y;
        }
        let length = l.sqrt();
        let scale = (reach - length) / length * COLLISION_STRENGTH * 0.5;
        x *= scale;
        y *= scale;
        self.bodies[i].vx += x;
        self.bodies[i].vy += y;
        self.bodies[j].vx -= x;
        self.bodies[j].vy -= y;
    }

    fn apply_centering(&mut self) {
        if self.bodies.is_empty() {
            return;
        }
        let n = self.bodies.len() as f64;
        let center = self.config.center();
        let (sx, sy) = self
            .bodies
            .iter()
            .fold((0.0, 0.0), |(sx, sy), b| (sx + b.x, sy + b.y));
        let (shift_x, shift_y) = (sx / n - center.x, sy / n - center.y);
        for body in &mut self.bodies {
            body.x -= shift_x;
            body.y -= shift_y;
        }
    }

    fn integrate(&mut self) {
        let keep = 1.0 - self.config.velocity_decay;
        for body in &mut self.bodies {
            match body.fixed {
                Some(p) => {
                    body.x = p.x;
                    body.y = p.y;
                    body.vx = 0.0;
                    body.vy = 0.0;
                }
                None => {
                    body.vx *= keep;
                    body.vy *= keep;
                    body.x += body.vx;
                    body.y += body.vy;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pair() -> ForceSimulation {
        let mut sim = ForceSimulation::new(LayoutConfig::default());
        sim.set_nodes(
            vec![("A".to_string(), None), ("B".to_string(), None)],
            vec![("A".to_string(), "B".to_string())],
        );
        sim
    }

    mod config_tests {
        use super::*;

        #[test]
        fn test_alpha_decay_reaches_min_after_max_ticks() {
            let config = LayoutConfig::default();
            let after = (1.0 - config.alpha_decay()).powi(config.max_ticks as i32);
            assert_relative_eq!(after, config.alpha_min, max_relative = 1e-9);
        }

        #[test]
        fn test_collision_radius_per_mode() {
            let config = LayoutConfig::default();
            assert_eq!(config.collision_radius(RenderMode::Vector), 30.0);
            assert_eq!(config.collision_radius(RenderMode::Raster), 15.0);
        }
    }

    mod convergence_tests {
        use super::*;

        #[test]
        fn test_converges() {
            let mut sim = pair();
            let ticks = sim.run(10_000);

            assert!(ticks <= 310, "took {} ticks", ticks);
            assert!(!sim.is_running());
            assert!(!sim.tick());

            let a = sim.position("A").unwrap();
            let b = sim.position("B").unwrap();
            assert!(a.x.is_finite() && a.y.is_finite());
            assert!(a.distance_to(&b) > 1.0);
        }

        #[test]
        fn test_centre_of_mass_at_viewport_centre() {
            let mut sim = pair();
            sim.run(10_000);
            let center = sim.config().center();
            let positions = sim.positions();
            let (sx, sy) = positions.values().fold((0.0, 0.0), |(x, y), p| (x + p.x, y + p.y));
            assert!((sx / 2.0 - center.x).abs() < 5.0);
            assert!((sy / 2.0 - center.y).abs() < 5.0);
        }

        #[test]
        fn test_coincident_nodes_separate() {
            let mut sim = ForceSimulation::new(LayoutConfig::default());
            let at = Some(Position::new(100.0, 100.0));
            sim.set_nodes(
                vec![("A".to_string(), at), ("B".to_string(), at)],
                Vec::new(),
            );
            sim.run(10_000);
            let a = sim.position("A").unwrap();
            let b = sim.position("B").unwrap();
            assert!(a.distance_to(&b) > sim.collision_radius());
        }
    }

    mod large_graph_tests {
        use super::*;
        use graph_core::layered_graph;

        #[test]
        fn test_barnes_hut_path_stays_finite() {
            let graph = layered_graph(BARNES_HUT_MIN_NODES + 200, 5, 11).unwrap();
            let mut sim = ForceSimulation::new(LayoutConfig::default());
            sim.set_graph(&graph);
            assert_eq!(sim.run(15), 15);

            let positions = sim.positions();
            assert_eq!(positions.len(), graph.nodes.len());
            assert!(positions.values().all(|p| p.x.is_finite() && p.y.is_finite()));
        }
    }

    mod interaction_tests {
        use super::*;

        #[test]
        fn test_pinned_node_stays() {
            let mut sim = pair();
            let spot = Position::new(10.0, 20.0);
            assert!(sim.pin("A", spot));
            sim.run(50);
            assert_eq!(sim.position("A"), Some(spot));
            assert!(sim.unpin("A"));
            assert!(!sim.pin("MISSING", spot));
        }

        #[test]
        fn test_drag_reheats_and_releases() {
            let mut sim = pair();
            sim.run(10_000);
            assert!(!sim.is_running());

            assert!(sim.drag_start("A"));
            assert!(sim.is_running());
            assert!(sim.is_pinned("A"));

            let target = Position::new(5.0, 5.0);
            sim.drag_to("A", target);
            sim.tick();
            assert_eq!(sim.position("A"), Some(target));

            assert!(sim.drag_end("A"));
            assert!(!sim.is_pinned("A"));
            sim.run(10_000);
            assert!(!sim.is_running());
        }

        #[test]
        fn test_set_nodes_keeps_existing_positions() {
            let mut sim = pair();
            sim.run(20);
            let before = sim.position("A").unwrap();

            sim.set_nodes(
                vec![
                    ("A".to_string(), Some(Position::new(-1.0, -1.0))),
                    ("C".to_string(), Some(Position::new(3.0, 4.0))),
                ],
                vec![("A".to_string(), "C".to_string())],
            );

            assert_eq!(sim.position("A"), Some(before));
            assert_eq!(sim.position("C"), Some(Position::new(3.0, 4.0)));
            assert_eq!(sim.position("B"), None);
            assert_eq!(sim.alpha(), 1.0);
        }
    }
}
