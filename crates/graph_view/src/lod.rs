//! # Level of Detail
//!
//! Folds large graphs into per-group clusters so that the visible scene
//! stays small enough to draw and lay out.
//!
//! Clustering, per semantic group:
//!
//! 1. A group with at most `2 * min_cluster_size` members becomes one
//!    cluster.
//! 2. Otherwise members are bucketed into a uniform grid of
//!    `cluster_radius` cells over their layout coordinates. Cells holding at
//!    least `min_cluster_size` members become clusters; each undersized cell
//!    joins the cluster whose centroid is nearest to its own. Cells are
//!    visited in grid order, so the result depends only on positions.
//! 3. A group with no qualifying cell becomes one cluster.
//!
//! Every node belongs to exactly one cluster. Expanded clusters show their
//! members; edges are routed to whatever currently represents each endpoint.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use graph_core::{ComputationGraph, GraphEdge, GraphError, GraphNode, NodeGroup, Position};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::scene::{SceneEdge, SceneGraph, SceneNode};

/// Level-of-detail tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodConfig {
    /// Node count above which LOD switches on automatically
    pub threshold: usize,
    /// Smallest grid cell that forms its own cluster
    pub min_cluster_size: usize,
    /// Grid cell size in world units
    pub cluster_radius: f64,
    /// Whether loading a large graph enables LOD by itself
    pub auto_enable: bool,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            threshold: 10_000,
            min_cluster_size: 5,
            cluster_radius: 50.0,
            auto_enable: true,
        }
    }
}

/// A group of nodes drawn as one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    /// `cluster_<group>_<n>`
    pub id: String,
    /// Member node IDs
    pub member_ids: BTreeSet<String>,
    /// Group shared by all members
    pub group: NodeGroup,
    /// Mean member position, or wherever the layout has since moved it
    pub centroid: Position,
    /// Whether members are shown instead of the cluster
    pub expanded: bool,
}

impl Cluster {
    /// Number of member nodes.
    pub fn member_count(&self) -> usize {
        self.member_ids.len()
    }
}

fn centroid(nodes: &[&GraphNode]) -> Position {
    if nodes.is_empty() {
        return Position::default();
    }
    let (sx, sy) = nodes.iter().fold((0.0, 0.0), |(sx, sy), n| {
        let p = n.position.unwrap_or_default();
        (sx + p.x, sy + p.y)
    });
    let n = nodes.len() as f64;
    Position::new(sx / n, sy / n)
}

fn cell_of(position: Position, size: f64) -> (i64, i64) {
    ((position.x / size).floor() as i64, (position.y / size).floor() as i64)
}

/// Split one group's members into cluster member lists.
fn cluster_group<'a>(members: Vec<&'a GraphNode>, config: &LodConfig) -> Vec<Vec<&'a GraphNode>> {
    if members.len() <= 2 * config.min_cluster_size {
        return vec![members];
    }

    let mut cells: BTreeMap<(i64, i64), Vec<&GraphNode>> = BTreeMap::new();
    for &node in &members {
        cells
            .entry(cell_of(node.position.unwrap_or_default(), config.cluster_radius))
            .or_default()
            .push(node);
    }

    let (mut full, undersized): (Vec<_>, Vec<_>) = cells
        .into_values()
        .partition(|cell| cell.len() >= config.min_cluster_size);
    if full.is_empty() {
        return vec![members];
    }

    let anchors: Vec<Position> = full.iter().map(|cell| centroid(cell)).collect();
    for cell in undersized {
        let here = centroid(&cell);
        let mut nearest = 0;
        let mut best = f64::INFINITY;
        for (i, anchor) in anchors.iter().enumerate() {
            let d = here.distance_to(anchor);
            if d < best {
                best = d;
                nearest = i;
            }
        }
        full[nearest].extend(cell);
    }
    full
}

/// Compute clusters for a snapshot. Groups are visited in [`NodeGroup`]
/// order.
pub fn build_clusters(graph: &ComputationGraph, config: &LodConfig) -> Vec<Cluster> {
    let mut by_group: BTreeMap<NodeGroup, Vec<&GraphNode>> = BTreeMap::new();
    for node in &graph.nodes {
        by_group.entry(node.group).or_default().push(node);
    }

    let mut clusters = Vec::new();
    for (group, members) in by_group {
        for (n, members) in cluster_group(members, config).into_iter().enumerate() {
            clusters.push(Cluster {
                id: format!("cluster_{}_{}", group.as_str(), n),
                member_ids: members.iter().map(|m| m.id.clone()).collect(),
                group,
                centroid: centroid(&members),
                expanded: false,
            });
        }
    }
    clusters
}

/// Level-of-detail state for one displayed snapshot.
#[derive(Debug, Clone, Default)]
pub struct LodEngine {
    config: LodConfig,
    clusters: Vec<Cluster>,
    by_id: HashMap<String, usize>,
    membership: HashMap<String, usize>,
    active: bool,
}

impl LodEngine {
    /// Inactive engine.
    pub fn new(config: LodConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Tuning in use.
    pub fn config(&self) -> &LodConfig {
        &self.config
    }

    /// Whether clusters are in effect.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether a graph of `node_count` nodes should switch LOD on by itself.
    pub fn should_auto_enable(&self, node_count: usize) -> bool {
        self.config.auto_enable && node_count > self.config.threshold
    }

    /// Cluster `graph` from scratch, collapsing everything. Returns the
    /// number of clusters.
    pub fn enable(&mut self, graph: &ComputationGraph) -> usize {
        self.clusters = build_clusters(graph, &self.config);
        self.by_id = self
            .clusters
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();
        self.membership = self
            .clusters
            .iter()
            .enumerate()
            .flat_map(|(i, c)| c.member_ids.iter().map(move |id| (id.clone(), i)))
            .collect();
        self.active = true;

        info!(
            nodes = graph.nodes.len(),
            clusters = self.clusters.len(),
            "Level of detail enabled"
        );
        self.clusters.len()
    }

    /// Drop all clusters; the full graph is shown again.
    pub fn disable(&mut self) {
        if self.active {
            info!("Level of detail disabled");
        }
        self.clusters.clear();
        self.by_id.clear();
        self.membership.clear();
        self.active = false;
    }

    /// Current clusters.
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Look up a cluster.
    pub fn cluster(&self, id: &str) -> Option<&Cluster> {
        self.by_id.get(id).map(|&i| &self.clusters[i])
    }

    /// Cluster a node belongs to.
    pub fn cluster_of(&self, node_id: &str) -> Option<&Cluster> {
        self.membership.get(node_id).map(|&i| &self.clusters[i])
    }

    fn set_expanded(&mut self, id: &str, expanded: bool) -> Result<bool, GraphError> {
        let &i = self
            .by_id
            .get(id)
            .ok_or_else(|| GraphError::ClusterNotFound(id.to_string()))?;
        let cluster = &mut self.clusters[i];
        if cluster.expanded == expanded {
            return Ok(false);
        }
        cluster.expanded = expanded;
        debug!(cluster = %id, expanded, members = cluster.member_count(), "Cluster toggled");
        Ok(true)
    }

    /// Show a cluster's members instead of the cluster. Returns whether
    /// anything changed.
    ///
    /// # Errors
    ///
    /// `ClusterNotFound` for an unknown id.
    pub fn expand(&mut self, id: &str) -> Result<bool, GraphError> {
        self.set_expanded(id, true)
    }

    /// Fold a cluster's members back into the cluster. Returns whether
    /// anything changed.
    ///
    /// # Errors
    ///
    /// `ClusterNotFound` for an unknown id.
    pub fn collapse(&mut self, id: &str) -> Result<bool, GraphError> {
        self.set_expanded(id, false)
    }

    /// Cluster currently standing in for `node_id`, if it is folded away.
    pub fn collapsed_cluster(&self, node_id: &str) -> Option<&str> {
        if !self.active {
            return None;
        }
        self.cluster_of(node_id)
            .filter(|c| !c.expanded)
            .map(|c| c.id.as_str())
    }

    /// Visible ID for each node of `path`, with consecutive repeats merged.
    pub fn map_path(&self, path: &[String]) -> Vec<String> {
        let mut mapped: Vec<String> = Vec::with_capacity(path.len());
        for id in path {
            let visible = self.collapsed_cluster(id).unwrap_or(id.as_str());
            if mapped.last().map(String::as_str) != Some(visible) {
                mapped.push(visible.to_string());
            }
        }
        mapped
    }

    /// Move collapsed clusters to positions computed by the layout.
    pub fn update_centroids(&mut self, positions: &HashMap<String, Position>) {
        for cluster in self.clusters.iter_mut().filter(|c| !c.expanded) {
            if let Some(&p) = positions.get(&cluster.id) {
                cluster.centroid = p;
            }
        }
    }

    /// Edges between clusters, ignoring expansion: endpoints mapped through
    /// membership, self-loops dropped, parallel edges merged with the count
    /// as weight.
    pub fn cluster_edges(&self, graph: &ComputationGraph) -> Vec<GraphEdge> {
        let mut edges: Vec<GraphEdge> = Vec::new();
        let mut index: HashMap<(usize, usize), usize> = HashMap::new();
        for edge in graph.valid_edges() {
            let (Some(&s), Some(&t)) = (
                self.membership.get(&edge.source),
                self.membership.get(&edge.target),
            ) else {
                continue;
            };
            if s == t {
                continue;
            }
            match index.get(&(s, t)) {
                Some(&i) => edges[i].weight += 1.0,
                None => {
                    index.insert((s, t), edges.len());
                    edges.push(GraphEdge::new(
                        self.clusters[s].id.clone(),
                        self.clusters[t].id.clone(),
                    ));
                }
            }
        }
        edges
    }

    /// Scene for `graph` at the current level of detail.
    ///
    /// Inactive: the full graph. Active: visible nodes (members of expanded
    /// clusters and nodes outside any cluster) followed by collapsed
    /// clusters. Edges between two visible nodes keep their weight; edges
    /// touching a collapsed cluster are merged per endpoint pair with the
    /// count as weight; edges inside one collapsed cluster are dropped.
    pub fn scene(&self, graph: &ComputationGraph) -> SceneGraph {
        if !self.active {
            return SceneGraph::from_graph(graph);
        }

        let mut scene = SceneGraph::default();
        for node in &graph.nodes {
            if self.collapsed_cluster(&node.id).is_none() {
                scene.nodes.push(SceneNode::from_node(node));
            }
        }
        for cluster in self.clusters.iter().filter(|c| !c.expanded) {
            scene.nodes.push(SceneNode::cluster(
                cluster.id.clone(),
                cluster.group,
                cluster.centroid,
                cluster.member_count(),
            ));
        }

        let mut merged: HashMap<(String, String), usize> = HashMap::new();
        for edge in graph.valid_edges() {
            let from = self.collapsed_cluster(&edge.source);
            let to = self.collapsed_cluster(&edge.target);
            if from.is_none() && to.is_none() {
                scene.edges.push(SceneEdge {
                    source: edge.source.clone(),
                    target: edge.target.clone(),
                    weight: edge.weight,
                    highlighted: false,
                });
                continue;
            }

            let source = from.unwrap_or(edge.source.as_str());
            let target = to.unwrap_or(edge.target.as_str());
            if source == target {
                continue;
            }
            let key = (source.to_string(), target.to_string());
            match merged.get(&key) {
                Some(&i) => scene.edges[i].weight += 1.0,
                None => {
                    merged.insert(key, scene.edges.len());
                    scene.edges.push(SceneEdge {
                        source: source.to_string(),
                        target: target.to_string(),
                        weight: 1.0,
                        highlighted: false,
                    });
                }
            }
        }
        scene
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_core::{GraphBuilder, NodeType};

    fn node(id: &str, group: NodeGroup, x: f64, y: f64) -> GraphNode {
        GraphNode::new(id, NodeType::Add, id, group).at(x, y)
    }

    fn config() -> LodConfig {
        LodConfig::default()
    }

    mod clustering_tests {
        use super::*;

        #[test]
        fn test_small_group_is_one_cluster() {
            let mut builder = GraphBuilder::new();
            for i in 0..10 {
                builder.add_node(node(&format!("I{}", i), NodeGroup::Input, i as f64 * 500.0, 0.0));
            }
            let clusters = build_clusters(&builder.build(None), &config());
            assert_eq!(clusters.len(), 1);
            assert_eq!(clusters[0].id, "cluster_input_0");
            assert_eq!(clusters[0].member_count(), 10);
        }

        #[test]
        fn test_grid_cells_and_nearest_merge() {
            let mut builder = GraphBuilder::new();
            for i in 0..6 {
                let offset = i as f64;
                let group = NodeGroup::Intermediate;
                builder.add_node(node(&format!("A{}", i), group, 10.0 + offset, 10.0));
                builder.add_node(node(&format!("B{}", i), group, 510.0 + offset, 510.0));
            }
            // stragglers in their own cells, each nearest one of the blocks
            builder.add_node(node("NEAR_A", NodeGroup::Intermediate, 70.0, 10.0));
            builder.add_node(node("NEAR_B", NodeGroup::Intermediate, 460.0, 510.0));
            let clusters = build_clusters(&builder.build(None), &config());

            assert_eq!(clusters.len(), 2);
            let a = clusters.iter().find(|c| c.member_ids.contains("A0")).unwrap();
            let b = clusters.iter().find(|c| c.member_ids.contains("B0")).unwrap();
            assert!(a.member_ids.contains("NEAR_A"));
            assert!(b.member_ids.contains("NEAR_B"));
            assert_eq!(a.member_count() + b.member_count(), 14);
        }

        #[test]
        fn test_no_qualifying_cell_is_one_cluster() {
            let mut builder = GraphBuilder::new();
            for i in 0..11 {
                let x = i as f64 * 100.0;
                builder.add_node(node(&format!("S{}", i), NodeGroup::Output, x, 0.0));
            }
            let clusters = build_clusters(&builder.build(None), &config());
            assert_eq!(clusters.len(), 1);
            assert_eq!(clusters[0].member_count(), 11);
        }

        #[test]
        fn test_groups_never_mix() {
            let mut builder = GraphBuilder::new();
            builder.add_node(node("I", NodeGroup::Input, 0.0, 0.0));
            builder.add_node(node("O", NodeGroup::Output, 0.0, 0.0));
            let clusters = build_clusters(&builder.build(None), &config());
            assert_eq!(clusters.len(), 2);
            assert!(clusters.iter().all(|c| c.member_count() == 1));
        }
    }

    mod engine_tests {
        use super::*;

        /// Two input nodes feeding two intermediates feeding one output.
        fn graph() -> ComputationGraph {
            let mut builder = GraphBuilder::new();
            builder.add_node(node("I1", NodeGroup::Input, 0.0, 0.0));
            builder.add_node(node("I2", NodeGroup::Input, 10.0, 0.0));
            builder.add_node(node("M1", NodeGroup::Intermediate, 0.0, 80.0));
            builder.add_node(node("M2", NodeGroup::Intermediate, 10.0, 80.0));
            builder.add_node(node("O", NodeGroup::Output, 5.0, 160.0));
            let edges = [
                ("I1", "M1"),
                ("I2", "M1"),
                ("I2", "M2"),
                ("I1", "I2"),
                ("M1", "O"),
                ("M2", "O"),
            ];
            for (s, t) in edges {
                builder.add_edge(GraphEdge::new(s, t));
            }
            builder.build(None)
        }

        #[test]
        fn test_cluster_edges_aggregate() {
            let graph = graph();
            let mut lod = LodEngine::new(config());
            assert_eq!(lod.enable(&graph), 3);

            let edges = lod.cluster_edges(&graph);
            assert_eq!(edges.len(), 2);
            assert_eq!(edges[0].source, "cluster_input_0");
            assert_eq!(edges[0].target, "cluster_intermediate_0");
            assert_eq!(edges[0].weight, 3.0);
            assert_eq!(edges[1].weight, 2.0);
        }

        #[test]
        fn test_expand_reconnects_members() {
            let graph = graph();
            let mut lod = LodEngine::new(config());
            lod.enable(&graph);
            assert_eq!(lod.scene(&graph).node_count(), 3);

            assert!(lod.expand("cluster_intermediate_0").unwrap());
            assert!(!lod.expand("cluster_intermediate_0").unwrap());

            let scene = lod.scene(&graph);
            assert_eq!(scene.node_count(), 4);
            assert!(scene.find("M1").is_some());
            let pairs = scene.edge_pairs();
            assert!(pairs.contains(&("cluster_input_0", "M1")));
            assert!(pairs.contains(&("cluster_input_0", "M2")));
            assert!(pairs.contains(&("M1", "cluster_output_0")));
            let into_m1 = scene
                .edges
                .iter()
                .find(|e| e.source == "cluster_input_0" && e.target == "M1")
                .map(|e| e.weight);
            assert_eq!(into_m1, Some(2.0));

            assert!(lod.collapse("cluster_intermediate_0").unwrap());
            assert_eq!(lod.scene(&graph).node_count(), 3);
        }

        #[test]
        fn test_expand_all_shows_original_edges() {
            let graph = graph();
            let mut lod = LodEngine::new(config());
            lod.enable(&graph);
            let ids: Vec<String> = lod.clusters().iter().map(|c| c.id.clone()).collect();
            for id in &ids {
                lod.expand(id).unwrap();
            }
            assert_eq!(lod.scene(&graph), SceneGraph::from_graph(&graph));
        }

        #[test]
        fn test_unknown_cluster() {
            let mut lod = LodEngine::new(config());
            assert_eq!(
                lod.expand("cluster_nope_0"),
                Err(GraphError::ClusterNotFound("cluster_nope_0".to_string()))
            );
        }

        #[test]
        fn test_map_path_merges_repeats() {
            let graph = graph();
            let mut lod = LodEngine::new(config());
            let path: Vec<String> = ["I1", "I2", "M2", "O"].iter().map(|s| s.to_string()).collect();
            assert_eq!(lod.map_path(&path), path);

            lod.enable(&graph);
            assert_eq!(
                lod.map_path(&path),
                vec!["cluster_input_0", "cluster_intermediate_0", "cluster_output_0"]
            );
        }

        #[test]
        fn test_disable_restores_full_scene() {
            let graph = graph();
            let mut lod = LodEngine::new(config());
            lod.enable(&graph);
            lod.disable();
            assert!(!lod.is_active());
            assert!(lod.clusters().is_empty());
            assert_eq!(lod.scene(&graph), SceneGraph::from_graph(&graph));
        }

        #[test]
        fn test_auto_enable_threshold() {
            let lod = LodEngine::new(config());
            assert!(!lod.should_auto_enable(10_000));
            assert!(lod.should_auto_enable(10_001));

            let manual = LodEngine::new(LodConfig {
                auto_enable: false,
                ..config()
            });
            assert!(!manual.should_auto_enable(50_000));
        }

        #[test]
        fn test_update_centroids() {
            let graph = graph();
            let mut lod = LodEngine::new(config());
            lod.enable(&graph);
            let moved: HashMap<String, Position> =
                [("cluster_output_0".to_string(), Position::new(1.0, 2.0))].into_iter().collect();
            lod.update_centroids(&moved);
            assert_eq!(
                lod.cluster("cluster_output_0").map(|c| c.centroid),
                Some(Position::new(1.0, 2.0))
            );
        }
    }
}
