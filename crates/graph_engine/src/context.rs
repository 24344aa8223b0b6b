//! # Engine Context
//!
//! [`EngineContext`] is the one object a host application owns. It holds the
//! manager, the update pipeline, the layout, level of detail and the
//! renderer host, and exposes the entry points a presentation layer calls.
//! Nothing in the engine is global.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use graph_core::{
    critical_path, search_nodes, sensitivity_paths, ComputationGraph, GraphError, GraphUpdate,
    NodeDelta, Position, SearchHit, SensitivityPath,
};
use graph_view::{
    ForceSimulation, LodEngine, RenderMode, RendererHost, SceneGraph, ViewTransform,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::feed::parse_message;
use crate::listener::{EventKind, GraphEvent, ListenerId};
use crate::manager::{GraphManager, SubjectKey};
use crate::pipeline::{BatchReport, HistoryEntry, UpdatePipeline};
use crate::source::{GraphSource, HttpGraphSource};

/// What [`EngineContext::load`] did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSummary {
    /// Loaded key
    pub key: SubjectKey,
    /// Nodes in the snapshot
    pub nodes: usize,
    /// Edges in the snapshot
    pub edges: usize,
    /// Longest chain, in nodes
    pub depth: usize,
    /// Layout ticks run before the first render
    pub layout_ticks: usize,
    /// Cluster count when level of detail switched on automatically
    pub clusters: Option<usize>,
    /// Backend chosen for the first render
    pub render_mode: RenderMode,
}

/// Owned engine state.
pub struct EngineContext {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    manager: GraphManager,
    pipeline: UpdatePipeline,
    layout: ForceSimulation,
    lod: LodEngine,
    host: RendererHost,
    current: Option<SubjectKey>,
    highlight: Option<Vec<String>>,
    scene: SceneGraph,
}

impl EngineContext {
    /// Context over `source`, timed by the tokio clock.
    pub fn new(config: EngineConfig, source: Arc<dyn GraphSource>) -> Self {
        Self::with_clock(config, source, Arc::new(SystemClock::new()))
    }

    /// Context with an explicit clock.
    pub fn with_clock(
        config: EngineConfig,
        source: Arc<dyn GraphSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            manager: GraphManager::new(source),
            pipeline: UpdatePipeline::new(config.pipeline.clone(), Arc::clone(&clock)),
            layout: ForceSimulation::new(config.layout.clone()),
            lod: LodEngine::new(config.lod.clone()),
            host: RendererHost::new(config.render.raster_threshold),
            current: None,
            highlight: None,
            scene: SceneGraph::default(),
            clock,
            config,
        }
    }

    /// Validate `config` and fetch from the HTTP API it names.
    ///
    /// # Errors
    ///
    /// - `Config` when validation fails
    /// - `Fetch` when the HTTP client cannot be built
    pub fn from_config(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let source = HttpGraphSource::from_config(&config.api)?;
        Ok(Self::new(config, Arc::new(source)))
    }

    /// Settings in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Snapshot cache and subscriptions.
    pub fn manager(&self) -> &GraphManager {
        &self.manager
    }

    /// Update batching and history.
    pub fn pipeline(&self) -> &UpdatePipeline {
        &self.pipeline
    }

    /// Level-of-detail state.
    pub fn lod(&self) -> &LodEngine {
        &self.lod
    }

    /// Layout simulation.
    pub fn layout(&self) -> &ForceSimulation {
        &self.layout
    }

    /// Renderer host.
    pub fn renderer(&self) -> &RendererHost {
        &self.host
    }

    /// Scene last handed to the renderer.
    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    /// Key of the displayed graph.
    pub fn current(&self) -> Option<&SubjectKey> {
        self.current.as_ref()
    }

    /// Snapshot of the displayed graph.
    pub fn snapshot(&self) -> Option<&ComputationGraph> {
        self.manager.snapshot(self.current.as_ref()?)
    }

    fn displayed(&self) -> Result<&ComputationGraph, EngineError> {
        self.snapshot().ok_or(EngineError::NotLoaded)
    }

    /// Register a listener on the manager.
    pub fn add_listener<F>(&mut self, kind: EventKind, callback: F) -> ListenerId
    where
        F: FnMut(&GraphEvent) -> anyhow::Result<()> + Send + 'static,
    {
        self.manager.add_listener(kind, callback)
    }

    /// Unregister a listener. Returns whether it existed.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.manager.remove_listener(id)
    }

    /// Fetch and cache a snapshot without displaying it. Returns its node
    /// count.
    ///
    /// Refetching the displayed key redisplays it, so layout and clusters
    /// are rebuilt from the new snapshot.
    ///
    /// # Errors
    ///
    /// `Fetch` when retrieval fails; the cache keeps its previous entry.
    pub async fn prefetch(&mut self, subject_id: Option<&str>) -> Result<usize, EngineError> {
        if self.current == Some(SubjectKey::from_option(subject_id)) {
            return Ok(self.load(subject_id).await?.nodes);
        }
        Ok(self.manager.fetch(subject_id).await?.nodes.len())
    }

    /// Fetch a graph, lay it out and display it.
    ///
    /// Level of detail and any path highlight are reset. Level of detail
    /// switches on by itself above its threshold when auto enable is set.
    ///
    /// # Errors
    ///
    /// `Fetch` when the source fails; what was displayed stays displayed.
    pub async fn load(&mut self, subject_id: Option<&str>) -> Result<LoadSummary, EngineError> {
        let key = SubjectKey::from_option(subject_id);
        let graph = self.manager.fetch(subject_id).await?;
        let (nodes, edges, depth) = (graph.nodes.len(), graph.edges.len(), graph.metadata.depth);

        self.layout
            .set_mode(RenderMode::select(nodes, self.config.render.raster_threshold));
        self.layout.set_graph(graph);
        let layout_ticks = self.layout.run(self.config.layout.max_ticks);
        let positions = self.layout.positions();
        self.manager.update_positions(&key, &positions);

        self.lod.disable();
        self.highlight = None;
        self.current = Some(key.clone());

        let clusters = if self.lod.should_auto_enable(nodes) {
            Some(self.enable_lod()?)
        } else {
            self.refresh();
            None
        };

        info!(
            subject = %key,
            nodes,
            edges,
            layout_ticks,
            mode = %self.host.mode(),
            "Graph displayed"
        );
        Ok(LoadSummary {
            key,
            nodes,
            edges,
            depth,
            layout_ticks,
            clusters,
            render_mode: self.host.mode(),
        })
    }

    /// Rebuild the scene from the displayed snapshot and render it.
    pub fn refresh(&mut self) {
        let mut scene = match self.current.as_ref().and_then(|k| self.manager.snapshot(k)) {
            Some(graph) => self.lod.scene(graph),
            None => SceneGraph::default(),
        };
        if let Some(path) = &self.highlight {
            scene.highlight_path(&self.lod.map_path(path));
        }
        if self.host.render(&scene) {
            self.layout.set_mode(self.host.mode());
        }
        self.scene = scene;
    }

    /// Cluster the displayed graph. Returns the cluster count.
    ///
    /// # Errors
    ///
    /// `NotLoaded` without a displayed graph.
    pub fn enable_lod(&mut self) -> Result<usize, EngineError> {
        let graph = self
            .current
            .as_ref()
            .and_then(|k| self.manager.snapshot(k))
            .ok_or(EngineError::NotLoaded)?;
        let clusters = self.lod.enable(graph);
        self.refresh();
        self.layout.set_scene(&self.scene);
        Ok(clusters)
    }

    /// Show the full graph again. Returns whether clusters were shown.
    pub fn disable_lod(&mut self) -> bool {
        let was_active = self.lod.is_active();
        self.lod.disable();
        self.refresh();
        if let Some(graph) = self.current.as_ref().and_then(|k| self.manager.snapshot(k)) {
            self.layout.set_graph(graph);
        }
        was_active
    }

    /// Flip level of detail. Returns whether it is now on.
    ///
    /// # Errors
    ///
    /// `NotLoaded` when switching on without a displayed graph.
    pub fn toggle_lod(&mut self) -> Result<bool, EngineError> {
        if self.lod.is_active() {
            self.disable_lod();
            Ok(false)
        } else {
            self.enable_lod()?;
            Ok(true)
        }
    }

    /// Show a cluster's members. Returns whether it was collapsed.
    ///
    /// # Errors
    ///
    /// `Graph(ClusterNotFound)` for an unknown cluster.
    pub fn expand_cluster(&mut self, cluster_id: &str) -> Result<bool, EngineError> {
        let changed = self.lod.expand(cluster_id)?;
        self.refresh();
        self.layout.set_scene(&self.scene);
        Ok(changed)
    }

    /// Fold a cluster's members back. Returns whether it was expanded.
    ///
    /// # Errors
    ///
    /// `Graph(ClusterNotFound)` for an unknown cluster.
    pub fn collapse_cluster(&mut self, cluster_id: &str) -> Result<bool, EngineError> {
        let changed = self.lod.collapse(cluster_id)?;
        self.refresh();
        self.layout.set_scene(&self.scene);
        Ok(changed)
    }

    /// Highlight the critical path of the displayed graph, or remove the
    /// highlight if one is shown. Returns the full-detail path when one was
    /// switched on.
    ///
    /// # Errors
    ///
    /// - `NotLoaded` without a displayed graph
    /// - `Graph(Cycle)` when the graph is not a DAG; nothing is highlighted
    pub fn toggle_critical_path(&mut self) -> Result<Option<Vec<String>>, EngineError> {
        if self.highlight.take().is_some() {
            self.refresh();
            return Ok(None);
        }

        let result = critical_path(self.displayed()?);
        match result {
            Ok(path) => {
                debug!(length = path.len(), "Critical path highlighted");
                self.highlight = Some(path.clone());
                self.refresh();
                Ok(Some(path))
            }
            Err(err) => {
                warn!(error = %err, "Critical path unavailable");
                self.refresh();
                Err(GraphError::from(err).into())
            }
        }
    }

    /// Highlighted path as displayed (cluster ids for collapsed members).
    pub fn visible_highlight(&self) -> Option<Vec<String>> {
        self.highlight.as_ref().map(|path| self.lod.map_path(path))
    }

    /// Sensitivity paths of the displayed graph.
    ///
    /// # Errors
    ///
    /// `NotLoaded` without a displayed graph.
    pub fn sensitivity_paths(&self) -> Result<Vec<SensitivityPath>, EngineError> {
        Ok(sensitivity_paths(self.displayed()?))
    }

    /// Fuzzy search over the displayed graph.
    ///
    /// # Errors
    ///
    /// `NotLoaded` without a displayed graph.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, EngineError> {
        Ok(search_nodes(self.displayed()?, query, limit))
    }

    /// Subscribe to a subject's updates.
    pub fn subscribe(&mut self, subject_id: &str) -> bool {
        self.manager.subscribe(subject_id)
    }

    /// Stop a subject's updates. Queued updates for it are skipped when
    /// their batch is applied.
    pub fn unsubscribe(&mut self, subject_id: &str) -> bool {
        self.manager.unsubscribe(subject_id)
    }

    /// Parse a feed message and queue it. Returns whether it was queued.
    pub fn push_message(&mut self, text: &str) -> bool {
        match parse_message(text) {
            Some(update) => self.push_update(update),
            None => false,
        }
    }

    /// Queue an update for a subscribed subject. Returns whether it was
    /// queued.
    pub fn push_update(&mut self, update: GraphUpdate) -> bool {
        if !self.manager.is_subscribed(&update.subject_id) {
            debug!(subject = %update.subject_id, "Ignoring update for unsubscribed subject");
            return false;
        }
        self.pipeline.enqueue(update);
        true
    }

    /// Time until [`tick`](Self::tick) can make progress.
    pub fn next_deadline(&self) -> Option<Duration> {
        let deadline = self.pipeline.next_deadline()?;
        Some(Duration::from_millis(
            deadline.saturating_sub(self.clock.now_ms()),
        ))
    }

    /// Poll the pipeline: end the settle effect when due, apply a due batch
    /// and hand its changes to the renderer.
    pub fn tick(&mut self) -> Option<BatchReport> {
        let poll = self.pipeline.poll();
        if poll.settled {
            self.host.clear_highlights();
        }
        let batch = poll.batch?;

        let mut applied = Vec::new();
        for update in &batch.updates {
            applied.extend(self.manager.apply_update(update));
        }
        let report = self.pipeline.commit(&batch, applied);

        let shown: Vec<NodeDelta> = match &self.current {
            Some(key) => report
                .applied
                .iter()
                .filter(|d| &d.key == key)
                .map(|d| d.change.clone())
                .collect(),
            None => Vec::new(),
        };
        if !shown.is_empty() {
            let visible: Vec<(usize, f64)> = {
                let index: HashMap<&str, usize> = self
                    .scene
                    .nodes
                    .iter()
                    .enumerate()
                    .map(|(i, n)| (n.id.as_str(), i))
                    .collect();
                shown
                    .iter()
                    .filter_map(|d| index.get(d.id.as_str()).map(|&i| (i, d.new_value)))
                    .collect()
            };
            for (i, value) in visible {
                self.scene.nodes[i].set_value(value);
            }
            self.host.update_nodes(&shown);
        }

        debug!(
            sequence = report.sequence,
            applied = report.applied.len(),
            coalesced = report.coalesced,
            skipped = report.skipped,
            "Batch applied"
        );
        Some(report)
    }

    /// Recorded changes of a node in the displayed snapshot.
    pub fn history(&self, node_id: &str) -> Vec<HistoryEntry> {
        match &self.current {
            Some(key) => self.pipeline.history(key, node_id),
            None => Vec::new(),
        }
    }

    /// Recorded changes of a node in any cached snapshot.
    pub fn history_for(&self, key: &SubjectKey, node_id: &str) -> Vec<HistoryEntry> {
        self.pipeline.history(key, node_id)
    }

    /// Run up to `ticks` layout steps, copy the positions out and redraw.
    /// Returns the steps run.
    pub fn step_layout(&mut self, ticks: usize) -> usize {
        let performed = self.layout.run(ticks);
        if performed > 0 {
            let positions = self.layout.positions();
            if let Some(key) = &self.current {
                self.manager.update_positions(key, &positions);
            }
            self.lod.update_centroids(&positions);
            self.refresh();
        }
        performed
    }

    /// Start dragging whatever is under a screen point. Returns its id.
    pub fn drag_start(&mut self, point: Position) -> Option<String> {
        let id = self.host.hit_test(point)?;
        self.layout.drag_start(&id).then_some(id)
    }

    /// Move a dragged node to a screen point.
    pub fn drag_to(&mut self, id: &str, point: Position) -> bool {
        let world = self.host.transform().screen_to_world(point);
        self.layout.drag_to(id, world)
    }

    /// Release a dragged node.
    pub fn drag_end(&mut self, id: &str) -> bool {
        self.layout.drag_end(id)
    }

    /// Node or cluster under a screen point.
    pub fn hit_test(&self, point: Position) -> Option<String> {
        self.host.hit_test(point)
    }

    /// Pan and zoom the view.
    pub fn set_transform(&mut self, pan: Position, zoom: f64) {
        self.host.set_transform(pan, zoom);
    }

    /// Current view transform.
    pub fn transform(&self) -> ViewTransform {
        self.host.transform()
    }

    /// Active rendering backend.
    pub fn render_mode(&self) -> RenderMode {
        self.host.mode()
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("current", &self.current)
            .field("manager", &self.manager)
            .field("pipeline", &self.pipeline)
            .field("lod_active", &self.lod.is_active())
            .field("render_mode", &self.host.mode())
            .finish()
    }
}
