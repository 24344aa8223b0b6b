//! # Graph Manager
//!
//! Owns the snapshot cache (one snapshot per subject key), the subscription
//! set, and the listener registry. Every cache mutation goes through here.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use graph_core::{ComputationGraph, GraphBuilder, GraphUpdate, NodeDelta, Position};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::listener::{EventKind, GraphEvent, ListenerId, ListenerRegistry};
use crate::source::GraphSource;

/// Cache key: one subject, or the aggregate of all subjects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SubjectKey {
    /// The aggregate graph (`/api/graph` without a subject)
    All,
    /// A single subject's graph
    Subject(String),
}

impl SubjectKey {
    /// Key for an optional subject id.
    pub fn from_option(subject_id: Option<&str>) -> Self {
        match subject_id {
            Some(id) => SubjectKey::Subject(id.to_string()),
            None => SubjectKey::All,
        }
    }

    /// Subject id, `None` for the aggregate.
    pub fn subject_id(&self) -> Option<&str> {
        match self {
            SubjectKey::All => None,
            SubjectKey::Subject(id) => Some(id),
        }
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectKey::All => f.write_str("all"),
            SubjectKey::Subject(id) => f.write_str(id),
        }
    }
}

/// A value change applied to one cached snapshot.
///
/// An update for a subject can land in two snapshots (the subject's own and
/// the aggregate), each with its own previous value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedDelta {
    /// Snapshot the change was written to
    pub key: SubjectKey,
    /// Subject the update was addressed to
    pub subject_id: String,
    /// The change itself
    pub change: NodeDelta,
}

/// Snapshot cache, subscriptions and event fan-out.
pub struct GraphManager {
    source: Arc<dyn GraphSource>,
    cache: HashMap<SubjectKey, ComputationGraph>,
    subscriptions: BTreeSet<String>,
    listeners: ListenerRegistry,
    listener_failures: usize,
}

impl GraphManager {
    /// Manager fetching from `source`, with an empty cache.
    pub fn new(source: Arc<dyn GraphSource>) -> Self {
        Self {
            source,
            cache: HashMap::new(),
            subscriptions: BTreeSet::new(),
            listeners: ListenerRegistry::new(),
            listener_failures: 0,
        }
    }

    /// Retrieve, sanitise and cache the snapshot for `subject_id` (or the
    /// aggregate), replacing any previous entry, then emit `graph_loaded`.
    ///
    /// # Errors
    ///
    /// `FetchError` from the source; the cache is left as it was.
    pub async fn fetch(
        &mut self,
        subject_id: Option<&str>,
    ) -> Result<&ComputationGraph, FetchError> {
        let key = SubjectKey::from_option(subject_id);
        let source = Arc::clone(&self.source);

        let raw = match source.fetch_graph(subject_id).await {
            Ok(graph) => graph,
            Err(err) => {
                warn!(subject = %key, error = %err, "Graph fetch failed, keeping cached snapshot");
                return Err(err);
            }
        };

        let (graph, report) = GraphBuilder::sanitise(raw);
        let event = GraphEvent::Loaded {
            key: key.clone(),
            node_count: graph.nodes.len(),
            edge_count: graph.edges.len(),
        };
        info!(
            subject = %key,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            depth = graph.metadata.depth,
            dropped = report.duplicate_nodes + report.dangling_edges,
            "Graph loaded"
        );

        let Self {
            cache,
            listeners,
            listener_failures,
            ..
        } = self;
        let slot = match cache.entry(key) {
            Entry::Occupied(mut occupied) => {
                occupied.insert(graph);
                occupied.into_mut()
            }
            Entry::Vacant(vacant) => vacant.insert(graph),
        };
        *listener_failures += listeners.emit(&event).len();
        Ok(slot)
    }

    /// Start applying updates for a subject. Returns whether it was newly
    /// added.
    pub fn subscribe(&mut self, subject_id: &str) -> bool {
        let added = self.subscriptions.insert(subject_id.to_string());
        if added {
            debug!(subject = %subject_id, "Subscribed");
        }
        added
    }

    /// Stop applying updates for a subject. Returns whether it was
    /// subscribed.
    pub fn unsubscribe(&mut self, subject_id: &str) -> bool {
        let removed = self.subscriptions.remove(subject_id);
        if removed {
            debug!(subject = %subject_id, "Unsubscribed");
        }
        removed
    }

    /// Whether updates for `subject_id` are applied.
    pub fn is_subscribed(&self, subject_id: &str) -> bool {
        self.subscriptions.contains(subject_id)
    }

    /// Subscribed subject ids, sorted.
    pub fn subscriptions(&self) -> impl Iterator<Item = &str> {
        self.subscriptions.iter().map(String::as_str)
    }

    /// Number of subscribed subjects.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Overwrite node values for a subscribed subject, in the subject's
    /// snapshot and in the aggregate snapshot when cached. Node ids missing
    /// from a snapshot are skipped. Emits `graph_update` and returns one
    /// delta per snapshot node written: the subject's snapshot first, then
    /// the aggregate, each in update order.
    ///
    /// Updates for subjects that are not subscribed change nothing.
    pub fn apply_update(&mut self, update: &GraphUpdate) -> Vec<AppliedDelta> {
        if !self.is_subscribed(&update.subject_id) {
            debug!(subject = %update.subject_id, "Ignoring update for unsubscribed subject");
            return Vec::new();
        }

        let keys = [SubjectKey::Subject(update.subject_id.clone()), SubjectKey::All];
        let mut applied = Vec::new();

        for key in keys {
            let Some(graph) = self.cache.get_mut(&key) else {
                continue;
            };
            let slots: Vec<Option<usize>> = {
                let index = graph.node_index();
                update
                    .node_updates
                    .iter()
                    .map(|u| index.get(u.id.as_str()).copied())
                    .collect()
            };
            for (change, slot) in update.node_updates.iter().zip(slots) {
                let Some(i) = slot else {
                    continue;
                };
                let old = graph.nodes[i].value.replace(change.value);
                applied.push(AppliedDelta {
                    key: key.clone(),
                    subject_id: update.subject_id.clone(),
                    change: NodeDelta::new(change.id.clone(), old, change.value),
                });
            }
        }

        debug!(
            subject = %update.subject_id,
            received = update.node_updates.len(),
            applied = applied.len(),
            "Update applied"
        );

        let event = GraphEvent::Updated {
            subject_id: update.subject_id.clone(),
            deltas: applied.clone(),
        };
        self.listener_failures += self.listeners.emit(&event).len();
        applied
    }

    /// Register a listener.
    pub fn add_listener<F>(&mut self, kind: EventKind, callback: F) -> ListenerId
    where
        F: FnMut(&GraphEvent) -> anyhow::Result<()> + Send + 'static,
    {
        self.listeners.add(kind, callback)
    }

    /// Unregister a listener. Returns whether it existed.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Listener invocations that failed so far.
    pub fn listener_failures(&self) -> usize {
        self.listener_failures
    }

    /// Cached snapshot for `subject_id`, or the aggregate for `None`.
    pub fn get_snapshot(&self, subject_id: Option<&str>) -> Option<&ComputationGraph> {
        self.cache.get(&SubjectKey::from_option(subject_id))
    }

    /// Cached snapshot by key.
    pub fn snapshot(&self, key: &SubjectKey) -> Option<&ComputationGraph> {
        self.cache.get(key)
    }

    /// Current value of a cached node.
    pub fn node_value(&self, key: &SubjectKey, node_id: &str) -> Option<f64> {
        self.cache.get(key)?.find_node(node_id)?.value
    }

    /// Copy layout positions into a cached snapshot. Ids without a node
    /// (clusters, stale ids) are ignored. Returns the number of nodes moved.
    pub fn update_positions(
        &mut self,
        key: &SubjectKey,
        positions: &HashMap<String, Position>,
    ) -> usize {
        let Some(graph) = self.cache.get_mut(key) else {
            return 0;
        };
        let mut moved = 0;
        for node in &mut graph.nodes {
            if let Some(&p) = positions.get(&node.id) {
                node.position = Some(p);
                moved += 1;
            }
        }
        moved
    }

    /// Keys currently cached, sorted.
    pub fn cached_keys(&self) -> Vec<&SubjectKey> {
        let mut keys: Vec<&SubjectKey> = self.cache.keys().collect();
        keys.sort();
        keys
    }

    /// Drop every cached snapshot. Subscriptions and listeners stay.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

impl fmt::Debug for GraphManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphManager")
            .field("source", &self.source.describe())
            .field("cached", &self.cached_keys())
            .field("subscriptions", &self.subscriptions)
            .field("listeners", &self.listeners)
            .finish()
    }
}
