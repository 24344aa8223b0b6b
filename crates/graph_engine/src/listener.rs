//! Event fan-out with per-listener failure isolation.
//!
//! Every listener is invoked for every matching event, in registration
//! order. A listener that returns an error or panics is logged and skipped;
//! the remaining listeners still run and nothing propagates to the emitter.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::Serialize;
use tracing::warn;

use crate::error::ListenerError;
use crate::manager::{AppliedDelta, SubjectKey};

/// Event names as seen by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A snapshot was fetched and cached (`graph_loaded`)
    GraphLoaded,
    /// Node values changed (`graph_update`)
    GraphUpdate,
}

impl EventKind {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::GraphLoaded => "graph_loaded",
            EventKind::GraphUpdate => "graph_update",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload delivered to listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    /// A snapshot was cached under `key`.
    Loaded {
        /// Cache key
        key: SubjectKey,
        /// Nodes in the cleaned snapshot
        node_count: usize,
        /// Edges in the cleaned snapshot
        edge_count: usize,
    },
    /// Values changed for a subscribed subject.
    Updated {
        /// Subject the update was addressed to
        subject_id: String,
        /// Values actually applied, per snapshot
        deltas: Vec<AppliedDelta>,
    },
}

impl GraphEvent {
    /// Which listeners receive this event.
    pub fn kind(&self) -> EventKind {
        match self {
            GraphEvent::Loaded { .. } => EventKind::GraphLoaded,
            GraphEvent::Updated { .. } => EventKind::GraphUpdate,
        }
    }
}

/// Handle returned by registration, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Listener callback.
pub type ListenerFn = Box<dyn FnMut(&GraphEvent) -> anyhow::Result<()> + Send>;

struct Entry {
    id: ListenerId,
    kind: EventKind,
    callback: ListenerFn,
}

/// Registered listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: u64,
    entries: Vec<Entry>,
}

impl ListenerRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for events of `kind`.
    pub fn add<F>(&mut self, kind: EventKind, callback: F) -> ListenerId
    where
        F: FnMut(&GraphEvent) -> anyhow::Result<()> + Send + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            kind,
            callback: Box::new(callback),
        });
        id
    }

    /// Unregister. Returns whether the listener existed.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// Listeners registered for `kind`.
    pub fn count(&self, kind: EventKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    /// Total listeners.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deliver `event` to every matching listener. Returns the failures,
    /// which have already been logged.
    pub fn emit(&mut self, event: &GraphEvent) -> Vec<ListenerError> {
        let kind = event.kind();
        let mut failures = Vec::new();

        for entry in self.entries.iter_mut().filter(|e| e.kind == kind) {
            let callback = &mut entry.callback;
            let message = match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => format!("{:#}", err),
                Err(panic) => panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "listener panicked".to_string()),
            };

            let failure = ListenerError {
                listener: entry.id,
                event: kind,
                message,
            };
            warn!(
                listener = %failure.listener,
                event = %kind,
                error = %failure.message,
                "Listener failed"
            );
            failures.push(failure);
        }
        failures
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn loaded() -> GraphEvent {
        GraphEvent::Loaded {
            key: SubjectKey::All,
            node_count: 1,
            edge_count: 0,
        }
    }

    fn counter(registry: &mut ListenerRegistry, kind: EventKind) -> Arc<AtomicUsize> {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        registry.add(kind, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        hits
    }

    #[test]
    fn test_failures_are_isolated() {
        let mut registry = ListenerRegistry::new();
        let before = counter(&mut registry, EventKind::GraphLoaded);
        let erroring = registry.add(EventKind::GraphLoaded, |_| Err(anyhow::anyhow!("boom")));
        let panicking = registry.add(EventKind::GraphLoaded, |_| panic!("kaboom"));
        let after = counter(&mut registry, EventKind::GraphLoaded);

        let failures = registry.emit(&loaded());

        assert_eq!(before.load(Ordering::SeqCst), 1);
        assert_eq!(after.load(Ordering::SeqCst), 1);
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].listener, erroring);
        assert_eq!(failures[0].message, "boom");
        assert_eq!(failures[1].listener, panicking);
        assert_eq!(failures[1].message, "kaboom");
        assert_eq!(failures[1].event, EventKind::GraphLoaded);
    }

    #[test]
    fn test_events_routed_by_kind() {
        let mut registry = ListenerRegistry::new();
        let loads = counter(&mut registry, EventKind::GraphLoaded);
        let updates = counter(&mut registry, EventKind::GraphUpdate);

        registry.emit(&loaded());
        registry.emit(&GraphEvent::Updated {
            subject_id: "T1".to_string(),
            deltas: Vec::new(),
        });
        registry.emit(&loaded());

        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert_eq!(updates.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove() {
        let mut registry = ListenerRegistry::new();
        let id = registry.add(EventKind::GraphUpdate, |_| Ok(()));
        assert_eq!(registry.count(EventKind::GraphUpdate), 1);
        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(EventKind::GraphLoaded.to_string(), "graph_loaded");
        assert_eq!(EventKind::GraphUpdate.as_str(), "graph_update");
    }
}
