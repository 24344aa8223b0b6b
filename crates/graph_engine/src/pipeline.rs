//! # Differential Update Pipeline
//!
//! Streamed updates are queued rather than applied on arrival.
//!
//! 1. The first update into an empty queue opens a batch window
//!    (`batch_window_ms`).
//! 2. Once the window has elapsed, [`UpdatePipeline::poll`] drains the queue
//!    into a [`Batch`]: one entry per `(subject, node)`, carrying the last
//!    value received, in order of first arrival.
//! 3. The caller applies the batch to its snapshots and hands the resulting
//!    deltas back to [`UpdatePipeline::commit`], which appends history per
//!    snapshot node and starts the settle window (`settle_window_ms`).
//! 4. While settling no batch is drained; updates keep queuing and go out in
//!    the next batch.
//!
//! The pipeline never reads a timer itself except through its [`Clock`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use graph_core::{GraphUpdate, NodeDelta, NodeValueUpdate};
use serde::Serialize;
use tracing::debug;

use crate::clock::Clock;
use crate::config::PipelineConfig;
use crate::manager::{AppliedDelta, SubjectKey};

/// One recorded change of a node's value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// Value before the batch
    pub old_value: Option<f64>,
    /// Value after the batch
    pub new_value: f64,
    /// `new_value - old_value`, when there was an old value
    pub delta: Option<f64>,
    /// Clock time of the batch, in milliseconds
    pub timestamp_ms: u64,
}

/// Coalesced updates ready to apply.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Sequence number, starting at 1
    pub sequence: u64,
    /// One update per subject, in order of first arrival
    pub updates: Vec<GraphUpdate>,
    /// Node updates received for this batch before coalescing
    pub received: usize,
}

impl Batch {
    /// Node updates left after coalescing.
    pub fn unique(&self) -> usize {
        self.updates.iter().map(|u| u.node_updates.len()).sum()
    }
}

/// Outcome of a committed batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    /// Batch sequence number
    pub sequence: u64,
    /// Node updates received
    pub received: usize,
    /// Node updates folded into a later one for the same node
    pub coalesced: usize,
    /// Node updates that matched no cached node or an unsubscribed subject
    pub skipped: usize,
    /// Changes applied, one per snapshot node, in application order
    pub applied: Vec<AppliedDelta>,
    /// Clock time of the commit
    pub timestamp_ms: u64,
}

/// What a poll found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Poll {
    /// The previous batch's settle window ended during this poll
    pub settled: bool,
    /// A batch is ready to apply
    pub batch: Option<Batch>,
}

/// Batching, settle guard and per-node history.
pub struct UpdatePipeline {
    config: PipelineConfig,
    clock: Arc<dyn Clock>,
    queue: Vec<(String, NodeValueUpdate)>,
    window_opened_at: Option<u64>,
    settle_until: Option<u64>,
    history: HashMap<(SubjectKey, String), VecDeque<HistoryEntry>>,
    sequence: u64,
}

impl UpdatePipeline {
    /// Empty pipeline.
    pub fn new(config: PipelineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            queue: Vec::new(),
            window_opened_at: None,
            settle_until: None,
            history: HashMap::new(),
            sequence: 0,
        }
    }

    /// Settings in use.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Queue an update. Opens the batch window if none is open.
    pub fn enqueue(&mut self, update: GraphUpdate) {
        if update.node_updates.is_empty() {
            return;
        }
        if self.window_opened_at.is_none() {
            self.window_opened_at = Some(self.clock.now_ms());
        }
        let GraphUpdate {
            subject_id,
            node_updates,
        } = update;
        self.queue
            .extend(node_updates.into_iter().map(|u| (subject_id.clone(), u)));
    }

    /// Node updates waiting for the next batch.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Whether a batch's settle window is still running.
    pub fn is_settling(&self) -> bool {
        self.settle_until
            .is_some_and(|until| self.clock.now_ms() < until)
    }

    /// Whether nothing is queued and nothing is settling.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.settle_until.is_none()
    }

    /// Clock time at which the next poll can make progress.
    pub fn next_deadline(&self) -> Option<u64> {
        if let Some(until) = self.settle_until {
            return Some(until);
        }
        self.window_opened_at
            .map(|opened| opened.saturating_add(self.config.batch_window_ms))
    }

    /// End an expired settle window and drain the queue if its window has
    /// elapsed.
    pub fn poll(&mut self) -> Poll {
        let now = self.clock.now_ms();
        let mut poll = Poll::default();

        if let Some(until) = self.settle_until {
            if now < until {
                return poll;
            }
            self.settle_until = None;
            poll.settled = true;
        }

        let Some(opened) = self.window_opened_at else {
            return poll;
        };
        if now < opened.saturating_add(self.config.batch_window_ms) {
            return poll;
        }

        self.window_opened_at = None;
        poll.batch = Some(self.drain());
        poll
    }

    fn drain(&mut self) -> Batch {
        let received = self.queue.len();
        let mut updates: Vec<GraphUpdate> = Vec::new();
        let mut subjects: HashMap<String, usize> = HashMap::new();
        let mut slots: HashMap<(String, String), (usize, usize)> = HashMap::new();

        for (subject_id, change) in self.queue.drain(..) {
            let key = (subject_id.clone(), change.id.clone());
            if let Some(&(u, n)) = slots.get(&key) {
                updates[u].node_updates[n].value = change.value;
                continue;
            }
            let u = *subjects.entry(subject_id.clone()).or_insert_with(|| {
                updates.push(GraphUpdate {
                    subject_id,
                    node_updates: Vec::new(),
                });
                updates.len() - 1
            });
            slots.insert(key, (u, updates[u].node_updates.len()));
            updates[u].node_updates.push(change);
        }

        self.sequence += 1;
        let batch = Batch {
            sequence: self.sequence,
            updates,
            received,
        };
        debug!(
            sequence = batch.sequence,
            received,
            unique = batch.unique(),
            "Batch drained"
        );
        batch
    }

    /// Record the deltas `batch` produced, append history, and start the
    /// settle window if anything changed.
    ///
    /// Changes to the same snapshot node are folded into one, measured from
    /// the value before the batch.
    pub fn commit(&mut self, batch: &Batch, applied: Vec<AppliedDelta>) -> BatchReport {
        let now = self.clock.now_ms();
        let depth = self.config.history_depth;

        let mut merged: Vec<AppliedDelta> = Vec::with_capacity(applied.len());
        let mut slots: HashMap<(SubjectKey, String), usize> = HashMap::new();
        for entry in applied {
            let slot = (entry.key.clone(), entry.change.id.clone());
            match slots.get(&slot) {
                Some(&i) => {
                    let first = &mut merged[i].change;
                    *first =
                        NodeDelta::new(first.id.clone(), first.old_value, entry.change.new_value);
                }
                None => {
                    slots.insert(slot, merged.len());
                    merged.push(entry);
                }
            }
        }

        for entry in &merged {
            let ring = self
                .history
                .entry((entry.key.clone(), entry.change.id.clone()))
                .or_default();
            ring.push_back(HistoryEntry {
                old_value: entry.change.old_value,
                new_value: entry.change.new_value,
                delta: entry.change.delta,
                timestamp_ms: now,
            });
            while ring.len() > depth {
                ring.pop_front();
            }
        }

        if !merged.is_empty() {
            self.settle_until = Some(now.saturating_add(self.config.settle_window_ms));
        }

        let matched: HashSet<(&str, &str)> = merged
            .iter()
            .map(|d| (d.subject_id.as_str(), d.change.id.as_str()))
            .collect();
        let unique = batch.unique();
        let skipped = unique.saturating_sub(matched.len());
        BatchReport {
            sequence: batch.sequence,
            received: batch.received,
            coalesced: batch.received - unique,
            skipped,
            applied: merged,
            timestamp_ms: now,
        }
    }

    /// History of a node in the snapshot under `key`, oldest first.
    pub fn history(&self, key: &SubjectKey, node_id: &str) -> Vec<HistoryEntry> {
        self.history
            .get(&(key.clone(), node_id.to_string()))
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot nodes with recorded history.
    pub fn tracked_nodes(&self) -> usize {
        self.history.len()
    }
}

impl std::fmt::Debug for UpdatePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdatePipeline")
            .field("config", &self.config)
            .field("pending", &self.queue.len())
            .field("window_opened_at", &self.window_opened_at)
            .field("settle_until", &self.settle_until)
            .field("sequence", &self.sequence)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn pipeline() -> (UpdatePipeline, Arc<ManualClock>) {
        let clock = ManualClock::shared(1_000);
        (UpdatePipeline::new(PipelineConfig::default(), clock.clone()), clock)
    }

    fn update(subject: &str, changes: &[(&str, f64)]) -> GraphUpdate {
        GraphUpdate {
            subject_id: subject.to_string(),
            node_updates: changes.iter().map(|(id, v)| NodeValueUpdate::new(*id, *v)).collect(),
        }
    }

    fn subject(id: &str) -> SubjectKey {
        SubjectKey::Subject(id.to_string())
    }

    /// Apply a batch against a plain value table, like the manager does
    /// for a subject's own snapshot.
    fn apply(values: &mut HashMap<String, f64>, batch: &Batch) -> Vec<AppliedDelta> {
        let mut deltas = Vec::new();
        for update in &batch.updates {
            for change in &update.node_updates {
                if let Some(v) = values.get_mut(&change.id) {
                    deltas.push(AppliedDelta {
                        key: subject(&update.subject_id),
                        subject_id: update.subject_id.clone(),
                        change: NodeDelta::new(change.id.clone(), Some(*v), change.value),
                    });
                    *v = change.value;
                }
            }
        }
        deltas
    }

    mod batching_tests {
        use super::*;

        #[test]
        fn test_window_must_elapse() {
            let (mut pipeline, clock) = pipeline();
            pipeline.enqueue(update("T1", &[("A", 1.0)]));
            assert_eq!(pipeline.next_deadline(), Some(1_050));

            clock.advance(49);
            assert_eq!(pipeline.poll(), Poll::default());

            clock.advance(1);
            let batch = pipeline.poll().batch.unwrap();
            assert_eq!(batch.sequence, 1);
            assert_eq!(batch.unique(), 1);
            assert_eq!(pipeline.pending(), 0);
            assert_eq!(pipeline.next_deadline(), None);
        }

        #[test]
        fn test_same_node_last_value_wins() {
            let (mut pipeline, clock) = pipeline();
            pipeline.enqueue(update("T1", &[("A", 1.0), ("B", 5.0)]));
            clock.advance(10);
            pipeline.enqueue(update("T1", &[("A", 2.0)]));
            pipeline.enqueue(update("T2", &[("A", 7.0)]));
            clock.advance(40);

            let batch = pipeline.poll().batch.unwrap();

            assert_eq!(batch.received, 4);
            assert_eq!(batch.updates.len(), 2);
            assert_eq!(batch.updates[0].subject_id, "T1");
            assert_eq!(
                batch.updates[0].node_updates,
                vec![NodeValueUpdate::new("A", 2.0), NodeValueUpdate::new("B", 5.0)]
            );
            assert_eq!(batch.updates[1].node_updates, vec![NodeValueUpdate::new("A", 7.0)]);
        }

        #[test]
        fn test_empty_update_opens_no_window() {
            let (mut pipeline, _) = pipeline();
            pipeline.enqueue(update("T1", &[]));
            assert!(pipeline.is_idle());
            assert_eq!(pipeline.next_deadline(), None);
        }
    }

    mod history_tests {
        use super::*;

        #[test]
        fn test_two_updates_one_history_entry() {
            let (mut pipeline, clock) = pipeline();
            let mut values: HashMap<String, f64> = [("A".to_string(), 100.0)].into_iter().collect();

            pipeline.enqueue(update("T1", &[("A", 101.0)]));
            clock.advance(20);
            pipeline.enqueue(update("T1", &[("A", 103.5)]));
            clock.advance(30);

            let batch = pipeline.poll().batch.unwrap();
            let report = pipeline.commit(&batch, apply(&mut values, &batch));

            assert_eq!(report.coalesced, 1);
            let history = pipeline.history(&subject("T1"), "A");
            assert_eq!(history.len(), 1);
            assert_eq!(history[0].old_value, Some(100.0));
            assert_eq!(history[0].new_value, 103.5);
            assert_eq!(history[0].delta, Some(3.5));
            assert_eq!(history[0].timestamp_ms, 1_050);
        }

        #[test]
        fn test_history_ring_is_bounded() {
            let (mut pipeline, clock) = pipeline();
            let mut values: HashMap<String, f64> = [("A".to_string(), 0.0)].into_iter().collect();

            for i in 1..=15 {
                pipeline.enqueue(update("T1", &[("A", i as f64)]));
                clock.advance(50);
                let batch = pipeline.poll().batch.unwrap();
                pipeline.commit(&batch, apply(&mut values, &batch));
                clock.advance(500);
                assert!(pipeline.poll().settled);
            }

            let history = pipeline.history(&subject("T1"), "A");
            assert_eq!(history.len(), 10);
            assert_eq!(history.first().map(|h| h.new_value), Some(6.0));
            assert_eq!(history.last().map(|h| h.new_value), Some(15.0));
        }

        #[test]
        fn test_history_is_kept_per_snapshot() {
            let (mut pipeline, clock) = pipeline();
            pipeline.enqueue(update("T1", &[("C", 11.0)]));
            pipeline.enqueue(update("T2", &[("C", 99.0)]));
            clock.advance(50);
            let batch = pipeline.poll().batch.unwrap();

            // Both subjects write C in their own snapshot; the aggregate
            // holds a single C that both updates land on.
            let written = |key: SubjectKey, subject_id: &str, old: f64, new: f64| AppliedDelta {
                key,
                subject_id: subject_id.to_string(),
                change: NodeDelta::new("C", Some(old), new),
            };
            let applied = vec![
                written(subject("T1"), "T1", 10.0, 11.0),
                written(SubjectKey::All, "T1", 5.0, 11.0),
                written(subject("T2"), "T2", 20.0, 99.0),
                written(SubjectKey::All, "T2", 11.0, 99.0),
            ];
            let report = pipeline.commit(&batch, applied);

            assert_eq!(report.applied.len(), 3);
            assert_eq!(report.skipped, 0);

            let t1 = pipeline.history(&subject("T1"), "C");
            assert_eq!(t1.len(), 1);
            assert_eq!((t1[0].old_value, t1[0].new_value), (Some(10.0), 11.0));

            let t2 = pipeline.history(&subject("T2"), "C");
            assert_eq!(t2.len(), 1);
            assert_eq!(t2[0].delta, Some(79.0));

            let all = pipeline.history(&SubjectKey::All, "C");
            assert_eq!(all.len(), 1);
            assert_eq!((all[0].old_value, all[0].new_value), (Some(5.0), 99.0));
            assert_eq!(all[0].delta, Some(94.0));
            assert_eq!(pipeline.tracked_nodes(), 3);
        }

        #[test]
        fn test_skipped_counts_unmatched() {
            let (mut pipeline, clock) = pipeline();
            let mut values: HashMap<String, f64> = HashMap::new();
            pipeline.enqueue(update("T1", &[("GHOST", 1.0)]));
            clock.advance(50);
            let batch = pipeline.poll().batch.unwrap();
            let report = pipeline.commit(&batch, apply(&mut values, &batch));

            assert_eq!(report.skipped, 1);
            assert!(report.applied.is_empty());
            assert!(!pipeline.is_settling());
        }
    }

    mod settle_tests {
        use super::*;

        #[test]
        fn test_updates_during_settle_wait_for_next_batch() {
            let (mut pipeline, clock) = pipeline();
            let mut values: HashMap<String, f64> = [("A".to_string(), 0.0)].into_iter().collect();

            pipeline.enqueue(update("T1", &[("A", 1.0)]));
            clock.advance(50);
            let first = pipeline.poll().batch.unwrap();
            pipeline.commit(&first, apply(&mut values, &first));
            assert!(pipeline.is_settling());
            assert_eq!(pipeline.next_deadline(), Some(1_550));

            clock.advance(100);
            pipeline.enqueue(update("T1", &[("A", 2.0)]));
            clock.advance(100);
            assert_eq!(pipeline.poll(), Poll::default());
            assert_eq!(pipeline.pending(), 1);

            clock.advance(300);
            let poll = pipeline.poll();
            assert!(poll.settled);
            let second = poll.batch.unwrap();
            assert_eq!(second.sequence, 2);
            assert_eq!(second.updates[0].node_updates[0].value, 2.0);
        }
    }
}
