//! # Streaming Update Feed
//!
//! Parsing of push-channel messages and an async driver that interleaves
//! them with pipeline deadlines.
//!
//! Accepted message shape:
//!
//! ```json
//! {"type": "graph_update",
//!  "data": {"subject_id": "T001", "updated_nodes": [{"id": "n1", "value": 1.5}]}}
//! ```
//!
//! `update_type` is accepted in place of `type`, `trade_id` in place of
//! `subject_id`. Messages of another type, without a subject, or whose
//! `updated_nodes` is not an array are dropped. Node entries without a string
//! `id` or a numeric `value` are skipped individually.

use std::time::Duration;

use futures::{Stream, StreamExt};
use graph_core::{GraphUpdate, NodeValueUpdate};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::context::EngineContext;
use crate::pipeline::BatchReport;

/// Discriminator of update messages.
pub const GRAPH_UPDATE_TYPE: &str = "graph_update";

/// Parse a raw feed message. `None` for anything that is not a well-formed
/// graph update.
pub fn parse_message(text: &str) -> Option<GraphUpdate> {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => parse_value(&value),
        Err(err) => {
            debug!(error = %err, "Dropping non-JSON feed message");
            None
        }
    }
}

/// Parse an already decoded feed message.
pub fn parse_value(message: &Value) -> Option<GraphUpdate> {
    let kind = message
        .get("type")
        .or_else(|| message.get("update_type"))
        .and_then(Value::as_str);
    if kind != Some(GRAPH_UPDATE_TYPE) {
        debug!(kind = ?kind, "Dropping feed message of another type");
        return None;
    }

    let data = message.get("data")?;
    let Some(subject_id) = data
        .get("subject_id")
        .or_else(|| data.get("trade_id"))
        .and_then(Value::as_str)
    else {
        debug!("Dropping graph update without a subject");
        return None;
    };
    let Some(entries) = data.get("updated_nodes").and_then(Value::as_array) else {
        debug!(subject = subject_id, "Dropping graph update without a node array");
        return None;
    };

    let node_updates: Vec<NodeValueUpdate> = entries
        .iter()
        .filter_map(|entry| {
            let id = entry.get("id")?.as_str()?;
            let value = entry.get("value")?.as_f64()?;
            Some(NodeValueUpdate::new(id, value))
        })
        .collect();
    if node_updates.len() < entries.len() {
        debug!(
            subject = subject_id,
            skipped = entries.len() - node_updates.len(),
            "Skipped malformed node entries"
        );
    }

    Some(GraphUpdate {
        subject_id: subject_id.to_string(),
        node_updates,
    })
}

/// Counters from one [`run_feed`] session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedSummary {
    /// Messages read from the stream
    pub messages: usize,
    /// Messages queued into the pipeline
    pub accepted: usize,
    /// Batches applied
    pub batches: usize,
    /// Snapshot node values changed
    pub applied: usize,
    /// Node updates folded into a later one
    pub coalesced: usize,
    /// Node updates that matched nothing
    pub skipped: usize,
}

impl FeedSummary {
    fn record(&mut self, report: &BatchReport) {
        self.batches += 1;
        self.applied += report.applied.len();
        self.coalesced += report.coalesced;
        self.skipped += report.skipped;
    }
}

async fn wait_for(deadline: Option<Duration>) {
    match deadline {
        Some(wait) => tokio::time::sleep(wait).await,
        None => std::future::pending::<()>().await,
    }
}

/// Feed `stream` into the engine until it ends, ticking the pipeline
/// whenever a batch or settle deadline falls due, then flush what is still
/// queued.
///
/// Deadlines are converted to tokio sleeps, so the context should run on a
/// clock that follows tokio time ([`SystemClock`](crate::SystemClock)).
pub async fn run_feed<S>(ctx: &mut EngineContext, mut stream: S) -> FeedSummary
where
    S: Stream<Item = String> + Unpin,
{
    let mut summary = FeedSummary::default();

    loop {
        let deadline = ctx.next_deadline();
        tokio::select! {
            message = stream.next() => match message {
                Some(text) => {
                    summary.messages += 1;
                    if ctx.push_message(&text) {
                        summary.accepted += 1;
                    }
                }
                None => break,
            },
            _ = wait_for(deadline) => {
                if let Some(report) = ctx.tick() {
                    summary.record(&report);
                }
            }
        }
    }

    while let Some(wait) = ctx.next_deadline() {
        tokio::time::sleep(wait).await;
        if let Some(report) = ctx.tick() {
            summary.record(&report);
        }
    }

    info!(
        messages = summary.messages,
        accepted = summary.accepted,
        batches = summary.batches,
        applied = summary.applied,
        "Feed ended"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    mod parse_tests {
        use super::*;

        #[test]
        fn test_parse_full_message() {
            let update = parse_message(
                r#"{"type":"graph_update","data":{"subject_id":"T1",
                    "updated_nodes":[{"id":"a","value":1.5},{"id":"b","value":-2}]}}"#,
            )
            .unwrap();
            assert_eq!(update.subject_id, "T1");
            assert_eq!(
                update.node_updates,
                vec![NodeValueUpdate::new("a", 1.5), NodeValueUpdate::new("b", -2.0)]
            );
        }

        #[test]
        fn test_parse_accepts_aliases() {
            let message = json!({
                "update_type": "graph_update",
                "data": {"trade_id": "T2", "updated_nodes": []}
            });
            let update = parse_value(&message).unwrap();
            assert_eq!(update.subject_id, "T2");
            assert!(update.node_updates.is_empty());
        }

        #[test]
        fn test_parse_skips_bad_entries() {
            let message = json!({
                "type": "graph_update",
                "data": {"subject_id": "T1", "updated_nodes": [
                    {"id": "a", "value": "high"},
                    {"value": 3.0},
                    {"id": "c", "value": 4.0}
                ]}
            });
            let update = parse_value(&message).unwrap();
            assert_eq!(update.node_updates, vec![NodeValueUpdate::new("c", 4.0)]);
        }

        #[test]
        fn test_parse_drops_malformed_messages() {
            assert!(parse_message("not json").is_none());
            assert!(parse_value(&json!({"type": "heartbeat"})).is_none());
            assert!(parse_value(&json!({"type": "graph_update"})).is_none());
            assert!(parse_value(&json!({
                "type": "graph_update",
                "data": {"updated_nodes": []}
            }))
            .is_none());
            assert!(parse_value(&json!({
                "type": "graph_update",
                "data": {"subject_id": "T1", "updated_nodes": {"id": "a"}}
            }))
            .is_none());
        }
    }
}
