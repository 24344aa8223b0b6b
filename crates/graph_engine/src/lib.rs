//! # graph_engine: Synchronisation, Differential Updates and Engine Context
//!
//! ## Engine Layer Role
//!
//! graph_engine keeps displayed graphs in step with a pricing backend:
//! - Snapshot cache, subscriptions and event listeners (`manager`, `listener`)
//! - Graph sources over HTTP or in memory (`source`)
//! - Batched, de-duplicated value updates with per-node history (`pipeline`)
//! - Parsing and driving of the streaming update feed (`feed`)
//! - [`EngineContext`], the explicit owner of all engine state (`context`)
//!
//! Timers are modelled by a [`Clock`]; callers poll
//! [`EngineContext::tick`] at [`EngineContext::next_deadline`].
//!
//! ## Usage Example
//!
//! ```rust
//! use std::sync::Arc;
//! use graph_core::{GraphUpdate, NodeValueUpdate, TradeGraphGenerator};
//! use graph_engine::{EngineConfig, EngineContext, ManualClock, StaticGraphSource};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut generator = TradeGraphGenerator::new();
//! generator.register_trade("T001", vec!["spot", "vol"]);
//! generator.set_param_value("T001", "spot", 100.0).unwrap();
//!
//! let source = StaticGraphSource::from_generator(&generator).unwrap();
//! let clock = ManualClock::shared(0);
//! let mut ctx =
//!     EngineContext::with_clock(EngineConfig::default(), Arc::new(source), clock.clone());
//!
//! ctx.load(Some("T001")).await.unwrap();
//! ctx.subscribe("T001");
//! ctx.push_update(GraphUpdate {
//!     subject_id: "T001".to_string(),
//!     node_updates: vec![NodeValueUpdate::new("T001_spot", 101.0)],
//! });
//!
//! clock.advance(50);
//! let report = ctx.tick().unwrap();
//! assert_eq!(report.applied[0].change.delta, Some(1.0));
//! # }
//! ```

#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod feed;
pub mod listener;
pub mod manager;
pub mod pipeline;
pub mod source;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    ApiConfig, EngineConfig, PipelineConfig, RenderConfig, DEFAULT_BATCH_WINDOW_MS,
    DEFAULT_HISTORY_DEPTH, DEFAULT_SETTLE_WINDOW_MS,
};
pub use context::{EngineContext, LoadSummary};
pub use error::{ConfigError, EngineError, FetchError, ListenerError};
pub use feed::{parse_message, parse_value, run_feed, FeedSummary, GRAPH_UPDATE_TYPE};
pub use listener::{EventKind, GraphEvent, ListenerFn, ListenerId, ListenerRegistry};
pub use manager::{AppliedDelta, GraphManager, SubjectKey};
pub use pipeline::{Batch, BatchReport, HistoryEntry, Poll, UpdatePipeline};
pub use source::{GraphSource, HttpGraphSource, StaticGraphSource};
