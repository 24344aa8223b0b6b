//! Where snapshots come from.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use graph_core::{ComputationGraph, GraphError, TradeGraphGenerator};
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::FetchError;
use crate::manager::SubjectKey;

/// A provider of graph snapshots.
#[async_trait]
pub trait GraphSource: Send + Sync {
    /// Snapshot for `subject_id`, or the aggregate for `None`.
    async fn fetch_graph(&self, subject_id: Option<&str>) -> Result<ComputationGraph, FetchError>;

    /// Human-readable origin, for logs.
    fn describe(&self) -> String;
}

/// `GET {base_url}/api/graph[?subject_id=<id>]` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGraphSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGraphSource {
    /// Create a source with a request timeout.
    ///
    /// # Errors
    ///
    /// `Network` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Create a source from the `[api]` config section.
    pub fn from_config(config: &ApiConfig) -> Result<Self, FetchError> {
        Self::new(config.base_url.clone(), config.timeout())
    }

    /// Endpoint URL, without the query string.
    pub fn endpoint(&self) -> String {
        format!("{}/api/graph", self.base_url)
    }
}

#[async_trait]
impl GraphSource for HttpGraphSource {
    async fn fetch_graph(&self, subject_id: Option<&str>) -> Result<ComputationGraph, FetchError> {
        let url = self.endpoint();
        let mut request = self.client.get(&url);
        if let Some(id) = subject_id {
            request = request.query(&[("subject_id", id)]);
        }
        debug!(url = %url, subject = ?subject_id, "Fetching graph");

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }
        Ok(response.json::<ComputationGraph>().await?)
    }

    fn describe(&self) -> String {
        self.endpoint()
    }
}

/// In-memory snapshots, for demos, replays and tests.
#[derive(Debug, Default)]
pub struct StaticGraphSource {
    graphs: Mutex<HashMap<SubjectKey, ComputationGraph>>,
    offline: AtomicBool,
}

impl StaticGraphSource {
    /// Source with no snapshots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_graph(self, subject_id: Option<&str>, graph: ComputationGraph) -> Self {
        self.insert(subject_id, graph);
        self
    }

    /// Serve the generator's aggregate graph and every per-trade graph.
    ///
    /// # Errors
    ///
    /// `InvalidParameters` when no trade is registered.
    pub fn from_generator(generator: &TradeGraphGenerator) -> Result<Self, GraphError> {
        let source = Self::new().with_graph(None, generator.generate(None)?);
        for trade_id in generator.trade_ids() {
            source.insert(Some(trade_id), generator.generate(Some(trade_id))?);
        }
        Ok(source)
    }

    /// Serve `graph` for `subject_id`, replacing what was there.
    pub fn insert(&self, subject_id: Option<&str>, graph: ComputationGraph) {
        self.graphs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(SubjectKey::from_option(subject_id), graph);
    }

    /// While offline every fetch fails with a network error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl GraphSource for StaticGraphSource {
    async fn fetch_graph(&self, subject_id: Option<&str>) -> Result<ComputationGraph, FetchError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Network("static source is offline".to_string()));
        }
        let key = SubjectKey::from_option(subject_id);
        self.graphs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                status: 404,
                url: format!("static://{}", key),
            })
    }

    fn describe(&self) -> String {
        "static".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_source_from_generator() {
        let mut generator = TradeGraphGenerator::new();
        generator.register_trade("T001", vec!["spot", "vol"]);
        generator.register_trade("T002", vec!["rate"]);
        let source = StaticGraphSource::from_generator(&generator).unwrap();

        let all = source.fetch_graph(None).await.unwrap();
        let one = source.fetch_graph(Some("T002")).await.unwrap();
        assert!(all.nodes.len() > one.nodes.len());
        assert_eq!(one.metadata.subject_id.as_deref(), Some("T002"));
    }

    #[tokio::test]
    async fn test_static_source_missing_and_offline() {
        let source = StaticGraphSource::new();
        assert_eq!(
            source.fetch_graph(Some("T404")).await,
            Err(FetchError::Status {
                status: 404,
                url: "static://T404".to_string()
            })
        );
        source.set_offline(true);
        assert!(matches!(source.fetch_graph(None).await, Err(FetchError::Network(_))));
    }

    #[test]
    fn test_http_endpoint() {
        let source =
            HttpGraphSource::new("http://localhost:8080/", Duration::from_secs(5)).unwrap();
        assert_eq!(source.endpoint(), "http://localhost:8080/api/graph");
    }

    #[tokio::test]
    async fn test_http_unreachable_is_network_error() {
        let source =
            HttpGraphSource::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        assert!(matches!(source.fetch_graph(None).await, Err(FetchError::Network(_))));
    }
}
