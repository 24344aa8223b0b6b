//! Error types for the engine layer.

use graph_core::GraphError;
use thiserror::Error;

use crate::listener::{EventKind, ListenerId};

/// Failure to obtain a snapshot from a graph source.
///
/// The cache entry for the requested subject is left untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// Connection, timeout or transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status
    #[error("HTTP {status} from {url}")]
    Status {
        /// Response status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Response body is not a graph snapshot
    #[error("Invalid graph payload: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}

/// A listener returned an error or panicked. Logged and returned to the
/// emitter for inspection; never propagated further.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Listener {listener} failed on {event}: {message}")]
pub struct ListenerError {
    /// Failing listener
    pub listener: ListenerId,
    /// Event being delivered
    pub event: EventKind,
    /// Error or panic message
    pub message: String,
}

/// Configuration error type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// IO error reading config file
    #[error("IO error: {0}")]
    Io(String),

    /// Parse error in config file
    #[error("Parse error: {0}")]
    Parse(String),

    /// One entry per invalid setting
    #[error("Validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
}

/// Errors surfaced by [`EngineContext`](crate::EngineContext) entry points.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Snapshot retrieval failed
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Graph analysis or LOD failure
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An operation needs a loaded graph
    #[error("No graph loaded")]
    NotLoaded,
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_core::CycleError;

    #[test]
    fn test_validation_message_joins_entries() {
        let err = ConfigError::Validation(vec!["a is bad".to_string(), "b is bad".to_string()]);
        assert_eq!(err.to_string(), "Validation errors: a is bad; b is bad");
    }

    #[test]
    fn test_engine_error_conversions() {
        let err: EngineError = GraphError::from(CycleError { ordered: 1, total: 3 }).into();
        assert!(matches!(err, EngineError::Graph(GraphError::Cycle(_))));

        let err: EngineError = FetchError::Status {
            status: 503,
            url: "http://x/api/graph".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "HTTP 503 from http://x/api/graph");
    }

    #[test]
    fn test_json_error_is_decode() {
        let err =
            serde_json::from_str::<graph_core::ComputationGraph>("{").map_err(FetchError::from);
        assert!(matches!(err, Err(FetchError::Decode(_))));
    }
}
