//! # Graph Error Types
//!
//! Error types for computation graph processing and analysis.

use thiserror::Error;

/// The analysed graph is not a DAG.
///
/// Raised by the critical-path analysis when Kahn's algorithm orders fewer
/// nodes than the graph contains. Non-fatal: callers show an empty path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("graph contains a cycle: only {ordered} of {total} nodes could be ordered")]
pub struct CycleError {
    /// Nodes placed in topological order before the sort stalled
    pub ordered: usize,
    /// Total nodes in the graph
    pub total: usize,
}

impl CycleError {
    /// Number of nodes that sit on or behind a cycle.
    pub fn unordered(&self) -> usize {
        self.total.saturating_sub(self.ordered)
    }
}

/// Error type for graph processing operations.
///
/// # Example
///
/// ```rust
/// use graph_core::{CycleError, GraphError};
///
/// let error = GraphError::from(CycleError { ordered: 2, total: 3 });
/// assert!(error.to_string().contains("cycle"));
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// The graph contains a cycle.
    #[error(transparent)]
    Cycle(#[from] CycleError),

    /// A referenced node does not exist in the snapshot.
    #[error("Node '{0}' not found")]
    NodeNotFound(String),

    /// The requested subject has not been registered or loaded.
    #[error("Subject '{0}' not found")]
    SubjectNotFound(String),

    /// A referenced cluster does not exist.
    #[error("Cluster '{0}' not found")]
    ClusterNotFound(String),

    /// Graph generation parameters are invalid.
    #[error("Invalid graph parameters: {0}")]
    InvalidParameters(String),
}

impl GraphError {
    /// Create an invalid parameters error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameters(msg.into())
    }
}
