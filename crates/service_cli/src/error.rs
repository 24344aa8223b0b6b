//! CLI error types.

use graph_core::GraphError;
use graph_engine::{ConfigError, EngineError, FetchError};
use thiserror::Error;

/// Failures of a CLI command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid or unreadable configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Graph retrieval failed
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Engine entry point failed
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Graph construction or analysis failed
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// File could not be read
    #[error("Cannot read {path}: {source}")]
    Io {
        /// Offending path
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// File content is not what the command expects
    #[error("Invalid input in {path}: {message}")]
    InvalidInput {
        /// Offending path
        path: String,
        /// What is wrong
        message: String,
    },
}

/// Result type for CLI commands.
pub type Result<T> = std::result::Result<T, CliError>;
