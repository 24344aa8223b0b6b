//! Engine configuration.
//!
//! Loaded from a TOML file with environment variable overrides. Every
//! section and field has a default, so an empty file is a valid config.
//!
//! ```toml
//! log_level = "debug"
//!
//! [api]
//! base_url = "http://localhost:8080"
//!
//! [pipeline]
//! batch_window_ms = 50
//! settle_window_ms = 500
//!
//! [lod]
//! threshold = 10000
//! ```

use std::path::Path;
use std::time::Duration;

use graph_view::{LayoutConfig, LodConfig, DEFAULT_RASTER_THRESHOLD};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default window over which streamed updates are coalesced.
pub const DEFAULT_BATCH_WINDOW_MS: u64 = 50;

/// Default time a batch's visual effect stays on screen; no new batch is
/// applied meanwhile.
pub const DEFAULT_SETTLE_WINDOW_MS: u64 = 500;

/// Default number of history entries kept per node.
pub const DEFAULT_HISTORY_DEPTH: usize = 10;

/// Graph API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL; snapshots are fetched from `{base_url}/api/graph`
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Differential update pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Coalescing window in milliseconds
    pub batch_window_ms: u64,
    /// Settle window in milliseconds
    pub settle_window_ms: u64,
    /// History entries kept per node
    pub history_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_window_ms: DEFAULT_BATCH_WINDOW_MS,
            settle_window_ms: DEFAULT_SETTLE_WINDOW_MS,
            history_depth: DEFAULT_HISTORY_DEPTH,
        }
    }
}

/// Rendering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Visible node count above which the raster backend is used
    pub raster_threshold: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            raster_threshold: DEFAULT_RASTER_THRESHOLD,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Graph API
    #[serde(default)]
    pub api: ApiConfig,

    /// Update batching
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Backend selection
    #[serde(default)]
    pub render: RenderConfig,

    /// Force layout
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Level of detail
    #[serde(default)]
    pub lod: LodConfig,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            pipeline: PipelineConfig::default(),
            render: RenderConfig::default(),
            layout: LayoutConfig::default(),
            lod: LodConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply environment variable overrides
    ///
    /// Unparseable numeric values are ignored.
    pub fn with_env_override(mut self) -> Self {
        if let Ok(url) = std::env::var("GRAPH_API_URL") {
            self.api.base_url = url;
        }

        if let Some(ms) = env_parse("GRAPH_BATCH_WINDOW_MS") {
            self.pipeline.batch_window_ms = ms;
        }

        if let Some(ms) = env_parse("GRAPH_SETTLE_WINDOW_MS") {
            self.pipeline.settle_window_ms = ms;
        }

        if let Some(threshold) = env_parse("GRAPH_LOD_THRESHOLD") {
            self.lod.threshold = threshold;
        }

        if let Ok(log_level) = std::env::var("GRAPH_LOG_LEVEL") {
            self.log_level = log_level;
        }

        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.to_lowercase().as_str()) {
            errors.push(format!(
                "Invalid log_level '{}'. Valid values: {:?}",
                self.log_level, valid_log_levels
            ));
        }

        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            errors.push(format!(
                "Invalid api.base_url '{}'. Must start with http:// or https://",
                self.api.base_url
            ));
        }
        if self.api.timeout_secs == 0 {
            errors.push("api.timeout_secs must be greater than 0".to_string());
        }

        if self.pipeline.batch_window_ms == 0 {
            errors.push("pipeline.batch_window_ms must be greater than 0".to_string());
        }
        if self.pipeline.history_depth == 0 {
            errors.push("pipeline.history_depth must be greater than 0".to_string());
        }

        if self.render.raster_threshold == 0 {
            errors.push("render.raster_threshold must be greater than 0".to_string());
        }

        let layout = &self.layout;
        if !(layout.link_distance > 0.0) {
            errors.push("layout.link_distance must be positive".to_string());
        }
        if !(layout.width > 0.0 && layout.height > 0.0) {
            errors.push("layout.width and layout.height must be positive".to_string());
        }
        if layout.vector_collision_radius < 0.0 || layout.raster_collision_radius < 0.0 {
            errors.push("layout collision radii cannot be negative".to_string());
        }
        if layout.max_ticks == 0 {
            errors.push("layout.max_ticks must be greater than 0".to_string());
        }
        if !(layout.alpha_min > 0.0 && layout.alpha_min < 1.0) {
            errors.push(format!(
                "layout.alpha_min {} must lie strictly between 0 and 1",
                layout.alpha_min
            ));
        }
        if !(0.0..=1.0).contains(&layout.velocity_decay) {
            errors.push(format!(
                "layout.velocity_decay {} must lie between 0 and 1",
                layout.velocity_decay
            ));
        }

        if self.lod.min_cluster_size == 0 {
            errors.push("lod.min_cluster_size must be greater than 0".to_string());
        }
        if !(self.lod.cluster_radius.is_finite() && self.lod.cluster_radius > 0.0) {
            errors.push("lod.cluster_radius must be a positive number".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load from file with environment overrides and validate
    pub fn load_with_env_and_validate(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?.with_env_override();
        config.validate()?;
        Ok(config)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
