//! graphviz-engine - Command Line Operations for Computation Graphs
//!
//! Operational entry point for the computation graph engine.
//!
//! # Commands
//!
//! - `graphviz-engine fetch [--subject <id>]` - Summarise a snapshot from the graph API
//! - `graphviz-engine analyse [--file <json>]` - Critical and sensitivity paths
//! - `graphviz-engine demo` - Synthetic graph through layout, rendering and LOD
//! - `graphviz-engine replay --feed <jsonl>` - Push an update feed through the pipeline
//!
//! # Architecture
//!
//! As the service layer, this crate wires `graph_engine` (and through it
//! `graph_view` and `graph_core`) to a command-line interface.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use graph_engine::EngineConfig;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod error;

pub use error::{CliError, Result};

use commands::analyse::AnalyseArgs;
use commands::demo::DemoArgs;
use commands::replay::ReplayArgs;

/// Computation graph engine CLI
#[derive(Parser)]
#[command(name = "graphviz-engine")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "graph-engine.toml")]
    config: PathBuf,

    /// Graph API base URL (overrides configuration)
    #[arg(long, global = true, env = "GRAPH_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a graph snapshot and summarise it
    Fetch {
        /// Subject id; the aggregate graph when omitted
        #[arg(short, long)]
        subject: Option<String>,

        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Critical path, sensitivity paths and search
    Analyse {
        /// Subject id to fetch when no file is given
        #[arg(short, long)]
        subject: Option<String>,

        /// Snapshot JSON file instead of the API
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Maximum sensitivity paths and search hits to print
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Fuzzy node search
        #[arg(long)]
        search: Option<String>,
    },

    /// Run layout, rendering mode selection and LOD on synthetic graphs
    Demo {
        /// Nodes in the synthetic layered graph
        #[arg(short, long, default_value = "12000")]
        nodes: usize,

        /// Layers in the synthetic layered graph
        #[arg(short, long, default_value = "8")]
        layers: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Replay a JSON-lines update feed through the update pipeline
    Replay {
        /// Feed file, one message per line
        #[arg(short, long)]
        feed: PathBuf,

        /// Subject the feed updates
        #[arg(short, long, default_value = "T001")]
        subject: String,

        /// Snapshot JSON file; a synthetic trade graph otherwise
        #[arg(short, long)]
        graph: Option<PathBuf>,

        /// Delay between feed lines in milliseconds
        #[arg(long, default_value = "0")]
        pace_ms: u64,
    },
}

fn load_config(path: &Path, api_url: Option<String>) -> anyhow::Result<EngineConfig> {
    let mut config = if path.exists() {
        EngineConfig::load_with_env_and_validate(path)
            .with_context(|| format!("loading {}", path.display()))?
    } else {
        let config = EngineConfig::default().with_env_override();
        config.validate().context("validating environment overrides")?;
        config
    };
    if let Some(url) = api_url {
        config.api.base_url = url;
    }
    Ok(config)
}

fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config, cli.api_url)?;

    init_tracing(if cli.verbose { "debug" } else { &config.log_level });
    info!(api = %config.api.base_url, "Configuration loaded");

    match cli.command {
        Commands::Fetch { subject, json } => {
            commands::fetch::run(&config, subject.as_deref(), json).await?
        }
        Commands::Analyse {
            subject,
            file,
            limit,
            search,
        } => {
            commands::analyse::run(
                &config,
                AnalyseArgs {
                    subject_id: subject.as_deref(),
                    file: file.as_deref(),
                    limit,
                    search: search.as_deref(),
                },
            )
            .await?
        }
        Commands::Demo {
            nodes,
            layers,
            seed,
        } => commands::demo::run(config, DemoArgs { nodes, layers, seed }).await?,
        Commands::Replay {
            feed,
            subject,
            graph,
            pace_ms,
        } => {
            commands::replay::run(
                config,
                ReplayArgs {
                    feed: &feed,
                    subject_id: &subject,
                    graph: graph.as_deref(),
                    pace_ms,
                },
            )
            .await?
        }
    }
    Ok(())
}
