//! Replay command: push a JSON-lines update feed through the update
//! pipeline against a snapshot file or a synthetic trade graph.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use graph_core::TradeGraphGenerator;
use graph_engine::{run_feed, EngineConfig, EngineContext, StaticGraphSource};

use super::read_graph_file;
use crate::{CliError, Result};

/// Replay settings.
#[derive(Debug, Clone)]
pub struct ReplayArgs<'a> {
    /// JSON-lines feed
    pub feed: &'a Path,
    /// Subject the feed updates
    pub subject_id: &'a str,
    /// Snapshot file; a synthetic trade graph otherwise
    pub graph: Option<&'a Path>,
    /// Delay between feed lines
    pub pace_ms: u64,
}

fn feed_stream(lines: Vec<String>, pace_ms: u64) -> BoxStream<'static, String> {
    if pace_ms == 0 {
        return stream::iter(lines).boxed();
    }
    stream::unfold((lines.into_iter(), true), move |(mut rest, first)| async move {
        let line = rest.next()?;
        if !first {
            tokio::time::sleep(Duration::from_millis(pace_ms)).await;
        }
        Some((line, (rest, false)))
    })
    .boxed()
}

/// Replay the feed and print what the pipeline did.
pub async fn run(config: EngineConfig, args: ReplayArgs<'_>) -> Result<()> {
    let source = match args.graph {
        Some(path) => {
            StaticGraphSource::new().with_graph(Some(args.subject_id), read_graph_file(path)?)
        }
        None => {
            let mut generator = TradeGraphGenerator::new();
            generator.register_trade(args.subject_id, vec!["spot", "vol", "rate"]);
            StaticGraphSource::from_generator(&generator)?
        }
    };

    let content = std::fs::read_to_string(args.feed).map_err(|source| CliError::Io {
        path: args.feed.display().to_string(),
        source,
    })?;
    let lines: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    let mut ctx = EngineContext::new(config, Arc::new(source));
    ctx.load(Some(args.subject_id)).await?;
    ctx.subscribe(args.subject_id);

    let summary = run_feed(&mut ctx, feed_stream(lines, args.pace_ms)).await;

    println!("Messages: {} read, {} accepted", summary.messages, summary.accepted);
    println!(
        "Batches:  {} ({} values applied, {} coalesced, {} skipped)",
        summary.batches, summary.applied, summary.coalesced, summary.skipped
    );

    let Some(graph) = ctx.snapshot() else {
        return Ok(());
    };
    println!();
    println!("{:<24} {:>14} {:>14} {:>8}", "Node", "Value", "Last delta", "Changes");
    for node in &graph.nodes {
        let history = ctx.history(&node.id);
        let Some(last) = history.last() else {
            continue;
        };
        println!(
            "{:<24} {:>14.6} {:>14} {:>8}",
            node.id,
            last.new_value,
            last.delta.map_or_else(|| "-".to_string(), |d| format!("{:+.6}", d)),
            history.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_paced_stream_yields_every_line() {
        let lines = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let start = tokio::time::Instant::now();

        let collected: Vec<String> = feed_stream(lines.clone(), 100).collect().await;

        assert_eq!(collected, lines);
        assert!(start.elapsed() >= Duration::from_millis(200));
    }
}
