//! Fuzzy node search over a snapshot.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::Serialize;

use crate::types::ComputationGraph;

/// A node matched by [`search_nodes`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    /// Matching node ID
    pub id: String,
    /// Node label
    pub label: String,
    /// Match score (higher is better)
    pub score: i64,
}

fn match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

/// Rank nodes whose id or label fuzzily matches `query`.
///
/// Results are ordered by score, then by snapshot order. A blank query
/// matches nothing.
pub fn search_nodes(graph: &ComputationGraph, query: &str, limit: usize) -> Vec<SearchHit> {
    let query = query.trim();
    if query.is_empty() || limit == 0 {
        return Vec::new();
    }

    let matcher = SkimMatcherV2::default();
    let mut hits: Vec<(usize, SearchHit)> = graph
        .nodes
        .iter()
        .enumerate()
        .filter_map(|(order, node)| {
            let score = match_score(&matcher, &node.id, query)
                .into_iter()
                .chain(match_score(&matcher, &node.label, query))
                .max()?;
            Some((
                order,
                SearchHit {
                    id: node.id.clone(),
                    label: node.label.clone(),
                    score,
                },
            ))
        })
        .collect();

    hits.sort_by(|(oa, a), (ob, b)| b.score.cmp(&a.score).then(oa.cmp(ob)));
    hits.into_iter().take(limit).map(|(_, hit)| hit).collect()
}
