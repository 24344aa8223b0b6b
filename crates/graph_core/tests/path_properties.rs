//! Property tests for path analysis over random DAGs.
//!
//! DAGs are generated by only drawing edges from a lower to a higher node
//! index, so acyclicity holds by construction.

use std::collections::{HashMap, HashSet};

use graph_core::{
    critical_path, find_path, longest_distances, sensitivity_paths, ComputationGraph,
    GraphBuilder, GraphEdge, GraphNode, NodeGroup, NodeType,
};
use proptest::prelude::*;

fn build(
    node_count: usize,
    edges: &[(usize, usize)],
    targets: &[bool],
    outputs: &[bool],
) -> ComputationGraph {
    let mut builder = GraphBuilder::with_capacity(node_count, edges.len());
    for i in 0..node_count {
        let group = if outputs[i] {
            NodeGroup::Output
        } else {
            NodeGroup::Intermediate
        };
        let mut node = GraphNode::new(format!("N{}", i), NodeType::Add, format!("n{}", i), group);
        node.is_sensitivity_target = targets[i];
        builder.add_node(node);
    }
    for &(s, t) in edges {
        builder.add_edge(GraphEdge::new(format!("N{}", s), format!("N{}", t)));
    }
    builder.build(None)
}

fn dag_strategy() -> impl Strategy<Value = ComputationGraph> {
    (2usize..30).prop_flat_map(|n| {
        (
            Just(n),
            prop::collection::vec((0..n, 0..n), 0..(n * 3)),
            prop::collection::vec(any::<bool>(), n),
            prop::collection::vec(any::<bool>(), n),
        )
            .prop_map(|(n, pairs, targets, outputs)| {
                let edges: Vec<(usize, usize)> = pairs
                    .into_iter()
                    .filter(|(a, b)| a != b)
                    .map(|(a, b)| if a < b { (a, b) } else { (b, a) })
                    .collect();
                build(n, &edges, &targets, &outputs)
            })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn test_critical_path_length_matches_max_distance(graph in dag_strategy()) {
        let path = critical_path(&graph).unwrap();
        let distances = longest_distances(&graph).unwrap();
        let max = distances.values().copied().max().unwrap_or(0);

        prop_assert_eq!(path.len(), max + 1);
        prop_assert_eq!(distances[&path[0]], 0);
    }

    #[test]
    fn test_critical_path_follows_edges(graph in dag_strategy()) {
        let path = critical_path(&graph).unwrap();
        let edges: HashSet<(&str, &str)> = graph
            .edges
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str()))
            .collect();

        for pair in path.windows(2) {
            prop_assert!(edges.contains(&(pair[0].as_str(), pair[1].as_str())));
        }
    }

    #[test]
    fn test_back_edge_is_rejected(graph in dag_strategy()) {
        let path = critical_path(&graph).unwrap();
        prop_assume!(path.len() >= 2);

        let mut cyclic = graph.clone();
        cyclic.edges.push(GraphEdge::new(path[path.len() - 1].clone(), path[0].clone()));

        prop_assert!(critical_path(&cyclic).is_err());
    }

    #[test]
    fn test_sensitivity_paths_cover_connected_pairs(graph in dag_strategy()) {
        let paths = sensitivity_paths(&graph);
        let mut seen: HashMap<(String, String), usize> = HashMap::new();
        for entry in &paths {
            prop_assert_eq!(entry.path.first(), Some(&entry.target));
            prop_assert_eq!(entry.path.last(), Some(&entry.output));
            *seen.entry((entry.target.clone(), entry.output.clone())).or_default() += 1;
        }

        for target in graph.sensitivity_targets() {
            for output in graph.outputs() {
                if target.id == output.id {
                    continue;
                }
                let connected = find_path(&graph, &target.id, &output.id).is_some();
                let count = seen
                    .get(&(target.id.clone(), output.id.clone()))
                    .copied()
                    .unwrap_or(0);
                prop_assert_eq!(count, usize::from(connected));
            }
        }
    }
}

#[test]
fn test_scenario_chain() {
    let graph = build(3, &[(0, 1), (1, 2)], &[true, false, false], &[false, false, true]);
    assert_eq!(critical_path(&graph).unwrap(), vec!["N0", "N1", "N2"]);
}
