use crate::graph::DependencyGraph;
use crate::store::{NodeId, RefId};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// Validation guarantees acyclicity; reaching this is an internal bug.
    #[error("unable to order nodes, unresolved: {}", .0.join(", "))]
    Unorderable(Vec<RefId>),
}

/// A dependency-respecting execution order over a validated graph.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schedule {
    order: Vec<NodeId>,
    /// Wave number of each node, indexed by `NodeId`. Wave 0 has no dependencies;
    /// a node's wave is one more than its deepest dependency.
    waves: Vec<usize>,
}

impl Schedule {
    pub fn order(&self) -> &[NodeId] { &self.order }
    pub fn len(&self) -> usize { self.order.len() }
    pub fn is_empty(&self) -> bool { self.order.is_empty() }

    /// Groups the scheduled nodes into waves that can run concurrently.
    /// Within a wave nodes keep their scheduled order.
    pub fn waves(&self) -> Vec<Vec<NodeId>> {
        let depth = self.waves.iter().copied().max().map_or(0, |d| d + 1);
        let mut out = vec![Vec::new(); depth];
        for &id in &self.order {
            out[self.waves[id.index()]].push(id);
        }
        out
    }
}

/// Performs a Topological Sort using Kahn's Algorithm.
///
/// Every dependency appears before its consumers. Among the nodes that are
/// ready at the same time, the one listed first in the request runs first, so
/// the order is a pure function of the request.
pub fn sort(graph: &DependencyGraph) -> Result<Schedule, ScheduleError> {
    let count = graph.node_count();
    let mut in_degree = vec![0usize; count];
    let mut waves = vec![0usize; count];
    let mut ready = BTreeSet::new();
    let mut order = Vec::with_capacity(count);

    for (id, _) in graph.nodes() {
        in_degree[id.index()] = graph.dependencies(id).len();
        if in_degree[id.index()] == 0 {
            ready.insert(id);
        }
    }

    while let Some(node) = ready.pop_first() {
        order.push(node);
        for consumer in graph.consumers(node) {
            let idx = consumer.index();
            waves[idx] = waves[idx].max(waves[node.index()] + 1);
            in_degree[idx] -= 1;
            if in_degree[idx] == 0 {
                ready.insert(consumer);
            }
        }
    }

    if order.len() != count {
        let residual = graph
            .nodes()
            .filter(|(id, _)| in_degree[id.index()] > 0)
            .map(|(_, n)| n.ref_id().to_string())
            .collect();
        return Err(ScheduleError::Unorderable(residual));
    }

    Ok(Schedule { order, waves })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::functions::FunctionCatalog;
    use crate::graph::NodeBuilder;
    use crate::store::QueryDefinition;
    use serde_json::json;
    use rstest::rstest;
    use std::collections::HashMap;

    fn graph(defs: &[(&str, Option<&str>)]) -> DependencyGraph {
        let catalog = FunctionCatalog::with_defaults();
        let config = EngineConfig::default();
        let builder = NodeBuilder::new(&catalog, &config);
        let nodes = defs
            .iter()
            .map(|(ref_id, expr)| {
                let def = match expr {
                    Some(e) => QueryDefinition::expression(*ref_id, json!({ "type": "math", "expression": e })),
                    None => QueryDefinition::new(*ref_id, "prom", json!({})),
                };
                builder.build(&def).unwrap()
            })
            .collect();
        DependencyGraph::new(nodes).unwrap()
    }

    fn names(g: &DependencyGraph, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|&id| g.node(id).ref_id().to_string()).collect()
    }

    #[test]
    fn test_dependency_runs_first() {
        // A = $B + 1, B raw.
        let g = graph(&[("A", Some("$B + 1")), ("B", None)]);
        let s = sort(&g).unwrap();
        assert_eq!(names(&g, s.order()), vec!["B", "A"]);
    }

    #[test]
    fn test_diamond_respects_input_order() {
        // D = $B + $C, B = $A, C = $A.
        let g = graph(&[("D", Some("$B + $C")), ("C", Some("$A")), ("B", Some("$A")), ("A", None)]);
        let s = sort(&g).unwrap();
        assert_eq!(names(&g, s.order()), vec!["A", "C", "B", "D"]);
        let waves: Vec<Vec<String>> = s.waves().iter().map(|w| names(&g, w)).collect();
        assert_eq!(waves, vec![vec!["A"], vec!["C", "B"], vec!["D"]]);
    }

    #[test]
    fn test_independent_nodes_keep_input_order() {
        let g = graph(&[("Z", None), ("Y", Some("2")), ("X", None)]);
        let s = sort(&g).unwrap();
        assert_eq!(names(&g, s.order()), vec!["Z", "Y", "X"]);
        assert_eq!(s.waves().len(), 1);
    }

    #[test]
    fn test_cycle_leaves_residual() {
        let g = graph(&[("A", Some("$B")), ("B", Some("$A")), ("C", None)]);
        let err = sort(&g).unwrap_err();
        assert_eq!(err, ScheduleError::Unorderable(vec!["A".into(), "B".into()]));
    }

    /// Small linear congruential generator so the random graphs are reproducible.
    struct Lcg(u64);

    impl Lcg {
        fn below(&mut self, n: usize) -> usize {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((self.0 >> 33) % n as u64) as usize
        }
    }

    #[rstest]
    #[case(1)]
    #[case(7)]
    #[case(42)]
    #[case(2024)]
    fn test_random_dags_are_ordered_deterministically(#[case] seed: u64) {
        let mut rng = Lcg(seed);
        let count = 20 + rng.below(60);

        // Node `N{rank}` only reads lower ranks; the request lists them shuffled.
        let mut defs: Vec<(String, Option<String>)> = (0..count)
            .map(|rank| {
                let reads: Vec<String> =
                    if rank == 0 { Vec::new() } else { (0..rng.below(4)).map(|_| format!("$N{}", rng.below(rank))).collect() };
                let expr = match (reads.is_empty(), rng.below(2)) {
                    (false, _) => Some(reads.join(" + ")),
                    (true, 0) => None,
                    (true, _) => Some("1".to_string()),
                };
                (format!("N{rank}"), expr)
            })
            .collect();
        for i in (1..defs.len()).rev() {
            defs.swap(i, rng.below(i + 1));
        }

        let refs: Vec<(&str, Option<&str>)> = defs.iter().map(|(r, e)| (r.as_str(), e.as_deref())).collect();
        let g = graph(&refs);
        let s = sort(&g).unwrap();
        assert_eq!(s.len(), count);

        let mut position = vec![usize::MAX; count];
        for (pos, id) in s.order().iter().enumerate() {
            position[id.index()] = pos;
        }
        let wave_of: HashMap<NodeId, usize> =
            s.waves().iter().enumerate().flat_map(|(w, ids)| ids.iter().map(move |&id| (id, w))).collect();
        for (id, node) in g.nodes() {
            for &dep in g.dependencies(id) {
                assert!(position[dep.index()] < position[id.index()], "{} runs before its input", node.ref_id());
                assert!(wave_of[&dep] < wave_of[&id]);
            }
        }

        for _ in 0..3 {
            assert_eq!(sort(&graph(&refs)).unwrap(), s);
        }
    }

    #[test]
    fn test_empty_graph() {
        let g = DependencyGraph::default();
        let s = sort(&g).unwrap();
        assert!(s.is_empty());
        assert!(s.waves().is_empty());
    }
}
