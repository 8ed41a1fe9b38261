//! Validation rule: the dependency graph must be acyclic.

use crate::graph::DependencyGraph;
use crate::store::NodeId;
use crate::validation::error::ValidationError;

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    None,
    Visiting,
    Visited,
}

/// Depth-first search over dependencies, starting from every node in input
/// order. Reaching a node that is still `Visiting` closes a cycle; the nodes on
/// the path from that point on are reported in path order.
pub(crate) fn validate_acyclic(graph: &DependencyGraph) -> Option<ValidationError> {
    let mut state = vec![VisitState::None; graph.node_count()];

    for (id, _) in graph.nodes() {
        if state[id.index()] == VisitState::None {
            if let Some(cycle) = visit(id, graph, &mut state) {
                let names = cycle.iter().map(|&n| graph.node(n).ref_id().to_string()).collect();
                return Some(ValidationError::Cycle(names));
            }
        }
    }
    None
}

/// Iterative DFS from `root`. Each frame holds a node and the position of the
/// next dependency to look at; the frames form the current path.
fn visit(root: NodeId, graph: &DependencyGraph, state: &mut [VisitState]) -> Option<Vec<NodeId>> {
    let mut frames: Vec<(NodeId, usize)> = vec![(root, 0)];
    state[root.index()] = VisitState::Visiting;

    while let Some(frame) = frames.last_mut() {
        let (node, next) = *frame;
        let Some(&dep) = graph.dependencies(node).get(next) else {
            state[node.index()] = VisitState::Visited;
            frames.pop();
            continue;
        };
        frame.1 += 1;

        match state[dep.index()] {
            VisitState::Visited => {}
            VisitState::Visiting => {
                let start = frames.iter().position(|&(n, _)| n == dep).unwrap_or(0);
                return Some(frames[start..].iter().map(|&(n, _)| n).collect());
            }
            VisitState::None => {
                state[dep.index()] = VisitState::Visiting;
                frames.push((dep, 0));
            }
        }
    }
    None
}
