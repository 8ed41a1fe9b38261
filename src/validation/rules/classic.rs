//! Validation rules for classic conditions.

use crate::graph::{DependencyGraph, Node, NodeKind};
use crate::store::NodeId;
use crate::validation::error::ValidationError;

/// A classic condition may only read raw data-source queries.
pub(crate) fn validate_classic_inputs(graph: &DependencyGraph, node_id: NodeId, node: &Node) -> Option<ValidationError> {
    if node.kind() != NodeKind::ClassicConditions {
        return None;
    }
    graph.dependencies(node_id).iter().find_map(|&dep| {
        let input = graph.node(dep);
        (input.kind() != NodeKind::DataSource).then(|| ValidationError::ClassicInputNotDataSource {
            ref_id: node.ref_id().to_string(),
            input: input.ref_id().to_string(),
            kind: input.kind(),
        })
    })
}

/// Nothing may read the output of a classic condition.
pub(crate) fn validate_classic_not_consumed(
    graph: &DependencyGraph,
    node_id: NodeId,
    node: &Node,
) -> Option<ValidationError> {
    if node.kind() != NodeKind::ClassicConditions {
        return None;
    }
    // Report the earliest-listed consumer so the error is stable.
    graph.consumers(node_id).min().map(|consumer| ValidationError::ClassicAsInput {
        ref_id: node.ref_id().to_string(),
        consumer: graph.node(consumer).ref_id().to_string(),
    })
}
