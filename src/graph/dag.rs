//! dag.rs
//! The per-request dependency graph.
//! Nodes live in a petgraph arena whose index is the node's input position;
//! edges point from a dependency to its consumer.

use super::node::Node;
use crate::store::{NodeId, RefId};
use crate::validation::ValidationError;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use smallvec::SmallVec;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<Node, ()>,
    /// Resolved `needs()` of every node, kept in mention order.
    deps: Vec<SmallVec<[NodeId; 2]>>,
    by_ref: HashMap<RefId, NodeId>,
}

impl DependencyGraph {
    /// Adds the nodes in input order and resolves every dependency by ref id.
    ///
    /// Fails on the first duplicate ref id, unknown dependency or self reference.
    /// Cycles are left for the validator.
    pub fn new(nodes: Vec<Node>) -> Result<Self, ValidationError> {
        let mut graph = DiGraph::with_capacity(nodes.len(), nodes.len());
        let mut by_ref = HashMap::with_capacity(nodes.len());

        for node in nodes {
            let ref_id = node.ref_id().to_string();
            let idx = graph.add_node(node);
            if by_ref.insert(ref_id.clone(), NodeId::new(idx.index())).is_some() {
                return Err(ValidationError::DuplicateRefId(ref_id));
            }
        }

        let mut deps = Vec::with_capacity(graph.node_count());
        for idx in graph.node_indices() {
            let node = &graph[idx];
            let mut resolved: SmallVec<[NodeId; 2]> = SmallVec::new();
            for needed in node.needs() {
                let Some(&dep) = by_ref.get(&needed) else {
                    return Err(ValidationError::MissingDependency {
                        ref_id: node.ref_id().to_string(),
                        needed,
                    });
                };
                if dep.index() == idx.index() {
                    return Err(ValidationError::SelfReference(needed));
                }
                resolved.push(dep);
            }
            deps.push(resolved);
        }

        for (i, resolved) in deps.iter().enumerate() {
            for dep in resolved {
                graph.add_edge(NodeIndex::new(dep.index()), NodeIndex::new(i), ());
            }
        }

        Ok(Self { graph, deps, by_ref })
    }

    pub fn node_count(&self) -> usize { self.graph.node_count() }
    pub fn is_empty(&self) -> bool { self.graph.node_count() == 0 }

    pub fn node(&self, id: NodeId) -> &Node { &self.graph[NodeIndex::new(id.index())] }

    pub fn find(&self, ref_id: &str) -> Option<NodeId> { self.by_ref.get(ref_id).copied() }

    /// Nodes in input order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.graph.node_indices().map(move |idx| (NodeId::new(idx.index()), &self.graph[idx]))
    }

    /// The nodes `id` reads, in the order its `needs()` mention them.
    pub fn dependencies(&self, id: NodeId) -> &[NodeId] { &self.deps[id.index()] }

    /// The nodes that read `id`.
    pub fn consumers(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.graph
            .neighbors_directed(NodeIndex::new(id.index()), Direction::Outgoing)
            .map(|idx| NodeId::new(idx.index()))
    }
}
