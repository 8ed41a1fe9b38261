//! Defines the nodes of a request and the dependency graph between them.
pub mod dag;
pub mod node;

pub use dag::DependencyGraph;
pub use node::{
    ClassicConditionNode, DataSourceNode, DataSourceQuery, MathNode, Node, NodeBuilder, NodeKind, ParseError,
    ReduceNode, ResampleNode,
};
