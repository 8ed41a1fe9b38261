//! The central validator that orchestrates the execution of all validation rules.
use super::error::ValidationError;
use super::rules::{classic, cycles};
use crate::graph::DependencyGraph;

/// Runs the whole-graph rules against a resolved dependency graph.
pub struct Validator<'a> {
    graph: &'a DependencyGraph,
}

impl<'a> Validator<'a> {
    pub fn new(graph: &'a DependencyGraph) -> Self {
        Self { graph }
    }

    /// Returns the first violation. Acyclicity is checked before the
    /// classic-condition rules, and nodes are visited in input order.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(err) = cycles::validate_acyclic(self.graph) {
            return Err(err);
        }

        for (node_id, node) in self.graph.nodes() {
            if let Some(err) = classic::validate_classic_inputs(self.graph, node_id, node) {
                return Err(err);
            }
            if let Some(err) = classic::validate_classic_not_consumed(self.graph, node_id, node) {
                return Err(err);
            }
        }
        Ok(())
    }
}
