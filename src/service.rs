//! The entry point: turns a request into a pipeline and executes it.
//!
//! ```text
//! Request -> NodeBuilder -> DependencyGraph -> Validator -> topology::sort -> Executor -> Vars
//! ```

use crate::analysis::{topology, Schedule};
use crate::compute::engine::{Executor, PipelineState, RawQueryExecutor};
use crate::compute::ledger::Vars;
use crate::config::EngineConfig;
use crate::error::PipelineError;
use crate::functions::FunctionCatalog;
use crate::graph::{DependencyGraph, Node, NodeBuilder};
use crate::store::Request;
use crate::validation::Validator;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A validated and scheduled graph, ready to execute.
#[derive(Debug, Clone)]
pub struct Pipeline {
    graph: DependencyGraph,
    schedule: Schedule,
    state: PipelineState,
}

impl Pipeline {
    pub fn state(&self) -> PipelineState { self.state }
    pub fn graph(&self) -> &DependencyGraph { &self.graph }
    pub fn len(&self) -> usize { self.schedule.len() }
    pub fn is_empty(&self) -> bool { self.schedule.is_empty() }

    /// Ref ids in execution order.
    pub fn order(&self) -> Vec<&str> {
        self.schedule.order().iter().map(|&id| self.graph.node(id).ref_id()).collect()
    }

    fn transition(&mut self, next: PipelineState) -> Result<(), PipelineError> {
        if !self.state.can_transition_to(next) {
            warn!(from = %self.state, to = %next, "rejected pipeline state transition");
            return Err(PipelineError::InvalidState { from: self.state, to: next });
        }
        debug!(from = %self.state, to = %next, "pipeline state");
        self.state = next;
        Ok(())
    }
}

/// Holds the configuration and reducer catalog shared by every request.
#[derive(Debug, Clone)]
pub struct Service {
    config: EngineConfig,
    catalog: FunctionCatalog,
}

impl Default for Service {
    fn default() -> Self {
        Self::new(EngineConfig::default(), FunctionCatalog::with_defaults())
    }
}

impl Service {
    pub fn new(config: EngineConfig, catalog: FunctionCatalog) -> Self {
        Self { config, catalog }
    }

    pub fn config(&self) -> &EngineConfig { &self.config }
    pub fn catalog(&self) -> &FunctionCatalog { &self.catalog }

    /// Builds one node per query, resolves and validates the dependency graph,
    /// and computes the execution order. Fails on the first error found.
    pub fn build_pipeline(&self, request: &Request) -> Result<Pipeline, PipelineError> {
        let builder = NodeBuilder::new(&self.catalog, &self.config);
        let nodes = request
            .queries
            .iter()
            .map(|q| {
                let node = builder.build(q)?;
                debug!(ref_id = node.ref_id(), kind = %node.kind(), "built node");
                Ok(node)
            })
            .collect::<Result<Vec<Node>, PipelineError>>()?;

        let graph = DependencyGraph::new(nodes)?;
        let mut pipeline = Pipeline { graph, schedule: Schedule::default(), state: PipelineState::Built };

        Validator::new(&pipeline.graph).validate()?;
        pipeline.transition(PipelineState::Validated)?;

        pipeline.schedule = topology::sort(&pipeline.graph)?;
        pipeline.transition(PipelineState::Scheduled)?;
        debug!(order = ?pipeline.order(), "scheduled pipeline");

        Ok(pipeline)
    }

    /// Executes a pipeline against the raw-query capability. Each ref id is
    /// published once; the first failure aborts the run without partial results
    /// and leaves the pipeline `Failed`, after which it cannot be executed again.
    pub async fn execute_pipeline(
        &self,
        pipeline: &mut Pipeline,
        raw: &dyn RawQueryExecutor,
        cancel: &CancellationToken,
    ) -> Result<Vars, PipelineError> {
        pipeline.transition(PipelineState::Executing)?;
        let res = Executor::new(&pipeline.graph, &pipeline.schedule, &self.catalog)
            .execute(raw, self.config.parallel_branches, cancel, self.config.query_timeout())
            .await;
        pipeline.transition(if res.is_ok() { PipelineState::Completed } else { PipelineState::Failed })?;
        res
    }
}
