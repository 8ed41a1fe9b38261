use crate::analysis::Schedule;
use crate::compute::ledger::{ComputationError, RawQueryError, Results, Vars};
use crate::error::PipelineError;
use crate::functions::FunctionCatalog;
use crate::graph::{DataSourceQuery, DependencyGraph, Node, NodeKind};
use crate::store::NodeId;
use async_trait::async_trait;
use futures_util::future::join_all;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The external capability that runs raw data-source queries.
#[async_trait]
pub trait RawQueryExecutor: Send + Sync {
    async fn execute(&self, query: &DataSourceQuery) -> Result<Results, RawQueryError>;
}

/// Lifecycle of a pipeline: `Built -> Validated -> Scheduled -> Executing ->
/// Completed | Failed`. A completed pipeline may be executed again; `Failed`
/// is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    Built,
    Validated,
    Scheduled,
    Executing,
    Completed,
    Failed,
}

impl PipelineState {
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Built, Validated)
                | (Validated, Scheduled)
                | (Scheduled | Completed, Executing)
                | (Executing, Completed | Failed)
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Runs the nodes of a scheduled graph and collects their results.
pub struct Executor<'a> {
    graph: &'a DependencyGraph,
    schedule: &'a Schedule,
    catalog: &'a FunctionCatalog,
}

impl<'a> Executor<'a> {
    pub fn new(graph: &'a DependencyGraph, schedule: &'a Schedule, catalog: &'a FunctionCatalog) -> Self {
        Self { graph, schedule, catalog }
    }

    /// Executes every node, aborting on cancellation or once `timeout` elapses.
    /// No partial results are returned on failure.
    pub async fn execute(
        &self,
        raw: &dyn RawQueryExecutor,
        parallel: bool,
        cancel: &CancellationToken,
        timeout: Option<Duration>,
    ) -> Result<Vars, PipelineError> {
        let started = Instant::now();
        let run = async {
            match timeout {
                Some(limit) => match tokio::time::timeout(limit, self.run(raw, parallel)).await {
                    Ok(res) => res.map_err(PipelineError::from),
                    Err(_) => Err(PipelineError::Timeout(limit)),
                },
                None => self.run(raw, parallel).await.map_err(PipelineError::from),
            }
        };

        let res = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            res = run => res,
        };

        match &res {
            Ok(vars) => info!(nodes = vars.len(), elapsed_ms = started.elapsed().as_millis() as u64, "pipeline completed"),
            Err(PipelineError::Cancelled) => warn!("pipeline cancelled"),
            Err(PipelineError::Timeout(limit)) => warn!(timeout_ms = limit.as_millis() as u64, "pipeline timed out"),
            Err(err) => debug!(error = %err, "pipeline failed"),
        }
        res
    }

    pub async fn run(&self, raw: &dyn RawQueryExecutor, parallel: bool) -> Result<Vars, ComputationError> {
        if parallel {
            self.run_waves(raw).await
        } else {
            self.run_sequential(raw).await
        }
    }

    async fn run_sequential(&self, raw: &dyn RawQueryExecutor) -> Result<Vars, ComputationError> {
        let mut vars = Vars::new();
        for &id in self.schedule.order() {
            let node = self.graph.node(id);
            debug!(ref_id = node.ref_id(), kind = %node.kind(), "executing node");
            let results = self.execute_node(node, raw, &vars).await.map_err(|e| e.at_node(node.ref_id()))?;
            vars.publish(node.ref_id(), results)?;
        }
        Ok(vars)
    }

    /// Runs each wave concurrently: data-source queries are awaited together,
    /// expression nodes are evaluated on the rayon pool. Results are published
    /// in scheduled order. On failure the reported error is the one sequential
    /// execution would report.
    async fn run_waves(&self, raw: &dyn RawQueryExecutor) -> Result<Vars, ComputationError> {
        let mut vars = Vars::new();
        for wave in self.schedule.waves() {
            let (sources, exprs): (Vec<NodeId>, Vec<NodeId>) =
                wave.iter().copied().partition(|&id| self.graph.node(id).kind() == NodeKind::DataSource);
            debug!(sources = sources.len(), expressions = exprs.len(), "executing wave");

            let fetched = join_all(sources.iter().map(|&id| self.execute_node(self.graph.node(id), raw, &vars))).await;
            let computed: Vec<_> = exprs
                .par_iter()
                .map(|&id| self.graph.node(id).execute_expression(&vars, self.catalog))
                .collect();

            let mut outcomes: HashMap<NodeId, Result<Results, ComputationError>> =
                sources.into_iter().zip(fetched).chain(exprs.into_iter().zip(computed)).collect();

            let mut failed = None;
            for id in wave {
                let node = self.graph.node(id);
                match outcomes.remove(&id) {
                    Some(Ok(results)) => vars.publish(node.ref_id(), results)?,
                    Some(Err(err)) => {
                        failed.get_or_insert((id, err.at_node(node.ref_id())));
                    }
                    None => return Err(ComputationError::MissingVariable(node.ref_id().to_string())),
                }
            }
            if let Some((id, err)) = failed {
                return Err(self.first_failure(raw, &mut vars, id, err).await);
            }
        }
        Ok(vars)
    }

    /// Nodes of later waves may precede a failed node in the schedule.
    /// Sequential execution runs those first and can fail on one of them, so
    /// they are run here in order before `err` is reported.
    async fn first_failure(
        &self,
        raw: &dyn RawQueryExecutor,
        vars: &mut Vars,
        failed: NodeId,
        err: ComputationError,
    ) -> ComputationError {
        let order = self.schedule.order();
        let end = order.iter().position(|&id| id == failed).unwrap_or(order.len());
        for &id in &order[..end] {
            let node = self.graph.node(id);
            if vars.contains(node.ref_id()) {
                continue;
            }
            let published = match self.execute_node(node, raw, vars).await {
                Ok(results) => vars.publish(node.ref_id(), results),
                Err(e) => Err(e.at_node(node.ref_id())),
            };
            if let Err(earlier) = published {
                debug!(ref_id = node.ref_id(), "earlier node failed after its wave");
                return earlier;
            }
        }
        err
    }

    async fn execute_node(
        &self,
        node: &Node,
        raw: &dyn RawQueryExecutor,
        vars: &Vars,
    ) -> Result<Results, ComputationError> {
        match node {
            Node::DataSource(ds) => ds.execute(raw).await,
            other => other.execute_expression(vars, self.catalog),
        }
    }
}
