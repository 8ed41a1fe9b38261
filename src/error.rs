//! Top-level error type of the pipeline.
use crate::analysis::ScheduleError;
use crate::compute::engine::PipelineState;
use crate::compute::ledger::ComputationError;
use crate::graph::ParseError;
use crate::validation::ValidationError;
use std::time::Duration;
use thiserror::Error;

/// Any failure of building or executing a pipeline. The stage-specific errors
/// are carried unchanged so callers can match on them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Computation(#[from] ComputationError),
    #[error("pipeline execution was cancelled")]
    Cancelled,
    #[error("pipeline execution timed out after {0:?}")]
    Timeout(Duration),
    #[error("pipeline cannot move from {from} to {to}")]
    InvalidState { from: PipelineState, to: PipelineState },
}
