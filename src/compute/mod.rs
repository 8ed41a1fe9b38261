//! Evaluates a scheduled graph.
pub mod engine;
pub mod expr;
pub mod kernel;
pub mod ledger;

pub use engine::{Executor, PipelineState, RawQueryExecutor};
pub use ledger::{ComputationError, EvalMatch, Number, RawQueryError, Results, Series, Value, ValueKind, Vars};
