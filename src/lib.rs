//! Alert expression pipeline core.
//!
//! A request is a flat list of named queries. Raw data-source queries are
//! delegated to a [`RawQueryExecutor`]; expressions (math, reduce, resample and
//! classic conditions) are evaluated here, after the dependency graph between
//! them has been validated and ordered. See [`Service`] for the entry point.

pub mod analysis;
pub mod classic;
pub mod compute;
pub mod config;
pub mod error;
pub mod functions;
pub mod graph;
pub mod service;
pub mod store;
pub mod validation;

pub use compute::{ComputationError, PipelineState, RawQueryExecutor, Results, Value, Vars};
pub use config::EngineConfig;
pub use error::PipelineError;
pub use functions::FunctionCatalog;
pub use graph::DataSourceQuery;
pub use service::{Pipeline, Service};
pub use store::{QueryDefinition, Request};
