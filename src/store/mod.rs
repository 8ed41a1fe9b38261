//! Request inputs and the primitive types shared across the pipeline.
pub mod query;
pub mod types;

pub use query::{QueryDefinition, Request, EXPRESSION_DATASOURCE_NAME, EXPRESSION_DATASOURCE_UID};
pub use types::{Labels, NodeId, Point, RefId, TimeRange};
