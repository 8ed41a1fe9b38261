//! Graph analysis that runs after validation: execution ordering.
pub mod topology;

pub use topology::{ScheduleError, Schedule};
