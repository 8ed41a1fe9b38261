//! Static checks run on a freshly built dependency graph, before scheduling.
//!
//! Dependency resolution (missing, self reference, duplicate ref ids) happens
//! while the graph is assembled. The `Validator` then checks the whole-graph
//! rules: acyclicity first, then the classic-condition rules.

pub use self::error::ValidationError;
pub use self::validator::Validator;

// --- MODULE DECLARATIONS ---
mod error;
mod validator;
mod rules {
    pub mod classic;
    pub mod cycles;
}
