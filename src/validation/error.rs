//! Defines the error types for the validation module.
use crate::graph::NodeKind;
use crate::store::RefId;
use thiserror::Error;

/// A structural or rule violation found while assembling the dependency graph.
///
/// Every variant names the node(s) involved so callers can point the user at
/// the offending query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("duplicate ref id '{0}'")]
    DuplicateRefId(RefId),
    #[error("unable to find dependent query '{needed}' for '{ref_id}'")]
    MissingDependency { ref_id: RefId, needed: RefId },
    #[error("'{0}' is a self referencing node")]
    SelfReference(RefId),
    #[error("cyclic components: {}", .0.join(", "))]
    Cycle(Vec<RefId>),
    #[error(
        "only data source queries may be inputs to a classic condition, '{input}' used by '{ref_id}' is a {kind}"
    )]
    ClassicInputNotDataSource { ref_id: RefId, input: RefId, kind: NodeKind },
    #[error("classic conditions may not be the input for other expressions, but '{ref_id}' is used by '{consumer}'")]
    ClassicAsInput { ref_id: RefId, consumer: RefId },
}
