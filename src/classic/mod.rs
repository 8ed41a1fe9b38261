//! Rule-based alert conditions (threshold, range, no-value).
pub mod condition;
pub mod evaluator;

pub use condition::{BoolOperator, ClassicConditions, ClassicError, Condition};
pub use evaluator::{Evaluator, EvaluatorError};
