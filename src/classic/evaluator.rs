use crate::compute::ledger::Number;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluatorError {
    #[error("evaluator '{0}' is missing the threshold parameter")]
    MissingThreshold(String),
    #[error("ranged evaluator requires 2 parameters, got {0}")]
    RangedParams(usize),
    #[error("invalid evaluator type: {0}")]
    InvalidType(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdKind {
    Gt,
    Lt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    Within,
    Outside,
}

/// Decides whether a reduced value matches a classic condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluator {
    NoValue,
    Threshold { kind: ThresholdKind, threshold: f64 },
    /// Bounds are kept in the order given; matching does not depend on it.
    Ranged { kind: RangeKind, lower: f64, upper: f64 },
}

impl Evaluator {
    pub fn new(kind: &str, params: &[f64]) -> Result<Self, EvaluatorError> {
        match kind {
            "gt" | "lt" => {
                let threshold = *params.first().ok_or_else(|| EvaluatorError::MissingThreshold(kind.to_string()))?;
                let kind = if kind == "gt" { ThresholdKind::Gt } else { ThresholdKind::Lt };
                Ok(Evaluator::Threshold { kind, threshold })
            }
            "within_range" | "outside_range" => {
                let [lower, upper] = params else {
                    return Err(EvaluatorError::RangedParams(params.len()));
                };
                let kind = if kind == "within_range" { RangeKind::Within } else { RangeKind::Outside };
                Ok(Evaluator::Ranged { kind, lower: *lower, upper: *upper })
            }
            "no_value" => Ok(Evaluator::NoValue),
            other => Err(EvaluatorError::InvalidType(other.to_string())),
        }
    }

    pub fn eval(&self, reduced: &Number) -> bool {
        let value = reduced.value;
        match self {
            Evaluator::NoValue => value.is_none(),
            Evaluator::Threshold { kind, threshold } => match (kind, value) {
                (_, None) => false,
                (ThresholdKind::Gt, Some(v)) => v > *threshold,
                (ThresholdKind::Lt, Some(v)) => v < *threshold,
            },
            Evaluator::Ranged { kind, lower, upper } => {
                let Some(v) = value else { return false };
                match kind {
                    RangeKind::Within => (*lower < v && *upper > v) || (*upper < v && *lower > v),
                    RangeKind::Outside => (*upper < v && *lower < v) || (*upper > v && *lower > v),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Labels;
    use rstest::rstest;

    fn n(v: Option<f64>) -> Number {
        Number::new("", Labels::new(), v)
    }

    #[rstest]
    #[case("gt", vec![3.0], Some(5.0), true)]
    #[case("gt", vec![3.0], Some(2.0), false)]
    #[case("gt", vec![3.0], None, false)]
    #[case("lt", vec![3.0], Some(2.0), true)]
    #[case("lt", vec![3.0], Some(3.0), false)]
    #[case("within_range", vec![2.0, 3.0], Some(2.5), true)]
    #[case("within_range", vec![3.0, 2.0], Some(2.5), true)]
    #[case("within_range", vec![3.0, 2.0], Some(3.0), false)]
    #[case("within_range", vec![3.0, 2.0], Some(1.0), false)]
    #[case("within_range", vec![3.0, 2.0], None, false)]
    #[case("outside_range", vec![3.0, 2.0], Some(2.5), false)]
    #[case("outside_range", vec![3.0, 2.0], Some(1.0), true)]
    #[case("outside_range", vec![3.0, 2.0], Some(4.0), true)]
    #[case("outside_range", vec![2.0, 3.0], Some(4.0), true)]
    #[case("outside_range", vec![3.0, 2.0], None, false)]
    #[case("no_value", vec![], None, true)]
    #[case("no_value", vec![], Some(0.0), false)]
    fn test_eval(#[case] kind: &str, #[case] params: Vec<f64>, #[case] value: Option<f64>, #[case] expected: bool) {
        let e = Evaluator::new(kind, &params).unwrap();
        assert_eq!(e.eval(&n(value)), expected);
    }

    #[test]
    fn test_construction_errors() {
        assert_eq!(Evaluator::new("gt", &[]), Err(EvaluatorError::MissingThreshold("gt".into())));
        assert_eq!(Evaluator::new("within_range", &[1.0]), Err(EvaluatorError::RangedParams(1)));
        assert_eq!(Evaluator::new("outside_range", &[1.0, 2.0, 3.0]), Err(EvaluatorError::RangedParams(3)));
        let err = Evaluator::new("eq", &[1.0]).unwrap_err();
        assert!(err.to_string().contains("invalid evaluator type"));
    }
}
