//! Classic alert conditions: reduce, evaluate and combine with `and`/`or`.

use super::evaluator::{Evaluator, EvaluatorError};
use crate::compute::kernel::truth;
use crate::compute::ledger::{ComputationError, EvalMatch, Number, Results, Value, Vars};
use crate::functions::FunctionCatalog;
use crate::store::query::ClassicModel;
use crate::store::{Labels, RefId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassicError {
    #[error("classic condition has no conditions")]
    NoConditions,
    #[error("condition {index} is missing its query parameter")]
    MissingQuery { index: usize },
    #[error("condition {index} uses unknown reducer '{name}'")]
    UnknownReducer { index: usize, name: String },
    #[error("condition {index}: {source}")]
    Evaluator {
        index: usize,
        #[source]
        source: EvaluatorError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoolOperator {
    #[default]
    And,
    Or,
}

impl BoolOperator {
    /// Anything other than `or` combines with `and`.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("or") { BoolOperator::Or } else { BoolOperator::And }
    }

    fn combine(self, acc: bool, next: bool) -> bool {
        match self {
            BoolOperator::And => acc && next,
            BoolOperator::Or => acc || next,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub query_ref_id: RefId,
    pub reducer: String,
    pub evaluator: Evaluator,
    pub operator: BoolOperator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassicConditions {
    pub conditions: Vec<Condition>,
}

impl ClassicConditions {
    pub fn from_model(model: ClassicModel, catalog: &FunctionCatalog) -> Result<Self, ClassicError> {
        if model.conditions.is_empty() {
            return Err(ClassicError::NoConditions);
        }
        let mut conditions = Vec::with_capacity(model.conditions.len());
        for (index, cond) in model.conditions.into_iter().enumerate() {
            let query_ref_id = cond
                .query
                .params
                .into_iter()
                .next()
                .filter(|r| !r.is_empty())
                .ok_or(ClassicError::MissingQuery { index })?;
            if !catalog.has_reducer(&cond.reducer.kind) {
                return Err(ClassicError::UnknownReducer { index, name: cond.reducer.kind });
            }
            let evaluator = Evaluator::new(&cond.evaluator.kind, &cond.evaluator.params)
                .map_err(|source| ClassicError::Evaluator { index, source })?;
            let operator = cond.operator.map(|o| BoolOperator::parse(&o.kind)).unwrap_or_default();
            conditions.push(Condition { query_ref_id, reducer: cond.reducer.kind, evaluator, operator });
        }
        Ok(Self { conditions })
    }

    /// Evaluates all conditions left to right. The first condition's operator
    /// is ignored; each later one combines its outcome with the running result.
    pub fn execute(&self, ref_id: &str, vars: &Vars, catalog: &FunctionCatalog) -> Result<Results, ComputationError> {
        let mut firing = false;
        let mut matches = Vec::new();

        for (i, cond) in self.conditions.iter().enumerate() {
            let input = vars.require(&cond.query_ref_id)?;
            let reduce = catalog
                .reducer(&cond.reducer)
                .ok_or_else(|| ComputationError::UnknownReducer(cond.reducer.clone()))?;

            let reduced: Vec<Number> = if input.is_empty() {
                // No series at all is evaluated as a single absent value.
                vec![Number::new(cond.query_ref_id.clone(), Labels::new(), None)]
            } else {
                input
                    .iter()
                    .map(|value| match value {
                        Value::Series(s) => Ok(Number::new(s.name.clone(), s.labels.clone(), reduce(&s.points))),
                        Value::Number(n) => Ok(n.clone()),
                        Value::Scalar(_) => Err(ComputationError::InvalidReduceInput { kind: value.kind() }),
                    })
                    .collect::<Result<_, _>>()?
            };

            let mut cond_firing = false;
            for number in reduced {
                if cond.evaluator.eval(&number) {
                    cond_firing = true;
                    matches.push(EvalMatch { metric: number.name, labels: number.labels, value: number.value });
                }
            }

            firing = if i == 0 { cond_firing } else { cond.operator.combine(firing, cond_firing) };
        }

        Ok(Results {
            values: vec![Value::Number(Number::new(ref_id, Labels::new(), Some(truth(firing))))],
            matches,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::ledger::Series;
    use crate::store::Point;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn model(conditions: serde_json::Value) -> ClassicModel {
        serde_json::from_value(json!({ "conditions": conditions })).unwrap()
    }

    fn cond(query: &str, evaluator: &str, params: &[f64], op: &str) -> serde_json::Value {
        json!({
            "evaluator": { "type": evaluator, "params": params },
            "operator": { "type": op },
            "query": { "params": [query] },
            "reducer": { "type": "last" }
        })
    }

    fn series(name: &str, values: &[f64]) -> Value {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, v)| Point::new(Utc.timestamp_opt(i as i64, 0).unwrap(), Some(*v)))
            .collect();
        Value::Series(Series::new(name, Labels::new(), points))
    }

    fn firing(res: &Results) -> Option<f64> {
        res.values[0].as_number().and_then(|n| n.value)
    }

    #[test]
    fn test_any_series_fires_condition() {
        let catalog = FunctionCatalog::with_defaults();
        let cc = ClassicConditions::from_model(model(json!([cond("A", "gt", &[3.0], "and")])), &catalog).unwrap();
        let mut vars = Vars::new();
        vars.publish("A", Results::new(vec![series("low", &[1.0, 2.0]), series("high", &[1.0, 5.0])])).unwrap();

        let res = cc.execute("C", &vars, &catalog).unwrap();
        assert_eq!(firing(&res), Some(1.0));
        assert_eq!(res.matches.len(), 1);
        assert_eq!(res.matches[0].metric, "high");
        assert_eq!(res.matches[0].value, Some(5.0));
        assert_eq!(res.values[0].name(), "C");
    }

    #[test]
    fn test_and_or_combination() {
        let catalog = FunctionCatalog::with_defaults();
        let mut vars = Vars::new();
        vars.publish("A", Results::new(vec![series("a", &[10.0])])).unwrap();
        vars.publish("B", Results::new(vec![series("b", &[1.0])])).unwrap();

        let and = ClassicConditions::from_model(
            model(json!([cond("A", "gt", &[5.0], "and"), cond("B", "gt", &[5.0], "and")])),
            &catalog,
        )
        .unwrap();
        assert_eq!(firing(&and.execute("C", &vars, &catalog).unwrap()), Some(0.0));

        let or = ClassicConditions::from_model(
            model(json!([cond("A", "gt", &[5.0], "and"), cond("B", "gt", &[5.0], "or")])),
            &catalog,
        )
        .unwrap();
        assert_eq!(firing(&or.execute("C", &vars, &catalog).unwrap()), Some(1.0));

        // The first condition's operator does not matter.
        let first_or = ClassicConditions::from_model(
            model(json!([cond("B", "gt", &[5.0], "or"), cond("A", "gt", &[5.0], "and")])),
            &catalog,
        )
        .unwrap();
        assert_eq!(firing(&first_or.execute("C", &vars, &catalog).unwrap()), Some(0.0));
    }

    #[test]
    fn test_no_data_matches_no_value() {
        let catalog = FunctionCatalog::with_defaults();
        let cc = ClassicConditions::from_model(model(json!([cond("A", "no_value", &[], "and")])), &catalog).unwrap();
        let mut vars = Vars::new();
        vars.publish("A", Results::default()).unwrap();
        let res = cc.execute("C", &vars, &catalog).unwrap();
        assert_eq!(firing(&res), Some(1.0));
        assert_eq!(res.matches[0].value, None);
    }

    #[test]
    fn test_construction_errors() {
        let catalog = FunctionCatalog::with_defaults();
        assert_eq!(ClassicConditions::from_model(model(json!([])), &catalog), Err(ClassicError::NoConditions));

        let bad_eval = ClassicConditions::from_model(model(json!([cond("A", "between", &[1.0], "and")])), &catalog);
        assert!(bad_eval.unwrap_err().to_string().contains("invalid evaluator type"));

        let no_query = json!([{
            "evaluator": { "type": "gt", "params": [1] },
            "query": { "params": [] },
            "reducer": { "type": "avg" }
        }]);
        assert_eq!(
            ClassicConditions::from_model(model(no_query), &catalog),
            Err(ClassicError::MissingQuery { index: 0 })
        );

        let bad_reducer = json!([{
            "evaluator": { "type": "gt", "params": [1] },
            "query": { "params": ["A"] },
            "reducer": { "type": "p99" }
        }]);
        assert_eq!(
            ClassicConditions::from_model(model(bad_reducer), &catalog),
            Err(ClassicError::UnknownReducer { index: 0, name: "p99".into() })
        );
    }
}
