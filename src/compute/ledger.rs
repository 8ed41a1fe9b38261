use crate::store::{Labels, Point, RefId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Failure reported by the external raw-query capability.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct RawQueryError {
    pub message: String,
}

impl RawQueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComputationError {
    #[error("no results published for '{0}'")]
    MissingVariable(RefId),
    #[error("results for '{0}' were already published")]
    AlreadyPublished(RefId),
    #[error("mismatched cardinality: {left} values against {right} values")]
    Cardinality { left: usize, right: usize },
    #[error("can only reduce type series, got type {kind}")]
    InvalidReduceInput { kind: ValueKind },
    #[error("can only resample type series, got type {kind}")]
    InvalidResampleInput { kind: ValueKind },
    #[error("reducer '{0}' is not registered")]
    UnknownReducer(String),
    #[error("resample requires a time range")]
    MissingTimeRange,
    #[error("the series cannot be sampled further; the time range is shorter than the interval")]
    ResampleRange,
    #[error("resampling would produce {points} points, more than the limit of {limit}")]
    ResampleTooManyPoints { points: i64, limit: i64 },
    #[error("'{0}' is a data source query and must be run through the raw query executor")]
    NotAnExpression(RefId),
    #[error("data source query failed: {0}")]
    RawQuery(#[from] RawQueryError),
    #[error("failed to execute '{ref_id}': {source}")]
    Node {
        ref_id: RefId,
        #[source]
        source: Box<ComputationError>,
    },
}

impl ComputationError {
    /// Attaches the ref id of the node being executed.
    pub fn at_node(self, ref_id: &str) -> Self {
        match self {
            Self::Node { .. } => self,
            other => Self::Node { ref_id: ref_id.to_string(), source: Box::new(other) },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValueKind {
    Scalar,
    Number,
    Series,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar => write!(f, "scalar"),
            Self::Number => write!(f, "number"),
            Self::Series => write!(f, "series"),
        }
    }
}

/// A single labeled value. `None` means "no data", which is not zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Number {
    pub name: String,
    pub labels: Labels,
    pub value: Option<f64>,
}

impl Number {
    pub fn new(name: impl Into<String>, labels: Labels, value: Option<f64>) -> Self {
        Self { name: name.into(), labels, value }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub labels: Labels,
    pub points: Vec<Point>,
}

impl Series {
    pub fn new(name: impl Into<String>, labels: Labels, points: Vec<Point>) -> Self {
        Self { name: name.into(), labels, points }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Scalar(f64),
    Number(Number),
    Series(Series),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Scalar(_) => ValueKind::Scalar,
            Value::Number(_) => ValueKind::Number,
            Value::Series(_) => ValueKind::Series,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Value::Scalar(_) => "",
            Value::Number(n) => &n.name,
            Value::Series(s) => &s.name,
        }
    }

    pub fn labels(&self) -> Option<&Labels> {
        match self {
            Value::Scalar(_) => None,
            Value::Number(n) => Some(&n.labels),
            Value::Series(s) => Some(&s.labels),
        }
    }

    /// Renames a labeled value; scalars carry no name.
    pub fn renamed(mut self, name: &str) -> Self {
        match &mut self {
            Value::Scalar(_) => {}
            Value::Number(n) => n.name = name.to_string(),
            Value::Series(s) => s.name = name.to_string(),
        }
        self
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self { Value::Number(n) => Some(n), _ => None }
    }
}

/// One firing series of a classic condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalMatch {
    pub metric: String,
    pub labels: Labels,
    pub value: Option<f64>,
}

/// The ordered output of one node.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Results {
    pub values: Vec<Value>,
    /// Populated by classic conditions only.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<EvalMatch>,
}

impl Results {
    pub fn new(values: Vec<Value>) -> Self { Self { values, matches: Vec::new() } }
    pub fn single(value: Value) -> Self { Self::new(vec![value]) }
    pub fn len(&self) -> usize { self.values.len() }
    pub fn is_empty(&self) -> bool { self.values.is_empty() }
    pub fn iter(&self) -> impl Iterator<Item = &Value> { self.values.iter() }
}

/// Results published so far, keyed by ref id. Every ref id is written once.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Vars {
    values: BTreeMap<RefId, Results>,
}

impl Vars {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, ref_id: &str) -> Option<&Results> {
        self.values.get(ref_id)
    }

    pub fn require(&self, ref_id: &str) -> Result<&Results, ComputationError> {
        self.get(ref_id).ok_or_else(|| ComputationError::MissingVariable(ref_id.to_string()))
    }

    pub fn contains(&self, ref_id: &str) -> bool { self.values.contains_key(ref_id) }

    pub fn publish(&mut self, ref_id: &str, results: Results) -> Result<(), ComputationError> {
        if self.values.contains_key(ref_id) {
            return Err(ComputationError::AlreadyPublished(ref_id.to_string()));
        }
        self.values.insert(ref_id.to_string(), results);
        Ok(())
    }

    pub fn len(&self) -> usize { self.values.len() }
    pub fn is_empty(&self) -> bool { self.values.is_empty() }
    pub fn iter(&self) -> impl Iterator<Item = (&RefId, &Results)> { self.values.iter() }
    pub fn into_inner(self) -> BTreeMap<RefId, Results> { self.values }
}

impl FromIterator<(RefId, Results)> for Vars {
    fn from_iter<I: IntoIterator<Item = (RefId, Results)>>(iter: I) -> Self {
        Self { values: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_is_write_once() {
        let mut vars = Vars::new();
        vars.publish("A", Results::single(Value::Scalar(1.0))).unwrap();
        let err = vars.publish("A", Results::single(Value::Scalar(2.0))).unwrap_err();
        assert_eq!(err, ComputationError::AlreadyPublished("A".into()));
        assert_eq!(vars.get("A").unwrap().values[0], Value::Scalar(1.0));
    }

    #[test]
    fn test_require_missing() {
        let vars = Vars::new();
        assert!(matches!(vars.require("B"), Err(ComputationError::MissingVariable(r)) if r == "B"));
    }

    #[test]
    fn test_node_context_is_attached_once() {
        let err = ComputationError::MissingTimeRange.at_node("A").at_node("B");
        assert_eq!(err.to_string(), "failed to execute 'A': resample requires a time range");
    }
}
