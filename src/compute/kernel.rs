//! Numeric kernels that apply one operator to pipeline values.
//!
//! Arithmetic follows IEEE-754: `1 / 0` is `+Inf` and never an error. An
//! absent operand (a `Number` without a value or a null sample) yields an
//! absent result.

use super::ledger::{Number, Series, Value};
use crate::store::{Labels, Point};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[inline(always)]
pub(crate) fn truth(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

impl UnaryOp {
    #[inline(always)]
    pub fn apply(self, v: f64) -> f64 {
        match self {
            UnaryOp::Neg => -v,
            // Logical negation rendered as a float.
            UnaryOp::Not => truth(v == 0.0),
        }
    }
}

impl BinaryOp {
    #[inline(always)]
    pub fn apply(self, l: f64, r: f64) -> f64 {
        match self {
            BinaryOp::Add => l + r,
            BinaryOp::Sub => l - r,
            BinaryOp::Mul => l * r,
            BinaryOp::Div => l / r,
            BinaryOp::Mod => l % r,
            BinaryOp::Pow => l.powf(r),
            BinaryOp::Eq => truth(l == r),
            BinaryOp::Ne => truth(l != r),
            BinaryOp::Lt => truth(l < r),
            BinaryOp::Le => truth(l <= r),
            BinaryOp::Gt => truth(l > r),
            BinaryOp::Ge => truth(l >= r),
            BinaryOp::And => truth(l != 0.0 && r != 0.0),
            BinaryOp::Or => truth(l != 0.0 || r != 0.0),
        }
    }

    #[inline(always)]
    fn apply_opt(self, l: Option<f64>, r: Option<f64>) -> Option<f64> {
        Some(self.apply(l?, r?))
    }
}

/// Applies `f` to every sample (or the single value) of `value`.
pub fn map_value(value: &Value, f: impl Fn(Option<f64>) -> Option<f64>) -> Value {
    match value {
        Value::Scalar(v) => Value::Scalar(f(Some(*v)).unwrap_or(f64::NAN)),
        Value::Number(n) => Value::Number(Number::new("", n.labels.clone(), f(n.value))),
        Value::Series(s) => Value::Series(Series::new(
            "",
            s.labels.clone(),
            s.points.iter().map(|p| Point::new(p.time, f(p.value))).collect(),
        )),
    }
}

pub fn unary(op: UnaryOp, value: &Value) -> Value {
    map_value(value, |v| v.map(|x| op.apply(x)))
}

pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::Scalar(l), Value::Scalar(r)) => Value::Scalar(op.apply(*l, *r)),

        (Value::Scalar(l), Value::Number(r)) => {
            Value::Number(Number::new("", r.labels.clone(), op.apply_opt(Some(*l), r.value)))
        }
        (Value::Number(l), Value::Scalar(r)) => {
            Value::Number(Number::new("", l.labels.clone(), op.apply_opt(l.value, Some(*r))))
        }
        (Value::Number(l), Value::Number(r)) => Value::Number(Number::new(
            "",
            pick_labels(&l.labels, &r.labels),
            op.apply_opt(l.value, r.value),
        )),

        (Value::Series(l), Value::Series(r)) => {
            // Inner join on identical timestamps, keeping the left ordering.
            let rhs: HashMap<_, _> = r.points.iter().map(|p| (p.time, p.value)).collect();
            let points = l
                .points
                .iter()
                .filter_map(|p| rhs.get(&p.time).map(|rv| Point::new(p.time, op.apply_opt(p.value, *rv))))
                .collect();
            Value::Series(Series::new("", pick_labels(&l.labels, &r.labels), points))
        }

        (Value::Series(s), other) => {
            let rv = single_value(other);
            let points = s.points.iter().map(|p| Point::new(p.time, op.apply_opt(p.value, rv))).collect();
            Value::Series(Series::new("", s.labels.clone(), points))
        }
        (other, Value::Series(s)) => {
            let lv = single_value(other);
            let points = s.points.iter().map(|p| Point::new(p.time, op.apply_opt(lv, p.value))).collect();
            Value::Series(Series::new("", s.labels.clone(), points))
        }
    }
}

fn single_value(value: &Value) -> Option<f64> {
    match value {
        Value::Scalar(v) => Some(*v),
        Value::Number(n) => n.value,
        Value::Series(_) => None,
    }
}

fn pick_labels(left: &Labels, right: &Labels) -> Labels {
    if left.is_empty() { right.clone() } else { left.clone() }
}
