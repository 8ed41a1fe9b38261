//! The math expression language: parsing once at build time, evaluation
//! against the published `Vars` at execution time.

pub mod lexer;
pub mod parser;

use super::kernel::{self, truth};
use super::ledger::{ComputationError, Results, Value, Vars};
use crate::store::RefId;
use parser::{Expr, Func, Parser};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("expression is empty")]
    Empty,
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("unexpected token '{found}' at position {pos}")]
    UnexpectedToken { found: String, pos: usize },
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("invalid number '{text}' at position {pos}")]
    InvalidNumber { text: String, pos: usize },
    #[error("unterminated variable at position {pos}")]
    UnterminatedVariable { pos: usize },
    #[error("empty variable name at position {pos}")]
    EmptyVariable { pos: usize },
    #[error("unknown function '{name}' at position {pos}")]
    UnknownFunction { name: String, pos: usize },
    #[error("expression is nested deeper than {limit} levels")]
    TooDeep { limit: usize },
}

/// A parsed math expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    text: String,
    root: Expr,
    vars: Vec<RefId>,
}

impl Expression {
    pub fn parse(text: &str) -> Result<Self, ExprError> {
        let root = Parser::new(lexer::tokenize(text)?).parse()?;
        let mut vars = Vec::new();
        root.collect_vars(&mut vars);
        Ok(Self { text: text.to_string(), root, vars })
    }

    pub fn text(&self) -> &str { &self.text }

    /// Referenced ref ids, deduplicated, in order of first appearance.
    pub fn vars(&self) -> &[RefId] { &self.vars }

    /// Evaluates the expression, naming every resulting value `ref_id`.
    pub fn execute(&self, ref_id: &str, vars: &Vars) -> Result<Results, ComputationError> {
        let values = eval(&self.root, vars)?;
        Ok(Results::new(values.into_iter().map(|v| v.renamed(ref_id)).collect()))
    }
}

fn eval(expr: &Expr, vars: &Vars) -> Result<Vec<Value>, ComputationError> {
    match expr {
        Expr::Number(n) => Ok(vec![Value::Scalar(*n)]),
        Expr::Var(name) => Ok(vars.require(name)?.values.clone()),
        Expr::Unary { op, expr } => {
            Ok(eval(expr, vars)?.iter().map(|v| kernel::unary(*op, v)).collect())
        }
        Expr::Binary { op, left, right } => {
            let l = eval(left, vars)?;
            let r = eval(right, vars)?;
            let out: Vec<Value> = pair(&l, &r)?.map(|(a, b)| kernel::binary(*op, a, b)).collect();
            Ok(out)
        }
        Expr::Call { func, arg } => {
            let f = *func;
            Ok(eval(arg, vars)?.iter().map(|v| kernel::map_value(v, |x| call(f, x))).collect())
        }
    }
}

fn call(func: Func, v: Option<f64>) -> Option<f64> {
    match func {
        Func::Abs => v.map(f64::abs),
        Func::Log => v.map(f64::ln),
        Func::IsNan => v.map(|x| truth(x.is_nan())),
        Func::IsInf => v.map(|x| truth(x.is_infinite())),
        Func::IsNull => Some(truth(v.is_none())),
        Func::IsNumber => Some(truth(v.is_some_and(f64::is_finite))),
    }
}

/// Pairs operand values by position. A single value is broadcast against
/// the other side; an empty side yields no values.
fn pair<'a>(
    left: &'a [Value],
    right: &'a [Value],
) -> Result<Box<dyn Iterator<Item = (&'a Value, &'a Value)> + 'a>, ComputationError> {
    if left.is_empty() || right.is_empty() {
        return Ok(Box::new(std::iter::empty()));
    }
    match (left.len(), right.len()) {
        (l, r) if l == r => Ok(Box::new(left.iter().zip(right))),
        (1, _) => Ok(Box::new(right.iter().map(move |r| (&left[0], r)))),
        (_, 1) => Ok(Box::new(left.iter().map(move |l| (l, &right[0])))),
        (l, r) => Err(ComputationError::Cardinality { left: l, right: r }),
    }
}
