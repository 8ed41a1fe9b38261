//! Recursive-descent parser producing the expression AST.
//!
//! Precedence, lowest first: `||`, `&&`, comparisons, `+ -`, `* / %`,
//! unary `- !`, `**` (right associative).

use super::lexer::{Spanned, Token};
use super::ExprError;
use crate::compute::kernel::{BinaryOp, UnaryOp};
use crate::store::RefId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Abs,
    Log,
    IsNan,
    IsInf,
    IsNull,
    IsNumber,
}

impl Func {
    fn lookup(name: &str) -> Option<Self> {
        match name {
            "abs" => Some(Func::Abs),
            "log" => Some(Func::Log),
            "is_nan" => Some(Func::IsNan),
            "is_inf" => Some(Func::IsInf),
            "is_null" => Some(Func::IsNull),
            "is_number" => Some(Func::IsNumber),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Var(RefId),
    Unary { op: UnaryOp, expr: Box<Expr> },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    Call { func: Func, arg: Box<Expr> },
}

impl Expr {
    /// Collects referenced variables in order of first appearance.
    pub fn collect_vars(&self, out: &mut Vec<RefId>) {
        match self {
            Expr::Number(_) => {}
            Expr::Var(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Expr::Unary { expr, .. } | Expr::Call { arg: expr, .. } => expr.collect_vars(out),
            Expr::Binary { left, right, .. } => {
                left.collect_vars(out);
                right.collect_vars(out);
            }
        }
    }
}

/// Maximum nesting of the parsed tree. Operator chains count one level per operator.
pub const MAX_DEPTH: usize = 256;

pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned>) -> Self {
        Self { tokens, pos: 0, depth: 0 }
    }

    pub fn parse(mut self) -> Result<Expr, ExprError> {
        if self.tokens.is_empty() {
            return Err(ExprError::Empty);
        }
        let expr = self.parse_or()?;
        match self.tokens.get(self.pos) {
            None => Ok(expr),
            Some((tok, pos)) => Err(ExprError::UnexpectedToken { found: tok.describe(), pos: *pos }),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExprError> {
        match self.advance() {
            Some((tok, _)) if tok == expected => Ok(()),
            Some((tok, pos)) => Err(ExprError::UnexpectedToken { found: tok.describe(), pos }),
            None => Err(ExprError::UnexpectedEnd),
        }
    }

    fn enter(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::TooDeep { limit: MAX_DEPTH });
        }
        Ok(())
    }

    /// Parses one left-associative level.
    fn parse_level(
        &mut self,
        next: fn(&mut Self) -> Result<Expr, ExprError>,
        op_for: fn(&Token) -> Option<BinaryOp>,
    ) -> Result<Expr, ExprError> {
        let start = self.depth;
        let mut left = next(self)?;
        while let Some(op) = self.peek().and_then(op_for) {
            self.pos += 1;
            self.enter()?;
            let right = next(self)?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
        self.depth = start;
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        self.parse_level(Self::parse_and, |t| matches!(t, Token::OrOr).then_some(BinaryOp::Or))
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        self.parse_level(Self::parse_cmp, |t| matches!(t, Token::AndAnd).then_some(BinaryOp::And))
    }

    fn parse_cmp(&mut self) -> Result<Expr, ExprError> {
        self.parse_level(Self::parse_add, |t| match t {
            Token::EqEq => Some(BinaryOp::Eq),
            Token::NotEq => Some(BinaryOp::Ne),
            Token::Lt => Some(BinaryOp::Lt),
            Token::Le => Some(BinaryOp::Le),
            Token::Gt => Some(BinaryOp::Gt),
            Token::Ge => Some(BinaryOp::Ge),
            _ => None,
        })
    }

    fn parse_add(&mut self) -> Result<Expr, ExprError> {
        self.parse_level(Self::parse_mul, |t| match t {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn parse_mul(&mut self) -> Result<Expr, ExprError> {
        self.parse_level(Self::parse_unary, |t| match t {
            Token::Star => Some(BinaryOp::Mul),
            Token::Slash => Some(BinaryOp::Div),
            Token::Percent => Some(BinaryOp::Mod),
            _ => None,
        })
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Bang) => UnaryOp::Not,
            _ => return self.parse_power(),
        };
        self.pos += 1;
        self.enter()?;
        let expr = self.parse_unary()?;
        self.depth -= 1;
        Ok(Expr::Unary { op, expr: Box::new(expr) })
    }

    fn parse_power(&mut self) -> Result<Expr, ExprError> {
        let base = self.parse_primary()?;
        if matches!(self.peek(), Some(Token::Pow)) {
            self.pos += 1;
            self.enter()?;
            let exponent = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Expr::Binary { op: BinaryOp::Pow, left: Box::new(base), right: Box::new(exponent) });
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        match self.advance() {
            Some((Token::Number(n), _)) => Ok(Expr::Number(n)),
            Some((Token::Var(name), _)) => Ok(Expr::Var(name)),
            Some((Token::LParen, _)) => {
                self.enter()?;
                let inner = self.parse_or()?;
                self.depth -= 1;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some((Token::Ident(name), pos)) => {
                let func = Func::lookup(&name).ok_or(ExprError::UnknownFunction { name, pos })?;
                self.expect(Token::LParen)?;
                self.enter()?;
                let arg = self.parse_or()?;
                self.depth -= 1;
                self.expect(Token::RParen)?;
                Ok(Expr::Call { func, arg: Box::new(arg) })
            }
            Some((tok, pos)) => Err(ExprError::UnexpectedToken { found: tok.describe(), pos }),
            None => Err(ExprError::UnexpectedEnd),
        }
    }
}
