//! Tokenizer for math expressions.

use super::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    /// `$A` or `${A name}`.
    Var(String),
    Ident(String),
    LParen,
    RParen,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Pow,
    Bang,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Number(n) => n.to_string(),
            Token::Var(v) => format!("${v}"),
            Token::Ident(i) => i.clone(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
            Token::Plus => "+".into(),
            Token::Minus => "-".into(),
            Token::Star => "*".into(),
            Token::Slash => "/".into(),
            Token::Percent => "%".into(),
            Token::Pow => "**".into(),
            Token::Bang => "!".into(),
            Token::EqEq => "==".into(),
            Token::NotEq => "!=".into(),
            Token::Lt => "<".into(),
            Token::Le => "<=".into(),
            Token::Gt => ">".into(),
            Token::Ge => ">=".into(),
            Token::AndAnd => "&&".into(),
            Token::OrOr => "||".into(),
        }
    }
}

/// A token and the byte offset it starts at.
pub type Spanned = (Token, usize);

pub fn tokenize(input: &str) -> Result<Vec<Spanned>, ExprError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        let start = pos;

        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == b'.' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit)) {
            pos = scan_number(bytes, pos);
            let text = &input[start..pos];
            let value = text
                .parse::<f64>()
                .map_err(|_| ExprError::InvalidNumber { text: text.to_string(), pos: start })?;
            tokens.push((Token::Number(value), start));
            continue;
        }

        if c == b'$' {
            let (name, next) = scan_var(input, pos)?;
            tokens.push((Token::Var(name), start));
            pos = next;
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'_' {
            while pos < bytes.len() && is_ident_byte(bytes[pos]) {
                pos += 1;
            }
            tokens.push((Token::Ident(input[start..pos].to_string()), start));
            continue;
        }

        let next = bytes.get(pos + 1).copied();
        let (token, width) = match (c, next) {
            (b'*', Some(b'*')) => (Token::Pow, 2),
            (b'=', Some(b'=')) => (Token::EqEq, 2),
            (b'!', Some(b'=')) => (Token::NotEq, 2),
            (b'<', Some(b'=')) => (Token::Le, 2),
            (b'>', Some(b'=')) => (Token::Ge, 2),
            (b'&', Some(b'&')) => (Token::AndAnd, 2),
            (b'|', Some(b'|')) => (Token::OrOr, 2),
            (b'(', _) => (Token::LParen, 1),
            (b')', _) => (Token::RParen, 1),
            (b'+', _) => (Token::Plus, 1),
            (b'-', _) => (Token::Minus, 1),
            (b'*', _) => (Token::Star, 1),
            (b'/', _) => (Token::Slash, 1),
            (b'%', _) => (Token::Percent, 1),
            (b'!', _) => (Token::Bang, 1),
            (b'<', _) => (Token::Lt, 1),
            (b'>', _) => (Token::Gt, 1),
            _ => {
                let ch = input[pos..].chars().next().unwrap_or('?');
                return Err(ExprError::UnexpectedChar { ch, pos });
            }
        };
        tokens.push((token, start));
        pos += width;
    }

    Ok(tokens)
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn scan_number(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'.') {
        pos += 1;
    }
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let mut exp = pos + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            pos = exp;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }
    pos
}

/// Scans a variable starting at the `$`. Returns the name and the offset after it.
fn scan_var(input: &str, dollar: usize) -> Result<(String, usize), ExprError> {
    let bytes = input.as_bytes();
    let mut pos = dollar + 1;

    if bytes.get(pos) == Some(&b'{') {
        let body = pos + 1;
        let close = input[body..]
            .find('}')
            .map(|i| body + i)
            .ok_or(ExprError::UnterminatedVariable { pos: dollar })?;
        let name = input[body..close].trim();
        if name.is_empty() {
            return Err(ExprError::EmptyVariable { pos: dollar });
        }
        return Ok((name.to_string(), close + 1));
    }

    while pos < bytes.len() && is_ident_byte(bytes[pos]) {
        pos += 1;
    }
    if pos == dollar + 1 {
        return Err(ExprError::EmptyVariable { pos: dollar });
    }
    Ok((input[dollar + 1..pos].to_string(), pos))
}
