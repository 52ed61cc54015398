// SPDX-License-Identifier: MIT

//! Tokens produced by the lexer

use serde_json::Value;
use std::fmt;

/// Largest magnitude at which every integer is exactly representable as a double
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// A lexical token of the condition grammar
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// [
    BracketOpen,
    /// ]
    BracketClose,
    /// {
    BraceOpen,
    /// }
    BraceClose,
    /// number, string, boolean or null
    Literal(Literal),
}

/// Literal values in expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
}

/// Subkind of a literal token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Number,
    String,
    Boolean,
    Null,
}

impl Literal {
    pub fn kind(&self) -> LiteralKind {
        match self {
            Literal::Number(_) => LiteralKind::Number,
            Literal::String(_) => LiteralKind::String,
            Literal::Boolean(_) => LiteralKind::Boolean,
            Literal::Null => LiteralKind::Null,
        }
    }

    /// The value this literal evaluates to
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Number(n) => number_value(*n),
            Literal::String(s) => Value::String(s.clone()),
            Literal::Boolean(b) => Value::Bool(*b),
            Literal::Null => Value::Null,
        }
    }
}

/// Shortest round-trip decimal form of `n`.
///
/// Exponent form (`1e+21`, `1.5e-07`) is used when the decimal exponent is below
/// `min_exp` or at least `max_exp`. The exponent always carries a sign and is
/// zero-padded to `exp_digits` digits.
pub(crate) fn format_number(n: f64, min_exp: i32, max_exp: i32, exp_digits: usize) -> String {
    if n == 0.0 || !n.is_finite() {
        return n.to_string();
    }

    let scientific = format!("{:e}", n);
    let parsed = scientific
        .split_once('e')
        .and_then(|(mantissa, exp)| exp.parse::<i32>().ok().map(|exp| (mantissa, exp)));
    match parsed {
        Some((mantissa, exp)) if exp < min_exp || exp >= max_exp => format!(
            "{}e{}{:0width$}",
            mantissa,
            if exp < 0 { '-' } else { '+' },
            exp.unsigned_abs(),
            width = exp_digits
        ),
        _ => n.to_string(),
    }
}

/// Convert a double into a JSON value.
///
/// Integral values within ±2^53 become integer numbers so they serialize without a
/// fractional part. Non-finite values have no JSON form and become null.
pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

impl fmt::Display for LiteralKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralKind::Number => write!(f, "number"),
            LiteralKind::String => write!(f, "string"),
            LiteralKind::Boolean => write!(f, "bool"),
            LiteralKind::Null => write!(f, "null"),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "LITERAL<number::{}>", format_number(*n, -4, 6, 2)),
            Literal::String(s) => write!(f, "LITERAL<string::{}>", s),
            Literal::Boolean(b) => write!(f, "LITERAL<bool::{}>", b),
            Literal::Null => write!(f, "LITERAL<null>"),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::BracketOpen => write!(f, "BRACKET_OPEN"),
            Token::BracketClose => write!(f, "BRACKET_CLOSE"),
            Token::BraceOpen => write!(f, "BRACE_OPEN"),
            Token::BraceClose => write!(f, "BRACE_CLOSE"),
            Token::Literal(literal) => literal.fmt(f),
        }
    }
}
