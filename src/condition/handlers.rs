// SPDX-License-Identifier: MIT

//! Built-in functions
//!
//! Every built-in receives the function node and evaluates its own argument subtree,
//! which lets `and`, `or` and `if` skip the operands they do not need.

use super::ast::Function;
use super::error::ConditionError;
use super::evaluator::{Evaluation, Registry};
use super::token::{format_number, number_value};
use super::value::{deep_equal, is_truthy, kind_name};
use serde_json::Value;
use sha1::{Digest, Sha1};

/// Names of the built-in functions
pub const BUILTIN_NAMES: [&str; 11] = [
    "and", "or", "not", "if", "context", "gt", "lt", "gte", "lte", "eq", "sha1mod",
];

/// Create a registry holding every built-in function under its default name
pub fn builtin_registry() -> Registry {
    let mut registry = Registry::new();
    registry.add_handler("and", and);
    registry.add_handler("or", or);
    registry.add_handler("not", not);
    registry.add_handler("if", if_then_else);
    registry.add_handler("context", context);
    registry.add_handler("gt", gt);
    registry.add_handler("lt", lt);
    registry.add_handler("gte", gte);
    registry.add_handler("lte", lte);
    registry.add_handler("eq", eq);
    registry.add_handler("sha1mod", sha1mod);
    registry
}

/// True on the first truthy element, false otherwise
pub fn or(eval: &Evaluation<'_>, function: &Function) -> Result<Value, ConditionError> {
    for node in function.arguments()? {
        if is_truthy(&eval.evaluate(node)?) {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

/// False on the first falsy element, true otherwise
pub fn and(eval: &Evaluation<'_>, function: &Function) -> Result<Value, ConditionError> {
    for node in function.arguments()? {
        if !is_truthy(&eval.evaluate(node)?) {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

/// Negated truthiness of the single argument
pub fn not(eval: &Evaluation<'_>, function: &Function) -> Result<Value, ConditionError> {
    let value = eval.evaluate(&function.argument)?;
    Ok(Value::Bool(!is_truthy(&value)))
}

/// `[predicate, then, else?]`
pub fn if_then_else(eval: &Evaluation<'_>, function: &Function) -> Result<Value, ConditionError> {
    let args = function.arguments()?;
    if !(2..=3).contains(&args.len()) {
        return Err(ConditionError::arity("2 or 3", args.len()));
    }

    if is_truthy(&eval.evaluate(&args[0])?) {
        eval.evaluate(&args[1])
    } else if let Some(otherwise) = args.get(2) {
        eval.evaluate(otherwise)
    } else {
        Ok(Value::Null)
    }
}

/// Exact value and type equality of two operands
pub fn eq(eval: &Evaluation<'_>, function: &Function) -> Result<Value, ConditionError> {
    let args = function.exact_arguments(2)?;
    let left = eval.evaluate(&args[0])?;
    let right = eval.evaluate(&args[1])?;
    Ok(Value::Bool(deep_equal(&left, &right)))
}

pub fn gt(eval: &Evaluation<'_>, function: &Function) -> Result<Value, ConditionError> {
    compare_numbers(eval, function, |a, b| a > b)
}

pub fn gte(eval: &Evaluation<'_>, function: &Function) -> Result<Value, ConditionError> {
    compare_numbers(eval, function, |a, b| a >= b)
}

pub fn lt(eval: &Evaluation<'_>, function: &Function) -> Result<Value, ConditionError> {
    compare_numbers(eval, function, |a, b| a < b)
}

pub fn lte(eval: &Evaluation<'_>, function: &Function) -> Result<Value, ConditionError> {
    compare_numbers(eval, function, |a, b| a <= b)
}

fn compare_numbers<F>(
    eval: &Evaluation<'_>,
    function: &Function,
    cmp: F,
) -> Result<Value, ConditionError>
where
    F: Fn(f64, f64) -> bool,
{
    let args = function.exact_arguments(2)?;
    let left = expect_number(&eval.evaluate(&args[0])?)?;
    let right = expect_number(&eval.evaluate(&args[1])?)?;
    Ok(Value::Bool(cmp(left, right)))
}

fn expect_number(value: &Value) -> Result<f64, ConditionError> {
    value.as_f64().ok_or_else(|| {
        ConditionError::type_error(format!(
            "expected number as an argument, got {}",
            kind_name(value)
        ))
    })
}

/// Resolve a path of string and number segments in the evaluation context
pub fn context(eval: &Evaluation<'_>, function: &Function) -> Result<Value, ConditionError> {
    let path = eval.evaluate_all(function.arguments()?)?;
    let found = eval.context().lookup(&path)?;
    Ok(found.cloned().unwrap_or(Value::Null))
}

/// `[key, modulus]`: a stable bucket in `[0, modulus)` for `key`
pub fn sha1mod(eval: &Evaluation<'_>, function: &Function) -> Result<Value, ConditionError> {
    let args = function.exact_arguments(2)?;
    let key = eval.evaluate(&args[0])?;
    let modulus = expect_number(&eval.evaluate(&args[1])?)?.trunc();
    if !(1.0..=u64::MAX as f64).contains(&modulus) {
        return Err(ConditionError::type_error(format!(
            "modulus must be a positive integer, got {}",
            modulus
        )));
    }

    let digest = Sha1::digest(canonical_json(&key).as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let bucket = u64::from_be_bytes(prefix) % (modulus as u64);

    Ok(number_value(bucket as f64))
}

/// Stable serialization of a value used as the `sha1mod` key.
///
/// Object keys are sorted, integral numbers carry no fraction, numbers outside
/// `[1e-6, 1e21)` use exponent form (`1e+21`), and HTML-sensitive characters are
/// escaped, so keys bucket identically to existing deployments.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(&mut out, value);
    out
}

fn write_canonical(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => out.push_str(&i.to_string()),
            (_, Some(u), _) => out.push_str(&u.to_string()),
            (_, _, Some(f)) => out.push_str(&format_float(f)),
            _ => out.push_str(&n.to_string()),
        },
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_canonical(out, item);
            }
            out.push('}');
        }
    }
}

fn format_float(f: f64) -> String {
    format_number(f, -6, 21, 1)
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '<' | '>' | '&' | '\u{2028}' | '\u{2029}' => {
                out.push_str(&format!("\\u{:04x}", c as u32))
            }
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}
