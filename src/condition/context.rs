// SPDX-License-Identifier: MIT

//! Evaluation context
//!
//! The context is the external data a condition reads through the `context`
//! function. It is passed to every `evaluate` call and never stored on the
//! evaluator. Raw JSON text is decoded lazily, at most once per `Context`.

use super::error::ConditionError;
use super::value::kind_name;
use once_cell::sync::OnceCell;
use serde_json::Value;

static NULL: Value = Value::Null;

/// External data addressed by the `context` function
#[derive(Debug, Default)]
pub struct Context {
    source: Source,
    decoded: OnceCell<Value>,
}

#[derive(Debug, Default)]
enum Source {
    #[default]
    Empty,
    Raw(String),
    Value(Value),
}

impl Context {
    /// A context with no data; it resolves to `null`
    pub fn empty() -> Self {
        Self::default()
    }

    /// A context given as JSON text, decoded on first use
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            source: Source::Raw(text.into()),
            decoded: OnceCell::new(),
        }
    }

    /// A context given as an already decoded value
    pub fn value(value: Value) -> Self {
        Self {
            source: Source::Value(value),
            decoded: OnceCell::new(),
        }
    }

    /// Whether raw context text has already been decoded
    pub fn is_decoded(&self) -> bool {
        match self.source {
            Source::Raw(_) => self.decoded.get().is_some(),
            _ => true,
        }
    }

    /// The structured context value, decoding raw text if needed
    pub fn resolve(&self) -> Result<&Value, ConditionError> {
        match &self.source {
            Source::Empty => Ok(&NULL),
            Source::Value(value) => Ok(value),
            Source::Raw(text) if text.trim().is_empty() => Ok(&NULL),
            Source::Raw(text) => self.decoded.get_or_try_init(|| {
                log::debug!("decoding {} byte(s) of context", text.len());
                serde_json::from_str(text).map_err(ConditionError::from)
            }),
        }
    }

    /// Resolve the context and walk `path` into it
    pub fn lookup(&self, path: &[Value]) -> Result<Option<&Value>, ConditionError> {
        lookup(self.resolve()?, path)
    }
}

impl From<Value> for Context {
    fn from(value: Value) -> Self {
        Self::value(value)
    }
}

impl From<&str> for Context {
    fn from(text: &str) -> Self {
        Self::raw(text)
    }
}

impl From<String> for Context {
    fn from(text: String) -> Self {
        Self::raw(text)
    }
}

/// Walk `path` into `root`.
///
/// String segments index objects and number segments index arrays. A missing key or
/// position yields `None`; indexing into a value of the wrong shape is a type error.
pub fn lookup<'v>(root: &'v Value, path: &[Value]) -> Result<Option<&'v Value>, ConditionError> {
    let mut current = root;

    for segment in path {
        let next = match segment {
            Value::String(key) => match current {
                Value::Object(map) => map.get(key),
                other => {
                    return Err(ConditionError::type_error(format!(
                        "cannot index {} with key {:?}",
                        kind_name(other),
                        key
                    )))
                }
            },
            Value::Number(index) => match current {
                Value::Array(items) => index
                    .as_f64()
                    .filter(|i| *i >= 0.0 && i.fract() == 0.0)
                    .and_then(|i| items.get(i as usize)),
                other => {
                    return Err(ConditionError::type_error(format!(
                        "cannot index {} with position {}",
                        kind_name(other),
                        index
                    )))
                }
            },
            other => {
                return Err(ConditionError::type_error(format!(
                    "only strings and numbers supported as path segments, got {}",
                    kind_name(other)
                )))
            }
        };

        match next {
            Some(value) => current = value,
            None => return Ok(None),
        }
    }

    Ok(Some(current))
}
