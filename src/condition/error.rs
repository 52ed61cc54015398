// SPDX-License-Identifier: MIT

//! Error taxonomy for parsing and evaluating condition expressions

use thiserror::Error;

/// Errors raised while lexing, parsing or evaluating a condition expression
#[derive(Debug, Error)]
pub enum ConditionError {
    /// Malformed lexical input
    #[error("lex error at offset {offset}: {message}")]
    Lex { offset: usize, message: String },

    /// Wrong token at an expected grammar position
    #[error("syntax error at offset {offset}: expected {expected}, got {actual}")]
    Syntax {
        offset: usize,
        expected: String,
        actual: String,
    },

    /// Input ended where a token was required
    #[error("syntax error: unexpected end of input, expected {expected}")]
    UnexpectedEnd { expected: String },

    /// Expression exceeds the configured nesting depth or node count
    #[error("expression exceeds {limit} limit of {max}")]
    LimitExceeded { limit: &'static str, max: usize },

    /// No handler registered under the function name
    #[error("no expression handler bound to {0:?}")]
    UnknownFunction(String),

    /// Wrong number of arguments for a handler
    #[error("expected {expected} argument(s), got {actual}")]
    Arity { expected: String, actual: usize },

    /// Operand of the wrong runtime type
    #[error("{0}")]
    Type(String),

    /// Context text could not be decoded
    #[error("invalid context: {0}")]
    InvalidContext(#[from] serde_json::Error),

    /// Failure inside a handler, attributed to its registered name
    #[error("{function} expression: {source}")]
    Evaluation {
        function: String,
        #[source]
        source: Box<ConditionError>,
    },
}

impl ConditionError {
    /// Create a lex error
    pub fn lex(offset: usize, message: impl Into<String>) -> Self {
        Self::Lex {
            offset,
            message: message.into(),
        }
    }

    /// Create a syntax error naming the expected and actual token
    pub fn syntax(offset: usize, expected: impl Into<String>, actual: impl ToString) -> Self {
        Self::Syntax {
            offset,
            expected: expected.into(),
            actual: actual.to_string(),
        }
    }

    /// Create an arity error
    pub fn arity(expected: impl ToString, actual: usize) -> Self {
        Self::Arity {
            expected: expected.to_string(),
            actual,
        }
    }

    /// Create a type error
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type(message.into())
    }

    /// Wrap an error raised by the handler registered as `function`
    pub fn in_function(function: impl Into<String>, source: ConditionError) -> Self {
        Self::Evaluation {
            function: function.into(),
            source: Box::new(source),
        }
    }

    /// The innermost error, skipping every handler attribution layer
    pub fn root_cause(&self) -> &ConditionError {
        let mut current = self;
        while let Self::Evaluation { source, .. } = current {
            current = source;
        }
        current
    }

    /// Names of the handlers the error passed through, outermost first
    pub fn function_chain(&self) -> Vec<&str> {
        let mut chain = Vec::new();
        let mut current = self;
        while let Self::Evaluation { function, source } = current {
            chain.push(function.as_str());
            current = source;
        }
        chain
    }
}
