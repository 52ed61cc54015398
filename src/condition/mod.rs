// SPDX-License-Identifier: MIT

//! Condition expressions
//!
//! A condition is written in a JSON-shaped grammar:
//! - literals: `1.5`, `"text"`, `true`, `null`
//! - arrays: `[1, "a", {"not": false}]`
//! - function calls, as a single-key object: `{"gt": [{"context": ["age"]}, 18]}`
//!
//! Expressions are parsed once into an immutable [`Node`] tree and evaluated any
//! number of times against different [`Context`] values.

mod ast;
mod context;
mod error;
mod evaluator;
mod handlers;
mod lexer;
mod parser;
mod printer;
mod token;
mod value;

pub use ast::{Function, Node};
pub use context::{lookup, Context};
pub use error::ConditionError;
pub use evaluator::{Evaluation, Evaluator, Handler, Registry};
pub use handlers::{builtin_registry, canonical_json, BUILTIN_NAMES};
pub use lexer::{lex, tokenize, Lexeme, Separator, TokenStream};
pub use parser::{parse, parse_with_limits, Limits};
pub use printer::{stringify, write_tree};
pub use token::{number_value, Literal, LiteralKind, Token};
pub use value::{deep_equal, is_truthy, kind_name};

/// Parse `input` and evaluate it with the built-in functions
pub fn evaluate_str(input: &str, context: &Context) -> Result<serde_json::Value, ConditionError> {
    let root = parse(input)?;
    Evaluator::with_builtins().evaluate(context, &root)
}
