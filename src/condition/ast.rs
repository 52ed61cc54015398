// SPDX-License-Identifier: MIT

//! Abstract Syntax Tree for condition expressions
//!
//! The tree is built once by the parser and never mutated afterwards, so a parsed
//! expression can be shared across threads and evaluated against many contexts.

use super::error::ConditionError;
use super::token::Literal;

/// A node of a parsed condition expression
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A number, string, boolean or null
    Literal(Literal),
    /// Ordered elements, evaluated left to right
    Array(Vec<Node>),
    /// A named function applied to exactly one argument node
    Function(Function),
}

/// A function call: `{"name": argument}`
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub argument: Box<Node>,
}

impl Node {
    /// Build a function node
    pub fn function(name: impl Into<String>, argument: Node) -> Self {
        Node::Function(Function::new(name, argument))
    }

    /// Human-readable node kind, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Literal(_) => "literal",
            Node::Array(_) => "array",
            Node::Function(_) => "function",
        }
    }

    /// Child nodes in evaluation order
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Literal(_) => &[],
            Node::Array(elements) => elements,
            Node::Function(function) => std::slice::from_ref(function.argument.as_ref()),
        }
    }

    /// Longest path from this node to a leaf, counting this node
    pub fn depth(&self) -> usize {
        1 + self.children().iter().map(Node::depth).max().unwrap_or(0)
    }

    /// Total number of nodes in the tree
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(Node::node_count).sum::<usize>()
    }
}

impl Function {
    pub fn new(name: impl Into<String>, argument: Node) -> Self {
        Self {
            name: name.into(),
            argument: Box::new(argument),
        }
    }

    /// Positional arguments of a function whose argument is an array
    pub fn arguments(&self) -> Result<&[Node], ConditionError> {
        match self.argument.as_ref() {
            Node::Array(elements) => Ok(elements),
            other => Err(ConditionError::type_error(format!(
                "expected array input, got {}",
                other.kind_name()
            ))),
        }
    }

    /// Positional arguments, requiring an exact count
    pub fn exact_arguments(&self, count: usize) -> Result<&[Node], ConditionError> {
        let args = self.arguments()?;
        if args.len() != count {
            return Err(ConditionError::arity(count, args.len()));
        }
        Ok(args)
    }
}

impl From<Literal> for Node {
    fn from(literal: Literal) -> Self {
        Node::Literal(literal)
    }
}

impl From<Function> for Node {
    fn from(function: Function) -> Self {
        Node::Function(function)
    }
}
