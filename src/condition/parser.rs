// SPDX-License-Identifier: MIT

//! Condition expression parser
//!
//! Grammar:
//!
//! ```text
//! expression := function | array | literal
//! function   := '{' <name: string-literal> ':' expression '}'
//! array      := '[' *expression ']'
//! literal    := number | string | boolean | null
//! ```
//!
//! The parser is an explicit state machine. Each state consumes at most one token and
//! yields the next state. Open arrays and functions live on a stack that exists only
//! while the tree is being built; closing a container pops it and attaches the finished
//! node to whatever is now on top.

use super::ast::{Function, Node};
use super::error::ConditionError;
use super::lexer::{lex, Lexeme, Separator};
use super::token::{Literal, Token};
use serde::{Deserialize, Serialize};

/// Size limits applied while parsing and evaluating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum number of nested arrays and functions
    pub max_depth: usize,
    /// Maximum number of nodes in a tree
    pub max_nodes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: 64,
            max_nodes: 10_000,
        }
    }
}

/// Parse a condition expression string into an AST using the default limits
pub fn parse(input: &str) -> Result<Node, ConditionError> {
    parse_with_limits(input, &Limits::default())
}

/// Parse a condition expression string into an AST
pub fn parse_with_limits(input: &str, limits: &Limits) -> Result<Node, ConditionError> {
    let stream = lex(input)?;
    let mut builder = Builder::new(&stream.lexemes, stream.end, *limits);

    let mut state = State::Expression;
    while let Some(next) = builder.step(state)? {
        state = next;
    }

    let root = builder.finish(stream.trailing)?;
    log::debug!(
        "parsed condition: {} node(s), depth {}",
        builder.nodes,
        root.depth()
    );
    Ok(root)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Expression,
    Literal,
    ArrayStart,
    ArrayValue,
    ArrayEnd,
    FunctionStart,
    FunctionValue,
    FunctionEnd,
}

/// A container that has been opened but not yet closed
enum Frame {
    Array(Vec<Node>),
    Function { name: String, argument: Option<Node> },
}

struct Builder<'a> {
    lexemes: &'a [Lexeme],
    pos: usize,
    end: usize,
    stack: Vec<Frame>,
    root: Option<Node>,
    nodes: usize,
    limits: Limits,
}

impl<'a> Builder<'a> {
    fn new(lexemes: &'a [Lexeme], end: usize, limits: Limits) -> Self {
        Self {
            lexemes,
            pos: 0,
            end,
            stack: Vec::new(),
            root: None,
            nodes: 0,
            limits,
        }
    }

    fn step(&mut self, state: State) -> Result<Option<State>, ConditionError> {
        match state {
            State::Expression => {
                let lexeme = self.peek("expression")?;
                check_separator(lexeme, None, "expression")?;
                dispatch_value(lexeme, "expression").map(Some)
            }
            State::Literal => {
                let lexeme = self.consume("literal")?;
                let literal = match &lexeme.token {
                    Token::Literal(literal) => literal.clone(),
                    other => return Err(ConditionError::syntax(lexeme.offset, "literal", other)),
                };
                self.count_node()?;
                Ok(self.complete(Node::Literal(literal)))
            }
            State::ArrayStart => {
                self.expect(Token::BracketOpen)?;
                self.count_node()?;
                self.open(Frame::Array(Vec::new()))?;
                Ok(Some(State::ArrayValue))
            }
            State::ArrayValue => {
                let lexeme = self.peek("array value or ']'")?;
                if lexeme.token == Token::BracketClose {
                    return Ok(Some(State::ArrayEnd));
                }
                let wanted = match self.stack.last() {
                    Some(Frame::Array(elements)) if !elements.is_empty() => Some(Separator::Comma),
                    _ => None,
                };
                check_separator(lexeme, wanted, "array value")?;
                dispatch_value(lexeme, "array value or ']'").map(Some)
            }
            State::ArrayEnd => {
                self.expect(Token::BracketClose)?;
                match self.stack.pop() {
                    Some(Frame::Array(elements)) => Ok(self.complete(Node::Array(elements))),
                    _ => Err(self.unbalanced("']'")),
                }
            }
            State::FunctionStart => {
                self.expect(Token::BraceOpen)?;
                let lexeme = self.consume("function name")?;
                check_separator(lexeme, None, "function name")?;
                let name = match &lexeme.token {
                    Token::Literal(Literal::String(name)) => name.clone(),
                    other => {
                        return Err(ConditionError::syntax(
                            lexeme.offset,
                            "function name (string literal)",
                            other,
                        ))
                    }
                };
                self.count_node()?;
                self.open(Frame::Function {
                    name,
                    argument: None,
                })?;
                Ok(Some(State::FunctionValue))
            }
            State::FunctionValue => {
                let lexeme = self.peek("function argument")?;
                check_separator(lexeme, Some(Separator::Colon), "function argument")?;
                dispatch_value(lexeme, "function argument").map(Some)
            }
            State::FunctionEnd => {
                self.expect(Token::BraceClose)?;
                match self.stack.pop() {
                    Some(Frame::Function {
                        name,
                        argument: Some(argument),
                    }) => Ok(self.complete(Node::Function(Function::new(name, argument)))),
                    _ => Err(self.unbalanced("'}'")),
                }
            }
        }
    }

    /// Attach a finished node to the open container and pick the state that follows
    /// a value inside it. Returns `None` once the root is complete.
    fn complete(&mut self, node: Node) -> Option<State> {
        match self.stack.last_mut() {
            None => {
                self.root = Some(node);
                None
            }
            Some(Frame::Array(elements)) => {
                elements.push(node);
                Some(State::ArrayValue)
            }
            Some(Frame::Function { argument, .. }) => {
                *argument = Some(node);
                Some(State::FunctionEnd)
            }
        }
    }

    fn finish(&mut self, trailing: Option<(Separator, usize)>) -> Result<Node, ConditionError> {
        if let Some(lexeme) = self.lexemes.get(self.pos) {
            return Err(ConditionError::syntax(
                lexeme.offset,
                "end of input",
                &lexeme.token,
            ));
        }
        if let Some((separator, offset)) = trailing {
            return Err(ConditionError::syntax(offset, "end of input", separator));
        }
        self.root
            .take()
            .ok_or_else(|| ConditionError::UnexpectedEnd {
                expected: "expression".to_string(),
            })
    }

    fn open(&mut self, frame: Frame) -> Result<(), ConditionError> {
        self.stack.push(frame);
        if self.stack.len() > self.limits.max_depth {
            return Err(ConditionError::LimitExceeded {
                limit: "nesting depth",
                max: self.limits.max_depth,
            });
        }
        Ok(())
    }

    fn count_node(&mut self) -> Result<(), ConditionError> {
        self.nodes += 1;
        if self.nodes > self.limits.max_nodes {
            return Err(ConditionError::LimitExceeded {
                limit: "node count",
                max: self.limits.max_nodes,
            });
        }
        Ok(())
    }

    fn peek(&self, expected: &str) -> Result<&'a Lexeme, ConditionError> {
        self.lexemes
            .get(self.pos)
            .ok_or_else(|| ConditionError::UnexpectedEnd {
                expected: expected.to_string(),
            })
    }

    fn consume(&mut self, expected: &str) -> Result<&'a Lexeme, ConditionError> {
        let lexeme = self.peek(expected)?;
        self.pos += 1;
        Ok(lexeme)
    }

    fn expect(&mut self, token: Token) -> Result<&'a Lexeme, ConditionError> {
        let expected = token.to_string();
        let lexeme = self.consume(&expected)?;
        if lexeme.token != token {
            return Err(ConditionError::syntax(lexeme.offset, expected, &lexeme.token));
        }
        // separators before an opening delimiter were checked when the value was dispatched
        let closing = matches!(token, Token::BracketClose | Token::BraceClose);
        if let Some(separator) = lexeme.separator.filter(|_| closing) {
            return Err(ConditionError::syntax(lexeme.offset, expected, separator));
        }
        Ok(lexeme)
    }

    fn unbalanced(&self, delimiter: &str) -> ConditionError {
        let offset = self
            .lexemes
            .get(self.pos.saturating_sub(1))
            .map(|l| l.offset)
            .unwrap_or(self.end);
        ConditionError::syntax(offset, "matching open container", delimiter)
    }
}

/// State that consumes the value starting at `lexeme`
fn dispatch_value(lexeme: &Lexeme, expected: &str) -> Result<State, ConditionError> {
    match lexeme.token {
        Token::BraceOpen => Ok(State::FunctionStart),
        Token::BracketOpen => Ok(State::ArrayStart),
        Token::Literal(_) => Ok(State::Literal),
        ref other => Err(ConditionError::syntax(lexeme.offset, expected, other)),
    }
}

fn check_separator(
    lexeme: &Lexeme,
    wanted: Option<Separator>,
    expected: &str,
) -> Result<(), ConditionError> {
    match (wanted, lexeme.separator) {
        (wanted, found) if wanted == found => Ok(()),
        (Some(wanted), None) => Err(ConditionError::syntax(
            lexeme.offset,
            wanted.to_string(),
            &lexeme.token,
        )),
        (_, Some(found)) => Err(ConditionError::syntax(lexeme.offset, expected, found)),
        (None, None) => Ok(()),
    }
}
