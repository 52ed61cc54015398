// SPDX-License-Identifier: MIT

//! Tokenizer for condition expressions
//!
//! Input follows JSON lexical rules. Only delimiters and literals become tokens;
//! the `,` and `:` separators are recorded on the token that follows them so the
//! parser can check their placement.

use super::error::ConditionError;
use super::token::{Literal, Token};
use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

/// A separator that preceded a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    Comma,
    Colon,
}

impl fmt::Display for Separator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Separator::Comma => write!(f, "','"),
            Separator::Colon => write!(f, "':'"),
        }
    }
}

/// A token with its byte offset and preceding separator
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub offset: usize,
    pub separator: Option<Separator>,
}

/// Output of the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct TokenStream {
    pub lexemes: Vec<Lexeme>,
    /// Byte length of the input
    pub end: usize,
    /// A separator left dangling after the last token
    pub trailing: Option<(Separator, usize)>,
}

/// Tokenize an expression into delimiter and literal tokens
pub fn tokenize(input: &str) -> Result<Vec<Token>, ConditionError> {
    Ok(lex(input)?.lexemes.into_iter().map(|l| l.token).collect())
}

/// Tokenize an expression keeping offsets and separators
pub fn lex(input: &str) -> Result<TokenStream, ConditionError> {
    Lexer::new(input).run()
}

struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    pending: Option<(Separator, usize)>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            pending: None,
        }
    }

    fn run(mut self) -> Result<TokenStream, ConditionError> {
        let mut lexemes = Vec::new();

        while let Some(&(offset, c)) = self.chars.peek() {
            let token = match c {
                ' ' | '\t' | '\n' | '\r' => {
                    self.chars.next();
                    continue;
                }
                ',' | ':' => {
                    self.chars.next();
                    let sep = if c == ',' {
                        Separator::Comma
                    } else {
                        Separator::Colon
                    };
                    if let Some((prev, _)) = self.pending {
                        return Err(ConditionError::lex(
                            offset,
                            format!("unexpected {} after {}", sep, prev),
                        ));
                    }
                    self.pending = Some((sep, offset));
                    continue;
                }
                '[' => self.single(Token::BracketOpen),
                ']' => self.single(Token::BracketClose),
                '{' => self.single(Token::BraceOpen),
                '}' => self.single(Token::BraceClose),
                '"' => Token::Literal(Literal::String(self.string(offset)?)),
                '-' | '0'..='9' => Token::Literal(Literal::Number(self.number(offset)?)),
                'a'..='z' | 'A'..='Z' => Token::Literal(self.keyword(offset)?),
                other => {
                    return Err(ConditionError::lex(
                        offset,
                        format!("invalid character {:?}", other),
                    ))
                }
            };

            lexemes.push(Lexeme {
                token,
                offset,
                separator: self.pending.take().map(|(sep, _)| sep),
            });
        }

        Ok(TokenStream {
            lexemes,
            end: self.input.len(),
            trailing: self.pending,
        })
    }

    fn single(&mut self, token: Token) -> Token {
        self.chars.next();
        token
    }

    fn string(&mut self, start: usize) -> Result<String, ConditionError> {
        // opening quote
        self.chars.next();
        let mut working = String::new();

        loop {
            let (offset, c) = self
                .chars
                .next()
                .ok_or_else(|| ConditionError::lex(start, "unterminated string"))?;

            match c {
                '"' => return Ok(working),
                '\\' => {
                    let (esc_offset, escaped) = self
                        .chars
                        .next()
                        .ok_or_else(|| ConditionError::lex(start, "unterminated string"))?;
                    match escaped {
                        '"' => working.push('"'),
                        '\\' => working.push('\\'),
                        '/' => working.push('/'),
                        'b' => working.push('\u{8}'),
                        'f' => working.push('\u{c}'),
                        'n' => working.push('\n'),
                        'r' => working.push('\r'),
                        't' => working.push('\t'),
                        'u' => working.push(self.unicode_escape(esc_offset)?),
                        other => {
                            return Err(ConditionError::lex(
                                esc_offset,
                                format!("invalid escape character {:?}", other),
                            ))
                        }
                    }
                }
                c if (c as u32) < 0x20 => {
                    return Err(ConditionError::lex(
                        offset,
                        "control character in string literal",
                    ))
                }
                c => working.push(c),
            }
        }
    }

    fn hex4(&mut self, offset: usize) -> Result<u32, ConditionError> {
        let mut code = 0;
        for _ in 0..4 {
            let digit = self
                .chars
                .next()
                .and_then(|(_, c)| c.to_digit(16))
                .ok_or_else(|| ConditionError::lex(offset, "invalid unicode escape"))?;
            code = code * 16 + digit;
        }
        Ok(code)
    }

    fn unicode_escape(&mut self, offset: usize) -> Result<char, ConditionError> {
        let high = self.hex4(offset)?;

        if (0xD800..0xDC00).contains(&high) {
            let backslash = self.chars.next().map(|(_, c)| c);
            let marker = self.chars.next().map(|(_, c)| c);
            if backslash != Some('\\') || marker != Some('u') {
                return Err(ConditionError::lex(offset, "unpaired surrogate in escape"));
            }
            let low = self.hex4(offset)?;
            if !(0xDC00..0xE000).contains(&low) {
                return Err(ConditionError::lex(offset, "unpaired surrogate in escape"));
            }
            let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
            return char::from_u32(code)
                .ok_or_else(|| ConditionError::lex(offset, "invalid unicode escape"));
        }

        char::from_u32(high)
            .ok_or_else(|| ConditionError::lex(offset, "unpaired surrogate in escape"))
    }

    fn take_digits(&mut self) -> usize {
        let mut count = 0;
        while let Some(&(_, c)) = self.chars.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            self.chars.next();
            count += 1;
        }
        count
    }

    fn number(&mut self, start: usize) -> Result<f64, ConditionError> {
        let invalid = || ConditionError::lex(start, "invalid number literal");

        if let Some(&(_, '-')) = self.chars.peek() {
            self.chars.next();
        }

        match self.chars.peek() {
            Some(&(_, '0')) => {
                self.chars.next();
            }
            Some(&(_, '1'..='9')) => {
                self.take_digits();
            }
            _ => return Err(invalid()),
        }

        if let Some(&(_, '.')) = self.chars.peek() {
            self.chars.next();
            if self.take_digits() == 0 {
                return Err(invalid());
            }
        }

        if let Some(&(_, 'e' | 'E')) = self.chars.peek() {
            self.chars.next();
            if let Some(&(_, '+' | '-')) = self.chars.peek() {
                self.chars.next();
            }
            if self.take_digits() == 0 {
                return Err(invalid());
            }
        }

        let end = self.position();
        if let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '+' {
                return Err(invalid());
            }
        }

        let value: f64 = self.input[start..end].parse().map_err(|_| invalid())?;
        if !value.is_finite() {
            return Err(ConditionError::lex(start, "number literal out of range"));
        }
        Ok(value)
    }

    fn keyword(&mut self, start: usize) -> Result<Literal, ConditionError> {
        while let Some(&(_, c)) = self.chars.peek() {
            if !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            self.chars.next();
        }

        let end = self.position();
        match &self.input[start..end] {
            "true" => Ok(Literal::Boolean(true)),
            "false" => Ok(Literal::Boolean(false)),
            "null" => Ok(Literal::Null),
            word => Err(ConditionError::lex(
                start,
                format!("invalid literal {:?}", word),
            )),
        }
    }

    fn position(&mut self) -> usize {
        self.chars
            .peek()
            .map(|&(offset, _)| offset)
            .unwrap_or(self.input.len())
    }
}
