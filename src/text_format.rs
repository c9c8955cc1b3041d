//! Text-format message grammar
//!
//! Tokenizer and parser for the protobuf text format used to describe
//! choreography routines. Produces a generic field tree that typed
//! decoders (see [`crate::routine`]) walk strictly.

use std::fmt::Write as _;
use thiserror::Error;

/// Deepest nesting of messages and lists the parser accepts
pub const MAX_RECURSION_DEPTH: usize = 100;

/// Parse failure with the position of the offending token
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{line}:{column} : {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

/// A scalar literal as written in the source text
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    Number(String),
    Ident(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TextValue {
    Scalar(Scalar),
    List(Vec<TextValue>),
    Message(TextMessage),
}

/// One `name: value` or `name { ... }` entry
#[derive(Debug, Clone, PartialEq)]
pub struct TextField {
    pub name: String,
    pub value: TextValue,
    pub line: usize,
    pub column: usize,
}

impl TextField {
    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.line, self.column, message)
    }

    /// String value of this field
    pub fn expect_str(&self) -> Result<String, ParseError> {
        match &self.value {
            TextValue::Scalar(Scalar::Str(s)) => Ok(s.clone()),
            _ => Err(self.error(format!("Expected string for field \"{}\"", self.name))),
        }
    }

    /// Floating point value of this field
    pub fn expect_f64(&self) -> Result<f64, ParseError> {
        match &self.value {
            TextValue::Scalar(Scalar::Number(text)) => parse_float(text)
                .ok_or_else(|| self.error(format!("Couldn't parse float: {}", text))),
            TextValue::Scalar(Scalar::Ident(text)) => parse_float(text)
                .ok_or_else(|| self.error(format!("Couldn't parse float: {}", text))),
            _ => Err(self.error(format!("Expected number for field \"{}\"", self.name))),
        }
    }

    /// 32-bit integer value of this field
    pub fn expect_i32(&self) -> Result<i32, ParseError> {
        let text = match &self.value {
            TextValue::Scalar(Scalar::Number(text)) => text,
            _ => {
                return Err(self.error(format!("Expected integer for field \"{}\"", self.name)))
            }
        };
        let value = parse_integer(text)
            .ok_or_else(|| self.error(format!("Couldn't parse integer: {}", text)))?;
        i32::try_from(value)
            .map_err(|_| self.error(format!("Integer out of range for int32: {}", text)))
    }
}

/// A parsed message: an ordered list of fields
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextMessage {
    pub fields: Vec<TextField>,
}

impl TextMessage {
    /// Parse a complete top-level message
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut parser = Parser::new(text)?;
        parser.parse_message(None)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render back to text format at the given indentation depth
    pub fn write_text(&self, out: &mut String, depth: usize) {
        for field in &self.fields {
            write_field(out, &field.name, &field.value, depth);
        }
    }
}

fn write_field(out: &mut String, name: &str, value: &TextValue, depth: usize) {
    let indent = "  ".repeat(depth);
    match value {
        TextValue::Message(message) => {
            let _ = writeln!(out, "{}{} {{", indent, name);
            message.write_text(out, depth + 1);
            let _ = writeln!(out, "{}}}", indent);
        }
        TextValue::List(items) => {
            for item in items {
                write_field(out, name, item, depth);
            }
        }
        TextValue::Scalar(scalar) => {
            let _ = writeln!(out, "{}{}: {}", indent, name, render_scalar(scalar));
        }
    }
}

fn render_scalar(scalar: &Scalar) -> String {
    match scalar {
        Scalar::Str(s) => quote(s),
        Scalar::Number(n) | Scalar::Ident(n) => n.clone(),
    }
}

/// Double-quote and escape a string literal
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn parse_float(text: &str) -> Option<f64> {
    if let Ok(value) = text.parse::<f64>() {
        return Some(value);
    }
    parse_integer(text)
        .map(|v| v as f64)
        .or_else(|| text.strip_suffix(['f', 'F'])?.parse::<f64>().ok())
}

fn parse_integer(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };
    Some(if negative { -magnitude } else { magnitude })
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    Number(String),
    Str(String),
    Punct(char),
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    line: usize,
    column: usize,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(c) = self.peek_char(0) {
            if c.is_whitespace() {
                self.bump();
            } else if c == '#' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_whitespace_and_comments();
        let (line, column) = (self.line, self.column);
        let kind = match self.peek_char(0) {
            None => TokenKind::Eof,
            Some(c) if c.is_ascii_alphabetic() || c == '_' => TokenKind::Ident(self.take_word()),
            Some(c) if c.is_ascii_digit() => TokenKind::Number(self.take_number()?),
            Some('.') if self.peek_char(1).is_some_and(|c| c.is_ascii_digit()) => {
                TokenKind::Number(self.take_number()?)
            }
            Some('-') => {
                self.bump();
                match self.peek_char(0) {
                    Some(c) if c.is_ascii_digit() || c == '.' => {
                        TokenKind::Number(format!("-{}", self.take_number()?))
                    }
                    Some(c) if c.is_ascii_alphabetic() => {
                        TokenKind::Number(format!("-{}", self.take_word()))
                    }
                    _ => return Err(ParseError::new(line, column, "Expected number after '-'")),
                }
            }
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                TokenKind::Str(self.take_string(quote, line, column)?)
            }
            Some(c @ ('{' | '}' | '<' | '>' | '[' | ']' | ':' | ',' | ';')) => {
                self.bump();
                TokenKind::Punct(c)
            }
            Some(c) => {
                return Err(ParseError::new(
                    line,
                    column,
                    format!("Unexpected character '{}'", c),
                ))
            }
        };
        Ok(Token { kind, line, column })
    }

    fn take_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek_char(0) {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                word.push(c);
                self.bump();
            } else {
                break;
            }
        }
        word
    }

    fn take_number(&mut self) -> Result<String, ParseError> {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        while let Some(c) = self.peek_char(0) {
            let after_exponent = matches!(text.chars().last(), Some('e' | 'E'))
                && !text.starts_with("0x")
                && !text.starts_with("0X");
            if c.is_ascii_alphanumeric() || c == '.' || ((c == '+' || c == '-') && after_exponent) {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if parse_float(&text).is_none() {
            return Err(ParseError::new(
                line,
                column,
                format!("Invalid number literal '{}'", text),
            ));
        }
        Ok(text)
    }

    fn take_string(&mut self, quote: char, line: usize, column: usize) -> Result<String, ParseError> {
        let mut value = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(ParseError::new(line, column, "String missing ending quote"))
                }
                Some(c) if c == quote => return Ok(value),
                Some('\\') => {
                    let (esc_line, esc_column) = (self.line, self.column);
                    match self.bump() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('r') => value.push('\r'),
                        Some('\\') => value.push('\\'),
                        Some('\'') => value.push('\''),
                        Some('"') => value.push('"'),
                        Some('x') => {
                            let hex: String = (0..2).filter_map(|_| self.bump()).collect();
                            let byte = u8::from_str_radix(&hex, 16).map_err(|_| {
                                ParseError::new(esc_line, esc_column, "Invalid \\x escape")
                            })?;
                            value.push(char::from(byte));
                        }
                        other => {
                            return Err(ParseError::new(
                                esc_line,
                                esc_column,
                                format!("Invalid escape sequence '\\{}'", other.unwrap_or(' ')),
                            ))
                        }
                    }
                }
                Some(c) => value.push(c),
            }
        }
    }
}

struct Parser {
    lexer: Lexer,
    current: Token,
    depth: usize,
}

impl Parser {
    fn new(text: &str) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(text);
        let current = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            depth: 0,
        })
    }

    fn advance(&mut self) -> Result<Token, ParseError> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.current.line, self.current.column, message)
    }

    fn is_punct(&self, c: char) -> bool {
        self.current.kind == TokenKind::Punct(c)
    }

    fn descend(&mut self) -> Result<(), ParseError> {
        if self.depth >= MAX_RECURSION_DEPTH {
            return Err(self.error_here(format!(
                "Message too deep. Max recursion depth is {}",
                MAX_RECURSION_DEPTH
            )));
        }
        self.depth += 1;
        Ok(())
    }

    fn parse_message(&mut self, terminator: Option<char>) -> Result<TextMessage, ParseError> {
        let mut message = TextMessage::default();
        loop {
            if self.current.kind == TokenKind::Eof {
                match terminator {
                    None => break,
                    Some(end) => {
                        return Err(
                            self.error_here(format!("Expected \"{}\" before end of input", end))
                        )
                    }
                }
            }
            if terminator.is_some_and(|end| self.is_punct(end)) {
                self.advance()?;
                break;
            }

            let name_token = self.advance()?;
            let name = match name_token.kind {
                TokenKind::Ident(name) => name,
                _ => {
                    return Err(ParseError::new(
                        name_token.line,
                        name_token.column,
                        "Expected identifier or field name",
                    ))
                }
            };

            let value = if self.is_punct(':') {
                self.advance()?;
                self.parse_value()?
            } else if self.is_punct('{') || self.is_punct('<') {
                self.parse_nested()?
            } else {
                return Err(self.error_here(format!(
                    "Expected \":\" or \"{{\" after field \"{}\"",
                    name
                )));
            };

            message.fields.push(TextField {
                name,
                value,
                line: name_token.line,
                column: name_token.column,
            });

            if self.is_punct(',') || self.is_punct(';') {
                self.advance()?;
            }
        }
        Ok(message)
    }

    fn parse_nested(&mut self) -> Result<TextValue, ParseError> {
        self.descend()?;
        let open = self.advance()?;
        let end = if open.kind == TokenKind::Punct('<') { '>' } else { '}' };
        let message = self.parse_message(Some(end))?;
        self.depth -= 1;
        Ok(TextValue::Message(message))
    }

    fn parse_value(&mut self) -> Result<TextValue, ParseError> {
        if self.is_punct('{') || self.is_punct('<') {
            return self.parse_nested();
        }
        if self.is_punct('[') {
            self.descend()?;
            self.advance()?;
            let mut items = Vec::new();
            if !self.is_punct(']') {
                loop {
                    items.push(self.parse_value()?);
                    if self.is_punct(',') {
                        self.advance()?;
                    } else if self.is_punct(']') {
                        break;
                    } else {
                        return Err(self.error_here("Expected \",\" or \"]\" in list"));
                    }
                }
            }
            self.advance()?;
            self.depth -= 1;
            return Ok(TextValue::List(items));
        }
        self.parse_scalar().map(TextValue::Scalar)
    }

    fn parse_scalar(&mut self) -> Result<Scalar, ParseError> {
        let token = self.advance()?;
        match token.kind {
            TokenKind::Number(n) => Ok(Scalar::Number(n)),
            TokenKind::Ident(i) => Ok(Scalar::Ident(i)),
            TokenKind::Str(mut s) => {
                // adjacent literals concatenate
                while let TokenKind::Str(next) = &self.current.kind {
                    s.push_str(next);
                    self.advance()?;
                }
                Ok(Scalar::Str(s))
            }
            TokenKind::Eof => Err(ParseError::new(
                token.line,
                token.column,
                "Expected value before end of input",
            )),
            TokenKind::Punct(c) => Err(ParseError::new(
                token.line,
                token.column,
                format!("Expected value, found \"{}\"", c),
            )),
        }
    }
}
