//! Tag tokens.
//!
//! Every atom inside a `{$ … $}` tag becomes a [`Token`].  Tokens have two
//! textual forms:
//!
//! - [`Token::as_text`]: the *source* form, re-escaped so that lexing it
//!   again yields an equal token (`"a\"b"`, `@sin`, `1.5`).
//! - [`Display`](std::fmt::Display): the *value* form the interpreter pushes
//!   onto its working stack (`a"b`, `sin`, `1.5`).

use std::fmt;

use super::value::format_float;

// ── Operator ──────────────────────────────────────────────────────────────────

/// One of the single-character operators `+ - * / =`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    /// `=`: only legal as the head of an echo tag.
    Echo,
}

impl Operator {
    pub fn from_char(c: char) -> Option<Self> {
        Some(match c {
            '+' => Operator::Add,
            '-' => Operator::Sub,
            '*' => Operator::Mul,
            '/' => Operator::Div,
            '=' => Operator::Echo,
            _ => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Echo => "=",
        }
    }
}

// ── Token ─────────────────────────────────────────────────────────────────────

/// A single tag atom.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Bare identifier (`i`, `FOR`, `END`).
    Variable(String),
    /// Quoted string literal; holds the decoded text.
    Str(String),
    Int(i64),
    Float(f64),
    /// `@name`: a registry function reference; holds the name without `@`.
    Function(String),
    Operator(Operator),
}

impl Token {
    /// Source form of the token, suitable for reconstructing tag syntax.
    pub fn as_text(&self) -> String {
        match self {
            Token::Variable(name) => name.clone(),
            Token::Str(s) => escape_string(s),
            Token::Int(n) => n.to_string(),
            Token::Float(x) => format_float(*x),
            Token::Function(name) => format!("@{name}"),
            Token::Operator(op) => op.symbol().to_owned(),
        }
    }

    /// Name under which the function registry knows this token, if it is
    /// callable (`@name` functions and arithmetic operators).
    pub fn callable_name(&self) -> Option<&str> {
        match self {
            Token::Function(name) => Some(name),
            Token::Operator(op) => Some(op.symbol()),
            _ => None,
        }
    }

    pub fn is_echo_marker(&self) -> bool {
        matches!(self, Token::Operator(Operator::Echo))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Variable(name) | Token::Function(name) => f.write_str(name),
            Token::Str(s) => f.write_str(s),
            Token::Int(n) => write!(f, "{n}"),
            Token::Float(x) => f.write_str(&format_float(*x)),
            Token::Operator(op) => f.write_str(op.symbol()),
        }
    }
}

/// Quote `s` and re-encode `\\ \" \n \t \r`.
fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
