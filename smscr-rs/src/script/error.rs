//! Parse-time and run-time error types.
//!
//! Lexical and structural problems surface from [`parse`](super::parse) as a
//! [`ParseError`]; nothing is returned alongside them.  Problems found while
//! walking the tree are [`ScriptError`]s, which the engine turns into a
//! diagnostic written to the output sink.

use thiserror::Error;

use crate::context::ContextError;

/// Lexical or structural failure.  Offsets are byte offsets into the source.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    // ── Lexical ──────────────────────────────────────────────────────────────
    #[error("unterminated {what} starting at offset {offset}")]
    UnterminatedConstruct { what: &'static str, offset: usize },

    #[error("malformed token `{text}` at offset {offset}")]
    MalformedToken { text: String, offset: usize },

    #[error("unexpected character `{ch}` at offset {offset}")]
    UnknownTokenStart { ch: char, offset: usize },

    // ── Structural ───────────────────────────────────────────────────────────
    #[error("invalid FOR tag at offset {offset}: {reason}")]
    InvalidForHeader { reason: &'static str, offset: usize },

    #[error("END tag at offset {offset} takes no arguments")]
    MalformedEndTag { offset: usize },

    #[error("unknown tag `{name}` at offset {offset}")]
    UnknownTag { name: String, offset: usize },

    #[error("`=` may only open an echo tag (tag at offset {offset})")]
    ReservedTokenMisuse { offset: usize },

    #[error("unbalanced tags at offset {offset}: {reason}")]
    UnbalancedTags { reason: &'static str, offset: usize },
}

/// Failure while interpreting a parsed document.
#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("no variable `{name}` is in scope")]
    UnboundVariable { name: String },

    #[error("unknown function `{name}`")]
    UnknownFunction { name: String },

    #[error("`{function}` needs {needed} operand(s) but the stack holds {found}")]
    InsufficientOperands {
        function: &'static str,
        needed: usize,
        found: usize,
    },

    #[error("`{text}` is not a number")]
    NotANumber { text: String },

    #[error("no binding for `{name}` to pop")]
    EmptyScope { name: String },

    #[error("integer division by zero")]
    DivisionByZero,

    #[error("integer overflow in `{op}`")]
    Overflow { op: &'static str },

    #[error("invalid number pattern `{pattern}`")]
    InvalidPattern { pattern: String },

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
