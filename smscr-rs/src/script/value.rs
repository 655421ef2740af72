//! Runtime value wrapper with numeric coercion.
//!
//! Scripts are stringly typed: the echo stack holds text and loop counters
//! start life as literal token text.  A [`Value`] remembers what it holds and
//! converts to a [`Number`] on demand:
//!
//! - `Null` reads as integer `0`.
//! - `Str` containing `.`, `e` or `E` parses as a float, otherwise as an
//!   integer; anything unparsable is [`ScriptError::NotANumber`].
//!
//! Arithmetic stays integral only when *both* operands are integers, and
//! integer arithmetic is checked ([`ScriptError::Overflow`],
//! [`ScriptError::DivisionByZero`]).

use std::cmp::Ordering;
use std::fmt;

use super::error::ScriptError;

/// A script runtime value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Int(i64),
    Float(f64),
    Str(String),
}

/// A value after numeric coercion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(x) => x,
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(n) => Value::Int(n),
            Number::Float(x) => Value::Float(x),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => f.write_str(&format_float(*x)),
            Value::Str(s) => f.write_str(s),
        }
    }
}

/// Shortest round-trip decimal form of `x`, always carrying a `.` so that it
/// re-lexes as a float (`2.0`, `0.5`, `1e21` → `1000000000000000000000.0`).
pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "NaN".to_owned();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_owned();
    }
    let s = x.to_string();
    if s.contains('.') {
        s
    } else {
        s + ".0"
    }
}

/// Coerce numeric text, choosing float when the text looks like one.
///
/// Integer text must be exact; float text may carry surrounding whitespace
/// or control characters.
pub fn parse_number(text: &str) -> Result<Number, ScriptError> {
    let looks_float = text.contains(['.', 'e', 'E']);
    let parsed = if looks_float {
        text.trim_matches(|c: char| c <= ' ').parse::<f64>().ok().map(Number::Float)
    } else {
        text.parse::<i64>().ok().map(Number::Int)
    };
    parsed.ok_or_else(|| ScriptError::NotANumber { text: text.to_owned() })
}

impl Value {
    /// Interpret the held value as a number.
    pub fn to_number(&self) -> Result<Number, ScriptError> {
        match self {
            Value::Null => Ok(Number::Int(0)),
            Value::Int(n) => Ok(Number::Int(*n)),
            Value::Float(x) => Ok(Number::Float(*x)),
            Value::Str(s) => parse_number(s),
        }
    }

    // ── Arithmetic ────────────────────────────────────────────────────────────

    fn combine(
        &self,
        rhs: &Value,
        op: &'static str,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Result<Value, ScriptError> {
        match (self.to_number()?, rhs.to_number()?) {
            (Number::Int(a), Number::Int(b)) => int_op(a, b)
                .map(Value::Int)
                .ok_or(ScriptError::Overflow { op }),
            (a, b) => Ok(Value::Float(float_op(a.as_f64(), b.as_f64()))),
        }
    }

    pub fn add(&self, rhs: &Value) -> Result<Value, ScriptError> {
        self.combine(rhs, "+", i64::checked_add, |a, b| a + b)
    }

    pub fn sub(&self, rhs: &Value) -> Result<Value, ScriptError> {
        self.combine(rhs, "-", i64::checked_sub, |a, b| a - b)
    }

    pub fn mul(&self, rhs: &Value) -> Result<Value, ScriptError> {
        self.combine(rhs, "*", i64::checked_mul, |a, b| a * b)
    }

    /// Integer division truncates toward zero; float division follows IEEE.
    pub fn div(&self, rhs: &Value) -> Result<Value, ScriptError> {
        if let (Number::Int(_), Number::Int(0)) = (self.to_number()?, rhs.to_number()?) {
            return Err(ScriptError::DivisionByZero);
        }
        self.combine(rhs, "/", i64::checked_div, |a, b| a / b)
    }

    /// In-place `self += step`, used for loop counters.
    pub fn increment(&mut self, step: &Value) -> Result<(), ScriptError> {
        *self = self.add(step)?;
        Ok(())
    }

    /// Numeric comparison.  Unordered (NaN) comparisons report `Greater` so a
    /// `current <= end` loop test terminates.
    pub fn num_cmp(&self, rhs: &Value) -> Result<Ordering, ScriptError> {
        Ok(match (self.to_number()?, rhs.to_number()?) {
            (Number::Int(a), Number::Int(b)) => a.cmp(&b),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()).unwrap_or(Ordering::Greater),
        })
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
