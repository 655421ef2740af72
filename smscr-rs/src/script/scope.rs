//! Loop-scoped variable store.
//!
//! Each name maps to its own stack of bindings; the innermost loop's binding
//! is on top.  Pushing or popping one name never touches another, so a
//! nested `FOR` over an already-bound name shadows the outer binding and
//! restores it untouched when the inner loop ends.

use std::collections::HashMap;

use super::error::ScriptError;
use super::value::Value;

#[derive(Debug, Default)]
pub struct ScopeStack {
    bindings: HashMap<String, Vec<Value>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a new innermost binding for `name`.
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.entry(name.into()).or_default().push(value);
    }

    /// Current (innermost) binding for `name`.
    pub fn peek(&self, name: &str) -> Result<&Value, ScriptError> {
        self.bindings
            .get(name)
            .and_then(|stack| stack.last())
            .ok_or_else(|| empty(name))
    }

    pub fn peek_mut(&mut self, name: &str) -> Result<&mut Value, ScriptError> {
        self.bindings
            .get_mut(name)
            .and_then(|stack| stack.last_mut())
            .ok_or_else(|| empty(name))
    }

    /// Remove exactly one binding for `name`, returning it.
    pub fn pop(&mut self, name: &str) -> Result<Value, ScriptError> {
        let stack = self.bindings.get_mut(name).ok_or_else(|| empty(name))?;
        let value = stack.pop().ok_or_else(|| empty(name))?;
        if stack.is_empty() {
            self.bindings.remove(name);
        }
        Ok(value)
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Number of live bindings for `name`.
    pub fn depth(&self, name: &str) -> usize {
        self.bindings.get(name).map_or(0, Vec::len)
    }
}

fn empty(name: &str) -> ScriptError {
    ScriptError::EmptyScope { name: name.to_owned() }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
