//! Function and operator registry for echo evaluation.
//!
//! Every entry declares how many operands it consumes.  [`Function::call`]
//! checks the stack depth, detaches exactly that many values (deepest first)
//! and hands them to the entry, which pushes its results back.
//!
//! Operand order, with the top of the stack written last:
//!
//! - binary operators: `a b -` computes `b - a` (top of stack on the left)
//! - `decfmt`: `number pattern`
//! - getters: `key default`
//! - setters: `value key`
//! - deleters: `key`

use std::collections::HashMap;
use std::sync::OnceLock;

use super::decfmt::decfmt;
use super::error::ScriptError;
use super::value::{parse_number, Value};
use crate::context::{Context, ParamKind};

/// Entry body: operands in push order, the stack to push results onto, and
/// the execution context.
pub type Apply = fn(&[String], &mut Vec<String>, &mut dyn Context) -> Result<(), ScriptError>;

/// A named callable.
#[derive(Clone, Copy)]
pub struct Function {
    name: &'static str,
    operands: usize,
    apply: Apply,
}

impl Function {
    pub const fn new(name: &'static str, operands: usize, apply: Apply) -> Self {
        Self { name, operands, apply }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn operands(&self) -> usize {
        self.operands
    }

    /// Pop this function's operands off `stack`, apply it, push its results.
    pub fn call(&self, stack: &mut Vec<String>, ctx: &mut dyn Context) -> Result<(), ScriptError> {
        if stack.len() < self.operands {
            return Err(ScriptError::InsufficientOperands {
                function: self.name,
                needed: self.operands,
                found: stack.len(),
            });
        }
        let args = stack.split_off(stack.len() - self.operands);
        (self.apply)(&args, stack, ctx)
    }
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("operands", &self.operands)
            .finish()
    }
}

// ── Entries ───────────────────────────────────────────────────────────────────

fn binary(
    args: &[String],
    out: &mut Vec<String>,
    op: fn(&Value, &Value) -> Result<Value, ScriptError>,
) -> Result<(), ScriptError> {
    let lhs = Value::from(args[1].as_str());
    let rhs = Value::from(args[0].as_str());
    out.push(op(&lhs, &rhs)?.to_string());
    Ok(())
}

fn sin(args: &[String], out: &mut Vec<String>, _: &mut dyn Context) -> Result<(), ScriptError> {
    let x = parse_number(&args[0])?.as_f64();
    out.push(Value::Float(x.sin()).to_string());
    Ok(())
}

fn format_decimal(
    args: &[String],
    out: &mut Vec<String>,
    _: &mut dyn Context,
) -> Result<(), ScriptError> {
    out.push(decfmt(&args[0], &args[1])?);
    Ok(())
}

fn dup(args: &[String], out: &mut Vec<String>, _: &mut dyn Context) -> Result<(), ScriptError> {
    out.push(args[0].clone());
    out.push(args[0].clone());
    Ok(())
}

fn swap(args: &[String], out: &mut Vec<String>, _: &mut dyn Context) -> Result<(), ScriptError> {
    out.push(args[1].clone());
    out.push(args[0].clone());
    Ok(())
}

fn set_mime_type(
    args: &[String],
    _: &mut Vec<String>,
    ctx: &mut dyn Context,
) -> Result<(), ScriptError> {
    ctx.set_mime_type(&args[0])?;
    Ok(())
}

fn get(
    kind: ParamKind,
    args: &[String],
    out: &mut Vec<String>,
    ctx: &dyn Context,
) -> Result<(), ScriptError> {
    let value = ctx.param(kind, &args[0]).unwrap_or(args[1].as_str()).to_owned();
    out.push(value);
    Ok(())
}

fn set(kind: ParamKind, args: &[String], ctx: &mut dyn Context) -> Result<(), ScriptError> {
    ctx.set_param(kind, &args[1], &args[0])?;
    Ok(())
}

fn del(kind: ParamKind, args: &[String], ctx: &mut dyn Context) -> Result<(), ScriptError> {
    ctx.remove_param(kind, &args[0])?;
    Ok(())
}

const STANDARD: &[Function] = &[
    Function::new("+", 2, |a, out, _| binary(a, out, Value::add)),
    Function::new("-", 2, |a, out, _| binary(a, out, Value::sub)),
    Function::new("*", 2, |a, out, _| binary(a, out, Value::mul)),
    Function::new("/", 2, |a, out, _| binary(a, out, Value::div)),
    Function::new("sin", 1, sin),
    Function::new("decfmt", 2, format_decimal),
    Function::new("dup", 1, dup),
    Function::new("swap", 2, swap),
    Function::new("setMimeType", 1, set_mime_type),
    Function::new("paramGet", 2, |a, out, ctx| get(ParamKind::Request, a, out, ctx)),
    Function::new("pparamGet", 2, |a, out, ctx| get(ParamKind::Persistent, a, out, ctx)),
    Function::new("tparamGet", 2, |a, out, ctx| get(ParamKind::Temporary, a, out, ctx)),
    Function::new("pparamSet", 2, |a, _, ctx| set(ParamKind::Persistent, a, ctx)),
    Function::new("tparamSet", 2, |a, _, ctx| set(ParamKind::Temporary, a, ctx)),
    Function::new("pparamDel", 1, |a, _, ctx| del(ParamKind::Persistent, a, ctx)),
    Function::new("tparamDel", 1, |a, _, ctx| del(ParamKind::Temporary, a, ctx)),
];

// ── Registry ──────────────────────────────────────────────────────────────────

/// Name → function table.  Operators are registered under their symbol.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    table: HashMap<&'static str, Function>,
}

impl Registry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A fresh registry holding the standard entries.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        for &f in STANDARD {
            registry.insert(f);
        }
        registry
    }

    /// Shared standard registry.
    pub fn builtin() -> &'static Registry {
        static BUILTIN: OnceLock<Registry> = OnceLock::new();
        BUILTIN.get_or_init(Registry::standard)
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, f: Function) {
        self.table.insert(f.name, f);
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        self.table.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.table.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::params::ParamStore;

    fn ctx() -> RequestContext<Vec<u8>> {
        let request: ParamStore = [("name", "Ada")].into_iter().collect();
        RequestContext::new(Vec::new(), request, ParamStore::new()).with_header(false)
    }

    fn stack(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn run(name: &str, items: &[&str], ctx: &mut RequestContext<Vec<u8>>) -> Vec<String> {
        let mut s = stack(items);
        Registry::builtin().get(name).unwrap().call(&mut s, ctx).unwrap();
        s
    }

    #[test]
    fn arithmetic_uses_top_entry_as_left_operand() {
        let c = &mut ctx();
        assert_eq!(run("-", &["7", "2"], c), stack(&["-5"]));
        assert_eq!(run("-", &["2", "7"], c), stack(&["5"]));
        assert_eq!(run("/", &["2", "3"], c), stack(&["1"]));
        assert_eq!(run("/", &["3", "2"], c), stack(&["0"]));
        assert_eq!(run("/", &["2.0", "3"], c), stack(&["1.5"]));
        assert_eq!(run("+", &["x", "1", "2"], c), stack(&["x", "3"]));
        assert_eq!(run("*", &["1.5", "2"], c), stack(&["3.0"]));
    }

    #[test]
    fn arithmetic_errors() {
        let c = &mut ctx();
        let div = Registry::builtin().get("/").unwrap();
        assert!(matches!(div.call(&mut stack(&["0", "1"]), c), Err(ScriptError::DivisionByZero)));
        assert!(matches!(
            div.call(&mut stack(&["a", "1"]), c),
            Err(ScriptError::NotANumber { .. })
        ));
    }

    #[test]
    fn sin_pushes_a_float() {
        let c = &mut ctx();
        assert_eq!(run("sin", &["0"], c), stack(&["0.0"]));
        let out = run("sin", &["1.5707963267948966"], c);
        assert_eq!(out, stack(&["1.0"]));
    }

    #[test]
    fn dup_and_swap() {
        let c = &mut ctx();
        assert_eq!(run("dup", &["x"], c), stack(&["x", "x"]));
        assert_eq!(run("swap", &["a", "b"], c), stack(&["b", "a"]));
        assert_eq!(run("swap", &["z", "a", "b"], c), stack(&["z", "b", "a"]));
    }

    #[test]
    fn decfmt_entry() {
        let c = &mut ctx();
        assert_eq!(run("decfmt", &["3.14159", "0.00"], c), stack(&["3.14"]));
    }

    #[test]
    fn insufficient_operands() {
        let c = &mut ctx();
        let err = Registry::builtin().get("swap").unwrap().call(&mut stack(&["a"]), c);
        assert!(matches!(
            err,
            Err(ScriptError::InsufficientOperands { function: "swap", needed: 2, found: 1 })
        ));
    }

    #[test]
    fn parameter_access() {
        let c = &mut ctx();
        assert_eq!(run("paramGet", &["name", "?"], c), stack(&["Ada"]));
        assert_eq!(run("paramGet", &["missing", "?"], c), stack(&["?"]));

        assert!(run("tparamSet", &["v", "k"], c).is_empty());
        assert_eq!(run("tparamGet", &["k", "-"], c), stack(&["v"]));
        assert_eq!(run("pparamGet", &["k", "-"], c), stack(&["-"]));
        run("tparamDel", &["k"], c);
        assert_eq!(run("tparamGet", &["k", "-"], c), stack(&["-"]));

        run("pparamSet", &["1", "visits"], c);
        assert_eq!(c.param(ParamKind::Persistent, "visits"), Some("1"));
        run("pparamDel", &["visits"], c);
        assert_eq!(c.param(ParamKind::Persistent, "visits"), None);
    }

    #[test]
    fn set_mime_type_changes_context() {
        let c = &mut ctx();
        run("setMimeType", &["text/plain"], c);
        assert_eq!(c.mime_type(), "text/plain");
    }

    #[test]
    fn standard_names() {
        let r = Registry::standard();
        assert_eq!(r.len(), STANDARD.len());
        for name in ["+", "-", "*", "/", "sin", "decfmt", "dup", "swap", "setMimeType"] {
            assert!(r.contains(name), "{name} missing");
        }
        assert!(r.get("nope").is_none());
    }

    #[test]
    fn custom_entries() {
        let mut r = Registry::empty();
        assert!(r.is_empty());
        r.insert(Function::new("upper", 1, |a, out, _| {
            out.push(a[0].to_uppercase());
            Ok(())
        }));
        let mut s = stack(&["hi"]);
        r.get("upper").unwrap().call(&mut s, &mut ctx()).unwrap();
        assert_eq!(s, stack(&["HI"]));
        assert_eq!(r.names(), vec!["upper"]);
    }
}
