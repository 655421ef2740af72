//! Tree-walking interpreter.
//!
//! [`SmartScriptEngine`] borrows a parsed document and runs it against a
//! [`Context`].  Every [`execute`](SmartScriptEngine::execute) call gets its
//! own scope stack, so one document can be executed many times, from many
//! threads, without any shared mutable state.
//!
//! A runtime error stops the walk where it happened.  Output already written
//! stays written; the error message and a fixed trailer follow it.  Only I/O
//! failures of the sink itself are returned to the caller.

use std::cmp::Ordering;
use std::io;

use tracing::{debug, warn};

use super::error::ScriptError;
use super::functions::Registry;
use super::node::{ForLoop, Node};
use super::scope::ScopeStack;
use super::token::Token;
use super::value::Value;
use crate::context::Context;

/// Appended to the message of an error that aborted execution.
pub const ERROR_TRAILER: &str = "\nError occurred while executing script. Check URL parameters.";

/// Executes one parsed document.
#[derive(Debug, Clone, Copy)]
pub struct SmartScriptEngine<'d> {
    document: &'d Node,
    registry: &'d Registry,
}

impl<'d> SmartScriptEngine<'d> {
    /// Engine using the standard function registry.
    pub fn new(document: &'d Node) -> Self {
        Self { document, registry: Registry::builtin() }
    }

    pub fn with_registry(document: &'d Node, registry: &'d Registry) -> Self {
        Self { document, registry }
    }

    pub fn document(&self) -> &'d Node {
        self.document
    }

    /// Run the document, writing its output to `ctx`.
    pub fn execute(&self, ctx: &mut dyn Context) -> io::Result<()> {
        let result = Execution { scope: ScopeStack::new(), registry: self.registry, ctx: &mut *ctx }
            .run(self.document);
        match result {
            Ok(()) => Ok(()),
            Err(ScriptError::Io(e)) => {
                warn!(error = %e, "output failed");
                Err(e)
            }
            Err(err) => {
                warn!(error = %err, "script aborted");
                ctx.write_str(&format!("{err}{ERROR_TRAILER}"))
            }
        }
    }
}

// ── Execution state ───────────────────────────────────────────────────────────

struct Execution<'a> {
    scope: ScopeStack,
    registry: &'a Registry,
    ctx: &'a mut dyn Context,
}

/// One level of the walk.  The tree is walked with an explicit stack of these
/// so nesting depth never touches the call stack.
enum Frame<'n> {
    /// Siblings still to visit.
    Nodes(std::slice::Iter<'n, Node>),
    /// An entered loop, resumed each time its body finishes.
    Loop(LoopState<'n>),
}

struct LoopState<'n> {
    header: &'n ForLoop,
    end: Value,
    step: Value,
    iterations: u64,
}

/// What the walk does after one step.
enum Walk<'n> {
    Descend(Frame<'n>),
    Ascend,
    Stay,
}

impl Execution<'_> {
    fn run<'n>(&mut self, root: &'n Node) -> Result<(), ScriptError> {
        let mut frames = vec![Frame::Nodes(std::slice::from_ref(root).iter())];
        while let Some(frame) = frames.last_mut() {
            let walk = match frame {
                Frame::Nodes(siblings) => match siblings.next() {
                    Some(node) => self.visit(node)?.map_or(Walk::Stay, Walk::Descend),
                    None => Walk::Ascend,
                },
                Frame::Loop(state) => self.resume(state)?.map_or(Walk::Ascend, Walk::Descend),
            };
            match walk {
                Walk::Descend(inner) => frames.push(inner),
                Walk::Ascend => {
                    frames.pop();
                }
                Walk::Stay => {}
            }
        }
        Ok(())
    }

    /// Visit one node; containers hand back the frame to descend into.
    fn visit<'n>(&mut self, node: &'n Node) -> Result<Option<Frame<'n>>, ScriptError> {
        match node {
            Node::Document { children } => Ok(Some(Frame::Nodes(children.iter()))),
            Node::Text(text) => {
                self.ctx.write_str(text)?;
                Ok(None)
            }
            Node::Echo(tokens) => {
                self.echo(tokens)?;
                Ok(None)
            }
            Node::ForLoop(l) => Ok(Some(self.enter(l))),
        }
    }

    fn echo(&mut self, tokens: &[Token]) -> Result<(), ScriptError> {
        let mut stack: Vec<String> = Vec::new();
        for token in tokens {
            match token {
                Token::Variable(name) => {
                    let value = self
                        .scope
                        .peek(name)
                        .map_err(|_| ScriptError::UnboundVariable { name: name.clone() })?;
                    stack.push(value.to_string());
                }
                Token::Function(name) => self.call(name, &mut stack)?,
                Token::Operator(op) => self.call(op.symbol(), &mut stack)?,
                Token::Str(_) | Token::Int(_) | Token::Float(_) => stack.push(token.to_string()),
            }
        }
        // Residual values come out in the order they were pushed.
        if !stack.is_empty() {
            self.ctx.write_str(&stack.concat())?;
        }
        Ok(())
    }

    fn call(&mut self, name: &str, stack: &mut Vec<String>) -> Result<(), ScriptError> {
        let f = self
            .registry
            .get(name)
            .ok_or_else(|| ScriptError::UnknownFunction { name: name.to_owned() })?;
        f.call(stack, &mut *self.ctx)
    }

    /// Bind the loop variable; the first bounds check happens in `resume`.
    fn enter<'n>(&mut self, l: &'n ForLoop) -> Frame<'n> {
        let start = literal(&l.start);
        let end = literal(&l.end);
        let step = l.step.as_ref().map_or(Value::Int(1), literal);
        debug!(variable = %l.variable, %start, %end, %step, "entering loop");

        self.scope.push(l.variable.as_str(), start);
        Frame::Loop(LoopState { header: l, end, step, iterations: 0 })
    }

    /// Step the loop (after its first pass) and either hand back the body to
    /// run again, or unbind the variable and finish.
    fn resume<'n>(&mut self, state: &mut LoopState<'n>) -> Result<Option<Frame<'n>>, ScriptError> {
        let l = state.header;
        if state.iterations > 0 {
            self.scope.peek_mut(&l.variable)?.increment(&state.step)?;
        }
        if self.scope.peek(&l.variable)?.num_cmp(&state.end)? != Ordering::Greater {
            state.iterations += 1;
            return Ok(Some(Frame::Nodes(l.children.iter())));
        }
        self.scope.pop(&l.variable)?;
        debug!(variable = %l.variable, iterations = state.iterations, "leaving loop");
        Ok(None)
    }
}

/// Loop bounds come from token text; numeric tokens skip the reparse.
fn literal(token: &Token) -> Value {
    match token {
        Token::Int(n) => Value::Int(*n),
        Token::Float(x) => Value::Float(*x),
        other => Value::Str(other.to_string()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::params::ParamStore;
    use crate::script::functions::Function;
    use crate::script::parser::parse;

    fn plain() -> RequestContext<Vec<u8>> {
        RequestContext::new(Vec::new(), ParamStore::new(), ParamStore::new()).with_header(false)
    }

    fn output(ctx: RequestContext<Vec<u8>>) -> String {
        String::from_utf8(ctx.into_parts().0).unwrap()
    }

    fn run(src: &str) -> String {
        let doc = parse(src).unwrap();
        let mut ctx = plain();
        SmartScriptEngine::new(&doc).execute(&mut ctx).unwrap();
        output(ctx)
    }

    fn failure(message: &str) -> String {
        format!("{message}{ERROR_TRAILER}")
    }

    #[test]
    fn text_and_echo() {
        assert_eq!(run("Hello"), "Hello");
        assert_eq!(run(r#"a{$= "b" 1 2.5 $}c"#), "ab12.5c");
        assert_eq!(run("{$=$}"), "");
    }

    #[test]
    fn simple_loop() {
        assert_eq!(run("{$FOR i 1 3$}{$=i$}{$END$}"), "123");
    }

    #[test]
    fn nested_loops_shadow_and_restore() {
        assert_eq!(run("{$FOR i 1 2$}{$FOR i 1 1$}{$=i$}{$END$}{$=i$}{$END$}"), "1122");
    }

    #[test]
    fn explicit_and_fractional_steps() {
        assert_eq!(run(r#"{$FOR i 1 10 3$}{$= i " " $}{$END$}"#), "1 4 7 10 ");
        assert_eq!(run(r#"{$FOR x 0 1 0.5$}{$= x "," $}{$END$}"#), "0,0.5,1.0,");
    }

    #[test]
    fn string_bounds_are_coerced() {
        assert_eq!(run(r#"{$FOR i "1" "2"$}{$= i $}{$END$}"#), "12");
    }

    #[test]
    fn loop_that_never_runs() {
        assert_eq!(run("a{$FOR i 3 1$}x{$END$}b"), "ab");
    }

    #[test]
    fn loop_variable_is_unbound_afterwards() {
        assert_eq!(
            run("{$FOR i 1 2$}{$END$}{$= i $}"),
            failure("no variable `i` is in scope")
        );
    }

    #[test]
    fn postfix_arithmetic() {
        assert_eq!(run("{$= 7 2 - $}"), "-5");
        assert_eq!(run("{$= 3 2 / $}"), "0");
        assert_eq!(run("{$= 2 3 / $}"), "1");
        assert_eq!(run("{$= 2.0 3 / $}"), "1.5");
        assert_eq!(run("{$FOR i 1 3$}{$= i i * $}{$END$}"), "149");
    }

    #[test]
    fn stack_functions() {
        assert_eq!(run(r#"{$= "a" "b" @swap $}"#), "ba");
        assert_eq!(run("{$= 2 @dup * $}"), "4");
    }

    #[test]
    fn decimal_formatting() {
        assert_eq!(run(r#"{$= 3.14159 "0.00" @decfmt $}"#), "3.14");
        assert_eq!(run(r##"{$= 1234567.891 "#,##0.0" @decfmt $}"##), "1,234,567.9");
    }

    #[test]
    fn parameters() {
        let doc = parse(concat!(
            r#"{$= "name" "anon" @paramGet $}:"#,
            r#"{$= "visits" "0" @pparamGet 1 + "visits" @pparamSet $}"#,
            r#"{$= "visits" "?" @pparamGet $}"#,
        ))
        .unwrap();
        let request: ParamStore = [("name", "Ada")].into_iter().collect();
        let persistent: ParamStore = [("visits", "41")].into_iter().collect();
        let mut ctx = RequestContext::new(Vec::new(), request, persistent).with_header(false);
        SmartScriptEngine::new(&doc).execute(&mut ctx).unwrap();
        let (out, persistent) = ctx.into_parts();
        assert_eq!(String::from_utf8(out).unwrap(), "Ada:42");
        assert_eq!(persistent.get("visits"), Some("42"));
    }

    #[test]
    fn runtime_errors_keep_partial_output() {
        assert_eq!(
            run("{$FOR i 1 3$}{$= i $}{$END$}{$= 0 1 / $}tail"),
            format!("123{}", failure("integer division by zero"))
        );
        assert_eq!(run("x{$= @nope $}"), format!("x{}", failure("unknown function `nope`")));
        assert_eq!(
            run("{$= 1 @swap $}"),
            failure("`swap` needs 2 operand(s) but the stack holds 1")
        );
        assert_eq!(run(r#"{$= "a" 1 + $}"#), failure("`a` is not a number"));
    }

    #[test]
    fn header_and_mime_type() {
        let doc = parse(r#"{$= "text/plain" @setMimeType $}hi"#).unwrap();
        let mut ctx = RequestContext::new(Vec::new(), ParamStore::new(), ParamStore::new());
        SmartScriptEngine::new(&doc).execute(&mut ctx).unwrap();
        assert_eq!(
            output(ctx),
            "HTTP/1.1 200 OK\nContent-Type: text/plain; charset=UTF-8\n\nhi"
        );
    }

    #[test]
    fn mime_type_after_output_is_an_error() {
        let doc = parse(r#"x{$= "text/plain" @setMimeType $}y"#).unwrap();
        let mut ctx = plain();
        SmartScriptEngine::new(&doc).execute(&mut ctx).unwrap();
        assert_eq!(output(ctx), format!("x{}", failure("response header has already been generated")));
    }

    #[test]
    fn custom_registry() {
        let mut registry = Registry::standard();
        registry.insert(Function::new("shout", 1, |a, out, _| {
            out.push(a[0].to_uppercase() + "!");
            Ok(())
        }));
        let doc = parse(r#"{$= "hey" @shout $}"#).unwrap();
        let mut ctx = plain();
        SmartScriptEngine::with_registry(&doc, &registry).execute(&mut ctx).unwrap();
        assert_eq!(output(ctx), "HEY!");
    }

    struct BrokenPipe;

    impl io::Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn sink_failures_are_returned() {
        let doc = parse("text").unwrap();
        let mut ctx = RequestContext::new(BrokenPipe, ParamStore::new(), ParamStore::new());
        let err = SmartScriptEngine::new(&doc).execute(&mut ctx).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn deeply_nested_loops_execute() {
        let depth = 100_000;
        let src = format!(
            "{}{{$= i $}}{}{{$= \"done\" $}}",
            "{$FOR i 1 1$}".repeat(depth),
            "{$END$}".repeat(depth)
        );
        assert_eq!(run(&src), "1done");
    }

    #[test]
    fn one_document_many_threads() {
        let doc = parse("{$FOR i 1 3$}{$= i $}{$END$}").unwrap();
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        let mut ctx = plain();
                        SmartScriptEngine::new(&doc).execute(&mut ctx).unwrap();
                        output(ctx)
                    })
                })
                .collect();
            for h in handles {
                assert_eq!(h.join().unwrap(), "123");
            }
        });
    }
}
