//! End-to-end runs: source text in, sink bytes out.

use smscr::context::{Context, ParamKind, RequestContext};
use smscr::params::ParamStore;
use smscr::script::interp::ERROR_TRAILER;
use smscr::script::{parse, render, Node, ParseError, SmartScriptEngine, Token};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn context() -> RequestContext<Vec<u8>> {
    RequestContext::new(Vec::new(), ParamStore::new(), ParamStore::new()).with_header(false)
}

fn run_doc(doc: &Node, mut ctx: RequestContext<Vec<u8>>) -> (String, ParamStore) {
    SmartScriptEngine::new(doc).execute(&mut ctx).unwrap();
    let (out, persistent) = ctx.into_parts();
    (String::from_utf8(out).unwrap(), persistent)
}

fn run(src: &str) -> String {
    run_doc(&parse(src).unwrap(), context()).0
}

// ── Lexing & structure ────────────────────────────────────────────────────────

#[test]
fn escaped_brace_is_literal_text() {
    let doc = parse("a\\{b").unwrap();
    assert_eq!(doc, Node::document(vec![Node::Text("a{b".into())]));
}

#[test]
fn escaped_quote_in_string_literal() {
    let doc = parse(r#"{$= "a\"b" $}"#).unwrap();
    assert_eq!(doc.children()[0], Node::Echo(vec![Token::Str("a\"b".into())]));
    assert_eq!(run(r#"{$= "a\"b" $}"#), "a\"b");
}

#[test]
fn canonical_source_round_trips() {
    let src = "Total: {$FOR i 1 3 $}[{$= i \"x\" @swap $}]{$END$}\\{done}";
    let doc = parse(src).unwrap();
    assert_eq!(render(&doc), src);
    assert_eq!(parse(&render(&doc)).unwrap(), doc);
}

#[test]
fn unbalanced_tags_are_rejected() {
    assert!(matches!(parse("{$FOR i 1 2$}{$=i$}"), Err(ParseError::UnbalancedTags { .. })));
    assert!(matches!(parse("{$END$}"), Err(ParseError::UnbalancedTags { .. })));
}

#[test]
fn parse_error_messages() {
    let err = parse("ok {$WHILE x$}").unwrap_err();
    assert_eq!(err.to_string(), "unknown tag `WHILE` at offset 3");
    let err = parse("{$= \"open $}").unwrap_err();
    assert!(err.to_string().starts_with("unterminated"), "{err}");
}

// ── Execution ─────────────────────────────────────────────────────────────────

#[test]
fn nested_loop_output() {
    assert_eq!(run("{$FOR i 1 3$}{$=i$}{$END$}"), "123");
}

#[test]
fn shadowed_loop_variable() {
    assert_eq!(run("{$FOR i 1 2$}{$FOR i 1 1$}{$=i$}{$END$}{$=i$}{$END$}"), "1122");
}

#[test]
fn multiplication_table() {
    let src = "{$FOR r 1 3$}{$FOR c 1 3$}{$= r c * \" \" $}{$END$}\n{$END$}";
    assert_eq!(run(src), "1 2 3 \n2 4 6 \n3 6 9 \n");
}

#[test]
fn arithmetic_typing() {
    assert_eq!(run("{$= 2 3 / $}"), "1");
    assert_eq!(run("{$= 2.0 3 / $}"), "1.5");
    assert_eq!(run("{$= 7 2 - $}"), "-5");
    assert_eq!(run("{$= 0.1 0.2 + $}"), "0.30000000000000004");
}

#[test]
fn stack_manipulation() {
    assert_eq!(run(r#"{$= "a" "b" @swap $}"#), "ba");
    assert_eq!(run("{$= 2 @dup * $}"), "4");
    assert_eq!(run("{$= 1 2 3 $}"), "123");
}

#[test]
fn decimal_formatting() {
    assert_eq!(run(r#"{$= 3.14159 "0.00" @decfmt $}"#), "3.14");
    assert_eq!(run(r##"{$= 1234567.891 "#,##0.0" @decfmt $}"##), "1,234,567.9");
}

#[test]
fn sine_of_loop_values() {
    let out = run(r#"{$FOR x 0 0$}{$= x @sin "0.000" @decfmt $}{$END$}"#);
    assert_eq!(out, "0.000");
}

#[test]
fn parameters_flow_through_context() {
    let doc = parse(concat!(
        r#"Hello {$= "name" "stranger" @paramGet $}! "#,
        r#"{$= "4" "a" @tparamSet "a" "0" @tparamGet 2 * $} "#,
        r#"{$= "visits" "0" @pparamGet 1 + "visits" @pparamSet $}"#,
        r#"{$= "stale" @pparamDel $}"#,
    ))
    .unwrap();
    let request: ParamStore = [("name", "Ada")].into_iter().collect();
    let persistent: ParamStore = [("visits", "9"), ("stale", "x")].into_iter().collect();
    let ctx = RequestContext::new(Vec::new(), request, persistent).with_header(false);

    let (out, persistent) = run_doc(&doc, ctx);
    assert_eq!(out, "Hello Ada! 8 ");
    assert_eq!(persistent.get("visits"), Some("10"));
    assert!(!persistent.contains("stale"));
}

#[test]
fn parameter_stores_are_separate() {
    let out = run(r#"{$= "v" "k" @pparamSet "x" "k" @tparamSet "k" "-" @paramGet $}"#);
    assert_eq!(out, "-");
}

#[test]
fn header_precedes_body() {
    let doc = parse("body").unwrap();
    let ctx = RequestContext::new(Vec::new(), ParamStore::new(), ParamStore::new());
    let (out, _) = run_doc(&doc, ctx);
    assert_eq!(out, "HTTP/1.1 200 OK\nContent-Type: text/html; charset=UTF-8\n\nbody");
}

#[test]
fn runtime_error_after_partial_output() {
    let out = run("{$FOR i 1 3$}{$= i $}{$END$}{$= missing $}never");
    assert_eq!(out, format!("123no variable `missing` is in scope{ERROR_TRAILER}"));
}

#[test]
fn error_inside_loop_stops_everything() {
    let out = run("{$FOR i 1 5$}{$= i $}{$= 2 i - 1 / $}{$END$}");
    assert_eq!(out, format!("1-12integer division by zero{ERROR_TRAILER}"));
}

#[test]
fn one_parse_many_runs() {
    let doc = parse("{$= \"n\" \"0\" @pparamGet 1 + \"n\" @pparamSet \"n\" \"?\" @pparamGet $}")
        .unwrap();
    let mut persistent = ParamStore::new();
    for expected in ["1", "2", "3"] {
        let ctx = RequestContext::new(Vec::new(), ParamStore::new(), persistent).with_header(false);
        let (out, next) = run_doc(&doc, ctx);
        assert_eq!(out, expected);
        persistent = next;
    }
    assert_eq!(persistent.get("n"), Some("3"));
}

#[test]
fn context_reports_parameter_kinds() {
    let mut ctx = context();
    ctx.set_param(ParamKind::Temporary, "t", "1").unwrap();
    assert_eq!(ctx.param(ParamKind::Temporary, "t"), Some("1"));
    assert!(ctx.set_param(ParamKind::Request, "r", "1").is_err());
}
