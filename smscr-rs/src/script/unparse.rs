//! Canonical unparser.
//!
//! Reconstructs tag syntax from a tree.  Output is canonical rather than
//! byte-identical to the parsed input: echo tags are written
//! `{$= a b $}`, loops `{$FOR i 1 10 2 $}…{$END$}`, and text is re-escaped.
//! Parsing the rendered text yields an equal tree.

use super::node::Node;
use super::token::Token;

/// Render `node` (normally a document root) back to source text.
pub fn render(node: &Node) -> String {
    let mut out = String::new();
    let mut pending = vec![Step::Open(node)];
    while let Some(step) = pending.pop() {
        match step {
            Step::Open(node) => write_node(node, &mut out, &mut pending),
            Step::Close => out.push_str("{$END$}"),
        }
    }
    out
}

enum Step<'a> {
    Open(&'a Node),
    Close,
}

/// Write `node`'s own text and queue its children (reversed, so they pop in
/// order) followed by its closing tag.
fn write_node<'a>(node: &'a Node, out: &mut String, pending: &mut Vec<Step<'a>>) {
    match node {
        Node::Document { children } => {
            pending.extend(children.iter().rev().map(Step::Open));
        }
        Node::Text(text) => escape_text(text, out),
        Node::Echo(tokens) => {
            out.push_str("{$= ");
            write_tokens(tokens, out);
            out.push_str("$}");
        }
        Node::ForLoop(l) => {
            out.push_str("{$FOR ");
            out.push_str(&l.variable);
            out.push(' ');
            write_tokens([&l.start, &l.end].into_iter().chain(l.step.as_ref()), out);
            out.push_str("$}");
            pending.push(Step::Close);
            pending.extend(l.children.iter().rev().map(Step::Open));
        }
    }
}

fn write_tokens<'a>(tokens: impl IntoIterator<Item = &'a Token>, out: &mut String) {
    for token in tokens {
        out.push_str(&token.as_text());
        out.push(' ');
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '{' => out.push_str("\\{"),
            c => out.push(c),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
