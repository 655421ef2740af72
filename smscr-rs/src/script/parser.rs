//! Tag parser and tree assembly.
//!
//! Each tag's token list is handed to the builder registered for its
//! (case-insensitive) keyword.  Builders validate the tag's shape and return
//! either a finished leaf, an opening `FOR` header, or the `END` sentinel.
//! An explicit stack of open loops then turns that flat event sequence into a
//! nested tree: no recursion, so nesting depth never touches the call stack.

use tracing::{debug, trace};

use super::error::ParseError;
use super::lexer::{Lexer, Segment};
use super::node::{ForLoop, Node};
use super::token::Token;

// ── Tag builders ──────────────────────────────────────────────────────────────

/// Result of building one tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Built {
    /// A complete node to append to the currently open container.
    Leaf(Node),
    /// A `FOR` header; subsequent nodes become its children until `END`.
    Open(ForHeader),
    /// `END`: closes the innermost open `FOR`.
    End,
}

/// The parsed arguments of a `FOR` tag.
#[derive(Debug, Clone, PartialEq)]
pub struct ForHeader {
    pub variable: String,
    pub start: Token,
    pub end: Token,
    pub step: Option<Token>,
}

type Builder = fn(Vec<Token>, usize) -> Result<Built, ParseError>;

const BUILDERS: &[(&str, Builder)] = &[("for", build_for), ("=", build_echo), ("end", build_end)];

/// Build the node for one tag from its full token list (keyword first).
pub fn build_tag(tokens: Vec<Token>, offset: usize) -> Result<Built, ParseError> {
    let mut tokens = tokens.into_iter();
    let Some(head) = tokens.next() else {
        return Err(ParseError::UnknownTag { name: String::new(), offset });
    };
    let keyword = head.as_text().to_lowercase();
    trace!(offset, %keyword, "tag");

    let builder = BUILDERS
        .iter()
        .find(|(name, _)| *name == keyword)
        .map(|&(_, builder)| builder)
        .ok_or_else(|| ParseError::UnknownTag { name: head.as_text(), offset })?;

    let args: Vec<Token> = tokens.collect();
    if args.iter().any(Token::is_echo_marker) {
        return Err(ParseError::ReservedTokenMisuse { offset });
    }
    builder(args, offset)
}

fn build_for(args: Vec<Token>, offset: usize) -> Result<Built, ParseError> {
    if !(3..=4).contains(&args.len()) {
        return Err(ParseError::InvalidForHeader {
            reason: "expected a variable, start, end and optional step",
            offset,
        });
    }
    let mut args = args.into_iter();
    let (Some(first), Some(start), Some(end)) = (args.next(), args.next(), args.next()) else {
        return Err(ParseError::InvalidForHeader { reason: "missing loop bounds", offset });
    };
    let Token::Variable(variable) = first else {
        return Err(ParseError::InvalidForHeader {
            reason: "the loop variable must be a plain name",
            offset,
        });
    };
    Ok(Built::Open(ForHeader { variable, start, end, step: args.next() }))
}

fn build_echo(args: Vec<Token>, _offset: usize) -> Result<Built, ParseError> {
    Ok(Built::Leaf(Node::Echo(args)))
}

fn build_end(args: Vec<Token>, offset: usize) -> Result<Built, ParseError> {
    if !args.is_empty() {
        return Err(ParseError::MalformedEndTag { offset });
    }
    Ok(Built::End)
}

// ── Tree assembly ─────────────────────────────────────────────────────────────

struct OpenLoop {
    header: ForHeader,
    offset: usize,
    children: Vec<Node>,
}

/// Stack of open containers.  The document root sits permanently at the
/// bottom (`root`); `open` holds the `FOR` loops above it, innermost last.
#[derive(Default)]
struct TreeBuilder {
    root: Vec<Node>,
    open: Vec<OpenLoop>,
}

impl TreeBuilder {
    fn top(&mut self) -> &mut Vec<Node> {
        match self.open.last_mut() {
            Some(l) => &mut l.children,
            None => &mut self.root,
        }
    }

    fn append(&mut self, node: Node) {
        self.top().push(node);
    }

    fn open(&mut self, header: ForHeader, offset: usize) {
        self.open.push(OpenLoop { header, offset, children: Vec::new() });
    }

    fn close(&mut self, offset: usize) -> Result<(), ParseError> {
        let Some(OpenLoop { header, children, .. }) = self.open.pop() else {
            return Err(ParseError::UnbalancedTags {
                reason: "END without an open FOR",
                offset,
            });
        };
        self.append(Node::ForLoop(ForLoop {
            variable: header.variable,
            start: header.start,
            end: header.end,
            step: header.step,
            children,
        }));
        Ok(())
    }

    fn finish(self) -> Result<Node, ParseError> {
        if let Some(unclosed) = self.open.last() {
            return Err(ParseError::UnbalancedTags {
                reason: "FOR is never closed",
                offset: unclosed.offset,
            });
        }
        Ok(Node::document(self.root))
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Parse a whole document into its tree.
pub fn parse(src: &str) -> Result<Node, ParseError> {
    let mut tree = TreeBuilder::default();

    for segment in Lexer::new(src).segments()? {
        match segment {
            Segment::Text(text) => tree.append(Node::Text(text)),
            Segment::Tag { offset, tokens } => match build_tag(tokens, offset)? {
                Built::Leaf(node) => tree.append(node),
                Built::Open(header) => tree.open(header, offset),
                Built::End => tree.close(offset)?,
            },
        }
    }

    let doc = tree.finish()?;
    debug!(nodes = doc.node_count(), depth = doc.loop_depth(), "parsed document");
    Ok(doc)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
