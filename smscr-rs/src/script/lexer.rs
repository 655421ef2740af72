//! Document lexer.
//!
//! Lexing happens in two layers:
//!
//! 1. **Tag boundaries.**  The document is scanned for `{$ … $}` pairs.  A
//!    `{$` preceded by an odd run of backslashes is literal text, and a `$}`
//!    inside a quoted string does not close its tag.
//! 2. **Tag atoms.**  Inside each tag, whitespace-separated atoms become
//!    [`Token`]s, dispatched on their first character.
//!
//! Text between tags is unescaped (`\\` → `\`, `\{` → `{`); every other
//! character, backslashes included, passes through verbatim.

use std::sync::OnceLock;

use aho_corasick::AhoCorasick;

use super::error::ParseError;
use super::token::{Operator, Token};

// ── Public types ──────────────────────────────────────────────────────────────

/// Byte offsets of one tag: `start` points at `{$`, `end` at the closing `$}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSpan {
    pub start: usize,
    pub end: usize,
}

impl TagSpan {
    /// Range of the tag body, delimiters excluded.
    pub fn body(&self) -> std::ops::Range<usize> {
        self.start + 2..self.end
    }
}

/// A token plus the byte range it was read from (`end` is exclusive).
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

/// One lexed piece of the document.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Unescaped literal text.
    Text(String),
    /// A tag's tokens; `offset` is where its `{$` starts.
    Tag { offset: usize, tokens: Vec<Token> },
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

/// Whole-document lexer.  Tokenizes everything up front.
pub struct Lexer<'a> {
    src: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer { src }
    }

    /// Split the document into text and tag segments, in source order.
    pub fn segments(&self) -> Result<Vec<Segment>, ParseError> {
        let mut segments = Vec::new();
        let mut pos = 0;

        for span in tag_spans(self.src)? {
            if span.start > pos {
                segments.push(Segment::Text(unescape_text(&self.src[pos..span.start])));
            }
            let tokens = tokenize_tag(self.src, span.body())?
                .into_iter()
                .map(|s| s.token)
                .collect();
            segments.push(Segment::Tag { offset: span.start, tokens });
            pos = span.end + 2;
        }

        if pos < self.src.len() {
            segments.push(Segment::Text(unescape_text(&self.src[pos..])));
        }
        Ok(segments)
    }
}

// ── Tag boundaries ────────────────────────────────────────────────────────────

fn tag_open() -> &'static AhoCorasick {
    static OPEN: OnceLock<AhoCorasick> = OnceLock::new();
    OPEN.get_or_init(|| AhoCorasick::new(["{$"]))
}

/// Locate every tag in `src`, in order.
pub fn tag_spans(src: &str) -> Result<Vec<TagSpan>, ParseError> {
    let mut spans = Vec::new();
    let mut pos = 0;
    while let Some(start) = find_tag_start(src, pos) {
        let end = find_tag_end(src, start)?;
        spans.push(TagSpan { start, end });
        pos = end + 2;
    }
    Ok(spans)
}

/// First unescaped `{$` at or after `from`.
fn find_tag_start(src: &str, mut from: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    while let Some(m) = tag_open().find(&src[from..]) {
        let at = from + m.start();
        if !is_escaped(bytes, at) {
            return Some(at);
        }
        from = at + 1;
    }
    None
}

/// Offset of the `$}` closing the tag opened at `tag_start`, skipping any
/// `$}` that sits inside a quoted string.
fn find_tag_end(src: &str, tag_start: usize) -> Result<usize, ParseError> {
    let bytes = src.as_bytes();
    let mut i = tag_start + 2;
    let mut open_quote: Option<usize> = None;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' if matches!(bytes.get(i + 1), Some(b'"' | b'\\')) => {
                i += 2;
                continue;
            }
            b'"' => {
                open_quote = match open_quote {
                    Some(_) => None,
                    None => Some(i),
                };
            }
            b'$' if open_quote.is_none() && bytes.get(i + 1) == Some(&b'}') => {
                return Ok(i);
            }
            _ => {}
        }
        i += 1;
    }

    Err(match open_quote {
        Some(offset) => ParseError::UnterminatedConstruct { what: "string literal", offset },
        None => ParseError::UnterminatedConstruct { what: "tag", offset: tag_start },
    })
}

/// `true` if the byte at `at` is preceded by an odd number of backslashes.
fn is_escaped(bytes: &[u8], at: usize) -> bool {
    bytes[..at].iter().rev().take_while(|&&b| b == b'\\').count() % 2 == 1
}

/// Resolve the two text escapes, `\\` and `\{`.
pub fn unescape_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&(next @ ('\\' | '{'))) = chars.peek() {
                out.push(next);
                chars.next();
                continue;
            }
        }
        out.push(c);
    }
    out
}

// ── Tag atoms ─────────────────────────────────────────────────────────────────

/// Tokenize the tag body `range` of `src`.  Offsets in the result (and in any
/// error) are absolute positions in `src`.
pub fn tokenize_tag(src: &str, range: std::ops::Range<usize>) -> Result<Vec<Spanned>, ParseError> {
    let mut scanner = TagScanner { src, pos: range.start, end: range.end };
    let mut tokens = Vec::new();
    while let Some(spanned) = scanner.next_token()? {
        tokens.push(spanned);
    }
    Ok(tokens)
}

struct TagScanner<'a> {
    src: &'a str,
    pos: usize,
    end: usize,
}

impl<'a> TagScanner<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..self.end]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_ws(&mut self) {
        while let Some(c @ (' ' | '\t' | '\n' | '\r')) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn next_token(&mut self) -> Result<Option<Spanned>, ParseError> {
        self.skip_ws();
        let Some(first) = self.peek() else {
            return Ok(None);
        };
        let start = self.pos;

        let token = match first {
            c if c.is_alphabetic() => Token::Variable(self.read_ident()),
            '"' => Token::Str(self.read_string()?),
            c if c.is_ascii_digit() => self.read_number()?,
            '@' => {
                self.pos += 1;
                let name = self.read_ident();
                if name.is_empty() {
                    return Err(ParseError::MalformedToken { text: "@".into(), offset: start });
                }
                Token::Function(name)
            }
            c => match Operator::from_char(c) {
                Some(op) => {
                    self.pos += 1;
                    Token::Operator(op)
                }
                None => return Err(ParseError::UnknownTokenStart { ch: c, offset: start }),
            },
        };

        Ok(Some(Spanned { token, start, end: self.pos }))
    }

    /// Letters, digits and `_`.
    fn read_ident(&mut self) -> String {
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        self.pos += len;
        rest[..len].to_owned()
    }

    /// Digits and decimal points; a `.` anywhere selects a float.
    fn read_number(&mut self) -> Result<Token, ParseError> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let text = &rest[..len];
        let malformed = || ParseError::MalformedToken { text: text.to_owned(), offset: self.pos };

        let token = if text.contains('.') {
            let x: f64 = text.parse().map_err(|_| malformed())?;
            if !x.is_finite() {
                return Err(malformed());
            }
            Token::Float(x)
        } else {
            Token::Int(text.parse().map_err(|_| malformed())?)
        };
        self.pos += len;
        Ok(token)
    }

    /// Quoted string; decodes `\\ \" \n \t \r` and keeps any other backslash.
    fn read_string(&mut self) -> Result<String, ParseError> {
        let open = self.pos;
        let bytes = self.src.as_bytes();
        let mut i = open + 1;
        let close = loop {
            match bytes[..self.end].get(i) {
                None => {
                    return Err(ParseError::UnterminatedConstruct {
                        what: "string literal",
                        offset: open,
                    })
                }
                Some(b'\\') => i += 2,
                Some(b'"') => break i,
                Some(_) => i += 1,
            }
        };

        let mut out = String::with_capacity(close - open);
        let mut chars = self.src[open + 1..close].chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\\' {
                let decoded = match chars.peek() {
                    Some('\\') => Some('\\'),
                    Some('"') => Some('"'),
                    Some('n') => Some('\n'),
                    Some('t') => Some('\t'),
                    Some('r') => Some('\r'),
                    _ => None,
                };
                if let Some(d) = decoded {
                    out.push(d);
                    chars.next();
                    continue;
                }
            }
            out.push(c);
        }

        self.pos = close + 1;
        Ok(out)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
