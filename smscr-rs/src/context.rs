//! Execution context: the output sink and parameter stores a script sees.
//!
//! The engine only talks to the [`Context`] trait.  [`RequestContext`] is the
//! stock implementation: it wraps any [`Write`], owns the three parameter
//! stores, and can prefix the body with an HTTP-style response header.

use std::borrow::Cow;
use std::fmt;
use std::io::{self, Write};

use thiserror::Error;
use tracing::trace;

use crate::params::ParamStore;

/// Misuse of a context that is not an I/O failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("response header has already been generated")]
    HeaderGenerated,

    #[error("unsupported encoding `{encoding}` (expected UTF-8, US-ASCII or ISO-8859-1)")]
    UnsupportedEncoding { encoding: String },

    #[error("{store} parameters are read-only")]
    ReadOnly { store: &'static str },
}

/// Which parameter store an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Parameters supplied with the request.  Read-only to scripts.
    Request,
    /// Scratch parameters living for one execution.
    Temporary,
    /// Parameters that outlive the execution (session state).
    Persistent,
}

impl ParamKind {
    pub fn name(self) -> &'static str {
        match self {
            ParamKind::Request => "request",
            ParamKind::Temporary => "temporary",
            ParamKind::Persistent => "persistent",
        }
    }
}

/// What the interpreter needs from its surroundings.
pub trait Context {
    fn write(&mut self, data: &[u8]) -> io::Result<()>;

    fn write_str(&mut self, text: &str) -> io::Result<()> {
        self.write(text.as_bytes())
    }

    fn set_mime_type(&mut self, mime: &str) -> Result<(), ContextError>;

    fn param(&self, kind: ParamKind, name: &str) -> Option<&str>;

    fn set_param(&mut self, kind: ParamKind, name: &str, value: &str) -> Result<(), ContextError>;

    fn remove_param(&mut self, kind: ParamKind, name: &str) -> Result<(), ContextError>;
}

// ── Charsets ──────────────────────────────────────────────────────────────────

/// Character sets body text can be encoded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Utf8,
    UsAscii,
    Latin1,
}

impl Charset {
    /// Look up a charset by name or common alias, ignoring case.
    pub fn lookup(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "UTF-8" | "UTF8" => Some(Charset::Utf8),
            "US-ASCII" | "ASCII" => Some(Charset::UsAscii),
            "ISO-8859-1" | "ISO8859-1" | "ISO_8859_1" | "LATIN1" => Some(Charset::Latin1),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::UsAscii => "US-ASCII",
            Charset::Latin1 => "ISO-8859-1",
        }
    }

    /// Encode `text`; characters the set cannot hold become `?`.
    pub fn encode(self, text: &str) -> Cow<'_, [u8]> {
        let limit = match self {
            Charset::Utf8 => return Cow::Borrowed(text.as_bytes()),
            Charset::UsAscii => 0x80,
            Charset::Latin1 => 0x100,
        };
        if text.is_ascii() {
            return Cow::Borrowed(text.as_bytes());
        }
        Cow::Owned(
            text.chars()
                .map(|c| u8::try_from(u32::from(c)).ok().filter(|&b| u32::from(b) < limit))
                .map(|b| b.unwrap_or(b'?'))
                .collect(),
        )
    }
}

// ── Cookies ───────────────────────────────────────────────────────────────────

/// An outgoing cookie.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    /// Seconds.
    pub max_age: Option<u64>,
    pub http_only: bool,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into(), ..Self::default() }
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=\"{}\"", self.name, self.value)?;
        if let Some(domain) = &self.domain {
            write!(f, "; Domain={domain}")?;
        }
        if let Some(path) = &self.path {
            write!(f, "; Path={path}")?;
        }
        if let Some(age) = self.max_age {
            write!(f, "; Max-Age={age}")?;
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        Ok(())
    }
}

// ── RequestContext ────────────────────────────────────────────────────────────

/// A [`Context`] writing to `W`.
pub struct RequestContext<W: Write> {
    out: W,
    charset: Charset,
    status_code: u16,
    status_text: String,
    mime_type: String,
    cookies: Vec<Cookie>,
    emit_header: bool,
    header_generated: bool,
    request: ParamStore,
    temporary: ParamStore,
    persistent: ParamStore,
}

impl<W: Write> RequestContext<W> {
    /// A context that emits a response header before the first byte of body.
    pub fn new(out: W, request: ParamStore, persistent: ParamStore) -> Self {
        Self {
            out,
            charset: Charset::Utf8,
            status_code: 200,
            status_text: "OK".to_owned(),
            mime_type: "text/html".to_owned(),
            cookies: Vec::new(),
            emit_header: true,
            header_generated: false,
            request,
            temporary: ParamStore::new(),
            persistent,
        }
    }

    /// Enable or disable header emission.
    pub fn with_header(mut self, emit: bool) -> Self {
        self.emit_header = emit;
        self
    }

    pub fn header_generated(&self) -> bool {
        self.header_generated
    }

    fn ensure_open(&self) -> Result<(), ContextError> {
        if self.header_generated {
            Err(ContextError::HeaderGenerated)
        } else {
            Ok(())
        }
    }

    /// Choose the charset body text is encoded in and the header announces.
    pub fn set_encoding(&mut self, encoding: &str) -> Result<(), ContextError> {
        self.ensure_open()?;
        self.charset = Charset::lookup(encoding)
            .ok_or_else(|| ContextError::UnsupportedEncoding { encoding: encoding.to_owned() })?;
        Ok(())
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn set_status_code(&mut self, code: u16) -> Result<(), ContextError> {
        self.ensure_open()?;
        self.status_code = code;
        Ok(())
    }

    pub fn set_status_text(&mut self, text: impl Into<String>) -> Result<(), ContextError> {
        self.ensure_open()?;
        self.status_text = text.into();
        Ok(())
    }

    pub fn add_cookie(&mut self, cookie: Cookie) -> Result<(), ContextError> {
        self.ensure_open()?;
        self.cookies.push(cookie);
        Ok(())
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn request(&self) -> &ParamStore {
        &self.request
    }

    pub fn temporary(&self) -> &ParamStore {
        &self.temporary
    }

    pub fn persistent(&self) -> &ParamStore {
        &self.persistent
    }

    /// The header text as it will be (or was) written.
    pub fn header(&self) -> String {
        let mut header = format!("HTTP/1.1 {} {}\n", self.status_code, self.status_text);
        header.push_str("Content-Type: ");
        header.push_str(&self.mime_type);
        if self.mime_type.starts_with("text/") {
            header.push_str("; charset=");
            header.push_str(self.charset.name());
        }
        header.push('\n');
        for cookie in &self.cookies {
            header.push_str(&format!("Set-Cookie: {cookie}\n"));
        }
        header.push('\n');
        header
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    /// Consume the context, handing back the sink and the persistent store.
    pub fn into_parts(self) -> (W, ParamStore) {
        (self.out, self.persistent)
    }

    fn store_mut(&mut self, kind: ParamKind) -> Result<&mut ParamStore, ContextError> {
        match kind {
            ParamKind::Request => Err(ContextError::ReadOnly { store: kind.name() }),
            ParamKind::Temporary => Ok(&mut self.temporary),
            ParamKind::Persistent => Ok(&mut self.persistent),
        }
    }
}

impl<W: Write> Context for RequestContext<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        if !self.header_generated {
            if self.emit_header {
                let header = self.header();
                trace!(status = self.status_code, mime = %self.mime_type, "writing header");
                self.out.write_all(&Charset::UsAscii.encode(&header))?;
            }
            self.header_generated = true;
        }
        self.out.write_all(data)
    }

    fn write_str(&mut self, text: &str) -> io::Result<()> {
        let bytes = self.charset.encode(text);
        self.write(&bytes)
    }

    fn set_mime_type(&mut self, mime: &str) -> Result<(), ContextError> {
        self.ensure_open()?;
        self.mime_type = mime.to_owned();
        Ok(())
    }

    fn param(&self, kind: ParamKind, name: &str) -> Option<&str> {
        match kind {
            ParamKind::Request => self.request.get(name),
            ParamKind::Temporary => self.temporary.get(name),
            ParamKind::Persistent => self.persistent.get(name),
        }
    }

    fn set_param(&mut self, kind: ParamKind, name: &str, value: &str) -> Result<(), ContextError> {
        self.store_mut(kind)?.set(name, value);
        Ok(())
    }

    fn remove_param(&mut self, kind: ParamKind, name: &str) -> Result<(), ContextError> {
        self.store_mut(kind)?.remove(name);
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
