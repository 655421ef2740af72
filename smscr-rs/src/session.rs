//! Persistent parameters kept between runs.
//!
//! A session is a text file with one `key=value` per line.  Backslash,
//! newline and `=` are escaped as `\\`, `\n` and `\=`.  Files are replaced
//! atomically: the new contents go to a temporary file in the same
//! directory, which is then renamed over the old one.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::cli::project_dirs;
use crate::params::ParamStore;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("invalid session name `{name}` (use letters, digits, `-` and `_`)")]
    InvalidName { name: String },

    #[error("no data directory available for session files")]
    NoDataDir,

    #[error("session file: {0}")]
    Io(#[from] io::Error),
}

/// A directory of session files.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<data dir>/sessions` for the current user.
    pub fn default_location() -> Result<Self, SessionError> {
        let dirs = project_dirs().ok_or(SessionError::NoDataDir)?;
        Ok(Self::new(dirs.data_dir().join("sessions")))
    }

    pub fn path(&self, name: &str) -> Result<PathBuf, SessionError> {
        let valid = !name.is_empty()
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(SessionError::InvalidName { name: name.to_owned() });
        }
        Ok(self.dir.join(format!("{name}.session")))
    }

    /// Load a session.  A session that was never saved is empty.
    pub fn load(&self, name: &str) -> Result<ParamStore, SessionError> {
        let path = self.path(name)?;
        match fs::read_to_string(&path) {
            Ok(text) => {
                let params = decode(&text);
                debug!(path = %path.display(), entries = params.len(), "loaded session");
                Ok(params)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(ParamStore::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, name: &str, params: &ParamStore) -> Result<(), SessionError> {
        let path = self.path(name)?;
        fs::create_dir_all(&self.dir)?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(encode(params).as_bytes())?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        debug!(path = %path.display(), entries = params.len(), "saved session");
        Ok(())
    }
}

// ── Encoding ──────────────────────────────────────────────────────────────────

fn escape(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '=' => out.push_str("\\="),
            c => out.push(c),
        }
    }
}

/// Serialise `params`, sorted by key.
pub fn encode(params: &ParamStore) -> String {
    let mut out = String::new();
    for name in params.names() {
        escape(name, &mut out);
        out.push('=');
        escape(params.get(name).unwrap_or_default(), &mut out);
        out.push('\n');
    }
    out
}

/// Parse session text.  Lines without an unescaped `=` are ignored.
pub fn decode(text: &str) -> ParamStore {
    let mut params = ParamStore::new();
    for line in text.lines() {
        let mut key = String::new();
        let mut value = String::new();
        let mut seen_eq = false;
        let mut chars = line.chars();
        while let Some(c) = chars.next() {
            let target = if seen_eq { &mut value } else { &mut key };
            match c {
                '\\' => match chars.next() {
                    Some('n') => target.push('\n'),
                    Some(other) => target.push(other),
                    None => target.push('\\'),
                },
                '=' if !seen_eq => seen_eq = true,
                c => target.push(c),
            }
        }
        if seen_eq && !key.is_empty() {
            params.set(key, value);
        }
    }
    params
}

// ── Tests ─────────────────────────────────────────────────────────────────────
