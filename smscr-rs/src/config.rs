//! `smscrrc` configuration file parser.
//!
//! | Directive | Action |
//! |-----------|--------|
//! | `/set <name>=<value>` or `/set <name> <value>` | engine setting |
//! | `/param <name>=<value>` | default request parameter |
//! | `/pparam <name>=<value>` | initial persistent parameter |
//! | Lines starting with `;` | comment, ignored |
//! | Any other `/command` | silently skipped |
//!
//! Settings: `mimetype`, `encoding`, `timeout` (seconds), `header`
//! (`on`/`off`) and `session` (session name).

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::params::ParamStore;

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading a config file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

/// Parsed configuration.  `None` means "not set here".
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Config {
    pub mime_type: Option<String>,
    pub encoding: Option<String>,
    pub timeout: Option<Duration>,
    pub header: Option<bool>,
    pub session: Option<String>,
    /// Request parameters used unless the command line overrides them.
    pub params: ParamStore,
    /// Persistent parameters seeded before a session file is loaded.
    pub persistent: ParamStore,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config string.
    ///
    /// Returns the config and a list of any parse errors on recognised lines.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut config = Config::new();
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with(';') {
                continue;
            }

            let Some(rest) = line.strip_prefix('/') else { continue };

            let (cmd, args_str) = rest
                .split_once(|c: char| c.is_ascii_whitespace())
                .unwrap_or((rest, ""));
            let tokens = split_args(args_str.trim());

            let result = match cmd {
                "set" => parse_pair("/set", &tokens)
                    .and_then(|(name, value)| config.apply_setting(&name, &value)),
                "param" => parse_pair("/param", &tokens)
                    .map(|(name, value)| config.params.set(name, value)),
                "pparam" => parse_pair("/pparam", &tokens)
                    .map(|(name, value)| config.persistent.set(name, value)),
                _ => Ok(()),
            };
            if let Err(message) = result {
                errors.push(ConfigError { line: lineno, message });
            }
        }

        (config, errors)
    }

    /// Read and parse a config file from disk.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&s))
    }

    fn apply_setting(&mut self, name: &str, value: &str) -> Result<(), String> {
        match name.to_ascii_lowercase().as_str() {
            "mimetype" => self.mime_type = Some(value.to_owned()),
            "encoding" => self.encoding = Some(value.to_owned()),
            "session" => self.session = Some(value.to_owned()),
            "timeout" => self.timeout = Some(parse_timeout(value)?),
            "header" => {
                self.header = Some(parse_switch(value).ok_or_else(|| {
                    format!("/set header: expected on or off, got '{value}'")
                })?)
            }
            _ => return Err(format!("/set: unknown setting '{name}'")),
        }
        Ok(())
    }
}

/// Parse a positive number of seconds (fractions allowed).
pub fn parse_timeout(s: &str) -> Result<Duration, String> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .map(Duration::from_secs_f64)
        .ok_or_else(|| format!("invalid timeout '{s}' (expected seconds > 0)"))
}

fn parse_switch(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "on" | "1" | "yes" | "true" => Some(true),
        "off" | "0" | "no" | "false" => Some(false),
        _ => None,
    }
}

// ── Argument tokenizer ────────────────────────────────────────────────────────

/// Split `s` into whitespace-delimited tokens, honouring double-quoted strings
/// and `\"` escapes within them.
fn split_args(s: &str) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '\\' if in_quotes => {
                if let Some(escaped) = chars.next() {
                    cur.push(escaped);
                }
            }
            c if c.is_ascii_whitespace() && !in_quotes => {
                if !cur.is_empty() {
                    args.push(std::mem::take(&mut cur));
                }
            }
            c => cur.push(c),
        }
    }
    if !cur.is_empty() {
        args.push(cur);
    }
    args
}

// ── name=value ────────────────────────────────────────────────────────────────

/// Parse `<name>=<value>` or `<name> <value>`.
fn parse_pair(directive: &str, tokens: &[String]) -> Result<(String, String), String> {
    if tokens.is_empty() {
        return Err(format!("{directive}: requires an argument"));
    }

    let (name, value) = if let Some((name, value)) = tokens[0].split_once('=') {
        let mut value = value.to_owned();
        for extra in &tokens[1..] {
            value.push(' ');
            value.push_str(extra);
        }
        (name.to_owned(), value)
    } else if tokens.len() >= 2 {
        (tokens[0].clone(), tokens[1..].join(" "))
    } else {
        return Err(format!("{directive}: missing value for '{}'", tokens[0]));
    };

    if name.is_empty() {
        return Err(format!("{directive}: name cannot be empty"));
    }
    Ok((name, value))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
