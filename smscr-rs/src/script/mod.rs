//! SmartScript template language.
//!
//! A document is plain text with embedded `{$ … $}` tags:
//!
//! - `{$= tokens… $}` evaluates its tokens on a postfix stack and prints
//!   what is left (`{$= 7 2 - $}` prints `5`).
//! - `{$FOR var start end [step] $} … {$END$}` repeats its body while
//!   `var <= end`, binding `var` for the body.
//! - `\{` and `\\` escape text; strings inside tags take `\"`, `\\`, `\n`,
//!   `\t` and `\r`.
//!
//! The pipeline is lexer → parser → tree → interpreter, plus an unparser
//! ([`render`]) that turns a tree back into canonical source.
//!
//! # Quick start
//!
//! ```rust
//! use smscr::context::RequestContext;
//! use smscr::params::ParamStore;
//! use smscr::script::{parse, SmartScriptEngine};
//!
//! let doc = parse("{$FOR i 1 3$}{$= i i * \" \" $}{$END$}").unwrap();
//! let mut ctx = RequestContext::new(Vec::new(), ParamStore::new(), ParamStore::new())
//!     .with_header(false);
//! SmartScriptEngine::new(&doc).execute(&mut ctx).unwrap();
//! assert_eq!(ctx.into_parts().0, b"1 4 9 ");
//! ```

pub mod decfmt;
pub mod error;
pub mod functions;
pub mod interp;
pub mod lexer;
pub mod node;
pub mod parser;
pub mod scope;
pub mod token;
pub mod unparse;
pub mod value;

// Re-exports for convenience.
pub use error::{ParseError, ScriptError};
pub use functions::{Function, Registry};
pub use interp::SmartScriptEngine;
pub use node::{ForLoop, Node};
pub use parser::parse;
pub use token::{Operator, Token};
pub use unparse::render;
pub use value::Value;
