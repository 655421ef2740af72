//! SmartScript: a small template engine with `{$ … $}` tags.
//!
//! [`script`] holds the language itself (lexer, parser, tree, interpreter,
//! unparser).  The rest is plumbing around it: the [`context`] scripts write
//! to, [`params`] stores, [`session`] persistence, and the pieces of the
//! `smscr` binary ([`cli`], [`config`], [`logging`]).

pub mod cli;
pub mod config;
pub mod context;
pub mod logging;
pub mod params;
pub mod script;
pub mod session;
