//! Command-line argument parsing.
//!
//! Usage:
//!   smscr [-duhH] [-f[<rc>]] [-s<session>] [-t<secs>] [-m<mime>]
//!         [-p<name=value>]... [-P<name=value>]... <script | ->

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;

use crate::config::parse_timeout;
use crate::params::parse_assignment;

pub const USAGE: &str = "Usage: smscr [-duhH] [-f[<rc>]] [-s <session>] [-t <secs>] [-m <mime>]\n\
                         \x20            [-p name=value]... [-P name=value]... <script | ->";

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Debug logging (`-d`).
    pub debug: bool,
    /// Print the canonical form of the script instead of running it (`-u`).
    pub unparse: bool,
    /// Print usage and exit (`-h`).
    pub help: bool,
    /// Emit the HTTP-style response header (`-H`).
    pub header: bool,
    /// Config-file specification.
    pub config: ConfigFile,
    /// Session name for persistent parameters (`-s<name>`).
    pub session: Option<String>,
    /// Execution time limit (`-t<secs>`).
    pub timeout: Option<Duration>,
    /// Initial response MIME type (`-m<mime>`).
    pub mime_type: Option<String>,
    /// Request parameters (`-p name=value`), in command-line order.
    pub params: Vec<(String, String)>,
    /// Persistent parameters (`-P name=value`), in command-line order.
    pub persistent: Vec<(String, String)>,
    /// Where the script comes from.
    pub script: ScriptSource,
}

/// How to choose the rc file.
#[derive(Debug, Default)]
pub enum ConfigFile {
    /// `$SMSCR_CONFIG`, then the user config dir, then `./.smscrrc` (default).
    #[default]
    Search,
    /// `-f` with no file argument: skip the rc file.
    Skip,
    /// `-f<file>`: load this specific file.
    Explicit(PathBuf),
}

/// Script input.
#[derive(Debug, Default, PartialEq, Eq)]
pub enum ScriptSource {
    /// No script given (only valid with `-h`).
    #[default]
    Missing,
    /// `-`: read standard input.
    Stdin,
    File(PathBuf),
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()` and return [`CliArgs`] or an error message.
pub fn parse_args() -> Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(raw.get(1..).unwrap_or_default())
}

/// Value of a flag: the rest of this argument, or the next argument.
fn option_value(
    flag: char,
    chars: &[char],
    j: &mut usize,
    argv: &[String],
    i: &mut usize,
) -> Result<String, String> {
    if *j + 1 < chars.len() {
        let s: String = chars[*j + 1..].iter().collect();
        *j = chars.len();
        Ok(s)
    } else if *i + 1 < argv.len() {
        *i += 1;
        Ok(argv[*i].clone())
    } else {
        Err(format!("-{flag} requires an argument"))
    }
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut positional: Vec<String> = Vec::new();
    let mut i = 0;

    while i < argv.len() {
        let arg = argv[i].as_str();

        // `--` ends flag processing.
        if arg == "--" {
            i += 1;
            positional.extend(argv[i..].iter().cloned());
            break;
        }

        // Non-flag argument (`-` alone means stdin).
        if !arg.starts_with('-') || arg == "-" {
            positional.push(arg.to_owned());
            i += 1;
            continue;
        }

        let chars: Vec<char> = arg[1..].chars().collect();
        let mut j = 0;
        while j < chars.len() {
            match chars[j] {
                'd' => args.debug = true,
                'u' => args.unparse = true,
                'h' => args.help = true,
                'H' => args.header = true,

                // -f[<file>]
                'f' => {
                    if j + 1 < chars.len() {
                        let file: String = chars[j + 1..].iter().collect();
                        args.config = ConfigFile::Explicit(PathBuf::from(file));
                        j = chars.len();
                    } else if i + 2 < argv.len() && !argv[i + 1].starts_with('-') {
                        // Separate `-f <file>`, unless that word is the script.
                        i += 1;
                        args.config = ConfigFile::Explicit(PathBuf::from(&argv[i]));
                    } else {
                        args.config = ConfigFile::Skip;
                    }
                }

                's' => args.session = Some(option_value('s', &chars, &mut j, argv, &mut i)?),
                'm' => args.mime_type = Some(option_value('m', &chars, &mut j, argv, &mut i)?),
                't' => {
                    let secs = option_value('t', &chars, &mut j, argv, &mut i)?;
                    args.timeout = Some(parse_timeout(&secs)?);
                }
                'p' => {
                    let kv = option_value('p', &chars, &mut j, argv, &mut i)?;
                    args.params.push(parse_assignment(&kv)?);
                }
                'P' => {
                    let kv = option_value('P', &chars, &mut j, argv, &mut i)?;
                    args.persistent.push(parse_assignment(&kv)?);
                }

                c => return Err(format!("unknown option: -{c}")),
            }
            j += 1;
        }
        i += 1;
    }

    args.script = match positional.len() {
        0 if args.help => ScriptSource::Missing,
        0 => return Err("missing script argument".to_owned()),
        1 if positional[0] == "-" => ScriptSource::Stdin,
        1 => ScriptSource::File(PathBuf::from(positional.remove(0))),
        n => return Err(format!("too many arguments ({n})")),
    };

    Ok(args)
}

// ── Path helpers ──────────────────────────────────────────────────────────────

pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "smscr")
}

/// Search for the rc file: `$SMSCR_CONFIG`, `<config dir>/smscrrc`,
/// `./.smscrrc`.  Returns the first path that exists, or `None`.
pub fn find_user_config() -> Option<PathBuf> {
    let env = std::env::var_os("SMSCR_CONFIG").map(PathBuf::from);
    let user = project_dirs().map(|d| d.config_dir().join("smscrrc"));
    env.into_iter()
        .chain(user)
        .chain(Some(PathBuf::from("./.smscrrc")))
        .find(|p| p.exists())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
