use std::io;
use std::process;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use smscr::cli::{self, ConfigFile, ScriptSource, USAGE};
use smscr::config::Config;
use smscr::context::{Context, RequestContext};
use smscr::params::ParamStore;
use smscr::script::{self, Node, SmartScriptEngine};
use smscr::session::SessionStore;

/// Exit status for a run abandoned by `-t`.
const EXIT_TIMEOUT: i32 = 3;

/// Everything the blocking run needs, owned so it can move to another thread.
struct Run {
    doc: Node,
    request: ParamStore,
    persistent: ParamStore,
    header: bool,
    mime_type: Option<String>,
    encoding: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("smscr: {e}");
            eprintln!("{USAGE}");
            process::exit(2);
        }
    };
    if args.help {
        println!("{USAGE}");
        return;
    }

    smscr::logging::init(args.debug);

    // ── Load config ───────────────────────────────────────────────────────────
    let config = load_config(&args.config);

    // ── Read and parse the script ─────────────────────────────────────────────
    let source = match read_script(&args.script).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("smscr: can't read script: {e}");
            process::exit(1);
        }
    };
    let doc = match script::parse(&source) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("smscr: {e}");
            process::exit(1);
        }
    };

    if args.unparse {
        print!("{}", script::render(&doc));
        return;
    }

    // ── Parameters and session ────────────────────────────────────────────────
    let mut request = config.params.clone();
    for (name, value) in &args.params {
        request.set(name.as_str(), value.as_str());
    }

    let session_name = args.session.clone().or_else(|| config.session.clone());
    let sessions = match &session_name {
        Some(_) => match SessionStore::default_location() {
            Ok(s) => Some(s),
            Err(e) => {
                eprintln!("smscr: {e}");
                process::exit(1);
            }
        },
        None => None,
    };

    let mut persistent = config.persistent.clone();
    if let (Some(store), Some(name)) = (&sessions, &session_name) {
        match store.load(name) {
            Ok(saved) => persistent.merge(&saved),
            Err(e) => {
                eprintln!("smscr: {e}");
                process::exit(1);
            }
        }
    }
    for (name, value) in &args.persistent {
        persistent.set(name.as_str(), value.as_str());
    }

    // ── Execute ───────────────────────────────────────────────────────────────
    let timeout = args.timeout.or(config.timeout);
    let run = Run {
        doc,
        request,
        persistent,
        header: args.header || config.header.unwrap_or(false),
        mime_type: args.mime_type.clone().or(config.mime_type),
        encoding: config.encoding,
    };

    let persistent = match execute(run, timeout).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("smscr: {e}");
            process::exit(1);
        }
    };

    if let (Some(store), Some(name)) = (&sessions, &session_name) {
        if let Err(e) = store.save(name, &persistent) {
            eprintln!("smscr: {e}");
            process::exit(1);
        }
    }
}

fn load_config(choice: &ConfigFile) -> Config {
    let path = match choice {
        ConfigFile::Skip => return Config::new(),
        ConfigFile::Explicit(path) => Some(path.clone()),
        ConfigFile::Search => cli::find_user_config(),
    };
    let Some(path) = path else { return Config::new() };

    match Config::load_file(&path) {
        Ok((config, errors)) => {
            debug!(path = %path.display(), "loaded config");
            for e in &errors {
                eprintln!("smscr: warning: {}: {e}", path.display());
            }
            config
        }
        Err(e) => {
            eprintln!("smscr: warning: {}: {e}", path.display());
            Config::new()
        }
    }
}

async fn read_script(source: &ScriptSource) -> io::Result<String> {
    match source {
        ScriptSource::File(path) => tokio::fs::read_to_string(path).await,
        ScriptSource::Stdin => {
            let mut s = String::new();
            tokio::io::stdin().read_to_string(&mut s).await?;
            Ok(s)
        }
        ScriptSource::Missing => Err(io::Error::new(io::ErrorKind::NotFound, "no script given")),
    }
}

/// Run on a blocking thread; with a timeout, give up on it when time runs out.
async fn execute(run: Run, timeout: Option<Duration>) -> Result<ParamStore, String> {
    let task = tokio::task::spawn_blocking(move || run_blocking(run));
    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(?limit, "script timed out");
                eprintln!("smscr: script timed out after {}s", limit.as_secs_f64());
                process::exit(EXIT_TIMEOUT);
            }
        },
        None => task.await,
    };
    joined.map_err(|e| format!("script task failed: {e}"))?
}

fn run_blocking(run: Run) -> Result<ParamStore, String> {
    let out = io::stdout().lock();
    let mut ctx =
        RequestContext::new(out, run.request, run.persistent).with_header(run.header);
    if let Some(mime) = &run.mime_type {
        ctx.set_mime_type(mime).map_err(|e| e.to_string())?;
    }
    if let Some(encoding) = &run.encoding {
        ctx.set_encoding(encoding).map_err(|e| e.to_string())?;
    }

    SmartScriptEngine::new(&run.doc)
        .execute(&mut ctx)
        .and_then(|()| ctx.flush())
        .map_err(|e| format!("output error: {e}"))?;

    let (_, persistent) = ctx.into_parts();
    Ok(persistent)
}

