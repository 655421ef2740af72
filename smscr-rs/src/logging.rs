//! Tracing setup for the command-line tool.
//!
//! Events go to stderr so that script output on stdout stays clean.
//! `RUST_LOG` wins when set; otherwise the level is `warn`, or `debug` with
//! `-d`.

use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Default filter directive for the given debug flag.
pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        "smscr=debug,warn"
    } else {
        "warn"
    }
}

/// Install the global subscriber.  A second call is a no-op.
pub fn init(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_filter(filter),
        )
        .try_init();
}

// ── Tests ─────────────────────────────────────────────────────────────────────
