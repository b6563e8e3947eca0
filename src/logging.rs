//! logging
//!
//! Tracing subscriber setup for the `pw` binary.
//!
//! The library only emits `tracing` events. The level is taken from
//! `--debug` if given, otherwise from `$PATCHWORK_LOG`, otherwise `warn`.
//! Events go to stderr so they never mix with file content on stdout.

use std::sync::OnceLock;

use tracing::Level;

/// Environment variable holding the log level.
pub const LOG_ENV: &str = "PATCHWORK_LOG";

static INIT: OnceLock<()> = OnceLock::new();

fn parse_level(value: Option<&str>) -> Level {
    match value.unwrap_or("warn").to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    }
}

/// Initialize tracing output.
///
/// Safe to call more than once; only the first call installs the subscriber.
pub fn init(debug: bool) {
    if INIT.get().is_some() {
        return;
    }

    let level = if debug {
        Level::DEBUG
    } else {
        parse_level(std::env::var(LOG_ENV).ok().as_deref())
    };

    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    let _ = INIT.set(());
}
