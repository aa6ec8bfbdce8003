// src/logging.rs

//! Logging for `devloop`: a `tracing-subscriber` fmt layer on stderr.
//!
//! Filter directives come from, in order:
//! 1. `--log-level` (applies to every target);
//! 2. `DEVLOOP_LOG`, any `EnvFilter` directive string such as
//!    `info,devloop::vfs=debug,notify=warn`;
//! 3. `info`.
//!
//! The application's own stdout is passed through untouched.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

/// Environment variable holding filter directives.
pub const LOG_ENV: &str = "DEVLOOP_LOG";

const DEFAULT_DIRECTIVES: &str = "info";

/// Install the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV).ok();
    let directives = filter_directives(cli_level, env.as_deref());
    let filter = EnvFilter::try_new(&directives)
        .with_context(|| format!("invalid log filter {directives:?} (from {LOG_ENV})"))?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))
}

/// Directive string picked from the CLI flag and the environment.
pub fn filter_directives(cli_level: Option<LogLevel>, env: Option<&str>) -> String {
    if let Some(level) = cli_level {
        return level_name(level).to_string();
    }
    match env.map(str::trim) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => DEFAULT_DIRECTIVES.to_string(),
    }
}

fn level_name(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
