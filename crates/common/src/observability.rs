//! Logging setup for autotls binaries
//!
//! Library code only emits `tracing` events; binaries call [`init_tracing`]
//! once at startup to install a subscriber.

use anyhow::{anyhow, Result};
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable selecting the log format (`json`, `pretty` or `text`)
pub const LOG_FORMAT_ENV: &str = "AUTOTLS_LOG_FORMAT";

/// Initialize the tracing/logging subsystem
///
/// Logs are written to stderr so stdout stays reserved for compiled output.
/// `RUST_LOG` overrides the default level, which is `debug` when `verbose`
/// is set and `info` otherwise.
pub fn init_tracing(verbose: bool) -> Result<()> {
    let format = std::env::var(LOG_FORMAT_ENV).unwrap_or_else(|_| "text".to_string());

    let json_layer = (format == "json").then(|| {
        fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
    });

    let pretty_layer = (format == "pretty").then(|| {
        fmt::layer()
            .pretty()
            .with_target(true)
            .with_writer(std::io::stderr)
    });

    let text_layer = (format != "json" && format != "pretty").then(|| {
        fmt::layer()
            .with_target(false)
            .with_level(true)
            .with_writer(std::io::stderr)
    });

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))?;

    debug!(format = %format, "Tracing initialized");
    Ok(())
}
