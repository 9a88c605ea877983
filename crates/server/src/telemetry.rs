//! Tracing setup. Logs always go to stderr: stdout carries the MCP protocol.

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

const DEFAULT_LEVEL: &str = "info";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Filter from `--log-level` when given, else `RUST_LOG`, else `info`.
///
/// # Errors
///
/// Returns an error if the directive does not parse.
pub fn env_filter(level: Option<&str>) -> anyhow::Result<EnvFilter> {
    if let Some(level) = level {
        return Ok(EnvFilter::try_new(level)?);
    }
    Ok(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_LEVEL))?)
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if the filter is invalid or a subscriber is already installed.
pub fn init(level: Option<&str>, format: LogFormat) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level)?)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(false);

    match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))
}
