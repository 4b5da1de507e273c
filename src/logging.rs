// src/logging.rs

//! Diagnostics for a `tokenflow` run.
//!
//! Engine activity (commands, forks, merges, signals) is traced to STDERR;
//! STDOUT is reserved for the final process report so it can be piped.
//!
//! `--log-level` wins over `TOKENFLOW_LOG`. The environment variable accepts
//! full filter directives, e.g. `TOKENFLOW_LOG=info,tokenflow::engine=trace`
//! to follow the command queue only. Without either the run logs at `info`.

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

const ENV_VAR: &str = "TOKENFLOW_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = build_filter(cli_level, std::env::var(ENV_VAR).ok().as_deref())?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> Result<EnvFilter> {
    let directive = match (cli_level, env.map(str::trim)) {
        (Some(level), _) => level_directive(level),
        (None, Some(env)) if !env.is_empty() => env,
        _ => DEFAULT_DIRECTIVE,
    };
    EnvFilter::try_new(directive).with_context(|| format!("invalid log filter {directive:?}"))
}

fn level_directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
